//! # Student
//!
//! $$
//! c_{\rho,\nu}(u_1,u_2)=\frac{\Gamma\left(\frac{\nu+2}2\right)\Gamma\left(\frac\nu2\right)}{\Gamma\left(\frac{\nu+1}2\right)^2\sqrt{1-\rho^2}}
//! \frac{\left(1+\frac{x^2+y^2-2\rho xy}{\nu(1-\rho^2)}\right)^{-\frac{\nu+2}2}}{\left[(1+\frac{x^2}\nu)(1+\frac{y^2}\nu)\right]^{-\frac{\nu+1}2}},
//! \qquad x=T_\nu^{-1}(u_1),\ y=T_\nu^{-1}(u_2)
//! $$
//!
use std::f64::consts::FRAC_2_PI;
use std::f64::consts::PI;

use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Zip;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::StudentsT;
use statrs::function::gamma::ln_gamma;

use super::gaussian::RHO_MAX;
use super::integrate;
use super::BicopFamily;
use crate::error::VineError;
use crate::traits::BivariateExt;

#[derive(Debug, Clone, Copy, Default)]
pub struct Student;

fn h1(x: f64, y: f64, rho: f64, nu: f64, t1: &StudentsT) -> f64 {
  let scale = ((nu + x * x) * (1.0 - rho * rho) / (nu + 1.0)).sqrt();
  t1.cdf((y - rho * x) / scale)
}

impl BivariateExt for Student {
  fn family(&self) -> BicopFamily {
    BicopFamily::Student
  }

  fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
    (vec![-RHO_MAX, 2.0], vec![RHO_MAX, 50.0])
  }

  fn start_parameters(&self) -> Vec<f64> {
    vec![0.0, 5.0]
  }

  fn pdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let (rho, nu) = (par[0], par[1]);
    let Ok(t) = StudentsT::new(0.0, 1.0, nu) else {
      return Array1::from_elem(X.nrows(), f64::NAN);
    };
    let r2 = 1.0 - rho * rho;
    let log_const = ln_gamma((nu + 2.0) / 2.0) + ln_gamma(nu / 2.0) - 2.0 * ln_gamma((nu + 1.0) / 2.0) - 0.5 * r2.ln();

    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let (x, y) = (t.inverse_cdf(u), t.inverse_cdf(v));
      let joint = -(nu + 2.0) / 2.0 * (1.0 + (x * x + y * y - 2.0 * rho * x * y) / (nu * r2)).ln();
      let margins = (nu + 1.0) / 2.0 * ((1.0 + x * x / nu).ln() + (1.0 + y * y / nu).ln());
      (log_const + joint + margins).exp()
    })
  }

  fn cdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let (rho, nu) = (par[0], par[1]);
    let (Ok(t), Ok(t1)) = (StudentsT::new(0.0, 1.0, nu), StudentsT::new(0.0, 1.0, nu + 1.0)) else {
      return Array1::from_elem(X.nrows(), f64::NAN);
    };

    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let y = t.inverse_cdf(v);
      integrate(|s| h1(t.inverse_cdf(s), y, rho, nu, &t1), 0.0, u)
    })
  }

  fn hfunc1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let (rho, nu) = (par[0], par[1]);
    let (Ok(t), Ok(t1)) = (StudentsT::new(0.0, 1.0, nu), StudentsT::new(0.0, 1.0, nu + 1.0)) else {
      return Array1::from_elem(X.nrows(), f64::NAN);
    };

    Zip::from(X.column(0))
      .and(X.column(1))
      .map_collect(|&u, &v| h1(t.inverse_cdf(u), t.inverse_cdf(v), rho, nu, &t1))
  }

  fn hinv1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let (rho, nu) = (par[0], par[1]);
    let (Ok(t), Ok(t1)) = (StudentsT::new(0.0, 1.0, nu), StudentsT::new(0.0, 1.0, nu + 1.0)) else {
      return Array1::from_elem(X.nrows(), f64::NAN);
    };

    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &p| {
      let x = t.inverse_cdf(u);
      let scale = ((nu + x * x) * (1.0 - rho * rho) / (nu + 1.0)).sqrt();
      t.cdf(t1.inverse_cdf(p) * scale + rho * x)
    })
  }

  fn parameters_to_tau(&self, par: &[f64]) -> f64 {
    FRAC_2_PI * par[0].asin()
  }

  /// Only the correlation is determined by tau; the degrees of freedom are set
  /// to their starting value.
  fn tau_to_parameters(&self, tau: f64) -> Result<Vec<f64>, VineError> {
    let rho = (tau * PI / 2.0).sin().clamp(-RHO_MAX, RHO_MAX);
    Ok(vec![rho, self.start_parameters()[1]])
  }
}
