//! # Gaussian
//!
//! $$
//! C_\rho(u_1,u_2)=\Phi_2\left(\Phi^{-1}(u_1),\Phi^{-1}(u_2);\rho\right),\qquad \tau=\frac2\pi\arcsin\rho
//! $$
//!
use std::f64::consts::FRAC_2_PI;
use std::f64::consts::PI;

use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Zip;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;

use super::integrate;
use super::BicopFamily;
use crate::error::VineError;
use crate::traits::BivariateExt;

pub(crate) const RHO_MAX: f64 = 0.9999;

#[derive(Debug, Clone, Copy, Default)]
pub struct Gaussian;

/// Bivariate standard normal cdf by Plackett's identity with `r = sin(phi)`.
pub(crate) fn bivariate_normal_cdf(x: f64, y: f64, rho: f64, norm: &Normal) -> f64 {
  let independent = norm.cdf(x) * norm.cdf(y);
  let upper = rho.asin();
  let correction = integrate(
    |phi| {
      let c = phi.cos();
      (-(x * x + y * y - 2.0 * x * y * phi.sin()) / (2.0 * c * c)).exp()
    },
    0.0,
    upper,
  );
  independent + correction / (2.0 * PI)
}

impl BivariateExt for Gaussian {
  fn family(&self) -> BicopFamily {
    BicopFamily::Gaussian
  }

  fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
    (vec![-RHO_MAX], vec![RHO_MAX])
  }

  fn start_parameters(&self) -> Vec<f64> {
    vec![0.0]
  }

  fn pdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let rho = par[0];
    let norm = Normal::standard();
    let r2 = 1.0 - rho * rho;
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let (x, y) = (norm.inverse_cdf(u), norm.inverse_cdf(v));
      let q = (rho * rho * (x * x + y * y) - 2.0 * rho * x * y) / (2.0 * r2);
      (-q).exp() / r2.sqrt()
    })
  }

  fn cdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let rho = par[0];
    let norm = Normal::standard();
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      bivariate_normal_cdf(norm.inverse_cdf(u), norm.inverse_cdf(v), rho, &norm)
    })
  }

  fn hfunc1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let rho = par[0];
    let norm = Normal::standard();
    let s = (1.0 - rho * rho).sqrt();
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let (x, y) = (norm.inverse_cdf(u), norm.inverse_cdf(v));
      norm.cdf((y - rho * x) / s)
    })
  }

  fn hinv1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let rho = par[0];
    let norm = Normal::standard();
    let s = (1.0 - rho * rho).sqrt();
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &p| {
      let (x, z) = (norm.inverse_cdf(u), norm.inverse_cdf(p));
      norm.cdf(rho * x + s * z)
    })
  }

  fn parameters_to_tau(&self, par: &[f64]) -> f64 {
    FRAC_2_PI * par[0].asin()
  }

  fn tau_to_parameters(&self, tau: f64) -> Result<Vec<f64>, VineError> {
    Ok(vec![(tau * PI / 2.0).sin().clamp(-RHO_MAX, RHO_MAX)])
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn orthant_probability() {
    // P(X <= 0, Y <= 0) = 1/4 + asin(rho) / (2 pi)
    let X = array![[0.5, 0.5]];
    let c = Gaussian.cdf(X.view(), &[0.5]);
    assert_abs_diff_eq!(c[0], 0.25 + (0.5f64).asin() / (2.0 * PI), epsilon = 1e-10);
    let c = Gaussian.cdf(X.view(), &[-0.9]);
    assert_abs_diff_eq!(c[0], 0.25 + (-0.9f64).asin() / (2.0 * PI), epsilon = 1e-10);
  }

  #[test]
  fn density_at_the_center() {
    let X = array![[0.5, 0.5]];
    let f = Gaussian.pdf(X.view(), &[0.6]);
    assert_abs_diff_eq!(f[0], 1.0 / 0.8, epsilon = 1e-12);
    assert_abs_diff_eq!(Gaussian.tau_to_parameters(0.0).unwrap()[0], 0.0, epsilon = 1e-15);
  }
}
