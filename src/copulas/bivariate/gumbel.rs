//! # Gumbel
//!
//! $$
//! C_\theta(u_1,u_2)=\exp\left(-\left[(-\ln u_1)^\theta+(-\ln u_2)^\theta\right]^{1/\theta}\right),\qquad \tau=1-\frac1\theta
//! $$
//!
use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Zip;

use super::invert_hfunc1;
use super::BicopFamily;
use crate::error::VineError;
use crate::traits::BivariateExt;

#[derive(Debug, Clone, Copy, Default)]
pub struct Gumbel;

/// `ln((-ln u)^theta + (-ln v)^theta)` without overflow or underflow.
fn log_t(x: f64, y: f64, theta: f64) -> f64 {
  let (a, b) = (theta * x.ln(), theta * y.ln());
  let m = a.max(b);
  m + ((a - m).exp() + (b - m).exp()).ln()
}

fn h1(u: f64, v: f64, theta: f64) -> f64 {
  let (x, y) = (-u.ln(), -v.ln());
  let lt = log_t(x, y, theta);
  (-(lt / theta).exp() + (1.0 / theta - 1.0) * lt + (theta - 1.0) * x.ln() - u.ln()).exp()
}

impl BivariateExt for Gumbel {
  fn family(&self) -> BicopFamily {
    BicopFamily::Gumbel
  }

  fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
    (vec![1.0], vec![50.0])
  }

  fn start_parameters(&self) -> Vec<f64> {
    vec![1.5]
  }

  fn pdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let (x, y) = (-u.ln(), -v.ln());
      let lt = log_t(x, y, theta);
      let a = (lt / theta).exp();
      (-a - u.ln() - v.ln() + (theta - 1.0) * (x.ln() + y.ln()) + (2.0 / theta - 2.0) * lt
        + (1.0 + (theta - 1.0) / a).ln())
      .exp()
    })
  }

  fn cdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    Zip::from(X.column(0))
      .and(X.column(1))
      .map_collect(|&u, &v| (-(log_t(-u.ln(), -v.ln(), theta) / theta).exp()).exp())
  }

  fn hfunc1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    Zip::from(X.column(0))
      .and(X.column(1))
      .map_collect(|&u, &v| h1(u, v, theta))
  }

  fn hinv1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    invert_hfunc1(X, |u, v| h1(u, v, theta))
  }

  fn parameters_to_tau(&self, par: &[f64]) -> f64 {
    1.0 - 1.0 / par[0]
  }

  fn tau_to_parameters(&self, tau: f64) -> Result<Vec<f64>, VineError> {
    let (lb, ub) = self.parameter_bounds();
    let theta = if tau <= 0.0 { lb[0] } else { 1.0 / (1.0 - tau) };
    Ok(vec![theta.clamp(lb[0], ub[0])])
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn theta_one_is_independence() {
    let X = array![[0.2, 0.7], [0.9, 0.4]];
    let c = Gumbel.cdf(X.view(), &[1.0]);
    assert_abs_diff_eq!(c[0], 0.14, epsilon = 1e-12);
    assert_abs_diff_eq!(Gumbel.pdf(X.view(), &[1.0])[1], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(Gumbel.hfunc1(X.view(), &[1.0])[1], 0.4, epsilon = 1e-12);
  }

  #[test]
  fn stable_near_the_upper_corner() {
    let X = array![[1.0 - 1e-10, 1.0 - 1e-10]];
    let f = Gumbel.pdf(X.view(), &[50.0]);
    assert!(f[0].is_finite());
    assert_abs_diff_eq!(Gumbel.tau_to_parameters(0.5).unwrap()[0], 2.0, epsilon = 1e-12);
  }
}
