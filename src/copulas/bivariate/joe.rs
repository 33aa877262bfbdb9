//! # Joe
//!
//! $$
//! C_\theta(u_1,u_2)=1-\left(\bar u_1^\theta+\bar u_2^\theta-\bar u_1^\theta\bar u_2^\theta\right)^{1/\theta},\qquad \bar u=1-u
//! $$
//!
use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Zip;

use super::invert_hfunc1;
use super::BicopFamily;
use crate::traits::BivariateExt;

const TAU_TERMS: usize = 2000;

#[derive(Debug, Clone, Copy, Default)]
pub struct Joe;

fn h1(u: f64, v: f64, theta: f64) -> f64 {
  let (a, b) = ((1.0 - u).powf(theta), (1.0 - v).powf(theta));
  let s = a + b - a * b;
  s.powf(1.0 / theta - 1.0) * (1.0 - u).powf(theta - 1.0) * (1.0 - b)
}

impl BivariateExt for Joe {
  fn family(&self) -> BicopFamily {
    BicopFamily::Joe
  }

  fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
    (vec![1.0], vec![30.0])
  }

  fn start_parameters(&self) -> Vec<f64> {
    vec![1.5]
  }

  fn pdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let (a, b) = ((1.0 - u).powf(theta), (1.0 - v).powf(theta));
      let s = a + b - a * b;
      s.powf(1.0 / theta - 2.0) * ((1.0 - u) * (1.0 - v)).powf(theta - 1.0) * (theta - 1.0 + s)
    })
  }

  fn cdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let (a, b) = ((1.0 - u).powf(theta), (1.0 - v).powf(theta));
      1.0 - (a + b - a * b).powf(1.0 / theta)
    })
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

  /// $\tau=1-4\sum_{k\ge1}\frac{1}{k(\theta k+2)(\theta(k-1)+2)}$, with the tail
  /// of the series approximated by its leading term.
  fn parameters_to_tau(&self, par: &[f64]) -> f64 {
    let theta = par[0];
    let sum: f64 = (1..=TAU_TERMS)
      .map(|k| {
        let k = k as f64;
        1.0 / (k * (theta * k + 2.0) * (theta * (k - 1.0) + 2.0))
      })
      .sum();
    let tail = 1.0 / (2.0 * theta * theta * (TAU_TERMS as f64).powi(2));
    1.0 - 4.0 * (sum + tail)
  }
}
