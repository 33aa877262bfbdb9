//! # Clayton
//!
//! $$
//! C_\theta(u_1,u_2)=\left(u_1^{-\theta}+u_2^{-\theta}-1\right)^{-1/\theta},\qquad \tau=\frac{\theta}{\theta+2}
//! $$
//!
use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Zip;

use super::BicopFamily;
use crate::error::VineError;
use crate::traits::BivariateExt;

/// Below this parameter the copula is evaluated as independence.
const THETA_INDEP: f64 = 1e-5;

#[derive(Debug, Clone, Copy, Default)]
pub struct Clayton;

impl BivariateExt for Clayton {
  fn family(&self) -> BicopFamily {
    BicopFamily::Clayton
  }

  fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
    (vec![1e-10], vec![28.0])
  }

  fn start_parameters(&self) -> Vec<f64> {
    vec![1.0]
  }

  fn pdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    if theta < THETA_INDEP {
      return Array1::ones(X.nrows());
    }

    let U = X.column(0);
    let V = X.column(1);
    Zip::from(U).and(V).map_collect(|&u, &v| {
      let (lu, lv) = (u.ln(), v.ln());
      let s = (-theta * lu).exp() + (-theta * lv).exp() - 1.0;
      ((1.0 + theta).ln() - (1.0 + theta) * (lu + lv) - (1.0 / theta + 2.0) * s.ln()).exp()
    })
  }

  fn cdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    let U = X.column(0);
    let V = X.column(1);
    if theta < THETA_INDEP {
      return &U * &V;
    }

    (U.powf(-theta) + V.powf(-theta) - 1.0).powf(-1.0 / theta)
  }

  fn hfunc1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    let U = X.column(0);
    let V = X.column(1);
    if theta < THETA_INDEP {
      return V.to_owned();
    }

    let s = U.powf(-theta) + V.powf(-theta) - 1.0;
    U.powf(-theta - 1.0) * s.powf(-1.0 / theta - 1.0)
  }

  fn hinv1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    let U = X.column(0);
    let P = X.column(1);
    if theta < THETA_INDEP {
      return P.to_owned();
    }

    Zip::from(U).and(P).map_collect(|&u, &p| {
      let a = (p * u.powf(theta + 1.0)).powf(-theta / (1.0 + theta));
      (a + 1.0 - u.powf(-theta)).powf(-1.0 / theta)
    })
  }

  fn parameters_to_tau(&self, par: &[f64]) -> f64 {
    par[0] / (par[0] + 2.0)
  }

  fn tau_to_parameters(&self, tau: f64) -> Result<Vec<f64>, VineError> {
    let (lb, ub) = self.parameter_bounds();
    let theta = if tau <= 0.0 {
      lb[0]
    } else {
      2.0 * tau / (1.0 - tau)
    };
    Ok(vec![theta.clamp(lb[0], ub[0])])
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn tau_inversion() {
    let theta = Clayton.tau_to_parameters(0.5).unwrap()[0];
    assert_abs_diff_eq!(theta, 2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(Clayton.parameters_to_tau(&[theta]), 0.5, epsilon = 1e-12);
    assert_eq!(Clayton.tau_to_parameters(-0.3).unwrap()[0], 1e-10);
    assert_eq!(Clayton.tau_to_parameters(0.99).unwrap()[0], 28.0);
  }

  #[test]
  fn known_values() {
    let X = array![[0.5, 0.5]];
    // C(1/2, 1/2) = (4 + 4 - 1)^(-1/2) for theta = 2
    assert_abs_diff_eq!(Clayton.cdf(X.view(), &[2.0])[0], 7f64.powf(-0.5), epsilon = 1e-12);
    assert_abs_diff_eq!(
      Clayton.hfunc1(X.view(), &[2.0])[0],
      8.0 * 7f64.powf(-1.5),
      epsilon = 1e-12
    );
    assert_abs_diff_eq!(Clayton.pdf(X.view(), &[1e-8])[0], 1.0, epsilon = 1e-12);
  }
}
