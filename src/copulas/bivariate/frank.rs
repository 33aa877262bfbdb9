//! # Frank
//!
//! $$
//! C_\theta(u_1,u_2)=-\frac1\theta\ln\left(1+\frac{(e^{-\theta u_1}-1)(e^{-\theta u_2}-1)}{e^{-\theta}-1}\right),\qquad
//! \tau=1-\frac4\theta+\frac4{\theta^2}\int_0^\theta\frac{t}{e^t-1}\,dt
//! $$
//!
use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Zip;

use super::integrate;
use super::BicopFamily;
use crate::traits::BivariateExt;

/// Parameters closer to zero than this are evaluated as independence.
const THETA_INDEP: f64 = 1e-10;

#[derive(Debug, Clone, Copy, Default)]
pub struct Frank;

/// First Debye function $D_1(x)=\frac1x\int_0^x t/(e^t-1)\,dt$ for `x > 0`.
fn debye1(x: f64) -> f64 {
  integrate(|t| if t == 0.0 { 1.0 } else { t / t.exp_m1() }, 0.0, x) / x
}

impl BivariateExt for Frank {
  fn family(&self) -> BicopFamily {
    BicopFamily::Frank
  }

  fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
    (vec![-35.0], vec![35.0])
  }

  fn start_parameters(&self) -> Vec<f64> {
    vec![1.0]
  }

  fn pdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    if theta.abs() < THETA_INDEP {
      return Array1::ones(X.nrows());
    }

    let a = -(-theta).exp_m1();
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let den = a - (-theta * u).exp_m1() * (-theta * v).exp_m1();
      theta * a * (-theta * (u + v)).exp() / den.powi(2)
    })
  }

  fn cdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    if theta.abs() < THETA_INDEP {
      return &X.column(0) * &X.column(1);
    }

    let a = (-theta).exp_m1();
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      -((-theta * u).exp_m1() * (-theta * v).exp_m1() / a).ln_1p() / theta
    })
  }

  fn hfunc1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    if theta.abs() < THETA_INDEP {
      return X.column(1).to_owned();
    }

    let a = (-theta).exp_m1();
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
      let (eu, ev) = ((-theta * u).exp_m1(), (-theta * v).exp_m1());
      (-theta * u).exp() * ev / (a + eu * ev)
    })
  }

  fn hinv1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    let theta = par[0];
    if theta.abs() < THETA_INDEP {
      return X.column(1).to_owned();
    }

    let a = (-theta).exp_m1();
    Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &p| {
      let eu = (-theta * u).exp();
      let b = p * a / (eu - p * (eu - 1.0));
      -b.ln_1p() / theta
    })
  }

  fn parameters_to_tau(&self, par: &[f64]) -> f64 {
    let theta = par[0];
    let x = theta.abs();
    if x < 1e-4 {
      return theta / 9.0;
    }
    let tau = 1.0 - 4.0 / x + 4.0 * debye1(x) / x;
    tau.copysign(theta)
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn tau_is_odd_and_invertible() {
    // tau(5.736) is about 0.5
    let tau = Frank.parameters_to_tau(&[5.736283]);
    assert_abs_diff_eq!(tau, 0.5, epsilon = 1e-4);
    assert_abs_diff_eq!(Frank.parameters_to_tau(&[-5.736283]), -tau, epsilon = 1e-14);

    let theta = Frank.tau_to_parameters(-0.3).unwrap()[0];
    assert_abs_diff_eq!(Frank.parameters_to_tau(&[theta]), -0.3, epsilon = 1e-8);
    assert_abs_diff_eq!(Frank.tau_to_parameters(0.0).unwrap()[0], 0.0, epsilon = 1e-6);
  }

  #[test]
  fn hinv_inverts_hfunc() {
    let X = array![[0.1, 0.2], [0.5, 0.5], [0.95, 0.3]];
    for theta in [-20.0, -1.0, 0.0, 3.0, 30.0] {
      let h = Frank.hfunc1(X.view(), &[theta]);
      let mut Y = X.clone();
      Y.column_mut(1).assign(&h);
      let back = Frank.hinv1(Y.view(), &[theta]);
      for (a, b) in back.iter().zip(X.column(1).iter()) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-8);
      }
    }
  }
}
