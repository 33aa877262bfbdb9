//! # BB
//!
//! Two-parameter Archimedean families of Joe (1997).
//!
//! $$
//! \begin{aligned}
//! \text{BB1}:&\ \varphi(t)=\left(t^{-\theta}-1\right)^\delta\\
//! \text{BB6}:&\ \varphi(t)=\left(-\ln\left[1-(1-t)^\theta\right]\right)^\delta\\
//! \text{BB7}:&\ \varphi(t)=\left[1-(1-t)^\theta\right]^{-\delta}-1\\
//! \text{BB8}:&\ \varphi(t)=-\ln\frac{1-(1-\delta t)^\theta}{1-(1-\delta)^\theta}
//! \end{aligned}
//! $$
//!
use ndarray::Array1;
use ndarray::ArrayView2;

use super::archimedean;
use super::archimedean::Generator;
use super::invert_hfunc1;
use super::BicopFamily;
use crate::traits::BivariateExt;

macro_rules! bb_kernel {
  ($name:ident, $family:expr, $lb:expr, $ub:expr, $start:expr) => {
    #[derive(Debug, Clone, Copy, Default)]
    pub struct $name;

    impl BivariateExt for $name {
      fn family(&self) -> BicopFamily {
        $family
      }

      fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        ($lb.to_vec(), $ub.to_vec())
      }

      fn start_parameters(&self) -> Vec<f64> {
        $start.to_vec()
      }

      fn pdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
        archimedean::pdf(self, X, par)
      }

      fn cdf(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
        archimedean::cdf(self, X, par)
      }

      fn hfunc1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
        archimedean::hfunc1(self, X, par)
      }

      fn hinv1(&self, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
        let h1 = |u: f64, v: f64| {
          let c = self.generator_inv(self.generator(u, par) + self.generator(v, par), par);
          self.generator_derivative(u, par) / self.generator_derivative(c, par)
        };
        invert_hfunc1(X, h1)
      }

      fn parameters_to_tau(&self, par: &[f64]) -> f64 {
        self.tau(par)
      }
    }
  };
}

bb_kernel!(Bb1, BicopFamily::Bb1, [1e-4, 1.0], [7.0, 7.0], [0.5, 1.5]);
bb_kernel!(Bb6, BicopFamily::Bb6, [1.0, 1.0], [6.0, 8.0], [1.5, 1.5]);
bb_kernel!(Bb7, BicopFamily::Bb7, [1.0, 1e-4], [6.0, 25.0], [1.5, 0.5]);
bb_kernel!(Bb8, BicopFamily::Bb8, [1.0, 1e-4], [8.0, 1.0], [2.0, 0.7]);

impl Bb1 {
  fn tau(&self, par: &[f64]) -> f64 {
    1.0 - 2.0 / (par[1] * (par[0] + 2.0))
  }
}

impl Generator for Bb1 {
  fn generator(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    (t.powf(-theta) - 1.0).powf(delta)
  }

  fn generator_inv(&self, s: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    (1.0 + s.powf(1.0 / delta)).powf(-1.0 / theta)
  }

  fn generator_derivative(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    -delta * theta * t.powf(-theta - 1.0) * (t.powf(-theta) - 1.0).powf(delta - 1.0)
  }

  fn generator_derivative2(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let f = t.powf(-theta) - 1.0;
    delta * theta * t.powf(-theta - 2.0) * f.powf(delta - 2.0) * ((delta - 1.0) * theta * t.powf(-theta) + (theta + 1.0) * f)
  }
}

impl Bb6 {
  fn tau(&self, par: &[f64]) -> f64 {
    archimedean::tau(self, par)
  }
}

impl Generator for Bb6 {
  fn generator(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    (-(-(1.0 - t).powf(theta)).ln_1p()).powf(delta)
  }

  fn generator_inv(&self, s: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    1.0 - (-(-s.powf(1.0 / delta)).exp_m1()).powf(1.0 / theta)
  }

  fn generator_derivative(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let w = 1.0 - t;
    let wt = w.powf(theta);
    let g = -(-wt).ln_1p();
    let g1 = -theta * w.powf(theta - 1.0) / (1.0 - wt);
    delta * g.powf(delta - 1.0) * g1
  }

  fn generator_derivative2(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let w = 1.0 - t;
    let wt = w.powf(theta);
    let g = -(-wt).ln_1p();
    let g1 = -theta * w.powf(theta - 1.0) / (1.0 - wt);
    let g2 = theta * w.powf(theta - 2.0) * (theta - 1.0 + wt) / (1.0 - wt).powi(2);
    delta * (delta - 1.0) * g.powf(delta - 2.0) * g1 * g1 + delta * g.powf(delta - 1.0) * g2
  }
}

impl Bb7 {
  fn tau(&self, par: &[f64]) -> f64 {
    archimedean::tau(self, par)
  }
}

impl Generator for Bb7 {
  fn generator(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    (1.0 - (1.0 - t).powf(theta)).powf(-delta) - 1.0
  }

  fn generator_inv(&self, s: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    1.0 - (1.0 - (1.0 + s).powf(-1.0 / delta)).powf(1.0 / theta)
  }

  fn generator_derivative(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let w = 1.0 - t;
    let h = 1.0 - w.powf(theta);
    -delta * h.powf(-delta - 1.0) * theta * w.powf(theta - 1.0)
  }

  fn generator_derivative2(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let w = 1.0 - t;
    let h = 1.0 - w.powf(theta);
    let h1 = theta * w.powf(theta - 1.0);
    let h2 = -theta * (theta - 1.0) * w.powf(theta - 2.0);
    delta * (delta + 1.0) * h.powf(-delta - 2.0) * h1 * h1 - delta * h.powf(-delta - 1.0) * h2
  }
}

impl Bb8 {
  fn tau(&self, par: &[f64]) -> f64 {
    archimedean::tau(self, par)
  }
}

impl Generator for Bb8 {
  fn generator(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let eta = 1.0 - (1.0 - delta).powf(theta);
    -((1.0 - (1.0 - delta * t).powf(theta)) / eta).ln()
  }

  fn generator_inv(&self, s: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let eta = 1.0 - (1.0 - delta).powf(theta);
    (1.0 - (1.0 - eta * (-s).exp()).powf(1.0 / theta)) / delta
  }

  fn generator_derivative(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let w = 1.0 - delta * t;
    let q = 1.0 - w.powf(theta);
    -theta * delta * w.powf(theta - 1.0) / q
  }

  fn generator_derivative2(&self, t: f64, par: &[f64]) -> f64 {
    let (theta, delta) = (par[0], par[1]);
    let w = 1.0 - delta * t;
    let q = 1.0 - w.powf(theta);
    let q1 = theta * delta * w.powf(theta - 1.0);
    let q2 = -theta * (theta - 1.0) * delta * delta * w.powf(theta - 2.0);
    (q1 * q1 - q * q2) / (q * q)
  }
}
