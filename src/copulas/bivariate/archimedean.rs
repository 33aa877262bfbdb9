//! # Archimedean
//!
//! $$
//! C(u_1,u_2)=\varphi^{-1}\left(\varphi(u_1)+\varphi(u_2)\right),\qquad
//! c(u_1,u_2)=-\frac{\varphi''(C)\,\varphi'(u_1)\,\varphi'(u_2)}{\varphi'(C)^3},\qquad
//! \tau=1+4\int_0^1\frac{\varphi(t)}{\varphi'(t)}\,dt
//! $$
//!
use ndarray::Array1;
use ndarray::ArrayView2;
use ndarray::Zip;

use super::integrate;

/// Generator of an Archimedean copula and its first two derivatives.
pub trait Generator {
  fn generator(&self, t: f64, par: &[f64]) -> f64;

  fn generator_inv(&self, s: f64, par: &[f64]) -> f64;

  fn generator_derivative(&self, t: f64, par: &[f64]) -> f64;

  fn generator_derivative2(&self, t: f64, par: &[f64]) -> f64;
}

pub fn cdf<G: Generator + ?Sized>(g: &G, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
  Zip::from(X.column(0))
    .and(X.column(1))
    .map_collect(|&u, &v| g.generator_inv(g.generator(u, par) + g.generator(v, par), par))
}

pub fn hfunc1<G: Generator + ?Sized>(g: &G, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
  Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
    let c = g.generator_inv(g.generator(u, par) + g.generator(v, par), par);
    g.generator_derivative(u, par) / g.generator_derivative(c, par)
  })
}

pub fn pdf<G: Generator + ?Sized>(g: &G, X: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
  Zip::from(X.column(0)).and(X.column(1)).map_collect(|&u, &v| {
    let c = g.generator_inv(g.generator(u, par) + g.generator(v, par), par);
    let d1 = g.generator_derivative(c, par);
    let f = -g.generator_derivative2(c, par) * g.generator_derivative(u, par) * g.generator_derivative(v, par)
      / d1.powi(3);
    if f.is_finite() {
      f.max(0.0)
    } else {
      0.0
    }
  })
}

pub fn tau<G: Generator + ?Sized>(g: &G, par: &[f64]) -> f64 {
  let integral = integrate(
    |t| {
      let r = g.generator(t, par) / g.generator_derivative(t, par);
      if r.is_finite() {
        r
      } else {
        0.0
      }
    },
    0.0,
    1.0,
  );
  1.0 + 4.0 * integral
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  /// Clayton written as a generator, checked against its closed forms.
  struct ClaytonGenerator;

  impl Generator for ClaytonGenerator {
    fn generator(&self, t: f64, par: &[f64]) -> f64 {
      (t.powf(-par[0]) - 1.0) / par[0]
    }

    fn generator_inv(&self, s: f64, par: &[f64]) -> f64 {
      (1.0 + par[0] * s).powf(-1.0 / par[0])
    }

    fn generator_derivative(&self, t: f64, par: &[f64]) -> f64 {
      -t.powf(-par[0] - 1.0)
    }

    fn generator_derivative2(&self, t: f64, par: &[f64]) -> f64 {
      (par[0] + 1.0) * t.powf(-par[0] - 2.0)
    }
  }

  #[test]
  fn generic_formulas_match_clayton() {
    let theta = 2.0;
    let X = array![[0.3, 0.6], [0.8, 0.1]];
    let c = cdf(&ClaytonGenerator, X.view(), &[theta]);
    let expected = (0.3f64.powf(-2.0) + 0.6f64.powf(-2.0) - 1.0).powf(-0.5);
    assert_abs_diff_eq!(c[0], expected, epsilon = 1e-12);

    let f = pdf(&ClaytonGenerator, X.view(), &[theta]);
    let s: f64 = 0.8f64.powf(-2.0) + 0.1f64.powf(-2.0) - 1.0;
    let expected = 3.0 * (0.08f64).powf(-3.0) * s.powf(-2.5);
    assert_abs_diff_eq!(f[1], expected, epsilon = 1e-9);

    assert_abs_diff_eq!(tau(&ClaytonGenerator, &[theta]), 0.5, epsilon = 1e-4);
  }
}
