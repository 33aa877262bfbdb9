//! # Traits
//!
//! $$
//! h_1(u_1,u_2)=\frac{\partial C(u_1,u_2)}{\partial u_1},\qquad
//! h_2(u_1,u_2)=\frac{\partial C(u_1,u_2)}{\partial u_2}
//! $$
//!
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use roots::find_root_brent;
use roots::SimpleConvergency;

use crate::copulas::bivariate::swap_columns;
use crate::copulas::bivariate::BicopFamily;
use crate::error::VineError;

/// Formulas of one bivariate copula family in its unrotated form.
///
/// Every method receives an `n x 2` matrix already trimmed to the open unit
/// square and a parameter vector inside [`BivariateExt::parameter_bounds`].
/// Families are exchangeable, so the second h-function and its inverse default
/// to the first one with swapped arguments.
pub trait BivariateExt: Send + Sync {
  fn family(&self) -> BicopFamily;

  /// Lower and upper bounds used for validation and estimation.
  fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>);

  /// Starting values for likelihood optimization.
  fn start_parameters(&self) -> Vec<f64>;

  fn pdf(&self, u: ArrayView2<f64>, par: &[f64]) -> Array1<f64>;

  fn cdf(&self, u: ArrayView2<f64>, par: &[f64]) -> Array1<f64>;

  /// `P(U_2 <= u_2 | U_1 = u_1)`.
  fn hfunc1(&self, u: ArrayView2<f64>, par: &[f64]) -> Array1<f64>;

  /// `P(U_1 <= u_1 | U_2 = u_2)`.
  fn hfunc2(&self, u: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    self.hfunc1(swap_columns(u).view(), par)
  }

  /// Solves `hfunc1(u_1, v) = u_2` for `v`.
  fn hinv1(&self, u: ArrayView2<f64>, par: &[f64]) -> Array1<f64>;

  /// Solves `hfunc2(v, u_2) = u_1` for `v`.
  fn hinv2(&self, u: ArrayView2<f64>, par: &[f64]) -> Array1<f64> {
    self.hinv1(swap_columns(u).view(), par)
  }

  /// Kendall's tau implied by the parameters.
  fn parameters_to_tau(&self, par: &[f64]) -> f64;

  /// Parameters matching Kendall's tau. One-parameter families invert
  /// [`BivariateExt::parameters_to_tau`] numerically; the result is clamped to
  /// the parameter bounds.
  fn tau_to_parameters(&self, tau: f64) -> Result<Vec<f64>, VineError> {
    let (lb, ub) = self.parameter_bounds();
    if lb.len() != 1 {
      return Err(VineError::Estimation(format!(
        "tau inversion is not available for the {} family",
        self.family()
      )));
    }

    let tau_at = |theta: f64| self.parameters_to_tau(&[theta]);
    let (lo, hi) = (lb[0], ub[0]);
    if tau <= tau_at(lo) {
      return Ok(vec![lo]);
    }
    if tau >= tau_at(hi) {
      return Ok(vec![hi]);
    }

    let mut convergency = SimpleConvergency {
      eps: 1e-10,
      max_iter: 100,
    };
    find_root_brent(lo, hi, |theta| tau_at(theta) - tau, &mut convergency)
      .map(|theta| vec![theta])
      .map_err(|e| {
        VineError::Estimation(format!(
          "could not invert tau = {tau} for the {} family: {e:?}",
          self.family()
        ))
      })
  }
}

/// Evaluation surface of a fitted multivariate copula on `n x d` data.
pub trait MultivariateExt {
  fn dim(&self) -> usize;

  fn sample(&self, n: usize) -> Result<Array2<f64>, VineError>;

  fn fit(&mut self, X: ArrayView2<f64>) -> Result<(), VineError>;

  fn check_fit(&self, X: ArrayView2<f64>) -> Result<(), VineError>;

  fn pdf(&self, X: ArrayView2<f64>) -> Result<Array1<f64>, VineError>;

  fn log_pdf(&self, X: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    Ok(self.pdf(X)?.ln())
  }

  fn cdf(&self, X: ArrayView2<f64>) -> Result<Array1<f64>, VineError>;
}
