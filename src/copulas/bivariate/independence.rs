use ndarray::Array1;
use ndarray::ArrayView2;

use super::BicopFamily;
use crate::error::VineError;
use crate::traits::BivariateExt;

/// $C(u_1,u_2)=u_1u_2$.
#[derive(Debug, Clone, Copy, Default)]
pub struct Independence;

impl BivariateExt for Independence {
  fn family(&self) -> BicopFamily {
    BicopFamily::Indep
  }

  fn parameter_bounds(&self) -> (Vec<f64>, Vec<f64>) {
    (vec![], vec![])
  }

  fn start_parameters(&self) -> Vec<f64> {
    vec![]
  }

  fn pdf(&self, X: ArrayView2<f64>, _par: &[f64]) -> Array1<f64> {
    Array1::ones(X.nrows())
  }

  fn cdf(&self, X: ArrayView2<f64>, _par: &[f64]) -> Array1<f64> {
    &X.column(0) * &X.column(1)
  }

  fn hfunc1(&self, X: ArrayView2<f64>, _par: &[f64]) -> Array1<f64> {
    X.column(1).to_owned()
  }

  fn hinv1(&self, X: ArrayView2<f64>, _par: &[f64]) -> Array1<f64> {
    X.column(1).to_owned()
  }

  fn parameters_to_tau(&self, _par: &[f64]) -> f64 {
    0.0
  }

  fn tau_to_parameters(&self, _tau: f64) -> Result<Vec<f64>, VineError> {
    Ok(vec![])
  }
}
