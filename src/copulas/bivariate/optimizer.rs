//! # Optimizer
//!
//! $$
//! \hat\theta=\arg\min_{l\le\theta\le u} f(\theta)
//! $$
//!
//! Bounded derivative-free minimization of negative log-likelihoods.
use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::solver::brent::BrentOpt;
use argmin::solver::neldermead::NelderMead;

use crate::error::VineError;

/// Default tolerance on the objective for likelihood fits.
pub const DEFAULT_TOL: f64 = 1e-6;

const MAX_ITERS: u64 = 1000;

struct Bounded<F> {
  objective: F,
  lb: Vec<f64>,
  ub: Vec<f64>,
}

impl<F> Bounded<F> {
  fn clamp(&self, x: &[f64]) -> Vec<f64> {
    x.iter()
      .zip(self.lb.iter().zip(self.ub.iter()))
      .map(|(&xi, (&l, &u))| xi.clamp(l, u))
      .collect()
  }
}

impl<F: Fn(&[f64]) -> f64> CostFunction for Bounded<F> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let inside = self.clamp(x);
    // quadratic penalty keeps the simplex from drifting outside the box
    let outside: f64 = x.iter().zip(inside.iter()).map(|(a, b)| (a - b).powi(2)).sum();
    let value = (self.objective)(&inside);
    Ok(if value.is_finite() { value } else { 1e100 } + 1e6 * outside)
  }
}

struct Scalar<F> {
  objective: F,
}

impl<F: Fn(f64) -> f64> CostFunction for Scalar<F> {
  type Param = f64;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
    let value = (self.objective)(*x);
    Ok(if value.is_finite() { value } else { 1e100 })
  }
}

fn check_bounds(lb: &[f64], ub: &[f64], x0: &[f64]) -> Result<(), VineError> {
  if lb.len() != ub.len() || lb.len() != x0.len() {
    return Err(VineError::DimensionMismatch(format!(
      "optimizer bounds and start must have equal length; got {}, {} and {}",
      lb.len(),
      ub.len(),
      x0.len()
    )));
  }
  if lb.is_empty() {
    return Err(VineError::Validation(
      "optimizer needs at least one parameter".into(),
    ));
  }
  if let Some(i) = (0..lb.len()).find(|&i| !(lb[i] < ub[i])) {
    return Err(VineError::Validation(format!(
      "lower bound {} must be below upper bound {} for parameter {i}",
      lb[i], ub[i]
    )));
  }
  Ok(())
}

/// Brent's method on `[lb, ub]`; `x0` is returned if the search does not improve on it.
pub fn minimize_scalar<F>(objective: F, lb: f64, ub: f64, x0: f64, tol: f64) -> Result<f64, VineError>
where
  F: Fn(f64) -> f64,
{
  check_bounds(&[lb], &[ub], &[x0])?;
  let x0 = x0.clamp(lb, ub);
  let start_value = objective(x0);
  let solver = BrentOpt::new(lb, ub).set_tolerance(tol.sqrt().min(1e-4), tol);
  let res = Executor::new(Scalar { objective: &objective }, solver)
    .configure(|state| state.max_iters(MAX_ITERS))
    .run()
    .map_err(|e| VineError::Estimation(format!("Generic failure. Brent search failed: {e}")))?;

  match res.state.best_param {
    Some(x) if res.state.best_cost <= start_value || !start_value.is_finite() => Ok(x.clamp(lb, ub)),
    Some(_) => Ok(x0),
    None => Err(VineError::Estimation(
      "Generic failure. Brent search returned no parameter".into(),
    )),
  }
}

/// Minimizes `objective` over the box `[lb, ub]` starting from `x0`.
///
/// One-dimensional problems use Brent's method, all others Nelder-Mead on a
/// penalized objective whose initial simplex spans a tenth of each range.
pub fn minimize<F>(objective: F, lb: &[f64], ub: &[f64], x0: &[f64], tol: f64) -> Result<Vec<f64>, VineError>
where
  F: Fn(&[f64]) -> f64,
{
  check_bounds(lb, ub, x0)?;
  if lb.len() == 1 {
    return minimize_scalar(|x| objective(&[x]), lb[0], ub[0], x0[0], tol).map(|x| vec![x]);
  }

  let x0: Vec<f64> = x0
    .iter()
    .zip(lb.iter().zip(ub.iter()))
    .map(|(&x, (&l, &u))| x.clamp(l, u))
    .collect();

  let mut simplex = Vec::with_capacity(x0.len() + 1);
  simplex.push(x0.clone());
  for i in 0..x0.len() {
    let mut point = x0.clone();
    let step = 0.1 * (ub[i] - lb[i]);
    point[i] = if point[i] + step <= ub[i] {
      point[i] + step
    } else {
      point[i] - step
    };
    simplex.push(point);
  }

  let cost = Bounded {
    objective,
    lb: lb.to_vec(),
    ub: ub.to_vec(),
  };
  let solver = NelderMead::new(simplex)
    .with_sd_tolerance(tol)
    .map_err(|e| VineError::Estimation(format!("Generic failure. invalid simplex: {e}")))?;
  let res = Executor::new(cost, solver)
    .configure(|state| state.max_iters(MAX_ITERS))
    .run()
    .map_err(|e| VineError::Estimation(format!("Generic failure. Nelder-Mead failed: {e}")))?;

  let best = res.state.best_param.unwrap_or(x0);
  Ok(
    best
      .iter()
      .zip(lb.iter().zip(ub.iter()))
      .map(|(&x, (&l, &u))| x.clamp(l, u))
      .collect(),
  )
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;

  use super::*;

  #[test]
  fn scalar_minimum_inside_bounds() {
    let x = minimize_scalar(|x| (x - 1.3).powi(2), 0.0, 4.0, 2.0, 1e-10).unwrap();
    assert_abs_diff_eq!(x, 1.3, epsilon = 1e-4);
  }

  #[test]
  fn minimum_on_the_boundary_is_clamped() {
    let x = minimize(|x| (x[0] + 5.0).powi(2) + (x[1] - 0.5).powi(2), &[0.0, 0.0], &[1.0, 1.0], &[0.5, 0.9], 1e-10)
      .unwrap();
    assert_abs_diff_eq!(x[0], 0.0, epsilon = 1e-3);
    assert_abs_diff_eq!(x[1], 0.5, epsilon = 1e-3);
  }

  #[test]
  fn rosenbrock_in_a_box() {
    let f = |x: &[f64]| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
    let x = minimize(f, &[-2.0, -2.0], &[2.0, 2.0], &[-0.5, 0.5], 1e-12).unwrap();
    assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-2);
    assert_abs_diff_eq!(x[1], 1.0, epsilon = 2e-2);
  }

  #[test]
  fn bad_bounds_are_rejected() {
    assert!(matches!(
      minimize(|x| x[0], &[1.0, 0.0], &[0.0, 1.0], &[0.5, 0.5], DEFAULT_TOL),
      Err(VineError::Validation(_))
    ));
    assert!(matches!(
      minimize(|x| x[0], &[0.0], &[1.0, 2.0], &[0.5], DEFAULT_TOL),
      Err(VineError::DimensionMismatch(_))
    ));
  }
}
