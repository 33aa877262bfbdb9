//! # Select
//!
//! $$
//! \hat C=\arg\min_{C\in\mathcal C}\left\{-2\ell(C)+\kappa_n\,p(C)\right\}
//! $$
//!
//! Candidate generation, tail-asymmetry preselection and criterion-based choice
//! of a pair-copula.
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;
use tracing::warn;

use super::controls::FitControlsBicop;
use super::controls::SelectionCriterion;
use super::Bicop;
use super::BicopFamily;
use crate::copulas::correlation::kendall_tau;
use crate::copulas::correlation::pearson;
use crate::copulas::empirical::normal_scores;
use crate::error::VineError;
use crate::parallel::WorkerPool;

/// Samples with fewer rows than this are modelled by independence.
pub const MIN_NOBS: usize = 10;

/// Correlations of the normal scores in the two quadrants along the direction of
/// dependence: upper-right and lower-left for positive tau, upper-left and
/// lower-right otherwise.
pub fn get_c1c2(data: ArrayView2<f64>, tau: f64) -> (f64, f64) {
  let x = normal_scores(data);
  let mut z1 = Vec::new();
  let mut z2 = Vec::new();
  for row in x.rows() {
    let (a, b) = (row[0], row[1]);
    if tau > 0.0 {
      if a > 0.0 && b > 0.0 {
        z1.push((a, b));
      }
      if a < 0.0 && b < 0.0 {
        z2.push((a, b));
      }
    } else {
      if a < 0.0 && b > 0.0 {
        z1.push((a, b));
      }
      if a > 0.0 && b < 0.0 {
        z2.push((a, b));
      }
    }
  }

  let quadrant_cor = |z: &[(f64, f64)]| {
    if z.len() < 2 {
      return 0.0;
    }
    let a: Array1<f64> = z.iter().map(|p| p.0).collect();
    let b: Array1<f64> = z.iter().map(|p| p.1).collect();
    let r = pearson(a.view(), b.view());
    if r.is_finite() {
      r
    } else {
      0.0
    }
  };
  (quadrant_cor(&z1), quadrant_cor(&z2))
}

/// Whether `family` rotated by `rotation` is compatible with the quadrant
/// correlations `c = (c1, c2)` and Kendall's `tau`.
pub fn preselect_family(c: (f64, f64), tau: f64, family: BicopFamily, rotation: u16) -> bool {
  let diff = c.0 - c.1;
  if family.is_rotationless() {
    return !(family == BicopFamily::Frank && diff.abs() > 0.3);
  }

  let positive_rotation = rotation == 0 || rotation == 180;
  let sign_matches = (tau > 0.0 && positive_rotation) || (tau < 0.0 && !positive_rotation);
  let is_90_or_180 = rotation == 90 || rotation == 180;
  let is_lt = BicopFamily::lt().contains(&family);
  let is_ut = BicopFamily::ut().contains(&family);

  if family.is_bb() && sign_matches {
    return true;
  }
  if diff > 0.05 {
    (is_lt && is_90_or_180) || (is_ut && !is_90_or_180)
  } else if diff < -0.05 {
    (is_lt && !is_90_or_180) || (is_ut && is_90_or_180)
  } else {
    sign_matches
  }
}

/// All (family, rotation) pairs to be fitted for data with Kendall's `tau`.
pub fn create_candidates(data: ArrayView2<f64>, tau: f64, controls: &FitControlsBicop) -> Vec<Bicop> {
  let c = if controls.preselect_families {
    Some(get_c1c2(data, tau))
  } else {
    None
  };

  let mut candidates = Vec::new();
  for family in controls.families() {
    let rotations: &[u16] = if family.is_rotationless() {
      &[0]
    } else if tau > 0.0 {
      &[0, 180]
    } else {
      &[90, 270]
    };
    for &rotation in rotations {
      if let Some(c) = c {
        if !preselect_family(c, tau, family, rotation) {
          continue;
        }
      }
      let mut bicop = Bicop::from_family(family);
      bicop.rotation = rotation;
      candidates.push(bicop);
    }
  }
  candidates
}

fn criterion(bicop: &Bicop, n: usize, controls: &FitControlsBicop) -> Result<f64, VineError> {
  let ll = bicop.get_loglik()?;
  let npars = bicop.get_npars();
  let score = match controls.selection_criterion {
    SelectionCriterion::Aic => -2.0 * ll + 2.0 * npars,
    SelectionCriterion::Bic => -2.0 * ll + (n as f64).ln() * npars,
    SelectionCriterion::Mbic => {
      let log_prior = if bicop.get_family() == BicopFamily::Indep {
        (1.0 - controls.psi0).ln()
      } else {
        controls.psi0.ln()
      };
      -2.0 * ll + (n as f64).ln() * npars - 2.0 * log_prior
    }
  };
  Ok(score)
}

/// Fits every candidate on `pool` and returns the one with the smallest criterion.
pub fn select_bicop(data: ArrayView2<f64>, controls: &FitControlsBicop, pool: &WorkerPool) -> Result<Bicop, VineError> {
  let n = data.nrows();
  if n == 0 {
    return Err(VineError::Validation("pair-copula selection needs at least one observation".into()));
  }
  if n < MIN_NOBS {
    let mut indep = Bicop::default();
    indep.set_fit_stats(0.0, n);
    return Ok(indep);
  }

  let tau = kendall_tau(data.column(0), data.column(1));
  let candidates = create_candidates(data, tau, controls);
  if candidates.is_empty() {
    return Err(VineError::Validation(
      "no candidate family left after preselection".into(),
    ));
  }

  let data: Array2<f64> = data.to_owned();
  let fitted = pool.map(candidates, |mut bicop| {
    let fit = bicop.fit(data.view(), controls);
    fit.and_then(|_| criterion(&bicop, n, controls)).map(|score| (bicop, score))
  })?;
  pick_best(fitted)
}

/// The candidate with the smallest score; failures are logged and skipped.
fn pick_best(fitted: Vec<Result<(Bicop, f64), VineError>>) -> Result<Bicop, VineError> {
  let mut best: Option<(Bicop, f64)> = None;
  let mut last_error = None;
  for result in fitted {
    match result {
      Ok((bicop, score)) => {
        if best.as_ref().map_or(true, |(_, s)| score < *s) {
          best = Some((bicop, score));
        }
      }
      Err(e) => {
        warn!(error = %e, "skipping pair-copula candidate");
        last_error = Some(e);
      }
    }
  }

  match (best, last_error) {
    (Some((bicop, _)), _) => Ok(bicop),
    (None, Some(e)) => Err(e),
    (None, None) => Err(VineError::Estimation(
      "Generic failure. no candidate could be fitted".into(),
    )),
  }
}

#[cfg(test)]
mod tests {
  use tracing_test::traced_test;

  use super::*;
  use crate::copulas::bivariate::controls::ParametricMethod;

  #[test]
  fn candidates_follow_the_sign_of_tau() {
    let controls = FitControlsBicop {
      preselect_families: false,
      ..Default::default()
    }
    .with_family_set(&[BicopFamily::Gaussian, BicopFamily::Clayton]);
    let data = Array2::from_shape_fn((20, 2), |(i, j)| (i as f64 + 0.5 + j as f64 * 0.1) / 21.0);

    let positive = create_candidates(data.view(), 0.4, &controls);
    let rotations: Vec<(BicopFamily, u16)> = positive.iter().map(|b| (b.get_family(), b.get_rotation())).collect();
    assert_eq!(
      rotations,
      vec![
        (BicopFamily::Gaussian, 0),
        (BicopFamily::Clayton, 0),
        (BicopFamily::Clayton, 180)
      ]
    );

    let negative = create_candidates(data.view(), -0.4, &controls);
    assert!(negative.iter().skip(1).all(|b| b.get_rotation() == 90 || b.get_rotation() == 270));
  }

  #[test]
  fn preselection_rules() {
    // stronger upper-tail correlation: Gumbel (0) yes, survival Gumbel (180) no
    assert!(preselect_family((0.5, 0.1), 0.4, BicopFamily::Gumbel, 0));
    assert!(!preselect_family((0.5, 0.1), 0.4, BicopFamily::Gumbel, 180));
    assert!(preselect_family((0.5, 0.1), 0.4, BicopFamily::Clayton, 180));
    assert!(!preselect_family((0.5, 0.1), 0.4, BicopFamily::Frank, 0));
    assert!(preselect_family((0.5, 0.1), 0.4, BicopFamily::Gaussian, 0));
    // symmetric tails fall back to the sign of tau
    assert!(preselect_family((0.3, 0.3), -0.2, BicopFamily::Joe, 90));
    assert!(!preselect_family((0.3, 0.3), 0.2, BicopFamily::Joe, 90));
    assert!(preselect_family((0.0, 0.5), 0.2, BicopFamily::Bb8, 0));
  }

  #[test]
  fn selects_the_generating_family() {
    let truth = Bicop::new(BicopFamily::Clayton, 0, &[3.0]).unwrap();
    let data = truth.simulate(1000, false, &[21]);
    let controls = FitControlsBicop {
      parametric_method: ParametricMethod::Itau,
      ..Default::default()
    }
    .with_family_set(&[BicopFamily::Indep, BicopFamily::Gaussian, BicopFamily::Clayton, BicopFamily::Gumbel]);

    let selected = select_bicop(data.view(), &controls, &WorkerPool::inline()).unwrap();
    assert_eq!(selected.get_family(), BicopFamily::Clayton);
    assert_eq!(selected.get_rotation(), 0);
    assert_eq!(selected.get_nobs(), 1000);
  }

  #[test]
  fn independent_data_selects_independence() {
    let data = crate::copulas::samples::simulate_uniform(500, 2, false, &[4]);
    let controls = FitControlsBicop {
      selection_criterion: SelectionCriterion::Bic,
      ..Default::default()
    }
    .with_family_set(&[BicopFamily::Indep, BicopFamily::Gaussian]);
    let selected = select_bicop(data.view(), &controls, &WorkerPool::new(3).unwrap()).unwrap();
    assert_eq!(selected.get_family(), BicopFamily::Indep);
  }

  #[test]
  fn tiny_samples_give_independence() {
    let truth = Bicop::new(BicopFamily::Gaussian, 0, &[0.9]).unwrap();
    let controls = FitControlsBicop::default();
    let pool = WorkerPool::inline();
    for n in [1, 5, MIN_NOBS - 1] {
      let data = truth.simulate(n, false, &[n as u64]);
      let selected = select_bicop(data.view(), &controls, &pool).unwrap();
      assert_eq!(selected.get_family(), BicopFamily::Indep);
      assert_eq!(selected.get_nobs(), n);
      assert_eq!(selected.get_loglik().unwrap(), 0.0);
    }

    let empty = Array2::<f64>::zeros((0, 2));
    assert!(matches!(
      select_bicop(empty.view(), &controls, &pool),
      Err(VineError::Validation(_))
    ));
  }

  #[traced_test]
  #[test]
  fn failing_candidates_are_logged_and_skipped() {
    let gaussian = Bicop::new(BicopFamily::Gaussian, 0, &[0.3]).unwrap();
    let fitted = vec![
      Err(VineError::Estimation("Generic failure. no convergence".into())),
      Ok((gaussian.clone(), 12.0)),
      Ok((Bicop::default(), 15.0)),
    ];
    assert_eq!(pick_best(fitted).unwrap(), gaussian);
    assert!(logs_contain("skipping pair-copula candidate"));

    let all_failed = vec![Err(VineError::Compatibility("rotation".into()))];
    assert!(matches!(pick_best(all_failed), Err(VineError::Compatibility(_))));
  }
}
