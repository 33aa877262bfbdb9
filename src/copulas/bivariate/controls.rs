//! # Controls
//!
//! $$
//! \mathrm{mBIC}=-2\ell+\ln(n)\,p-2\left(I\ln\psi_0+(1-I)\ln(1-\psi_0)\right)
//! $$
//!
use std::fmt;
use std::str::FromStr;

use impl_new_derive::ImplNew;
use serde::Deserialize;
use serde::Serialize;

use super::BicopFamily;
use crate::error::VineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParametricMethod {
  #[default]
  Mle,
  Itau,
}

impl fmt::Display for ParametricMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ParametricMethod::Mle => write!(f, "mle"),
      ParametricMethod::Itau => write!(f, "itau"),
    }
  }
}

impl FromStr for ParametricMethod {
  type Err = VineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "mle" => Ok(ParametricMethod::Mle),
      "itau" => Ok(ParametricMethod::Itau),
      _ => Err(VineError::Validation(format!(
        "parametric method must be 'mle' or 'itau'; got '{s}'"
      ))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionCriterion {
  Aic,
  #[default]
  Bic,
  Mbic,
}

impl fmt::Display for SelectionCriterion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SelectionCriterion::Aic => write!(f, "aic"),
      SelectionCriterion::Bic => write!(f, "bic"),
      SelectionCriterion::Mbic => write!(f, "mbic"),
    }
  }
}

impl FromStr for SelectionCriterion {
  type Err = VineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "aic" => Ok(SelectionCriterion::Aic),
      "bic" => Ok(SelectionCriterion::Bic),
      "mbic" => Ok(SelectionCriterion::Mbic),
      _ => Err(VineError::Validation(format!(
        "selection criterion must be one of 'aic', 'bic', 'mbic'; got '{s}'"
      ))),
    }
  }
}

/// Settings for fitting and selecting a single pair-copula.
#[derive(ImplNew, Debug, Clone, PartialEq)]
pub struct FitControlsBicop {
  /// Candidate families; empty means all.
  pub family_set: Vec<BicopFamily>,
  pub parametric_method: ParametricMethod,
  pub selection_criterion: SelectionCriterion,
  /// Skip families that contradict the empirical tail asymmetry.
  pub preselect_families: bool,
  /// Prior probability of a non-independence copula, used by `mbic`.
  pub psi0: f64,
  pub num_threads: usize,
}

impl Default for FitControlsBicop {
  fn default() -> Self {
    Self {
      family_set: BicopFamily::all(),
      parametric_method: ParametricMethod::Mle,
      selection_criterion: SelectionCriterion::Bic,
      preselect_families: true,
      psi0: 0.9,
      num_threads: 1,
    }
  }
}

impl FitControlsBicop {
  pub fn with_family_set(mut self, family_set: &[BicopFamily]) -> Self {
    self.family_set = family_set.to_vec();
    self
  }

  /// The family set with the empty set expanded to all families.
  pub fn families(&self) -> Vec<BicopFamily> {
    if self.family_set.is_empty() {
      BicopFamily::all()
    } else {
      self.family_set.clone()
    }
  }

  pub fn check(&self) -> Result<(), VineError> {
    if !(self.psi0 > 0.0 && self.psi0 < 1.0) {
      return Err(VineError::Validation(format!(
        "psi0 must be in the interval (0, 1); got {}",
        self.psi0
      )));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_case_insensitively() {
    assert_eq!("ITAU".parse::<ParametricMethod>().unwrap(), ParametricMethod::Itau);
    assert_eq!("mBIC".parse::<SelectionCriterion>().unwrap(), SelectionCriterion::Mbic);
    assert!("loo".parse::<SelectionCriterion>().is_err());
    assert!("mom".parse::<ParametricMethod>().is_err());
  }

  #[test]
  fn psi0_must_be_a_probability() {
    let mut controls = FitControlsBicop::default();
    assert!(controls.check().is_ok());
    controls.psi0 = 1.0;
    assert!(matches!(controls.check(), Err(VineError::Validation(_))));
    controls.psi0 = 0.0;
    assert!(controls.check().is_err());
  }

  #[test]
  fn empty_family_set_means_all() {
    let controls = FitControlsBicop::new(
      vec![],
      ParametricMethod::Itau,
      SelectionCriterion::Aic,
      false,
      0.5,
      2,
    );
    assert_eq!(controls.families(), BicopFamily::all());
    let controls = controls.with_family_set(&[BicopFamily::Clayton]);
    assert_eq!(controls.families(), vec![BicopFamily::Clayton]);
  }
}
