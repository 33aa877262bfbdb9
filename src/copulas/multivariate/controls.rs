//! # Controls
//!
//! $$
//! \mathrm{mBICV}=-2\ell+\ln(n)\,p-2\sum_{t}\left[k_t\ln\psi_0^{\,t+1}+(d-1-t-k_t)\ln\left(1-\psi_0^{\,t+1}\right)\right]
//! $$
//!
use std::fmt;
use std::str::FromStr;

use impl_new_derive::ImplNew;
use serde::Deserialize;
use serde::Serialize;

use crate::copulas::bivariate::controls::FitControlsBicop;
use crate::copulas::correlation::TreeCriterion;
use crate::error::VineError;

/// Spanning tree algorithm used in each level of structure selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MstAlgorithm {
  #[default]
  Prim,
  Kruskal,
}

impl fmt::Display for MstAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      MstAlgorithm::Prim => write!(f, "prim"),
      MstAlgorithm::Kruskal => write!(f, "kruskal"),
    }
  }
}

impl FromStr for MstAlgorithm {
  type Err = VineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "prim" => Ok(MstAlgorithm::Prim),
      "kruskal" => Ok(MstAlgorithm::Kruskal),
      _ => Err(VineError::Validation(format!(
        "mst algorithm must be 'prim' or 'kruskal'; got '{s}'"
      ))),
    }
  }
}

/// Prior probability that an edge of tree `t` is not independence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorPolicy {
  /// `psi0^(t + 1)`: deeper trees are sparser a priori.
  #[default]
  TreeDepth,
  /// `psi0` in every tree.
  Constant,
}

impl PriorPolicy {
  pub fn prior(&self, psi0: f64, tree: usize) -> f64 {
    match self {
      PriorPolicy::TreeDepth => psi0.powi(tree as i32 + 1),
      PriorPolicy::Constant => psi0,
    }
  }
}

impl FromStr for PriorPolicy {
  type Err = VineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "tree_depth" | "treedepth" => Ok(PriorPolicy::TreeDepth),
      "constant" => Ok(PriorPolicy::Constant),
      _ => Err(VineError::Validation(format!(
        "prior policy must be 'tree_depth' or 'constant'; got '{s}'"
      ))),
    }
  }
}

/// Settings for vine structure and pair-copula selection.
#[derive(ImplNew, Debug, Clone, PartialEq)]
pub struct FitControlsVinecop {
  pub bicop: FitControlsBicop,
  /// Trees from this level on are independence.
  pub trunc_lvl: usize,
  /// Edges with a criterion below the threshold are independence.
  pub threshold: f64,
  pub tree_criterion: TreeCriterion,
  pub select_trunc_lvl: bool,
  pub select_threshold: bool,
  /// Select families (`true`) or only refit the current ones (`false`).
  pub select_families: bool,
  pub show_trace: bool,
  pub mst_algorithm: MstAlgorithm,
  pub prior_policy: PriorPolicy,
}

impl Default for FitControlsVinecop {
  fn default() -> Self {
    Self {
      bicop: FitControlsBicop::default(),
      trunc_lvl: usize::MAX,
      threshold: 0.0,
      tree_criterion: TreeCriterion::Tau,
      select_trunc_lvl: false,
      select_threshold: false,
      select_families: true,
      show_trace: false,
      mst_algorithm: MstAlgorithm::Prim,
      prior_policy: PriorPolicy::TreeDepth,
    }
  }
}

impl FitControlsVinecop {
  pub fn check(&self) -> Result<(), VineError> {
    self.bicop.check()?;
    if !(0.0..=1.0).contains(&self.threshold) {
      return Err(VineError::Validation(format!(
        "threshold must be in the interval [0, 1]; got {}",
        self.threshold
      )));
    }
    Ok(())
  }

  pub fn num_threads(&self) -> usize {
    self.bicop.num_threads
  }

  pub fn psi0(&self) -> f64 {
    self.bicop.psi0
  }

  /// Controls for a single edge of `tree`. The mBIC prior follows
  /// `prior_policy`, and edges are already fitted in parallel.
  pub fn edge_controls(&self, tree: usize) -> FitControlsBicop {
    FitControlsBicop {
      num_threads: 1,
      psi0: self.prior_policy.prior(self.bicop.psi0, tree),
      ..self.bicop.clone()
    }
  }
}
