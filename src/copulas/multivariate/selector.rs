//! # Selector
//!
//! $$
//! \hat T_t=\arg\max_{T\ \text{spanning}}\sum_{(a,b)\in T}\mathrm{crit}\left(u_{a|D},u_{b|D}\right),\qquad t=0,\dots,d-2
//! $$
//!
//! Greedy tree-by-tree selection of an R-vine structure and its pair-copulas,
//! with optional automatic truncation and thresholding.
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::Hash;
use std::hash::Hasher;

use ndarray::Array2;
use ndarray::ArrayView2;
use tracing::debug;
use tracing::info;

use super::controls::FitControlsVinecop;
use super::structure::RVineStructure;
use super::tree::VineEdge;
use super::tree::VineTree;
use super::vine::PairCopulaStore;
use crate::copulas::bivariate::Bicop;
use crate::copulas::bivariate::BicopFamily;
use crate::copulas::correlation::pairwise_dependence;
use crate::error::VineError;
use crate::parallel::WorkerPool;

/// Fraction of thresholded criteria skipped when lowering the threshold.
const THRESHOLD_ALPHA: f64 = 0.05;

/// Result of a structure selection.
#[derive(Debug, Clone)]
pub struct SelectedVine {
  pub structure: RVineStructure,
  pub pair_copulas: PairCopulaStore,
  pub threshold: f64,
  pub loglik: f64,
}

pub struct StructureSelector<'a> {
  data: Array2<f64>,
  n: usize,
  d: usize,
  controls: FitControlsVinecop,
  pool: &'a WorkerPool,
  threshold: f64,
  trunc_lvl: usize,
  trees: Vec<VineTree>,
  trees_opt: Vec<VineTree>,
  trunc_lvl_opt: usize,
  threshold_opt: f64,
  thresholded_crits: Vec<f64>,
  previous_fits: HashMap<u64, Bicop>,
  current_fits: HashMap<u64, Bicop>,
}

impl<'a> StructureSelector<'a> {
  /// Every parallel stage of the selection runs on `pool`.
  pub fn new(data: ArrayView2<f64>, controls: &FitControlsVinecop, pool: &'a WorkerPool) -> Result<Self, VineError> {
    controls.check()?;
    let (n, d) = data.dim();
    if d < 2 {
      return Err(VineError::Validation(format!(
        "structure selection needs at least 2 variables; got {d}"
      )));
    }
    if n == 0 {
      return Err(VineError::Validation("structure selection needs at least one observation".into()));
    }

    Ok(Self {
      data: data.to_owned(),
      n,
      d,
      controls: controls.clone(),
      pool,
      threshold: controls.threshold,
      trunc_lvl: controls.trunc_lvl.min(d - 1),
      trees: vec![],
      trees_opt: vec![],
      trunc_lvl_opt: d - 1,
      threshold_opt: controls.threshold,
      thresholded_crits: vec![],
      previous_fits: HashMap::new(),
      current_fits: HashMap::new(),
    })
  }

  /// Runs the selection, repeating it with lower thresholds if requested, and
  /// assembles the best model.
  pub fn select_all_trees(mut self) -> Result<SelectedVine, VineError> {
    if self.controls.select_threshold {
      self.threshold = self.max_crit();
    }

    let mut mbicv_opt = f64::INFINITY;
    loop {
      self.trunc_lvl = self.controls.trunc_lvl.min(self.d - 1);
      self.thresholded_crits.clear();
      self.trees = vec![VineTree::base(self.data.view())];
      for t in 0..self.d - 1 {
        self.select_tree(t)?;
      }

      if !self.controls.select_threshold {
        self.keep_current();
        break;
      }

      let mbicv = self.get_mbicv();
      if self.controls.show_trace {
        info!(threshold = self.threshold, mbicv, "threshold iteration");
      }
      let improved = mbicv < mbicv_opt;
      if improved {
        mbicv_opt = mbicv;
        self.keep_current();
      }
      self.previous_fits = std::mem::take(&mut self.current_fits);

      if !improved || self.threshold <= 0.0 || self.thresholded_crits.is_empty() {
        break;
      }
      self.threshold = self.next_threshold();
    }

    self.finalize()
  }

  fn keep_current(&mut self) {
    self.trees_opt = std::mem::take(&mut self.trees);
    self.trunc_lvl_opt = self.trunc_lvl;
    self.threshold_opt = self.threshold;
  }

  /// Largest criterion among all pairs of variables.
  fn max_crit(&self) -> f64 {
    let mut max = 0.0f64;
    for i in 0..self.d {
      for j in 0..i {
        let mut pair = Array2::<f64>::zeros((self.n, 2));
        pair.column_mut(0).assign(&self.data.column(i));
        pair.column_mut(1).assign(&self.data.column(j));
        max = max.max(pairwise_dependence(pair.view(), self.controls.tree_criterion));
      }
    }
    max
  }

  /// The criterion at the `alpha` quantile (from above) of the thresholded edges.
  fn next_threshold(&self) -> f64 {
    let mut crits = self.thresholded_crits.clone();
    crits.sort_by(|a, b| b.total_cmp(a));
    let m = crits.len();
    let k = ((m as f64 * THRESHOLD_ALPHA).ceil() as usize).max(1) - 1;
    crits[k]
  }

  /// Builds tree `t` from tree `t - 1` (the base star for `t = 0`).
  fn select_tree(&mut self, t: usize) -> Result<(), VineError> {
    let prev = self
      .trees
      .last_mut()
      .ok_or_else(|| VineError::Validation("selection has no base tree".into()))?;
    let mut tree = VineTree::edges_as_vertices(prev);
    if tree.num_vertices() < 2 {
      return Ok(());
    }

    tree.add_allowed_edges(self.controls.tree_criterion, self.threshold, self.pool)?;
    tree.min_spanning_tree(self.controls.mst_algorithm)?;
    tree.add_edge_info();
    self.select_pair_copulas(&mut tree, t)?;

    let mbicv = self.get_mbicv_of_tree(&tree, t);
    debug!(tree = t, edges = tree.edges.len(), mbicv, "selected tree");
    if self.controls.select_trunc_lvl && t > 0 && t < self.trunc_lvl && mbicv >= 0.0 {
      self.trunc_lvl = t;
      set_independent(&mut tree, self.n);
      debug!(trunc_lvl = t, "truncating vine");
    }
    for edge in tree.edges.iter_mut() {
      edge.pc_data = Array2::zeros((0, 2));
    }

    if self.controls.show_trace {
      info!("** Tree: {t}");
      for edge in &tree.edges {
        info!("{}", describe_edge(edge));
      }
    }

    self.trees.push(tree);
    Ok(())
  }

  fn select_pair_copulas(&mut self, tree: &mut VineTree, t: usize) -> Result<(), VineError> {
    let edges = std::mem::take(&mut tree.edges);
    let controls = self.controls.edge_controls(t);
    let inline = WorkerPool::inline();
    let (threshold, trunc_lvl, n) = (self.threshold, self.trunc_lvl, self.n);
    let last_tree = t + 2 >= self.d;
    let previous_fits = &self.previous_fits;

    for edge in &edges {
      if edge.crit < threshold && t < trunc_lvl {
        self.thresholded_crits.push(edge.crit);
      }
    }

    let fitted = self.pool.try_map(edges, |mut edge| {
      edge.fit_id = fit_id(edge.pc_data.view());
      let pc = if edge.crit < threshold || t >= trunc_lvl {
        let mut pc = Bicop::default();
        pc.set_fit_stats(0.0, n);
        pc
      } else if let Some(prev) = previous_fits.get(&edge.fit_id) {
        prev.clone()
      } else {
        let mut pc = Bicop::default();
        pc.select_in(edge.pc_data.view(), &controls, &inline)?;
        pc
      };

      edge.loglik = pc.get_loglik()?;
      edge.npars = pc.get_npars();
      if !last_tree {
        edge.hfunc1 = Some(pc.hfunc1_raw(edge.pc_data.view()));
        edge.hfunc2 = Some(pc.hfunc2_raw(edge.pc_data.view()));
      }
      edge.pair_copula = pc;
      Ok(edge)
    })?;

    for edge in &fitted {
      if edge.pair_copula.get_family() != BicopFamily::Indep {
        self.current_fits.insert(edge.fit_id, edge.pair_copula.clone());
      }
    }
    tree.edges = fitted;
    Ok(())
  }

  fn get_mbicv_of_tree(&self, tree: &VineTree, t: usize) -> f64 {
    let loglik: f64 = tree.edges.iter().map(|e| e.loglik).sum();
    let npars: f64 = tree.edges.iter().map(|e| e.npars).sum();
    let k = tree.num_dependent() as f64;
    let m = tree.edges.len() as f64;
    let psi = self.controls.prior_policy.prior(self.controls.psi0(), t);
    -2.0 * loglik + (self.n as f64).ln() * npars - 2.0 * (k * psi.ln() + (m - k) * (1.0 - psi).ln())
  }

  fn get_mbicv(&self) -> f64 {
    self
      .trees
      .iter()
      .skip(1)
      .enumerate()
      .map(|(t, tree)| self.get_mbicv_of_tree(tree, t))
      .sum()
  }

  /// Reads the structure matrix and pair-copulas off the selected trees,
  /// column by column from the highest tree down.
  fn finalize(mut self) -> Result<SelectedVine, VineError> {
    let d = self.d;
    let loglik: f64 = self
      .trees_opt
      .iter()
      .flat_map(|tree| tree.edges.iter())
      .map(|e| e.loglik)
      .sum();

    let mut matrix = Array2::<usize>::zeros((d, d));
    let mut order = vec![0usize; d];
    let mut pair_copulas = PairCopulaStore::new(d);

    for col in 0..d - 1 {
      let t = d - 1 - col;
      let missing = || VineError::Validation(format!("no unused edge left in tree {} for column {col}", t - 1));

      let e0 = self.trees_opt[t]
        .edges
        .iter_mut()
        .find(|e| !e.used)
        .ok_or_else(missing)?;
      e0.used = true;
      order[col] = e0.conditioned[0];
      matrix[[t - 1, col]] = e0.conditioned[1];
      pair_copulas[(t - 1, col)] = e0.pair_copula.clone();
      let mut ning_set = e0.conditioning.clone();

      for k in 1..t {
        let mut check_set = vec![order[col]];
        check_set.extend(ning_set.iter().copied());
        check_set.sort_unstable();

        let edge = self.trees_opt[t - k].edges.iter_mut().find(|e| {
          let mut all = e.all_indices.clone();
          all.sort_unstable();
          !e.used && all == check_set
        });
        let Some(edge) = edge else {
          return Err(VineError::Validation(format!(
            "no edge of tree {} matches column {col}",
            t - k - 1
          )));
        };
        edge.used = true;

        let mut pc = edge.pair_copula.clone();
        if edge.conditioned[0] == order[col] {
          matrix[[t - k - 1, col]] = edge.conditioned[1];
        } else {
          matrix[[t - k - 1, col]] = edge.conditioned[0];
          pc.flip();
        }
        pair_copulas[(t - k - 1, col)] = pc;
        ning_set = edge.conditioning.clone();
      }
    }
    order[d - 1] = matrix[[0, d - 2]];

    // 1-based labels
    for t in 0..d - 1 {
      for e in 0..d - 1 - t {
        matrix[[t, e]] += 1;
      }
    }
    for (e, var) in order.iter().enumerate() {
      matrix[[d - 1 - e, e]] = var + 1;
    }

    let mut structure = RVineStructure::from_matrix(&matrix, false)?;
    structure.truncate(self.trunc_lvl_opt);
    pair_copulas.truncate(self.trunc_lvl_opt);

    Ok(SelectedVine {
      structure,
      pair_copulas,
      threshold: self.threshold_opt,
      loglik,
    })
  }
}

/// Replaces all pair-copulas of `tree` by independence.
fn set_independent(tree: &mut VineTree, n: usize) {
  for edge in tree.edges.iter_mut() {
    let mut pc = Bicop::default();
    pc.set_fit_stats(0.0, n);
    if edge.hfunc1.is_some() {
      edge.hfunc1 = Some(edge.pc_data.column(1).to_owned());
      edge.hfunc2 = Some(edge.pc_data.column(0).to_owned());
    }
    edge.pair_copula = pc;
    edge.loglik = 0.0;
    edge.npars = 0.0;
  }
}

/// Key of the fit caches of one selection run; never persisted.
fn fit_id(data: ArrayView2<f64>) -> u64 {
  let mut hasher = DefaultHasher::new();
  data.dim().hash(&mut hasher);
  for x in data.iter() {
    x.to_bits().hash(&mut hasher);
  }
  hasher.finish()
}

fn describe_edge(edge: &VineEdge) -> String {
  let cond: Vec<String> = edge.conditioned.iter().map(|v| (v + 1).to_string()).collect();
  let ning: Vec<String> = edge.conditioning.iter().map(|v| (v + 1).to_string()).collect();
  if ning.is_empty() {
    format!("{} <-> {}", cond.join(","), edge.pair_copula)
  } else {
    format!("{} ; {} <-> {}", cond.join(","), ning.join(","), edge.pair_copula)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::copulas::bivariate::controls::FitControlsBicop;
  use crate::copulas::correlation::TreeCriterion;
  use crate::copulas::multivariate::controls::MstAlgorithm;
  use crate::copulas::samples::simulate_uniform;

  fn gaussian_controls() -> FitControlsVinecop {
    FitControlsVinecop {
      bicop: FitControlsBicop::default().with_family_set(&[BicopFamily::Indep, BicopFamily::Gaussian]),
      ..Default::default()
    }
  }

  #[test]
  fn next_threshold_skips_the_top_five_percent() {
    let data = simulate_uniform(20, 3, false, &[1]);
    let pool = WorkerPool::inline();
    let mut selector = StructureSelector::new(data.view(), &gaussian_controls(), &pool).unwrap();
    selector.thresholded_crits = vec![0.1, 0.4, 0.3];
    assert_eq!(selector.next_threshold(), 0.4);
    selector.thresholded_crits = (1..=40).map(|i| i as f64 / 100.0).collect();
    assert_eq!(selector.next_threshold(), 0.39);
  }

  #[test]
  fn fit_id_identifies_data() {
    let a = simulate_uniform(30, 2, false, &[2]);
    let b = simulate_uniform(30, 2, false, &[3]);
    assert_eq!(fit_id(a.view()), fit_id(a.clone().view()));
    assert_ne!(fit_id(a.view()), fit_id(b.view()));
  }

  #[test]
  fn selected_structures_are_valid() {
    let data = simulate_uniform(60, 5, false, &[4]);
    let pool = WorkerPool::new(2).unwrap();
    for (criterion, algorithm) in [
      (TreeCriterion::Tau, MstAlgorithm::Prim),
      (TreeCriterion::Rho, MstAlgorithm::Kruskal),
      (TreeCriterion::Hoeffd, MstAlgorithm::Prim),
      (TreeCriterion::Joe, MstAlgorithm::Kruskal),
    ] {
      let controls = FitControlsVinecop {
        tree_criterion: criterion,
        mst_algorithm: algorithm,
        ..gaussian_controls()
      };
      let selected = StructureSelector::new(data.view(), &controls, &pool)
        .unwrap()
        .select_all_trees()
        .unwrap();
      assert_eq!(selected.structure.get_trunc_lvl(), 4);
      assert_eq!(selected.pair_copulas.trunc_lvl(), 4);
      RVineStructure::new(&selected.structure.get_matrix()).unwrap();
    }
  }

  #[test]
  fn fixed_truncation_and_threshold_give_independence() {
    let data = simulate_uniform(60, 4, false, &[5]);
    let pool = WorkerPool::inline();
    let controls = FitControlsVinecop {
      trunc_lvl: 1,
      ..gaussian_controls()
    };
    let selected = StructureSelector::new(data.view(), &controls, &pool).unwrap().select_all_trees().unwrap();
    assert_eq!(selected.structure.get_trunc_lvl(), 1);
    assert_eq!(selected.pair_copulas.rows().len(), 1);

    let controls = FitControlsVinecop {
      threshold: 1.0,
      ..gaussian_controls()
    };
    let selected = StructureSelector::new(data.view(), &controls, &pool).unwrap().select_all_trees().unwrap();
    assert!(selected.pair_copulas.iter().all(|pc| pc.get_family() == BicopFamily::Indep));
    assert_eq!(selected.loglik, 0.0);
  }

  #[test]
  fn one_variable_is_rejected() {
    let data = simulate_uniform(10, 1, false, &[6]);
    let pool = WorkerPool::inline();
    assert!(matches!(
      StructureSelector::new(data.view(), &gaussian_controls(), &pool),
      Err(VineError::Validation(_))
    ));
  }
}
