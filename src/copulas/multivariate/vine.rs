//! # Vine copula
//!
//! $$
//! c(u)=\prod_{t=0}^{k-1}\prod_{e=0}^{d-2-t}c_{t,e}\left(u_{\sigma_e|D_{t,e}},\,u_{m_{t,e}|D_{t,e}}\right)
//! $$
//!
//! Density, Rosenblatt transforms, simulation and information criteria of an
//! R-vine copula model, together with structure and family selection.
use std::fmt;

use ndarray::concatenate;
use ndarray::s;
use ndarray::Array;
use ndarray::Array1;
use ndarray::Array2;
use ndarray::Array3;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::RemoveAxis;
use prettytable::format;
use prettytable::row;
use prettytable::Table;
use tracing::debug;

use super::controls::FitControlsVinecop;
use super::selector::StructureSelector;
use super::structure::RVineStructure;
use super::triangular_array::TriangularArray;
use crate::copulas::bivariate::Bicop;
use crate::copulas::bivariate::BicopFamily;
use crate::copulas::correlation::pairwise_dependence;
use crate::copulas::samples::simulate_uniform;
use crate::error::VineError;
use crate::parallel::WorkerPool;
use crate::traits::MultivariateExt;

/// One pair-copula per (tree, edge) up to the truncation level.
pub type PairCopulaStore = TriangularArray<Bicop>;

/// Largest dimension for which the Monte Carlo cdf uses quasi-random numbers.
const CDF_QRNG_MAX_DIM: usize = 300;

/// Memory (bytes) above which inverse Rosenblatt halves the rows.
const INVERSE_ROSENBLATT_MAX_BYTES: f64 = 1e9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VineState {
  /// Placeholder model; no structure or pair-copulas were chosen yet.
  Unselected,
  /// Pair-copulas set by selection, by fitting or explicitly.
  Fitted,
  /// Fitted and then truncated at the given level.
  Truncated(usize),
}

#[derive(Debug, Clone)]
pub struct Vinecop {
  d: usize,
  structure: RVineStructure,
  pair_copulas: PairCopulaStore,
  threshold: f64,
  loglik: Option<f64>,
  nobs: usize,
  state: VineState,
}

impl Vinecop {
  /// An unselected `d`-dimensional model: a D-vine of independence copulas.
  pub fn new(d: usize) -> Result<Self, VineError> {
    let order: Vec<usize> = (1..=d).collect();
    let structure = RVineStructure::d_vine(&order, usize::MAX)?;
    let mut vine = Self::independence(structure)?;
    vine.state = VineState::Unselected;
    Ok(vine)
  }

  /// A model from a structure and matching pair-copulas.
  pub fn from_structure(structure: RVineStructure, pair_copulas: PairCopulaStore) -> Result<Self, VineError> {
    let d = structure.get_dim();
    if pair_copulas.dim() != d {
      return Err(VineError::DimensionMismatch(format!(
        "structure has dimension {d} but the pair-copula store has dimension {}",
        pair_copulas.dim()
      )));
    }
    if pair_copulas.trunc_lvl() != structure.get_trunc_lvl() {
      return Err(VineError::DimensionMismatch(format!(
        "structure is truncated at {} but the pair-copula store holds {} trees",
        structure.get_trunc_lvl(),
        pair_copulas.trunc_lvl()
      )));
    }

    Ok(Self {
      d,
      structure,
      pair_copulas,
      threshold: 0.0,
      loglik: None,
      nobs: 0,
      state: VineState::Fitted,
    })
  }

  /// All pair-copulas of `structure` set to independence.
  pub fn independence(structure: RVineStructure) -> Result<Self, VineError> {
    let store = PairCopulaStore::with_trunc(structure.get_dim(), structure.get_trunc_lvl());
    Self::from_structure(structure, store)
  }

  /// Selects structure and pair-copulas for `data` (pseudo-observations).
  pub fn from_data(data: ArrayView2<f64>, controls: &FitControlsVinecop) -> Result<Self, VineError> {
    let mut vine = Self::new(data.ncols())?;
    vine.select(data, controls)?;
    Ok(vine)
  }

  /// Selects a new structure together with its pair-copulas.
  pub fn select(&mut self, data: ArrayView2<f64>, controls: &FitControlsVinecop) -> Result<(), VineError> {
    self.check_data(data)?;
    check_nobs(data)?;
    debug!(d = self.d, n = data.nrows(), "selecting vine structure");
    let selected = WorkerPool::scoped(controls.num_threads(), |pool| {
      StructureSelector::new(data, controls, pool)?.select_all_trees()
    })?;

    self.structure = selected.structure;
    self.pair_copulas = selected.pair_copulas;
    self.threshold = selected.threshold;
    self.loglik = Some(selected.loglik);
    self.nobs = data.nrows();
    self.state = VineState::Fitted;
    debug!(trunc_lvl = self.get_trunc_lvl(), loglik = selected.loglik, "vine selected");
    Ok(())
  }

  /// Keeps the structure and selects (or only refits, if
  /// `controls.select_families` is false) the pair-copulas tree by tree.
  pub fn select_families(&mut self, data: ArrayView2<f64>, controls: &FitControlsVinecop) -> Result<(), VineError> {
    controls.check()?;
    self.check_data(data)?;
    check_nobs(data)?;
    WorkerPool::scoped(controls.num_threads(), |pool| self.select_families_in(data, controls, pool))
  }

  fn select_families_in(
    &mut self,
    data: ArrayView2<f64>,
    controls: &FitControlsVinecop,
    pool: &WorkerPool,
  ) -> Result<(), VineError> {
    let (n, d) = data.dim();
    let trunc_lvl = self.structure.get_trunc_lvl().min(controls.trunc_lvl);
    self.structure.truncate(trunc_lvl);
    self.pair_copulas.truncate(trunc_lvl);

    let inline = WorkerPool::inline();
    let order = self.structure.get_order().to_vec();
    let mut hfunc1 = Array2::<f64>::zeros((n, d));
    let mut hfunc2 = Array2::<f64>::zeros((n, d));
    for (j, &var) in order.iter().enumerate() {
      hfunc2.column_mut(j).assign(&data.column(var - 1));
    }

    for tree in 0..trunc_lvl {
      let edges: Vec<(usize, Array2<f64>)> = (0..d - 1 - tree)
        .map(|edge| (edge, self.edge_data(tree, edge, &hfunc1, &hfunc2)))
        .collect();

      let structure = &self.structure;
      let store = &self.pair_copulas;
      let edge_controls = controls.edge_controls(tree);
      let fitted = pool.try_map(edges, |(edge, u_e)| {
        let mut pc = store[(tree, edge)].clone();
        let crit = pairwise_dependence(u_e.view(), controls.tree_criterion);
        if crit < controls.threshold {
          pc = Bicop::default();
          pc.set_fit_stats(0.0, n);
        } else if controls.select_families {
          pc.select_in(u_e.view(), &edge_controls, &inline)?;
        } else {
          pc.fit(u_e.view(), &edge_controls)?;
        }
        let h1 = structure.needed_hfunc1(tree, edge).then(|| pc.hfunc1_raw(u_e.view()));
        let h2 = structure.needed_hfunc2(tree, edge).then(|| pc.hfunc2_raw(u_e.view()));
        Ok((edge, pc, h1, h2))
      })?;

      for (edge, pc, h1, h2) in fitted {
        if let Some(h1) = h1 {
          hfunc1.column_mut(edge).assign(&h1);
        }
        if let Some(h2) = h2 {
          hfunc2.column_mut(edge).assign(&h2);
        }
        self.pair_copulas[(tree, edge)] = pc;
      }
      debug!(tree, "pair-copulas selected");
    }

    self.threshold = controls.threshold;
    self.loglik = self.stored_loglik();
    self.nobs = n;
    self.state = VineState::Fitted;
    Ok(())
  }

  /// Drops all trees from `trunc_lvl` on. A no-op if already truncated below.
  pub fn truncate(&mut self, trunc_lvl: usize) {
    if trunc_lvl >= self.get_trunc_lvl() {
      return;
    }
    self.structure.truncate(trunc_lvl);
    self.pair_copulas.truncate(trunc_lvl);
    if self.state != VineState::Unselected {
      self.state = VineState::Truncated(trunc_lvl);
    }
    if self.loglik.is_some() {
      self.loglik = self.stored_loglik();
    }
  }

  /// Sum of the pair-copula logliks recorded at fit time.
  fn stored_loglik(&self) -> Option<f64> {
    self.pair_copulas.iter().map(|pc| pc.get_loglik().ok()).sum()
  }

  pub fn get_state(&self) -> VineState {
    self.state
  }

  pub fn get_dim(&self) -> usize {
    self.d
  }

  pub fn get_rvine_structure(&self) -> &RVineStructure {
    &self.structure
  }

  pub fn get_trunc_lvl(&self) -> usize {
    self.structure.get_trunc_lvl()
  }

  pub fn get_order(&self) -> &[usize] {
    self.structure.get_order()
  }

  pub fn get_matrix(&self) -> Array2<usize> {
    self.structure.get_matrix()
  }

  pub fn get_struct_array(&self, natural_order: bool) -> TriangularArray<usize> {
    self.structure.get_struct_array(natural_order)
  }

  pub fn get_threshold(&self) -> f64 {
    self.threshold
  }

  pub fn get_pair_copula(&self, tree: usize, edge: usize) -> Result<&Bicop, VineError> {
    self.pair_copulas.get(tree, edge).ok_or_else(|| {
      VineError::IndexOutOfRange(format!(
        "no pair-copula at tree {tree}, edge {edge} (d = {}, trunc_lvl = {})",
        self.d,
        self.get_trunc_lvl()
      ))
    })
  }

  pub fn get_family(&self, tree: usize, edge: usize) -> Result<BicopFamily, VineError> {
    Ok(self.get_pair_copula(tree, edge)?.get_family())
  }

  pub fn get_rotation(&self, tree: usize, edge: usize) -> Result<u16, VineError> {
    Ok(self.get_pair_copula(tree, edge)?.get_rotation())
  }

  pub fn get_parameters(&self, tree: usize, edge: usize) -> Result<Vec<f64>, VineError> {
    Ok(self.get_pair_copula(tree, edge)?.get_parameters().to_vec())
  }

  pub fn get_tau(&self, tree: usize, edge: usize) -> Result<f64, VineError> {
    Ok(self.get_pair_copula(tree, edge)?.get_tau())
  }

  pub fn get_all_pair_copulas(&self) -> &PairCopulaStore {
    &self.pair_copulas
  }

  pub fn get_all_families(&self) -> TriangularArray<BicopFamily> {
    self.pair_copulas.map(|pc| pc.get_family())
  }

  pub fn get_all_rotations(&self) -> TriangularArray<u16> {
    self.pair_copulas.map(|pc| pc.get_rotation())
  }

  pub fn get_all_parameters(&self) -> TriangularArray<Vec<f64>> {
    self.pair_copulas.map(|pc| pc.get_parameters().to_vec())
  }

  pub fn get_all_taus(&self) -> TriangularArray<f64> {
    self.pair_copulas.map(|pc| pc.get_tau())
  }

  /// Total number of parameters.
  pub fn get_npars(&self) -> f64 {
    self.pair_copulas.iter().map(|pc| pc.get_npars()).sum()
  }

  pub fn get_nobs(&self) -> usize {
    self.nobs
  }

  /// Log-likelihood recorded when the model was fitted to data.
  pub fn get_loglik(&self) -> Result<f64, VineError> {
    self.loglik.ok_or_else(|| {
      VineError::NotFitted("the vine copula was not fitted to data; loglik is unavailable".into())
    })
  }

  pub fn get_aic(&self) -> Result<f64, VineError> {
    Ok(-2.0 * self.get_loglik()? + 2.0 * self.get_npars())
  }

  pub fn get_bic(&self) -> Result<f64, VineError> {
    Ok(-2.0 * self.get_loglik()? + (self.nobs as f64).ln() * self.get_npars())
  }

  pub fn get_mbicv(&self, psi0: f64) -> Result<f64, VineError> {
    let loglik = self.get_loglik()?;
    self.mbicv_from_loglik(loglik, self.nobs, psi0)
  }

  pub(crate) fn set_fit_info(&mut self, threshold: f64, loglik: Option<f64>, nobs: usize) {
    self.threshold = threshold;
    self.loglik = loglik;
    self.nobs = nobs;
  }

  pub fn pdf(&self, u: ArrayView2<f64>, num_threads: usize) -> Result<Array1<f64>, VineError> {
    self.check_fitted()?;
    self.check_data(u)?;
    WorkerPool::scoped(num_threads, |pool| self.map_row_blocks(u, pool, |block| self.pdf_block(block)))
  }

  /// Monte Carlo estimate of the distribution function from `n_sim` draws.
  pub fn cdf(&self, u: ArrayView2<f64>, n_sim: usize, num_threads: usize, seeds: &[u64]) -> Result<Array1<f64>, VineError> {
    self.check_fitted()?;
    self.check_data(u)?;
    WorkerPool::scoped(num_threads, |pool| self.cdf_in(u, n_sim, seeds, pool))
  }

  fn cdf_in(&self, u: ArrayView2<f64>, n_sim: usize, seeds: &[u64], pool: &WorkerPool) -> Result<Array1<f64>, VineError> {
    let draws = simulate_uniform(n_sim, self.d, self.d <= CDF_QRNG_MAX_DIM, seeds);
    let sim = self.inverse_rosenblatt_in(draws.view(), pool)?;
    self.map_row_blocks(u, pool, |block| {
      block
        .rows()
        .into_iter()
        .map(|x| {
          let below = sim
            .rows()
            .into_iter()
            .filter(|s| s.iter().zip(x.iter()).all(|(a, b)| a <= b))
            .count();
          below as f64 / n_sim.max(1) as f64
        })
        .collect::<Array1<f64>>()
    })
  }

  /// `n` draws from the model by inverse Rosenblatt of independent uniforms.
  pub fn simulate(&self, n: usize, qrng: bool, num_threads: usize, seeds: &[u64]) -> Result<Array2<f64>, VineError> {
    self.check_fitted()?;
    let u = simulate_uniform(n, self.d, qrng, seeds);
    WorkerPool::scoped(num_threads, |pool| self.inverse_rosenblatt_in(u.view(), pool))
  }

  /// Maps the model's distribution to independent uniforms.
  pub fn rosenblatt(&self, u: ArrayView2<f64>, num_threads: usize) -> Result<Array2<f64>, VineError> {
    self.check_fitted()?;
    self.check_data(u)?;
    WorkerPool::scoped(num_threads, |pool| self.map_row_blocks(u, pool, |block| self.rosenblatt_block(block)))
  }

  /// Maps independent uniforms to the model's distribution.
  pub fn inverse_rosenblatt(&self, u: ArrayView2<f64>, num_threads: usize) -> Result<Array2<f64>, VineError> {
    self.check_fitted()?;
    self.check_data(u)?;
    WorkerPool::scoped(num_threads, |pool| self.inverse_rosenblatt_in(u, pool))
  }

  fn inverse_rosenblatt_in(&self, u: ArrayView2<f64>, pool: &WorkerPool) -> Result<Array2<f64>, VineError> {
    let parts = self.run_row_blocks(u, pool, |block| {
      self.inverse_rosenblatt_split(block, INVERSE_ROSENBLATT_MAX_BYTES)
    })?;
    let parts = parts.into_iter().collect::<Result<Vec<_>, _>>()?;
    stack_rows(parts, self.d)
  }

  pub fn loglik(&self, u: ArrayView2<f64>, num_threads: usize) -> Result<f64, VineError> {
    Ok(self.pdf(u, num_threads)?.mapv(f64::ln).sum())
  }

  pub fn aic(&self, u: ArrayView2<f64>, num_threads: usize) -> Result<f64, VineError> {
    Ok(-2.0 * self.loglik(u, num_threads)? + 2.0 * self.get_npars())
  }

  pub fn bic(&self, u: ArrayView2<f64>, num_threads: usize) -> Result<f64, VineError> {
    Ok(-2.0 * self.loglik(u, num_threads)? + (u.nrows() as f64).ln() * self.get_npars())
  }

  /// BIC with a sparsity prior: an edge of tree `t` is not independence with
  /// probability `psi0^(t + 1)`.
  pub fn mbicv(&self, u: ArrayView2<f64>, psi0: f64, num_threads: usize) -> Result<f64, VineError> {
    let loglik = self.loglik(u, num_threads)?;
    self.mbicv_from_loglik(loglik, u.nrows(), psi0)
  }

  fn mbicv_from_loglik(&self, loglik: f64, n: usize, psi0: f64) -> Result<f64, VineError> {
    if !(psi0 > 0.0 && psi0 < 1.0) {
      return Err(VineError::Validation(format!(
        "psi0 must be in the interval (0, 1); got {psi0}"
      )));
    }
    let mut log_prior = 0.0;
    for t in 0..self.d - 1 {
      let k = if t < self.get_trunc_lvl() {
        self
          .pair_copulas
          .row(t)
          .iter()
          .filter(|pc| pc.get_family() != BicopFamily::Indep)
          .count()
      } else {
        0
      };
      let psi = psi0.powi(t as i32 + 1);
      let m = self.d - 1 - t;
      log_prior += k as f64 * psi.ln() + (m - k) as f64 * (1.0 - psi).ln();
    }
    Ok(-2.0 * loglik + (n as f64).ln() * self.get_npars() - 2.0 * log_prior)
  }

  fn check_fitted(&self) -> Result<(), VineError> {
    if self.state == VineState::Unselected {
      return Err(VineError::NotFitted(
        "the vine copula has no selected structure; call select first".into(),
      ));
    }
    Ok(())
  }

  fn check_data(&self, u: ArrayView2<f64>) -> Result<(), VineError> {
    if u.ncols() != self.d {
      return Err(VineError::DimensionMismatch(format!(
        "data has {} columns but the model has dimension {}",
        u.ncols(),
        self.d
      )));
    }
    if let Some(bad) = u.iter().find(|x| !(0.0..=1.0).contains(*x)) {
      return Err(VineError::Validation(format!(
        "data must lie in [0, 1]; found {bad}"
      )));
    }
    Ok(())
  }

  /// Arguments of pair-copula `(tree, edge)` given the h-functions of the
  /// previous tree.
  fn edge_data(&self, tree: usize, edge: usize, hfunc1: &Array2<f64>, hfunc2: &Array2<f64>) -> Array2<f64> {
    let d = self.d;
    let m = self.structure.max_array(tree, edge);
    let mut u_e = Array2::<f64>::zeros((hfunc2.nrows(), 2));
    u_e.column_mut(0).assign(&hfunc2.column(edge));
    if m == self.structure.struct_array(tree, edge, true) {
      u_e.column_mut(1).assign(&hfunc2.column(d - m));
    } else {
      u_e.column_mut(1).assign(&hfunc1.column(d - m));
    }
    u_e
  }

  fn seed_hfunc2(&self, u: ArrayView2<f64>) -> Array2<f64> {
    let mut hfunc2 = Array2::<f64>::zeros(u.dim());
    for (j, &var) in self.structure.get_order().iter().enumerate() {
      hfunc2.column_mut(j).assign(&u.column(var - 1));
    }
    hfunc2
  }

  fn pdf_block(&self, u: ArrayView2<f64>) -> Array1<f64> {
    let d = self.d;
    let mut hfunc1 = Array2::<f64>::zeros(u.dim());
    let mut hfunc2 = self.seed_hfunc2(u);
    let mut pdf = Array1::<f64>::ones(u.nrows());

    for tree in 0..self.get_trunc_lvl() {
      for edge in 0..d - 1 - tree {
        let pc = &self.pair_copulas[(tree, edge)];
        let u_e = self.edge_data(tree, edge, &hfunc1, &hfunc2);
        pdf *= &pc.pdf_raw(u_e.view());
        if self.structure.needed_hfunc1(tree, edge) {
          hfunc1.column_mut(edge).assign(&pc.hfunc1_raw(u_e.view()));
        }
        if self.structure.needed_hfunc2(tree, edge) {
          hfunc2.column_mut(edge).assign(&pc.hfunc2_raw(u_e.view()));
        }
      }
    }
    pdf
  }

  fn rosenblatt_block(&self, u: ArrayView2<f64>) -> Array2<f64> {
    let d = self.d;
    let mut hfunc1 = Array2::<f64>::zeros(u.dim());
    let mut hfunc2 = self.seed_hfunc2(u);

    for tree in 0..self.get_trunc_lvl() {
      for edge in 0..d - 1 - tree {
        let pc = &self.pair_copulas[(tree, edge)];
        let u_e = self.edge_data(tree, edge, &hfunc1, &hfunc2);
        hfunc2.column_mut(edge).assign(&pc.hfunc2_raw(u_e.view()));
        if self.structure.needed_hfunc1(tree, edge) {
          hfunc1.column_mut(edge).assign(&pc.hfunc1_raw(u_e.view()));
        }
      }
    }

    let inverse_order = self.structure.get_inverse_order();
    let mut out = Array2::<f64>::zeros(u.dim());
    for (k, &col) in inverse_order.iter().enumerate() {
      out.column_mut(k).assign(&hfunc2.column(col));
    }
    out
  }

  /// Inverse Rosenblatt, halving the rows while the working memory estimate
  /// exceeds `max_bytes`.
  fn inverse_rosenblatt_split(&self, u: ArrayView2<f64>, max_bytes: f64) -> Result<Array2<f64>, VineError> {
    let (n, d) = (u.nrows() as f64, self.d as f64);
    let bytes = 16.0 * n * d * d + 8.0 * n * d + 16.0 * d * d;
    if bytes > max_bytes && u.nrows() > 1 {
      let half = u.nrows() / 2;
      let top = self.inverse_rosenblatt_split(u.slice(s![..half, ..]), max_bytes)?;
      let bottom = self.inverse_rosenblatt_split(u.slice(s![half.., ..]), max_bytes)?;
      return stack_rows(vec![top, bottom], self.d);
    }
    Ok(self.inverse_rosenblatt_block(u))
  }

  fn inverse_rosenblatt_block(&self, u: ArrayView2<f64>) -> Array2<f64> {
    let d = self.d;
    let n = u.nrows();
    let trunc_lvl = self.get_trunc_lvl();
    if trunc_lvl == 0 {
      return u.to_owned();
    }

    let order = self.structure.get_order();
    let mut hinv2 = Array3::<f64>::zeros((trunc_lvl + 1, d, n));
    let mut hfunc1 = Array3::<f64>::zeros((trunc_lvl + 1, d, n));
    for (j, &var) in order.iter().enumerate() {
      let tree = trunc_lvl.min(d - 1 - j);
      hinv2.slice_mut(s![tree, j, ..]).assign(&u.column(var - 1));
    }
    let last = hinv2.slice(s![0, d - 1, ..]).to_owned();
    hfunc1.slice_mut(s![0, d - 1, ..]).assign(&last);

    let mut u_e = Array2::<f64>::zeros((n, 2));
    for var in (0..d - 1).rev() {
      let tree_start = (trunc_lvl - 1).min(d - var - 2);
      for tree in (0..=tree_start).rev() {
        let pc = &self.pair_copulas[(tree, var)];
        let m = self.structure.max_array(tree, var);
        u_e.column_mut(0).assign(&hinv2.slice(s![tree + 1, var, ..]));
        if m == self.structure.struct_array(tree, var, true) {
          u_e.column_mut(1).assign(&hinv2.slice(s![tree, d - m, ..]));
        } else {
          u_e.column_mut(1).assign(&hfunc1.slice(s![tree, d - m, ..]));
        }

        let h = pc.hinv2_raw(u_e.view());
        hinv2.slice_mut(s![tree, var, ..]).assign(&h);
        if self.structure.needed_hfunc1(tree, var) {
          u_e.column_mut(0).assign(&h);
          hfunc1.slice_mut(s![tree + 1, var, ..]).assign(&pc.hfunc1_raw(u_e.view()));
        }
      }
    }

    let inverse_order = self.structure.get_inverse_order();
    let mut out = Array2::<f64>::zeros((n, d));
    for (k, &col) in inverse_order.iter().enumerate() {
      out.column_mut(k).assign(&hinv2.slice(s![0, col, ..]));
    }
    out
  }

  /// Splits the rows of `u` into one block per worker of `pool` and evaluates `f` on each.
  fn run_row_blocks<R, F>(&self, u: ArrayView2<f64>, pool: &WorkerPool, f: F) -> Result<Vec<R>, VineError>
  where
    R: Send,
    F: Fn(ArrayView2<f64>) -> R + Send + Sync,
  {
    let n = u.nrows();
    let blocks = pool.num_threads().clamp(1, n.max(1));
    let size = n.div_ceil(blocks).max(1);
    let ranges: Vec<(usize, usize)> = (0..n).step_by(size).map(|a| (a, (a + size).min(n))).collect();
    if ranges.is_empty() {
      return Ok(vec![f(u)]);
    }
    pool.map(ranges, |(a, b)| f(u.slice(s![a..b, ..])))
  }

  fn map_row_blocks<D, F>(&self, u: ArrayView2<f64>, pool: &WorkerPool, f: F) -> Result<Array<f64, D>, VineError>
  where
    D: RemoveAxis,
    F: Fn(ArrayView2<f64>) -> Array<f64, D> + Send + Sync,
  {
    let parts = self.run_row_blocks(u, pool, f)?;
    let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| VineError::DimensionMismatch(format!("cannot stack row blocks: {e}")))
  }
}

fn check_nobs(data: ArrayView2<f64>) -> Result<(), VineError> {
  if data.nrows() == 0 {
    return Err(VineError::Validation("selection needs at least one observation".into()));
  }
  Ok(())
}

fn stack_rows(parts: Vec<Array2<f64>>, d: usize) -> Result<Array2<f64>, VineError> {
  if parts.is_empty() {
    return Ok(Array2::zeros((0, d)));
  }
  let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
  concatenate(Axis(0), &views).map_err(|e| VineError::DimensionMismatch(format!("cannot stack row blocks: {e}")))
}

impl MultivariateExt for Vinecop {
  fn dim(&self) -> usize {
    self.d
  }

  fn sample(&self, n: usize) -> Result<Array2<f64>, VineError> {
    self.simulate(n, false, 1, &[])
  }

  fn fit(&mut self, X: ArrayView2<f64>) -> Result<(), VineError> {
    self.select(X, &FitControlsVinecop::default())
  }

  fn check_fit(&self, X: ArrayView2<f64>) -> Result<(), VineError> {
    self.check_fitted()?;
    self.check_data(X)
  }

  fn pdf(&self, X: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    Vinecop::pdf(self, X, 1)
  }

  fn cdf(&self, X: ArrayView2<f64>) -> Result<Array1<f64>, VineError> {
    Vinecop::cdf(self, X, 10_000, 1, &[])
  }
}

impl fmt::Display for Vinecop {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(
      f,
      "Vinecop model with {} variables (trunc_lvl = {}, npars = {})",
      self.d,
      self.get_trunc_lvl(),
      self.get_npars()
    )?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
    table.set_titles(row!["tree", "edge", "conditioned", "conditioning", "family", "rotation", "parameters", "tau"]);
    let order = self.structure.get_order();
    for tree in 0..self.get_trunc_lvl() {
      for edge in 0..self.d - 1 - tree {
        let pc = &self.pair_copulas[(tree, edge)];
        let conditioned = format!("{}, {}", order[edge], self.structure.struct_array(tree, edge, false));
        let conditioning: Vec<String> = (0..tree)
          .map(|t| self.structure.struct_array(t, edge, false).to_string())
          .collect();
        let parameters: Vec<String> = pc.get_parameters().iter().map(|p| format!("{p:.2}")).collect();
        table.add_row(row![
          tree + 1,
          edge + 1,
          conditioned,
          conditioning.join(", "),
          pc.get_family(),
          pc.get_rotation(),
          parameters.join(", "),
          format!("{:.2}", pc.get_tau())
        ]);
      }
    }
    write!(f, "{table}")
  }
}
