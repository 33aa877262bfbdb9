//! # Tree
//!
//! $$
//! T_{t+1}=\operatorname{MST}\left(\{(a,b)\in E_t\times E_t:\ |a\cap b|=1\},\ w=1-\mathrm{crit}\right)
//! $$
//!
//! Arena of one level of the selection graph. Vertices are the edges of the
//! previous level; candidate edges join vertices whose previous edges share a
//! vertex, and a minimum spanning tree over `1 - crit` keeps `n - 1` of them.
use std::collections::BTreeSet;

use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView2;

use super::controls::MstAlgorithm;
use crate::copulas::bivariate::Bicop;
use crate::copulas::bivariate::BicopFamily;
use crate::copulas::correlation::pairwise_dependence;
use crate::copulas::correlation::TreeCriterion;
use crate::error::VineError;
use crate::parallel::WorkerPool;

#[derive(Debug, Clone, Default)]
pub struct VineVertex {
  pub conditioned: Vec<usize>,
  pub conditioning: Vec<usize>,
  pub all_indices: Vec<usize>,
  /// Endpoints of the previous-level edge this vertex stands for.
  pub prev_edge_indices: (usize, usize),
  pub hfunc1: Option<Array1<f64>>,
  pub hfunc2: Option<Array1<f64>>,
}

#[derive(Debug, Clone)]
pub struct VineEdge {
  pub source: usize,
  pub target: usize,
  pub conditioned: Vec<usize>,
  pub conditioning: Vec<usize>,
  pub all_indices: Vec<usize>,
  pub pc_data: Array2<f64>,
  pub hfunc1: Option<Array1<f64>>,
  pub hfunc2: Option<Array1<f64>>,
  pub crit: f64,
  pub weight: f64,
  pub pair_copula: Bicop,
  pub fit_id: u64,
  pub loglik: f64,
  pub npars: f64,
  /// Set once the edge has been placed in the structure matrix.
  pub used: bool,
}

impl VineEdge {
  fn new(source: usize, target: usize) -> Self {
    Self {
      source,
      target,
      conditioned: vec![],
      conditioning: vec![],
      all_indices: vec![],
      pc_data: Array2::zeros((0, 2)),
      hfunc1: None,
      hfunc2: None,
      crit: 0.0,
      weight: 1.0,
      pair_copula: Bicop::default(),
      fit_id: 0,
      loglik: 0.0,
      npars: 0.0,
      used: false,
    }
  }
}

#[derive(Debug, Clone, Default)]
pub struct VineTree {
  pub vertices: Vec<VineVertex>,
  pub edges: Vec<VineEdge>,
}

impl VineTree {
  /// A star with root `d` whose edge `e` carries data column `e`; turning its
  /// edges into vertices gives the vertex set of the first tree.
  pub fn base(data: ArrayView2<f64>) -> Self {
    let d = data.ncols();
    let vertices = vec![VineVertex::default(); d + 1];
    let edges = (0..d)
      .map(|target| {
        let mut edge = VineEdge::new(d, target);
        edge.hfunc1 = Some(data.column(target).to_owned());
        edge.conditioned = vec![target];
        edge.all_indices = vec![target];
        edge
      })
      .collect();
    Self { vertices, edges }
  }

  /// Every edge of `prev` becomes a vertex; h-function columns are moved over.
  pub fn edges_as_vertices(prev: &mut VineTree) -> Self {
    let vertices = prev
      .edges
      .iter_mut()
      .map(|e| VineVertex {
        conditioned: e.conditioned.clone(),
        conditioning: e.conditioning.clone(),
        all_indices: e.all_indices.clone(),
        prev_edge_indices: (e.source, e.target),
        hfunc1: e.hfunc1.take(),
        hfunc2: e.hfunc2.take(),
      })
      .collect();
    Self {
      vertices,
      edges: vec![],
    }
  }

  pub fn num_vertices(&self) -> usize {
    self.vertices.len()
  }

  /// The previous-level vertex shared by the edges behind `v0` and `v1`.
  pub fn find_common_neighbor(&self, v0: usize, v1: usize) -> Option<usize> {
    let (a0, a1) = self.vertices[v0].prev_edge_indices;
    let (b0, b1) = self.vertices[v1].prev_edge_indices;
    [a0, a1].into_iter().find(|&a| a == b0 || a == b1)
  }

  /// Pseudo-observations of the pair `(v0, v1)` conditional on the common
  /// neighbour: a vertex contributes its first h-function when the neighbour is
  /// its first endpoint, else its second.
  pub fn pc_data(&self, v0: usize, v1: usize) -> Result<Array2<f64>, VineError> {
    let common = self.find_common_neighbor(v0, v1).ok_or_else(|| {
      VineError::Validation(format!(
        "vertices {v0} and {v1} violate the proximity condition"
      ))
    })?;

    let column = |v: usize| -> Result<&Array1<f64>, VineError> {
      let vertex = &self.vertices[v];
      let h = if vertex.prev_edge_indices.0 == common {
        vertex.hfunc1.as_ref()
      } else {
        vertex.hfunc2.as_ref()
      };
      h.ok_or_else(|| VineError::Validation(format!("vertex {v} carries no h-function values")))
    };
    let (c0, c1) = (column(v0)?, column(v1)?);

    let mut data = Array2::<f64>::zeros((c0.len(), 2));
    data.column_mut(0).assign(c0);
    data.column_mut(1).assign(c1);
    Ok(data)
  }

  /// Adds every pair allowed by the proximity condition together with its
  /// pseudo-observations, criterion and weight.
  pub fn add_allowed_edges(
    &mut self,
    criterion: TreeCriterion,
    threshold: f64,
    pool: &WorkerPool,
  ) -> Result<(), VineError> {
    let n = self.num_vertices();
    let mut pairs = Vec::new();
    for v0 in 0..n {
      for v1 in 0..v0 {
        if self.find_common_neighbor(v0, v1).is_some() {
          pairs.push((v0, v1));
        }
      }
    }

    let this = &*self;
    let candidates = pool.try_map(pairs, |(v0, v1)| {
      let data = this.pc_data(v0, v1)?;
      let crit = pairwise_dependence(data.view(), criterion);
      Ok((v0, v1, data, crit))
    })?;

    self.edges = candidates
      .into_iter()
      .map(|(v0, v1, data, crit)| {
        let mut edge = VineEdge::new(v0, v1);
        edge.weight = 1.0 - if crit >= threshold { crit } else { 0.0 };
        edge.crit = crit;
        edge.pc_data = data;
        edge
      })
      .collect();
    Ok(())
  }

  /// Keeps only the edges of a minimum spanning tree; the survivors keep their
  /// candidate order and orientation.
  pub fn min_spanning_tree(&mut self, algorithm: MstAlgorithm) -> Result<(), VineError> {
    let weights: Vec<(usize, usize, f64)> = self
      .edges
      .iter()
      .map(|e| (e.source, e.target, e.weight))
      .collect();
    let keep = match algorithm {
      MstAlgorithm::Prim => prim(self.num_vertices(), &weights)?,
      MstAlgorithm::Kruskal => kruskal(self.num_vertices(), &weights)?,
    };
    let mut i = 0;
    self.edges.retain(|_| {
      let k = keep[i];
      i += 1;
      k
    });
    Ok(())
  }

  /// Conditioned set (symmetric difference, source side first), conditioning set
  /// (intersection) and their concatenation for every edge.
  pub fn add_edge_info(&mut self) {
    for edge in self.edges.iter_mut() {
      let l0 = &self.vertices[edge.source].all_indices;
      let l1 = &self.vertices[edge.target].all_indices;
      let s1: BTreeSet<usize> = l1.iter().copied().collect();
      let s0: BTreeSet<usize> = l0.iter().copied().collect();

      let mut conditioned: Vec<usize> = l0.iter().copied().filter(|i| !s1.contains(i)).collect();
      conditioned.extend(l1.iter().copied().filter(|i| !s0.contains(i)));
      let conditioning: Vec<usize> = l0.iter().copied().filter(|i| s1.contains(i)).collect();

      edge.all_indices = conditioned.iter().chain(conditioning.iter()).copied().collect();
      edge.conditioned = conditioned;
      edge.conditioning = conditioning;
    }
  }

  /// Number of edges that are not independence.
  pub fn num_dependent(&self) -> usize {
    self
      .edges
      .iter()
      .filter(|e| e.pair_copula.get_family() != BicopFamily::Indep)
      .count()
  }
}

/// Prim's algorithm from vertex 0 on a sparse candidate list; returns which
/// candidates belong to the tree. Ties go to the lowest vertex index.
pub fn prim(n: usize, edges: &[(usize, usize, f64)]) -> Result<Vec<bool>, VineError> {
  let mut keep = vec![false; edges.len()];
  if n < 2 {
    return Ok(keep);
  }

  let mut w = Array2::<f64>::from_elem((n, n), f64::INFINITY);
  let mut index = Array2::<usize>::from_elem((n, n), usize::MAX);
  for (k, &(a, b, weight)) in edges.iter().enumerate() {
    w[[a, b]] = weight;
    w[[b, a]] = weight;
    index[[a, b]] = k;
    index[[b, a]] = k;
  }

  let mut in_tree = vec![false; n];
  let mut best_w = vec![f64::INFINITY; n];
  let mut parent: Vec<Option<usize>> = vec![None; n];

  in_tree[0] = true;
  for j in 1..n {
    best_w[j] = w[[0, j]];
    parent[j] = Some(0);
  }

  for _ in 0..(n - 1) {
    // pick min weight outside tree
    let mut best = f64::INFINITY;
    let mut v = None;
    for j in 0..n {
      if !in_tree[j] && best_w[j] < best {
        best = best_w[j];
        v = Some(j);
      }
    }
    let v = v.ok_or_else(|| VineError::Validation("candidate graph is not connected".into()))?;
    let p = parent[v].ok_or_else(|| VineError::Validation("candidate graph is not connected".into()))?;
    in_tree[v] = true;
    keep[index[[p, v]]] = true;

    // update best_w
    for k in 0..n {
      if !in_tree[k] && w[[v, k]] < best_w[k] {
        best_w[k] = w[[v, k]];
        parent[k] = Some(v);
      }
    }
  }

  Ok(keep)
}

/// Kruskal's algorithm; candidates with equal weight are taken in list order.
pub fn kruskal(n: usize, edges: &[(usize, usize, f64)]) -> Result<Vec<bool>, VineError> {
  let mut keep = vec![false; edges.len()];
  let mut sorted: Vec<usize> = (0..edges.len()).collect();
  sorted.sort_by(|&a, &b| edges[a].2.total_cmp(&edges[b].2));

  let mut root: Vec<usize> = (0..n).collect();
  fn find(root: &mut [usize], mut x: usize) -> usize {
    while root[x] != x {
      root[x] = root[root[x]];
      x = root[x];
    }
    x
  }

  let mut added = 0;
  for k in sorted {
    let (a, b, _) = edges[k];
    let (ra, rb) = (find(&mut root, a), find(&mut root, b));
    if ra != rb {
      root[ra] = rb;
      keep[k] = true;
      added += 1;
    }
  }

  if n > 0 && added != n - 1 {
    return Err(VineError::Validation("candidate graph is not connected".into()));
  }
  Ok(keep)
}
