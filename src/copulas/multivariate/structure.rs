//! # R-vine structure
//!
//! $$
//! M=\begin{pmatrix}
//! m_{0,0} & m_{0,1} & \cdots & m_{0,d-2} & \sigma_{d-1}\\
//! \vdots & & ⋰ & ⋰ & 0\\
//! m_{d-2,0} & \sigma_1 & ⋰ & & \vdots\\
//! \sigma_0 & 0 & \cdots & & 0
//! \end{pmatrix}
//! $$
//!
//! Row `t` of the matrix describes tree `t`, column `e` describes edge `e`. The
//! antidiagonal read bottom-to-top is the variable order `σ`; edge `(t, e)` joins
//! `σ_e` and `m_{t,e}` given `m_{0,e}, ..., m_{t-1,e}`.
//!
//! Internally everything is relabelled to *natural order*, where `σ_e` becomes
//! `d - e`, so column `e` only contains labels smaller than `d - e`.
use std::collections::BTreeSet;
use std::fmt;

use ndarray::Array2;

use super::triangular_array::TriangularArray;
use crate::error::VineError;

#[derive(Debug, Clone, PartialEq)]
pub struct RVineStructure {
  d: usize,
  trunc_lvl: usize,
  order: Vec<usize>,
  struct_array: TriangularArray<usize>,
  max_array: TriangularArray<usize>,
  needed_hfunc1: TriangularArray<bool>,
  needed_hfunc2: TriangularArray<bool>,
}

impl RVineStructure {
  /// Validates an R-vine matrix and converts it to natural order.
  ///
  /// The truncation level is the number of leading rows with a nonzero entry
  /// above the antidiagonal.
  pub fn new(matrix: &Array2<usize>) -> Result<Self, VineError> {
    Self::from_matrix(matrix, true)
  }

  /// Like [`RVineStructure::new`], optionally skipping the validity checks.
  pub fn from_matrix(matrix: &Array2<usize>, check: bool) -> Result<Self, VineError> {
    let d = matrix.nrows();
    if matrix.ncols() != d {
      return Err(VineError::Validation(format!(
        "R-vine matrix must be square; got {} x {}",
        matrix.nrows(),
        matrix.ncols()
      )));
    }
    check_dim(d)?;

    let trunc_lvl = (0..d - 1)
      .find(|&t| (0..d - 1 - t).all(|e| matrix[[t, e]] == 0))
      .unwrap_or(d - 1);

    if check {
      check_lower_right(matrix)?;
      check_upper_left(matrix, trunc_lvl)?;
      check_antidiagonal(matrix)?;
    }

    let order: Vec<usize> = (0..d).map(|e| matrix[[d - 1 - e, e]]).collect();
    let natural = natural_labels(&order);
    let mut struct_array = TriangularArray::with_trunc(d, trunc_lvl);
    for t in 0..trunc_lvl {
      for e in 0..d - 1 - t {
        struct_array[(t, e)] = natural[matrix[[t, e]] - 1];
      }
    }

    Self::from_order_and_struct(order, struct_array, check)
  }

  /// Builds a structure from its order and its structure array in natural order.
  pub fn from_order_and_struct(
    order: Vec<usize>,
    struct_array: TriangularArray<usize>,
    check: bool,
  ) -> Result<Self, VineError> {
    let d = order.len();
    check_dim(d)?;
    check_order(&order)?;
    if struct_array.dim() != d {
      return Err(VineError::DimensionMismatch(format!(
        "order has {d} variables but the structure array has dimension {}",
        struct_array.dim()
      )));
    }

    let trunc_lvl = struct_array.trunc_lvl();
    let max_array = compute_max_array(&struct_array);
    if check {
      check_columns(&struct_array)?;
      check_proximity(&struct_array, &max_array)?;
    }
    let (needed_hfunc1, needed_hfunc2) = compute_needed_hfuncs(&struct_array, &max_array);

    Ok(Self {
      d,
      trunc_lvl,
      order,
      struct_array,
      max_array,
      needed_hfunc1,
      needed_hfunc2,
    })
  }

  /// The D-vine following `order`: every tree is a path.
  pub fn d_vine(order: &[usize], trunc_lvl: usize) -> Result<Self, VineError> {
    let d = order.len();
    check_dim(d)?;
    let mut struct_array = TriangularArray::with_trunc(d, trunc_lvl);
    for t in 0..struct_array.trunc_lvl() {
      for e in 0..d - 1 - t {
        struct_array[(t, e)] = d - e - t - 1;
      }
    }
    Self::from_order_and_struct(order.to_vec(), struct_array, false)
  }

  /// The C-vine following `order`: tree `t` is a star around `order[d - 1 - t]`.
  pub fn c_vine(order: &[usize], trunc_lvl: usize) -> Result<Self, VineError> {
    let d = order.len();
    check_dim(d)?;
    let mut struct_array = TriangularArray::with_trunc(d, trunc_lvl);
    for t in 0..struct_array.trunc_lvl() {
      for e in 0..d - 1 - t {
        struct_array[(t, e)] = t + 1;
      }
    }
    Self::from_order_and_struct(order.to_vec(), struct_array, false)
  }

  pub fn get_dim(&self) -> usize {
    self.d
  }

  pub fn get_trunc_lvl(&self) -> usize {
    self.trunc_lvl
  }

  pub fn get_order(&self) -> &[usize] {
    &self.order
  }

  /// `inverse_order[k]` is the column whose diagonal holds variable `k + 1`.
  pub fn get_inverse_order(&self) -> Vec<usize> {
    let mut inverse = vec![0; self.d];
    for (e, &var) in self.order.iter().enumerate() {
      inverse[var - 1] = e;
    }
    inverse
  }

  /// Entry `(tree, edge)` in natural or original labels.
  pub fn struct_array(&self, tree: usize, edge: usize, natural_order: bool) -> usize {
    let label = self.struct_array[(tree, edge)];
    if natural_order {
      label
    } else {
      self.order[self.d - label]
    }
  }

  pub fn get_struct_array(&self, natural_order: bool) -> TriangularArray<usize> {
    if natural_order {
      self.struct_array.clone()
    } else {
      self.struct_array.map(|&label| self.order[self.d - label])
    }
  }

  pub fn get_max_array(&self) -> &TriangularArray<usize> {
    &self.max_array
  }

  pub fn max_array(&self, tree: usize, edge: usize) -> usize {
    self.max_array[(tree, edge)]
  }

  pub fn get_needed_hfunc1(&self) -> &TriangularArray<bool> {
    &self.needed_hfunc1
  }

  pub fn get_needed_hfunc2(&self) -> &TriangularArray<bool> {
    &self.needed_hfunc2
  }

  pub fn needed_hfunc1(&self, tree: usize, edge: usize) -> bool {
    self.needed_hfunc1[(tree, edge)]
  }

  pub fn needed_hfunc2(&self, tree: usize, edge: usize) -> bool {
    self.needed_hfunc2[(tree, edge)]
  }

  /// The `d x d` R-vine matrix in the original labels.
  pub fn get_matrix(&self) -> Array2<usize> {
    self.matrix_with_labels(|label| self.order[self.d - label])
  }

  /// The `d x d` R-vine matrix relabelled so that the antidiagonal reads `d, ..., 1`.
  pub fn in_natural_order(&self) -> Array2<usize> {
    self.matrix_with_labels(|label| label)
  }

  fn matrix_with_labels<F: Fn(usize) -> usize>(&self, relabel: F) -> Array2<usize> {
    let d = self.d;
    let mut matrix = Array2::<usize>::zeros((d, d));
    for e in 0..d {
      matrix[[d - 1 - e, e]] = relabel(d - e);
    }
    for t in 0..self.trunc_lvl {
      for e in 0..d - 1 - t {
        matrix[[t, e]] = relabel(self.struct_array[(t, e)]);
      }
    }
    matrix
  }

  /// Drops all trees from `trunc_lvl` on. A no-op if already truncated below.
  pub fn truncate(&mut self, trunc_lvl: usize) {
    if trunc_lvl >= self.trunc_lvl {
      return;
    }
    self.struct_array.truncate(trunc_lvl);
    self.trunc_lvl = trunc_lvl;
    self.max_array = compute_max_array(&self.struct_array);
    let (h1, h2) = compute_needed_hfuncs(&self.struct_array, &self.max_array);
    self.needed_hfunc1 = h1;
    self.needed_hfunc2 = h2;
  }
}

impl fmt::Display for RVineStructure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for row in self.get_matrix().rows() {
      let line: Vec<String> = row.iter().map(|x| x.to_string()).collect();
      writeln!(f, "{}", line.join(" "))?;
    }
    Ok(())
  }
}

/// `natural[v - 1]` is the natural label of original variable `v`.
fn natural_labels(order: &[usize]) -> Vec<usize> {
  let d = order.len();
  let mut natural = vec![0; d];
  for (e, &var) in order.iter().enumerate() {
    natural[var - 1] = d - e;
  }
  natural
}

fn check_dim(d: usize) -> Result<(), VineError> {
  if d < 2 {
    return Err(VineError::Validation(format!(
      "an R-vine needs at least 2 variables; got {d}"
    )));
  }
  Ok(())
}

fn check_order(order: &[usize]) -> Result<(), VineError> {
  let d = order.len();
  let seen: BTreeSet<usize> = order.iter().copied().collect();
  if seen.len() != d || seen.iter().any(|&v| v == 0 || v > d) {
    return Err(VineError::Validation(format!(
      "the order must be a permutation of 1, ..., {d}; got {order:?}"
    )));
  }
  Ok(())
}

fn check_lower_right(matrix: &Array2<usize>) -> Result<(), VineError> {
  let d = matrix.nrows();
  for i in 0..d {
    for j in (d - i)..d {
      if matrix[[i, j]] != 0 {
        return Err(VineError::Validation(format!(
          "the lower right triangle must only contain zeros; found {} at ({i}, {j})",
          matrix[[i, j]]
        )));
      }
    }
  }
  Ok(())
}

fn check_upper_left(matrix: &Array2<usize>, trunc_lvl: usize) -> Result<(), VineError> {
  let d = matrix.nrows();
  for i in 0..d {
    for j in 0..(d - i) {
      let value = matrix[[i, j]];
      let on_antidiagonal = i + j == d - 1;
      if on_antidiagonal || i < trunc_lvl {
        if value == 0 || value > d {
          return Err(VineError::Validation(format!(
            "the upper left triangle can only contain numbers between 1 and {d}; found {value} at ({i}, {j})"
          )));
        }
      } else if value != 0 {
        return Err(VineError::Validation(format!(
          "rows below the truncation level {trunc_lvl} must be zero above the antidiagonal; found {value} at ({i}, {j})"
        )));
      }
    }
  }
  Ok(())
}

fn check_antidiagonal(matrix: &Array2<usize>) -> Result<(), VineError> {
  let d = matrix.nrows();
  let order: Vec<usize> = (0..d).map(|e| matrix[[d - 1 - e, e]]).collect();
  check_order(&order).map_err(|_| {
    VineError::Validation(format!(
      "the antidiagonal must contain the numbers 1, ..., {d} exactly once; got {order:?}"
    ))
  })
}

/// In natural order, column `e` holds distinct labels below its diagonal `d - e`.
fn check_columns(struct_array: &TriangularArray<usize>) -> Result<(), VineError> {
  let d = struct_array.dim();
  for e in 0..d - 1 {
    let rows = struct_array.trunc_lvl().min(d - 1 - e);
    let mut seen = BTreeSet::new();
    for t in 0..rows {
      let label = struct_array[(t, e)];
      if label == 0 || label >= d - e || !seen.insert(label) {
        return Err(VineError::Validation(format!(
          "column {e} must contain distinct variables preceding its diagonal entry in the order; \
           found natural label {label} in tree {t} (diagonal {})",
          d - e
        )));
      }
    }
  }
  Ok(())
}

/// Every edge of tree `t >= 1` must join two edges of tree `t - 1`.
fn check_proximity(
  struct_array: &TriangularArray<usize>,
  max_array: &TriangularArray<usize>,
) -> Result<(), VineError> {
  let d = struct_array.dim();
  for t in 1..struct_array.trunc_lvl() {
    for e in 0..d - 1 - t {
      let m = max_array[(t, e)];
      let target: BTreeSet<usize> = (0..=t).map(|k| struct_array[(k, e)]).collect();
      let mut partner: BTreeSet<usize> = (0..t).map(|k| struct_array[(k, d - m)]).collect();
      partner.insert(m);
      if target != partner {
        return Err(VineError::Validation(format!(
          "the proximity condition is violated at tree {t}, edge {e}: \
           no edge in tree {} joins the variables {target:?}",
          t - 1
        )));
      }
    }
  }
  Ok(())
}

fn compute_max_array(struct_array: &TriangularArray<usize>) -> TriangularArray<usize> {
  let d = struct_array.dim();
  let mut max_array = struct_array.clone();
  for t in 1..struct_array.trunc_lvl() {
    for e in 0..d - 1 - t {
      max_array[(t, e)] = max_array[(t, e)].max(max_array[(t - 1, e)]);
    }
  }
  max_array
}

fn compute_needed_hfuncs(
  struct_array: &TriangularArray<usize>,
  max_array: &TriangularArray<usize>,
) -> (TriangularArray<bool>, TriangularArray<bool>) {
  let d = struct_array.dim();
  let trunc_lvl = struct_array.trunc_lvl();
  let mut needed_hfunc1 = TriangularArray::with_trunc(d, trunc_lvl);
  let mut needed_hfunc2 = TriangularArray::with_trunc(d, trunc_lvl);

  for t in 0..trunc_lvl.saturating_sub(1).min(d - 2) {
    for e in 0..d - 2 - t {
      needed_hfunc2[(t, e)] = true;
      let m = max_array[(t + 1, e)];
      if struct_array[(t + 1, e)] == m {
        needed_hfunc2[(t, d - m)] = true;
      } else {
        needed_hfunc1[(t, d - m)] = true;
      }
    }
  }

  (needed_hfunc1, needed_hfunc2)
}
