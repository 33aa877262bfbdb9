//! # Triangular array
//!
//! Ragged storage indexed by (tree, edge): row `t` holds the `d - 1 - t` edges of
//! tree `t`, and only the first `k` trees (the truncation level) are stored.
use std::fmt;
use std::ops::Index;
use std::ops::IndexMut;

use serde::Deserialize;
use serde::Serialize;

use crate::error::VineError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangularArray<T> {
  d: usize,
  trunc_lvl: usize,
  arr: Vec<Vec<T>>,
}

impl<T: Clone + Default> TriangularArray<T> {
  /// A full array (`d - 1` trees) filled with `T::default()`.
  pub fn new(d: usize) -> Self {
    Self::with_trunc(d, usize::MAX)
  }

  /// An array holding `trunc_lvl` trees; the level is clamped to `d - 1`.
  pub fn with_trunc(d: usize, trunc_lvl: usize) -> Self {
    let trunc_lvl = trunc_lvl.min(d.saturating_sub(1));
    let arr = (0..trunc_lvl).map(|t| vec![T::default(); d - 1 - t]).collect();
    Self { d, trunc_lvl, arr }
  }
}

impl<T> TriangularArray<T> {
  /// Builds from explicit rows. The dimension is the first row's length plus
  /// one, the truncation level is the number of rows.
  pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self, VineError> {
    let first = rows.first().ok_or_else(|| {
      VineError::Validation("cannot infer the dimension of a triangular array without rows".into())
    })?;
    let d = first.len() + 1;
    if rows.len() > d - 1 {
      return Err(VineError::Validation(format!(
        "a triangular array of dimension {d} has at most {} rows, got {}",
        d - 1,
        rows.len()
      )));
    }
    for (t, row) in rows.iter().enumerate() {
      if row.len() != d - 1 - t {
        return Err(VineError::Validation(format!(
          "row {t} of a triangular array of dimension {d} must have {} entries, got {}",
          d - 1 - t,
          row.len()
        )));
      }
    }

    Ok(Self {
      d,
      trunc_lvl: rows.len(),
      arr: rows,
    })
  }

  pub fn dim(&self) -> usize {
    self.d
  }

  pub fn trunc_lvl(&self) -> usize {
    self.trunc_lvl
  }

  pub fn get(&self, tree: usize, edge: usize) -> Option<&T> {
    self.arr.get(tree).and_then(|row| row.get(edge))
  }

  pub fn get_mut(&mut self, tree: usize, edge: usize) -> Option<&mut T> {
    self.arr.get_mut(tree).and_then(|row| row.get_mut(edge))
  }

  pub fn row(&self, tree: usize) -> &[T] {
    &self.arr[tree]
  }

  pub fn rows(&self) -> &[Vec<T>] {
    &self.arr
  }

  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.arr.iter().flatten()
  }

  /// Drops all trees from `trunc_lvl` on. A no-op if already at or below it.
  pub fn truncate(&mut self, trunc_lvl: usize) {
    if trunc_lvl < self.trunc_lvl {
      self.arr.truncate(trunc_lvl);
      self.trunc_lvl = trunc_lvl;
    }
  }

  pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> TriangularArray<U> {
    TriangularArray {
      d: self.d,
      trunc_lvl: self.trunc_lvl,
      arr: self.arr.iter().map(|row| row.iter().map(&mut f).collect()).collect(),
    }
  }
}

impl<T> Index<(usize, usize)> for TriangularArray<T> {
  type Output = T;

  fn index(&self, (tree, edge): (usize, usize)) -> &T {
    assert!(
      tree < self.trunc_lvl && edge < self.d - 1 - tree,
      "index ({tree}, {edge}) outside triangular array (d = {}, trunc_lvl = {})",
      self.d,
      self.trunc_lvl
    );
    &self.arr[tree][edge]
  }
}

impl<T> IndexMut<(usize, usize)> for TriangularArray<T> {
  fn index_mut(&mut self, (tree, edge): (usize, usize)) -> &mut T {
    assert!(
      tree < self.trunc_lvl && edge < self.d - 1 - tree,
      "index ({tree}, {edge}) outside triangular array (d = {}, trunc_lvl = {})",
      self.d,
      self.trunc_lvl
    );
    &mut self.arr[tree][edge]
  }
}

impl<T: fmt::Display> fmt::Display for TriangularArray<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for row in &self.arr {
      let line: Vec<String> = row.iter().map(|x| x.to_string()).collect();
      writeln!(f, "{}", line.join(" "))?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shape_and_clamping() {
    let a = TriangularArray::<usize>::with_trunc(5, 2);
    assert_eq!(a.dim(), 5);
    assert_eq!(a.trunc_lvl(), 2);
    assert_eq!(a.row(0).len(), 4);
    assert_eq!(a.row(1).len(), 3);

    let full = TriangularArray::<usize>::with_trunc(5, 10);
    assert_eq!(full.trunc_lvl(), 4);
    assert_eq!(full, TriangularArray::new(5));
    assert_eq!(full.row(3).len(), 1);
  }

  #[test]
  fn from_rows_checks_shape() {
    let a = TriangularArray::from_rows(vec![vec![1, 2, 3], vec![4, 5]]).unwrap();
    assert_eq!(a.dim(), 4);
    assert_eq!(a.trunc_lvl(), 2);
    assert_eq!(a[(1, 1)], 5);

    assert!(TriangularArray::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).is_err());
    assert!(TriangularArray::from_rows(vec![vec![1], vec![]]).is_err());
    assert!(TriangularArray::<usize>::from_rows(vec![]).is_err());
  }

  #[test]
  fn truncate_is_irreversible() {
    let mut a = TriangularArray::from_rows(vec![vec![1, 2, 3], vec![4, 5], vec![6]]).unwrap();
    a.truncate(5);
    assert_eq!(a.trunc_lvl(), 3);
    a.truncate(1);
    assert_eq!(a.trunc_lvl(), 1);
    assert_eq!(a.get(1, 0), None);
    a.truncate(2);
    assert_eq!(a.trunc_lvl(), 1);

    let b = TriangularArray::from_rows(vec![vec![1, 2, 3]]).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn write_and_render() {
    let mut a = TriangularArray::<usize>::new(3);
    a[(0, 0)] = 2;
    a[(0, 1)] = 1;
    a[(1, 0)] = 1;
    *a.get_mut(1, 0).unwrap() += 1;
    assert_eq!(a.to_string(), "2 1\n2\n");
    assert_eq!(a.map(|x| x * 10)[(0, 0)], 20);
  }

  #[test]
  #[should_panic]
  fn out_of_range_index_panics() {
    let a = TriangularArray::<usize>::with_trunc(4, 1);
    let _ = a[(1, 0)];
  }
}
