//! # Empirical
//!
//! $$
//! \hat U_{ij}=\frac{R_{ij}}{n+1},\qquad R_{ij}=\operatorname{rank}(X_{ij}\mid X_{1j},\dots,X_{nj})
//! $$
//!
use ndarray::Array1;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;

/// Smallest distance to the unit interval bounds used before quantile transforms.
pub const UNIT_EPS: f64 = 1e-10;

/// 1-based ranks, ties get their average rank.
pub fn ranks(values: ArrayView1<f64>) -> Array1<f64> {
  let n = values.len();
  let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
  indexed.sort_by(|a, b| a.1.total_cmp(&b.1));

  let mut ranks = Array1::<f64>::zeros(n);
  let mut i = 0usize;
  while i < n {
    let mut j = i;
    while j + 1 < n && indexed[j + 1].1 == indexed[i].1 {
      j += 1;
    }
    let avg_rank = (i + j) as f64 / 2.0 + 1.0;
    for k in i..=j {
      ranks[indexed[k].0] = avg_rank;
    }
    i = j + 1;
  }

  ranks
}

/// Column-wise pseudo-observations `rank / (n + 1)`, strictly inside (0, 1).
pub fn pseudo_obs(data: ArrayView2<f64>) -> Array2<f64> {
  let n = data.nrows() as f64;
  let mut u = Array2::<f64>::zeros(data.raw_dim());
  for (j, col) in data.axis_iter(Axis(1)).enumerate() {
    let r = ranks(col);
    u.column_mut(j).assign(&(r / (n + 1.0)));
  }
  u
}

/// Clamps to `[eps, 1 - eps]`.
pub fn trim_unit(x: f64) -> f64 {
  x.clamp(UNIT_EPS, 1.0 - UNIT_EPS)
}

/// Standard normal quantiles of (trimmed) uniform data.
pub fn normal_scores(u: ArrayView2<f64>) -> Array2<f64> {
  let normal = Normal::standard();
  u.mapv(|x| normal.inverse_cdf(trim_unit(x)))
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;

  use super::*;

  #[test]
  fn ranks_average_ties() {
    let r = ranks(array![3.0, 1.0, 3.0, 2.0].view());
    assert_eq!(r, array![3.5, 1.0, 3.5, 2.0]);
  }

  #[test]
  fn pseudo_obs_are_inside_unit_square() {
    let x = array![[10.0, -1.0], [20.0, -3.0], [15.0, -2.0]];
    let u = pseudo_obs(x.view());
    assert_eq!(u, array![[0.25, 0.75], [0.75, 0.25], [0.5, 0.5]]);
  }

  #[test]
  fn normal_scores_are_symmetric() {
    let z = normal_scores(array![[0.5, 0.975], [0.0, 1.0]].view());
    assert_abs_diff_eq!(z[[0, 0]], 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(z[[0, 1]], 1.959964, epsilon = 1e-5);
    assert!(z[[1, 0]].is_finite() && z[[1, 0]] < -6.0);
    assert_abs_diff_eq!(z[[1, 0]], -z[[1, 1]], epsilon = 1e-6);
  }
}
