//! # Correlation
//!
//! $$
//! \tau=\frac{n_c-n_d}{\sqrt{(n_0-n_1)(n_0-n_2)}},\qquad
//! \rho_S=\operatorname{cor}\left(R^X,R^Y\right)
//! $$
//!
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use ndarray::s;
use ndarray::stack;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use serde::Deserialize;
use serde::Serialize;

use super::empirical::normal_scores;
use super::empirical::ranks;
use crate::error::VineError;

/// Dependence measure used to weight candidate edges of a vine tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeCriterion {
  /// Absolute Kendall's tau.
  #[default]
  Tau,
  /// Absolute Spearman's rho.
  Rho,
  /// Hoeffding's D, scaled by 30 so that perfect dependence gives 1.
  Hoeffd,
  /// Mutual information of a Gaussian model on normal scores.
  Joe,
}

impl fmt::Display for TreeCriterion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      TreeCriterion::Tau => "tau",
      TreeCriterion::Rho => "rho",
      TreeCriterion::Hoeffd => "hoeffd",
      TreeCriterion::Joe => "joe",
    };
    write!(f, "{name}")
  }
}

impl FromStr for TreeCriterion {
  type Err = VineError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "tau" => Ok(TreeCriterion::Tau),
      "rho" => Ok(TreeCriterion::Rho),
      "hoeffd" => Ok(TreeCriterion::Hoeffd),
      "joe" => Ok(TreeCriterion::Joe),
      other => Err(VineError::Validation(format!(
        "tree criterion must be one of 'tau', 'rho', 'hoeffd', 'joe'; got '{other}'"
      ))),
    }
  }
}

/// Kendall's tau-b. Degenerate inputs (constant columns) give 0.
pub fn kendall_tau(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
  if x.len() < 2 {
    return 0.0;
  }

  let tau = kendalls::tau_b_with_comparator(&x.to_vec(), &y.to_vec(), |a: &f64, b: &f64| {
    a.partial_cmp(b).unwrap_or(Ordering::Greater)
  })
  .map(|(tau, _)| tau)
  .unwrap_or(0.0);

  if tau.is_finite() {
    tau
  } else {
    0.0
  }
}

/// Pearson's correlation. Degenerate inputs give 0.
pub fn pearson(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
  let n = x.len().min(y.len());
  if n < 2 {
    return 0.0;
  }

  let r = stack(Axis(0), &[x.slice(s![..n]), y.slice(s![..n])])
    .ok()
    .and_then(|obs| obs.pearson_correlation().ok())
    .map_or(f64::NAN, |corr| corr[[0, 1]]);
  if r.is_finite() {
    r.clamp(-1.0, 1.0)
  } else {
    0.0
  }
}

/// Spearman's rho: Pearson's correlation of average ranks.
pub fn spearman_rho(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
  let rx = ranks(x);
  let ry = ranks(y);
  pearson(rx.view(), ry.view())
}

/// Hoeffding's D statistic (unscaled, `30 * D` lies in `[-0.5, 1]`).
pub fn hoeffding_d(x: ArrayView1<f64>, y: ArrayView1<f64>) -> f64 {
  let n = x.len();
  if n < 5 {
    return 0.0;
  }

  let r = ranks(x);
  let s = ranks(y);

  let mut d1 = 0.0;
  let mut d2 = 0.0;
  let mut d3 = 0.0;
  for i in 0..n {
    // bivariate rank: 1 + number of points strictly south-west of point i
    let mut q = 1.0;
    for j in 0..n {
      if x[j] < x[i] && y[j] < y[i] {
        q += 1.0;
      }
    }
    d1 += (q - 1.0) * (q - 2.0);
    d2 += (r[i] - 1.0) * (r[i] - 2.0) * (s[i] - 1.0) * (s[i] - 2.0);
    d3 += (r[i] - 2.0) * (s[i] - 2.0) * (q - 1.0);
  }

  let n = n as f64;
  ((n - 2.0) * (n - 3.0) * d1 + d2 - 2.0 * (n - 2.0) * d3)
    / (n * (n - 1.0) * (n - 2.0) * (n - 3.0) * (n - 4.0))
}

/// Edge weight of a two-column data matrix under the given criterion.
///
/// Samples with at most ten observations carry no information and score 0.
pub fn pairwise_dependence(data: ArrayView2<f64>, criterion: TreeCriterion) -> f64 {
  if data.nrows() <= 10 {
    return 0.0;
  }

  let x = data.column(0);
  let y = data.column(1);
  match criterion {
    TreeCriterion::Tau => kendall_tau(x, y).abs(),
    TreeCriterion::Rho => spearman_rho(x, y).abs(),
    TreeCriterion::Hoeffd => 30.0 * hoeffding_d(x, y),
    TreeCriterion::Joe => {
      let z = normal_scores(data);
      let r = pearson(z.column(0), z.column(1)).clamp(-1.0 + 1e-12, 1.0 - 1e-12);
      -0.5 * (1.0 - r * r).ln()
    }
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_abs_diff_eq;
  use ndarray::array;
  use ndarray::Array1;
  use ndarray::Array2;
  use ndarray::Axis;
  use rand::rngs::StdRng;
  use rand::Rng;
  use rand::SeedableRng;

  use super::*;

  fn monotone(n: usize) -> (Array1<f64>, Array1<f64>) {
    let x = Array1::linspace(0.01, 0.99, n);
    let y = x.mapv(|v| v * v);
    (x, y)
  }

  #[test]
  fn perfect_dependence() {
    let (x, y) = monotone(50);
    assert_abs_diff_eq!(kendall_tau(x.view(), y.view()), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(spearman_rho(x.view(), y.view()), 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(30.0 * hoeffding_d(x.view(), y.view()), 1.0, epsilon = 1e-10);

    let neg = y.mapv(|v| -v);
    assert_abs_diff_eq!(kendall_tau(x.view(), neg.view()), -1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(spearman_rho(x.view(), neg.view()), -1.0, epsilon = 1e-12);
  }

  #[test]
  fn small_hand_computed_tau() {
    // pairs: (1,2) c, (1,3) c, (2,3) d -> (2 - 1) / 3
    let x = array![1.0, 2.0, 3.0];
    let y = array![1.0, 3.0, 2.0];
    assert_abs_diff_eq!(kendall_tau(x.view(), y.view()), 1.0 / 3.0, epsilon = 1e-12);
    assert_abs_diff_eq!(spearman_rho(x.view(), y.view()), 0.5, epsilon = 1e-12);
  }

  #[test]
  fn degenerate_inputs_score_zero() {
    let x = array![0.5, 0.5, 0.5, 0.5];
    let y = array![0.1, 0.2, 0.3, 0.4];
    assert_eq!(pearson(x.view(), y.view()), 0.0);
    assert_eq!(kendall_tau(array![1.0].view(), array![1.0].view()), 0.0);

    let small = Array2::<f64>::from_elem((10, 2), 0.3);
    assert_eq!(pairwise_dependence(small.view(), TreeCriterion::Tau), 0.0);
  }

  #[test]
  fn criteria_rank_strong_above_weak() {
    let (x, y) = monotone(200);
    let strong = ndarray::stack![Axis(1), x, y];
    // second column blurred by independent noise of twice the spread of x
    let mut rng = StdRng::seed_from_u64(7);
    let noisy = x.mapv(|v| v + 2.0 * rng.gen::<f64>());
    let weak = ndarray::stack![Axis(1), x, noisy];

    let tau_weak = pairwise_dependence(weak.view(), TreeCriterion::Tau);
    assert!(tau_weak > 0.05 && tau_weak < 0.9, "tau of the noisy sample: {tau_weak}");

    for crit in [
      TreeCriterion::Tau,
      TreeCriterion::Rho,
      TreeCriterion::Hoeffd,
      TreeCriterion::Joe,
    ] {
      let s = pairwise_dependence(strong.view(), crit);
      let w = pairwise_dependence(weak.view(), crit);
      assert!(s > w, "{crit}: {s} <= {w}");
    }
  }

  #[test]
  fn parses_criteria() {
    assert_eq!("hoeffd".parse::<TreeCriterion>().unwrap(), TreeCriterion::Hoeffd);
    assert_eq!(TreeCriterion::Joe.to_string(), "joe");
    assert!(matches!(
      "abc".parse::<TreeCriterion>(),
      Err(VineError::Validation(_))
    ));
  }
}
