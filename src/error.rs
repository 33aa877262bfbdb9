use thiserror::Error;

/// Errors raised by structure construction, fitting and evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VineError {
  /// Malformed input (structure matrix, controls, parameters or data range).
  #[error("validation error: {0}")]
  Validation(String),
  /// Data, structure and pair-copula store disagree on a dimension.
  #[error("dimension mismatch: {0}")]
  DimensionMismatch(String),
  /// A tree or edge index beyond the stored range.
  #[error("index out of range: {0}")]
  IndexOutOfRange(String),
  /// Evaluation requested on a model that was never fitted.
  #[error("model not fitted: {0}")]
  NotFitted(String),
  /// The optimizer or a numerical inversion failed.
  #[error("estimation failed: {0}")]
  Estimation(String),
  /// Family and rotation cannot represent the sign of dependence in the data.
  #[error("incompatible copula: {0}")]
  Compatibility(String),
  /// Work was submitted to a pool that was already joined.
  #[error("worker pool stopped: {0}")]
  PoolStopped(String),
  /// Malformed persisted representation.
  #[error("serialization error: {0}")]
  Serialization(String),
}

impl From<serde_json::Error> for VineError {
  fn from(err: serde_json::Error) -> Self {
    VineError::Serialization(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages_name_the_kind() {
    let err = VineError::DimensionMismatch("expected 3 columns, got 2".into());
    assert_eq!(
      err.to_string(),
      "dimension mismatch: expected 3 columns, got 2"
    );
    let err = VineError::PoolStopped("map called after join".into());
    assert!(err.to_string().starts_with("worker pool stopped"));
  }

  #[test]
  fn json_errors_convert() {
    let parsed: Result<Vec<f64>, _> = serde_json::from_str("[1.0,");
    let err: VineError = parsed.unwrap_err().into();
    assert!(matches!(err, VineError::Serialization(_)));
  }
}
