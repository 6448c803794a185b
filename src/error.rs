use std::error::Error as StdError;

use thiserror::Error;

/// Boxed error produced by a failed operation.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Terminal failure of a single tracked operation.
#[derive(Error, Debug)]
pub enum OperationError {
  #[error("Operation failed: {0}")]
  Failed(#[source] BoxError),

  #[error("Operation panicked")]
  Panicked,

  #[error("Operation was cancelled")]
  Cancelled,

  #[error("Operation outcome already taken")]
  ResultUnavailable,
}

impl OperationError {
  /// Wraps any error type as a `Failed` outcome.
  pub fn failed<E>(error: E) -> Self
  where
    E: Into<BoxError>,
  {
    OperationError::Failed(error.into())
  }
}

/// Errors raised by the coordinators themselves.
#[derive(Error, Debug)]
pub enum CoordinatorError {
  #[error("Coordinator is at capacity ({capacity}); drain before submitting")]
  CapacityExceeded { capacity: usize },

  #[error("Maximum capacity must be within 1..=65535, got {0}")]
  InvalidMaximumCapacity(usize),

  #[error("Capacity must be within 1..={maximum}, got {requested}")]
  InvalidCapacity { requested: usize, maximum: usize },

  #[error("Pipeline level must be within 0.0..=1.0, got {0}")]
  InvalidLevel(f64),

  #[error("Drain was cancelled; all tracked operations were abandoned")]
  DrainCancelled,

  #[error(transparent)]
  Operation(#[from] OperationError),
}

impl CoordinatorError {
  /// Returns `true` for both a cancelled drain and a cancelled operation.
  pub fn is_cancellation(&self) -> bool {
    matches!(
      self,
      CoordinatorError::DrainCancelled | CoordinatorError::Operation(OperationError::Cancelled)
    )
  }
}
