use crate::error::OperationError;

use std::task::{Context, Poll};

use futures::future::poll_fn;

/// An already-started asynchronous operation, as seen by a coordinator.
///
/// Coordinators never start or schedule work; they only observe it. An
/// implementation must therefore represent work that progresses on its own
/// (a spawned task, an I/O request in flight, a job on another pool), so that
/// [`is_completed`](Operation::is_completed) can flip without being polled.
pub trait Operation: Send {
  type Output: Send;

  /// Non-blocking, side-effect-free check for a terminal state.
  fn is_completed(&self) -> bool;

  /// Resolves once the operation is terminal, keeping its outcome for a later
  /// [`poll_outcome`](Operation::poll_outcome). After it returns `Ready`,
  /// `is_completed` must return `true`.
  fn poll_settled(&mut self, cx: &mut Context<'_>) -> Poll<()>;

  /// Resolves with the outcome, taking it out of the operation.
  fn poll_outcome(&mut self, cx: &mut Context<'_>) -> Poll<Result<Self::Output, OperationError>>;

  /// Requests cancellation of the underlying work, if supported.
  fn abort(&self) {}
}

/// Waits for `operation` to become terminal without taking its outcome.
pub async fn settled<O: Operation + ?Sized>(operation: &mut O) {
  poll_fn(|cx| operation.poll_settled(cx)).await
}

/// Waits for `operation` and takes its outcome.
pub async fn outcome<O: Operation + ?Sized>(operation: &mut O) -> Result<O::Output, OperationError> {
  poll_fn(|cx| operation.poll_outcome(cx)).await
}

/// Coarse classification of an operation outcome, used in log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
  Success,
  Failed,
  Panicked,
  Cancelled,
}

impl<R> From<&Result<R, OperationError>> for OperationStatus {
  fn from(result: &Result<R, OperationError>) -> Self {
    match result {
      Ok(_) => OperationStatus::Success,
      Err(OperationError::Cancelled) => OperationStatus::Cancelled,
      Err(OperationError::Panicked) => OperationStatus::Panicked,
      Err(_) => OperationStatus::Failed,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_classifies_outcomes() {
    let ok: Result<u8, OperationError> = Ok(1);
    let cancelled: Result<u8, OperationError> = Err(OperationError::Cancelled);
    let panicked: Result<u8, OperationError> = Err(OperationError::Panicked);
    let failed: Result<u8, OperationError> = Err(OperationError::failed("boom"));

    assert_eq!(OperationStatus::from(&ok), OperationStatus::Success);
    assert_eq!(OperationStatus::from(&cancelled), OperationStatus::Cancelled);
    assert_eq!(OperationStatus::from(&panicked), OperationStatus::Panicked);
    assert_eq!(OperationStatus::from(&failed), OperationStatus::Failed);
  }
}
