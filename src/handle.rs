use crate::error::{BoxError, OperationError};
use crate::operation::{self, Operation};

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::task::{Context, Poll};

use futures::ready;
use tokio::runtime::Handle as TokioHandle;
use tokio::task::{JoinError, JoinHandle};

lazy_static::lazy_static! {
  static ref NEXT_OPERATION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

enum HandleState<R> {
  Running(JoinHandle<Result<R, BoxError>>),
  Settled(Result<R, OperationError>),
  Taken,
}

/// A handle to an operation running as a spawned tokio task.
///
/// Once the task finishes, its outcome is cached inside the handle, so the
/// handle keeps reporting `is_completed() == true` until the outcome is taken.
pub struct OperationHandle<R: Send + 'static> {
  operation_id: u64,
  state: HandleState<R>,
}

impl<R: Send + 'static> OperationHandle<R> {
  /// Spawns `future` on the current tokio runtime.
  ///
  /// # Panics
  /// Panics when called outside of a tokio runtime.
  pub fn spawn<F, E>(future: F) -> Self
  where
    F: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<BoxError>,
  {
    Self::spawn_on(&TokioHandle::current(), future)
  }

  /// Spawns `future` on the given runtime.
  pub fn spawn_on<F, E>(tokio_handle: &TokioHandle, future: F) -> Self
  where
    F: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<BoxError>,
  {
    Self::from_join_handle(tokio_handle.spawn(async move { future.await.map_err(Into::into) }))
  }

  /// Adopts a task that was spawned elsewhere.
  pub fn from_join_handle(join_handle: JoinHandle<Result<R, BoxError>>) -> Self {
    Self::with_state(HandleState::Running(join_handle))
  }

  /// Creates a handle that is already terminal.
  pub fn completed(result: Result<R, OperationError>) -> Self {
    Self::with_state(HandleState::Settled(result))
  }

  fn with_state(state: HandleState<R>) -> Self {
    Self {
      operation_id: NEXT_OPERATION_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed),
      state,
    }
  }

  /// Returns the process-unique ID of this operation.
  pub fn id(&self) -> u64 {
    self.operation_id
  }

  /// Awaits the operation and returns its outcome.
  ///
  /// # Errors
  /// `Failed` if the task returned an error, `Panicked` if it panicked,
  /// `Cancelled` if it was aborted, `ResultUnavailable` if the outcome was
  /// already taken through [`Operation::poll_outcome`].
  pub async fn await_result(mut self) -> Result<R, OperationError> {
    operation::outcome(&mut self).await
  }

  fn map_join_outcome(operation_id: u64, joined: Result<Result<R, BoxError>, JoinError>) -> Result<R, OperationError> {
    match joined {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(error)) => Err(OperationError::Failed(error)),
      Err(join_error) if join_error.is_panic() => {
        tracing::debug!(%operation_id, "Operation task panicked.");
        Err(OperationError::Panicked)
      }
      Err(_) => {
        tracing::debug!(%operation_id, "Operation task was cancelled.");
        Err(OperationError::Cancelled)
      }
    }
  }
}

impl<R: Send + 'static> Operation for OperationHandle<R> {
  type Output = R;

  fn is_completed(&self) -> bool {
    match &self.state {
      HandleState::Running(join_handle) => join_handle.is_finished(),
      HandleState::Settled(_) | HandleState::Taken => true,
    }
  }

  fn poll_settled(&mut self, cx: &mut Context<'_>) -> Poll<()> {
    if let HandleState::Running(join_handle) = &mut self.state {
      let joined = ready!(Pin::new(join_handle).poll(cx));
      self.state = HandleState::Settled(Self::map_join_outcome(self.operation_id, joined));
    }
    Poll::Ready(())
  }

  fn poll_outcome(&mut self, cx: &mut Context<'_>) -> Poll<Result<R, OperationError>> {
    ready!(self.poll_settled(cx));
    match mem::replace(&mut self.state, HandleState::Taken) {
      HandleState::Settled(result) => Poll::Ready(result),
      _ => Poll::Ready(Err(OperationError::ResultUnavailable)),
    }
  }

  fn abort(&self) {
    if let HandleState::Running(join_handle) = &self.state {
      tracing::debug!(operation_id = %self.operation_id, "OperationHandle: Abort requested.");
      join_handle.abort();
    }
  }
}

impl<R: Send + 'static> fmt::Debug for OperationHandle<R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = match &self.state {
      HandleState::Running(_) => "running",
      HandleState::Settled(Ok(_)) => "succeeded",
      HandleState::Settled(Err(_)) => "failed",
      HandleState::Taken => "taken",
    };
    f.debug_struct("OperationHandle")
      .field("operation_id", &self.operation_id)
      .field("state", &state)
      .finish()
  }
}
