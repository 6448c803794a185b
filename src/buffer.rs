use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::operation::Operation;
use crate::slot_store::SlotStore;

use tracing::debug;

/// Barrier coordinator: fill up to `capacity`, then wait for everything.
///
/// ```no_run
/// # use futures_river::{Buffer, CoordinatorConfig, OperationHandle, BoxError};
/// # async fn run() -> Result<(), futures_river::CoordinatorError> {
/// let mut buffer = Buffer::new(CoordinatorConfig::new("fan_out").with_maximum_capacity(4))?;
/// for i in 0..16u32 {
///   let full = buffer.submit(OperationHandle::spawn(async move { Ok::<_, BoxError>(i * 2) }))?;
///   if full {
///     for doubled in buffer.drain().await? {
///       println!("{doubled}");
///     }
///   }
/// }
/// buffer.drain().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Buffer<O: Operation> {
  store: SlotStore<O, ()>,
}

impl<O: Operation> Buffer<O> {
  pub fn new(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
    Ok(Self {
      store: SlotStore::new(config)?,
    })
  }

  /// Tracks `operation`; returns `true` when the caller should drain.
  pub fn submit(&mut self, operation: O) -> Result<bool, CoordinatorError> {
    self.store.submit(operation, ())
  }

  /// Awaits every tracked operation in submission order and empties the buffer.
  ///
  /// The first failure wins: it is returned as soon as it is observed and the
  /// operations after it are dropped without being awaited. The buffer is
  /// empty afterwards in every case.
  pub async fn drain(&mut self) -> Result<Vec<O::Output>, CoordinatorError> {
    if self.store.is_empty() {
      return Ok(Vec::new());
    }
    debug!(name = %self.store.name(), len = self.store.len(), "Buffer: Draining.");
    let harvested = self.store.drain_all_in_order(None).await?;
    Ok(harvested.into_iter().map(|(output, ())| output).collect())
  }

  /// Requests cancellation of every tracked operation and empties the buffer.
  pub fn abort_all(&mut self) {
    self.store.abort_all();
  }

  pub fn name(&self) -> &str {
    self.store.name()
  }

  pub fn is_full(&self) -> bool {
    self.store.is_full()
  }

  pub fn is_empty(&self) -> bool {
    self.store.is_empty()
  }

  pub fn len(&self) -> usize {
    self.store.len()
  }

  pub fn capacity(&self) -> usize {
    self.store.capacity()
  }

  pub fn set_capacity(&mut self, capacity: usize) -> Result<(), CoordinatorError> {
    self.store.set_capacity(capacity)
  }

  pub fn maximum_capacity(&self) -> usize {
    self.store.maximum_capacity()
  }

  pub fn call_count(&self) -> u64 {
    self.store.call_count()
  }
}
