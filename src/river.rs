use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;
use crate::operation::{self, Operation, OperationStatus};
use crate::slot_store::SlotStore;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Sliding-window coordinator.
///
/// Keeps up to `capacity` operations in flight. [`drain`](River::drain)
/// waits only for the first of them to finish, harvests whatever is terminal
/// by then and leaves the rest running.
///
/// When the total number of submissions is known up front, set it with
/// [`set_call_count_to_indicate_full`](River::set_call_count_to_indicate_full).
/// Once that many operations were submitted the river reports full for good,
/// and every `drain` keeps going until nothing is tracked anymore.
///
/// On failure or cancellation every still-tracked operation is dropped from
/// tracking. Dropping is not cancelling: the work keeps running unless the
/// caller cancels it, e.g. with [`abort_all`](River::abort_all) beforehand or
/// through its own handles.
#[derive(Debug)]
pub struct River<O: Operation, M> {
  store: SlotStore<O, M>,
}

impl<O: Operation, M> River<O, M> {
  pub fn new(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
    Ok(Self {
      store: SlotStore::new(config)?,
    })
  }

  /// Tracks `operation` with its `metadata`; returns `true` when the caller
  /// should drain.
  pub fn submit(&mut self, operation: O, metadata: M) -> Result<bool, CoordinatorError> {
    self.store.submit(operation, metadata)
  }

  /// Harvests the operations that finished first, in completion order.
  ///
  /// # Errors
  /// `DrainCancelled` if `cancellation` fires, or the first failure among the
  /// harvested operations. Either way the river is empty afterwards.
  pub async fn drain(&mut self, cancellation: &CancellationToken) -> Result<Vec<(O::Output, M)>, CoordinatorError> {
    let mut harvested = Vec::new();
    let mut round = 0u32;

    while !self.store.is_empty() {
      round += 1;
      if let Err(error) = self.drain_round(cancellation, &mut harvested).await {
        let error = self.store.abandon(error);
        self.store.reset_all();
        return Err(error);
      }
      if !self.store.is_full_by_count() {
        break;
      }
      if !self.store.is_empty() {
        debug!(
          name = %self.store.name(),
          round,
          remaining = self.store.len(),
          "River: Final drain continues."
        );
      }
    }
    Ok(harvested)
  }

  async fn drain_round(
    &mut self,
    cancellation: &CancellationToken,
    harvested: &mut Vec<(O::Output, M)>,
  ) -> Result<(), CoordinatorError> {
    if cancellation.is_cancelled() {
      return Err(CoordinatorError::DrainCancelled);
    }
    tokio::select! {
      biased;
      _ = cancellation.cancelled() => return Err(CoordinatorError::DrainCancelled),
      _ = self.store.wait_for_first() => {}
    }

    let name = self.store.name().to_string();
    for (mut operation, metadata) in self.store.drain_completed() {
      if cancellation.is_cancelled() {
        return Err(CoordinatorError::DrainCancelled);
      }
      let result = operation::outcome(&mut operation).await;
      trace!(%name, status = ?OperationStatus::from(&result), "River: Harvested operation.");
      harvested.push((result?, metadata));
    }
    Ok(())
  }

  /// Awaits every tracked operation in submission order, then empties the river.
  ///
  /// Used to finish when the total call count was never set.
  pub async fn drain_all(
    &mut self,
    cancellation: &CancellationToken,
  ) -> Result<Vec<(O::Output, M)>, CoordinatorError> {
    if self.store.is_empty() {
      return Ok(Vec::new());
    }
    debug!(name = %self.store.name(), len = self.store.len(), "River: Draining all.");
    self.store.drain_all_in_order(Some(cancellation)).await
  }

  /// Requests cancellation of every tracked operation and empties the river.
  pub fn abort_all(&mut self) {
    self.store.abort_all();
  }

  /// Iterates the tracked entries in their current slot order.
  pub fn list_all(&self) -> impl Iterator<Item = (&O, &M)> + '_ {
    self.store.list_all()
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

  pub fn call_count_to_indicate_full(&self) -> u64 {
    self.store.call_count_to_indicate_full()
  }

  /// Announces the total number of submissions; 0 switches final drain off.
  pub fn set_call_count_to_indicate_full(&mut self, call_count: u64) {
    self.store.set_call_count_to_indicate_full(call_count);
  }
}
