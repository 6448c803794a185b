use crate::config::{validate_capacity, CoordinatorConfig};
use crate::error::CoordinatorError;
use crate::operation::{self, Operation, OperationStatus};

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::task::Poll;

use futures::future::poll_fn;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Fixed-capacity storage for `(operation, metadata)` entries.
///
/// The slot array is allocated once, sized to `maximum_capacity`, and never
/// resized. Live entries always occupy `[0, len)` in submission order.
///
/// The store is driven by a single owner: every mutating method takes
/// `&mut self`, so sharing one store between concurrent drivers requires an
/// outer mutex or actor.
pub struct SlotStore<O: Operation, M> {
  name: Arc<String>,
  slots: Box<[Option<(O, M)>]>,
  current_length: usize,
  capacity: usize,
  call_count: u64,
  call_count_to_indicate_full: u64,
}

impl<O: Operation, M> SlotStore<O, M> {
  pub fn new(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
    let capacity = config.validate()?;
    let slots = (0..config.maximum_capacity).map(|_| None).collect::<Vec<_>>().into_boxed_slice();
    debug!(
      name = %config.name,
      maximum_capacity = config.maximum_capacity,
      capacity,
      call_count_to_indicate_full = config.call_count_to_indicate_full,
      "Slot store created."
    );
    Ok(Self {
      name: config.name,
      slots,
      current_length: 0,
      capacity,
      call_count: 0,
      call_count_to_indicate_full: config.call_count_to_indicate_full,
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Appends an entry and returns the post-insertion [`is_full`](Self::is_full).
  ///
  /// # Errors
  /// `CapacityExceeded` if the store already holds `capacity` entries. The
  /// store is left untouched; the caller must drain before retrying.
  pub fn submit(&mut self, operation: O, metadata: M) -> Result<bool, CoordinatorError> {
    if self.current_length >= self.capacity {
      warn!(name = %self.name, capacity = self.capacity, "Submit: Store is at capacity; drain required first.");
      return Err(CoordinatorError::CapacityExceeded { capacity: self.capacity });
    }
    self.slots[self.current_length] = Some((operation, metadata));
    self.current_length += 1;
    self.call_count += 1;

    let full = self.is_full();
    if full {
      debug!(
        name = %self.name,
        len = self.current_length,
        call_count = self.call_count,
        by_count = self.is_full_by_count(),
        "Submit: Store reports full."
      );
    }
    Ok(full)
  }

  /// Iterates the held entries in submission order without mutating anything.
  pub fn list_all(&self) -> impl Iterator<Item = (&O, &M)> + '_ {
    self.slots[..self.current_length]
      .iter()
      .filter_map(|slot| slot.as_ref().map(|(operation, metadata)| (operation, metadata)))
  }

  /// Harvests every completed entry in one forward pass.
  ///
  /// Each slot's `is_completed` is queried exactly once. Pending entries are
  /// shifted down in their original relative order. Dropping the iterator
  /// before it is exhausted keeps every unexamined entry tracked.
  pub fn drain_completed(&mut self) -> DrainCompleted<'_, O, M> {
    let end = self.current_length;
    DrainCompleted {
      store: self,
      read: 0,
      write: 0,
      end,
    }
  }

  /// Drops every entry, up to `maximum_capacity`, and empties the store.
  ///
  /// `call_count` and the count-based full signal are left as they are.
  pub fn reset_all(&mut self) {
    let released = self.current_length;
    for slot in self.slots.iter_mut() {
      *slot = None;
    }
    self.current_length = 0;
    if released > 0 {
      debug!(name = %self.name, released, "Store reset.");
    }
  }

  /// Requests cancellation of every held operation, then resets.
  pub fn abort_all(&mut self) {
    let mut aborted = 0usize;
    for (operation, _) in self.list_all() {
      operation.abort();
      aborted += 1;
    }
    debug!(name = %self.name, aborted, "Abort requested for all tracked operations.");
    self.reset_all();
  }

  pub fn is_full(&self) -> bool {
    self.current_length >= self.capacity || self.is_full_by_count()
  }

  /// `true` once `call_count` has reached a non-zero threshold.
  ///
  /// This stays `true` for the rest of the store's life because `call_count`
  /// is never reset; setting the threshold to 0 switches the signal off.
  pub fn is_full_by_count(&self) -> bool {
    self.call_count_to_indicate_full != 0 && self.call_count >= self.call_count_to_indicate_full
  }

  pub fn is_empty(&self) -> bool {
    self.current_length == 0
  }

  pub fn len(&self) -> usize {
    self.current_length
  }

  pub fn remaining_capacity(&self) -> usize {
    self.capacity.saturating_sub(self.current_length)
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Sets the backpressure threshold, within `1..=maximum_capacity`.
  ///
  /// Lowering it below `len()` is allowed; the store then reports full until
  /// drained below the new value.
  pub fn set_capacity(&mut self, capacity: usize) -> Result<(), CoordinatorError> {
    validate_capacity(capacity, self.maximum_capacity())?;
    debug!(name = %self.name, from = self.capacity, to = capacity, "Capacity changed.");
    self.capacity = capacity;
    Ok(())
  }

  pub fn maximum_capacity(&self) -> usize {
    self.slots.len()
  }

  /// Number of accepted submissions over the store's lifetime.
  pub fn call_count(&self) -> u64 {
    self.call_count
  }

  pub fn call_count_to_indicate_full(&self) -> u64 {
    self.call_count_to_indicate_full
  }

  pub fn set_call_count_to_indicate_full(&mut self, call_count: u64) {
    self.call_count_to_indicate_full = call_count;
  }

  /// Suspends until at least one held operation is terminal.
  ///
  /// Never resolves on an empty store.
  pub(crate) async fn wait_for_first(&mut self) {
    let live = &mut self.slots[..self.current_length];
    poll_fn(|cx| {
      for (operation, _) in live.iter_mut().flatten() {
        if operation.poll_settled(cx).is_ready() {
          return Poll::Ready(());
        }
      }
      Poll::Pending
    })
    .await
  }

  /// Awaits every entry serially in submission order, then resets.
  ///
  /// The first failure is returned immediately; entries after it are dropped
  /// without being awaited. The reset also happens if this future is dropped
  /// mid-await.
  pub(crate) async fn drain_all_in_order(
    &mut self,
    cancellation: Option<&CancellationToken>,
  ) -> Result<Vec<(O::Output, M)>, CoordinatorError> {
    let mut store = ResetOnDrop { store: self };
    let length = store.current_length;
    let mut harvested = Vec::with_capacity(length);

    for index in 0..length {
      let Some((mut operation, metadata)) = store.slots[index].take() else {
        continue;
      };
      let result = match cancellation {
        Some(token) => {
          if token.is_cancelled() {
            return Err(store.abandon(CoordinatorError::DrainCancelled));
          }
          tokio::select! {
            biased;
            _ = token.cancelled() => return Err(store.abandon(CoordinatorError::DrainCancelled)),
            result = operation::outcome(&mut operation) => result,
          }
        }
        None => operation::outcome(&mut operation).await,
      };
      trace!(name = %store.name, index, status = ?OperationStatus::from(&result), "Awaited entry.");
      match result {
        Ok(output) => harvested.push((output, metadata)),
        Err(error) => return Err(store.abandon(error.into())),
      }
    }
    Ok(harvested)
  }

  /// Logs that the remaining entries are about to be dropped untracked.
  pub(crate) fn abandon(&self, error: CoordinatorError) -> CoordinatorError {
    let remaining = self.list_all().count();
    if remaining > 0 {
      warn!(
        name = %self.name,
        remaining,
        %error,
        "Drain failed; remaining operations are abandoned without being cancelled."
      );
    } else {
      debug!(name = %self.name, %error, "Drain failed.");
    }
    error
  }
}

impl<O: Operation, M> fmt::Debug for SlotStore<O, M> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SlotStore")
      .field("name", &self.name)
      .field("len", &self.current_length)
      .field("capacity", &self.capacity)
      .field("maximum_capacity", &self.slots.len())
      .field("call_count", &self.call_count)
      .field("call_count_to_indicate_full", &self.call_count_to_indicate_full)
      .finish()
  }
}

impl<O: Operation, M> Drop for SlotStore<O, M> {
  fn drop(&mut self) {
    if self.current_length > 0 {
      warn!(
        name = %self.name,
        abandoned = self.current_length,
        "Store dropped while tracking operations; they are abandoned, not cancelled."
      );
    }
  }
}

/// Lazy iterator returned by [`SlotStore::drain_completed`].
pub struct DrainCompleted<'a, O: Operation, M> {
  store: &'a mut SlotStore<O, M>,
  read: usize,
  write: usize,
  end: usize,
}

impl<O: Operation, M> DrainCompleted<'_, O, M> {
  // Slots in [write, read) are always empty, so a swap is a move.
  fn keep(&mut self, index: usize) {
    if index != self.write {
      self.store.slots.swap(index, self.write);
    }
    self.write += 1;
  }
}

impl<O: Operation, M> Iterator for DrainCompleted<'_, O, M> {
  type Item = (O, M);

  fn next(&mut self) -> Option<Self::Item> {
    while self.read < self.end {
      let index = self.read;
      self.read += 1;
      let completed = match &self.store.slots[index] {
        Some((operation, _)) => operation.is_completed(),
        None => continue,
      };
      if completed {
        trace!(name = %self.store.name, index, "Harvested completed entry.");
        return self.store.slots[index].take();
      }
      self.keep(index);
    }
    None
  }
}

impl<O: Operation, M> Drop for DrainCompleted<'_, O, M> {
  fn drop(&mut self) {
    while self.read < self.end {
      let index = self.read;
      self.read += 1;
      if self.store.slots[index].is_some() {
        self.keep(index);
      }
    }
    self.store.current_length = self.write;
  }
}

/// Resets the wrapped store when dropped.
pub(crate) struct ResetOnDrop<'a, O: Operation, M> {
  store: &'a mut SlotStore<O, M>,
}

impl<O: Operation, M> Deref for ResetOnDrop<'_, O, M> {
  type Target = SlotStore<O, M>;

  fn deref(&self) -> &Self::Target {
    self.store
  }
}

impl<O: Operation, M> DerefMut for ResetOnDrop<'_, O, M> {
  fn deref_mut(&mut self) -> &mut Self::Target {
    self.store
  }
}

impl<O: Operation, M> Drop for ResetOnDrop<'_, O, M> {
  fn drop(&mut self) {
    self.store.reset_all();
  }
}
