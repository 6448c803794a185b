use crate::config::{validate_level, PipelineConfig};
use crate::error::CoordinatorError;
use crate::operation::{self, Operation, OperationStatus};

use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace, warn};

/// Single-slot pipeline coordinator.
///
/// Holds at most one pending operation. Submitting operation `n + 1` first
/// awaits operation `n`, so the caller always overlaps at most two units of
/// work. How often the new operation is awaited right away is controlled by
/// `level` (1.0: never, 0.0: always) and by a forced-flush countdown.
pub struct Interweaver<O: Operation> {
  name: Arc<String>,
  pending: Option<O>,
  remaining_forced_flushes: Option<u64>,
  level: f64,
  rng: StdRng,
}

impl<O: Operation> Interweaver<O> {
  pub fn new(config: PipelineConfig) -> Result<Self, CoordinatorError> {
    Self::with_rng(config, StdRng::from_os_rng())
  }

  /// Same as [`new`](Interweaver::new) with a reproducible flush sequence.
  pub fn with_seed(config: PipelineConfig, seed: u64) -> Result<Self, CoordinatorError> {
    Self::with_rng(config, StdRng::seed_from_u64(seed))
  }

  fn with_rng(config: PipelineConfig, rng: StdRng) -> Result<Self, CoordinatorError> {
    config.validate()?;
    debug!(
      name = %config.name,
      level = config.level,
      forced_flush_after = ?config.forced_flush_after,
      "Interweaver created."
    );
    Ok(Self {
      name: config.name,
      pending: None,
      remaining_forced_flushes: config.forced_flush_after,
      level: config.level,
      rng,
    })
  }

  /// Awaits the previously pending operation, then makes `operation` pending.
  ///
  /// Returns the outputs observed during this call: the previous operation's,
  /// and the new one's if it was flushed immediately. If the previous
  /// operation failed, its error is returned and `operation` is dropped
  /// without being tracked.
  pub async fn submit(&mut self, operation: O) -> Result<Vec<O::Output>, CoordinatorError> {
    let mut observed = Vec::with_capacity(2);
    match self.drain().await {
      Ok(Some(output)) => observed.push(output),
      Ok(None) => {}
      Err(error) => {
        warn!(name = %self.name, %error, "Interweaver: Previous operation failed; new operation abandoned.");
        return Err(error);
      }
    }

    self.pending = Some(operation);
    if self.should_flush() {
      trace!(name = %self.name, "Interweaver: Flushing new operation immediately.");
      if let Some(output) = self.drain().await? {
        observed.push(output);
      }
    }
    Ok(observed)
  }

  fn should_flush(&mut self) -> bool {
    if let Some(remaining) = self.remaining_forced_flushes.as_mut() {
      *remaining = remaining.saturating_sub(1);
      if *remaining == 0 {
        return true;
      }
    }
    self.level < 1.0 && self.rng.random::<f64>() >= self.level
  }

  /// Awaits the pending operation, if any.
  ///
  /// The slot is cleared before awaiting, so a failing operation never stays
  /// pending.
  pub async fn drain(&mut self) -> Result<Option<O::Output>, CoordinatorError> {
    let Some(mut operation) = self.pending.take() else {
      return Ok(None);
    };
    let result = operation::outcome(&mut operation).await;
    trace!(name = %self.name, status = ?OperationStatus::from(&result), "Interweaver: Drained operation.");
    Ok(Some(result?))
  }

  /// Requests cancellation of the pending operation and forgets it.
  pub fn abort(&mut self) {
    if let Some(operation) = self.pending.take() {
      debug!(name = %self.name, "Interweaver: Aborting pending operation.");
      operation.abort();
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// `true` while an operation is pending.
  pub fn is_full(&self) -> bool {
    self.pending.is_some()
  }

  pub fn is_empty(&self) -> bool {
    self.pending.is_none()
  }

  pub fn level(&self) -> f64 {
    self.level
  }

  pub fn set_level(&mut self, level: f64) -> Result<(), CoordinatorError> {
    validate_level(level)?;
    self.level = level;
    Ok(())
  }

  pub fn remaining_forced_flushes(&self) -> Option<u64> {
    self.remaining_forced_flushes
  }

  /// Every submit flushes once `calls` more submissions were made; `None`
  /// disables the countdown.
  pub fn set_forced_flush_after(&mut self, calls: Option<u64>) {
    self.remaining_forced_flushes = calls;
  }
}

impl<O: Operation> fmt::Debug for Interweaver<O> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Interweaver")
      .field("name", &self.name)
      .field("pending", &self.pending.is_some())
      .field("remaining_forced_flushes", &self.remaining_forced_flushes)
      .field("level", &self.level)
      .finish_non_exhaustive()
  }
}

impl<O: Operation> Drop for Interweaver<O> {
  fn drop(&mut self) {
    if self.pending.is_some() {
      warn!(name = %self.name, "Interweaver dropped with a pending operation; it is abandoned, not cancelled.");
    }
  }
}
