use crate::error::CoordinatorError;

use std::sync::Arc;
use std::thread;

/// Hard upper bound for `maximum_capacity`.
pub const MAXIMUM_CAPACITY_LIMIT: usize = 65535;

/// Half the available parallelism, at least 1.
pub fn default_maximum_capacity() -> usize {
  let processors = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
  (processors / 2).clamp(1, MAXIMUM_CAPACITY_LIMIT)
}

/// Construction parameters for the slot-store based coordinators.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
  pub name: Arc<String>,
  pub maximum_capacity: usize,
  /// `None` means "same as `maximum_capacity`".
  pub capacity: Option<usize>,
  /// 0 disables the count-based full signal.
  pub call_count_to_indicate_full: u64,
}

impl Default for CoordinatorConfig {
  fn default() -> Self {
    Self {
      name: Arc::new("coordinator".to_string()),
      maximum_capacity: default_maximum_capacity(),
      capacity: None,
      call_count_to_indicate_full: 0,
    }
  }
}

impl CoordinatorConfig {
  pub fn new(name: &str) -> Self {
    Self {
      name: Arc::new(name.to_string()),
      ..Self::default()
    }
  }

  pub fn with_maximum_capacity(mut self, maximum_capacity: usize) -> Self {
    self.maximum_capacity = maximum_capacity;
    self
  }

  pub fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = Some(capacity);
    self
  }

  pub fn with_call_count_to_indicate_full(mut self, call_count: u64) -> Self {
    self.call_count_to_indicate_full = call_count;
    self
  }

  /// Checks every parameter and returns the effective capacity.
  pub fn validate(&self) -> Result<usize, CoordinatorError> {
    if !(1..=MAXIMUM_CAPACITY_LIMIT).contains(&self.maximum_capacity) {
      return Err(CoordinatorError::InvalidMaximumCapacity(self.maximum_capacity));
    }
    let capacity = self.capacity.unwrap_or(self.maximum_capacity);
    validate_capacity(capacity, self.maximum_capacity)?;
    Ok(capacity)
  }
}

pub(crate) fn validate_capacity(requested: usize, maximum: usize) -> Result<(), CoordinatorError> {
  if requested == 0 || requested > maximum {
    return Err(CoordinatorError::InvalidCapacity { requested, maximum });
  }
  Ok(())
}

/// Construction parameters for the [`Interweaver`](crate::Interweaver).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
  pub name: Arc<String>,
  /// 1.0 never flushes probabilistically, 0.0 always flushes.
  pub level: f64,
  /// Submissions left before every submit is flushed; `None` disables it.
  pub forced_flush_after: Option<u64>,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      name: Arc::new("interweaver".to_string()),
      level: 1.0,
      forced_flush_after: None,
    }
  }
}

impl PipelineConfig {
  pub fn new(name: &str) -> Self {
    Self {
      name: Arc::new(name.to_string()),
      ..Self::default()
    }
  }

  pub fn with_level(mut self, level: f64) -> Self {
    self.level = level;
    self
  }

  pub fn with_forced_flush_after(mut self, calls: u64) -> Self {
    self.forced_flush_after = Some(calls);
    self
  }

  pub fn validate(&self) -> Result<(), CoordinatorError> {
    validate_level(self.level)
  }
}

pub(crate) fn validate_level(level: f64) -> Result<(), CoordinatorError> {
  // NaN fails `contains`.
  if !(0.0..=1.0).contains(&level) {
    return Err(CoordinatorError::InvalidLevel(level));
  }
  Ok(())
}
