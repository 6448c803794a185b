//! Bounded coordinators for already-started futures.
//!
//! A single owner launches many operations and hands them to a coordinator,
//! which bounds how many are tracked at once, signals backpressure and drains
//! their outcomes under one of three policies:
//!
//! - [`Buffer`]: barrier. Wait for every tracked operation, in order.
//! - [`River`]: sliding window. Wait for the first to finish, harvest what is
//!   done, keep the rest in flight; optional final drain once a known total
//!   call count is reached.
//! - [`Interweaver`]: single-slot pipeline with a tunable overlap dial.
//!
//! Coordinators are driven sequentially by one logical flow; they hold no
//! locks. The concurrency lives in the operations themselves.

mod buffer;
mod config;
mod error;
mod handle;
mod interweaver;
mod operation;
mod river;
mod slot_store;

pub use buffer::Buffer;
pub use config::{default_maximum_capacity, CoordinatorConfig, PipelineConfig, MAXIMUM_CAPACITY_LIMIT};
pub use error::{BoxError, CoordinatorError, OperationError};
pub use handle::OperationHandle;
pub use interweaver::Interweaver;
pub use operation::{outcome, settled, Operation, OperationStatus};
pub use river::River;
pub use slot_store::{DrainCompleted, SlotStore};
