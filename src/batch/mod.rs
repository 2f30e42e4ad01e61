//! Batch accumulation and scheduling
//!
//! Reports admitted by the filter engine accumulate per receiver until a
//! scheduled slot comes due or the receiver's count threshold is hit;
//! the scheduler then emits flush events for rendering and dispatch, and
//! keeps failed batches pending for redelivery.

pub mod buffer;
pub mod scheduler;

pub use buffer::AccumulationBuffer;
pub use scheduler::{BatchScheduler, FlushEvent, ReceiverPhase};
