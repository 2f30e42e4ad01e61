//! Transport dispatch
//!
//! Delivers rendered batches over the receiver's configured transport.
//! Six variants share one contract ([`Transport`]): scoped connection
//! acquisition, bounded connect/read deadlines, classified failures, and
//! bounded retries with the same payload.

pub mod as2;
pub mod blob;
pub mod email;
pub mod factory;
pub mod ftps;
pub mod gaen;
mod http;
pub mod retry;
pub mod sftp;
pub mod traits;

pub use factory::{create_transport, dispatch};
pub use retry::{send_with_retry, RetryPolicy};
pub use traits::{DeliveryReceipt, RenderedBatch, Transport, CONNECT_TIMEOUT, READ_TIMEOUT};
