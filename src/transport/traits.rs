//! Transport abstraction
//!
//! Every transport variant implements the same contract: establish a
//! scoped connection, transmit the rendered batch with an explicit
//! content type and description, and either return a delivery receipt or
//! a classified [`TransportError`]. Connect and read deadlines are fixed
//! and bounded; no transport blocks indefinitely.

use crate::domain::{ReportFormat, TransportError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Connect deadline applied by every transport
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read/transfer deadline applied by every transport
pub const READ_TIMEOUT: Duration = Duration::from_secs(20);

/// A rendered batch ready for delivery
#[derive(Debug, Clone)]
pub struct RenderedBatch {
    /// Fully qualified receiver name
    pub receiver: String,

    /// Output format the batch was rendered in
    pub format: ReportFormat,

    /// Filename the receiver sees, e.g. `pa-phd.elr-20240115T130000-<id>.hl7`
    pub filename: String,

    /// The rendered payload
    pub content: String,

    /// Number of reports in the batch; zero for empty notifications
    pub item_count: usize,
}

impl RenderedBatch {
    /// SHA-256 digest of the payload, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex_encode(&hasher.finalize())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Proof of a completed delivery
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    /// Fully qualified receiver name
    pub receiver: String,

    /// Transport description, e.g. `SFTP sftp.example.gov:22`
    pub transport: String,

    /// Where the payload landed (remote path, URL, or address list)
    pub destination: String,

    /// Number of reports delivered
    pub item_count: usize,

    /// SHA-256 digest of the delivered payload
    pub digest: String,

    pub delivered_at: DateTime<Utc>,
}

impl DeliveryReceipt {
    /// Builds a receipt for a batch that just went out
    pub fn for_batch(batch: &RenderedBatch, transport: String, destination: String) -> Self {
        Self {
            receiver: batch.receiver.clone(),
            transport,
            destination,
            item_count: batch.item_count,
            digest: batch.digest(),
            delivered_at: Utc::now(),
        }
    }
}

/// One delivery mechanism
///
/// Implementations own their connection lifecycle: acquisition is scoped
/// to the send call and released even on failure.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers a rendered batch
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] classifying the failure; the caller
    /// decides whether to retry based on `retryable`.
    async fn send(&self, batch: &RenderedBatch) -> Result<DeliveryReceipt, TransportError>;

    /// Human-readable description for logs and receipts
    fn description(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> RenderedBatch {
        RenderedBatch {
            receiver: "pa-phd.elr".to_string(),
            format: ReportFormat::Csv,
            filename: "pa-phd.elr-test.csv".to_string(),
            content: "a,b\n1,2\n".to_string(),
            item_count: 1,
        }
    }

    #[test]
    fn test_digest_is_stable() {
        let b = batch();
        assert_eq!(b.digest(), b.digest());
        assert_eq!(b.digest().len(), 64);
    }

    #[test]
    fn test_receipt_carries_batch_identity() {
        let b = batch();
        let receipt =
            DeliveryReceipt::for_batch(&b, "TEST".to_string(), "nowhere".to_string());
        assert_eq!(receipt.receiver, "pa-phd.elr");
        assert_eq!(receipt.item_count, 1);
        assert_eq!(receipt.digest, b.digest());
    }
}
