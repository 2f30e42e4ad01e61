//! Bounded retry for transport dispatch
//!
//! Retryable failures are re-attempted with the same payload up to a
//! per-transport bound, with a short jittered delay between attempts.
//! Non-retryable failures surface immediately.

use crate::domain::TransportError;
use crate::transport::traits::{DeliveryReceipt, RenderedBatch, Transport};
use rand::Rng;
use std::time::Duration;

/// Retry bounds for one dispatch
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Re-attempts after the initial try
    pub max_retries: u32,

    /// Base delay between attempts; each attempt adds jitter
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// AS2 endpoints get exactly one re-attempt on transient failure
    pub fn as2() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 1000,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let jitter: u64 = rand::thread_rng().gen_range(0..250);
        Duration::from_millis(self.base_delay_ms * u64::from(attempt) + jitter)
    }
}

/// Sends a batch, retrying retryable failures within the policy's bound
pub async fn send_with_retry(
    transport: &dyn Transport,
    batch: &RenderedBatch,
    policy: &RetryPolicy,
) -> Result<DeliveryReceipt, TransportError> {
    let mut attempt = 0;
    loop {
        match transport.send(batch).await {
            Ok(receipt) => {
                tracing::info!(
                    receiver = %batch.receiver,
                    transport = %transport.description(),
                    items = batch.item_count,
                    attempt,
                    "Batch delivered"
                );
                return Ok(receipt);
            }
            Err(e) if e.retryable && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    receiver = %batch.receiver,
                    transport = %transport.description(),
                    error = %e,
                    attempt,
                    "Transient delivery failure, retrying"
                );
                tokio::time::sleep(policy.delay(attempt)).await;
            }
            Err(e) => {
                tracing::error!(
                    receiver = %batch.receiver,
                    transport = %transport.description(),
                    error = %e,
                    attempts = attempt + 1,
                    "Delivery failed"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReportFormat;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyTransport {
        fail_times: u32,
        calls: AtomicU32,
        retryable: bool,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn send(&self, batch: &RenderedBatch) -> Result<DeliveryReceipt, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                if self.retryable {
                    Err(TransportError::timeout("simulated"))
                } else {
                    Err(TransportError::rejected("simulated"))
                }
            } else {
                Ok(DeliveryReceipt::for_batch(
                    batch,
                    "TEST".to_string(),
                    "memory".to_string(),
                ))
            }
        }

        fn description(&self) -> String {
            "TEST".to_string()
        }
    }

    fn batch() -> RenderedBatch {
        RenderedBatch {
            receiver: "pa-phd.elr".to_string(),
            format: ReportFormat::Csv,
            filename: "f.csv".to_string(),
            content: "x".to_string(),
            item_count: 1,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let transport = FlakyTransport {
            fail_times: 2,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay_ms: 1,
        };
        let receipt = send_with_retry(&transport, &batch(), &policy).await.unwrap();
        assert_eq!(receipt.item_count, 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_retry_budget() {
        let transport = FlakyTransport {
            fail_times: 5,
            calls: AtomicU32::new(0),
            retryable: true,
        };
        let policy = RetryPolicy {
            max_retries: 1,
            base_delay_ms: 1,
        };
        let err = send_with_retry(&transport, &batch(), &policy).await.unwrap_err();
        assert!(err.retryable);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let transport = FlakyTransport {
            fail_times: 5,
            calls: AtomicU32::new(0),
            retryable: false,
        };
        let policy = RetryPolicy::default();
        let err = send_with_retry(&transport, &batch(), &policy).await.unwrap_err();
        assert!(!err.retryable);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }
}
