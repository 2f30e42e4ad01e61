//! AS2 transport
//!
//! Posts the rendered batch to the receiver's AS2 endpoint, exchanging
//! sender/receiver identifiers and the configured MIME type. By design
//! no machine-readable delivery receipt (MDN) is requested: receipts are
//! generally ignored downstream, and skipping the request keeps the
//! exchange to a single round trip. Transient failures are retried
//! exactly once (see [`crate::transport::retry::RetryPolicy::as2`]).

use crate::domain::TransportError;
use crate::transport::http::{classify_request_error, classify_status, http_client};
use crate::transport::traits::{DeliveryReceipt, RenderedBatch, Transport};
use async_trait::async_trait;
use uuid::Uuid;

pub struct As2Transport {
    receiver_url: String,
    receiver_id: String,
    sender_id: String,
    sender_email: String,
    mime_type: String,
    content_description: String,
}

impl As2Transport {
    pub fn new(
        receiver_url: String,
        receiver_id: String,
        sender_id: String,
        sender_email: String,
        mime_type: String,
        content_description: String,
    ) -> Self {
        Self {
            receiver_url,
            receiver_id,
            sender_id,
            sender_email,
            mime_type,
            content_description,
        }
    }
}

#[async_trait]
impl Transport for As2Transport {
    async fn send(&self, batch: &RenderedBatch) -> Result<DeliveryReceipt, TransportError> {
        let client = http_client()?;
        let message_id = format!("<{}@{}>", Uuid::new_v4(), self.sender_id);

        let response = client
            .post(&self.receiver_url)
            .header("AS2-Version", "1.2")
            .header("AS2-From", &self.sender_id)
            .header("AS2-To", &self.receiver_id)
            .header("Message-ID", &message_id)
            .header("From", &self.sender_email)
            .header("Subject", &self.content_description)
            .header("Content-Type", &self.mime_type)
            .header(
                "Content-Disposition",
                format!("attachment; filename=\"{}\"", batch.filename),
            )
            .body(batch.content.clone())
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        Ok(DeliveryReceipt::for_batch(
            batch,
            self.description(),
            self.receiver_url.clone(),
        ))
    }

    fn description(&self) -> String {
        format!("AS2 {} -> {}", self.sender_id, self.receiver_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReportFormat, TransportErrorKind};

    fn batch() -> RenderedBatch {
        RenderedBatch {
            receiver: "pa-phd.elr".to_string(),
            format: ReportFormat::Hl7Batch,
            filename: "pa-phd.elr-batch.hl7".to_string(),
            content: "MSH|^~\\&|...".to_string(),
            item_count: 3,
        }
    }

    fn transport(url: String) -> As2Transport {
        As2Transport::new(
            url,
            "pa-doh".to_string(),
            "courier".to_string(),
            "courier@localhost".to_string(),
            "application/hl7-v2".to_string(),
            "Electronic Lab Results".to_string(),
        )
    }

    #[tokio::test]
    async fn test_successful_exchange() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/receive")
            .match_header("AS2-From", "courier")
            .match_header("AS2-To", "pa-doh")
            .match_header("Content-Type", "application/hl7-v2")
            .with_status(200)
            .create_async()
            .await;

        let transport = transport(format!("{}/receive", server.url()));
        let receipt = transport.send(&batch()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(receipt.item_count, 3);
        assert!(receipt.transport.contains("AS2"));
    }

    #[tokio::test]
    async fn test_no_mdn_requested() {
        let mut server = mockito::Server::new_async().await;
        // A request carrying Disposition-Notification-To would not match
        // and the mock would go unfulfilled.
        let mock = server
            .mock("POST", "/receive")
            .match_header("Disposition-Notification-To", mockito::Matcher::Missing)
            .with_status(200)
            .create_async()
            .await;

        let transport = transport(format!("{}/receive", server.url()));
        transport.send(&batch()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_is_classified() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/receive")
            .with_status(415)
            .with_body("unsupported")
            .create_async()
            .await;

        let transport = transport(format!("{}/receive", server.url()));
        let err = transport.send(&batch()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::Rejected);
        assert!(!err.retryable);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/receive")
            .with_status(503)
            .create_async()
            .await;

        let transport = transport(format!("{}/receive", server.url()));
        let err = transport.send(&batch()).await.unwrap_err();
        assert!(err.retryable);
    }
}
