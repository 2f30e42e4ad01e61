//! GAEN transport
//!
//! Posts exposure-notification payloads to a Google/Apple Exposure
//! Notification verification server. The notification UUID is either the
//! batch id verbatim or, for WA-notify endpoints, a salted digest so the
//! same batch never produces two different notifications.

use crate::domain::TransportError;
use crate::settings::{GaenUuidFormat, SecretString};
use crate::transport::http::{classify_request_error, classify_status, http_client};
use crate::transport::traits::{DeliveryReceipt, RenderedBatch, Transport};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use sha2::{Digest, Sha256};

pub struct GaenTransport {
    api_url: String,
    uuid_format: GaenUuidFormat,
    uuid_iv: Option<SecretString>,
}

impl GaenTransport {
    pub fn new(
        api_url: String,
        uuid_format: GaenUuidFormat,
        uuid_iv: Option<SecretString>,
    ) -> Self {
        Self {
            api_url,
            uuid_format,
            uuid_iv,
        }
    }

    fn notification_uuid(&self, batch: &RenderedBatch) -> String {
        match self.uuid_format {
            GaenUuidFormat::ReportId => batch.digest(),
            GaenUuidFormat::WaNotify => {
                let mut hasher = Sha256::new();
                if let Some(iv) = &self.uuid_iv {
                    hasher.update(iv.expose_secret().as_ref().as_bytes());
                }
                hasher.update(batch.digest().as_bytes());
                hasher
                    .finalize()
                    .iter()
                    .map(|b| format!("{b:02x}"))
                    .collect()
            }
        }
    }
}

#[async_trait]
impl Transport for GaenTransport {
    async fn send(&self, batch: &RenderedBatch) -> Result<DeliveryReceipt, TransportError> {
        let payload = json!({
            "uuid": self.notification_uuid(batch),
            "platform": "courier",
            "reportCount": batch.item_count,
            "payload": batch.content,
        });

        let client = http_client()?;
        let response = client
            .post(&self.api_url)
            .json(&payload)
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
            self.api_url.clone(),
        ))
    }

    fn description(&self) -> String {
        "GAEN".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReportFormat;
    use crate::settings::secret_string;

    fn batch() -> RenderedBatch {
        RenderedBatch {
            receiver: "wa-doh.gaen".to_string(),
            format: ReportFormat::Internal,
            filename: "n.json".to_string(),
            content: "{\"phone\":\"x\"}".to_string(),
            item_count: 1,
        }
    }

    #[tokio::test]
    async fn test_post_notification() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/notify")
            .match_header("content-type", "application/json")
            .with_status(200)
            .create_async()
            .await;

        let transport = GaenTransport::new(
            format!("{}/api/notify", server.url()),
            GaenUuidFormat::ReportId,
            None,
        );
        transport.send(&batch()).await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_uuid_formats_are_deterministic() {
        let plain = GaenTransport::new("u".to_string(), GaenUuidFormat::ReportId, None);
        assert_eq!(plain.notification_uuid(&batch()), batch().digest());

        let salted = GaenTransport::new(
            "u".to_string(),
            GaenUuidFormat::WaNotify,
            Some(secret_string("iv".to_string())),
        );
        let a = salted.notification_uuid(&batch());
        let b = salted.notification_uuid(&batch());
        assert_eq!(a, b);
        assert_ne!(a, batch().digest());
    }
}
