//! Email transport
//!
//! Delivers the rendered batch as an email through the SendGrid HTTP
//! API. The API key comes from the `COURIER_SENDGRID_API_KEY`
//! environment variable so it never appears in settings files.

use crate::domain::TransportError;
use crate::settings::SecretString;
use crate::transport::http::{classify_request_error, classify_status, http_client};
use crate::transport::traits::{DeliveryReceipt, RenderedBatch, Transport};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;

/// Environment variable holding the SendGrid API key
pub const SENDGRID_API_KEY_VAR: &str = "COURIER_SENDGRID_API_KEY";

const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

pub struct EmailTransport {
    addresses: Vec<String>,
    from: String,
    api_base: String,
    api_key: Option<SecretString>,
}

impl EmailTransport {
    pub fn new(addresses: Vec<String>, from: String, api_key: Option<SecretString>) -> Self {
        Self {
            addresses,
            from,
            api_base: SENDGRID_API_BASE.to_string(),
            api_key,
        }
    }

    /// Points the transport at a different API host (for tests)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

#[async_trait]
impl Transport for EmailTransport {
    async fn send(&self, batch: &RenderedBatch) -> Result<DeliveryReceipt, TransportError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| {
                TransportError::auth_failure(format!("{SENDGRID_API_KEY_VAR} is not set"))
            })?;

        let payload = json!({
            "personalizations": [{
                "to": self.addresses.iter().map(|a| json!({"email": a})).collect::<Vec<_>>(),
            }],
            "from": { "email": self.from },
            "subject": format!("{} report delivery: {}", batch.receiver, batch.filename),
            "content": [{
                "type": "text/plain",
                "value": format!(
                    "{} report(s) attached as {}.",
                    batch.item_count, batch.filename
                ),
            }],
            "attachments": [{
                "content": base64_encode(batch.content.as_bytes()),
                "type": batch.format.mime_type(),
                "filename": batch.filename,
            }],
        });

        let client = http_client()?;
        let response = client
            .post(format!("{}/v3/mail/send", self.api_base))
            .bearer_auth(api_key.expose_secret())
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
            self.addresses.join(", "),
        ))
    }

    fn description(&self) -> String {
        format!("EMAIL to {} address(es)", self.addresses.len())
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine as _;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReportFormat, TransportErrorKind};
    use crate::settings::secret_string;

    fn batch() -> RenderedBatch {
        RenderedBatch {
            receiver: "pa-phd.daily".to_string(),
            format: ReportFormat::Csv,
            filename: "daily.csv".to_string(),
            content: "a,b\n".to_string(),
            item_count: 2,
        }
    }

    #[tokio::test]
    async fn test_send_via_sendgrid_api() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3/mail/send")
            .match_header("authorization", "Bearer sg-key")
            .with_status(202)
            .create_async()
            .await;

        let transport = EmailTransport::new(
            vec!["health@pa.gov".to_string()],
            "courier@localhost".to_string(),
            Some(secret_string("sg-key".to_string())),
        )
        .with_api_base(server.url());

        let receipt = transport.send(&batch()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(receipt.destination, "health@pa.gov");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_auth_failure() {
        let transport = EmailTransport::new(
            vec!["health@pa.gov".to_string()],
            "courier@localhost".to_string(),
            None,
        );
        let err = transport.send(&batch()).await.unwrap_err();
        assert_eq!(err.kind, TransportErrorKind::AuthFailure);
    }
}
