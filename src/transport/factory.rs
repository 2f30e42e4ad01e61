//! Transport factory and dispatch entry point
//!
//! The factory examines the `type` tag of a [`TransportConfig`] and
//! builds the matching transport adapter; [`dispatch`] wraps the send in
//! the variant's retry policy. Adding a transport variant extends the
//! match arms here, checked for exhaustiveness at compile time.

use crate::domain::{Result, TransportError};
use crate::settings::{secret_string_opt, TransportConfig};
use crate::transport::as2::As2Transport;
use crate::transport::blob::BlobTransport;
use crate::transport::email::{EmailTransport, SENDGRID_API_KEY_VAR};
use crate::transport::ftps::FtpsTransport;
use crate::transport::gaen::GaenTransport;
use crate::transport::retry::{send_with_retry, RetryPolicy};
use crate::transport::sftp::SftpTransport;
use crate::transport::traits::{DeliveryReceipt, RenderedBatch, Transport};
use std::sync::Arc;

/// Creates a transport adapter for the configured variant
pub fn create_transport(config: &TransportConfig) -> Result<Arc<dyn Transport>> {
    let transport: Arc<dyn Transport> = match config {
        TransportConfig::Sftp {
            host,
            port,
            file_path,
            username,
            password,
        } => Arc::new(SftpTransport::new(
            host.clone(),
            *port,
            file_path.clone(),
            username.clone(),
            password.clone(),
        )),

        TransportConfig::Ftps {
            host,
            port,
            username,
            password,
            protocol,
            binary_transfer,
            accept_all_certs,
        } => Arc::new(FtpsTransport::new(
            host.clone(),
            *port,
            username.clone(),
            password.clone(),
            *protocol,
            *binary_transfer,
            *accept_all_certs,
        )),

        TransportConfig::As2 {
            receiver_url,
            receiver_id,
            sender_id,
            sender_email,
            mime_type,
            content_description,
        } => Arc::new(As2Transport::new(
            receiver_url.clone(),
            receiver_id.clone(),
            sender_id.clone(),
            sender_email.clone(),
            mime_type.clone(),
            content_description.clone(),
        )),

        TransportConfig::Email { addresses, from } => {
            let api_key = secret_string_opt(std::env::var(SENDGRID_API_KEY_VAR).ok());
            Arc::new(EmailTransport::new(addresses.clone(), from.clone(), api_key))
        }

        TransportConfig::BlobStore {
            storage_account_url,
            container_name,
            sas_token,
        } => Arc::new(BlobTransport::new(
            storage_account_url.clone(),
            container_name.clone(),
            sas_token.clone(),
        )),

        TransportConfig::Gaen {
            api_url,
            uuid_format,
            uuid_iv,
        } => Arc::new(GaenTransport::new(
            api_url.clone(),
            *uuid_format,
            uuid_iv.clone(),
        )),
    };
    Ok(transport)
}

/// The retry bound for a transport variant
fn retry_policy(config: &TransportConfig) -> RetryPolicy {
    match config {
        TransportConfig::As2 { .. } => RetryPolicy::as2(),
        _ => RetryPolicy::default(),
    }
}

/// Sends a rendered batch through the configured transport
///
/// Applies the variant's bounded retry policy; the pending batch is
/// untouched on failure so the scheduler can re-attempt it.
///
/// # Errors
///
/// Returns the final [`TransportError`] when the retry budget is
/// exhausted or the failure is not retryable.
pub async fn dispatch(
    batch: &RenderedBatch,
    config: &TransportConfig,
) -> std::result::Result<DeliveryReceipt, TransportError> {
    let transport = create_transport(config)
        .map_err(|e| TransportError::rejected(format!("transport setup failed: {e}")))?;
    let policy = retry_policy(config);
    send_with_retry(transport.as_ref(), batch, &policy).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_covers_every_variant() {
        let configs = [
            toml::from_str::<TransportConfig>(
                "type = \"SFTP\"\nhost = \"h\"\nfilePath = \"./u\"\nusername = \"u\"",
            )
            .unwrap(),
            toml::from_str::<TransportConfig>(
                "type = \"FTPS\"\nhost = \"h\"\nusername = \"u\"",
            )
            .unwrap(),
            toml::from_str::<TransportConfig>(
                "type = \"AS2\"\nreceiverUrl = \"https://x/r\"\nreceiverId = \"r\"\nsenderId = \"s\"",
            )
            .unwrap(),
            toml::from_str::<TransportConfig>(
                "type = \"EMAIL\"\naddresses = [\"a@b.gov\"]",
            )
            .unwrap(),
            toml::from_str::<TransportConfig>(
                "type = \"BLOBSTORE\"\nstorageAccountUrl = \"https://acct\"\ncontainerName = \"c\"",
            )
            .unwrap(),
            toml::from_str::<TransportConfig>("type = \"GAEN\"\napiUrl = \"https://x/n\"")
                .unwrap(),
        ];

        for config in &configs {
            let transport = create_transport(config).unwrap();
            assert!(!transport.description().is_empty());
        }
    }

    #[test]
    fn test_as2_gets_single_retry_policy() {
        let config = toml::from_str::<TransportConfig>(
            "type = \"AS2\"\nreceiverUrl = \"https://x/r\"\nreceiverId = \"r\"\nsenderId = \"s\"",
        )
        .unwrap();
        assert_eq!(retry_policy(&config).max_retries, 1);

        let config =
            toml::from_str::<TransportConfig>("type = \"GAEN\"\napiUrl = \"https://x/n\"").unwrap();
        assert_eq!(retry_policy(&config).max_retries, 2);
    }
}
