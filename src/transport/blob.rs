//! Blob store transport
//!
//! Uploads the rendered batch to an Azure Blob Storage container through
//! the Put Blob REST operation, authorized with a SAS token. Receivers
//! that poll a shared container for their batches use this transport.

use crate::domain::TransportError;
use crate::settings::SecretString;
use crate::transport::http::{classify_request_error, classify_status, http_client};
use crate::transport::traits::{DeliveryReceipt, RenderedBatch, Transport};
use async_trait::async_trait;
use secrecy::ExposeSecret;

const STORAGE_API_VERSION: &str = "2021-08-06";

pub struct BlobTransport {
    storage_account_url: String,
    container_name: String,
    sas_token: Option<SecretString>,
}

impl BlobTransport {
    pub fn new(
        storage_account_url: String,
        container_name: String,
        sas_token: Option<SecretString>,
    ) -> Self {
        Self {
            storage_account_url: storage_account_url.trim_end_matches('/').to_string(),
            container_name,
            sas_token,
        }
    }

    fn blob_url(&self, filename: &str) -> String {
        let base = format!(
            "{}/{}/{}",
            self.storage_account_url, self.container_name, filename
        );
        match &self.sas_token {
            Some(token) => format!("{base}?{}", token.expose_secret()),
            None => base,
        }
    }
}

#[async_trait]
impl Transport for BlobTransport {
    async fn send(&self, batch: &RenderedBatch) -> Result<DeliveryReceipt, TransportError> {
        let blob_path = format!("{}/{}", batch.receiver, batch.filename);
        let client = http_client()?;

        let response = client
            .put(self.blob_url(&blob_path))
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", batch.format.mime_type())
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
            format!("{}/{}", self.container_name, blob_path),
        ))
    }

    fn description(&self) -> String {
        format!("BLOBSTORE {}", self.container_name)
    }
}
