//! Transport configuration
//!
//! A receiver's transport settings are a closed polymorphic set
//! discriminated by a `type` tag: SFTP, FTPS, AS2, EMAIL, BLOBSTORE, or
//! GAEN. Each variant carries its own connection attributes; the
//! dispatcher factory turns a variant into a concrete transport adapter.

use crate::settings::secret::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

/// TLS mode for FTPS connections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FtpsProtocol {
    /// Explicit TLS (AUTH TLS)
    #[default]
    Tls,
    /// Legacy implicit SSL
    Ssl,
}

/// UUID rendition for GAEN notifications
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GaenUuidFormat {
    /// Use the report id verbatim
    #[default]
    ReportId,
    /// WA-notify style hash of phone number and test date
    WaNotify,
}

/// Polymorphic transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportConfig {
    #[serde(rename = "SFTP", rename_all = "camelCase")]
    Sftp {
        host: String,
        #[serde(default = "default_sftp_port")]
        port: u16,
        /// Remote directory batches are written into
        file_path: String,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<SecretString>,
    },

    #[serde(rename = "FTPS", rename_all = "camelCase")]
    Ftps {
        host: String,
        #[serde(default = "default_ftps_port")]
        port: u16,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<SecretString>,
        #[serde(default)]
        protocol: FtpsProtocol,
        #[serde(default = "default_true")]
        binary_transfer: bool,
        #[serde(default)]
        accept_all_certs: bool,
    },

    #[serde(rename = "AS2", rename_all = "camelCase")]
    As2 {
        receiver_url: String,
        receiver_id: String,
        sender_id: String,
        #[serde(default = "default_sender_email")]
        sender_email: String,
        #[serde(default = "default_mime_type")]
        mime_type: String,
        #[serde(default = "default_content_description")]
        content_description: String,
    },

    #[serde(rename = "EMAIL", rename_all = "camelCase")]
    Email {
        addresses: Vec<String>,
        #[serde(default = "default_from_email")]
        from: String,
    },

    #[serde(rename = "BLOBSTORE", rename_all = "camelCase")]
    BlobStore {
        /// Storage account endpoint, e.g. `https://acct.blob.core.windows.net`
        storage_account_url: String,
        container_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sas_token: Option<SecretString>,
    },

    #[serde(rename = "GAEN", rename_all = "camelCase")]
    Gaen {
        api_url: String,
        #[serde(default)]
        uuid_format: GaenUuidFormat,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uuid_iv: Option<SecretString>,
    },
}

fn default_sftp_port() -> u16 {
    22
}

fn default_ftps_port() -> u16 {
    21
}

fn default_true() -> bool {
    true
}

fn default_sender_email() -> String {
    "courier@localhost".to_string()
}

fn default_from_email() -> String {
    "courier@localhost".to_string()
}

fn default_mime_type() -> String {
    "application/hl7-v2".to_string()
}

fn default_content_description() -> String {
    "Electronic Lab Results".to_string()
}

impl TransportConfig {
    /// The discriminant tag, as it appears in settings files
    pub fn type_name(&self) -> &'static str {
        match self {
            TransportConfig::Sftp { .. } => "SFTP",
            TransportConfig::Ftps { .. } => "FTPS",
            TransportConfig::As2 { .. } => "AS2",
            TransportConfig::Email { .. } => "EMAIL",
            TransportConfig::BlobStore { .. } => "BLOBSTORE",
            TransportConfig::Gaen { .. } => "GAEN",
        }
    }

    /// Validates the connection attributes
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid value
    pub fn validate(&self) -> Result<(), String> {
        match self {
            TransportConfig::Sftp {
                host,
                port,
                file_path,
                username,
                ..
            } => {
                require_non_blank("host", host)?;
                require_non_blank("filePath", file_path)?;
                require_non_blank("username", username)?;
                require_port(*port)
            }
            TransportConfig::Ftps {
                host,
                port,
                username,
                ..
            } => {
                require_non_blank("host", host)?;
                require_non_blank("username", username)?;
                require_port(*port)
            }
            TransportConfig::As2 {
                receiver_url,
                receiver_id,
                sender_id,
                ..
            } => {
                require_url("receiverUrl", receiver_url)?;
                require_non_blank("receiverId", receiver_id)?;
                require_non_blank("senderId", sender_id)
            }
            TransportConfig::Email { addresses, from } => {
                if addresses.is_empty() {
                    return Err("EMAIL transport requires at least one address".to_string());
                }
                for address in addresses {
                    if !address.contains('@') {
                        return Err(format!("Invalid email address: {address}"));
                    }
                }
                require_non_blank("from", from)
            }
            TransportConfig::BlobStore {
                storage_account_url,
                container_name,
                ..
            } => {
                require_url("storageAccountUrl", storage_account_url)?;
                require_non_blank("containerName", container_name)
            }
            TransportConfig::Gaen { api_url, .. } => require_url("apiUrl", api_url),
        }
    }
}

fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{field} cannot be blank"))
    } else {
        Ok(())
    }
}

fn require_port(port: u16) -> Result<(), String> {
    if port == 0 {
        Err("port cannot be zero".to_string())
    } else {
        Ok(())
    }
}

fn require_url(field: &str, value: &str) -> Result<(), String> {
    Url::parse(value).map_err(|e| format!("Invalid {field} '{value}': {e}"))?;
    Ok(())
}
