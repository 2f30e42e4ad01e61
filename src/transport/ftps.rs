//! FTPS transport
//!
//! Uploads the rendered batch over FTP with explicit TLS (AUTH TLS).
//! Like the SFTP adapter, the blocking client runs on the blocking pool
//! under an outer deadline, and the control/data connections are closed
//! on every exit path.

use crate::domain::TransportError;
use crate::settings::{FtpsProtocol, SecretString};
use crate::transport::traits::{
    DeliveryReceipt, RenderedBatch, Transport, CONNECT_TIMEOUT, READ_TIMEOUT,
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::io::Cursor;
use std::net::ToSocketAddrs;
use suppaftp::native_tls::{Protocol, TlsConnector};
use suppaftp::types::FileType;
use suppaftp::{NativeTlsConnector, NativeTlsFtpStream};

pub struct FtpsTransport {
    host: String,
    port: u16,
    username: String,
    password: Option<SecretString>,
    protocol: FtpsProtocol,
    binary_transfer: bool,
    accept_all_certs: bool,
}

impl FtpsTransport {
    pub fn new(
        host: String,
        port: u16,
        username: String,
        password: Option<SecretString>,
        protocol: FtpsProtocol,
        binary_transfer: bool,
        accept_all_certs: bool,
    ) -> Self {
        Self {
            host,
            port,
            username,
            password,
            protocol,
            binary_transfer,
            accept_all_certs,
        }
    }
}

#[async_trait]
impl Transport for FtpsTransport {
    async fn send(&self, batch: &RenderedBatch) -> Result<DeliveryReceipt, TransportError> {
        let host = self.host.clone();
        let port = self.port;
        let username = self.username.clone();
        let password = self.password.as_ref().map(|p| p.expose_secret().to_string());
        let protocol = self.protocol;
        let binary = self.binary_transfer;
        let accept_all_certs = self.accept_all_certs;
        let filename = batch.filename.clone();
        let content = batch.content.clone();

        let upload = tokio::task::spawn_blocking(move || {
            upload_blocking(
                &host,
                port,
                &username,
                password.as_deref(),
                protocol,
                binary,
                accept_all_certs,
                &filename,
                &content,
            )
        });

        match tokio::time::timeout(CONNECT_TIMEOUT + READ_TIMEOUT, upload).await {
            Err(_) => Err(TransportError::timeout(format!(
                "FTPS upload to {}:{} exceeded the transfer deadline",
                self.host, self.port
            ))),
            Ok(Err(join_err)) => Err(TransportError::unreachable(format!(
                "FTPS worker failed: {join_err}"
            ))),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Ok(Ok(()))) => Ok(DeliveryReceipt::for_batch(
                batch,
                self.description(),
                batch.filename.clone(),
            )),
        }
    }

    fn description(&self) -> String {
        format!("FTPS {}:{}", self.host, self.port)
    }
}

#[allow(clippy::too_many_arguments)]
fn upload_blocking(
    host: &str,
    port: u16,
    username: &str,
    password: Option<&str>,
    protocol: FtpsProtocol,
    binary: bool,
    accept_all_certs: bool,
    filename: &str,
    content: &str,
) -> Result<(), TransportError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::unreachable(format!("cannot resolve {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| {
            TransportError::unreachable(format!("no addresses for {host}:{port}"))
        })?;

    let stream = NativeTlsFtpStream::connect_timeout(addr, CONNECT_TIMEOUT).map_err(|e| {
        TransportError::unreachable(format!("connect to {host}:{port} failed: {e}"))
    })?;

    let mut builder = TlsConnector::builder();
    if let FtpsProtocol::Tls = protocol {
        builder.min_protocol_version(Some(Protocol::Tlsv12));
    }
    if accept_all_certs {
        builder
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true);
    }
    let connector = builder
        .build()
        .map_err(|e| TransportError::unreachable(format!("TLS setup failed: {e}")))?;

    // The overall transfer deadline is enforced by the caller's timeout
    // around the blocking task.
    let mut stream = stream
        .into_secure(NativeTlsConnector::from(connector), host)
        .map_err(|e| TransportError::unreachable(format!("TLS negotiation failed: {e}")))?;

    stream
        .login(username, password.unwrap_or_default())
        .map_err(|e| TransportError::auth_failure(format!("FTPS login failed: {e}")))?;

    if binary {
        stream
            .transfer_type(FileType::Binary)
            .map_err(|e| TransportError::rejected(format!("cannot set binary mode: {e}")))?;
    }

    stream
        .put_file(filename, &mut Cursor::new(content.as_bytes()))
        .map_err(|e| TransportError::rejected(format!("upload of {filename} failed: {e}")))?;

    let _ = stream.quit();
    Ok(())
}
