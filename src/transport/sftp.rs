//! SFTP transport
//!
//! Writes the rendered batch as a file into the receiver's upload
//! directory over SSH. The ssh2 session is blocking, so the whole
//! exchange runs on the blocking pool under an outer deadline; the
//! session and its TCP stream are dropped (and so released) on every
//! exit path.

use crate::domain::TransportError;
use crate::settings::SecretString;
use crate::transport::traits::{
    DeliveryReceipt, RenderedBatch, Transport, CONNECT_TIMEOUT, READ_TIMEOUT,
};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use ssh2::Session;
use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;

pub struct SftpTransport {
    host: String,
    port: u16,
    file_path: String,
    username: String,
    password: Option<SecretString>,
}

impl SftpTransport {
    pub fn new(
        host: String,
        port: u16,
        file_path: String,
        username: String,
        password: Option<SecretString>,
    ) -> Self {
        Self {
            host,
            port,
            file_path,
            username,
            password,
        }
    }

    fn remote_path(&self, filename: &str) -> String {
        format!("{}/{}", self.file_path.trim_end_matches('/'), filename)
    }
}

#[async_trait]
impl Transport for SftpTransport {
    async fn send(&self, batch: &RenderedBatch) -> Result<DeliveryReceipt, TransportError> {
        let host = self.host.clone();
        let port = self.port;
        let username = self.username.clone();
        let password = self.password.as_ref().map(|p| p.expose_secret().to_string());
        let remote_path = self.remote_path(&batch.filename);
        let destination = remote_path.clone();
        let content = batch.content.clone();

        let upload = tokio::task::spawn_blocking(move || {
            upload_blocking(&host, port, &username, password.as_deref(), &remote_path, &content)
        });

        match tokio::time::timeout(CONNECT_TIMEOUT + READ_TIMEOUT, upload).await {
            Err(_) => Err(TransportError::timeout(format!(
                "SFTP upload to {}:{} exceeded the transfer deadline",
                self.host, self.port
            ))),
            Ok(Err(join_err)) => Err(TransportError::unreachable(format!(
                "SFTP worker failed: {join_err}"
            ))),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Ok(Ok(()))) => Ok(DeliveryReceipt::for_batch(
                batch,
                self.description(),
                destination,
            )),
        }
    }

    fn description(&self) -> String {
        format!("SFTP {}:{}", self.host, self.port)
    }
}

fn upload_blocking(
    host: &str,
    port: u16,
    username: &str,
    password: Option<&str>,
    remote_path: &str,
    content: &str,
) -> Result<(), TransportError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::unreachable(format!("cannot resolve {host}:{port}: {e}")))?
        .next()
        .ok_or_else(|| {
            TransportError::unreachable(format!("no addresses for {host}:{port}"))
        })?;

    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(|e| {
        if e.kind() == std::io::ErrorKind::TimedOut {
            TransportError::timeout(format!("connect to {host}:{port} timed out"))
        } else {
            TransportError::unreachable(format!("connect to {host}:{port} failed: {e}"))
        }
    })?;
    tcp.set_read_timeout(Some(READ_TIMEOUT))
        .and_then(|_| tcp.set_write_timeout(Some(READ_TIMEOUT)))
        .map_err(|e| TransportError::unreachable(format!("socket setup failed: {e}")))?;

    let mut session = Session::new()
        .map_err(|e| TransportError::unreachable(format!("SSH session init failed: {e}")))?;
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| TransportError::unreachable(format!("SSH handshake failed: {e}")))?;

    session
        .userauth_password(username, password.unwrap_or_default())
        .map_err(|e| TransportError::auth_failure(format!("SFTP auth failed: {e}")))?;
    if !session.authenticated() {
        return Err(TransportError::auth_failure("SFTP auth was not accepted"));
    }

    let sftp = session
        .sftp()
        .map_err(|e| TransportError::rejected(format!("SFTP subsystem unavailable: {e}")))?;
    let mut remote = sftp
        .create(Path::new(remote_path))
        .map_err(|e| TransportError::rejected(format!("cannot create {remote_path}: {e}")))?;
    remote
        .write_all(content.as_bytes())
        .map_err(|e| TransportError::rejected(format!("write to {remote_path} failed: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReportFormat, TransportErrorKind};

    #[tokio::test]
    async fn test_unreachable_host_is_classified() {
        // Nothing listens on this port.
        let transport = SftpTransport::new(
            "127.0.0.1".to_string(),
            1,
            "./upload".to_string(),
            "courier".to_string(),
            None,
        );
        let batch = RenderedBatch {
            receiver: "pa-phd.elr".to_string(),
            format: ReportFormat::Csv,
            filename: "f.csv".to_string(),
            content: "x".to_string(),
            item_count: 1,
        };

        let err = transport.send(&batch).await.unwrap_err();
        assert!(matches!(
            err.kind,
            TransportErrorKind::Unreachable | TransportErrorKind::Timeout
        ));
        assert!(err.retryable);
    }

    #[test]
    fn test_remote_path_joins_cleanly() {
        let transport = SftpTransport::new(
            "h".to_string(),
            22,
            "./upload/".to_string(),
            "u".to_string(),
            None,
        );
        assert_eq!(transport.remote_path("f.csv"), "./upload/f.csv");
    }
}
