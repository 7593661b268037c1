//! # Transport
//!
//! Purpose: Open the byte stream behind a connection: plain TCP, TLS over
//! TCP, or a unix domain socket.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::config::{ConnectionInfo, Endpoint};
use crate::error::{ClientError, ClientResult, TimeoutPhase};

/// A connected stream of any supported kind.
pub(crate) enum Transport {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
            #[cfg(unix)]
            Transport::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
            #[cfg(unix)]
            Transport::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
            #[cfg(unix)]
            Transport::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
            #[cfg(unix)]
            Transport::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Opens a stream to `info`'s endpoint, performing the TLS handshake for
/// `rediss://`.
pub(crate) async fn connect(
    info: &ConnectionInfo,
    tls: Option<&Arc<rustls::ClientConfig>>,
) -> ClientResult<Transport> {
    match &info.endpoint {
        Endpoint::Tcp { host, port, tls: false } => {
            let stream = TcpStream::connect((host.as_str(), *port)).await?;
            // Disable Nagle to keep request latency low for small payloads.
            stream.set_nodelay(true)?;
            Ok(Transport::Tcp(stream))
        }
        Endpoint::Tcp { host, port, tls: true } => {
            let stream = TcpStream::connect((host.as_str(), *port)).await?;
            stream.set_nodelay(true)?;
            debug!(host = %host, port = *port, "starting TLS handshake");

            let config = match tls {
                Some(config) => Arc::clone(config),
                None => default_tls_config(),
            };
            let domain = rustls::pki_types::ServerName::try_from(host.as_str())
                .map_err(|_| ClientError::Tls(format!("invalid TLS domain name: {host}")))?
                .to_owned();
            let stream = TlsConnector::from(config)
                .connect(domain, stream)
                .await
                .map_err(|err| ClientError::Tls(format!("TLS handshake failed: {err}")))?;
            Ok(Transport::Tls(Box::new(stream)))
        }
        #[cfg(unix)]
        Endpoint::Unix { path } => Ok(Transport::Unix(UnixStream::connect(path).await?)),
        #[cfg(not(unix))]
        Endpoint::Unix { .. } => Err(ClientError::Unsupported(
            "unix sockets are not available on this platform".into(),
        )),
    }
}

/// Client config trusting the webpki root set.
pub(crate) fn default_tls_config() -> Arc<rustls::ClientConfig> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Arc::new(config)
}

/// Runs `fut`, failing with `Timeout(phase)` once `limit` elapses.
pub(crate) async fn with_timeout<T, F>(
    phase: TimeoutPhase,
    limit: Option<Duration>,
    fut: F,
) -> ClientResult<T>
where
    F: Future<Output = ClientResult<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ClientError::Timeout(phase))?,
        None => fut.await,
    }
}
