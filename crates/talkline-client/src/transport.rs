//! TCP transport with optional TLS upgrade.
//!
//! Provides [`Connector`], which opens a TCP connection within a fixed bound
//! and, for secure endpoints, negotiates TLS as a client. The result is one
//! [`Transport`] byte stream; everything above it is unaware of whether it is
//! encrypted.
//!
//! # Security
//!
//! Server certificates go through the standard webpki verifier (Mozilla roots
//! plus any configured extra anchors). Failures are handed to the
//! [`TrustPolicy`], which may accept them; see [`crate::trust`]. A rejected
//! negotiation is never retried and never falls back to plain TCP.

use std::{
    fs,
    future::Future,
    io,
    net::SocketAddr,
    path::Path,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use rustls::{RootCertStore, pki_types::ServerName};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpStream,
};
use tokio_rustls::{TlsConnector, client::TlsStream};

use crate::{
    ClientConfig, Endpoint, Screen, SessionError,
    trust::{PromptingVerifier, TrustPolicy},
};

/// An established byte stream to the server.
#[derive(Debug)]
pub enum Transport {
    /// Raw TCP.
    Plain(TcpStream),
    /// TLS over TCP.
    Secure(Box<TlsStream<TcpStream>>),
}

impl Transport {
    /// Whether the stream is encrypted.
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Secure(_))
    }
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_read(cx, buf),
            Self::Secure(tls) => Pin::new(tls.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_write(cx, buf),
            Self::Secure(tls) => Pin::new(tls.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_flush(cx),
            Self::Secure(tls) => Pin::new(tls.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(tcp) => Pin::new(tcp).poll_shutdown(cx),
            Self::Secure(tls) => Pin::new(tls.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens [`Transport`]s to endpoints.
#[derive(Debug, Clone)]
pub struct Connector {
    connect_timeout: Duration,
    roots: Arc<RootCertStore>,
    trust: TrustPolicy,
}

impl Connector {
    /// Create a connector using the timeout and trust anchors from `config`.
    pub fn new(config: &ClientConfig, trust: TrustPolicy) -> Result<Self, SessionError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        for path in &config.extra_roots {
            add_pem_roots(&mut roots, path)?;
        }

        Ok(Self { connect_timeout: config.connect_timeout, roots: Arc::new(roots), trust })
    }

    /// Connect to `endpoint`, upgrading to TLS if it is secure.
    ///
    /// Progress is reported on `screen`.
    pub async fn connect<S>(
        &self,
        endpoint: &Endpoint,
        screen: &S,
    ) -> Result<Transport, SessionError>
    where
        S: Screen + ?Sized,
    {
        let addrs = resolve(endpoint, self.connect_timeout).await?;
        let connect = TcpStream::connect(addrs.as_slice());
        let tcp = connect_within(endpoint, self.connect_timeout, connect).await?;
        tracing::info!("TCP connection established to {}", endpoint.address());

        if !endpoint.secure {
            return Ok(Transport::Plain(tcp));
        }

        let tls = self.upgrade(endpoint, tcp).await?;
        tracing::info!("TLS handshake complete with {}", endpoint.address());
        screen.println("Secure connection established successfully.");

        Ok(Transport::Secure(Box::new(tls)))
    }

    /// Run the TLS client handshake over `tcp`.
    ///
    /// On failure the TCP connection is dropped before the error returns.
    async fn upgrade(
        &self,
        endpoint: &Endpoint,
        tcp: TcpStream,
    ) -> Result<TlsStream<TcpStream>, SessionError> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let roots = Arc::clone(&self.roots);
        let verifier = PromptingVerifier::new(roots, Arc::clone(&provider), self.trust.clone())
            .map_err(|e| SessionError::Config(format!("invalid trust anchors: {e}")))?;

        let config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| SessionError::SecurityHandshake(e.to_string()))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(verifier))
            .with_no_client_auth();

        let server_name = ServerName::try_from(endpoint.host.clone()).map_err(|e| {
            SessionError::SecurityHandshake(format!("invalid server name '{}': {e}", endpoint.host))
        })?;

        TlsConnector::from(Arc::new(config)).connect(server_name, tcp).await.map_err(|e| {
            tracing::warn!("TLS handshake with {} failed: {}", endpoint.address(), e);
            SessionError::SecurityHandshake(e.to_string())
        })
    }
}

/// Await `connect`, failing with [`SessionError::ConnectTimeout`] after
/// `bound`.
pub async fn connect_within<T, F>(
    endpoint: &Endpoint,
    bound: Duration,
    connect: F,
) -> Result<T, SessionError>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(bound, connect).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => {
            tracing::debug!("Connect to {} failed: {}", endpoint.address(), e);
            Err(SessionError::from_connect(endpoint, e))
        },
        Err(_) => Err(SessionError::ConnectTimeout { endpoint: endpoint.clone(), after: bound }),
    }
}

/// Resolve `endpoint` to socket addresses within `bound`.
async fn resolve(endpoint: &Endpoint, bound: Duration) -> Result<Vec<SocketAddr>, SessionError> {
    let lookup = tokio::net::lookup_host((endpoint.host.as_str(), endpoint.port));
    let unknown = |source| SessionError::UnknownHost { endpoint: endpoint.clone(), source };

    let addrs: Vec<SocketAddr> = match tokio::time::timeout(bound, lookup).await {
        Ok(Ok(addrs)) => addrs.collect(),
        Ok(Err(e)) => {
            tracing::debug!("Resolving {} failed: {}", endpoint.host, e);
            return Err(unknown(e));
        },
        Err(_) => {
            return Err(SessionError::ConnectTimeout { endpoint: endpoint.clone(), after: bound });
        },
    };

    if addrs.is_empty() {
        return Err(unknown(io::Error::new(io::ErrorKind::NotFound, "no addresses found")));
    }
    Ok(addrs)
}

/// Add every certificate in the PEM file at `path` as a trust anchor.
fn add_pem_roots(roots: &mut RootCertStore, path: &Path) -> Result<(), SessionError> {
    let pem = fs::read(path).map_err(|e| {
        SessionError::Config(format!("failed to read CA certificate '{}': {e}", path.display()))
    })?;

    let certs = rustls_pemfile::certs(&mut &pem[..])
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SessionError::Config(format!("failed to parse '{}': {e}", path.display())))?;

    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(SessionError::Config(format!(
            "no usable certificates in '{}'",
            path.display()
        )));
    }
    if ignored > 0 {
        tracing::warn!("Ignored {} unparsable certificates in {}", ignored, path.display());
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Debug)]
    struct NeverAsked;

    impl crate::TrustPrompt for NeverAsked {
        fn confirm_untrusted(&self, _issue: &crate::CertificateIssue) -> bool {
            false
        }
    }

    struct Silent;

    impl Screen for Silent {
        fn print(&self, _text: &str) {}
        fn println(&self, _text: &str) {}
        fn clear(&self) {}
    }

    fn connector(config: &ClientConfig) -> Connector {
        Connector::new(config, TrustPolicy::new(NeverAsked)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn connect_times_out_after_bound() {
        let endpoint = Endpoint::new("192.0.2.1", 12345, false);
        let pending = std::future::pending::<io::Result<TcpStream>>();

        let err = connect_within(&endpoint, Duration::from_secs(5), pending).await.unwrap_err();

        match err {
            SessionError::ConnectTimeout { endpoint: failed, after } => {
                assert_eq!(failed, endpoint);
                assert_eq!(after, Duration::from_secs(5));
            },
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closed_port_is_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ClientConfig::default();
        let endpoint = Endpoint::new("127.0.0.1", port, false);
        let err = connector(&config).connect(&endpoint, &Silent).await.unwrap_err();

        assert!(matches!(err, SessionError::ConnectRefused { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn plain_endpoint_returns_raw_stream() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });

        let config = ClientConfig::default();
        let endpoint = Endpoint::new("127.0.0.1", addr.port(), false);
        let transport = connector(&config).connect(&endpoint, &Silent).await.unwrap();

        assert!(!transport.is_secure());
        accept.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unresolvable_host_is_unknown_host() {
        let config = ClientConfig::default();
        let endpoint = Endpoint::new("talkline-test.invalid", 12345, false);
        let err = connector(&config).connect(&endpoint, &Silent).await.unwrap_err();

        assert!(matches!(err, SessionError::UnknownHost { .. }), "got {err:?}");
        assert!(err.hint().is_some());
    }

    #[test]
    fn missing_extra_root_is_config_error() {
        let config = ClientConfig {
            extra_roots: vec!["/nonexistent/ca.pem".into()],
            ..ClientConfig::default()
        };
        let err = Connector::new(&config, TrustPolicy::new(NeverAsked)).unwrap_err();
        assert!(matches!(err, SessionError::Config(_)));
    }
}
