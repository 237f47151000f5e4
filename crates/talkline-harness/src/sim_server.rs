//! Scriptable chat server for integration tests.
//!
//! `SimServer` binds a loopback port and hands out one [`SimConnection`] per
//! accepted client. Tests drive the server side explicitly: send a banner,
//! read a request, reply, close. Nothing runs autonomously.
//!
//! Secure servers present an `rcgen` certificate, either self-signed (so the
//! client sees an unknown issuer) or issued by a [`TestCa`] the client can be
//! told to trust.

use std::{io, net::SocketAddr, sync::Arc};

use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use talkline_client::Endpoint;
use thiserror::Error;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};
use tokio_rustls::TlsAcceptor;

/// Harness setup failures.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Certificate generation failed.
    #[error("certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    /// TLS configuration was rejected.
    #[error("TLS configuration failed: {0}")]
    Tls(#[from] rustls::Error),
}

/// Throwaway certificate authority.
pub struct TestCa {
    cert: Certificate,
    key: KeyPair,
}

impl TestCa {
    /// Generate a new CA.
    pub fn generate() -> Result<Self, HarnessError> {
        let key = KeyPair::generate()?;
        let mut params = CertificateParams::new(Vec::<String>::new())?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        params.distinguished_name.push(DnType::CommonName, "talkline test CA");
        let cert = params.self_signed(&key)?;
        Ok(Self { cert, key })
    }

    /// CA certificate in PEM form, for `ClientConfig::extra_roots`.
    pub fn pem(&self) -> String {
        self.cert.pem()
    }

    /// Issue a server certificate for `names`.
    fn issue(
        &self,
        names: &[&str],
    ) -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>), HarnessError> {
        let key = KeyPair::generate()?;
        let mut params = CertificateParams::new(to_names(names))?;
        params.extended_key_usages = vec![ExtendedKeyUsagePurpose::ServerAuth];
        let common_name = names.first().copied().unwrap_or("talkline test server");
        params.distinguished_name.push(DnType::CommonName, common_name);
        let cert = params.signed_by(&key, &self.cert, &self.key)?;
        Ok((cert.der().clone(), private_key(&key)))
    }
}

impl std::fmt::Debug for TestCa {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCa").finish_non_exhaustive()
    }
}

fn to_names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

fn private_key(key: &KeyPair) -> PrivateKeyDer<'static> {
    PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der()))
}

/// Scriptable server bound to a loopback port.
pub struct SimServer {
    listener: TcpListener,
    addr: SocketAddr,
    tls: Option<TlsAcceptor>,
}

impl SimServer {
    /// Plain TCP server.
    pub async fn plain() -> Result<Self, HarnessError> {
        Self::bind(None).await
    }

    /// TLS server with a self-signed certificate for `names`.
    pub async fn self_signed(names: &[&str]) -> Result<Self, HarnessError> {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(to_names(names))?;
        let acceptor = acceptor(cert.der().clone(), private_key(&key_pair))?;
        Self::bind(Some(acceptor)).await
    }

    /// TLS server with a certificate for `names` issued by `ca`.
    pub async fn issued_by(ca: &TestCa, names: &[&str]) -> Result<Self, HarnessError> {
        let (cert, key) = ca.issue(names)?;
        Self::bind(Some(acceptor(cert, key)?)).await
    }

    async fn bind(tls: Option<TlsAcceptor>) -> Result<Self, HarnessError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tracing::debug!("SimServer listening on {}", addr);
        Ok(Self { listener, addr, tls })
    }

    /// Where clients should connect.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(self.addr.ip().to_string(), self.addr.port(), self.tls.is_some())
    }

    /// Accept one client, completing the TLS handshake if secure.
    pub async fn accept(&self) -> io::Result<SimConnection> {
        let (tcp, peer) = self.listener.accept().await?;
        tracing::debug!("SimServer accepted {}", peer);

        let stream: Box<dyn ServerStream> = match &self.tls {
            None => Box::new(tcp),
            Some(acceptor) => Box::new(acceptor.accept(tcp).await?),
        };
        Ok(SimConnection { stream })
    }
}

fn acceptor(
    cert: CertificateDer<'static>,
    key: PrivateKeyDer<'static>,
) -> Result<TlsAcceptor, HarnessError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(vec![cert], key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

trait ServerStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ServerStream for T {}

/// Server side of one client connection.
pub struct SimConnection {
    stream: Box<dyn ServerStream>,
}

impl SimConnection {
    /// Send `text` in one write.
    pub async fn send(&mut self, text: &str) -> io::Result<()> {
        self.stream.write_all(text.as_bytes()).await?;
        self.stream.flush().await
    }

    /// Read one chunk. Empty once the client has closed.
    pub async fn recv(&mut self) -> io::Result<String> {
        let mut buf = vec![0u8; 4096];
        let n = self.stream.read(&mut buf).await?;
        Ok(String::from_utf8_lossy(&buf[..n]).into_owned())
    }

    /// Read until the accumulated text contains `needle`.
    ///
    /// Fails with `UnexpectedEof` if the client closes first.
    pub async fn recv_until(&mut self, needle: &str) -> io::Result<String> {
        let mut text = String::new();
        while !text.contains(needle) {
            let chunk = self.recv().await?;
            if chunk.is_empty() {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("client closed before sending {needle:?}; got {text:?}"),
                ));
            }
            text.push_str(&chunk);
        }
        Ok(text)
    }

    /// Read everything until the client closes.
    pub async fn recv_to_end(&mut self) -> io::Result<String> {
        let mut bytes = Vec::new();
        self.stream.read_to_end(&mut bytes).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Close the connection. The client sees a zero-length read.
    pub async fn close(mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}

impl std::fmt::Debug for SimConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimConnection").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for SimServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimServer")
            .field("addr", &self.addr)
            .field("secure", &self.tls.is_some())
            .finish()
    }
}

