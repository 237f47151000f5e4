//! Server certificate trust decision.
//!
//! The policy is permissive, aimed at self-signed and
//! development certificates rather than production verification:
//!
//! - a certificate that validates is accepted
//! - a certificate whose only problem is the server name is accepted
//! - anything else is put to the user, whose answer is final
//!
//! [`PromptingVerifier`] plugs the policy into rustls. It runs the standard
//! webpki verification first and only consults the policy when that fails.

use std::{fmt, sync::Arc};

use rustls::{
    CertificateError, DigitallySignedStruct, RootCertStore, SignatureScheme,
    client::{
        WebPkiServerVerifier,
        danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier},
    },
    crypto::CryptoProvider,
    pki_types::{CertificateDer, ServerName, UnixTime},
};

/// Why a server certificate failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateIssue {
    /// Certificate is valid but not for the name we connected to.
    NameMismatch,
    /// Chain does not lead to a trusted root (self-signed, private CA).
    UnknownIssuer,
    /// Certificate has expired.
    Expired,
    /// Certificate is not valid yet.
    NotValidYet,
    /// Certificate was revoked.
    Revoked,
    /// Signature on the certificate does not verify.
    BadSignature,
    /// Any other validation failure.
    Other(String),
}

impl From<&CertificateError> for CertificateIssue {
    fn from(error: &CertificateError) -> Self {
        match error {
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. } => {
                Self::NameMismatch
            },
            CertificateError::UnknownIssuer => Self::UnknownIssuer,
            CertificateError::Expired | CertificateError::ExpiredContext { .. } => Self::Expired,
            CertificateError::NotValidYet | CertificateError::NotValidYetContext { .. } => {
                Self::NotValidYet
            },
            CertificateError::Revoked => Self::Revoked,
            CertificateError::BadSignature => Self::BadSignature,
            other => Self::Other(format!("{other:?}")),
        }
    }
}

impl fmt::Display for CertificateIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameMismatch => write!(f, "certificate name does not match the server"),
            Self::UnknownIssuer => write!(f, "certificate issuer is not trusted"),
            Self::Expired => write!(f, "certificate has expired"),
            Self::NotValidYet => write!(f, "certificate is not valid yet"),
            Self::Revoked => write!(f, "certificate has been revoked"),
            Self::BadSignature => write!(f, "certificate signature is invalid"),
            Self::Other(detail) => write!(f, "certificate rejected: {detail}"),
        }
    }
}

/// Outcome of standard certificate validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateCheck {
    /// No validation error.
    Valid,
    /// Validation failed for this reason.
    Invalid(CertificateIssue),
}

/// Asks the user whether to trust a certificate that failed validation.
///
/// Called synchronously from inside the TLS handshake.
pub trait TrustPrompt: Send + Sync + fmt::Debug {
    /// Present `issue` and return the user's yes/no answer.
    fn confirm_untrusted(&self, issue: &CertificateIssue) -> bool;
}

/// Permissive trust decision.
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    prompt: Arc<dyn TrustPrompt>,
}

impl TrustPolicy {
    /// Policy that asks `prompt` about certificates it cannot auto-accept.
    pub fn new(prompt: impl TrustPrompt + 'static) -> Self {
        Self { prompt: Arc::new(prompt) }
    }

    /// Decide whether to proceed with the handshake.
    ///
    /// Valid certificates and name mismatches are accepted without asking.
    /// Every other issue is asked about exactly once; nothing is cached.
    pub fn decide(&self, check: &CertificateCheck) -> bool {
        match check {
            CertificateCheck::Valid | CertificateCheck::Invalid(CertificateIssue::NameMismatch) => {
                true
            },
            CertificateCheck::Invalid(issue) => {
                tracing::warn!("Server certificate failed validation: {}", issue);
                let accepted = self.prompt.confirm_untrusted(issue);
                if accepted {
                    tracing::warn!("User accepted untrusted certificate");
                }
                accepted
            },
        }
    }
}

/// rustls verifier that defers validation failures to a [`TrustPolicy`].
#[derive(Debug)]
pub struct PromptingVerifier {
    inner: Arc<WebPkiServerVerifier>,
    policy: TrustPolicy,
}

impl PromptingVerifier {
    /// Verifier checking against `roots`, falling back to `policy`.
    pub fn new(
        roots: Arc<RootCertStore>,
        provider: Arc<CryptoProvider>,
        policy: TrustPolicy,
    ) -> Result<Self, rustls::client::VerifierBuilderError> {
        let inner = WebPkiServerVerifier::builder_with_provider(roots, provider).build()?;
        Ok(Self { inner, policy })
    }
}

impl ServerCertVerifier for PromptingVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let error = match self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        ) {
            Ok(verified) => return Ok(verified),
            Err(rustls::Error::InvalidCertificate(error)) => error,
            Err(other) => return Err(other),
        };

        let check = CertificateCheck::Invalid(CertificateIssue::from(&error));
        if self.policy.decide(&check) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(error))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
