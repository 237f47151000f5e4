//! Client
//!
//! Session lifecycle for the talkline text-chat protocol: connection
//! establishment, optional TLS upgrade with a trust decision, the
//! login/register handshake, and the duplex message loop.
//!
//! # Architecture
//!
//! The library never touches the terminal directly. Terminal I/O enters
//! through three capabilities the caller supplies:
//!
//! - [`Prompt`]: line and masked-secret input
//! - [`Screen`]: text output
//! - [`TrustPrompt`]: the yes/no question asked for untrusted certificates
//!
//! The generic [`Runtime`] strings the components together. Frontends (the
//! terminal binary, the test harness) only implement the capabilities.
//!
//! # Components
//!
//! - [`Connector`]: TCP connect with timeout, optional TLS ([`Transport`])
//! - [`TrustPolicy`]: permissive certificate trust decision
//! - [`Handshake`]: login/register exchange
//! - [`Session`]: concurrent inbound reader and outbound writer
//! - [`Shutdown`]: monotone stop signal shared by both halves
//! - [`SavedList`]: flat-file lists of known servers and usernames

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
mod config;
mod console;
mod endpoint;
mod error;
pub mod handshake;
pub mod menu;
mod runtime;
pub mod session;
mod shutdown;
mod store;
pub mod transport;
pub mod trust;

pub use config::ClientConfig;
pub use console::{Prompt, Screen, ask, confirm, is_affirmative};
pub use endpoint::{Endpoint, EndpointParseError};
pub use error::SessionError;
pub use handshake::{AuthMode, Credentials, Handshake, HandshakeOutcome};
pub use runtime::{RunReport, Runtime};
pub use session::{InboundEnd, OutboundEnd, Session, SessionReport};
pub use shutdown::Shutdown;
pub use store::{ListEntry, SavedList, StoreError};
pub use transport::{Connector, Transport};
pub use trust::{CertificateCheck, CertificateIssue, TrustPolicy, TrustPrompt};
