//! Frontend errors.

use std::io;

use talkline_client::EndpointParseError;
use thiserror::Error;

/// Failures outside a client run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `--server` is not `host:port`.
    #[error("invalid server address: {0}")]
    Endpoint(#[from] EndpointParseError),
}
