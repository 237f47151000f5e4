//! Client configuration.

use std::{path::PathBuf, time::Duration};

/// Tunables for one client run.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Bound on the TCP handshake. The only timeout in the client.
    pub connect_timeout: Duration,
    /// How long a kick/ban notice stays up before the session ends.
    pub kick_grace: Duration,
    /// Size of a single read from the server. Each read is one display unit.
    pub read_buffer_size: usize,
    /// Saved endpoints, one `host:port:secure` per line.
    pub servers_file: PathBuf,
    /// Saved usernames, one per line.
    pub users_file: PathBuf,
    /// PEM files with additional TLS trust anchors.
    pub extra_roots: Vec<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            kick_grace: Duration::from_secs(3),
            read_buffer_size: 1024,
            servers_file: PathBuf::from("saved_servers.txt"),
            users_file: PathBuf::from("saved_users.txt"),
            extra_roots: Vec::new(),
        }
    }
}
