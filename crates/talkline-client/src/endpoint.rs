//! Server endpoints and their saved-list record format.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Failure to parse a saved endpoint record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointParseError {
    /// Record does not have two or three `:`-separated fields.
    #[error("expected host:port[:secure], got {0:?}")]
    FieldCount(String),

    /// Host field is empty.
    #[error("empty host in {0:?}")]
    EmptyHost(String),

    /// Port field is not a valid port number.
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// A server to connect to.
///
/// Two endpoints are the same configuration iff host, port and the secure
/// flag all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Negotiate TLS after connecting.
    pub secure: bool,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self { host: host.into(), port, secure }
    }

    /// `host:port`, without the secure marker.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Saved-list record: `host:port:true` or `host:port:false`.
    pub fn to_record(&self) -> String {
        format!("{}:{}:{}", self.host, self.port, self.secure)
    }

    /// Parse a saved-list record.
    ///
    /// Accepts the current three-field form and the legacy `host:port` form,
    /// which is read as non-secure. Only the literal `true` marks an endpoint
    /// secure.
    pub fn parse_record(record: &str) -> Result<Self, EndpointParseError> {
        let fields: Vec<&str> = record.trim().split(':').collect();
        let (host, port, secure) = match fields.as_slice() {
            [host, port] => (*host, *port, false),
            [host, port, secure] => (*host, *port, *secure == "true"),
            _ => return Err(EndpointParseError::FieldCount(record.to_string())),
        };

        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost(record.to_string()));
        }
        let port = port.parse().map_err(|_| EndpointParseError::InvalidPort(port.to_string()))?;

        Ok(Self::new(host, port, secure))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)?;
        if self.secure {
            write!(f, " (Secure)")?;
        }
        Ok(())
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_record(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn legacy_record_is_not_secure() {
        let endpoint = Endpoint::parse_record("chat.example.org:12345").unwrap();
        assert_eq!(endpoint, Endpoint::new("chat.example.org", 12345, false));
        assert_eq!(endpoint.to_record(), "chat.example.org:12345:false");
    }

    #[test]
    fn only_literal_true_is_secure() {
        assert!(Endpoint::parse_record("h:1:true").unwrap().secure);
        assert!(!Endpoint::parse_record("h:1:True").unwrap().secure);
        assert!(!Endpoint::parse_record("h:1:yes").unwrap().secure);
    }

    #[test]
    fn rejects_malformed_records() {
        assert!(matches!(
            Endpoint::parse_record("just-a-host"),
            Err(EndpointParseError::FieldCount(_))
        ));
        assert!(matches!(
            Endpoint::parse_record("h:1:true:extra"),
            Err(EndpointParseError::FieldCount(_))
        ));
        assert!(matches!(Endpoint::parse_record(":80"), Err(EndpointParseError::EmptyHost(_))));
        assert!(matches!(
            Endpoint::parse_record("h:99999"),
            Err(EndpointParseError::InvalidPort(_))
        ));
    }

    #[test]
    fn display_marks_secure_endpoints() {
        assert_eq!(Endpoint::new("10.0.0.2", 443, true).to_string(), "10.0.0.2:443 (Secure)");
        assert_eq!(Endpoint::new("10.0.0.2", 80, false).to_string(), "10.0.0.2:80");
    }

    fn host_strategy() -> impl Strategy<Value = String> {
        "[a-z0-9][a-z0-9.-]{0,30}"
    }

    proptest! {
        #[test]
        fn legacy_records_gain_false_marker(host in host_strategy(), port in any::<u16>()) {
            let record = format!("{host}:{port}");
            let endpoint = Endpoint::parse_record(&record).unwrap();
            prop_assert_eq!(endpoint.to_record(), format!("{record}:false"));
        }

        #[test]
        fn three_field_records_round_trip(
            host in host_strategy(),
            port in any::<u16>(),
            secure in any::<bool>(),
        ) {
            let record = format!("{host}:{port}:{secure}");
            let endpoint = Endpoint::parse_record(&record).unwrap();
            prop_assert_eq!(endpoint.to_record(), record);
        }
    }
}
