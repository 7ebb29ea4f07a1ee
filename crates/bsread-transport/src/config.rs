use std::fmt;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// Port used when an address does not name one.
pub const DEFAULT_PORT: u16 = 9999;

const SCHEME: &str = "tcp://";

/// Socket messaging pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Load-balanced delivery to one connected puller.
    Push,
    /// Receives from pushers.
    Pull,
    /// Fan-out delivery to every connected subscriber.
    Pub,
    /// Receives from a publisher.
    Sub,
}

impl Mode {
    /// Whether sockets of this mode send messages.
    pub fn is_outbound(self) -> bool {
        matches!(self, Mode::Push | Mode::Pub)
    }

    /// Wire-independent name used in logs and errors.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Push => "PUSH",
            Mode::Pull => "PULL",
            Mode::Pub => "PUB",
            Mode::Sub => "SUB",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the connection owns the listening socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnType {
    Bind,
    Connect,
}

/// A parsed `tcp://<host>:<port>` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Parse a strict `tcp://<host>:<port>` address. `*` binds all interfaces.
    pub fn parse(address: &str) -> Result<Self> {
        let invalid = |reason: &str| TransportError::InvalidAddress {
            address: address.to_string(),
            reason: reason.to_string(),
        };

        let rest = address
            .strip_prefix(SCHEME)
            .ok_or_else(|| invalid("expected tcp:// scheme"))?;
        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;

        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if host != "*"
            && !host
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(invalid("host contains invalid characters"));
        }
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("port must be numeric"));
        }
        let port = port.parse::<u16>().map_err(|_| invalid("port out of range"))?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    /// Lenient parse used for user input: adds a missing `tcp://` scheme and
    /// the default port before validating.
    pub fn normalize(input: &str) -> Result<Self> {
        let mut address = input.trim().to_string();
        if !address.starts_with(SCHEME) {
            address = format!("{SCHEME}{address}");
        }

        let has_port = address[SCHEME.len()..]
            .rsplit_once(':')
            .is_some_and(|(_, port)| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()));
        if !has_port {
            address = format!("{address}:{DEFAULT_PORT}");
        }

        Self::parse(&address)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` form accepted by `std::net` (wildcard mapped to `0.0.0.0`).
    pub fn socket_address(&self) -> String {
        if self.host == "*" {
            format!("0.0.0.0:{}", self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}:{}", self.host, self.port)
    }
}

/// Connection parameters shared by every transport implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// `tcp://<host>:<port>` address to bind or connect.
    pub address: String,
    /// Messaging pattern.
    pub mode: Mode,
    /// Bind or connect role.
    pub conn_type: ConnType,
    /// Maximum number of complete messages buffered per direction.
    pub queue_size: usize,
    /// Block when the send queue is full instead of dropping the message.
    pub block: bool,
    /// Upper bound for a blocking send. `None` waits indefinitely.
    pub send_timeout: Option<Duration>,
    /// Upper bound for a receive. `None` waits indefinitely.
    pub receive_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: format!("{SCHEME}*:{DEFAULT_PORT}"),
            mode: Mode::Push,
            conn_type: ConnType::Bind,
            queue_size: 10,
            block: true,
            send_timeout: None,
            receive_timeout: None,
        }
    }
}

impl TransportConfig {
    /// Parse and return the configured endpoint.
    pub fn endpoint(&self) -> Result<Endpoint> {
        Endpoint::parse(&self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_strict_address() {
        let endpoint = Endpoint::parse("tcp://localhost:9000").unwrap();
        assert_eq!(endpoint.host(), "localhost");
        assert_eq!(endpoint.port(), 9000);
        assert_eq!(endpoint.socket_address(), "localhost:9000");
        assert_eq!(endpoint.to_string(), "tcp://localhost:9000");
    }

    #[test]
    fn wildcard_host_binds_all_interfaces() {
        let endpoint = Endpoint::parse("tcp://*:9999").unwrap();
        assert_eq!(endpoint.socket_address(), "0.0.0.0:9999");
    }

    #[test]
    fn rejects_malformed_addresses() {
        for address in [
            "localhost:9000",
            "tcp://localhost",
            "tcp://:9000",
            "tcp://local_host:9000",
            "tcp://localhost:99999",
            "tcp://localhost:abc",
        ] {
            assert!(
                matches!(
                    Endpoint::parse(address),
                    Err(TransportError::InvalidAddress { .. })
                ),
                "{address} should be rejected"
            );
        }
    }

    #[test]
    fn normalize_adds_scheme_and_default_port() {
        assert_eq!(
            Endpoint::normalize("sf-daq-1").unwrap().to_string(),
            "tcp://sf-daq-1:9999"
        );
        assert_eq!(
            Endpoint::normalize("sf-daq-1:4000").unwrap().to_string(),
            "tcp://sf-daq-1:4000"
        );
        assert_eq!(
            Endpoint::normalize("tcp://10.0.0.1").unwrap().to_string(),
            "tcp://10.0.0.1:9999"
        );
        assert!(Endpoint::normalize("bad host!").is_err());
    }

    #[test]
    fn mode_direction() {
        assert!(Mode::Push.is_outbound());
        assert!(Mode::Pub.is_outbound());
        assert!(!Mode::Pull.is_outbound());
        assert!(!Mode::Sub.is_outbound());
        assert_eq!(Mode::Sub.to_string(), "SUB");
    }

    #[test]
    fn default_config_binds_push() {
        let config = TransportConfig::default();
        assert_eq!(config.mode, Mode::Push);
        assert_eq!(config.conn_type, ConnType::Bind);
        assert_eq!(config.queue_size, 10);
        assert!(config.block);
        assert_eq!(config.endpoint().unwrap().port(), DEFAULT_PORT);
    }
}
