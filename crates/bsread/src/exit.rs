use std::fmt;
use std::io;

use bsread_protocol::ProtocolError;
use bsread_transport::TransportError;

// Exit code constants aligned with the sysexits-style table used across the CLI.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidAddress { .. } | TransportError::UnsupportedMode { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        TransportError::SendTimeout(_) | TransportError::ReceiveTimeout(_) => {
            CliError::new(TIMEOUT, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn protocol_error(context: &str, err: ProtocolError) -> CliError {
    match err {
        ProtocolError::Transport(err) => transport_error(context, err),
        ProtocolError::SendTimeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ProtocolError::Configuration(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ProtocolError::Validation(_)
        | ProtocolError::Codec { .. }
        | ProtocolError::Json(_)
        | ProtocolError::Decode(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ProtocolError::Hook(_) | ProtocolError::PostSendHook { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn refused_connection_is_a_plain_failure() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                address: "tcp://localhost:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, FAILURE);
        assert!(err.message.starts_with("connect failed: "));
    }

    #[test]
    fn protocol_errors_map_to_distinct_codes() {
        let timeout = protocol_error("send", ProtocolError::SendTimeout(Duration::from_secs(1)));
        assert_eq!(timeout.code, TIMEOUT);

        let config = protocol_error("setup", ProtocolError::Configuration("bogus".to_string()));
        assert_eq!(config.code, USAGE);

        let transport = protocol_error(
            "send",
            ProtocolError::Transport(TransportError::Shutdown),
        );
        assert_eq!(transport.code, TRANSPORT_ERROR);
    }
}
