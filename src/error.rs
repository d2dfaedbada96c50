//! Error types for the IRC client adapter.
//!
//! This module defines the two error taxonomies the session surfaces:
//! [`ConnectFailure`], the structured outcome of a failed handshake, and
//! [`ProtocolError`], operational faults raised after a session is running.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// The reason a connection attempt did not produce a running session.
///
/// This is the sole payload of a failed `connect()` outcome (see
/// [`crate::handshake`]); it is never raised as a panic and never
/// retroactively invalidates a session that already reached `Running`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectFailure {
    /// The transport closed during `Connecting` or `Starting` before a
    /// definitive outcome was reached.
    #[error("connection closed before the handshake completed")]
    Killed,

    /// Every configured nickname was rejected by the server.
    #[error("no configured nickname was accepted by the server")]
    NicknamesUnavailable,

    /// The server rejected the `WEBIRC` proxy line (observed as an
    /// `ERROR` line before registration completed).
    #[error("server rejected the WEBIRC proxy identification")]
    BadProxyConfiguration,

    /// A capability listed in `capabilities.requires` was absent from
    /// the server's advertised list, or was explicitly NAK'd, or the
    /// server does not support CAP negotiation at all while requires
    /// is non-empty.
    #[error("server does not support a required capability")]
    MissingRequiredCapabilities,

    /// The server rejected the configured `PASS`, or SASL authentication
    /// failed (including the Twitch-compatibility `NOTICE :Login unsuccessful`
    /// branch).
    #[error("server rejected the configured password or SASL credentials")]
    BadPassword,

    /// `end()` was called (or the transport ended) while the outcome was
    /// still pending.
    #[error("the session was ended before the handshake completed")]
    SocketEnded,
}

/// Operational errors surfaced once a session has reached `Running`.
///
/// Unlike [`ConnectFailure`], these do not settle the connect outcome;
/// they are delivered as a `SessionEvent::Error` followed by `Close`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// I/O error during reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Message exceeded the configured maximum allowed length.
    #[error("message too long: {0} bytes")]
    MessageTooLong(usize),

    /// Illegal control character in an inbound or outbound line.
    #[error("illegal control character: {0:?}")]
    IllegalControlChar(char),

    /// A caller attempted to write a message containing an embedded
    /// newline; IRC lines are terminated by the adapter, not the caller.
    #[error("write() message must not contain an embedded newline")]
    EmbeddedNewline,

    /// A caller invoked `connect()` on a session that was not
    /// `Initialized`, or otherwise violated the session's single-use
    /// lifecycle.
    #[error("invalid operation for current session state: {0}")]
    InvalidState(&'static str),
}

/// A syntactic error encountered while parsing a raw line into a
/// [`crate::message::Message`].
///
/// This is distinct from [`ProtocolError`]: it concerns the grammar of a
/// single line, not the state of a running session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// The input line was empty.
    #[error("empty message")]
    EmptyMessage,

    /// The command token was missing or malformed.
    #[error("invalid command")]
    InvalidCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failure_display() {
        assert_eq!(
            ConnectFailure::NicknamesUnavailable.to_string(),
            "no configured nickname was accepted by the server"
        );
        assert_eq!(
            ConnectFailure::BadPassword.to_string(),
            "server rejected the configured password or SASL credentials"
        );
    }

    #[test]
    fn test_connect_failure_equality() {
        assert_eq!(ConnectFailure::Killed, ConnectFailure::Killed);
        assert_ne!(ConnectFailure::Killed, ConnectFailure::SocketEnded);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::MessageTooLong(1024);
        assert_eq!(format!("{}", err), "message too long: 1024 bytes");

        let err = ProtocolError::IllegalControlChar('\u{0001}');
        assert_eq!(format!("{}", err), "illegal control character: '\\u{1}'");
    }

    #[test]
    fn test_protocol_error_conversion() {
        let io_err =
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let protocol_err: ProtocolError = io_err.into();
        match protocol_err {
            ProtocolError::Io(_) => {}
            _ => panic!("expected Io variant"),
        }
    }
}
