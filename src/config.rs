//! Connection configuration types.
//!
//! These are plain data: no tokio, no sockets. They live in their own
//! ungated module so the sans-IO core ([`crate::handshake`], [`crate::caps`],
//! [`crate::framer`]) can depend on them without pulling in the `tokio`
//! feature that [`crate::session`] needs for the async facade built on top.

use std::collections::HashSet;

/// `WEBIRC` proxy identification, sent before `PASS`/`CAP` when configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    pub password: String,
    pub username: String,
    pub hostname: String,
    pub ip: String,
}

/// Capabilities to negotiate during `CAP LS`/`CAP REQ`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityConfig {
    /// Capabilities without which the handshake fails.
    pub requires: HashSet<String>,
    /// Capabilities requested opportunistically if the server offers them.
    pub wants: HashSet<String>,
}

/// SASL PLAIN credentials, used once `sasl` is ACK'd during CAP negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslConfig {
    /// Authentication identity. Defaults to [`SessionConfig::username`]
    /// when absent.
    pub username: Option<String>,
    pub password: String,
}

/// Immutable configuration for a single connection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub server: String,
    pub port: u16,
    /// Candidate nicknames, tried in order. Must be non-empty or
    /// `connect()` settles `Fail(NicknamesUnavailable)` immediately.
    pub nicknames: Vec<String>,
    pub username: String,
    pub realname: String,
    pub password: Option<String>,
    pub proxy: Option<ProxyConfig>,
    pub capabilities: Option<CapabilityConfig>,
    pub sasl: Option<SaslConfig>,
    /// The idle-watchdog silence/no-pong interval. Orthogonal to the
    /// transport-level read timeout set via
    /// [`crate::session::Session::set_timeout`] (see that method's docs).
    pub timeout_ms: u32,
    /// Whether the caller intends to wrap the transport in TLS before
    /// registration. `Session` itself never negotiates TLS (see
    /// [`crate::transport::Transport::from_tls`]); this only informs the
    /// default port a convenience constructor would choose.
    pub tls: bool,
}

impl SessionConfig {
    /// A minimal config: no password, no proxy, no capabilities, no SASL,
    /// the default port and timeout.
    pub fn new(
        server: impl Into<String>,
        nicknames: Vec<String>,
        username: impl Into<String>,
        realname: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: 6667,
            nicknames,
            username: username.into(),
            realname: realname.into(),
            password: None,
            proxy: None,
            capabilities: None,
            sasl: None,
            timeout_ms: 300_000,
            tls: false,
        }
    }
}
