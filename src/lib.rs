//! # slirc-client
//!
//! A client-side adapter that turns a raw TCP/TLS byte-stream into an IRC
//! (RFC 1459 / IRCv3) line-oriented session: capability negotiation
//! (`CAP LS`/`REQ`/`ACK`/`NAK`), optional `WEBIRC` and `PASS` handling,
//! multi-candidate nickname registration, optional SASL PLAIN
//! authentication, server-`PING` handling, and a two-phase idle watchdog,
//! all exposed as a single settle of a one-shot connect outcome.
//!
//! ## Quick start
//!
//! ```no_run
//! use slirc_client::session::{Session, SessionConfig, SessionEvent};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new(
//!     "irc.example.net",
//!     vec!["mybot".to_string(), "mybot_".to_string()],
//!     "mybot",
//!     "My Bot",
//! );
//!
//! let mut session = Session::new(config);
//! let outcome = session.connect().await?;
//! println!("registered as {}", outcome.nickname);
//!
//! while let Some(event) = session.next_event().await {
//!     if let SessionEvent::Data(line) = event {
//!         println!("<< {line}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Scope
//!
//! This crate owns the handshake state machine, the line framer, the idle
//! watchdog, and (as the ambient stack a published crate needs to be
//! useful at all) the byte transport and the IRC message grammar. It does
//! *not* track channel membership, user modes, or `ISUPPORT` tokens, and it
//! does not resolve DNS — those are an upper layer's concern.
//!
//! ## Acknowledgments
//!
//! This project was inspired by the architectural patterns established by
//! [Aaron Weiss (aatxe)](https://github.com/aatxe) in the
//! [irc](https://github.com/aatxe/irc) crate.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod caps;
pub mod config;
pub mod error;
pub mod message;
pub mod prefix;
pub mod response;
pub mod sasl;
pub mod util;
pub mod validation;

pub mod framer;
pub mod handshake;

#[cfg(feature = "tokio")]
pub mod keepalive;
#[cfg(feature = "tokio")]
pub mod session;
#[cfg(feature = "tokio")]
pub mod transport;

pub use self::caps::CapState;
pub use self::config::{CapabilityConfig, ProxyConfig, SaslConfig, SessionConfig};
pub use self::error::{ConnectFailure, MessageParseError, ProtocolError};
pub use self::framer::Framer;
pub use self::handshake::{ConnectOutcome, Handshake, HandshakeStep};
pub use self::message::{Message, Tag};
pub use self::prefix::Prefix;
pub use self::response::Response;
pub use self::sasl::{encode_plain, encode_plain_with_authzid, SaslMechanism};

#[cfg(feature = "tokio")]
pub use self::keepalive::Watchdog;
#[cfg(feature = "tokio")]
pub use self::session::{Session, SessionEvent, SessionStatus};
#[cfg(feature = "tokio")]
pub use self::transport::Transport;
