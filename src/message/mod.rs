//! A parsed IRC line: tags, prefix, command, and parameters.
//!
//! This grammar sits above the handshake core (which only ever reads
//! `tokens[0..=4]` off a raw line, per [`crate::handshake`]) and is offered
//! for an upper layer built on this crate to parse [`crate::session::SessionEvent::Data`]
//! lines into something richer than a bare `String`.

mod parse;
mod serialize;
pub mod tags;
mod types;

pub use self::types::{Message, Tag};
