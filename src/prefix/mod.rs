//! IRC message prefix (source) types.
//!
//! The prefix is the optional leading `:nick!user@host` or `:server.name`
//! token on an inbound line, identifying who or what originated it. The
//! handshake itself never inspects the prefix (it only reads
//! whitespace-delimited tokens per [`crate::handshake`]); this type exists
//! for the upper layer a consumer builds on top of [`crate::message::Message`].

use std::fmt;

/// The source of an IRC message: either a server name or a full
/// `nick[!user][@host]` client mask.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prefix {
    /// A bare server name, e.g. `irc.example.net`.
    Server(String),
    /// A client mask: nickname, with optional user and host parts.
    Nickname {
        nickname: String,
        user: Option<String>,
        host: Option<String>,
    },
}

impl Prefix {
    /// Parse a prefix body (the text after the leading `:`, before the
    /// first space). A bare name containing a `.` is treated as a server
    /// name, matching the common `nick!user@host` vs. `irc.example.net`
    /// convention; this is a heuristic, not a protocol guarantee.
    pub fn parse(raw: &str) -> Self {
        if let Some((nick, rest)) = raw.split_once('!') {
            let (user, host) = match rest.split_once('@') {
                Some((u, h)) => (Some(u.to_string()), Some(h.to_string())),
                None => (Some(rest.to_string()), None),
            };
            return Prefix::Nickname {
                nickname: nick.to_string(),
                user,
                host,
            };
        }
        if let Some((nick, host)) = raw.split_once('@') {
            return Prefix::Nickname {
                nickname: nick.to_string(),
                user: None,
                host: Some(host.to_string()),
            };
        }
        if raw.contains('.') {
            Prefix::Server(raw.to_string())
        } else {
            Prefix::Nickname {
                nickname: raw.to_string(),
                user: None,
                host: None,
            }
        }
    }

    /// The nickname, if this prefix identifies a client rather than a
    /// server.
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Prefix::Nickname { nickname, .. } => Some(nickname),
            Prefix::Server(_) => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Server(name) => f.write_str(name),
            Prefix::Nickname { nickname, user, host } => {
                f.write_str(nickname)?;
                if let Some(user) = user {
                    write!(f, "!{user}")?;
                }
                if let Some(host) = host {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_mask() {
        let p = Prefix::parse("nick!user@host.example.com");
        assert_eq!(
            p,
            Prefix::Nickname {
                nickname: "nick".to_string(),
                user: Some("user".to_string()),
                host: Some("host.example.com".to_string()),
            }
        );
        assert_eq!(p.to_string(), "nick!user@host.example.com");
    }

    #[test]
    fn test_parse_server_name() {
        let p = Prefix::parse("irc.example.net");
        assert_eq!(p, Prefix::Server("irc.example.net".to_string()));
        assert!(p.nickname().is_none());
    }

    #[test]
    fn test_parse_bare_nickname() {
        let p = Prefix::parse("nick");
        assert_eq!(p.nickname(), Some("nick"));
    }
}
