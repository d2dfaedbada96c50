//! Renders a [`Message`] back to wire format (without the trailing `\r\n`;
//! framing is the session's responsibility, see [`crate::framer`]).

use std::fmt;

use super::tags::escape_tag_value;
use super::types::Message;

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(tags) = &self.tags {
            if !tags.is_empty() {
                f.write_str("@")?;
                for (i, tag) in tags.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    f.write_str(&tag.key)?;
                    if let Some(value) = &tag.value {
                        f.write_str("=")?;
                        escape_tag_value(f, value)?;
                    }
                }
                f.write_str(" ")?;
            }
        }

        if let Some(prefix) = &self.prefix {
            write!(f, ":{prefix} ")?;
        }

        f.write_str(&self.command)?;

        if let Some((last, rest)) = self.params.split_last() {
            for param in rest {
                write!(f, " {param}")?;
            }
            if last.is_empty() || last.contains(' ') || last.starts_with(':') {
                write!(f, " :{last}")?;
            } else {
                write!(f, " {last}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Tag;
    use crate::prefix::Prefix;

    #[test]
    fn test_serialize_simple() {
        let msg = Message::new("PING", vec!["ignored".to_string()]);
        assert_eq!(msg.to_string(), "PING :ignored");
    }

    #[test]
    fn test_serialize_with_prefix_and_tags() {
        let msg = Message {
            tags: Some(vec![Tag {
                key: "msgid".to_string(),
                value: Some("abc 123".to_string()),
            }]),
            prefix: Some(Prefix::parse("nick!user@host")),
            command: "PRIVMSG".to_string(),
            params: vec!["#chan".to_string(), "hello there".to_string()],
        };
        assert_eq!(
            msg.to_string(),
            "@msgid=abc\\s123 :nick!user@host PRIVMSG #chan :hello there"
        );
    }

    #[test]
    fn test_roundtrip() {
        let raw = ":irc.test.net 001 testbot :Welcome to the network";
        let msg: Message = raw.parse().unwrap();
        assert_eq!(msg.to_string(), raw);
    }
}
