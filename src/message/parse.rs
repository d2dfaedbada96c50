//! Parses a raw IRC line into a [`Message`].
//!
//! Grammar (RFC 1459 / IRCv3 message-tags): `['@'<tags> ' '] [':'<prefix> ' ']
//! <command> [' ' <params>]`, where the trailing parameter is introduced by a
//! lone `:` and may itself contain spaces.

use std::str::FromStr;

use super::tags::unescape_tag_value;
use super::types::{Message, Tag};
use crate::error::MessageParseError;
use crate::prefix::Prefix;

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let mut rest = line;

        let tags = if let Some(body) = rest.strip_prefix('@') {
            let (tag_str, remainder) = body.split_once(' ').unwrap_or((body, ""));
            rest = remainder.trim_start_matches(' ');
            Some(parse_tags(tag_str))
        } else {
            None
        };

        let prefix = if let Some(body) = rest.strip_prefix(':') {
            let (prefix_str, remainder) = body.split_once(' ').unwrap_or((body, ""));
            rest = remainder.trim_start_matches(' ');
            Some(Prefix::parse(prefix_str))
        } else {
            None
        };

        let (command, params_str) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(MessageParseError::InvalidCommand);
        }

        Ok(Message {
            tags,
            prefix,
            command: command.to_ascii_uppercase(),
            params: parse_params(params_str),
        })
    }
}

fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(';')
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => Tag {
                key: key.to_string(),
                value: Some(unescape_tag_value(value)),
            },
            None => Tag {
                key: entry.to_string(),
                value: None,
            },
        })
        .collect()
}

fn parse_params(raw: &str) -> Vec<String> {
    let mut params = Vec::new();
    let mut rest = raw.trim_start_matches(' ');
    loop {
        if rest.is_empty() {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing.to_string());
            break;
        }
        match rest.split_once(' ') {
            Some((first, remainder)) => {
                params.push(first.to_string());
                rest = remainder.trim_start_matches(' ');
            }
            None => {
                params.push(rest.to_string());
                break;
            }
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_command() {
        let msg: Message = "PING :ignored".parse().unwrap();
        assert_eq!(msg.command, "PING");
        assert_eq!(msg.params, vec!["ignored".to_string()]);
        assert!(msg.prefix.is_none());
        assert!(msg.tags.is_none());
    }

    #[test]
    fn test_parse_with_prefix_and_multiple_params() {
        let msg: Message = ":irc.test.net 001 testbot :Welcome to the network"
            .parse()
            .unwrap();
        assert_eq!(msg.command, "001");
        assert_eq!(
            msg.params,
            vec!["testbot".to_string(), "Welcome to the network".to_string()]
        );
        assert_eq!(msg.prefix.unwrap().to_string(), "irc.test.net");
    }

    #[test]
    fn test_parse_with_tags() {
        let msg: Message = "@time=2023-01-01T12:00:00Z;msgid=abc123 :nick!u@h PRIVMSG #c :hi"
            .parse()
            .unwrap();
        assert_eq!(msg.tag("msgid"), Some("abc123"));
        assert_eq!(msg.tag("time"), Some("2023-01-01T12:00:00Z"));
    }

    #[test]
    fn test_empty_line_errors() {
        assert_eq!("".parse::<Message>(), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn test_command_only_uppercased() {
        let msg: Message = "privmsg #chan :hi".parse().unwrap();
        assert_eq!(msg.command, "PRIVMSG");
    }
}
