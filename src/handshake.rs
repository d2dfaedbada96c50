//! The connection handshake state machine: WEBIRC → PASS → CAP LS → CAP
//! REQ/ACK/NAK accounting → SASL PLAIN (if configured) → USER/NICK → 001.
//!
//! This is a sans-IO, tagged-state machine in the style of the teacher's
//! server-oriented `HandshakeMachine`: it consumes inbound lines and
//! produces outbound lines plus, at most once, a settled outcome. It never
//! touches a socket; the [`crate::session::Session`] drives it with lines
//! already produced by the [`crate::framer::Framer`].
//!
//! Per the external interface contract, inbound lines are never parsed by
//! a full message grammar here — only whitespace tokens `tokens[0..=4]` are
//! inspected, matching the boundary between this crate's handshake core and
//! the richer parsing an upper layer might want.

use std::collections::{HashSet, VecDeque};

use crate::caps::CapState;
use crate::config::SessionConfig;
use crate::error::ConnectFailure;
use crate::sasl;

/// The successful result of a handshake: the capabilities that ended up
/// acknowledged and the nickname the server accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub capabilities: Vec<String>,
    pub nickname: String,
}

/// What the handshake wants the caller to do after feeding it a line.
#[derive(Debug)]
pub enum HandshakeStep {
    /// Keep going; send these outbound lines (may be empty) and keep
    /// dispatching subsequent inbound lines to the handshake.
    Continue(Vec<String>),
    /// The handshake is finished. Send these outbound lines (if any, e.g.
    /// a final `QUIT`) and then detach — no further inbound line should be
    /// routed here.
    Settled(Result<ConnectOutcome, ConnectFailure>, Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Negotiating,
    Authenticating,
    Registering,
}

/// Drives the pre-001 portion of a session.
pub struct Handshake {
    username: String,
    realname: String,
    requires: HashSet<String>,
    wants: HashSet<String>,
    sasl: Option<(String, String)>, // (username, password)
    phase: Phase,
    caps: CapState,
    cap_active: bool,
    remaining_nicknames: VecDeque<String>,
    current_nickname: Option<String>,
}

impl Handshake {
    /// Build the handshake from a session config and compute the initial
    /// step: optional `WEBIRC`, optional `PASS`, and either `CAP LS` (if
    /// capabilities are configured) or the `USER`/`NICK` burst directly.
    ///
    /// If `config.nicknames` is empty and registration begins immediately
    /// (no capabilities configured), the handshake settles
    /// `Err(ConnectFailure::NicknamesUnavailable)` on the spot rather than
    /// sending a `NICK`-less registration burst.
    pub fn start(config: &SessionConfig) -> (Self, HandshakeStep) {
        let mut out = Vec::new();

        if let Some(proxy) = &config.proxy {
            out.push(format!(
                "WEBIRC {} {} {} {}",
                proxy.password, proxy.username, proxy.hostname, proxy.ip
            ));
        }
        if let Some(password) = &config.password {
            out.push(format!("PASS {}", password));
        }

        let (requires, wants) = match &config.capabilities {
            Some(caps) => (caps.requires.clone(), caps.wants.clone()),
            None => (HashSet::new(), HashSet::new()),
        };
        let sasl = config.sasl.as_ref().map(|s| {
            (
                s.username.clone().unwrap_or_else(|| config.username.clone()),
                s.password.clone(),
            )
        });

        let mut remaining_nicknames: VecDeque<String> = config.nicknames.iter().cloned().collect();
        let cap_active = config.capabilities.is_some();

        let mut machine = Self {
            username: config.username.clone(),
            realname: config.realname.clone(),
            requires,
            wants,
            sasl,
            phase: Phase::Negotiating,
            caps: CapState::new(),
            cap_active,
            remaining_nicknames: VecDeque::new(),
            current_nickname: None,
        };

        let step = if cap_active {
            out.push("CAP LS".to_string());
            machine.remaining_nicknames = remaining_nicknames;
            HandshakeStep::Continue(out)
        } else {
            machine.phase = Phase::Registering;
            let reg_step = machine.begin_registration(&mut remaining_nicknames);
            machine.remaining_nicknames = remaining_nicknames;
            prefix_step(out, reg_step)
        };

        (machine, step)
    }

    /// Send `USER`/`NICK` for the next available nickname, or settle
    /// `Fail(NicknamesUnavailable)` if none remain. Called whenever
    /// registration begins or restarts (initial burst, end of CAP
    /// negotiation, end of SASL, or CAP rejection).
    fn begin_registration(&mut self, remaining: &mut VecDeque<String>) -> HandshakeStep {
        match remaining.pop_front() {
            Some(nick) => {
                self.current_nickname = Some(nick.clone());
                HandshakeStep::Continue(vec![
                    format!("USER {} 8 * :{}", self.username, self.realname),
                    format!("NICK {}", nick),
                ])
            }
            None => self.settle(Err(ConnectFailure::NicknamesUnavailable)),
        }
    }

    /// Feed one inbound line (already framed and NFC-normalized) to the
    /// handshake.
    pub fn on_line(&mut self, line: &str) -> HandshakeStep {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return HandshakeStep::Continue(Vec::new());
        }

        if tokens[0] == "PING" {
            // Auto-PONG is handled by the session facade, not here.
            return HandshakeStep::Continue(Vec::new());
        }
        if tokens[0] == "ERROR" {
            return self.settle(Err(ConnectFailure::BadProxyConfiguration));
        }

        let (command, params_start) = if let Some(rest) = tokens[0].strip_prefix(':') {
            let _ = rest;
            match tokens.get(1) {
                Some(cmd) => (*cmd, 2),
                None => return HandshakeStep::Continue(Vec::new()),
            }
        } else {
            (tokens[0], 1)
        };

        if command.eq_ignore_ascii_case("NOTICE")
            && line.trim_end().ends_with("Login unsuccessful")
        {
            return self.settle(Err(ConnectFailure::BadPassword));
        }

        if command == "AUTHENTICATE" {
            return self.handle_authenticate(tokens.get(params_start).copied().unwrap_or(""));
        }

        if let Ok(numeric) = command.parse::<u16>() {
            return self.handle_numeric(numeric, &tokens, params_start);
        }

        if command.eq_ignore_ascii_case("CAP") {
            return self.handle_cap(&tokens, params_start);
        }

        HandshakeStep::Continue(Vec::new())
    }

    fn handle_cap(&mut self, tokens: &[&str], params_start: usize) -> HandshakeStep {
        if self.phase != Phase::Negotiating {
            return HandshakeStep::Continue(Vec::new());
        }
        // tokens[params_start] is the target ("*"), tokens[params_start+1] is
        // the subcommand, tokens[params_start+2..] is the trailing cap list.
        let Some(subcmd) = tokens.get(params_start + 1) else {
            return HandshakeStep::Continue(Vec::new());
        };
        let list = trailing_list(tokens, params_start + 2);

        match subcmd.to_ascii_uppercase().as_str() {
            "LS" => {
                self.caps.record_ls(&list);
                let missing = self.caps.missing_required(&self.requires);
                if !missing.is_empty() {
                    return self.settle(Err(ConnectFailure::MissingRequiredCapabilities));
                }
                let reqs = self.caps.build_requests(&self.requires, &self.wants);
                let out = reqs
                    .into_iter()
                    .map(|body| format!("CAP REQ :{}", body))
                    .collect();
                self.maybe_finish_negotiation(out)
            }
            "ACK" => {
                let caps: Vec<&str> = list.split_whitespace().collect();
                self.caps.record_ack(&caps, &self.wants);
                self.maybe_finish_negotiation(Vec::new())
            }
            "NAK" => {
                let caps: Vec<&str> = list.split_whitespace().collect();
                let required_missing = self.caps.record_nak(&caps, &self.requires);
                if required_missing {
                    return self.settle(Err(ConnectFailure::MissingRequiredCapabilities));
                }
                self.maybe_finish_negotiation(Vec::new())
            }
            _ => HandshakeStep::Continue(Vec::new()),
        }
    }

    fn maybe_finish_negotiation(&mut self, mut out: Vec<String>) -> HandshakeStep {
        if !self.caps.is_settled() {
            return HandshakeStep::Continue(out);
        }

        if self.sasl.is_some() && self.caps.sasl_acked() {
            self.phase = Phase::Authenticating;
            out.push("AUTHENTICATE PLAIN".to_string());
            return HandshakeStep::Continue(out);
        }

        out.push("CAP END".to_string());
        self.phase = Phase::Registering;
        let mut remaining = std::mem::take(&mut self.remaining_nicknames);
        let reg_step = self.begin_registration(&mut remaining);
        self.remaining_nicknames = remaining;
        prefix_step(out, reg_step)
    }

    fn handle_authenticate(&mut self, payload: &str) -> HandshakeStep {
        if self.phase != Phase::Authenticating {
            return HandshakeStep::Continue(Vec::new());
        }
        if payload == "+" {
            if let Some((username, password)) = &self.sasl {
                let encoded = sasl::encode_plain_with_authzid(username, username, password);
                let lines = if sasl::needs_chunking(&encoded) {
                    let mut lines: Vec<String> = sasl::chunk_response(&encoded)
                        .map(|chunk| format!("AUTHENTICATE {}", chunk))
                        .collect();
                    if encoded.len() % sasl::SASL_CHUNK_SIZE == 0 {
                        lines.push("AUTHENTICATE +".to_string());
                    }
                    lines
                } else {
                    vec![format!("AUTHENTICATE {}", encoded)]
                };
                return HandshakeStep::Continue(lines);
            }
        }
        HandshakeStep::Continue(Vec::new())
    }

    fn handle_numeric(&mut self, numeric: u16, tokens: &[&str], params_start: usize) -> HandshakeStep {
        match numeric {
            410 | 421 if self.phase == Phase::Negotiating => {
                if !self.requires.is_empty() {
                    return self.settle(Err(ConnectFailure::MissingRequiredCapabilities));
                }
                self.phase = Phase::Registering;
                let mut remaining = std::mem::take(&mut self.remaining_nicknames);
                let reg_step = self.begin_registration(&mut remaining);
                self.remaining_nicknames = remaining;
                reg_step
            }
            464 => self.settle(Err(ConnectFailure::BadPassword)),
            903 if self.phase == Phase::Authenticating => {
                let out = vec!["CAP END".to_string()];
                self.phase = Phase::Registering;
                let mut remaining = std::mem::take(&mut self.remaining_nicknames);
                let reg_step = self.begin_registration(&mut remaining);
                self.remaining_nicknames = remaining;
                prefix_step(out, reg_step)
            }
            902 | 904 | 905 | 906 | 907 if self.phase == Phase::Authenticating => {
                let out = vec!["CAP END".to_string()];
                self.phase = Phase::Registering;
                let mut remaining = std::mem::take(&mut self.remaining_nicknames);
                let reg_step = self.begin_registration(&mut remaining);
                self.remaining_nicknames = remaining;
                prefix_step(out, reg_step)
            }
            431 | 432 | 433 | 436 | 437 | 484 if self.phase == Phase::Registering => {
                let _ = tokens;
                let _ = params_start;
                if let Some(next_nick) = self.remaining_nicknames.pop_front() {
                    self.current_nickname = Some(next_nick.clone());
                    HandshakeStep::Continue(vec![format!("NICK {}", next_nick)])
                } else {
                    self.settle(Err(ConnectFailure::NicknamesUnavailable))
                }
            }
            1 if self.phase == Phase::Registering => {
                let nickname = self
                    .current_nickname
                    .clone()
                    .unwrap_or_default();
                let capabilities = self.caps.acked().to_vec();
                self.settle(Ok(ConnectOutcome {
                    capabilities,
                    nickname,
                }))
            }
            _ => HandshakeStep::Continue(Vec::new()),
        }
    }

    fn settle(&mut self, result: Result<ConnectOutcome, ConnectFailure>) -> HandshakeStep {
        let out = match &result {
            Err(ConnectFailure::MissingRequiredCapabilities)
            | Err(ConnectFailure::NicknamesUnavailable)
            | Err(ConnectFailure::BadPassword)
            | Err(ConnectFailure::BadProxyConfiguration) => vec!["QUIT".to_string()],
            _ => Vec::new(),
        };
        HandshakeStep::Settled(result, out)
    }
}

/// Prepend `prefix` lines (e.g. a preceding `WEBIRC`/`PASS` burst, or a
/// `CAP END`) onto whichever outbound lines a [`HandshakeStep`] already
/// carries, preserving whether it was `Continue` or `Settled`.
fn prefix_step(prefix: Vec<String>, step: HandshakeStep) -> HandshakeStep {
    if prefix.is_empty() {
        return step;
    }
    match step {
        HandshakeStep::Continue(out) => {
            let mut combined = prefix;
            combined.extend(out);
            HandshakeStep::Continue(combined)
        }
        HandshakeStep::Settled(result, out) => {
            let mut combined = prefix;
            combined.extend(out);
            HandshakeStep::Settled(result, combined)
        }
    }
}

/// Join `tokens[start..]` into a single space-separated list, stripping a
/// leading `:` trailing-parameter marker from the first token if present.
fn trailing_list(tokens: &[&str], start: usize) -> String {
    if start >= tokens.len() {
        return String::new();
    }
    let mut parts = Vec::with_capacity(tokens.len() - start);
    let first = tokens[start].strip_prefix(':').unwrap_or(tokens[start]);
    if !first.is_empty() {
        parts.push(first);
    }
    parts.extend_from_slice(&tokens[start + 1..]);
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CapabilityConfig, ProxyConfig, SaslConfig, SessionConfig};

    fn base_config() -> SessionConfig {
        SessionConfig {
            server: "irc.test.net".to_string(),
            port: 6667,
            nicknames: vec!["testbot".to_string()],
            username: "testuser".to_string(),
            realname: "realbot".to_string(),
            password: None,
            proxy: None,
            capabilities: None,
            sasl: None,
            timeout_ms: 300_000,
            tls: false,
        }
    }

    #[test]
    fn test_happy_minimal() {
        let config = base_config();
        let (mut hs, initial) = Handshake::start(&config);
        match initial {
            HandshakeStep::Continue(out) => {
                assert_eq!(out, vec!["USER testuser 8 * :realbot", "NICK testbot"]);
            }
            other => panic!("unexpected {:?}", other),
        }

        match hs.on_line(":irc.test.net 001 testbot :Welcome") {
            HandshakeStep::Settled(Ok(outcome), out) => {
                assert_eq!(outcome.nickname, "testbot");
                assert!(outcome.capabilities.is_empty());
                assert!(out.is_empty());
            }
            other => panic!("expected settled Ok, got {:?}", other),
        }
    }

    #[test]
    fn test_nickname_collision_then_success() {
        let mut config = base_config();
        config.nicknames = vec!["testbot".to_string(), "testbot_".to_string()];
        let (mut hs, _initial) = Handshake::start(&config);

        match hs.on_line(":s 433 * testbot :in use") {
            HandshakeStep::Continue(out) => assert_eq!(out, vec!["NICK testbot_"]),
            other => panic!("unexpected {:?}", other),
        }

        match hs.on_line(":s 001 testbot_ :Welcome") {
            HandshakeStep::Settled(Ok(outcome), _) => assert_eq!(outcome.nickname, "testbot_"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_nickname_exhaustion() {
        let config = base_config();
        let (mut hs, _initial) = Handshake::start(&config);

        match hs.on_line(":s 433 * testbot :in use") {
            HandshakeStep::Settled(Err(ConnectFailure::NicknamesUnavailable), out) => {
                assert_eq!(out, vec!["QUIT".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_webirc_failure() {
        let mut config = base_config();
        config.proxy = Some(ProxyConfig {
            password: "pword".to_string(),
            username: "uname".to_string(),
            hostname: "hostname.net".to_string(),
            ip: "111.11.11.11".to_string(),
        });
        let (mut hs, initial) = Handshake::start(&config);
        match initial {
            HandshakeStep::Continue(out) => {
                assert_eq!(out[0], "WEBIRC pword uname hostname.net 111.11.11.11");
            }
            other => panic!("unexpected {:?}", other),
        }

        match hs.on_line("ERROR :Closing Link: (bad webirc)") {
            HandshakeStep::Settled(Err(ConnectFailure::BadProxyConfiguration), _) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_capability_required_unsatisfied_via_nak() {
        let mut config = base_config();
        config.capabilities = Some(CapabilityConfig {
            requires: ["a".to_string()].into_iter().collect(),
            wants: HashSet::new(),
        });
        let (mut hs, initial) = Handshake::start(&config);
        match initial {
            HandshakeStep::Continue(out) => assert_eq!(out, vec!["CAP LS"]),
            other => panic!("unexpected {:?}", other),
        }

        let after_ls = hs.on_line(":s CAP * LS :a b");
        assert!(matches!(after_ls, HandshakeStep::Continue(_)));

        match hs.on_line(":s CAP * NAK :a") {
            HandshakeStep::Settled(Err(ConnectFailure::MissingRequiredCapabilities), out) => {
                assert_eq!(out, vec!["QUIT".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cap_rejected_with_no_requires_falls_through() {
        let mut config = base_config();
        config.capabilities = Some(CapabilityConfig {
            requires: HashSet::new(),
            wants: ["multi-prefix".to_string()].into_iter().collect(),
        });
        let (mut hs, _initial) = Handshake::start(&config);

        match hs.on_line(":s 421 * CAP :Unknown command") {
            HandshakeStep::Continue(out) => {
                assert_eq!(out, vec!["USER testuser 8 * :realbot", "NICK testbot"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sasl_plain_then_cap_end_after_903() {
        let mut config = base_config();
        config.capabilities = Some(CapabilityConfig {
            requires: HashSet::new(),
            wants: ["sasl".to_string()].into_iter().collect(),
        });
        config.sasl = Some(SaslConfig {
            username: None,
            password: "hunter2".to_string(),
        });
        let (mut hs, _initial) = Handshake::start(&config);

        hs.on_line(":s CAP * LS :sasl");
        match hs.on_line(":s CAP * ACK :sasl") {
            HandshakeStep::Continue(out) => assert_eq!(out, vec!["AUTHENTICATE PLAIN"]),
            other => panic!("unexpected {:?}", other),
        }

        match hs.on_line("AUTHENTICATE +") {
            HandshakeStep::Continue(out) => {
                assert_eq!(out.len(), 1);
                assert!(out[0].starts_with("AUTHENTICATE "));
            }
            other => panic!("unexpected {:?}", other),
        }

        match hs.on_line(":s 903 testbot :SASL authentication successful") {
            HandshakeStep::Continue(out) => {
                assert_eq!(
                    out,
                    vec![
                        "CAP END".to_string(),
                        "USER testuser 8 * :realbot".to_string(),
                        "NICK testbot".to_string(),
                    ]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_notice_login_unsuccessful_fails_password() {
        let config = base_config();
        let (mut hs, _initial) = Handshake::start(&config);
        match hs.on_line(":tmi.twitch.tv NOTICE * :Login unsuccessful") {
            HandshakeStep::Settled(Err(ConnectFailure::BadPassword), _) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_nicknames_settles_immediately_without_nick() {
        let mut config = base_config();
        config.nicknames = Vec::new();
        let (hs, initial) = Handshake::start(&config);
        match initial {
            HandshakeStep::Settled(Err(ConnectFailure::NicknamesUnavailable), out) => {
                assert_eq!(out, vec!["QUIT".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(hs.current_nickname.is_none());
    }

    #[test]
    fn test_empty_nicknames_after_cap_negotiation_settles() {
        let mut config = base_config();
        config.nicknames = Vec::new();
        config.capabilities = Some(CapabilityConfig {
            requires: HashSet::new(),
            wants: HashSet::new(),
        });
        let (mut hs, _initial) = Handshake::start(&config);

        match hs.on_line(":s CAP * LS :multi-prefix") {
            HandshakeStep::Settled(Err(ConnectFailure::NicknamesUnavailable), out) => {
                assert_eq!(out, vec!["CAP END".to_string(), "QUIT".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
