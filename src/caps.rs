//! Client-side IRCv3 capability negotiation bookkeeping.
//!
//! This module tracks the bounded `CAP LS` / `CAP REQ` / `CAP ACK` / `CAP NAK`
//! exchange the handshake drives. It intentionally does not implement the
//! full IRCv3.2 negotiation protocol (no `CAP LS 302` multiline continuation,
//! no `CAP NEW`/`CAP DEL`, no sticky/disable semantics) — only what the
//! client side of a one-shot registration needs.

use std::collections::HashSet;

/// Tracks the state of an in-flight capability negotiation.
///
/// Constructed when the handshake sends `CAP LS` and dropped once
/// negotiation concludes (successfully or otherwise).
#[derive(Clone, Debug, Default)]
pub struct CapState {
    /// Capabilities the server advertised via `CAP LS`.
    server_caps: HashSet<String>,
    /// Capabilities from `wants` that the server ACK'd.
    acked: Vec<String>,
    /// Number of `CAP REQ` lines sent so far.
    sent_requests: u32,
    /// Number of `CAP ACK`/`CAP NAK` replies received so far.
    responded_requests: u32,
}

impl CapState {
    /// Create an empty capability state, as when `CAP LS` is first sent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `CAP * LS :<space-separated list>` line. The leading `:`
    /// must already be stripped by the caller (it is a trailing-parameter
    /// marker, not part of the capability list).
    pub fn record_ls(&mut self, list: &str) {
        for cap in list.split_whitespace() {
            let name = cap.split('=').next().unwrap_or(cap);
            self.server_caps.insert(name.to_string());
        }
    }

    /// Capabilities from `requires` that the server did not advertise.
    /// A non-empty result means the handshake must fail with
    /// `MissingRequiredCapabilities`.
    pub fn missing_required<'a>(&self, requires: &'a HashSet<String>) -> Vec<&'a str> {
        requires
            .iter()
            .filter(|c| !self.server_caps.contains(*c))
            .map(String::as_str)
            .collect()
    }

    /// Build the `CAP REQ` bodies to send: a single combined line for
    /// `requires` (if non-empty) followed by one line per `wants`
    /// capability that the server actually advertised. Each returned body
    /// increments `sent_requests` by one, matching one outstanding
    /// ACK/NAK reply.
    pub fn build_requests(&mut self, requires: &HashSet<String>, wants: &HashSet<String>) -> Vec<String> {
        let mut bodies = Vec::new();

        if !requires.is_empty() {
            let mut names: Vec<&str> = requires.iter().map(String::as_str).collect();
            names.sort_unstable();
            bodies.push(names.join(" "));
        }

        let mut wanted: Vec<&str> = wants
            .iter()
            .filter(|c| self.server_caps.contains(*c))
            .map(String::as_str)
            .collect();
        wanted.sort_unstable();
        for cap in wanted {
            bodies.push(cap.to_string());
        }

        self.sent_requests += bodies.len() as u32;
        bodies
    }

    /// Record a `CAP * ACK :<cap1> [cap2 ...]` line. A single ACK line
    /// answers exactly one `CAP REQ` line — even when that REQ bundled
    /// several capabilities together (as `requires` does) — so
    /// `responded_requests` increments once per line, not once per listed
    /// capability. Returns the subset of the line's capabilities that were
    /// in `wants`, which the caller should remember for the final `Ok`
    /// outcome's `capabilities` list.
    pub fn record_ack(&mut self, caps: &[&str], wants: &HashSet<String>) -> Vec<String> {
        self.responded_requests += 1;
        let mut newly_acked = Vec::new();
        for cap in caps {
            if wants.contains(*cap) {
                self.acked.push(cap.to_string());
                newly_acked.push(cap.to_string());
            }
        }
        newly_acked
    }

    /// Record a `CAP * NAK :<cap1> [cap2 ...]` line. One line answers one
    /// `CAP REQ` line, so `responded_requests` increments once regardless
    /// of how many capabilities the line lists. Returns whether any listed
    /// capability was in `requires`, in which case the caller must fail the
    /// handshake with `MissingRequiredCapabilities`.
    pub fn record_nak(&mut self, caps: &[&str], requires: &HashSet<String>) -> bool {
        self.responded_requests += 1;
        caps.iter().any(|cap| requires.contains(*cap))
    }

    /// Whether every sent `CAP REQ` has received a matching ACK or NAK.
    pub fn is_settled(&self) -> bool {
        self.sent_requests == self.responded_requests
    }

    /// The capabilities acknowledged so far (subset of `wants`), in the
    /// order they were ACK'd.
    pub fn acked(&self) -> &[String] {
        &self.acked
    }

    /// Whether `sasl` was both requested and acknowledged.
    pub fn sasl_acked(&self) -> bool {
        self.acked.iter().any(|c| c == "sasl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_record_ls_strips_values() {
        let mut state = CapState::new();
        state.record_ls("multi-prefix sasl=PLAIN server-time");
        assert!(state.missing_required(&set(&["sasl"])).is_empty());
        assert!(state.missing_required(&set(&["server-time"])).is_empty());
    }

    #[test]
    fn test_missing_required() {
        let mut state = CapState::new();
        state.record_ls("multi-prefix");
        let missing = state.missing_required(&set(&["sasl", "multi-prefix"]));
        assert_eq!(missing, vec!["sasl"]);
    }

    #[test]
    fn test_build_requests_combines_requires_and_filters_wants() {
        let mut state = CapState::new();
        state.record_ls("sasl multi-prefix");
        let requires = set(&["sasl"]);
        let wants = set(&["multi-prefix", "server-time"]);
        let bodies = state.build_requests(&requires, &wants);
        assert_eq!(bodies, vec!["sasl".to_string(), "multi-prefix".to_string()]);
        assert_eq!(state.sent_requests, 2);
        assert!(!state.is_settled());
    }

    #[test]
    fn test_ack_nak_accounting() {
        let mut state = CapState::new();
        state.record_ls("sasl multi-prefix");
        let requires = set(&["sasl"]);
        let wants = set(&["multi-prefix"]);
        state.build_requests(&requires, &wants);

        assert!(state.record_ack(&["sasl"], &wants).is_empty()); // sasl not in wants
        assert_eq!(state.record_ack(&["multi-prefix"], &wants), vec!["multi-prefix".to_string()]);
        assert!(state.is_settled());
        assert_eq!(state.acked(), &["multi-prefix".to_string()]);
    }

    #[test]
    fn test_ack_line_bundling_multiple_caps_counts_as_one_response() {
        // `requires` is sent as a single combined `CAP REQ` line, so a
        // server that ACKs it back as one combined line must count as one
        // response, not one per listed capability.
        let mut state = CapState::new();
        state.record_ls("sasl extended-join multi-prefix");
        let requires: HashSet<String> = set(&["sasl", "extended-join"]);
        let wants = set(&["multi-prefix"]);
        state.build_requests(&requires, &wants); // sent_requests == 2 (1 combined + 1 want)

        state.record_ack(&["sasl", "extended-join"], &wants);
        assert!(!state.is_settled());
        state.record_ack(&["multi-prefix"], &wants);
        assert!(state.is_settled());
    }

    #[test]
    fn test_nak_of_required_capability() {
        let mut state = CapState::new();
        state.record_ls("a b");
        let requires = set(&["a"]);
        state.build_requests(&requires, &HashSet::new());
        assert!(state.record_nak(&["a"], &requires));
    }

    #[test]
    fn test_sasl_acked() {
        let mut state = CapState::new();
        state.record_ls("sasl");
        let wants = set(&["sasl"]);
        state.build_requests(&HashSet::new(), &wants);
        state.record_ack(&["sasl"], &wants);
        assert!(state.sasl_acked());
    }
}
