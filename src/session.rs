//! The session facade: owns the transport, drives the startup handshake,
//! and fans inbound lines out to a caller-facing event channel.
//!
//! A [`Session`] is single-use: `connect()` spawns one background task that
//! owns the [`Transport`], [`Framer`], [`Watchdog`], and [`Handshake`] for
//! the session's lifetime, serializing transport reads, timer firings, and
//! caller commands (`write`/`end`) through a single `tokio::select!` loop.
//! There is no locking; the invariants in the data model rely on that
//! serialization rather than on synchronization primitives.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use crate::error::{ConnectFailure, ProtocolError};
use crate::framer::Framer;
use crate::handshake::{ConnectOutcome, Handshake, HandshakeStep};
use crate::keepalive::{Watchdog, WatchdogPhase};
use crate::transport::Transport;

// Config types live in the ungated `crate::config` module so the sans-IO
// handshake core can depend on them without requiring the `tokio` feature;
// re-exported here so `session::SessionConfig` etc. keep working.
pub use crate::config::{CapabilityConfig, ProxyConfig, SaslConfig, SessionConfig};

/// Where a [`Session`] sits in its lifecycle. Monotone except that any
/// state may transition directly to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionStatus {
    Initialized = 0,
    Connecting = 1,
    Starting = 2,
    Running = 3,
    Closed = 4,
}

impl SessionStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SessionStatus::Initialized,
            1 => SessionStatus::Connecting,
            2 => SessionStatus::Starting,
            3 => SessionStatus::Running,
            _ => SessionStatus::Closed,
        }
    }
}

/// An outbound write: either a single preformatted line or a sequence of
/// tokens joined with a single space. Neither form auto-prefixes a
/// trailing-parameter colon; callers supply one where the IRC grammar
/// requires it.
#[derive(Debug, Clone)]
pub enum WriteMessage {
    Single(String),
    Parts(Vec<String>),
}

impl WriteMessage {
    fn into_line(self) -> String {
        match self {
            WriteMessage::Single(line) => line,
            WriteMessage::Parts(parts) => parts.join(" "),
        }
    }
}

impl From<String> for WriteMessage {
    fn from(line: String) -> Self {
        WriteMessage::Single(line)
    }
}

impl From<&str> for WriteMessage {
    fn from(line: &str) -> Self {
        WriteMessage::Single(line.to_string())
    }
}

impl From<Vec<String>> for WriteMessage {
    fn from(parts: Vec<String>) -> Self {
        WriteMessage::Parts(parts)
    }
}

/// Events delivered to callers over [`Session::next_event`].
#[derive(Debug)]
pub enum SessionEvent {
    /// The transport finished dialing; the startup handshake is beginning.
    Connect,
    /// A single inbound line, already framed and NFC-normalized. Emitted
    /// for every line including the `001` that settles the handshake.
    Data(String),
    /// The handshake succeeded. Emitted exactly once, immediately before
    /// the `connect()` outcome settles `Ok`.
    Ready {
        capabilities: Vec<String>,
        nickname: String,
    },
    /// An operational fault after the session reached `Running`.
    Error(ProtocolError),
    /// The transport ended (peer close or I/O error), not via `end()`.
    Close,
    /// `end()` was called, or `end()` was triggered by a `Timeout`.
    End,
    /// The no-pong phase of the idle watchdog elapsed; a graceful `end()`
    /// follows automatically.
    Timeout,
}

enum Command {
    Write(String),
    End,
    SetTimeout(u32),
}

/// Drives one connection attempt and, if successful, the resulting
/// registered session.
pub struct Session {
    config: SessionConfig,
    status: Arc<AtomicU8>,
    cmd_tx: mpsc::UnboundedSender<Command>,
    cmd_rx: Option<mpsc::UnboundedReceiver<Command>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    outcome_tx: Option<oneshot::Sender<Result<ConnectOutcome, ConnectFailure>>>,
    outcome_rx: Option<oneshot::Receiver<Result<ConnectOutcome, ConnectFailure>>>,
}

impl Session {
    /// Build a session in the `Initialized` state. Nothing is dialed until
    /// [`Session::connect`] is called.
    pub fn new(config: SessionConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        Self {
            config,
            status: Arc::new(AtomicU8::new(SessionStatus::Initialized as u8)),
            cmd_tx,
            cmd_rx: Some(cmd_rx),
            events_tx,
            events_rx,
            outcome_tx: Some(outcome_tx),
            outcome_rx: Some(outcome_rx),
        }
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// `status() != Initialized`.
    pub fn is_started(&self) -> bool {
        self.status() != SessionStatus::Initialized
    }

    /// `status()` is one of `Connecting`, `Starting`, `Running`.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.status(),
            SessionStatus::Connecting | SessionStatus::Starting | SessionStatus::Running
        )
    }

    /// `status() == Running`.
    pub fn is_ready(&self) -> bool {
        self.status() == SessionStatus::Running
    }

    /// Dial `{config.server, config.port}` over plain TCP and drive the
    /// startup handshake to completion. Resolves once the handshake
    /// settles, successfully or not; the session's background task keeps
    /// running past that point to serve `write`/`end`/auto-PONG/keepalive
    /// for the lifetime of the connection.
    #[instrument(skip(self), fields(server = %self.config.server, port = self.config.port))]
    pub async fn connect(&mut self) -> Result<ConnectOutcome, ConnectFailure> {
        if self.status() != SessionStatus::Initialized {
            // A session is single-use; reusing it maps onto the same
            // outcome as ending one before the handshake completed.
            return Err(ConnectFailure::SocketEnded);
        }
        self.set_status(SessionStatus::Connecting);
        let _ = self.events_tx.send(SessionEvent::Connect);

        let transport = match Transport::connect_tcp(&self.config.server, self.config.port).await {
            Ok(transport) => transport,
            Err(err) => {
                warn!(error = %err, "transport dial failed");
                self.set_status(SessionStatus::Closed);
                return Err(ConnectFailure::Killed);
            }
        };

        self.connect_with(transport).await
    }

    /// Drive the startup handshake over an already-connected transport
    /// (for example one returned by [`Transport::from_tls`] after the
    /// caller negotiated TLS itself).
    pub async fn connect_with(&mut self, transport: Transport) -> Result<ConnectOutcome, ConnectFailure> {
        if self.status() == SessionStatus::Initialized {
            self.set_status(SessionStatus::Connecting);
        }
        self.set_status(SessionStatus::Starting);

        let config = self.config.clone();
        let status = Arc::clone(&self.status);
        let events_tx = self.events_tx.clone();
        let outcome_tx = self
            .outcome_tx
            .take()
            .expect("connect() drives the session exactly once");
        let cmd_rx = self
            .cmd_rx
            .take()
            .expect("connect() drives the session exactly once");

        tokio::spawn(drive(config, status, events_tx, outcome_tx, cmd_rx, transport));

        self.outcome_rx
            .take()
            .expect("connect() drives the session exactly once")
            .await
            .unwrap_or(Err(ConnectFailure::Killed))
    }

    /// Queue a write. A no-op if the session is not connected. Rejects
    /// messages containing an embedded newline: IRC lines are terminated
    /// by the session, not the caller.
    pub fn write(&self, message: impl Into<WriteMessage>) -> Result<(), ProtocolError> {
        let line = message.into().into_line();
        if line.contains('\n') {
            return Err(ProtocolError::EmbeddedNewline);
        }
        if self.is_connected() {
            let _ = self.cmd_tx.send(Command::Write(line));
        }
        Ok(())
    }

    /// Request a graceful end. A no-op if not connected. If the connect
    /// outcome is still pending, it settles `Fail(SocketEnded)`.
    pub fn end(&self) {
        if self.is_connected() {
            let _ = self.cmd_tx.send(Command::End);
        }
    }

    /// Set the transport's idle read timeout. This is a plain passthrough
    /// to [`crate::transport::Transport::set_read_timeout`] and is
    /// orthogonal to the keepalive watchdog: it neither reschedules nor
    /// reads the silence/no-pong timer, which stays governed by
    /// `config.timeout_ms`.
    pub fn set_timeout(&self, timeout_ms: u32) {
        let _ = self.cmd_tx.send(Command::SetTimeout(timeout_ms));
    }

    /// Receive the next event, or `None` once the session's task has
    /// exited and no further events will arrive.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    fn set_status(&self, status: SessionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }
}

async fn drive(
    config: SessionConfig,
    status: Arc<AtomicU8>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    outcome_tx: oneshot::Sender<Result<ConnectOutcome, ConnectFailure>>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut transport: Transport,
) {
    let mut framer = Framer::new();
    let mut watchdog = Watchdog::new(config.timeout_ms);
    watchdog.start();

    let (mut handshake, first_step) = Handshake::start(&config);
    let mut outcome_tx = Some(outcome_tx);

    let mut handshake_done = false;
    if apply_step(&mut transport, &status, &events_tx, &mut outcome_tx, first_step)
        .await
        .is_err()
    {
        finish(&status, &events_tx, &mut outcome_tx, Shutdown::Io).await;
        return;
    }
    if outcome_tx.is_none() {
        handshake_done = true;
    }

    let shutdown = loop {
        tokio::select! {
            chunk = transport.next_chunk() => {
                match chunk {
                    Ok(Some(text)) => {
                        watchdog.reset();
                        let lines = framer.push(&text);
                        let mut broke = None;
                        for line in lines {
                            let _ = events_tx.send(SessionEvent::Data(line.clone()));

                            if let Some(rest) = line.strip_prefix("PING") {
                                let reply = format!("PONG{rest}");
                                if transport.write_raw(&reply).await.is_err() {
                                    broke = Some(Shutdown::Io);
                                    break;
                                }
                            }

                            if !handshake_done {
                                let step = handshake.on_line(&line);
                                match apply_step(&mut transport, &status, &events_tx, &mut outcome_tx, step).await {
                                    Ok(true) => handshake_done = true,
                                    Ok(false) => {}
                                    Err(_) => {
                                        broke = Some(Shutdown::Io);
                                        break;
                                    }
                                }
                            }
                        }
                        if let Some(shutdown) = broke {
                            break shutdown;
                        }
                    }
                    Ok(None) => break Shutdown::Eof,
                    Err(err) => break Shutdown::Error(ProtocolError::Io(err)),
                }
            }
            phase = watchdog.elapsed() => {
                match phase {
                    WatchdogPhase::Silence => {
                        debug!("idle watchdog: sending keepalive PING");
                        if transport.write_raw("PING :ignored").await.is_err() {
                            break Shutdown::Io;
                        }
                        watchdog.arm_no_pong();
                    }
                    WatchdogPhase::NoPong => {
                        info!("idle watchdog: no response to keepalive PING, ending session");
                        let _ = events_tx.send(SessionEvent::Timeout);
                        break Shutdown::Ended;
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(Command::Write(line)) => {
                        if transport.write_raw(&line).await.is_err() {
                            break Shutdown::Io;
                        }
                    }
                    Some(Command::SetTimeout(ms)) => {
                        transport.set_read_timeout(Some(std::time::Duration::from_millis(ms as u64)));
                    }
                    Some(Command::End) | None => break Shutdown::Ended,
                }
            }
        }
    };

    watchdog.cancel();
    finish(&status, &events_tx, &mut outcome_tx, shutdown).await;
}

enum Shutdown {
    /// `end()` was called, or the keepalive no-pong phase elapsed.
    Ended,
    /// Transport reached a clean EOF.
    Eof,
    /// A read or write on the transport failed.
    Io,
    /// A read failed with a specific error worth surfacing.
    Error(ProtocolError),
}

async fn finish(
    status: &Arc<AtomicU8>,
    events_tx: &mpsc::UnboundedSender<SessionEvent>,
    outcome_tx: &mut Option<oneshot::Sender<Result<ConnectOutcome, ConnectFailure>>>,
    shutdown: Shutdown,
) {
    if let Some(tx) = outcome_tx.take() {
        let failure = match &shutdown {
            Shutdown::Ended => ConnectFailure::SocketEnded,
            _ => ConnectFailure::Killed,
        };
        let _ = tx.send(Err(failure));
    }

    match shutdown {
        Shutdown::Ended => {
            let _ = events_tx.send(SessionEvent::End);
        }
        Shutdown::Eof => {
            let _ = events_tx.send(SessionEvent::Close);
        }
        Shutdown::Io => {
            let _ = events_tx.send(SessionEvent::Close);
        }
        Shutdown::Error(err) => {
            let _ = events_tx.send(SessionEvent::Error(err));
            let _ = events_tx.send(SessionEvent::Close);
        }
    }

    status.store(SessionStatus::Closed as u8, Ordering::Release);
}

/// Apply one [`HandshakeStep`]: write its outbound lines, and if it
/// settled, emit `Ready` (on success), transition to `Running`, and send
/// the outcome. Returns `Ok(true)` once settled, `Ok(false)` while still
/// negotiating, `Err(())` on a transport write failure.
async fn apply_step(
    transport: &mut Transport,
    status: &Arc<AtomicU8>,
    events_tx: &mpsc::UnboundedSender<SessionEvent>,
    outcome_tx: &mut Option<oneshot::Sender<Result<ConnectOutcome, ConnectFailure>>>,
    step: HandshakeStep,
) -> Result<bool, ()> {
    match step {
        HandshakeStep::Continue(lines) => {
            for line in lines {
                transport.write_raw(&line).await.map_err(|_| ())?;
            }
            Ok(false)
        }
        HandshakeStep::Settled(result, lines) => {
            for line in lines {
                transport.write_raw(&line).await.map_err(|_| ())?;
            }
            if let Ok(outcome) = &result {
                let _ = events_tx.send(SessionEvent::Ready {
                    capabilities: outcome.capabilities.clone(),
                    nickname: outcome.nickname.clone(),
                });
                status.store(SessionStatus::Running as u8, Ordering::Release);
            }
            if let Some(tx) = outcome_tx.take() {
                let _ = tx.send(result);
            }
            Ok(true)
        }
    }
}
