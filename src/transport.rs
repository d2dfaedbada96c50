//! Byte-transport adapter: owns the socket, leaves framing to [`crate::framer`].
//!
//! `Transport` wraps either a plain `TcpStream` or a caller-supplied
//! `tokio_rustls::client::TlsStream<TcpStream>`. It does not parse IRC lines;
//! it decodes inbound bytes as UTF-8 incrementally (buffering a trailing
//! incomplete multi-byte sequence rather than corrupting it) and hands the
//! decoded text to the framer. TLS negotiation, certificate validation, and
//! DNS resolution are the caller's responsibility.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::warn;

const READ_CHUNK_SIZE: usize = 8192;

enum Reader {
    Tcp(OwnedReadHalf),
    Tls(ReadHalf<TlsStream<TcpStream>>),
}

enum Writer {
    Tcp(OwnedWriteHalf),
    Tls(WriteHalf<TlsStream<TcpStream>>),
}

/// A connected byte-stream, plaintext or TLS, that yields decoded UTF-8
/// chunks and accepts pre-framed outbound lines.
pub struct Transport {
    reader: Reader,
    writer: Writer,
    /// Bytes from the most recent read that did not form a complete UTF-8
    /// sequence; prepended to the next read.
    pending: Vec<u8>,
    /// A caller-set idle read timeout, independent of the session's
    /// keepalive watchdog (see [`crate::session::Session::set_timeout`]).
    /// `None` means reads never time out on their own.
    read_timeout: Option<Duration>,
}

impl Transport {
    /// Dial a plaintext TCP connection, enabling keepalive and disabling
    /// Nagle's algorithm.
    pub async fn connect_tcp(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        if let Err(err) = Self::enable_keepalive(&stream) {
            warn!(error = %err, "failed to enable TCP keepalive");
        }
        let (read, write) = stream.into_split();
        Ok(Self {
            reader: Reader::Tcp(read),
            writer: Writer::Tcp(write),
            pending: Vec::new(),
            read_timeout: None,
        })
    }

    /// Adopt an already-negotiated TLS stream. Certificate validation, SNI,
    /// and the handshake itself happened before this call.
    pub fn from_tls(stream: TlsStream<TcpStream>) -> Self {
        let (read, write) = tokio::io::split(stream);
        Self {
            reader: Reader::Tls(read),
            writer: Writer::Tls(write),
            pending: Vec::new(),
            read_timeout: None,
        }
    }

    /// Set (or clear, with `None`) an idle read timeout: if no inbound data
    /// arrives within `timeout`, [`Transport::next_chunk`] resolves with an
    /// `io::ErrorKind::TimedOut` error instead of waiting forever. This is a
    /// plain transport-level passthrough, independent of the session's
    /// keepalive watchdog — setting it does not touch the watchdog's
    /// silence/no-pong schedule.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    fn enable_keepalive(stream: &TcpStream) -> anyhow::Result<()> {
        use socket2::{SockRef, TcpKeepalive};
        use std::time::Duration;

        let sock = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(Duration::from_secs(120))
            .with_interval(Duration::from_secs(30));
        sock.set_tcp_keepalive(&keepalive)?;
        Ok(())
    }

    /// Read the next available chunk of inbound bytes, decoded as UTF-8.
    /// Returns `Ok(None)` on a clean EOF with no undecoded bytes left
    /// outstanding, or an `io::ErrorKind::TimedOut` error if a read timeout
    /// is set via [`Transport::set_read_timeout`] and elapses first.
    pub async fn next_chunk(&mut self) -> io::Result<Option<String>> {
        let mut buf = [0u8; READ_CHUNK_SIZE];
        let read = async {
            match &mut self.reader {
                Reader::Tcp(r) => r.read(&mut buf).await,
                Reader::Tls(r) => r.read(&mut buf).await,
            }
        };
        let n = match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, read)
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "read timed out"))??,
            None => read.await?,
        };
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(decode_incremental(&mut self.pending, &buf[..n])))
    }

    /// Write a single already-framed line, appending the `\r\n` terminator.
    pub async fn write_raw(&mut self, line: &str) -> io::Result<()> {
        let writer: &mut (dyn tokio::io::AsyncWrite + Unpin + Send) = match &mut self.writer {
            Writer::Tcp(w) => w,
            Writer::Tls(w) => w,
        };
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\r\n").await?;
        writer.flush().await
    }

    /// Whether this transport is TLS-wrapped.
    pub fn is_tls(&self) -> bool {
        matches!(self.reader, Reader::Tls(_))
    }
}

/// Decode `incoming` bytes appended to the carry-over `pending` buffer,
/// returning the longest valid UTF-8 prefix and leaving any genuinely
/// incomplete trailing sequence in `pending` for the next call. Invalid
/// byte sequences are replaced with U+FFFD rather than aborting, mirroring
/// a streaming UTF-8 decoder rather than a one-shot `from_utf8`.
fn decode_incremental(pending: &mut Vec<u8>, incoming: &[u8]) -> String {
    pending.extend_from_slice(incoming);
    let mut out = String::with_capacity(pending.len());

    loop {
        match std::str::from_utf8(pending) {
            Ok(s) => {
                out.push_str(s);
                pending.clear();
                break;
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                out.push_str(std::str::from_utf8(&pending[..valid_up_to]).unwrap());
                match e.error_len() {
                    Some(bad_len) => {
                        out.push('\u{FFFD}');
                        let rest = pending.split_off(valid_up_to + bad_len);
                        *pending = rest;
                    }
                    None => {
                        let rest = pending.split_off(valid_up_to);
                        *pending = rest;
                        break;
                    }
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_incremental_simple() {
        let mut pending = Vec::new();
        let out = decode_incremental(&mut pending, b"hello");
        assert_eq!(out, "hello");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_decode_incremental_split_multibyte() {
        // U+AC01 = 0xEA 0xB0 0x81, split after the first byte.
        let full = "\u{AC01}".as_bytes().to_vec();
        let mut pending = Vec::new();
        let out = decode_incremental(&mut pending, &full[..1]);
        assert_eq!(out, "");
        assert_eq!(pending.len(), 1);

        let out = decode_incremental(&mut pending, &full[1..]);
        assert_eq!(out, "\u{AC01}");
        assert!(pending.is_empty());
    }

    #[test]
    fn test_decode_incremental_invalid_byte_is_replaced() {
        let mut pending = Vec::new();
        let out = decode_incremental(&mut pending, &[b'a', 0xff, b'b']);
        assert_eq!(out, "a\u{FFFD}b");
        assert!(pending.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_timeout_elapses_independently_of_data() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            // Hold the connection open without ever writing.
            std::mem::forget(sock);
        });

        let mut transport = Transport::connect_tcp("127.0.0.1", port).await.unwrap();
        transport.set_read_timeout(Some(Duration::from_millis(500)));

        tokio::time::advance(Duration::from_millis(501)).await;
        let err = transport.next_chunk().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_no_read_timeout_by_default() {
        use tokio::io::AsyncWriteExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"hi\r\n").await.unwrap();
        });

        let mut transport = Transport::connect_tcp("127.0.0.1", port).await.unwrap();
        let chunk = transport.next_chunk().await.unwrap();
        assert_eq!(chunk.as_deref(), Some("hi\r\n"));

        server.await.unwrap();
    }
}
