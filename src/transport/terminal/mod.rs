// Line-oriented CLI sessions over telnet.
//
// Every exchange is "write a line, read byte by byte until a marker shows up". One deadline
// covers both the write and the read, so a stuck device never holds a step past its budget.

mod telnet;

use crate::error::{PollError, Result};
use crate::transport::icmp;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use telnet::TelnetFilter;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, trace};

pub const DEFAULT_PORT: u16 = 23;

/// Substrings that turn an otherwise complete response into a device error.
pub const ERROR_MARKERS: [&str; 2] = ["Error", "Invalid input"];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One login step: optionally send a line, then wait for `expect`.
#[derive(Debug, Clone)]
pub struct LoginStep {
    pub send: Option<String>,
    pub expect: &'static str,
    pub timeout: Duration,
}

impl LoginStep {
    /// Wait for the banner/prompt without sending anything.
    pub fn wait(expect: &'static str, timeout: Duration) -> Self {
        Self {
            send: None,
            expect,
            timeout,
        }
    }

    pub fn send(input: impl Into<String>, expect: &'static str, timeout: Duration) -> Self {
        Self {
            send: Some(input.into()),
            expect,
            timeout,
        }
    }
}

pub struct TerminalSession<S> {
    io: BufReader<S>,
    peer: String,
    filter: TelnetFilter,
}

impl TerminalSession<TcpStream> {
    /// Probe (optional), TCP connect, then run `script` in order.
    pub async fn connect(
        ip: IpAddr,
        port: u16,
        script: &[LoginStep],
        verify_reachable: bool,
    ) -> Result<Self> {
        if verify_reachable {
            icmp::ensure_reachable(ip).await?;
        }
        let addr = SocketAddr::new(ip, port);
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)).await {
            Ok(stream) => stream.map_err(|e| PollError::protocol(format!("connect {addr}: {e}")))?,
            Err(_) => {
                return Err(PollError::timeout(format!("connect {addr}"), CONNECT_TIMEOUT));
            }
        };
        stream.set_nodelay(true)?;
        Self::login(stream, addr.to_string(), script).await
    }
}

impl<S> TerminalSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: impl Into<String>) -> Self {
        Self {
            io: BufReader::new(stream),
            peer: peer.into(),
            filter: TelnetFilter::default(),
        }
    }

    /// Runs the login script strictly in order. Errors name the failing step (1-based).
    pub async fn login(stream: S, peer: impl Into<String>, script: &[LoginStep]) -> Result<Self> {
        let mut session = Self::new(stream, peer);
        for (i, step) in script.iter().enumerate() {
            let n = i + 1;
            let outcome = match &step.send {
                Some(input) => match session.exchange(input, step.expect, step.timeout).await {
                    Ok(raw) => session.reject_error_markers("login input", raw),
                    Err(e) => Err(e),
                },
                None => {
                    session
                        .read_until(step.expect, Instant::now() + step.timeout)
                        .await
                }
            };
            if let Err(e) = outcome {
                return Err(match e {
                    PollError::Timeout { elapsed, .. } => PollError::timeout(
                        format!(
                            "login step {n} on {} waiting for '{}'",
                            session.peer, step.expect
                        ),
                        elapsed,
                    ),
                    other => PollError::protocol(format!(
                        "login step {n} on {}: {other}",
                        session.peer
                    )),
                });
            }
        }
        debug!(peer = %session.peer, steps = script.len(), "terminal login complete");
        Ok(session)
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Sends `command`, returns the raw response up to and including `expect`.
    /// A response carrying one of [`ERROR_MARKERS`] is an error.
    pub async fn send(&mut self, command: &str, expect: &str, timeout: Duration) -> Result<String> {
        let raw = self.exchange(command, expect, timeout).await?;
        trace!(peer = %self.peer, command, response = %raw, "terminal exchange");
        self.reject_error_markers(command, raw)
    }

    fn reject_error_markers(&self, sent: &str, raw: String) -> Result<String> {
        if let Some(marker) = ERROR_MARKERS.iter().find(|m| raw.contains(**m)) {
            return Err(PollError::protocol(format!(
                "{}: '{sent}' answered with '{marker}'",
                self.peer
            )));
        }
        Ok(raw)
    }

    pub async fn close(mut self) {
        let _ = self.io.shutdown().await;
    }

    async fn exchange(&mut self, input: &str, expect: &str, timeout: Duration) -> Result<String> {
        let started = Instant::now();
        let deadline = started + timeout;
        let line = format!("{input}\r\n");
        let write = async {
            self.io.write_all(line.as_bytes()).await?;
            self.io.flush().await
        };
        match tokio::time::timeout_at(deadline, write).await {
            Ok(written) => written?,
            Err(_) => {
                return Err(PollError::timeout(
                    format!("writing to {}", self.peer),
                    started.elapsed(),
                ));
            }
        }
        self.read_until(expect, deadline).await
    }

    async fn read_until(&mut self, expect: &str, deadline: Instant) -> Result<String> {
        let started = Instant::now();
        let mut out = Vec::new();
        let mut reply = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = match tokio::time::timeout_at(deadline, self.io.read(&mut byte)).await {
                Ok(read) => read?,
                Err(_) => {
                    return Err(PollError::timeout(
                        format!("waiting for '{expect}' from {}", self.peer),
                        started.elapsed(),
                    ));
                }
            };
            if n == 0 {
                return Err(PollError::protocol(format!(
                    "{}: connection closed while waiting for '{expect}'",
                    self.peer
                )));
            }
            if let Some(b) = self.filter.feed(byte[0], &mut reply) {
                out.push(b);
            }
            if !reply.is_empty() {
                let answered = tokio::time::timeout_at(deadline, self.io.write_all(&reply)).await;
                if let Ok(Err(e)) = answered {
                    return Err(e.into());
                }
                reply.clear();
            }
            if out.ends_with(expect.as_bytes()) {
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
        }
    }
}

/// Drops the trailing prompt line, then per line: collapse double spaces, strip CR/NUL, lowercase.
pub fn normalize(raw: &str) -> String {
    let mut lines: Vec<&str> = raw.split('\n').collect();
    lines.pop();
    lines
        .iter()
        .map(|line| {
            line.replace("  ", " ")
                .replace(['\r', '\0'], "")
                .to_lowercase()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
