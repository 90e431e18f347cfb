//! Client for the OpenVPN management interface.
//!
//! Every fetch opens a fresh TCP connection, sends the status request, reads
//! until the `END` line (or until a read stays silent for the timeout) and
//! keeps only the `CLIENT_LIST` lines. Any failure along the way is logged and
//! reported as "no sessions".

use std::future::Future;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::configuration::types::HostConfig;
use crate::error_handling::types::StatusError;

/// Request for the comma separated status format carrying `CLIENT_LIST` lines.
pub const STATUS_REQUEST: &[u8] = b"status 2\n";
pub const SESSION_MARKER: &str = "CLIENT_LIST";
pub const END_MARKER: &[u8] = b"END";

/// Anything a poller can ask for the current status lines of a host.
pub trait StatusSource: Send {
    fn fetch_status(&mut self) -> impl Future<Output = Vec<String>> + Send;
}

pub struct StatusClient {
    alias: String,
    target: HostConfig,
    timeout: Duration,
}

impl StatusClient {
    pub fn new(alias: impl Into<String>, target: HostConfig, timeout: Duration) -> Self {
        Self {
            alias: alias.into(),
            target,
            timeout,
        }
    }

    pub async fn try_fetch(&self) -> Result<Vec<String>, StatusError> {
        let address = (self.target.host.as_str(), self.target.monitoring_port);
        let stream = timeout(self.timeout, TcpStream::connect(address))
            .await
            .map_err(|_| StatusError::ConnectTimeout)?
            .map_err(StatusError::ConnectFailed)?;
        trace!(
            "[{}] connected to {}:{}",
            self.alias,
            self.target.host,
            self.target.monitoring_port
        );
        read_status(stream, self.timeout).await
    }
}

impl StatusSource for StatusClient {
    async fn fetch_status(&mut self) -> Vec<String> {
        match self.try_fetch().await {
            Ok(lines) => lines,
            Err(e) => {
                warn!(
                    "[{}] unable to fetch status from {}:{}: {}",
                    self.alias, self.target.host, self.target.monitoring_port, e
                );
                Vec::new()
            }
        }
    }
}

/// Runs one status exchange over an already open stream.
pub async fn read_status<S>(mut stream: S, read_timeout: Duration) -> Result<Vec<String>, StatusError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(STATUS_REQUEST).await.map_err(StatusError::Io)?;

    let mut raw = Vec::new();
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        let n = match timeout(read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(StatusError::Io(e)),
            Err(_) => {
                debug!("status read timed out after {} bytes", raw.len());
                break;
            }
        };
        if n == 0 {
            if raw.is_empty() {
                return Err(StatusError::EndOfStream);
            }
            break;
        }
        let scanned = raw.len();
        raw.extend_from_slice(&buf[..n]);
        if has_end_marker(&raw, scanned) {
            break;
        }
    }
    let _ = stream.shutdown().await;

    Ok(session_lines(&String::from_utf8_lossy(&raw)))
}

/// True once a complete `END` line has been received.
///
/// Lines completed before `scanned` were already checked; only the line
/// straddling `scanned` and the ones after it are looked at.
fn has_end_marker(raw: &[u8], scanned: usize) -> bool {
    let start = raw[..scanned]
        .iter()
        .rposition(|b| *b == b'\n')
        .map_or(0, |i| i + 1);
    raw[start..]
        .split(|b| *b == b'\n')
        .rev()
        .skip(1)
        .any(|line| line.strip_suffix(b"\r").unwrap_or(line) == END_MARKER)
}

fn session_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| line.starts_with(SESSION_MARKER))
        .map(str::to_string)
        .collect()
}
