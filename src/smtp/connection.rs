//! Line-level I/O over an SMTP socket with per-operation deadlines.

use super::{Reply, SmtpError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, trace};

/// A buffered SMTP socket. Works over any byte stream, so the same code runs
/// on plain TCP, on TLS, and on scripted streams in tests.
pub struct Connection<S> {
    reader: BufReader<S>,
    io_timeout: Duration,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self {
            reader: BufReader::new(stream),
            io_timeout,
        }
    }

    /// Writes one command line followed by CRLF.
    ///
    /// `shown` is what gets logged in place of `line`, so credentials never
    /// reach the logs.
    pub async fn write_line(&mut self, line: &str, shown: &str) -> Result<(), SmtpError> {
        debug!("C: {}", shown);
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line.as_bytes());
        buf.extend_from_slice(b"\r\n");
        self.write_raw(&buf).await
    }

    /// Writes raw bytes and flushes them.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<(), SmtpError> {
        let after = self.io_timeout;
        let writer = self.reader.get_mut();
        timeout(after, async {
            writer.write_all(data).await?;
            writer.flush().await
        })
        .await
        .map_err(|_| SmtpError::Timeout {
            operation: "writing to server",
            after,
        })??;
        Ok(())
    }

    /// Reads one complete reply, accumulating continuation lines until the
    /// final line arrives. The whole reply, not each line, is bounded by the
    /// I/O deadline.
    pub async fn read_reply(&mut self) -> Result<Reply, SmtpError> {
        let after = self.io_timeout;
        let raw_lines = timeout(after, Self::read_reply_lines(&mut self.reader))
            .await
            .map_err(|_| SmtpError::Timeout {
                operation: "waiting for server reply",
                after,
            })??;
        Reply::parse(&raw_lines)
    }

    async fn read_reply_lines(reader: &mut BufReader<S>) -> Result<Vec<String>, SmtpError> {
        let mut raw_lines = Vec::new();
        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Err(SmtpError::ConnectionClosed);
            }

            let line = line.trim_end_matches(['\r', '\n']).to_string();
            debug!("S: {}", line);
            let is_final = Reply::is_final_line(&line);
            raw_lines.push(line);
            if is_final {
                return Ok(raw_lines);
            }
        }
    }

    /// Shuts the write half down. Errors are ignored: the peer may already
    /// have gone away, and the socket is released on drop either way.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.reader.get_mut().shutdown().await {
            trace!(error = %e, "Socket shutdown failed");
        }
    }

    /// Unwraps the underlying stream. Any bytes the server sent ahead of the
    /// last reply are discarded.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}
