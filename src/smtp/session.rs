//! The SMTP client state machine.
//!
//! A [`Session`] owns the socket for exactly one message. Each protocol step
//! is a method that checks the current [`SessionState`], performs a single
//! command/reply exchange and returns the state it moved to. Any reply other
//! than the one expected for that step is returned as
//! [`SmtpError::UnexpectedReply`] and leaves the state untouched; the caller is
//! expected to [`close`](Session::close) the session and give up.

use super::{Connection, Reply, SmtpError};
use base64::{engine::general_purpose::STANDARD, Engine};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

/// Where a session is in the linear delivery sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket open, greeting not yet read.
    Connected,
    /// Greeting accepted (and `EHLO` answered, once sent).
    Greeted,
    /// Server accepted `STARTTLS`; the TLS handshake is next.
    TlsReady,
    /// TLS negotiated via `STARTTLS`; `EHLO` must be sent again.
    TlsUpgraded,
    /// `AUTH LOGIN` in progress, waiting to send the given credential.
    AuthChallenged(AuthPrompt),
    Authenticated,
    SenderSet,
    RecipientSet,
    /// `DATA` accepted; the message payload is next.
    DataMode,
    MessageSent,
    Closed,
}

/// The credential the server asked for during `AUTH LOGIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPrompt {
    Username,
    Password,
}

use SessionState::*;

/// States from which a mail transaction (or authentication) may begin.
const READY: &[SessionState] = &[Greeted, TlsUpgraded];

pub struct Session<S> {
    conn: Connection<S>,
    state: SessionState,
    tls: bool,
    authenticated: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Starts a session on a freshly connected plaintext socket.
    pub fn new(stream: S, io_timeout: Duration) -> Self {
        Self::with_state(stream, io_timeout, Connected, false)
    }

    /// Starts a session on a socket that was wrapped in TLS at connect time.
    pub fn new_tls(stream: S, io_timeout: Duration) -> Self {
        Self::with_state(stream, io_timeout, Connected, true)
    }

    /// Resumes a session after a successful `STARTTLS` handshake.
    pub fn resume_tls(stream: S, io_timeout: Duration) -> Self {
        Self::with_state(stream, io_timeout, TlsUpgraded, true)
    }

    fn with_state(stream: S, io_timeout: Duration, state: SessionState, tls: bool) -> Self {
        Self {
            conn: Connection::new(stream, io_timeout),
            state,
            tls,
            authenticated: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_tls(&self) -> bool {
        self.tls
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Step 1: reads the server greeting. Any 2xx code is accepted.
    pub async fn greet(&mut self) -> Result<SessionState, SmtpError> {
        self.require("greeting", &[Connected])?;
        let reply = self.conn.read_reply().await?;
        if !reply.is_positive_completion() {
            return Err(SmtpError::UnexpectedReply {
                command: "<greeting>".to_string(),
                expected: 220,
                reply,
            });
        }
        self.advance(Greeted)
    }

    /// Step 2 (and the second half of step 3): `EHLO`. Leaves the state
    /// unchanged on success.
    pub async fn ehlo(&mut self, hostname: &str) -> Result<SessionState, SmtpError> {
        self.require("EHLO", READY)?;
        let command = format!("EHLO {}", hostname);
        self.exchange(&command, &command, 250).await?;
        Ok(self.state)
    }

    /// Step 3: asks the server to start TLS. On success the caller takes the
    /// stream back with [`into_stream`](Self::into_stream) and performs the
    /// handshake.
    pub async fn starttls(&mut self) -> Result<SessionState, SmtpError> {
        self.require("STARTTLS", &[Greeted])?;
        self.exchange("STARTTLS", "STARTTLS", 220).await?;
        self.advance(TlsReady)
    }

    /// Step 4: `AUTH LOGIN`; the server should prompt for the username.
    pub async fn auth_login(&mut self) -> Result<SessionState, SmtpError> {
        self.require("AUTH LOGIN", READY)?;
        self.exchange("AUTH LOGIN", "AUTH LOGIN", 334).await?;
        self.advance(AuthChallenged(AuthPrompt::Username))
    }

    /// Step 5: the base64 username; the server should prompt for the password.
    pub async fn auth_username(&mut self, username: &str) -> Result<SessionState, SmtpError> {
        self.require("<username>", &[AuthChallenged(AuthPrompt::Username)])?;
        let encoded = STANDARD.encode(username.as_bytes());
        self.exchange(&encoded, "<username>", 334).await?;
        self.advance(AuthChallenged(AuthPrompt::Password))
    }

    /// Step 6: the base64 password.
    pub async fn auth_password(&mut self, password: &str) -> Result<SessionState, SmtpError> {
        self.require("<password>", &[AuthChallenged(AuthPrompt::Password)])?;
        let encoded = STANDARD.encode(password.as_bytes());
        self.exchange(&encoded, "<password>", 235).await?;
        self.authenticated = true;
        self.advance(Authenticated)
    }

    /// Step 7: `MAIL FROM`. Allowed straight after `EHLO` when the transport
    /// has no credentials configured.
    pub async fn mail_from(&mut self, sender: &str) -> Result<SessionState, SmtpError> {
        self.require("MAIL FROM", &[Greeted, TlsUpgraded, Authenticated])?;
        let command = format!("MAIL FROM:<{}>", sender);
        self.exchange(&command, &command, 250).await?;
        self.advance(SenderSet)
    }

    /// Step 8: `RCPT TO`.
    pub async fn rcpt_to(&mut self, recipient: &str) -> Result<SessionState, SmtpError> {
        self.require("RCPT TO", &[SenderSet])?;
        let command = format!("RCPT TO:<{}>", recipient);
        self.exchange(&command, &command, 250).await?;
        self.advance(RecipientSet)
    }

    /// Step 9: `DATA`; the server should ask for the message with 354.
    pub async fn data(&mut self) -> Result<SessionState, SmtpError> {
        self.require("DATA", &[RecipientSet])?;
        self.exchange("DATA", "DATA", 354).await?;
        self.advance(DataMode)
    }

    /// Step 10: sends the already framed and dot-stuffed payload followed by
    /// the `.` terminator line.
    pub async fn send_message(&mut self, payload: &str) -> Result<SessionState, SmtpError> {
        self.require("<message>", &[DataMode])?;
        trace!(bytes = payload.len(), "Sending message payload");
        self.conn.write_raw(payload.as_bytes()).await?;
        if !payload.is_empty() && !payload.ends_with("\r\n") {
            self.conn.write_raw(b"\r\n").await?;
        }
        self.conn.write_line(".", ".").await?;
        self.expect_reply("<end of data>", 250).await?;
        self.advance(MessageSent)
    }

    /// Step 11: `QUIT`. Valid from any open state.
    pub async fn quit(&mut self) -> Result<SessionState, SmtpError> {
        if self.state == Closed {
            return Err(SmtpError::OutOfOrder {
                command: "QUIT",
                state: self.state,
            });
        }
        self.exchange("QUIT", "QUIT", 221).await?;
        self.advance(Closed)
    }

    /// Shuts the socket down and releases it.
    pub async fn close(mut self) {
        self.conn.shutdown().await;
    }

    /// Gives the socket back, e.g. to wrap it in TLS after `STARTTLS`.
    pub fn into_stream(self) -> S {
        self.conn.into_inner()
    }

    fn require(&self, command: &'static str, allowed: &[SessionState]) -> Result<(), SmtpError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SmtpError::OutOfOrder {
                command,
                state: self.state,
            })
        }
    }

    fn advance(&mut self, next: SessionState) -> Result<SessionState, SmtpError> {
        trace!(from = ?self.state, to = ?next, "SMTP state transition");
        self.state = next;
        Ok(next)
    }

    /// Sends `line` and checks the reply code. `shown` stands in for `line`
    /// in logs and errors.
    async fn exchange(&mut self, line: &str, shown: &str, expected: u16) -> Result<Reply, SmtpError> {
        self.conn.write_line(line, shown).await?;
        self.expect_reply(shown, expected).await
    }

    async fn expect_reply(&mut self, shown: &str, expected: u16) -> Result<Reply, SmtpError> {
        let reply = self.conn.read_reply().await?;
        if reply.code != expected {
            return Err(SmtpError::UnexpectedReply {
                command: shown.to_string(),
                expected,
                reply,
            });
        }
        Ok(reply)
    }
}
