//! A canned SMTP server for exercising the transport over real sockets.
//!
//! Each accepted connection is served by a fixed script: a greeting, default
//! replies per command, and optional overrides matched by command prefix.
//! When the client hangs up, everything it sent is reported as a
//! [`SessionRecord`].
//!
//! With a TLS acceptor the server either wraps every connection in TLS from
//! the first byte or answers `STARTTLS` with 220 and upgrades the socket.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_native_tls::TlsAcceptor;

/// Lookup key for the reply to the base64 username line.
pub const AUTH_USERNAME: &str = "<auth-username>";
/// Lookup key for the reply to the base64 password line.
pub const AUTH_PASSWORD: &str = "<auth-password>";
/// Lookup key for the reply to the terminating `.` of a message.
pub const END_OF_DATA: &str = "<end-of-data>";

/// What the client did during one connection.
#[derive(Debug, Clone, Default)]
pub struct SessionRecord {
    /// Every command line, credentials included, in order.
    pub commands: Vec<String>,
    /// Message contents received after `DATA`, un-stuffed, lines joined by `\n`.
    pub messages: Vec<String>,
    /// Whether the client closed the connection before the server gave up.
    pub client_closed: bool,
    /// Index into `commands` of the first command received over TLS.
    pub secure_from: Option<usize>,
}

impl SessionRecord {
    /// The command verbs, e.g. `["EHLO", "MAIL", "RCPT", "DATA", "QUIT"]`.
    pub fn verbs(&self) -> Vec<String> {
        self.commands
            .iter()
            .map(|c| c.split([' ', ':']).next().unwrap_or_default().to_uppercase())
            .collect()
    }

    pub fn sent(&self, prefix: &str) -> bool {
        self.commands.iter().any(|c| c.starts_with(prefix))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TlsMode {
    Implicit,
    StartTls,
}

#[derive(Clone)]
pub struct ServerScript {
    greeting: Option<Vec<String>>,
    overrides: Vec<(String, Vec<String>)>,
    tls: Option<(TlsMode, TlsAcceptor)>,
}

impl Default for ServerScript {
    fn default() -> Self {
        Self {
            greeting: Some(vec!["220 mock.test ESMTP ready".to_string()]),
            overrides: Vec::new(),
            tls: None,
        }
    }
}

impl ServerScript {
    pub fn greeting(mut self, lines: &[&str]) -> Self {
        self.greeting = Some(lines.iter().map(|l| l.to_string()).collect());
        self
    }

    /// Accept connections but never say anything.
    pub fn silent(mut self) -> Self {
        self.greeting = None;
        self
    }

    /// Wrap every connection in TLS before the greeting (SMTPS).
    pub fn implicit_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some((TlsMode::Implicit, acceptor));
        self
    }

    /// Answer `STARTTLS` with 220 and upgrade the connection.
    pub fn starttls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some((TlsMode::StartTls, acceptor));
        self.reply("STARTTLS", &["220 2.0.0 Ready to start TLS"])
    }

    /// Answer any command starting with `prefix` with `lines` instead of the default.
    pub fn reply(mut self, prefix: &str, lines: &[&str]) -> Self {
        self.overrides.push((
            prefix.to_string(),
            lines.iter().map(|l| l.to_string()).collect(),
        ));
        self
    }

    fn reply_for(&self, key: &str) -> Vec<String> {
        if let Some((_, lines)) = self
            .overrides
            .iter()
            .find(|(prefix, _)| key.to_uppercase().starts_with(&prefix.to_uppercase()))
        {
            return lines.clone();
        }
        let verb = match key {
            AUTH_USERNAME | AUTH_PASSWORD | END_OF_DATA => key.to_string(),
            _ => key.split([' ', ':']).next().unwrap_or_default().to_uppercase(),
        };
        let lines: &[&str] = match verb.as_str() {
            "EHLO" => &["250-mock.test greets you", "250-8BITMIME", "250-AUTH LOGIN", "250 SIZE 10240000"],
            "HELO" => &["250 mock.test"],
            "AUTH" => &["334 VXNlcm5hbWU6"],
            AUTH_USERNAME => &["334 UGFzc3dvcmQ6"],
            AUTH_PASSWORD => &["235 2.7.0 Authentication successful"],
            "MAIL" | "RCPT" | "RSET" | "NOOP" => &["250 2.1.0 OK"],
            "DATA" => &["354 End data with <CR><LF>.<CR><LF>"],
            END_OF_DATA => &["250 2.0.0 Ok: queued"],
            "STARTTLS" => &["454 4.7.0 TLS not available"],
            "QUIT" => &["221 2.0.0 Bye"],
            _ => &["502 5.5.2 Command not recognized"],
        };
        lines.iter().map(|l| l.to_string()).collect()
    }
}

pub struct MockSmtpServer {
    addr: SocketAddr,
    records: mpsc::UnboundedReceiver<SessionRecord>,
    handle: JoinHandle<()>,
}

impl MockSmtpServer {
    pub async fn start(script: ServerScript) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, records) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let script = script.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let record = serve(stream, &script).await;
                    let _ = tx.send(record);
                });
            }
        });

        Self {
            addr,
            records,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Waits for the next connection to finish.
    pub async fn next_session(&mut self) -> SessionRecord {
        tokio::time::timeout(Duration::from_secs(10), self.records.recv())
            .await
            .expect("no SMTP session finished in time")
            .expect("mock server stopped")
    }

    /// True if no connection finishes within `wait`.
    pub async fn stays_idle(&mut self, wait: Duration) -> bool {
        tokio::time::timeout(wait, self.records.recv()).await.is_err()
    }
}

impl Drop for MockSmtpServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

enum Mode {
    Command,
    AuthUsername,
    AuthPassword,
    Data(Vec<String>),
}

/// How a plaintext conversation ended.
enum Ending<S> {
    Closed,
    StartTls(S),
}

async fn serve(stream: TcpStream, script: &ServerScript) -> SessionRecord {
    let mut record = SessionRecord::default();
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        serve_tcp(stream, script, &mut record),
    )
    .await;
    record.client_closed = matches!(outcome, Ok(Ok(())));
    record
}

async fn serve_tcp(
    stream: TcpStream,
    script: &ServerScript,
    record: &mut SessionRecord,
) -> io::Result<()> {
    match &script.tls {
        Some((TlsMode::Implicit, acceptor)) => {
            let tls = acceptor.accept(stream).await.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            record.secure_from = Some(0);
            converse(tls, script, record, true).await?;
        }
        _ => {
            if let Ending::StartTls(tcp) = converse(stream, script, record, true).await? {
                let Some((_, acceptor)) = &script.tls else {
                    return Ok(());
                };
                let tls = acceptor.accept(tcp).await.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                record.secure_from = Some(record.commands.len());
                converse(tls, script, record, false).await?;
            }
        }
    }
    Ok(())
}

/// Plays the script until the client hangs up or a STARTTLS upgrade is due.
async fn converse<S>(
    stream: S,
    script: &ServerScript,
    record: &mut SessionRecord,
    greet: bool,
) -> io::Result<Ending<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);

    if greet {
        if let Some(greeting) = &script.greeting {
            send(reader.get_mut(), greeting).await?;
        }
    }

    let mut mode = Mode::Command;
    let mut buf = String::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf).await? == 0 {
            return Ok(Ending::Closed);
        }
        let line = buf.trim_end_matches(['\r', '\n']).to_string();

        if script.greeting.is_none() {
            record.commands.push(line);
            continue;
        }

        mode = match mode {
            Mode::Data(mut lines) => {
                if line == "." {
                    record.messages.push(lines.join("\n"));
                    send(reader.get_mut(), &script.reply_for(END_OF_DATA)).await?;
                    Mode::Command
                } else {
                    let unstuffed = line.strip_prefix('.').unwrap_or(&line).to_string();
                    lines.push(unstuffed);
                    Mode::Data(lines)
                }
            }
            Mode::AuthUsername => {
                record.commands.push(line);
                let reply = script.reply_for(AUTH_USERNAME);
                send(reader.get_mut(), &reply).await?;
                if status(&reply) == "334" {
                    Mode::AuthPassword
                } else {
                    Mode::Command
                }
            }
            Mode::AuthPassword => {
                record.commands.push(line);
                send(reader.get_mut(), &script.reply_for(AUTH_PASSWORD)).await?;
                Mode::Command
            }
            Mode::Command => {
                let reply = script.reply_for(&line);
                let upper = line.to_uppercase();
                record.commands.push(line);
                send(reader.get_mut(), &reply).await?;
                if upper == "STARTTLS" && status(&reply) == "220" && script.tls.is_some() {
                    return Ok(Ending::StartTls(reader.into_inner()));
                } else if upper == "DATA" && status(&reply) == "354" {
                    Mode::Data(Vec::new())
                } else if upper.starts_with("AUTH LOGIN") && status(&reply) == "334" {
                    Mode::AuthUsername
                } else {
                    Mode::Command
                }
            }
        };
    }
}

fn status(reply: &[String]) -> &str {
    reply.last().and_then(|l| l.get(..3)).unwrap_or_default()
}

async fn send<W: AsyncWrite + Unpin>(writer: &mut W, lines: &[String]) -> io::Result<()> {
    let mut out = String::new();
    for line in lines {
        out.push_str(line);
        out.push_str("\r\n");
    }
    writer.write_all(out.as_bytes()).await?;
    writer.flush().await
}

/// A TLS acceptor with a freshly generated self-signed certificate for
/// `localhost`. Clients only accept it with verification turned off.
pub fn self_signed_acceptor() -> TlsAcceptor {
    let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let identity = native_tls::Identity::from_pkcs8(
        cert.serialize_pem().unwrap().as_bytes(),
        cert.serialize_private_key_pem().as_bytes(),
    )
    .unwrap();
    TlsAcceptor::from(native_tls::TlsAcceptor::new(identity).unwrap())
}
