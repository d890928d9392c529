//! One-message-per-connection SMTP delivery.

use super::{compose, Headers, Mailbox, SecurityMode, Session, SessionState, SmtpError};
use crate::config::SmtpConfig;
use crate::core::{DeliveryOutcome, MailTransport};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info, instrument, warn};

struct Credentials {
    username: String,
    password: String,
}

/// Sends plain-text mail through a single configured SMTP server.
///
/// Every call opens its own connection and closes it before returning; nothing
/// is pooled or shared between recipients.
pub struct SmtpTransport {
    config: SmtpConfig,
    security: SecurityMode,
    hostname: String,
    credentials: Option<Credentials>,
    tls: TlsConnector,
}

impl SmtpTransport {
    /// Creates a transport from the SMTP configuration.
    ///
    /// Fails only if the platform TLS connector cannot be built.
    pub fn new(config: SmtpConfig) -> Result<Self, SmtpError> {
        let mut builder = native_tls::TlsConnector::builder();
        if config.insecure_skip_verify {
            warn!(
                host = %config.host,
                "TLS certificate and hostname verification disabled (insecure_skip_verify = true)"
            );
            builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true);
        }
        let tls = TlsConnector::from(builder.build()?);

        let credentials = match (&config.username, &config.password) {
            (Some(username), Some(password)) if !username.is_empty() => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            security: config.security_mode(),
            hostname: local_hostname(&config),
            credentials,
            tls,
            config,
        })
    }

    /// The security mode in effect for this transport.
    pub fn security(&self) -> SecurityMode {
        self.security
    }

    /// The name announced in `EHLO`.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Delivers one message, reporting only whether it was accepted.
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> bool {
        self.deliver(to, subject, body).await.success
    }

    /// Delivers one message, returning the error that ended the session if
    /// it was not accepted. The socket is closed on every path.
    #[instrument(skip(self, subject, body), fields(host = %self.config.host, port = self.config.port))]
    pub async fn try_send(&self, to: &str, subject: &str, body: &str) -> Result<(), SmtpError> {
        validate_address(to)?;
        let message = compose(&self.headers(to, subject, Local::now().into()), body);
        let io_timeout = self.config.io_timeout();

        let tcp = self.connect().await?;
        match self.security {
            SecurityMode::ImplicitTls => {
                let stream = self.handshake(tcp).await?;
                self.run(Session::new_tls(stream, io_timeout), to, &message)
                    .await
            }
            SecurityMode::StartTls => {
                let mut session = Session::new(tcp, io_timeout);
                if let Err(e) = self.negotiate_starttls(&mut session).await {
                    session.close().await;
                    return Err(e);
                }
                let stream = self.handshake(session.into_stream()).await?;
                info!("STARTTLS upgrade successful");
                self.run(Session::resume_tls(stream, io_timeout), to, &message)
                    .await
            }
            SecurityMode::Plain => {
                self.run(Session::new(tcp, io_timeout), to, &message).await
            }
        }
    }

    fn headers(&self, to: &str, subject: &str, date: DateTime<FixedOffset>) -> Headers {
        Headers {
            from: Mailbox::new(Some(&self.config.from_name), &self.config.from_address),
            reply_to: self.config.reply_to.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            date,
        }
    }

    async fn connect(&self) -> Result<TcpStream, SmtpError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let after = self.config.connect_timeout();
        debug!("Connecting to SMTP server {}", addr);
        timeout(after, TcpStream::connect(&addr))
            .await
            .map_err(|_| SmtpError::Timeout {
                operation: "connecting",
                after,
            })?
            .map_err(|source| SmtpError::Connect { addr, source })
    }

    async fn handshake(&self, tcp: TcpStream) -> Result<TlsStream<TcpStream>, SmtpError> {
        let after = self.config.connect_timeout();
        let stream = timeout(after, self.tls.connect(&self.config.host, tcp))
            .await
            .map_err(|_| SmtpError::Timeout {
                operation: "negotiating TLS",
                after,
            })??;
        Ok(stream)
    }

    async fn negotiate_starttls(&self, session: &mut Session<TcpStream>) -> Result<(), SmtpError> {
        session.greet().await?;
        session.ehlo(&self.hostname).await?;
        session.starttls().await?;
        Ok(())
    }

    /// Runs the rest of the exchange and closes the session whatever the outcome.
    async fn run<S>(&self, mut session: Session<S>, to: &str, message: &str) -> Result<(), SmtpError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let result = self.converse(&mut session, to, message).await;
        session.close().await;
        result
    }

    async fn converse<S>(&self, session: &mut Session<S>, to: &str, message: &str) -> Result<(), SmtpError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if session.state() == SessionState::Connected {
            session.greet().await?;
        }
        session.ehlo(&self.hostname).await?;

        if let Some(credentials) = &self.credentials {
            session.auth_login().await?;
            session.auth_username(&credentials.username).await?;
            session.auth_password(&credentials.password).await?;
        }

        session.mail_from(&self.config.from_address).await?;
        session.rcpt_to(to).await?;
        session.data().await?;
        session.send_message(message).await?;

        if let Err(e) = session.quit().await {
            debug!(error = %e, "QUIT was not acknowledged; message already accepted");
        }
        Ok(())
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn deliver(&self, to: &str, subject: &str, body: &str) -> DeliveryOutcome {
        let start = Instant::now();
        let result = self.try_send(to, subject, body).await;
        metrics::histogram!("smtp_delivery_duration_seconds").record(start.elapsed().as_secs_f64());

        match result {
            Ok(()) => {
                metrics::counter!("smtp_deliveries_total", "status" => "success").increment(1);
                debug!(recipient = to, "Message accepted by SMTP server");
                DeliveryOutcome::delivered(to)
            }
            Err(e) => {
                let kind = e.kind();
                metrics::counter!("smtp_deliveries_total", "status" => kind.as_str()).increment(1);
                warn!(recipient = to, kind = kind.as_str(), error = %e, "SMTP delivery failed");
                DeliveryOutcome::failed(to, e.to_string())
            }
        }
    }
}

/// Rejects addresses that would break out of `RCPT TO:<...>` or a header line.
fn validate_address(address: &str) -> Result<(), SmtpError> {
    let malformed = address.is_empty()
        || !address.contains('@')
        || address
            .chars()
            .any(|c| c.is_control() || c.is_whitespace() || c == '<' || c == '>');
    if malformed {
        return Err(SmtpError::InvalidAddress(address.to_string()));
    }
    Ok(())
}

fn local_hostname(config: &SmtpConfig) -> String {
    config
        .ehlo_hostname
        .clone()
        .or_else(sysinfo::System::host_name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
