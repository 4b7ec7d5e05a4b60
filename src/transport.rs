//! SMTP delivery over a plain TCP session: greeting, EHLO, password auth,
//! envelope, dot-stuffed DATA, QUIT. One attempt per send, no retries.

use crate::errors::{Error, Result};
use crate::message::WireMessage;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Resolved SMTP server coordinates plus the sending identity. Owned by
/// the caller and passed by value per send; no process-wide config state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpEndpoint {
    pub host: String,
    pub port: u16,
    /// Sender address, also used as the auth username.
    pub from_address: String,
    /// Password or app-specific token.
    pub secret: String,
}

/// Network-effecting half of a send. Mock this for tests; composition
/// lives behind [`crate::compose::Composer`] and needs no server.
#[async_trait]
pub trait Transport {
    async fn deliver(
        &self,
        endpoint: &SmtpEndpoint,
        envelope: &[String],
        wire: &WireMessage,
    ) -> Result<()>;
}

/// Single-attempt SMTP client. Blocks for the duration of the handshake
/// and transmission; callers wanting bounded latency impose an external
/// deadline.
#[derive(Debug, Default)]
pub struct SmtpTransport;

#[async_trait]
impl Transport for SmtpTransport {
    async fn deliver(
        &self,
        endpoint: &SmtpEndpoint,
        envelope: &[String],
        wire: &WireMessage,
    ) -> Result<()> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| {
                Error::Transport(format!(
                    "connect to {}:{} failed: {e}",
                    endpoint.host, endpoint.port
                ))
            })?;
        let mut session = Session::new(stream);

        session.greet().await?;
        session.ehlo().await?;
        session.auth(&endpoint.from_address, &endpoint.secret).await?;
        session.mail_from(&endpoint.from_address).await?;
        session.rcpt_to(envelope).await?;
        session.data(wire).await?;
        session.quit().await;

        info!(
            host = %endpoint.host,
            recipients = envelope.len(),
            "message accepted by server"
        );
        Ok(())
    }
}

struct Session {
    stream: TcpStream,
    allow_auth: bool,
    supports_plain: bool,
    supports_login: bool,
}

impl Session {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            allow_auth: false,
            supports_plain: false,
            supports_login: false,
        }
    }

    async fn read_response(&mut self) -> Result<String> {
        let mut response = String::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = self
                .stream
                .read(&mut buf)
                .await
                .map_err(|e| Error::Transport(format!("read failed: {e}")))?;
            if n == 0 {
                return Err(Error::Transport("connection closed mid-response".into()));
            }
            response.push_str(&String::from_utf8_lossy(&buf[..n]));
            if response_complete(&response) {
                break;
            }
        }
        debug!(target: "mailpost::smtp", reply = response.trim_end(), "server");
        Ok(response)
    }

    async fn write_line(&mut self, line: &str) -> Result<()> {
        debug!(target: "mailpost::smtp", command = line, "client");
        self.stream
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .map_err(|e| Error::Transport(format!("write failed: {e}")))?;
        self.stream
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("flush failed: {e}")))
    }

    /// Sends one command and checks the reply's leading digit.
    async fn command(&mut self, line: &str, expect: char, what: &str) -> Result<String> {
        self.write_line(line).await?;
        let reply = self.read_response().await?;
        if !reply.starts_with(expect) {
            return Err(Error::Transport(format!(
                "{what} rejected: {}",
                reply.trim_end()
            )));
        }
        Ok(reply)
    }

    async fn greet(&mut self) -> Result<()> {
        let reply = self.read_response().await?;
        if !reply.starts_with("220") {
            return Err(Error::Transport(format!(
                "unexpected greeting: {}",
                reply.trim_end()
            )));
        }
        Ok(())
    }

    async fn ehlo(&mut self) -> Result<()> {
        self.write_line("EHLO 127.0.0.1").await?;
        let reply = self.read_response().await?;
        if !reply.starts_with('2') {
            // Old servers without EHLO; HELO offers no AUTH either way.
            self.command("HELO 127.0.0.1", '2', "HELO").await?;
            return Ok(());
        }
        let upper = reply.to_uppercase();
        if upper.contains("AUTH") {
            self.allow_auth = true;
            self.supports_plain = upper.contains("PLAIN");
            self.supports_login = upper.contains("LOGIN");
        }
        Ok(())
    }

    async fn auth(&mut self, username: &str, secret: &str) -> Result<()> {
        if !self.allow_auth {
            return Ok(());
        }
        if self.supports_plain {
            self.auth_plain(username, secret).await
        } else if self.supports_login {
            self.auth_login(username, secret).await
        } else {
            Err(Error::Auth(
                "server offers no supported auth mechanism (PLAIN or LOGIN)".into(),
            ))
        }
    }

    async fn auth_plain(&mut self, username: &str, secret: &str) -> Result<()> {
        let blob = B64.encode(format!("\u{0}{username}\u{0}{secret}").as_bytes());
        self.write_line(&format!("AUTH PLAIN {blob}")).await?;
        let reply = self.read_response().await?;
        if !reply.starts_with('2') {
            return Err(Error::Auth(reply.trim_end().to_string()));
        }
        Ok(())
    }

    async fn auth_login(&mut self, username: &str, secret: &str) -> Result<()> {
        for (line, expect) in [
            ("AUTH LOGIN".to_string(), '3'),
            (B64.encode(username.as_bytes()), '3'),
            (B64.encode(secret.as_bytes()), '2'),
        ] {
            self.write_line(&line).await?;
            let reply = self.read_response().await?;
            if !reply.starts_with(expect) {
                return Err(Error::Auth(reply.trim_end().to_string()));
            }
        }
        Ok(())
    }

    async fn mail_from(&mut self, from: &str) -> Result<()> {
        self.command(&format!("MAIL FROM:<{from}>"), '2', "MAIL FROM")
            .await?;
        Ok(())
    }

    async fn rcpt_to(&mut self, envelope: &[String]) -> Result<()> {
        for recipient in envelope {
            self.write_line(&format!("RCPT TO:<{recipient}>")).await?;
            let reply = self.read_response().await?;
            if !reply.starts_with('2') {
                return Err(Error::Transport(format!(
                    "recipient {recipient} rejected: {}",
                    reply.trim_end()
                )));
            }
        }
        Ok(())
    }

    async fn data(&mut self, wire: &WireMessage) -> Result<()> {
        self.command("DATA", '3', "DATA").await?;

        let mut payload = dot_stuff(wire.as_bytes());
        if !payload.ends_with(b"\r\n") {
            payload.extend_from_slice(b"\r\n");
        }
        payload.extend_from_slice(b".\r\n");
        self.stream
            .write_all(&payload)
            .await
            .map_err(|e| Error::Transport(format!("write failed: {e}")))?;
        self.stream
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("flush failed: {e}")))?;

        let reply = self.read_response().await?;
        if !reply.starts_with('2') {
            return Err(Error::Transport(format!(
                "message rejected: {}",
                reply.trim_end()
            )));
        }
        Ok(())
    }

    /// Best effort; a failed QUIT never fails a delivered send.
    async fn quit(&mut self) {
        let _ = self.write_line("QUIT").await;
        let _ = self.read_response().await;
    }
}

/// A reply is complete once the final line carries a three-digit code with
/// no continuation dash (RFC 5321 multiline replies use `250-`).
fn response_complete(response: &str) -> bool {
    if !response.ends_with('\n') {
        return false;
    }
    let last = response
        .trim_end_matches(['\r', '\n'])
        .lines()
        .last()
        .unwrap_or("");
    let bytes = last.as_bytes();
    bytes.len() >= 3
        && bytes[..3].iter().all(|b| b.is_ascii_digit())
        && bytes.get(3) != Some(&b'-')
}

/// RFC 5321 §4.5.2: double any leading dot so the body cannot terminate
/// the DATA phase early.
fn dot_stuff(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 128 + 2);
    for (i, &byte) in data.iter().enumerate() {
        if byte == b'.' && (i == 0 || (i >= 2 && data[i - 2] == b'\r' && data[i - 1] == b'\n')) {
            out.push(b'.');
        }
        out.push(byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dot_stuffing_doubles_line_leading_dots() {
        assert_eq!(dot_stuff(b"abc\r\n.def\r\n"), b"abc\r\n..def\r\n".to_vec());
        assert_eq!(dot_stuff(b".start"), b"..start".to_vec());
        assert_eq!(dot_stuff(b"no dots here"), b"no dots here".to_vec());
        assert_eq!(dot_stuff(b"mid.dle"), b"mid.dle".to_vec());
    }

    #[test]
    fn multiline_replies_are_not_complete_until_the_final_line() {
        assert!(!response_complete("250-first\r\n"));
        assert!(!response_complete("250-first\r\n250-AUTH PLAIN\r\n"));
        assert!(response_complete("250-first\r\n250 done\r\n"));
        assert!(response_complete("220 ready\r\n"));
        assert!(!response_complete("220 ready"));
    }
}
