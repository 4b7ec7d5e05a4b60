//! MIME composition: turns a validated [`Message`] into the wire bytes
//! handed to the transport. Pure aside from reading attachment files; it
//! never touches the network.

use crate::archive::attachment_io;
use crate::encoding::{encode_header, encode_quoted_printable, write_base64, QP_LINE_LIMIT};
use crate::errors::{Error, Result};
use crate::message::{Message, WireMessage};
use chrono::Utc;
use std::fs::File;

/// Builds the wire message. Kept separate from [`crate::transport::Transport`]
/// so composition stays testable without a server.
pub trait Composer {
    fn compose(&self, message: &Message) -> Result<WireMessage>;
}

/// RFC 2822 / multipart-MIME composer. Always emits `multipart/mixed`,
/// even with zero attachments, so the header path never depends on the
/// body encoding path.
#[derive(Debug, Default)]
pub struct MimeComposer;

impl Composer for MimeComposer {
    fn compose(&self, message: &Message) -> Result<WireMessage> {
        let boundary = generate_boundary("mixed_")?;

        let mut headers = String::new();
        headers.push_str("MIME-Version: 1.0\r\n");
        headers.push_str(&format!("From: {}\r\n", message.from));
        headers.push_str(&format!("To: {}\r\n", message.to.join(", ")));
        if !message.cc.is_empty() {
            headers.push_str(&format!("Cc: {}\r\n", message.cc.join(", ")));
        }
        // Bcc recipients go only into the envelope; never into headers.
        headers.push_str(&format!("Subject: {}\r\n", encode_header(&message.subject)));
        headers.push_str(&format!("Date: {}\r\n", Utc::now().to_rfc2822()));
        headers.push_str(&format!("Message-ID: {}\r\n", message_id(&message.from)));
        headers.push_str(&format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n",
            boundary
        ));

        let mut out = headers.into_bytes();

        let body_type = if message.is_html {
            "text/html"
        } else {
            "text/plain"
        };
        out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        out.extend_from_slice(
            format!("Content-Type: {}; charset=UTF-8\r\n", body_type).as_bytes(),
        );
        out.extend_from_slice(b"Content-Transfer-Encoding: quoted-printable\r\n\r\n");
        out.extend_from_slice(encode_quoted_printable(&message.body, QP_LINE_LIMIT).as_bytes());
        out.extend_from_slice(b"\r\n");

        for attachment in &message.attachments {
            out.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
            out.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
            out.extend_from_slice(
                format!(
                    "Content-Disposition: attachment; filename=\"{}\"\r\n",
                    attachment.wire_name
                )
                .as_bytes(),
            );
            out.extend_from_slice(b"Content-Transfer-Encoding: base64\r\n\r\n");

            let file =
                File::open(&attachment.path).map_err(|e| attachment_io(&attachment.path, e))?;
            write_base64(file, &mut out).map_err(|e| attachment_io(&attachment.path, e))?;
        }

        out.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
        Ok(WireMessage::new(out))
    }
}

/// Random hex boundary. Hex output contains no RFC 2045 tspecials, so it
/// cannot collide with header syntax; 192 random bits make a collision
/// with part content implausible. An entropy failure fails the compose
/// rather than falling back to a fixed boundary.
fn generate_boundary(prefix: &str) -> Result<String> {
    let mut bytes = [0u8; 24];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| Error::Compose(format!("boundary entropy unavailable: {e}")))?;
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(format!("{prefix}{hex}"))
}

fn message_id(from: &str) -> String {
    let domain = from.split('@').nth(1).unwrap_or("local");
    format!("<{}@{}>", uuid::Uuid::new_v4(), domain)
}
