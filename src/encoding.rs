//! Wire encodings used by the composer: quoted-printable bodies, RFC 2047
//! headers, and line-wrapped base64 for binary attachments.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use std::io::{self, Read};

/// Soft line limit for quoted-printable output (RFC 2045).
pub const QP_LINE_LIMIT: usize = 76;

/// Raw bytes per base64 output line; 54 bytes encode to 72 characters.
pub const BASE64_LINE_BYTES: usize = 54;

/// Quoted-printable encoding (RFC 2045) with soft line breaks at
/// `line_limit` columns. Bare LF and CRLF both come out as hard CRLF.
pub fn encode_quoted_printable(text: &str, line_limit: usize) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(bytes.len() + bytes.len() / 8);
    let mut column = 0;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'\n' {
            out.push_str("\r\n");
            column = 0;
            i += 1;
            continue;
        }
        if byte == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            out.push_str("\r\n");
            column = 0;
            i += 2;
            continue;
        }

        let at_line_end =
            i + 1 >= bytes.len() || bytes[i + 1] == b'\n' || bytes[i + 1] == b'\r';
        let is_space = byte == b' ' || byte == b'\t';
        let needs_escape = byte == b'='
            || byte > 126
            || (byte < 32 && !is_space)
            || (is_space && at_line_end);

        let encoded = if needs_escape {
            format!("={:02X}", byte)
        } else {
            char::from(byte).to_string()
        };

        if column + encoded.len() > line_limit.saturating_sub(3) {
            out.push_str("=\r\n");
            column = 0;
        }
        out.push_str(&encoded);
        column += encoded.len();
        i += 1;
    }

    out
}

/// RFC 2047 Q-encoding for header values. ASCII-only input passes through.
pub fn encode_header(text: &str) -> String {
    if text.is_ascii() {
        return text.to_string();
    }
    let mut encoded = String::with_capacity(text.len() * 3);
    for byte in text.bytes() {
        if byte == b' ' {
            encoded.push('_');
        } else if (33..=126).contains(&byte) && byte != b'?' && byte != b'=' && byte != b'_' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("={:02X}", byte));
        }
    }
    format!("=?UTF-8?Q?{}?=", encoded)
}

/// Streams `reader` into `out` as base64, wrapped to 72-character lines
/// each terminated with CRLF. Only one read buffer is held at a time, so
/// large attachments never get fully buffered ahead of encoding.
pub fn write_base64<R: Read>(mut reader: R, out: &mut Vec<u8>) -> io::Result<()> {
    let mut buf = [0u8; BASE64_LINE_BYTES * 128];
    let mut filled = 0;

    loop {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
        let whole = filled - filled % BASE64_LINE_BYTES;
        if whole > 0 {
            for chunk in buf[..whole].chunks(BASE64_LINE_BYTES) {
                out.extend_from_slice(B64.encode(chunk).as_bytes());
                out.extend_from_slice(b"\r\n");
            }
            buf.copy_within(whole..filled, 0);
            filled -= whole;
        }
    }
    if filled > 0 {
        out.extend_from_slice(B64.encode(&buf[..filled]).as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    Ok(())
}
