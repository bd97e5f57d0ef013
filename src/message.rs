//! Message assembly: headers, bodies, and MIME framing.
//!
//! The assembler turns a header map plus rendered body bytes into raw
//! RFC 5322 message bytes and an SMTP envelope. Messages are built as
//! raw bytes because per-part charsets, forced part encodings, and
//! arbitrary configured headers do not fit a typed message builder;
//! transports deliver them through lettre's raw-send contract.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lettre::address::{Address as EnvelopeAddress, Envelope};
use serde_json::Value;
use uuid::Uuid;

use crate::charset::{Charset, TransferEncoding};
use crate::error::Result;
use crate::headers::{Address, HeaderMap, HeaderValue, render_addresses};
use crate::render::TemplateEngine;

/// An attachment: caller-owned content plus the file name declared to
/// the recipient. Read once at assembly time, never retained.
#[derive(Debug, Clone)]
pub struct AttachFile {
    pub content: Vec<u8>,
    pub name: String,
}

impl AttachFile {
    pub fn new(name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            content,
            name: name.into(),
        }
    }
}

/// Body selection for a single assembly.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BodyContent<'a> {
    Text(&'a [u8]),
    Html(&'a [u8]),
    Alternative { text: &'a [u8], html: &'a [u8] },
}

/// A send-ready message.
#[derive(Debug, Clone)]
pub(crate) struct AssembledMessage {
    pub envelope: Envelope,
    pub bytes: Vec<u8>,
}

struct Part {
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

/// Assembles headers, bodies, and an optional attachment into a
/// send-ready message.
///
/// Charset resolution order: explicit argument, then the `Charset`
/// header, then UTF-8. The transfer encoding comes from the `Encoding`
/// header, defaulting to base64. Both pseudo-headers are consumed here
/// and never emitted on the wire.
pub(crate) fn assemble(
    engine: &TemplateEngine,
    charset: Option<&str>,
    headers: &HeaderMap,
    body: BodyContent<'_>,
    variables: Option<&Value>,
    file: Option<&AttachFile>,
    to: &[Address],
) -> Result<AssembledMessage> {
    let charset = match charset {
        Some(label) => Charset::parse(label),
        None => headers.charset().map(Charset::parse).unwrap_or_default(),
    };
    let encoding = headers
        .encoding()
        .map(TransferEncoding::parse)
        .unwrap_or_default();

    let mut wire: Vec<(String, String)> = Vec::new();
    let mut sender: Option<EnvelopeAddress> = None;
    let mut recipients: Vec<EnvelopeAddress> = Vec::new();

    for (key, value) in headers.iter() {
        match value {
            HeaderValue::AddressList(addresses) => {
                let rendered = render_addresses(addresses, engine, &charset, variables)?;
                tracing::debug!(header = key, count = rendered.len(), "resolved addresses");
                match key {
                    "From" => {
                        if let Some(first) = rendered.first() {
                            sender = Some(first.address.parse()?);
                        }
                        for r in &rendered {
                            wire.push(("From".to_string(), r.display.clone()));
                        }
                    }
                    // Bcc recipients go into the envelope only.
                    "Bcc" => {
                        for r in &rendered {
                            recipients.push(r.address.parse()?);
                        }
                    }
                    _ => {
                        for r in &rendered {
                            if matches!(key, "To" | "Cc") {
                                recipients.push(r.address.parse()?);
                            }
                            wire.push((key.to_string(), r.display.clone()));
                        }
                    }
                }
            }
            _ => match key {
                "Subject" | "Title" => {
                    let raw = value.first().unwrap_or_default();
                    let subject = engine.render_field(raw, variables)?;
                    wire.push(("Subject".to_string(), charset.encode_header(&subject)?));
                }
                "Encoding" | "Charset" => {}
                _ => match value {
                    HeaderValue::List(values) => {
                        for v in values {
                            wire.push((key.to_string(), v.clone()));
                        }
                    }
                    HeaderValue::Scalar(v) if !v.is_empty() => {
                        wire.push((key.to_string(), v.clone()));
                    }
                    _ => {}
                },
            },
        }
    }

    // Call-time recipients are additive on top of any To header from the
    // map itself.
    for address in to {
        let rendered = address.render(engine, &charset, variables)?;
        recipients.push(rendered.address.parse()?);
        wire.push(("To".to_string(), rendered.display));
    }

    let envelope = Envelope::new(sender.clone(), recipients)?;

    let mut content = match body {
        BodyContent::Text(bytes) => body_part("text/plain", bytes, &charset, encoding),
        BodyContent::Html(bytes) => body_part("text/html", bytes, &charset, encoding),
        BodyContent::Alternative { text, html } => multipart(
            "alternative",
            vec![
                body_part("text/plain", text, &charset, encoding),
                // HTML alternatives always travel quoted-printable, whatever
                // the configured default.
                body_part("text/html", html, &charset, TransferEncoding::QuotedPrintable),
            ],
        ),
    };
    if let Some(file) = file {
        content = multipart("mixed", vec![content, attachment_part(file)]);
    }

    let domain = sender
        .as_ref()
        .map_or_else(|| "localhost".to_string(), |s| s.domain().to_string());
    let mut out: Vec<u8> = Vec::new();
    push_header(&mut out, "MIME-Version", "1.0");
    push_header(&mut out, "Date", &chrono::Utc::now().to_rfc2822());
    push_header(
        &mut out,
        "Message-ID",
        &format!("<{}@{}>", Uuid::new_v4().simple(), domain),
    );
    for (name, value) in &wire {
        push_header(&mut out, name, value);
    }
    for (name, value) in &content.headers {
        push_header(&mut out, name, value);
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(&content.body);

    Ok(AssembledMessage {
        envelope,
        bytes: out,
    })
}

fn push_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn body_part(
    content_type: &str,
    body: &[u8],
    charset: &Charset,
    encoding: TransferEncoding,
) -> Part {
    Part {
        headers: vec![
            (
                "Content-Type".to_string(),
                format!("{content_type}; charset={}", charset.name()),
            ),
            ("Content-Transfer-Encoding".to_string(), encoding.to_string()),
        ],
        body: encode_transfer(body, encoding),
    }
}

fn attachment_part(file: &AttachFile) -> Part {
    Part {
        headers: vec![
            (
                "Content-Type".to_string(),
                format!("application/octet-stream; name=\"{}\"", file.name),
            ),
            ("Content-Transfer-Encoding".to_string(), "base64".to_string()),
            (
                "Content-Disposition".to_string(),
                format!("attachment; filename=\"{}\"", file.name),
            ),
        ],
        body: encode_base64_wrapped(&file.content).into_bytes(),
    }
}

fn multipart(subtype: &str, parts: Vec<Part>) -> Part {
    // One fresh boundary per message; a shared literal token would
    // collide across sends and with body content.
    let boundary = Uuid::new_v4().simple().to_string();
    let mut body: Vec<u8> = Vec::new();
    for part in &parts {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        for (name, value) in &part.headers {
            push_header(&mut body, name, value);
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(&part.body);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Part {
        headers: vec![(
            "Content-Type".to_string(),
            format!("multipart/{subtype}; boundary=\"{boundary}\""),
        )],
        body,
    }
}

fn encode_transfer(body: &[u8], encoding: TransferEncoding) -> Vec<u8> {
    match encoding {
        TransferEncoding::Base64 => encode_base64_wrapped(body).into_bytes(),
        TransferEncoding::QuotedPrintable => encode_quoted_printable(body).into_bytes(),
        TransferEncoding::EightBit => body.to_vec(),
    }
}

/// Base64 body encoding, wrapped at the 76-column MIME line limit.
fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    encoded
        .as_bytes()
        .chunks(76)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\r\n")
}

const MAX_LINE_LENGTH: usize = 76;

/// Quoted-printable body encoding (RFC 2045). Line breaks in the input
/// pass through as hard breaks; everything outside printable ASCII is
/// hex-escaped.
fn encode_quoted_printable(data: &[u8]) -> String {
    use std::fmt::Write as _;

    let mut result = String::new();
    let mut line_length = 0;

    for &byte in data {
        if byte == b'\r' {
            continue;
        }
        if byte == b'\n' {
            result.push_str("\r\n");
            line_length = 0;
            continue;
        }
        if line_length >= MAX_LINE_LENGTH - 3 {
            result.push_str("=\r\n");
            line_length = 0;
        }
        match byte {
            b'!'..=b'<' | b'>'..=b'~' | b' ' | b'\t' => {
                result.push(byte as char);
                line_length += 1;
            }
            _ => {
                result.push('=');
                let _ = write!(result, "{byte:02X}");
                line_length += 3;
            }
        }
    }

    result
}
