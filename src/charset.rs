//! Charset resolution and transcoding for message headers and bodies.
//!
//! Rendered text is UTF-8 internally and transcoded into the resolved
//! charset right before it is placed into the message. Unrecognized
//! charset names are an explicit pass-through variant, not an error.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::{EUC_JP, ISO_2022_JP, SHIFT_JIS};

use crate::error::{MailerError, Result};

/// Default charset applied when neither the caller nor the headers name one.
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// Named character encoding for rendered text.
///
/// `Other` carries any unrecognized label verbatim; transcoding it is a
/// no-op and the label is emitted unchanged on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    ShiftJis,
    EucJp,
    Iso2022Jp,
    Other(String),
}

impl Charset {
    /// Parses a charset label. Matching is case-insensitive and accepts
    /// underscore/hyphen variants.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.to_uppercase().as_str() {
            "UTF-8" | "UTF8" => Self::Utf8,
            "SHIFT_JIS" | "SHIFT-JIS" | "SHIFTJIS" | "SJIS" => Self::ShiftJis,
            "EUC-JP" | "EUC_JP" | "EUCJP" => Self::EucJp,
            "ISO-2022-JP" | "ISO_2022_JP" | "ISO2022JP" => Self::Iso2022Jp,
            _ => Self::Other(label.to_string()),
        }
    }

    /// Canonical wire name for this charset.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Utf8 => DEFAULT_CHARSET,
            Self::ShiftJis => "Shift_JIS",
            Self::EucJp => "EUC-JP",
            Self::Iso2022Jp => "ISO-2022-JP",
            Self::Other(label) => label,
        }
    }

    /// Transcodes UTF-8 text into this charset.
    ///
    /// `Utf8` and `Other` return the input bytes unchanged. Characters
    /// that cannot be mapped into the target charset are an error.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let encoding = match self {
            Self::Utf8 | Self::Other(_) => return Ok(text.as_bytes().to_vec()),
            Self::ShiftJis => SHIFT_JIS,
            Self::EucJp => EUC_JP,
            Self::Iso2022Jp => ISO_2022_JP,
        };
        let (bytes, _, had_errors) = encoding.encode(text);
        if had_errors {
            return Err(MailerError::Transcode {
                charset: self.name().to_string(),
            });
        }
        Ok(bytes.into_owned())
    }

    /// Transcodes text for use in a header value, wrapping it in an RFC 2047
    /// encoded word when the result is not plain ASCII.
    pub fn encode_header(&self, text: &str) -> Result<String> {
        let bytes = self.encode(text)?;
        if bytes.is_ascii() {
            // Transcoding an ASCII-only value never changes it.
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        } else {
            Ok(format!("=?{}?B?{}?=", self.name(), STANDARD.encode(&bytes)))
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// MIME content-transfer-encoding applied to body bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    QuotedPrintable,
    #[default]
    Base64,
    EightBit,
}

impl TransferEncoding {
    /// Parses a transfer encoding name; anything unrecognized falls back
    /// to base64, the message-level default.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "quoted-printable" => Self::QuotedPrintable,
            "8bit" => Self::EightBit,
            _ => Self::Base64,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Base64 => write!(f, "base64"),
            Self::EightBit => write!(f, "8bit"),
        }
    }
}
