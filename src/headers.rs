//! Typed header model for the loosely-shaped `header.json` configuration.
//!
//! Header values are resolved into a closed variant type once, at set
//! time. Address-type keys (`From`, `To`, `Cc`, `Bcc`) always hold an
//! address list after normalization; everything else stays a raw string
//! or string list.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::charset::Charset;
use crate::error::Result;
use crate::render::TemplateEngine;

/// A single mail address with an optional display name.
///
/// Both fields may contain template expressions; they are expanded
/// against the caller's variables on each send.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub name: Option<String>,
    pub address: String,
}

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            name: None,
            address: address.into(),
        }
    }

    pub fn with_name(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            address: address.into(),
        }
    }

    /// Renders both fields and produces the wire-ready forms.
    ///
    /// Any render failure aborts the whole operation; no partial address
    /// is emitted.
    pub(crate) fn render(
        &self,
        engine: &TemplateEngine,
        charset: &Charset,
        variables: Option<&Value>,
    ) -> Result<RenderedAddress> {
        let address = engine.render_field(&self.address, variables)?;
        let display = match self.name.as_deref() {
            Some(name) if !name.is_empty() => {
                let name = engine.render_field(name, variables)?;
                let encoded = charset.encode_header(&name)?;
                format!("{} <{}>", quote_display_name(&encoded), address)
            }
            _ => address.clone(),
        };
        Ok(RenderedAddress { display, address })
    }
}

/// Wire-ready address forms: `display` goes on the header line, `address`
/// feeds the SMTP envelope.
#[derive(Debug, Clone)]
pub(crate) struct RenderedAddress {
    pub display: String,
    pub address: String,
}

/// Wraps a plain display name in a quoted-string when it contains
/// characters that are not valid in an unquoted phrase. Encoded words
/// are left untouched.
fn quote_display_name(name: &str) -> String {
    if name.starts_with("=?") && name.ends_with("?=") {
        return name.to_string();
    }
    if name
        .chars()
        .any(|c| matches!(c, '(' | ')' | '<' | '>' | '[' | ']' | ':' | ';' | '@' | '\\' | ',' | '.' | '"'))
    {
        let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{escaped}\"")
    } else {
        name.to_string()
    }
}

pub(crate) fn render_addresses(
    addresses: &[Address],
    engine: &TemplateEngine,
    charset: &Charset,
    variables: Option<&Value>,
) -> Result<Vec<RenderedAddress>> {
    addresses
        .iter()
        .map(|a| a.render(engine, charset, variables))
        .collect()
}

/// A resolved header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Scalar(String),
    List(Vec<String>),
    AddressList(Vec<Address>),
}

impl HeaderValue {
    /// First string value, for headers read as a single setting
    /// (`Charset`, `Encoding`, `Subject`).
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s.as_str()),
            Self::List(values) => values.first().map(String::as_str),
            Self::AddressList(_) => None,
        }
    }

    /// Converts a flat JSON header document value into a header value.
    /// Arrays of objects become address lists, arrays of strings become
    /// string lists, everything scalar becomes a scalar.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::Scalar(s.clone()),
            Value::Array(items) => {
                if items.iter().any(Value::is_object) {
                    Self::AddressList(items.iter().filter_map(json_address).collect())
                } else {
                    Self::List(
                        items
                            .iter()
                            .filter_map(|v| v.as_str().map(str::to_string))
                            .collect(),
                    )
                }
            }
            Value::Object(_) => {
                Self::AddressList(json_address(value).into_iter().collect())
            }
            other => Self::Scalar(other.to_string()),
        }
    }

    fn into_addresses(self) -> Vec<Address> {
        match self {
            Self::Scalar(s) => vec![Address::new(s)],
            Self::List(values) => values.into_iter().map(Address::new).collect(),
            Self::AddressList(addresses) => addresses,
        }
    }

    fn into_strings(self) -> Vec<String> {
        match self {
            Self::Scalar(s) => vec![s],
            Self::List(values) => values,
            Self::AddressList(addresses) => {
                addresses.into_iter().map(|a| a.address).collect()
            }
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

impl From<Address> for HeaderValue {
    fn from(address: Address) -> Self {
        Self::AddressList(vec![address])
    }
}

impl From<Vec<Address>> for HeaderValue {
    fn from(addresses: Vec<Address>) -> Self {
        Self::AddressList(addresses)
    }
}

/// Canonical MIME header capitalization: each dash-separated segment gets
/// an uppercase first letter, the rest lowercased (`content-TYPE` becomes
/// `Content-Type`).
#[must_use]
pub fn canonical_key(key: &str) -> String {
    key.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str().to_lowercase().as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

fn is_address_key(key: &str) -> bool {
    matches!(key, "From" | "To" | "Cc" | "Bcc")
}

fn json_address(value: &Value) -> Option<Address> {
    match value {
        Value::String(s) => Some(Address::new(s.clone())),
        Value::Object(map) => {
            let mut name = None;
            let mut address = None;
            for (k, v) in map {
                match k.to_lowercase().as_str() {
                    "name" => name = v.as_str().map(str::to_string),
                    "address" => address = v.as_str().map(str::to_string),
                    _ => {}
                }
            }
            Some(Address {
                name,
                address: address.unwrap_or_default(),
            })
        }
        _ => None,
    }
}

/// Ordered header map keyed by canonical header name.
///
/// Single-writer: a map instance is mutated in place by [`set`] and is
/// not safe for concurrent mutation. Clone per send when sharing.
///
/// [`set`]: HeaderMap::set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: BTreeMap<String, HeaderValue>,
}

impl HeaderMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a header map from a flat JSON header document.
    pub fn from_json(document: &serde_json::Map<String, Value>) -> Self {
        let mut map = Self::new();
        for (key, value) in document {
            map.set(key, HeaderValue::from_json(value));
        }
        map
    }

    /// Sets a header, merging into existing values.
    ///
    /// For address keys every incoming value is normalized into an
    /// address list. `From` always replaces (single effective sender);
    /// `To`/`Cc`/`Bcc` append when the existing value is already an
    /// address list, else replace. Other keys append when the existing
    /// value is a list, else replace.
    pub fn set(&mut self, key: &str, value: impl Into<HeaderValue>) -> &mut Self {
        let key = canonical_key(key);
        let value = value.into();
        if is_address_key(&key) {
            let incoming = value.into_addresses();
            if key == "From" {
                self.entries.insert(key, HeaderValue::AddressList(incoming));
            } else {
                match self.entries.get_mut(&key) {
                    Some(HeaderValue::AddressList(existing)) => existing.extend(incoming),
                    _ => {
                        self.entries.insert(key, HeaderValue::AddressList(incoming));
                    }
                }
            }
        } else {
            match self.entries.get_mut(&key) {
                Some(HeaderValue::List(existing)) => existing.extend(value.into_strings()),
                _ => {
                    self.entries.insert(key, value);
                }
            }
        }
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.get(&canonical_key(key))
    }

    /// First string value of a header, if any.
    #[must_use]
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::first)
    }

    /// The `Charset` pseudo-header value, if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.first("Charset")
    }

    /// The `Encoding` pseudo-header value, if present.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.first("Encoding")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
