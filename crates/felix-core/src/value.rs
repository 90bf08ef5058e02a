//! Logical types and canonical values — the fundamental currency of Felix.
//!
//! A canonical value is the unique representative of a semantic value: one
//! logical type plus exactly one byte form. All identity in the engine
//! (hashing, interning, equality) is defined over this form, so two inputs
//! that canonicalize identically are the same value everywhere downstream.

use std::{borrow::Cow, fmt};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── LogicalType ─────────────────────────────────────────────────────────────

/// The closed set of logical types, in v0.3 tag-space order.
///
/// `Json` is reserved: it occupies a tag byte but rejects as input.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
  Null,
  Bool,
  Int,
  Float,
  Text,
  Bytes,
  Uuid,
  Json,
}

impl LogicalType {
  /// The lowercase wire name used in NDJSON `t` fields and JSON output.
  pub fn name(self) -> &'static str {
    match self {
      Self::Null => "null",
      Self::Bool => "bool",
      Self::Int => "int",
      Self::Float => "float",
      Self::Text => "text",
      Self::Bytes => "bytes",
      Self::Uuid => "uuid",
      Self::Json => "json",
    }
  }

  /// Look up a type by wire name. Accepts all eight names, including the
  /// reserved `json`.
  pub fn from_name(s: &str) -> Result<Self> {
    match s {
      "null" => Ok(Self::Null),
      "bool" => Ok(Self::Bool),
      "int" => Ok(Self::Int),
      "float" => Ok(Self::Float),
      "text" => Ok(Self::Text),
      "bytes" => Ok(Self::Bytes),
      "uuid" => Ok(Self::Uuid),
      "json" => Ok(Self::Json),
      other => Err(Error::UnknownType(other.to_owned())),
    }
  }

  /// Parse a user-supplied type name, rejecting the reserved `json` type.
  pub fn parse_input(s: &str) -> Result<Self> {
    match Self::from_name(s.trim()) {
      Ok(Self::Json) => Err(Error::ReservedType),
      other => other,
    }
  }
}

impl fmt::Display for LogicalType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

// ─── CanonValue ──────────────────────────────────────────────────────────────

/// A canonicalized value — one logical type, one byte form.
///
/// The payload of each variant is already canonical: constructing one
/// through [`CanonValue::from_json`] or [`CanonValue::from_text`] (see
/// [`crate::canon`]) guarantees a single representative per semantic value.
/// Equality and hashing therefore coincide with value identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonValue {
  Null,
  Bool(bool),
  Int(i64),
  /// Canonical shortest round-trip decimal text; never NaN.
  Float(String),
  /// Trimmed, NFC-normalized UTF-8.
  Text(String),
  /// Raw decoded octets.
  Bytes(Vec<u8>),
  /// Lowercase hyphenated form.
  Uuid(String),
}

impl CanonValue {
  pub fn logical_type(&self) -> LogicalType {
    match self {
      Self::Null => LogicalType::Null,
      Self::Bool(_) => LogicalType::Bool,
      Self::Int(_) => LogicalType::Int,
      Self::Float(_) => LogicalType::Float,
      Self::Text(_) => LogicalType::Text,
      Self::Bytes(_) => LogicalType::Bytes,
      Self::Uuid(_) => LogicalType::Uuid,
    }
  }

  /// The canonical text form; `None` for bytes, whose canonical form is
  /// the raw octet string.
  pub fn canon_text(&self) -> Option<Cow<'_, str>> {
    match self {
      Self::Null => Some(Cow::Borrowed("null")),
      Self::Bool(true) => Some(Cow::Borrowed("true")),
      Self::Bool(false) => Some(Cow::Borrowed("false")),
      Self::Int(i) => Some(Cow::Owned(i.to_string())),
      Self::Float(s) | Self::Text(s) | Self::Uuid(s) => {
        Some(Cow::Borrowed(s.as_str()))
      }
      Self::Bytes(_) => None,
    }
  }

  /// The canonical byte form fed to the identity hasher.
  pub fn canon_bytes(&self) -> Cow<'_, [u8]> {
    match self {
      Self::Bytes(b) => Cow::Borrowed(b.as_slice()),
      Self::Null => Cow::Borrowed(b"null".as_slice()),
      Self::Bool(true) => Cow::Borrowed(b"true".as_slice()),
      Self::Bool(false) => Cow::Borrowed(b"false".as_slice()),
      Self::Int(i) => Cow::Owned(i.to_string().into_bytes()),
      Self::Float(s) | Self::Text(s) | Self::Uuid(s) => {
        Cow::Borrowed(s.as_bytes())
      }
    }
  }

  /// The display form used in JSON output: canonical text, with bytes
  /// rendered as standard base64.
  pub fn canon_display(&self) -> String {
    match self {
      Self::Bytes(b) => STANDARD.encode(b),
      other => other
        .canon_text()
        .map(Cow::into_owned)
        .unwrap_or_default(),
    }
  }
}
