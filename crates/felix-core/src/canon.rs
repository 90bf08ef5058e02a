//! Canonicalization — deterministic reduction of typed input to the single
//! byte form per semantic value.
//!
//! Two entry points must agree: the typed-JSON shape used by NDJSON
//! ingestion ([`CanonValue::from_json`]) and the textual `type:value` form
//! used on the command line ([`CanonValue::from_text`]). Both produce the
//! same [`CanonValue`] for the same semantic input, so the identity hash and
//! the interned id cannot depend on which door a value came through.

use unicode_normalization::UnicodeNormalization as _;

use crate::{
  limits,
  value::{CanonValue, LogicalType},
  Error, Result,
};

// ─── Field names ─────────────────────────────────────────────────────────────

/// Canonical field name: outer ASCII whitespace trimmed, NFC-normalized,
/// case preserved. At most 256 bytes.
pub fn canon_field_name(name: &str) -> Result<String> {
  let canon: String = trim_outer(name).nfc().collect();
  if canon.len() > limits::MAX_FIELD_NAME_BYTES {
    return Err(Error::FieldNameTooLong(canon.len()));
  }
  Ok(canon)
}

// ─── Typed input ─────────────────────────────────────────────────────────────

impl CanonValue {
  /// Canonicalize a typed-JSON value (the `{"t": ..., "v": ...}` shape of
  /// NDJSON ingestion). For `null` the value is ignored entirely.
  pub fn from_json(ty: LogicalType, v: &serde_json::Value) -> Result<Self> {
    match ty {
      LogicalType::Null => Ok(Self::Null),
      LogicalType::Bool => v
        .as_bool()
        .map(Self::Bool)
        .ok_or(Error::WrongShape { ty, expected: "a JSON boolean" }),
      LogicalType::Int => v.as_i64().map(Self::Int).ok_or(Error::WrongShape {
        ty,
        expected: "a JSON integer in signed 64-bit range",
      }),
      LogicalType::Float => {
        let d = v
          .as_f64()
          .ok_or(Error::WrongShape { ty, expected: "a JSON number" })?;
        Ok(Self::Float(canon_f64(d)?))
      }
      LogicalType::Text => canon_text(v.as_str().ok_or(Error::WrongShape {
        ty,
        expected: "a JSON string",
      })?),
      LogicalType::Uuid => canon_uuid(v.as_str().ok_or(Error::WrongShape {
        ty,
        expected: "a JSON string",
      })?),
      LogicalType::Bytes => {
        decode_bytes(v.as_str().ok_or(Error::WrongShape {
          ty,
          expected: "a base64 JSON string",
        })?)
      }
      LogicalType::Json => Err(Error::ReservedType),
    }
  }

  /// Canonicalize the raw value string of the textual `type:value` form.
  /// The whole string after the first `:` is the value, so `text` may
  /// contain further colons.
  pub fn from_text(ty: LogicalType, raw: &str) -> Result<Self> {
    match ty {
      LogicalType::Null => Ok(Self::Null),
      LogicalType::Bool => match trim_outer(raw) {
        "true" => Ok(Self::Bool(true)),
        "false" => Ok(Self::Bool(false)),
        _ => Err(Error::InvalidBool),
      },
      LogicalType::Int => trim_outer(raw)
        .parse::<i64>()
        .map(Self::Int)
        .map_err(|_| Error::InvalidInt),
      LogicalType::Float => canon_float_text(trim_outer(raw)),
      LogicalType::Text => canon_text(raw),
      LogicalType::Uuid => canon_uuid(raw),
      LogicalType::Bytes => decode_bytes(raw),
      LogicalType::Json => Err(Error::ReservedType),
    }
  }
}

// ─── Per-type helpers ────────────────────────────────────────────────────────

fn trim_outer(s: &str) -> &str {
  s.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

fn canon_text(raw: &str) -> Result<CanonValue> {
  let canon: String = trim_outer(raw).nfc().collect();
  if canon.len() > limits::MAX_TEXT_BYTES {
    return Err(Error::TextTooLarge(canon.len()));
  }
  Ok(CanonValue::Text(canon))
}

fn canon_uuid(raw: &str) -> Result<CanonValue> {
  let s = trim_outer(raw);
  if s.len() != 36 {
    return Err(Error::InvalidUuid("must be 36 characters"));
  }
  for (i, c) in s.bytes().enumerate() {
    let hyphen_slot = matches!(i, 8 | 13 | 18 | 23);
    if hyphen_slot != (c == b'-') {
      return Err(Error::InvalidUuid(
        "hyphens must sit at positions 8, 13, 18 and 23",
      ));
    }
  }
  let parsed = uuid::Uuid::try_parse(s)
    .map_err(|_| Error::InvalidUuid("expected hex digits"))?;
  Ok(CanonValue::Uuid(parsed.as_hyphenated().to_string()))
}

fn decode_bytes(raw: &str) -> Result<CanonValue> {
  use base64::{engine::general_purpose::STANDARD, Engine as _};

  // Whitespace inside the base64 text is ignored.
  let compact: String = raw
    .chars()
    .filter(|c| !matches!(c, ' ' | '\t' | '\r' | '\n'))
    .collect();
  let decoded = STANDARD.decode(compact.as_bytes())?;
  if decoded.len() > limits::MAX_BYTES_LEN {
    return Err(Error::BytesTooLarge(decoded.len()));
  }
  Ok(CanonValue::Bytes(decoded))
}

fn canon_float_text(s: &str) -> Result<CanonValue> {
  match s {
    "inf" | "+inf" => return Ok(CanonValue::Float("inf".to_owned())),
    "-inf" => return Ok(CanonValue::Float("-inf".to_owned())),
    _ => {}
  }
  let d: f64 = s.parse().map_err(|_| Error::InvalidFloat)?;
  if d.is_nan() {
    return Err(Error::NanFloat);
  }
  // Only the explicit forms above may produce infinity; anything else that
  // lands there overflowed the binary64 range (e.g. "1e999").
  if d.is_infinite() {
    return Err(Error::InvalidFloat);
  }
  Ok(CanonValue::Float(canon_f64(d)?))
}

// ─── Float canonical text ────────────────────────────────────────────────────

/// Canonical text for a binary64: the shortest decimal that parses back to
/// the same bits. Both zeros collapse to `0`; infinities render as `inf` /
/// `-inf`; NaN is rejected. Fixed notation is used while the decimal
/// exponent stays in (-6, 17], scientific (`1.5e-7`, no `+`) outside it.
pub fn canon_f64(d: f64) -> Result<String> {
  if d.is_nan() {
    return Err(Error::NanFloat);
  }
  if d.is_infinite() {
    return Ok(if d < 0.0 { "-inf" } else { "inf" }.to_owned());
  }
  if d == 0.0 {
    return Ok("0".to_owned()); // collapses -0.0 as well
  }

  // `{:e}` gives the shortest mantissa that round-trips, e.g. "1.2345e3".
  let sci = format!("{d:e}");
  let (mantissa, exp) = match sci.split_once('e') {
    Some(parts) => parts,
    None => return Err(Error::InvalidFloat), // unreachable for finite input
  };
  let exp: i32 = exp.parse().map_err(|_| Error::InvalidFloat)?;

  let neg = mantissa.starts_with('-');
  let digits: String =
    mantissa.chars().filter(char::is_ascii_digit).collect();

  // Position of the decimal point relative to the first digit.
  let point = exp + 1;

  let body = if point > -6 && point <= 17 {
    render_fixed(&digits, point)
  } else {
    render_scientific(&digits, exp)
  };

  Ok(if neg { format!("-{body}") } else { body })
}

fn render_fixed(digits: &str, point: i32) -> String {
  let len = digits.len() as i32;
  if point <= 0 {
    // 0.000ddd
    let zeros = "0".repeat((-point) as usize);
    format!("0.{zeros}{digits}")
  } else if point >= len {
    // ddd000 — integral, no decimal point survives canonicalization
    let zeros = "0".repeat((point - len) as usize);
    format!("{digits}{zeros}")
  } else {
    let (int_part, frac_part) = digits.split_at(point as usize);
    format!("{int_part}.{frac_part}")
  }
}

fn render_scientific(digits: &str, exp: i32) -> String {
  let (first, rest) = digits.split_at(1);
  if rest.is_empty() {
    format!("{first}e{exp}")
  } else {
    format!("{first}.{rest}e{exp}")
  }
}
