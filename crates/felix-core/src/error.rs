//! Error types for `felix-core`.

use thiserror::Error;

use crate::value::LogicalType;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown type: {0:?}")]
  UnknownType(String),

  #[error("type json is reserved and not accepted as input")]
  ReservedType,

  #[error("unknown ingest mode: {0:?} (expected \"event\" or \"observe\")")]
  UnknownMode(String),

  /// The typed-JSON input did not have the JSON shape its declared type
  /// requires (e.g. a string where a boolean was declared).
  #[error("{ty} value must be {expected}")]
  WrongShape {
    ty:       LogicalType,
    expected: &'static str,
  },

  #[error("bool must be exactly \"true\" or \"false\"")]
  InvalidBool,

  #[error("invalid int (expected a signed 64-bit decimal)")]
  InvalidInt,

  #[error("invalid float")]
  InvalidFloat,

  #[error("NaN is not allowed for float")]
  NanFloat,

  #[error("invalid uuid: {0}")]
  InvalidUuid(&'static str),

  #[error("invalid base64 for bytes: {0}")]
  InvalidBase64(#[from] base64::DecodeError),

  #[error("text value of {0} bytes exceeds the 1 MiB limit")]
  TextTooLarge(usize),

  #[error("bytes value of {0} bytes exceeds the 4 MiB limit")]
  BytesTooLarge(usize),

  #[error("field name of {0} bytes exceeds the 256 byte limit")]
  FieldNameTooLong(usize),

  #[error("record id {0} exceeds the signed 64-bit storage domain")]
  RecordIdOutOfRange(u64),

  #[error("type {0} is not representable in the legacy tag map")]
  LegacyUnsupportedType(LogicalType),

  #[error("unknown type tag byte {0:#04x}")]
  UnknownTypeTag(u8),

  /// Database metadata declares a generation this implementation does not
  /// know. Refusing to guess keeps hashes stable.
  #[error("unknown format generation: {key}={value:?}")]
  UnknownGeneration {
    key:   &'static str,
    value: String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
