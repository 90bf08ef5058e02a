//! Error type for `felix-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] felix_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  /// A fact for this (record, field, timestamp) already exists. Two facts
  /// for the same record and field cannot share a timestamp.
  #[error(
    "duplicate fact: record {record_id} field {field_id} already has a \
     fact at ts {ts_ms}"
  )]
  DuplicateFact {
    record_id: u64,
    field_id:  i64,
    ts_ms:     i64,
  },

  #[error("too many fields in one ingest: {0} (limit 256)")]
  TooManyFields(usize),

  #[error("unknown field id: {0}")]
  UnknownFieldId(i64),

  #[error("unknown value id: {0}")]
  UnknownValueId(i64),

  /// An interning insert-or-ignore was not followed by a successful
  /// lookup; only possible if the database is being modified underneath us
  /// or its integrity is gone.
  #[error("intern lookup failed after insert")]
  InternLookup,

  /// A stored value row cannot be decoded under the database's generation.
  #[error("stored value {value_id} failed to decode: {detail}")]
  CorruptValue {
    value_id: i64,
    detail:   String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
