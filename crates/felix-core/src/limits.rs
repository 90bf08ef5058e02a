//! Resource limits, enforced before any write reaches the store.

/// Maximum canonical size of a `text` value.
pub const MAX_TEXT_BYTES: usize = 1024 * 1024;

/// Maximum canonical (decoded) size of a `bytes` value.
pub const MAX_BYTES_LEN: usize = 4 * 1024 * 1024;

/// Maximum canonical size of a field name.
pub const MAX_FIELD_NAME_BYTES: usize = 256;

/// Maximum number of (field, value) pairs in one ingest batch.
pub const MAX_FIELDS_PER_INGEST: usize = 256;

/// Maximum length of one NDJSON input line.
pub const MAX_NDJSON_LINE_BYTES: usize = 2 * 1024 * 1024;
