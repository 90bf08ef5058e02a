//! SQL schema for the Felix SQLite store.
//!
//! Executed on every open; idempotent thanks to `CREATE TABLE IF NOT
//! EXISTS`. Format-generation metadata is written separately, and only for
//! freshly created databases.

/// Full schema DDL.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS meta (
    k  TEXT PRIMARY KEY,
    v  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS fields (
    field_id    INTEGER PRIMARY KEY,
    name_canon  TEXT NOT NULL,
    hash        BLOB NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS f_values (
    value_id    INTEGER PRIMARY KEY,
    type_tag    INTEGER NOT NULL,
    canon_text  TEXT,               -- set for every type except bytes
    canon_blob  BLOB,               -- set for bytes only
    hash        BLOB NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS records (
    record_id   INTEGER PRIMARY KEY,
    created_ts  INTEGER NOT NULL
);

-- Facts are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS facts (
    record_id  INTEGER NOT NULL REFERENCES records(record_id),
    field_id   INTEGER NOT NULL REFERENCES fields(field_id),
    value_id   INTEGER NOT NULL REFERENCES f_values(value_id),
    ts         INTEGER NOT NULL,
    PRIMARY KEY (record_id, field_id, ts)
);

-- Latest fact per (record, field); replaced wholesale by rebuild.
CREATE TABLE IF NOT EXISTS current_facts (
    record_id  INTEGER NOT NULL REFERENCES records(record_id),
    field_id   INTEGER NOT NULL REFERENCES fields(field_id),
    value_id   INTEGER NOT NULL REFERENCES f_values(value_id),
    ts         INTEGER NOT NULL,
    PRIMARY KEY (record_id, field_id)
);

-- The facts primary key already serves (record_id, field_id, ts) scans.
CREATE INDEX IF NOT EXISTS facts_by_field_value   ON facts(field_id, value_id);
CREATE INDEX IF NOT EXISTS facts_by_ts            ON facts(ts);
CREATE INDEX IF NOT EXISTS current_by_field_value ON current_facts(field_id, value_id);
";
