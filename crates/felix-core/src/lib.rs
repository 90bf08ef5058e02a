//! Core types for the Felix temporal fact engine.
//!
//! This crate is deliberately free of database and I/O dependencies.
//! It holds the canonicalizer, the identity hasher, the format generations,
//! the resource limits, and the storage abstraction implemented by backend
//! crates (e.g. `felix-store-sqlite`).

pub mod canon;
pub mod error;
pub mod hash;
pub mod limits;
pub mod store;
pub mod value;

pub use error::{Error, Result};
pub use hash::{field_hash, value_hash, FormatGeneration, HashFormat, TagMap};
pub use store::{
  FactRow, FieldRow, IngestItem, IngestMode, TemporalStore, ValueRow,
};
pub use value::{CanonValue, LogicalType};
