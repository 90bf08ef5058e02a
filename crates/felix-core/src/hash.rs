//! Identity hashing and format generations.
//!
//! Hashes are the only cross-process identity in Felix: interned integer
//! ids are local to one database instance, but the 32-byte digest of
//! (type tag, canonical bytes) is stable everywhere. The generation — the
//! (tag map, hash format) pair persisted in database metadata — is part of
//! the hash input and therefore must never change after creation.

use sha2::{Digest as _, Sha256};

use crate::{value::CanonValue, Error, LogicalType, Result};

/// Metadata value declaring the v0.3 tag map.
pub const TAG_MAP_V03: &str = "felix_v03";

/// Metadata value declaring the v0.3 hash format (with type separator).
pub const HASH_FORMAT_V03: &str = "felix_v03_sep";

/// Metadata value recording the spec revision a database was created under.
pub const SPEC_VERSION: &str = "0.3";

// ─── Tag maps ────────────────────────────────────────────────────────────────

/// Which byte stands for each logical type inside the hash input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMap {
  /// Mapping used by early databases: text=1, int=2, float=3, bool=4,
  /// null=5, json=6. No bytes, no uuid.
  LegacyV02,
  /// Normative v0.3 mapping, dense from null=0x00 to json=0x07.
  FelixV03,
}

impl TagMap {
  pub fn tag_byte(self, ty: LogicalType) -> Result<u8> {
    match self {
      Self::LegacyV02 => match ty {
        LogicalType::Text => Ok(1),
        LogicalType::Int => Ok(2),
        LogicalType::Float => Ok(3),
        LogicalType::Bool => Ok(4),
        LogicalType::Null => Ok(5),
        LogicalType::Json => Ok(6),
        LogicalType::Bytes | LogicalType::Uuid => {
          Err(Error::LegacyUnsupportedType(ty))
        }
      },
      Self::FelixV03 => Ok(match ty {
        LogicalType::Null => 0x00,
        LogicalType::Bool => 0x01,
        LogicalType::Int => 0x02,
        LogicalType::Float => 0x03,
        LogicalType::Text => 0x04,
        LogicalType::Bytes => 0x05,
        LogicalType::Uuid => 0x06,
        LogicalType::Json => 0x07,
      }),
    }
  }

  pub fn type_for_tag(self, tag: u8) -> Result<LogicalType> {
    match self {
      Self::LegacyV02 => match tag {
        1 => Ok(LogicalType::Text),
        2 => Ok(LogicalType::Int),
        3 => Ok(LogicalType::Float),
        4 => Ok(LogicalType::Bool),
        5 => Ok(LogicalType::Null),
        6 => Ok(LogicalType::Json),
        other => Err(Error::UnknownTypeTag(other)),
      },
      Self::FelixV03 => match tag {
        0x00 => Ok(LogicalType::Null),
        0x01 => Ok(LogicalType::Bool),
        0x02 => Ok(LogicalType::Int),
        0x03 => Ok(LogicalType::Float),
        0x04 => Ok(LogicalType::Text),
        0x05 => Ok(LogicalType::Bytes),
        0x06 => Ok(LogicalType::Uuid),
        0x07 => Ok(LogicalType::Json),
        other => Err(Error::UnknownTypeTag(other)),
      },
    }
  }
}

// ─── Hash formats ────────────────────────────────────────────────────────────

/// Whether a 0x00 separator sits between the type tag and the canonical
/// bytes. The separator prevents cross-type collisions when a tag byte
/// could be suffixed by canonical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashFormat {
  LegacyNoSep,
  FelixV03Sep,
}

// ─── Generations ─────────────────────────────────────────────────────────────

/// The (tag map, hash format) pair persisted in database metadata.
///
/// Chosen once at database creation and honored verbatim on open;
/// generations never mix within one database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatGeneration {
  pub tag_map:     TagMap,
  pub hash_format: HashFormat,
}

impl FormatGeneration {
  /// The generation written into every newly created database.
  pub const CURRENT: Self = Self {
    tag_map:     TagMap::FelixV03,
    hash_format: HashFormat::FelixV03Sep,
  };

  /// The generation assumed when metadata declares nothing.
  pub const LEGACY: Self = Self {
    tag_map:     TagMap::LegacyV02,
    hash_format: HashFormat::LegacyNoSep,
  };

  /// Resolve the generation declared by the `tag_map` / `hash_format`
  /// metadata values. Absent keys mean a legacy database; a declared value
  /// this implementation does not know is a format error, not a guess.
  pub fn from_meta(
    tag_map: Option<&str>,
    hash_format: Option<&str>,
  ) -> Result<Self> {
    let tag_map = match tag_map {
      None => TagMap::LegacyV02,
      Some(TAG_MAP_V03) => TagMap::FelixV03,
      Some(other) => {
        return Err(Error::UnknownGeneration {
          key:   "tag_map",
          value: other.to_owned(),
        })
      }
    };
    let hash_format = match hash_format {
      None => HashFormat::LegacyNoSep,
      Some(HASH_FORMAT_V03) => HashFormat::FelixV03Sep,
      Some(other) => {
        return Err(Error::UnknownGeneration {
          key:   "hash_format",
          value: other.to_owned(),
        })
      }
    };
    Ok(Self { tag_map, hash_format })
  }
}

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// 32-byte identity hash of a canonical value under `generation`:
/// SHA-256 over `tag_byte || [0x00] || canonical_bytes`.
pub fn value_hash(
  generation: FormatGeneration,
  value: &CanonValue,
) -> Result<[u8; 32]> {
  let tag = generation.tag_map.tag_byte(value.logical_type())?;
  let mut hasher = Sha256::new();
  hasher.update([tag]);
  if generation.hash_format == HashFormat::FelixV03Sep {
    hasher.update([0x00]);
  }
  hasher.update(value.canon_bytes());
  Ok(hasher.finalize().into())
}

/// 32-byte identity hash of a canonical field name:
/// SHA-256 over `"field" || 0x00 || name`. Field hashes are
/// generation-independent.
pub fn field_hash(name_canon: &str) -> [u8; 32] {
  let mut hasher = Sha256::new();
  hasher.update(b"field");
  hasher.update([0x00]);
  hasher.update(name_canon.as_bytes());
  hasher.finalize().into()
}
