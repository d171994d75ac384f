// File: src/persistence.rs
//! Reading and writing dictionary tables.
//!
//! The codec is picked from the file extension: `.bin` files are bincode,
//! everything else is JSON. Saves always rewrite the whole table through a
//! temporary file in the destination directory, so a crash never leaves a
//! half-written dictionary behind.

use crate::core::types::{Candidates, PolyphoneRule, ToneVariant};
use crate::errors::{PinyinError, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Character-or-word to ordered readings.
pub type KeyedTable = IndexMap<String, Candidates>;

/// Character to ordered rule list.
pub type RuleTable = IndexMap<String, Vec<PolyphoneRule>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictFormat {
    #[default]
    Json,
    Bincode,
}

impl DictFormat {
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") => Self::Bincode,
            _ => Self::Json,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Bincode => "bin",
        }
    }
}

/// On-disk rare table. Slot `i` holds code point `HAN_BASE + offset + i`; an
/// empty slot is a hole left by a merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RareDocument {
    pub offset: u32,
    pub version: u64,
    pub entries: Vec<Candidates>,
}

/// Self-learned usage counts, one map per tone variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrequencyDocument {
    #[serde(default)]
    pub with_tone: IndexMap<String, u64>,
    #[serde(default)]
    pub no_tone: IndexMap<String, u64>,
}

impl FrequencyDocument {
    pub fn for_variant_mut(&mut self, variant: ToneVariant) -> &mut IndexMap<String, u64> {
        match variant {
            ToneVariant::WithTone => &mut self.with_tone,
            ToneVariant::NoTone => &mut self.no_tone,
        }
    }
}

/// Unix timestamps of the last merge per tone variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStateDocument {
    #[serde(default)]
    pub with_tone: u64,
    #[serde(default)]
    pub no_tone: u64,
}

impl MergeStateDocument {
    pub fn for_variant(&self, variant: ToneVariant) -> u64 {
        match variant {
            ToneVariant::WithTone => self.with_tone,
            ToneVariant::NoTone => self.no_tone,
        }
    }

    pub fn set(&mut self, variant: ToneVariant, stamp: u64) {
        match variant {
            ToneVariant::WithTone => self.with_tone = stamp,
            ToneVariant::NoTone => self.no_tone = stamp,
        }
    }
}

/// A candidate value as the generator writes it: a lone string or a list.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl From<OneOrMany> for Candidates {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// JSON rare tables come either anchored or as the bare positional array.
#[derive(Deserialize)]
#[serde(untagged)]
enum RareJson {
    Anchored {
        #[serde(default)]
        offset: Option<u32>,
        #[serde(default)]
        version: u64,
        entries: Vec<OneOrMany>,
    },
    Positional(Vec<OneOrMany>),
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| PinyinError::load_fail(path, e.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| PinyinError::load_fail(path, e.to_string()))
}

fn read_bincode<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| PinyinError::load_fail(path, e.to_string()))?;
    bincode::deserialize_from(BufReader::new(file)).map_err(|e| PinyinError::load_fail(path, e.to_string()))
}

/// Reads a table with a canonical (format-independent) shape.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<T> {
    match DictFormat::of(path) {
        DictFormat::Json => read_json(path),
        DictFormat::Bincode => read_bincode(path),
    }
}

/// Reads a keyed table, accepting scalar candidate values in JSON.
pub fn read_keyed(path: &Path) -> Result<KeyedTable> {
    match DictFormat::of(path) {
        DictFormat::Json => {
            let raw: IndexMap<String, OneOrMany> = read_json(path)?;
            Ok(raw.into_iter().map(|(k, v)| (k, v.into())).collect())
        }
        DictFormat::Bincode => read_bincode(path),
    }
}

/// Reads a rare table. `legacy_offset` anchors a bare positional array.
pub fn read_rare(path: &Path, legacy_offset: u32) -> Result<RareDocument> {
    match DictFormat::of(path) {
        DictFormat::Json => {
            let raw: RareJson = read_json(path)?;
            Ok(match raw {
                RareJson::Anchored {
                    offset,
                    version,
                    entries,
                } => RareDocument {
                    offset: offset.unwrap_or(legacy_offset),
                    version,
                    entries: entries.into_iter().map(Into::into).collect(),
                },
                RareJson::Positional(entries) => RareDocument {
                    offset: legacy_offset,
                    version: 0,
                    entries: entries.into_iter().map(Into::into).collect(),
                },
            })
        }
        DictFormat::Bincode => read_bincode(path),
    }
}

/// Atomically replaces `path` with the serialized table.
pub fn save_table<T: Serialize>(path: &Path, table: &T) -> Result<()> {
    let parent_dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent_dir).map_err(|e| PinyinError::load_fail(path, e.to_string()))?;

    let temp_file = NamedTempFile::new_in(parent_dir).map_err(|e| PinyinError::load_fail(path, e.to_string()))?;
    {
        let mut writer = BufWriter::new(&temp_file);
        match DictFormat::of(path) {
            DictFormat::Json => serde_json::to_writer_pretty(&mut writer, table)
                .map_err(|e| PinyinError::load_fail(path, e.to_string()))?,
            DictFormat::Bincode => bincode::serialize_into(&mut writer, table)
                .map_err(|e| PinyinError::load_fail(path, e.to_string()))?,
        }
        writer.flush().map_err(|e| PinyinError::load_fail(path, e.to_string()))?;
    }

    temp_file
        .persist(path)
        .map_err(|e| PinyinError::load_fail(path, e.error.to_string()))?;
    Ok(())
}

/// Writes an empty table when `path` does not exist yet. Returns whether a
/// file was created.
pub fn ensure_table<T: Serialize + Default>(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_table(path, &T::default())?;
    tracing::info!(path = %path.display(), "created empty dictionary table");
    Ok(true)
}

/// Copies `path` into `backup_dir` as `<stem>.<stamp>.<ext>`. Missing sources
/// are not an error; there is simply nothing to back up.
pub fn backup(path: &Path, backup_dir: &Path, stamp: u64) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::create_dir_all(backup_dir)
        .map_err(|e| PinyinError::unknown(format!("cannot create backup dir {}: {e}", backup_dir.display())))?;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("table");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let target = backup_dir.join(format!("{stem}.{stamp}.{ext}"));
    fs::copy(path, &target)
        .map_err(|e| PinyinError::unknown(format!("cannot back up {}: {e}", path.display())))?;
    tracing::debug!(from = %path.display(), to = %target.display(), "backed up dictionary");
    Ok(Some(target))
}
