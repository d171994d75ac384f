//! Engine configuration.
//!
//! Every section has defaults, so an empty TOML file (or
//! `EngineConfig::default()`) gives a working engine rooted at `./data`.

use crate::core::normalizer::DEFAULT_ALLOWED_CHARSET;
use crate::core::types::{SpecialCharMode, ToneVariant};
use crate::errors::{PinyinError, Result};
use crate::persistence::DictFormat;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Every table file the engine reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFile {
    CommonWithTone,
    CommonNoTone,
    RareWithTone,
    RareNoTone,
    SelfLearnWithTone,
    SelfLearnNoTone,
    SelfLearnFrequency,
    CustomWithTone,
    CustomNoTone,
    PolyphoneRules,
    PolyphoneCustom,
    MergeState,
}

impl TableFile {
    pub fn stem(self) -> &'static str {
        match self {
            Self::CommonWithTone => "common_with_tone",
            Self::CommonNoTone => "common_no_tone",
            Self::RareWithTone => "rare_with_tone",
            Self::RareNoTone => "rare_no_tone",
            Self::SelfLearnWithTone => "self_learn_with_tone",
            Self::SelfLearnNoTone => "self_learn_no_tone",
            Self::SelfLearnFrequency => "self_learn_frequency",
            Self::CustomWithTone => "custom_with_tone",
            Self::CustomNoTone => "custom_no_tone",
            Self::PolyphoneRules => "polyphone_rules",
            Self::PolyphoneCustom => "polyphone_custom",
            Self::MergeState => "merge_state",
        }
    }

    pub fn common(variant: ToneVariant) -> Self {
        match variant {
            ToneVariant::WithTone => Self::CommonWithTone,
            ToneVariant::NoTone => Self::CommonNoTone,
        }
    }

    pub fn rare(variant: ToneVariant) -> Self {
        match variant {
            ToneVariant::WithTone => Self::RareWithTone,
            ToneVariant::NoTone => Self::RareNoTone,
        }
    }

    pub fn self_learn(variant: ToneVariant) -> Self {
        match variant {
            ToneVariant::WithTone => Self::SelfLearnWithTone,
            ToneVariant::NoTone => Self::SelfLearnNoTone,
        }
    }

    pub fn custom(variant: ToneVariant) -> Self {
        match variant {
            ToneVariant::WithTone => Self::CustomWithTone,
            ToneVariant::NoTone => Self::CustomNoTone,
        }
    }
}

/// Where the tables live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DictPaths {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/backup`.
    pub backup_dir: Option<PathBuf>,
    /// Codec used for default file names.
    pub format: DictFormat,
    /// Explicit paths for individual tables. Relative paths are resolved
    /// against `data_dir`.
    pub overrides: BTreeMap<TableFile, PathBuf>,
    /// Tables produced by external tooling. Unlike the others they are never
    /// created empty: a configured but missing fallback is an error.
    pub fallback_with_tone: Option<PathBuf>,
    pub fallback_no_tone: Option<PathBuf>,
}

impl Default for DictPaths {
    fn default() -> Self {
        Self::new("data")
    }
}

impl DictPaths {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
            backup_dir: None,
            format: DictFormat::Json,
            overrides: BTreeMap::new(),
            fallback_with_tone: None,
            fallback_no_tone: None,
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn path(&self, file: TableFile) -> PathBuf {
        match self.overrides.get(&file) {
            Some(p) => self.resolve(p),
            None => self
                .data_dir
                .join(format!("{}.{}", file.stem(), self.format.extension())),
        }
    }

    pub fn backup_dir(&self) -> PathBuf {
        match &self.backup_dir {
            Some(p) => self.resolve(p),
            None => self.data_dir.join("backup"),
        }
    }

    pub fn fallback(&self, variant: ToneVariant) -> Option<PathBuf> {
        let configured = match variant {
            ToneVariant::WithTone => self.fallback_with_tone.as_deref(),
            ToneVariant::NoTone => self.fallback_no_tone.as_deref(),
        };
        configured.map(|p| self.resolve(p))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpecialCharSettings {
    pub default_mode: SpecialCharMode,
    /// Body of a regex character class; delete mode keeps only matching
    /// characters.
    pub allowed_charset: String,
    /// Layered over the built-in full-width punctuation map.
    pub replacements: BTreeMap<char, String>,
}

impl Default for SpecialCharSettings {
    fn default() -> Self {
        Self {
            default_mode: SpecialCharMode::Delete,
            allowed_charset: DEFAULT_ALLOWED_CHARSET.to_string(),
            replacements: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum cached conversions. Zero disables the cache.
    pub capacity: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { capacity: 1000 }
    }
}

/// Gate and shape of the self-learned to common migration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MergeSettings {
    /// Minimum self-learned entries before a merge runs.
    pub threshold: usize,
    /// Merge only the overflow above the threshold instead of everything.
    pub incremental: bool,
    pub max_per_merge: usize,
    /// Minimum seconds between two merges of the same variant.
    pub cooldown_secs: u64,
    pub backup_before_merge: bool,
    pub sort_by_frequency: bool,
}

impl Default for MergeSettings {
    fn default() -> Self {
        Self {
            threshold: 1000,
            incremental: true,
            max_per_merge: 500,
            cooldown_secs: 86_400,
            backup_before_merge: true,
            sort_by_frequency: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub dict: DictPaths,
    pub special_char: SpecialCharSettings,
    pub cache: CacheSettings,
    pub merge: MergeSettings,
    /// Reading index used for a polyphone when no rule matches.
    pub polyphone_priority: HashMap<char, usize>,
}

impl EngineConfig {
    /// Default configuration rooted at `data_dir`.
    pub fn with_data_dir<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            dict: DictPaths::new(data_dir),
            ..Default::default()
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| PinyinError::invalid_input("config", e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PinyinError::not_found(path));
        }
        let source = std::fs::read_to_string(path)
            .map_err(|e| PinyinError::unknown(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }
}
