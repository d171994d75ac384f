// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Ordered pinyin readings for one key. The first entry is the default reading.
pub type Candidates = Vec<String>;

/// Which family of tables a lookup runs against.
///
/// The two variants are fully independent: separate tables, separate
/// frequency counts and separate merge schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneVariant {
    WithTone,
    NoTone,
}

impl ToneVariant {
    pub const ALL: [ToneVariant; 2] = [ToneVariant::WithTone, ToneVariant::NoTone];

    pub fn from_flag(with_tone: bool) -> Self {
        if with_tone {
            Self::WithTone
        } else {
            Self::NoTone
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::WithTone => 0,
            Self::NoTone => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WithTone => "with_tone",
            Self::NoTone => "no_tone",
        }
    }
}

impl fmt::Display for ToneVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A priority level in the resolution chain, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Custom,
    SelfLearned,
    Common,
    Rare,
    Fallback,
}

/// How a polyphone rule inspects the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    /// The target is the Han character right before the polyphone.
    #[serde(rename = "pre", alias = "precedes")]
    Precedes,
    /// The target is the Han character right after the polyphone.
    #[serde(rename = "post", alias = "follows")]
    Follows,
    /// The target is the whole (up to three character) window.
    #[serde(rename = "word", alias = "exact_word")]
    Word,
}

/// One context rule for a polyphone. Rules for a character are tried in
/// stored order and the first match wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyphoneRule {
    #[serde(rename = "type")]
    pub kind: RuleKind,
    #[serde(alias = "char", alias = "word")]
    pub target: String,
    pub pinyin: String,
    #[serde(default)]
    pub weight: Option<f32>,
}

impl PolyphoneRule {
    pub fn new(kind: RuleKind, target: &str, pinyin: &str) -> Self {
        Self {
            kind,
            target: target.to_string(),
            pinyin: pinyin.to_string(),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// What to do with characters that are not Han.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialCharMode {
    Keep,
    Delete,
    Replace,
}

impl FromStr for SpecialCharMode {
    type Err = crate::errors::PinyinError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep" => Ok(Self::Keep),
            "delete" => Ok(Self::Delete),
            "replace" => Ok(Self::Replace),
            other => Err(crate::errors::PinyinError::invalid_input(
                "special_char_mode",
                format!("unknown mode '{other}'"),
            )),
        }
    }
}

/// Per-call handling of non-Han characters.
///
/// `mode: None` means "use the configured default mode". The map only matters
/// in replace mode and takes precedence over the built-in punctuation map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SpecialCharConfig {
    pub mode: Option<SpecialCharMode>,
    pub map: BTreeMap<char, String>,
}

impl SpecialCharConfig {
    pub fn with_mode(mode: SpecialCharMode) -> Self {
        Self {
            mode: Some(mode),
            map: BTreeMap::new(),
        }
    }

    /// Parses a mode name, falling back to the configured default when the
    /// name is not recognised.
    pub fn parse(mode: &str) -> Self {
        Self {
            mode: mode.parse().ok(),
            map: BTreeMap::new(),
        }
    }

    pub fn replace(mut self, from: char, to: &str) -> Self {
        self.map.insert(from, to.to_string());
        self
    }
}

/// The full parameter set of one conversion. It doubles as the cache key, so
/// every field takes part in equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConvertOptions {
    pub separator: String,
    pub with_tone: bool,
    pub special_chars: SpecialCharConfig,
    /// Single-call overrides for individual characters.
    pub temp_map: BTreeMap<char, String>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            separator: " ".to_string(),
            with_tone: false,
            special_chars: SpecialCharConfig::default(),
            temp_map: BTreeMap::new(),
        }
    }
}

impl ConvertOptions {
    pub fn separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn with_tone(mut self, with_tone: bool) -> Self {
        self.with_tone = with_tone;
        self
    }

    pub fn special_chars(mut self, config: SpecialCharConfig) -> Self {
        self.special_chars = config;
        self
    }

    pub fn temp(mut self, ch: char, pinyin: &str) -> Self {
        self.temp_map.insert(ch, pinyin.to_string());
        self
    }

    pub fn variant(&self) -> ToneVariant {
        ToneVariant::from_flag(self.with_tone)
    }
}

/// Why a variant was left alone by a merge run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    BelowThreshold { count: usize, threshold: usize },
    CoolingDown { remaining_secs: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub variant: ToneVariant,
    /// Characters moved into the common tier, highest frequency first.
    pub merged: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSkip {
    pub variant: ToneVariant,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeFailure {
    pub variant: ToneVariant,
    pub error: String,
}

/// Result of [`crate::PinyinEngine::execute_merge`]. A failure in one variant
/// never prevents the other from being merged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub succeeded: Vec<MergeOutcome>,
    pub skipped: Vec<MergeSkip>,
    pub failed: Vec<MergeFailure>,
}

/// Entry counts for one tone variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DictionaryStats {
    pub custom: usize,
    pub self_learned: usize,
    /// Learned in memory but not yet flushed.
    pub pending: usize,
    pub common: usize,
    pub rare: usize,
    pub fallback: usize,
}
