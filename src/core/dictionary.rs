// File: src/core/dictionary.rs
//! In-memory dictionary tiers and their load/persist operations.

use crate::config::{DictPaths, TableFile};
use crate::core::context::RuleBook;
use crate::core::normalizer::{dedupe, dedupe_candidates, strip_tone};
use crate::core::phrase::PhraseIndex;
use crate::core::types::{Candidates, DictionaryStats, PolyphoneRule, Tier, ToneVariant};
use crate::errors::{PinyinError, Result};
use crate::persistence::{
    ensure_table, read_keyed, read_rare, read_table, save_table, FrequencyDocument, KeyedTable,
    MergeStateDocument, RareDocument, RuleTable,
};
use indexmap::IndexMap;
use std::collections::HashSet;

/// First code point of the CJK Unified Ideographs block.
pub const HAN_BASE: u32 = 0x4E00;
/// Last code point addressable by the rare table.
pub const HAN_LAST: u32 = 0x9FA5;

/// Normalizes readings for the given variant: whitespace collapsed, repeated
/// syllables dropped and, for the no-tone tables, tone marks stripped.
pub fn normalize_candidates(variant: ToneVariant, candidates: Candidates) -> Candidates {
    dedupe_candidates(candidates.into_iter().map(|c| match variant {
        ToneVariant::WithTone => dedupe(&c),
        ToneVariant::NoTone => dedupe(&strip_tone(&c)),
    }))
}

/// Normalizes the readings stored under `key`.
///
/// A single character lists alternative readings and goes through
/// [`normalize_candidates`]. A longer word spells one reading syllable by
/// syllable, either in one string or one item per syllable, so repeats are
/// kept (`谢谢` is `xie xie`) and only tone marks and whitespace change.
pub fn normalize_entry(variant: ToneVariant, key: &str, candidates: Candidates) -> Candidates {
    let mut chars = key.chars();
    if chars.next().is_none() || chars.next().is_none() {
        return normalize_candidates(variant, candidates);
    }
    candidates
        .into_iter()
        .map(|c| {
            let c = match variant {
                ToneVariant::WithTone => c,
                ToneVariant::NoTone => strip_tone(&c),
            };
            c.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .filter(|c| !c.is_empty())
        .collect()
}

fn normalize_table(variant: ToneVariant, table: KeyedTable) -> KeyedTable {
    table
        .into_iter()
        .filter_map(|(key, candidates)| {
            let candidates = normalize_entry(variant, &key, candidates);
            (!key.is_empty() && !candidates.is_empty()).then_some((key, candidates))
        })
        .collect()
}

/// Positional rare-tier table with an explicit anchor.
///
/// Slot `i` always belongs to code point `HAN_BASE + offset + i`. Removing a
/// character clears its slot and bumps the version; no other slot moves, so
/// lookups stay correct however the common tier grows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RareTable {
    offset: u32,
    version: u64,
    entries: Vec<Candidates>,
}

impl RareTable {
    pub fn from_document(variant: ToneVariant, doc: RareDocument) -> Self {
        Self {
            offset: doc.offset,
            version: doc.version,
            entries: doc
                .entries
                .into_iter()
                .map(|slot| normalize_candidates(variant, slot))
                .collect(),
        }
    }

    pub fn to_document(&self) -> RareDocument {
        RareDocument {
            offset: self.offset,
            version: self.version,
            entries: self.entries.clone(),
        }
    }

    pub fn position_of(&self, ch: char) -> Option<usize> {
        let code = ch as u32;
        let first = HAN_BASE.checked_add(self.offset)?;
        if code < first || code > HAN_LAST {
            return None;
        }
        let index = (code - first) as usize;
        (index < self.entries.len()).then_some(index)
    }

    pub fn get(&self, ch: char) -> Option<&Candidates> {
        self.position_of(ch)
            .map(|i| &self.entries[i])
            .filter(|slot| !slot.is_empty())
    }

    /// Clears the slot for `ch`. Returns whether anything was removed.
    pub fn remove(&mut self, ch: char) -> bool {
        let Some(index) = self.position_of(ch) else {
            return false;
        };
        if self.entries[index].is_empty() {
            return false;
        }
        self.entries[index].clear();
        self.version += 1;
        true
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|slot| !slot.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Every tier for one tone variant.
#[derive(Debug, Default)]
pub struct VariantTables {
    pub(crate) custom: KeyedTable,
    pub(crate) phrases: PhraseIndex,
    pub(crate) self_learned: KeyedTable,
    /// Self-learned keys not yet written to disk.
    pub(crate) pending: HashSet<String>,
    pub(crate) frequency: IndexMap<String, u64>,
    pub(crate) freq_dirty: bool,
    pub(crate) common: KeyedTable,
    pub(crate) rare: RareTable,
    pub(crate) fallback: KeyedTable,
    pub(crate) last_merge: u64,
}

impl VariantTables {
    /// Custom single-character entry for `ch`.
    pub fn custom(&self, ch: char) -> Option<&Candidates> {
        let mut buf = [0u8; 4];
        self.custom.get(&*ch.encode_utf8(&mut buf))
    }

    /// Walks self-learned, common, rare and fallback in that order.
    pub fn lookup(&self, ch: char) -> Option<(Tier, &Candidates)> {
        let mut buf = [0u8; 4];
        let key: &str = ch.encode_utf8(&mut buf);
        if let Some(c) = self.self_learned.get(key) {
            return Some((Tier::SelfLearned, c));
        }
        if let Some(c) = self.common.get(key) {
            return Some((Tier::Common, c));
        }
        if let Some(c) = self.rare.get(ch) {
            return Some((Tier::Rare, c));
        }
        self.fallback.get(key).map(|c| (Tier::Fallback, c))
    }

    pub fn frequency(&self, key: &str) -> Option<u64> {
        self.frequency.get(key).copied()
    }

    pub fn is_self_learned(&self, key: &str) -> bool {
        self.self_learned.contains_key(key)
    }

    pub fn stats(&self) -> DictionaryStats {
        DictionaryStats {
            custom: self.custom.len(),
            self_learned: self.self_learned.len(),
            pending: self.pending.len(),
            common: self.common.len(),
            rare: self.rare.len(),
            fallback: self.fallback.len(),
        }
    }
}

/// Owns every loaded table and funnels all writes through a handful of
/// methods. Callers share it behind a lock.
#[derive(Debug)]
pub struct DictionaryStore {
    paths: DictPaths,
    variants: [VariantTables; 2],
    rules: RuleBook,
}

impl DictionaryStore {
    /// Loads every table, creating empty ones where a file does not exist yet.
    pub fn open(paths: &DictPaths) -> Result<Self> {
        std::fs::create_dir_all(&paths.data_dir)
            .map_err(|e| PinyinError::load_fail(&paths.data_dir, e.to_string()))?;

        let freq_path = paths.path(TableFile::SelfLearnFrequency);
        ensure_table::<FrequencyDocument>(&freq_path)?;
        let mut frequency: FrequencyDocument = read_table(&freq_path)?;

        let state_path = paths.path(TableFile::MergeState);
        ensure_table::<MergeStateDocument>(&state_path)?;
        let merge_state: MergeStateDocument = read_table(&state_path)?;

        let mut variants: [VariantTables; 2] = Default::default();
        for variant in ToneVariant::ALL {
            let tables = &mut variants[variant.index()];
            tables.custom = load_keyed(paths, TableFile::custom(variant), variant)?;
            tables.phrases = PhraseIndex::build(&tables.custom);
            tables.self_learned = load_keyed(paths, TableFile::self_learn(variant), variant)?;
            tables.common = load_keyed(paths, TableFile::common(variant), variant)?;

            let rare_path = paths.path(TableFile::rare(variant));
            ensure_table::<RareDocument>(&rare_path)?;
            let legacy_offset = u32::try_from(tables.common.len()).unwrap_or(u32::MAX);
            tables.rare = RareTable::from_document(variant, read_rare(&rare_path, legacy_offset)?);

            if let Some(path) = paths.fallback(variant) {
                if !path.exists() {
                    return Err(PinyinError::not_found(&path));
                }
                tables.fallback = normalize_table(variant, read_keyed(&path)?);
            }

            let counts = std::mem::take(frequency.for_variant_mut(variant));
            tables.frequency = counts
                .into_iter()
                .filter(|(key, _)| tables.self_learned.contains_key(key))
                .collect();
            tables.last_merge = merge_state.for_variant(variant);

            tracing::info!(
                variant = %variant,
                custom = tables.custom.len(),
                phrases = tables.phrases.len(),
                self_learned = tables.self_learned.len(),
                common = tables.common.len(),
                rare = tables.rare.len(),
                fallback = tables.fallback.len(),
                "loaded dictionaries"
            );
        }

        let rules = RuleBook::new(
            load_rules(paths, TableFile::PolyphoneRules)?,
            load_rules(paths, TableFile::PolyphoneCustom)?,
        );
        tracing::info!(characters = rules.len(), "loaded polyphone rules");

        Ok(Self {
            paths: paths.clone(),
            variants,
            rules,
        })
    }

    pub fn paths(&self) -> &DictPaths {
        &self.paths
    }

    pub fn variant(&self, variant: ToneVariant) -> &VariantTables {
        &self.variants[variant.index()]
    }

    pub fn variant_mut(&mut self, variant: ToneVariant) -> &mut VariantTables {
        &mut self.variants[variant.index()]
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    pub fn stats(&self, variant: ToneVariant) -> DictionaryStats {
        self.variant(variant).stats()
    }

    /// Inserts or replaces a custom entry. The table on disk is rewritten
    /// before the in-memory copy changes.
    pub fn add_custom(&mut self, variant: ToneVariant, key: &str, readings: Candidates) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PinyinError::invalid_input("key", "custom entry key is empty"));
        }
        let readings = normalize_entry(variant, key, readings);
        if readings.is_empty() {
            return Err(PinyinError::invalid_input("pinyin", "custom entry has no reading"));
        }

        let mut custom = self.variant(variant).custom.clone();
        custom.insert(key.to_string(), readings);
        save_table(&self.paths.path(TableFile::custom(variant)), &custom)?;

        let tables = self.variant_mut(variant);
        tables.phrases = PhraseIndex::build(&custom);
        tables.custom = custom;
        tracing::info!(variant = %variant, key, "added custom entry");
        Ok(())
    }

    /// Removes a custom entry. Returns false when the key was not present.
    pub fn remove_custom(&mut self, variant: ToneVariant, key: &str) -> Result<bool> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PinyinError::invalid_input("key", "custom entry key is empty"));
        }
        if !self.variant(variant).custom.contains_key(key) {
            return Ok(false);
        }

        let mut custom = self.variant(variant).custom.clone();
        custom.shift_remove(key);
        save_table(&self.paths.path(TableFile::custom(variant)), &custom)?;

        let tables = self.variant_mut(variant);
        tables.phrases = PhraseIndex::build(&custom);
        tables.custom = custom;
        tracing::info!(variant = %variant, key, "removed custom entry");
        Ok(true)
    }

    /// Appends a polyphone rule and rewrites the default rule file. Returns
    /// false when the same rule already exists.
    pub fn add_rule(&mut self, ch: char, rule: PolyphoneRule) -> Result<bool> {
        if rule.target.trim().is_empty() {
            return Err(PinyinError::invalid_input("rule", "rule target is empty"));
        }
        if rule.pinyin.trim().is_empty() {
            return Err(PinyinError::invalid_input("rule", "rule pinyin is empty"));
        }

        let mut rules = self.rules.clone();
        if !rules.add(ch, rule) {
            return Ok(false);
        }
        save_table(&self.paths.path(TableFile::PolyphoneRules), rules.base_table())?;
        self.rules = rules;
        tracing::info!(%ch, "added polyphone rule");
        Ok(true)
    }

    /// Writes the self-learned table for `variant` and clears its pending set.
    pub fn persist_self_learned(&mut self, variant: ToneVariant) -> Result<()> {
        let path = self.paths.path(TableFile::self_learn(variant));
        save_table(&path, &self.variant(variant).self_learned)?;
        self.variant_mut(variant).pending.clear();
        Ok(())
    }

    pub fn frequency_document(&self) -> FrequencyDocument {
        FrequencyDocument {
            with_tone: self.variant(ToneVariant::WithTone).frequency.clone(),
            no_tone: self.variant(ToneVariant::NoTone).frequency.clone(),
        }
    }

    pub fn merge_state_document(&self) -> MergeStateDocument {
        MergeStateDocument {
            with_tone: self.variant(ToneVariant::WithTone).last_merge,
            no_tone: self.variant(ToneVariant::NoTone).last_merge,
        }
    }

    /// Writes both variants' frequency counts.
    pub fn persist_frequency(&mut self) -> Result<()> {
        save_table(
            &self.paths.path(TableFile::SelfLearnFrequency),
            &self.frequency_document(),
        )?;
        for tables in &mut self.variants {
            tables.freq_dirty = false;
        }
        Ok(())
    }
}

fn load_keyed(paths: &DictPaths, file: TableFile, variant: ToneVariant) -> Result<KeyedTable> {
    let path = paths.path(file);
    ensure_table::<KeyedTable>(&path)?;
    Ok(normalize_table(variant, read_keyed(&path)?))
}

fn load_rules(paths: &DictPaths, file: TableFile) -> Result<RuleTable> {
    let path = paths.path(file);
    ensure_table::<RuleTable>(&path)?;
    read_table(&path)
}
