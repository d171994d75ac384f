// File: src/learning.rs
//! Self-learning of rare characters and their migration into the common tier.
//!
//! Conversions never write to the shared tables directly. While resolving
//! under a read lock they record what they learned and which self-learned
//! characters they used in a [`LearnBatch`]; the engine applies the batch
//! afterwards with [`absorb`] under a short write lock.

use crate::config::{MergeSettings, TableFile};
use crate::core::dictionary::{DictionaryStore, RareTable, VariantTables};
use crate::core::types::{Candidates, SkipReason, Tier, ToneVariant};
use crate::errors::Result;
use crate::persistence::{backup, save_table, KeyedTable};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Learning side effects of a single conversion.
#[derive(Debug)]
pub struct LearnBatch {
    variant: ToneVariant,
    learned: IndexMap<String, Candidates>,
    hits: HashMap<String, u64>,
}

impl LearnBatch {
    pub fn new(variant: ToneVariant) -> Self {
        Self {
            variant,
            learned: IndexMap::new(),
            hits: HashMap::new(),
        }
    }

    pub fn variant(&self) -> ToneVariant {
        self.variant
    }

    pub fn is_empty(&self) -> bool {
        self.learned.is_empty() && self.hits.is_empty()
    }

    /// Tiered lookup for `ch` that records learning as it goes.
    ///
    /// A rare hit is learned (once per batch); every later use of a learned
    /// character, whether from the table or from this batch, counts as a hit.
    pub fn lookup(&mut self, tables: &VariantTables, ch: char) -> Option<Candidates> {
        let (tier, candidates) = tables.lookup(ch)?;
        let key = ch.to_string();
        match tier {
            Tier::SelfLearned => *self.hits.entry(key).or_insert(0) += 1,
            Tier::Rare if self.learned.contains_key(&key) => *self.hits.entry(key).or_insert(0) += 1,
            Tier::Rare => {
                tracing::debug!(variant = %self.variant, %ch, "learned rare character");
                self.learned.insert(key, candidates.clone());
            }
            _ => {}
        }
        Some(candidates.clone())
    }
}

/// Applies a batch to the shared tables. Returns the number of characters
/// newly added to the self-learned tier.
pub fn absorb(tables: &mut VariantTables, batch: LearnBatch) -> usize {
    let mut added = 0;
    for (key, candidates) in batch.learned {
        if tables.self_learned.contains_key(&key) {
            continue;
        }
        tables.self_learned.insert(key.clone(), candidates);
        tables.frequency.insert(key.clone(), 0);
        tables.pending.insert(key);
        tables.freq_dirty = true;
        added += 1;
    }
    for (key, count) in batch.hits {
        if tables.self_learned.contains_key(&key) {
            *tables.frequency.entry(key).or_insert(0) += count;
            tables.freq_dirty = true;
        }
    }
    added
}

/// Persists learned characters and frequency counts that changed since the
/// last flush. Returns how many learned characters were written.
pub fn flush(store: &mut DictionaryStore) -> Result<usize> {
    let mut written = 0;
    for variant in ToneVariant::ALL {
        let pending = store.variant(variant).pending.len();
        if pending > 0 {
            store.persist_self_learned(variant)?;
            written += pending;
        }
    }
    if ToneVariant::ALL.iter().any(|v| store.variant(*v).freq_dirty) {
        store.persist_frequency()?;
    }
    if written > 0 {
        tracing::info!(count = written, "flushed learned characters");
    }
    Ok(written)
}

/// Decides whether `tables` may be merged at `now`.
pub fn merge_gate(tables: &VariantTables, settings: &MergeSettings, now: u64) -> Result<(), SkipReason> {
    let count = tables.self_learned.len();
    if count == 0 || count < settings.threshold {
        return Err(SkipReason::BelowThreshold {
            count,
            threshold: settings.threshold,
        });
    }
    let elapsed = now.saturating_sub(tables.last_merge);
    if elapsed < settings.cooldown_secs {
        return Err(SkipReason::CoolingDown {
            remaining_secs: settings.cooldown_secs - elapsed,
        });
    }
    Ok(())
}

/// The outcome of a merge computed against a snapshot of the tables.
#[derive(Debug)]
pub struct MergePlan {
    variant: ToneVariant,
    /// Characters moving into the common tier, highest frequency first.
    merged: Vec<String>,
    /// Merged characters plus self-learned ones already present in common.
    removed: HashSet<String>,
    common: KeyedTable,
    self_learned: KeyedTable,
    frequency: IndexMap<String, u64>,
    rare: RareTable,
}

impl MergePlan {
    pub fn merged(&self) -> &[String] {
        &self.merged
    }
}

/// Number of characters one merge may move.
pub fn merge_quota(count: usize, settings: &MergeSettings) -> usize {
    if settings.incremental {
        (count.saturating_sub(settings.threshold) + 1).min(settings.max_per_merge)
    } else {
        count
    }
}

/// Builds the post-merge tables without touching the originals.
pub fn plan_merge(variant: ToneVariant, tables: &VariantTables, settings: &MergeSettings) -> MergePlan {
    let quota = merge_quota(tables.self_learned.len(), settings);
    let freq = |key: &str| tables.frequency.get(key).copied().unwrap_or(0);

    let mut ranked: Vec<&String> = tables.self_learned.keys().collect();
    // Stable, so equally frequent characters merge in learning order.
    ranked.sort_by_key(|key| std::cmp::Reverse(freq(key.as_str())));

    // Entries already in common leave self-learned too and use up quota, so
    // exactly `quota` entries are removed.
    let mut merged = Vec::new();
    let mut removed = HashSet::new();
    for key in ranked.into_iter().take(quota) {
        if !tables.common.contains_key(key) {
            merged.push(key.clone());
        }
        removed.insert(key.clone());
    }

    let mut common = tables.common.clone();
    for key in &merged {
        if let Some(candidates) = tables.self_learned.get(key) {
            common.insert(key.clone(), candidates.clone());
        }
    }
    if settings.sort_by_frequency {
        common.sort_by(|a, _, b, _| freq(b.as_str()).cmp(&freq(a.as_str())));
    }

    let mut self_learned = tables.self_learned.clone();
    self_learned.retain(|key, _| !removed.contains(key));
    let mut frequency = tables.frequency.clone();
    frequency.retain(|key, _| !removed.contains(key));

    let mut rare = tables.rare.clone();
    for key in &removed {
        let mut chars = key.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            rare.remove(ch);
        }
    }

    MergePlan {
        variant,
        merged,
        removed,
        common,
        self_learned,
        frequency,
        rare,
    }
}

/// Backs up (when configured) and writes the tables owned by the plan's
/// variant. Only the merge holding that variant's guard writes them.
pub fn persist_plan(store: &DictionaryStore, plan: &MergePlan, settings: &MergeSettings, now: u64) -> Result<()> {
    let paths = store.paths();
    let variant = plan.variant;
    let common_path = paths.path(TableFile::common(variant));
    let learned_path = paths.path(TableFile::self_learn(variant));

    if settings.backup_before_merge {
        let backup_dir = paths.backup_dir();
        backup(&common_path, &backup_dir, now)?;
        backup(&learned_path, &backup_dir, now)?;
    }

    save_table(&common_path, &plan.common)?;
    save_table(&learned_path, &plan.self_learned)?;
    save_table(&paths.path(TableFile::rare(variant)), &plan.rare.to_document())
}

/// Writes the frequency and merge-state documents as they will be once the
/// plan is applied. Both documents hold every variant, so this must run under
/// the store's write lock.
pub fn persist_shared_documents(store: &DictionaryStore, plan: &MergePlan, now: u64) -> Result<()> {
    let paths = store.paths();

    let mut frequency = store.frequency_document();
    *frequency.for_variant_mut(plan.variant) = plan.frequency.clone();
    save_table(&paths.path(TableFile::SelfLearnFrequency), &frequency)?;

    let mut state = store.merge_state_document();
    state.set(plan.variant, now);
    save_table(&paths.path(TableFile::MergeState), &state)
}

/// Installs a persisted plan. Characters learned after the plan was built
/// stay in the tables and remain pending for the next flush.
pub fn apply_plan(tables: &mut VariantTables, plan: MergePlan, now: u64) -> Vec<String> {
    let MergePlan {
        merged,
        removed,
        common,
        self_learned: persisted,
        frequency: persisted_frequency,
        rare,
        ..
    } = plan;

    tables.common = common;
    tables.rare = rare;
    tables.self_learned.retain(|key, _| !removed.contains(key));
    tables.frequency.retain(|key, _| !removed.contains(key));
    tables.pending.retain(|key| {
        tables.self_learned.contains_key(key) && !persisted.contains_key(key)
    });
    tables.freq_dirty = tables.frequency != persisted_frequency;
    tables.last_merge = now;
    merged
}
