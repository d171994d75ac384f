use crate::config::EngineConfig;
use crate::core::cache::{CacheKey, CacheStats, ResultCache};
use crate::core::context::{Context, PolyphoneResolver};
use crate::core::dictionary::{DictionaryStore, VariantTables};
use crate::core::normalizer::{first_pinyin, is_han, strip_tone, SpecialCharRules};
use crate::core::phrase::Segment;
use crate::core::types::{
    Candidates, ConvertOptions, DictionaryStats, MergeFailure, MergeOutcome, MergeReport, MergeSkip,
    PolyphoneRule, SpecialCharConfig, SpecialCharMode, ToneVariant,
};
use crate::errors::Result;
use crate::learning::{self, LearnBatch};
use parking_lot::{Mutex, RwLock};
use std::path::Path;

/// One unit of the text walk after special-character handling.
enum Unit {
    Han(char),
    /// Pinyin substituted by the multi-word pass.
    Phrase(String),
    Other(String),
}

impl Unit {
    fn han(&self) -> Option<char> {
        match self {
            Unit::Han(c) => Some(*c),
            _ => None,
        }
    }

    fn is_word(&self) -> bool {
        !matches!(self, Unit::Other(_))
    }
}

/// The conversion engine.
///
/// Lookups run concurrently under a read lock on the dictionary store.
/// Whatever a conversion learns is applied afterwards under a short write
/// lock, and every mutation clears the result cache while it still holds
/// that write lock.
pub struct PinyinEngine {
    config: EngineConfig,
    special_chars: SpecialCharRules,
    store: RwLock<DictionaryStore>,
    cache: Mutex<ResultCache>,
    merge_guards: [Mutex<()>; 2],
}

impl PinyinEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        let store = DictionaryStore::open(&config.dict)?;
        let special_chars = SpecialCharRules::new(
            config.special_char.default_mode,
            &config.special_char.allowed_charset,
            &config.special_char.replacements,
        );
        let engine = Self {
            special_chars,
            store: RwLock::new(store),
            cache: Mutex::new(ResultCache::new(config.cache.capacity)),
            merge_guards: [Mutex::new(()), Mutex::new(())],
            config,
        };
        for variant in engine.pending_merges() {
            tracing::info!(variant = %variant, "self-learned dictionary is ready to merge");
        }
        Ok(engine)
    }

    /// Engine with default settings over the tables in `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::new(EngineConfig::with_data_dir(data_dir.as_ref()))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Converts `text` with the default special-character handling.
    pub fn convert(&self, text: &str, separator: &str, with_tone: bool) -> String {
        self.convert_with(
            text,
            &ConvertOptions::default().separator(separator).with_tone(with_tone),
        )
    }

    pub fn convert_with(&self, text: &str, options: &ConvertOptions) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut options = options.clone();
        let mode = options.special_chars.mode.unwrap_or(self.special_chars.default_mode());
        options.special_chars.mode = Some(mode);
        let key = CacheKey::new(text, options.clone());
        if let Some(hit) = self.cache.lock().get(&key) {
            return hit;
        }

        let mut batch = LearnBatch::new(options.variant());
        let store = self.store.read();
        let output = self.render(&store, text, &options, &mut batch);
        self.cache.lock().put(key, output.clone());
        drop(store);

        self.absorb(batch);
        output
    }

    /// Lower-case, separator-joined slug with everything outside the
    /// allowed charset removed.
    pub fn url_slug(&self, text: &str, separator: &str) -> String {
        let options = ConvertOptions::default()
            .separator(separator)
            .special_chars(SpecialCharConfig::with_mode(SpecialCharMode::Delete));
        let converted = self.convert_with(text, &options);
        if separator.is_empty() {
            return converted.to_lowercase();
        }
        converted
            .split(separator)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
            .to_lowercase()
    }

    fn render(&self, store: &DictionaryStore, text: &str, options: &ConvertOptions, batch: &mut LearnBatch) -> String {
        let variant = options.variant();
        let tables = store.variant(variant);
        let separator = options.separator.as_str();
        let delete_mode = options.special_chars.mode == Some(SpecialCharMode::Delete);

        let units: Vec<Unit> = tables
            .phrases
            .substitute(text, separator)
            .into_iter()
            .filter_map(|segment| match segment {
                // Delete mode drops whitespace, so syllables inside a custom
                // reading are joined with the separator instead.
                Segment::Phrase(pinyin) if delete_mode => Some(Unit::Phrase(
                    pinyin.split_whitespace().collect::<Vec<_>>().join(separator),
                )),
                Segment::Phrase(pinyin) => Some(Unit::Phrase(pinyin)),
                Segment::Char(c) if is_han(c) => Some(Unit::Han(c)),
                Segment::Char(c) => {
                    let handled = self.special_chars.classify(
                        c,
                        options.special_chars.mode,
                        &options.special_chars.map,
                    );
                    (!handled.is_empty()).then(|| Unit::Other(handled.into_owned()))
                }
            })
            .collect();

        let resolver = PolyphoneResolver::new(store.rules(), &self.config.polyphone_priority, variant);
        let mut output = String::with_capacity(text.len() * 4);
        let mut prev_is_word = false;

        for (i, unit) in units.iter().enumerate() {
            let piece = match unit {
                Unit::Han(c) => {
                    let context = Context::around(
                        i.checked_sub(1).and_then(|p| units[p].han()),
                        *c,
                        units.get(i + 1).and_then(Unit::han),
                    );
                    self.resolve_char(*c, &context, options, tables, &resolver, batch)
                }
                Unit::Phrase(pinyin) => pinyin.clone(),
                Unit::Other(s) => s.clone(),
            };

            if !output.is_empty() && (unit.is_word() || prev_is_word) {
                output.push_str(separator);
            }
            output.push_str(&piece);
            prev_is_word = unit.is_word();
        }
        output
    }

    fn resolve_char(
        &self,
        ch: char,
        context: &Context,
        options: &ConvertOptions,
        tables: &VariantTables,
        resolver: &PolyphoneResolver<'_>,
        batch: &mut LearnBatch,
    ) -> String {
        if let Some(pinyin) = options.temp_map.get(&ch) {
            return match options.variant() {
                ToneVariant::WithTone => pinyin.clone(),
                ToneVariant::NoTone => strip_tone(pinyin),
            };
        }
        if let Some(pinyin) = tables.custom(ch).and_then(|c| first_pinyin(c)) {
            return pinyin.to_string();
        }
        match batch.lookup(tables, ch) {
            Some(candidates) => resolver.resolve(ch, &candidates, context),
            None => ch.to_string(),
        }
    }

    fn absorb(&self, batch: LearnBatch) {
        if batch.is_empty() {
            return;
        }
        let variant = batch.variant();
        let mut store = self.store.write();
        learning::absorb(store.variant_mut(variant), batch);
    }

    /// Adds or replaces a custom entry. `pinyin` is one reading; for a
    /// multi-character key it is the whole phrase, e.g. `"yin hang"`.
    pub fn add_custom_pinyin(&self, key: &str, pinyin: &str, with_tone: bool) -> Result<()> {
        self.add_custom_readings(key, vec![pinyin.to_string()], with_tone)
    }

    /// Adds or replaces a custom entry with several readings, the first
    /// being the default.
    pub fn add_custom_readings(&self, key: &str, readings: Candidates, with_tone: bool) -> Result<()> {
        let mut store = self.store.write();
        store.add_custom(ToneVariant::from_flag(with_tone), key, readings)?;
        self.cache.lock().clear();
        Ok(())
    }

    /// Removes a custom entry. Returns whether it existed.
    pub fn remove_custom_pinyin(&self, key: &str, with_tone: bool) -> Result<bool> {
        let mut store = self.store.write();
        let removed = store.remove_custom(ToneVariant::from_flag(with_tone), key)?;
        if removed {
            self.cache.lock().clear();
        }
        Ok(removed)
    }

    /// Appends a polyphone rule for `ch` and persists the rule table.
    /// Adding an existing rule is a no-op.
    pub fn add_polyphone_rule(&self, ch: char, rule: PolyphoneRule) -> Result<()> {
        let mut store = self.store.write();
        if store.add_rule(ch, rule)? {
            self.cache.lock().clear();
        }
        Ok(())
    }

    /// Variants whose self-learned tables currently pass the merge gate.
    pub fn pending_merges(&self) -> Vec<ToneVariant> {
        let now = learning::now_secs();
        let store = self.store.read();
        ToneVariant::ALL
            .into_iter()
            .filter(|v| learning::merge_gate(store.variant(*v), &self.config.merge, now).is_ok())
            .collect()
    }

    /// Migrates frequent self-learned characters into the common tier for
    /// every variant that passes the merge gate.
    pub fn execute_merge(&self) -> MergeReport {
        let settings = &self.config.merge;
        let mut report = MergeReport::default();

        for variant in ToneVariant::ALL {
            let _guard = self.merge_guards[variant.index()].lock();
            let now = learning::now_secs();

            let plan = {
                let store = self.store.read();
                if let Err(reason) = learning::merge_gate(store.variant(variant), settings, now) {
                    tracing::debug!(variant = %variant, ?reason, "merge skipped");
                    report.skipped.push(MergeSkip { variant, reason });
                    continue;
                }
                tracing::info!(
                    variant = %variant,
                    self_learned = store.variant(variant).stats().self_learned,
                    "merging self-learned dictionary"
                );
                let plan = learning::plan_merge(variant, store.variant(variant), settings);
                if let Err(e) = learning::persist_plan(&store, &plan, settings, now) {
                    tracing::warn!(variant = %variant, error = %e, "merge failed");
                    report.failed.push(MergeFailure {
                        variant,
                        error: e.to_string(),
                    });
                    continue;
                }
                plan
            };

            let mut store = self.store.write();
            if let Err(e) = learning::persist_shared_documents(&store, &plan, now) {
                tracing::warn!(variant = %variant, error = %e, "merge failed");
                report.failed.push(MergeFailure {
                    variant,
                    error: e.to_string(),
                });
                continue;
            }
            let merged = learning::apply_plan(store.variant_mut(variant), plan, now);
            self.cache.lock().clear();
            tracing::info!(variant = %variant, count = merged.len(), "merged into common dictionary");
            report.succeeded.push(MergeOutcome { variant, merged });
        }
        report
    }

    /// Persists learned characters and frequencies. Returns how many learned
    /// characters were written; a clean engine writes nothing.
    pub fn flush(&self) -> Result<usize> {
        let mut store = self.store.write();
        learning::flush(&mut store)
    }

    /// Flushes and releases the engine.
    pub fn close(self) -> Result<()> {
        self.flush().map(|_| ())
    }

    pub fn stats(&self, variant: ToneVariant) -> DictionaryStats {
        self.store.read().stats(variant)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    /// Usage count of a self-learned character.
    pub fn frequency(&self, variant: ToneVariant, key: &str) -> Option<u64> {
        self.store.read().variant(variant).frequency(key)
    }

    pub fn is_self_learned(&self, variant: ToneVariant, key: &str) -> bool {
        self.store.read().variant(variant).is_self_learned(key)
    }
}
