// File: src/core/context.rs
use crate::core::normalizer::{first_pinyin, strip_tone};
use crate::core::types::{PolyphoneRule, RuleKind, ToneVariant};
use crate::persistence::RuleTable;
use std::collections::HashMap;

/// The three-character window around a Han character.
///
/// `prev` and `next` are empty unless the neighbouring unit is itself Han;
/// `word` is the contiguous Han run `prev + char + next`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub prev: String,
    pub next: String,
    pub word: String,
}

impl Context {
    pub fn around(prev: Option<char>, ch: char, next: Option<char>) -> Self {
        let prev = prev.map(String::from).unwrap_or_default();
        let next = next.map(String::from).unwrap_or_default();
        let word = format!("{prev}{ch}{next}");
        Self { prev, next, word }
    }

    fn matches(&self, rule: &PolyphoneRule) -> bool {
        match rule.kind {
            RuleKind::Precedes => self.prev == rule.target,
            RuleKind::Follows => self.next == rule.target,
            RuleKind::Word => self.word == rule.target,
        }
    }
}

/// Polyphone rules grouped by character.
///
/// Rules from the custom rule file come first for each character, followed
/// by the default rules. Only the default rules are written back when a rule
/// is added at runtime.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    merged: HashMap<char, Vec<PolyphoneRule>>,
    base: RuleTable,
}

fn single_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn push_unique(list: &mut Vec<PolyphoneRule>, rule: PolyphoneRule) -> bool {
    if list.contains(&rule) {
        return false;
    }
    list.push(rule);
    true
}

impl RuleBook {
    pub fn new(base: RuleTable, custom: RuleTable) -> Self {
        let mut merged: HashMap<char, Vec<PolyphoneRule>> = HashMap::new();
        for (key, rules) in custom.iter().chain(base.iter()) {
            let Some(ch) = single_char(key) else {
                tracing::warn!(key = %key, "ignoring polyphone rules for a non-single-character key");
                continue;
            };
            let list = merged.entry(ch).or_default();
            for rule in rules {
                push_unique(list, rule.clone());
            }
        }
        Self { merged, base }
    }

    pub fn rules_for(&self, ch: char) -> &[PolyphoneRule] {
        self.merged.get(&ch).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends a rule. Returns false when an identical rule already exists.
    pub fn add(&mut self, ch: char, rule: PolyphoneRule) -> bool {
        let added = push_unique(self.merged.entry(ch).or_default(), rule.clone());
        if added {
            self.base.entry(ch.to_string()).or_default().push(rule);
        }
        added
    }

    /// The default rule table as it should be persisted.
    pub fn base_table(&self) -> &RuleTable {
        &self.base
    }

    /// Number of characters with at least one rule.
    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }
}

/// Picks one reading for a character from its candidates.
pub struct PolyphoneResolver<'a> {
    rules: &'a RuleBook,
    priority: &'a HashMap<char, usize>,
    variant: ToneVariant,
}

impl<'a> PolyphoneResolver<'a> {
    pub fn new(rules: &'a RuleBook, priority: &'a HashMap<char, usize>, variant: ToneVariant) -> Self {
        Self {
            rules,
            priority,
            variant,
        }
    }

    /// First matching rule wins; otherwise the configured default index,
    /// otherwise the first listed reading. A rule whose pinyin is not among
    /// the candidates is skipped.
    pub fn resolve(&self, ch: char, candidates: &[String], context: &Context) -> String {
        if candidates.len() <= 1 {
            return first_pinyin(candidates)
                .map(str::to_string)
                .unwrap_or_else(|| ch.to_string());
        }

        if let Some(pinyin) = self.match_rule(ch, candidates, context) {
            return pinyin;
        }

        let index = self.priority.get(&ch).copied().unwrap_or(0);
        candidates
            .get(index)
            .or_else(|| candidates.first())
            .map(|p| p.trim().to_string())
            .unwrap_or_else(|| ch.to_string())
    }

    fn match_rule(&self, ch: char, candidates: &[String], context: &Context) -> Option<String> {
        self.rules.rules_for(ch).iter().find_map(|rule| {
            let pinyin = match self.variant {
                ToneVariant::WithTone => rule.pinyin.trim().to_string(),
                ToneVariant::NoTone => strip_tone(rule.pinyin.trim()),
            };
            if pinyin.is_empty() || !candidates.iter().any(|c| c.trim() == pinyin) {
                return None;
            }
            context.matches(rule).then_some(pinyin)
        })
    }
}
