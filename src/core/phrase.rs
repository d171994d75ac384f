// --- File: src/core/phrase.rs
use crate::core::types::Candidates;
use crate::persistence::KeyedTable;

/// A piece of input after the multi-word pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// An untouched input character, resolved later on its own.
    Char(char),
    /// Pinyin already substituted for a custom multi-character word.
    Phrase(String),
}

#[derive(Debug, Clone)]
struct Phrase {
    chars: Vec<char>,
    candidates: Candidates,
}

/// Custom entries longer than one character, longest first.
///
/// Rebuilt from the custom table after every mutation of that table.
#[derive(Debug, Clone, Default)]
pub struct PhraseIndex {
    phrases: Vec<Phrase>,
}

impl PhraseIndex {
    pub fn build(custom: &KeyedTable) -> Self {
        let mut phrases: Vec<Phrase> = custom
            .iter()
            .filter_map(|(word, candidates)| {
                let chars: Vec<char> = word.chars().collect();
                (chars.len() > 1 && !candidates.is_empty()).then(|| Phrase {
                    chars,
                    candidates: candidates.clone(),
                })
            })
            .collect();
        // Stable, so equal-length words keep table order.
        phrases.sort_by_key(|p| std::cmp::Reverse(p.chars.len()));
        Self { phrases }
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    /// Replaces every occurrence of a custom word with its pinyin.
    ///
    /// Words are applied longest first and a source position is substituted at
    /// most once, so a shorter word can never match inside (or across) a span
    /// already taken by a longer one.
    pub fn substitute(&self, text: &str, separator: &str) -> Vec<Segment> {
        let chars: Vec<char> = text.chars().collect();
        let n = chars.len();
        let mut consumed = vec![false; n];
        let mut spans: Vec<Option<(usize, String)>> = vec![None; n];

        for phrase in &self.phrases {
            let len = phrase.chars.len();
            if len > n {
                continue;
            }
            let mut i = 0;
            while i + len <= n {
                let free = !consumed[i..i + len].iter().any(|&c| c);
                if free && chars[i..i + len] == phrase.chars[..] {
                    consumed[i..i + len].iter_mut().for_each(|c| *c = true);
                    spans[i] = Some((len, phrase.candidates.join(separator)));
                    i += len;
                } else {
                    i += 1;
                }
            }
        }

        let mut segments = Vec::with_capacity(n);
        let mut i = 0;
        while i < n {
            match spans[i].take() {
                Some((len, pinyin)) => {
                    segments.push(Segment::Phrase(pinyin));
                    i += len;
                }
                None => {
                    segments.push(Segment::Char(chars[i]));
                    i += 1;
                }
            }
        }
        segments
    }
}
