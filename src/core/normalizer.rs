// File: src/core/normalizer.rs
use crate::core::types::SpecialCharMode;
use regex::Regex;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

/// Default body of the delete-mode character class.
pub const DEFAULT_ALLOWED_CHARSET: &str = r"a-zA-Z0-9_\-.";

static HAN: OnceLock<Regex> = OnceLock::new();

fn han_regex() -> &'static Regex {
    HAN.get_or_init(|| Regex::new(r"^\p{Han}$").expect("static Han pattern"))
}

/// Whether `c` belongs to the Han script.
pub fn is_han(c: char) -> bool {
    let mut buf = [0u8; 4];
    han_regex().is_match(c.encode_utf8(&mut buf))
}

/// Maps a toned vowel (or syllabic nasal) to its base letter.
fn base_letter(c: char) -> Option<char> {
    match c {
        'ā' | 'á' | 'ǎ' | 'à' => Some('a'),
        'ō' | 'ó' | 'ǒ' | 'ò' => Some('o'),
        'ē' | 'é' | 'ě' | 'è' => Some('e'),
        'ī' | 'í' | 'ǐ' | 'ì' => Some('i'),
        'ū' | 'ú' | 'ǔ' | 'ù' => Some('u'),
        'ü' | 'ǖ' | 'ǘ' | 'ǚ' | 'ǜ' => Some('v'),
        'ń' | 'ň' | 'ǹ' => Some('n'),
        'ḿ' => Some('m'),
        _ => None,
    }
}

/// Removes tone marks. Idempotent: the output never contains a mapped letter.
pub fn strip_tone(pinyin: &str) -> String {
    pinyin
        .chars()
        .map(|c| base_letter(c).unwrap_or(c))
        .collect()
}

/// Collapses whitespace and drops repeated syllables, keeping first-seen order.
///
/// `"xíng  xīng"` stays as is, but its stripped form `"xing xing"` becomes
/// `"xing"`.
pub fn dedupe(phrase: &str) -> String {
    let mut seen = HashSet::new();
    phrase
        .split_whitespace()
        .filter(|token| seen.insert(*token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Order-preserving unique over a candidate list. Empty readings are dropped.
pub fn dedupe_candidates<I>(candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty() && seen.insert(c.clone()))
        .collect()
}

/// First non-blank reading, trimmed.
pub fn first_pinyin(candidates: &[String]) -> Option<&str> {
    candidates
        .iter()
        .map(|c| c.trim())
        .find(|c| !c.is_empty())
}

/// Built-in full-width punctuation map used by replace mode.
pub fn default_punctuation_map() -> HashMap<char, String> {
    [
        ('，', ","),
        ('。', "."),
        ('！', "!"),
        ('？', "?"),
        ('（', "("),
        ('）', ")"),
        ('【', "["),
        ('】', "]"),
        ('、', ","),
        ('；', ";"),
        ('：', ":"),
        ('“', "\""),
        ('”', "\""),
        ('‘', "'"),
        ('’', "'"),
        ('《', "<"),
        ('》', ">"),
    ]
    .into_iter()
    .map(|(c, s)| (c, s.to_string()))
    .collect()
}

/// Handles non-Han characters according to the special-character mode.
pub struct SpecialCharRules {
    default_mode: SpecialCharMode,
    allowed: Regex,
    default_map: HashMap<char, String>,
}

impl SpecialCharRules {
    /// Builds the rules. A malformed allowed-charset falls back to the default
    /// charset instead of failing.
    pub fn new(
        default_mode: SpecialCharMode,
        allowed_charset: &str,
        extra_replacements: &BTreeMap<char, String>,
    ) -> Self {
        let allowed = Regex::new(&format!("^[{allowed_charset}]$")).unwrap_or_else(|e| {
            tracing::warn!(
                pattern = allowed_charset,
                error = %e,
                "invalid allowed charset, using default"
            );
            Regex::new(&format!("^[{DEFAULT_ALLOWED_CHARSET}]$")).expect("static charset pattern")
        });
        let mut default_map = default_punctuation_map();
        default_map.extend(extra_replacements.iter().map(|(c, s)| (*c, s.clone())));
        Self {
            default_mode,
            allowed,
            default_map,
        }
    }

    pub fn default_mode(&self) -> SpecialCharMode {
        self.default_mode
    }

    /// Returns what `c` becomes in the output. Han characters pass through.
    pub fn classify<'a>(
        &'a self,
        c: char,
        mode: Option<SpecialCharMode>,
        custom_map: &'a BTreeMap<char, String>,
    ) -> Cow<'a, str> {
        if is_han(c) {
            return Cow::Owned(c.to_string());
        }
        match mode.unwrap_or(self.default_mode) {
            SpecialCharMode::Keep => Cow::Owned(c.to_string()),
            SpecialCharMode::Delete => {
                let mut buf = [0u8; 4];
                if self.allowed.is_match(c.encode_utf8(&mut buf)) {
                    Cow::Owned(c.to_string())
                } else {
                    Cow::Borrowed("")
                }
            }
            SpecialCharMode::Replace => match custom_map.get(&c).or_else(|| self.default_map.get(&c)) {
                Some(replacement) => Cow::Borrowed(replacement.as_str()),
                None => Cow::Owned(c.to_string()),
            },
        }
    }
}

impl Default for SpecialCharRules {
    fn default() -> Self {
        Self::new(SpecialCharMode::Delete, DEFAULT_ALLOWED_CHARSET, &BTreeMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_tone_is_idempotent() {
        for p in ["zhōng", "lǜ", "nǚ", "ḿ", "ňg", "xíng xīng", "plain", ""] {
            let once = strip_tone(p);
            assert_eq!(strip_tone(&once), once);
        }
        assert_eq!(strip_tone("lǜ"), "lv");
        assert_eq!(strip_tone("zhōng guó"), "zhong guo");
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        assert_eq!(dedupe("xing  xing   hang"), "xing hang");
        assert_eq!(dedupe(&strip_tone("xíng xīng")), "xing");
        let once = dedupe(" a b  a c b ");
        assert_eq!(once, "a b c");
        assert_eq!(dedupe(&once), once);
    }

    #[test]
    fn dedupe_candidates_drops_blanks() {
        let out = dedupe_candidates(vec![
            "hang".to_string(),
            " ".to_string(),
            "xing".to_string(),
            "hang".to_string(),
        ]);
        assert_eq!(out, vec!["hang", "xing"]);
    }

    #[test]
    fn han_detection() {
        assert!(is_han('中'));
        assert!(is_han('㐀'));
        assert!(!is_han('a'));
        assert!(!is_han('，'));
    }

    #[test]
    fn special_char_modes() {
        let rules = SpecialCharRules::default();
        let empty = BTreeMap::new();
        assert_eq!(rules.classify('，', Some(SpecialCharMode::Keep), &empty), "，");
        assert_eq!(rules.classify('，', Some(SpecialCharMode::Delete), &empty), "");
        assert_eq!(rules.classify('a', Some(SpecialCharMode::Delete), &empty), "a");
        assert_eq!(rules.classify('-', Some(SpecialCharMode::Delete), &empty), "-");
        assert_eq!(rules.classify(' ', None, &empty), "");
        assert_eq!(rules.classify('，', Some(SpecialCharMode::Replace), &empty), ",");
        assert_eq!(rules.classify('#', Some(SpecialCharMode::Replace), &empty), "#");
        assert_eq!(rules.classify('中', Some(SpecialCharMode::Delete), &empty), "中");

        let mut custom = BTreeMap::new();
        custom.insert('，', ";".to_string());
        assert_eq!(rules.classify('，', Some(SpecialCharMode::Replace), &custom), ";");
    }

    #[test]
    fn malformed_charset_falls_back() {
        let rules = SpecialCharRules::new(SpecialCharMode::Delete, "z-a[", &BTreeMap::new());
        assert_eq!(rules.classify('x', None, &BTreeMap::new()), "x");
        assert_eq!(rules.classify('!', None, &BTreeMap::new()), "");
    }
}
