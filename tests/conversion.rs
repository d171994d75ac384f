use pinyin_core::config::TableFile;
use pinyin_core::{
    ConvertOptions, EngineConfig, PinyinEngine, PolyphoneRule, RuleKind, SpecialCharConfig, SpecialCharMode,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const COMMON_NO_TONE: &str = r#"{
    "中": "zhōng", "国": "guó", "银": "yín", "行": ["xíng", "háng"], "动": "dòng",
    "长": ["cháng", "zhǎng"], "大": "dà", "度": "dù", "好": ["hǎo", "hào"], "去": "qù"
}"#;

const COMMON_WITH_TONE: &str = r#"{"中": "zhōng", "国": "guó", "好": ["hǎo", "hào"]}"#;

fn fixture() -> (TempDir, EngineConfig) {
    let dir = TempDir::new().unwrap();
    let config = EngineConfig::with_data_dir(dir.path());
    fs::write(config.dict.path(TableFile::CommonNoTone), COMMON_NO_TONE).unwrap();
    fs::write(config.dict.path(TableFile::CommonWithTone), COMMON_WITH_TONE).unwrap();
    let shipped_rules = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/polyphone_rules.json");
    fs::copy(shipped_rules, config.dict.path(TableFile::PolyphoneRules)).unwrap();
    (dir, config)
}

fn engine() -> (TempDir, PinyinEngine) {
    let (dir, config) = fixture();
    (dir, PinyinEngine::new(config).unwrap())
}

#[test]
fn polyphones_follow_context() {
    let (_dir, engine) = engine();
    assert_eq!(engine.convert("银行", " ", false), "yin hang");
    assert_eq!(engine.convert("行动", " ", false), "xing dong");
    assert_eq!(engine.convert("长大", " ", false), "zhang da");
    assert_eq!(engine.convert("长度", " ", false), "chang du");
    // Same input, same answer.
    assert_eq!(engine.convert("长大", " ", false), "zhang da");
}

#[test]
fn custom_entry_beats_common() {
    let (_dir, engine) = engine();
    assert_eq!(engine.convert("好", " ", true), "hǎo");
    engine.add_custom_pinyin("好", "hào", true).unwrap();
    assert_eq!(engine.convert("好", " ", true), "hào");
    // The other variant is untouched.
    assert_eq!(engine.convert("好", " ", false), "hao");
}

#[test]
fn longest_custom_word_wins() {
    let (_dir, engine) = engine();
    engine.add_custom_pinyin("行", "xxx", false).unwrap();
    engine.add_custom_pinyin("银行", "yin hang", false).unwrap();
    assert_eq!(engine.convert("银行", " ", false), "yin hang");
    assert_eq!(engine.convert("行", " ", false), "xxx");
    assert_eq!(engine.convert("去银行", "-", false), "qu-yin-hang");
    let keep = ConvertOptions::default()
        .separator("-")
        .special_chars(SpecialCharConfig::with_mode(SpecialCharMode::Keep));
    assert_eq!(engine.convert_with("去银行", &keep), "qu-yin hang");

    engine
        .add_custom_readings("中国银行", vec!["zhong guo yin hang".into()], false)
        .unwrap();
    assert_eq!(engine.convert("中国银行行", " ", false), "zhong guo yin hang xxx");
}

#[test]
fn custom_words_keep_repeated_syllables() {
    let (_dir, engine) = engine();
    engine.add_custom_pinyin("谢谢", "xie xie", false).unwrap();
    engine
        .add_custom_readings("妈妈", vec!["ma".into(), "ma".into()], false)
        .unwrap();
    assert_eq!(engine.convert("谢谢", " ", false), "xie xie");
    assert_eq!(engine.convert("妈妈", " ", false), "ma ma");
    assert_eq!(engine.convert("妈妈谢谢", "-", false), "ma-ma-xie-xie");
}

#[test]
fn removed_custom_word_falls_back_to_rules() {
    let (_dir, engine) = engine();
    engine.add_custom_pinyin("银行", "bank", false).unwrap();
    assert_eq!(engine.convert("银行", " ", false), "bank");
    assert!(engine.remove_custom_pinyin("银行", false).unwrap());
    assert_eq!(engine.convert("银行", " ", false), "yin hang");
    assert!(!engine.remove_custom_pinyin("银行", false).unwrap());
}

#[test]
fn empty_keys_are_rejected() {
    let (_dir, engine) = engine();
    assert!(engine.add_custom_pinyin("", "x", false).is_err());
    assert!(engine.remove_custom_pinyin(" ", false).is_err());
}

#[test]
fn cache_never_mixes_parameters() {
    let (_dir, engine) = engine();
    let text = "中，国";
    let plain = engine.convert(text, " ", false);
    assert_eq!(plain, "zhong guo");
    assert_eq!(engine.convert(text, " ", false), plain);
    assert_eq!(engine.convert(text, "-", false), "zhong-guo");
    assert_eq!(engine.convert(text, " ", true), "zhōng guó");

    let keep = ConvertOptions::default().special_chars(SpecialCharConfig::with_mode(SpecialCharMode::Keep));
    let replace = ConvertOptions::default().special_chars(SpecialCharConfig::with_mode(SpecialCharMode::Replace));
    assert_eq!(engine.convert_with(text, &keep), "zhong ， guo");
    assert_eq!(engine.convert_with(text, &replace), "zhong , guo");
    assert_eq!(engine.cache_stats().hits, 1);
}

#[test]
fn empty_input() {
    let (_dir, engine) = engine();
    assert_eq!(engine.convert("", " ", false), "");
    assert_eq!(engine.url_slug("", "-"), "");
}

#[test]
fn punctuation_only_input() {
    let (_dir, engine) = engine();
    let with_mode = |mode| ConvertOptions::default().special_chars(SpecialCharConfig::with_mode(mode));
    assert_eq!(engine.convert_with("，。！", &with_mode(SpecialCharMode::Delete)), "");
    assert_eq!(engine.convert_with("，。！", &with_mode(SpecialCharMode::Keep)), "，。！");
    assert_eq!(engine.convert_with("，。！", &with_mode(SpecialCharMode::Replace)), ",.!");

    let custom = ConvertOptions::default().special_chars(
        SpecialCharConfig::with_mode(SpecialCharMode::Replace).replace('！', "?"),
    );
    assert_eq!(engine.convert_with("，。！", &custom), ",.?");
}

#[test]
fn unknown_mode_name_uses_default() {
    let (_dir, engine) = engine();
    let options = ConvertOptions::default().special_chars(SpecialCharConfig::parse("shout"));
    assert_eq!(engine.convert_with("中！", &options), "zhong");
}

#[test]
fn separators_between_han_and_other_text() {
    let (_dir, engine) = engine();
    assert_eq!(engine.convert("hello中国", " ", false), "hello zhong guo");
    assert_eq!(engine.convert("中国123", " ", false), "zhong guo 123");
    assert_eq!(engine.convert("a中b", "_", false), "a_zhong_b");
}

#[test]
fn url_slugs() {
    let (_dir, engine) = engine();
    assert_eq!(engine.url_slug("Hello 中国！", "-"), "hello-zhong-guo");
    assert_eq!(engine.url_slug("中--国", "-"), "zhong-guo");
    assert_eq!(engine.url_slug("-银行-", "-"), "yin-hang");
    assert_eq!(engine.url_slug("中国", "_"), "zhong_guo");

    engine.add_custom_pinyin("银行", "yín háng", false).unwrap();
    assert_eq!(engine.url_slug("去银行", "-"), "qu-yin-hang");
    assert_eq!(engine.url_slug("去 银行!", "_"), "qu_yin_hang");
}

#[test]
fn temp_map_overrides_everything() {
    let (_dir, engine) = engine();
    engine.add_custom_pinyin("行", "custom", false).unwrap();
    let options = ConvertOptions::default().temp('行', "háng");
    assert_eq!(engine.convert_with("行动", &options), "hang dong");

    let toned = ConvertOptions::default().with_tone(true).temp('中', "zhòng");
    assert_eq!(engine.convert_with("中国", &toned), "zhòng guó");
}

#[test]
fn unknown_characters_stay_literal() {
    let (_dir, engine) = engine();
    assert_eq!(engine.convert("中龘", " ", false), "zhong 龘");
}

#[test]
fn added_rule_changes_reading_and_persists() {
    let (_dir, config) = fixture();
    let engine = PinyinEngine::new(config.clone()).unwrap();
    assert_eq!(engine.convert("长度", " ", false), "chang du");

    engine
        .add_polyphone_rule('长', PolyphoneRule::new(RuleKind::Word, "长度", "zhǎng"))
        .unwrap();
    assert_eq!(engine.convert("长度", " ", false), "zhang du");
    assert!(engine
        .add_polyphone_rule('长', PolyphoneRule::new(RuleKind::Word, "", "zhǎng"))
        .is_err());
    drop(engine);

    let reopened = PinyinEngine::new(config).unwrap();
    assert_eq!(reopened.convert("长度", " ", false), "zhang du");
}

#[test]
fn custom_rule_file_is_consulted_first() {
    let (_dir, config) = fixture();
    fs::write(
        config.dict.path(TableFile::PolyphoneCustom),
        r#"{"行": [{"type": "word", "target": "银行", "pinyin": "xíng"}]}"#,
    )
    .unwrap();
    let engine = PinyinEngine::new(config).unwrap();
    assert_eq!(engine.convert("银行", " ", false), "yin xing");
}

#[test]
fn priority_index_applies_without_rule() {
    let (_dir, mut config) = fixture();
    config.polyphone_priority.insert('长', 1);
    let engine = PinyinEngine::new(config).unwrap();
    assert_eq!(engine.convert("长度", " ", false), "zhang du");
    assert_eq!(engine.convert("长", " ", false), "zhang");
}

#[test]
fn shared_across_threads() {
    let (_dir, engine) = engine();
    let engine = Arc::new(engine);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                let sep = "-".repeat(i + 1);
                engine.convert("长大行动", &sep, false)
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let sep = "-".repeat(i + 1);
        assert_eq!(handle.join().unwrap(), ["zhang", "da", "xing", "dong"].join(&sep));
    }
}
