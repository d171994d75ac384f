use pinyin_core::config::TableFile;
use pinyin_core::{EngineConfig, PinyinEngine, SkipReason, ToneVariant};
use std::fs;
use tempfile::TempDir;

// Slots 2, 4, 5 and 6 are U+4E02 丂, U+4E04 丄, U+4E05 丅 and U+4E06 丆.
const RARE_NO_TONE: &str = r#"{
    "offset": 0,
    "version": 0,
    "entries": [[], [], ["kao"], [], ["shang"], ["xia"], ["han"]]
}"#;

const RARE_WITH_TONE: &str = r#"{
    "offset": 0,
    "version": 0,
    "entries": [[], [], ["kǎo"], [], ["shàng"], ["xià"], ["hǎn"]]
}"#;

fn fixture(threshold: usize, max_per_merge: usize, cooldown_secs: u64) -> (TempDir, EngineConfig) {
    let dir = TempDir::new().unwrap();
    let mut config = EngineConfig::with_data_dir(dir.path());
    config.merge.threshold = threshold;
    config.merge.max_per_merge = max_per_merge;
    config.merge.cooldown_secs = cooldown_secs;
    config.merge.backup_before_merge = false;
    fs::write(config.dict.path(TableFile::CommonNoTone), r#"{"中": "zhong"}"#).unwrap();
    fs::write(config.dict.path(TableFile::RareNoTone), RARE_NO_TONE).unwrap();
    fs::write(config.dict.path(TableFile::RareWithTone), RARE_WITH_TONE).unwrap();
    (dir, config)
}

/// Converts `text` `times` times, varying the separator so the cache never
/// answers.
fn use_char(engine: &PinyinEngine, text: &str, times: usize) {
    for i in 0..times {
        engine.convert(text, &"/".repeat(i + 1), false);
    }
}

fn no_tone_skip(report: &pinyin_core::MergeReport) -> Option<&SkipReason> {
    report
        .skipped
        .iter()
        .find(|s| s.variant == ToneVariant::NoTone)
        .map(|s| &s.reason)
}

#[test]
fn rare_character_is_learned_at_zero_then_counted() {
    let (_dir, config) = fixture(1000, 500, 0);
    let engine = PinyinEngine::new(config).unwrap();

    assert_eq!(engine.convert("丂", " ", false), "kao");
    assert!(engine.is_self_learned(ToneVariant::NoTone, "丂"));
    assert_eq!(engine.frequency(ToneVariant::NoTone, "丂"), Some(0));

    engine.convert("丂", "-", false);
    assert_eq!(engine.frequency(ToneVariant::NoTone, "丂"), Some(1));

    // Answered from the cache, so not counted.
    engine.convert("丂", "-", false);
    assert_eq!(engine.frequency(ToneVariant::NoTone, "丂"), Some(1));

    // Tone variants learn independently.
    assert!(!engine.is_self_learned(ToneVariant::WithTone, "丂"));
    assert_eq!(engine.convert("丂", " ", true), "kǎo");
    assert_eq!(engine.frequency(ToneVariant::WithTone, "丂"), Some(0));
}

#[test]
fn common_characters_are_not_learned() {
    let (_dir, config) = fixture(1000, 500, 0);
    let engine = PinyinEngine::new(config).unwrap();
    engine.convert("中", " ", false);
    assert!(!engine.is_self_learned(ToneVariant::NoTone, "中"));
    assert_eq!(engine.stats(ToneVariant::NoTone).pending, 0);
}

#[test]
fn merge_is_a_no_op_below_threshold() {
    let (_dir, config) = fixture(3, 500, 0);
    let engine = PinyinEngine::new(config).unwrap();
    use_char(&engine, "丂丄", 1);

    let report = engine.execute_merge();
    assert!(report.succeeded.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(
        no_tone_skip(&report),
        Some(&SkipReason::BelowThreshold { count: 2, threshold: 3 })
    );
    assert_eq!(engine.stats(ToneVariant::NoTone).self_learned, 2);
    assert!(engine.pending_merges().is_empty());
}

#[test]
fn merge_moves_the_most_frequent_overflow() {
    let (_dir, config) = fixture(2, 500, 0);
    let engine = PinyinEngine::new(config).unwrap();
    use_char(&engine, "丂", 1);
    use_char(&engine, "丄", 2);
    use_char(&engine, "丅", 3);
    assert_eq!(engine.pending_merges(), vec![ToneVariant::NoTone]);

    let report = engine.execute_merge();
    assert_eq!(report.succeeded.len(), 1);
    let outcome = &report.succeeded[0];
    assert_eq!(outcome.variant, ToneVariant::NoTone);
    // Three learned, threshold two: 3 - 2 + 1 move.
    assert_eq!(outcome.merged, vec!["丅".to_string(), "丄".to_string()]);

    let stats = engine.stats(ToneVariant::NoTone);
    assert_eq!(stats.self_learned, 1);
    assert_eq!(stats.common, 3);
    assert_eq!(stats.rare, 2);
    assert!(engine.is_self_learned(ToneVariant::NoTone, "丂"));
    assert_eq!(engine.frequency(ToneVariant::NoTone, "丅"), None);

    // Merged characters now come from common; untouched rare slots still resolve.
    assert_eq!(engine.convert("丅丄", " ", false), "xia shang");
    assert_eq!(engine.convert("丆", " ", false), "han");
}

#[test]
fn merge_respects_max_per_merge() {
    let (_dir, config) = fixture(1, 1, 0);
    let engine = PinyinEngine::new(config).unwrap();
    use_char(&engine, "丂", 1);
    use_char(&engine, "丄", 3);
    use_char(&engine, "丅", 2);

    let report = engine.execute_merge();
    assert_eq!(report.succeeded[0].merged, vec!["丄".to_string()]);
    assert_eq!(engine.stats(ToneVariant::NoTone).self_learned, 2);
}

#[test]
fn non_incremental_merge_takes_everything() {
    let (_dir, mut config) = fixture(2, 1, 0);
    config.merge.incremental = false;
    let engine = PinyinEngine::new(config).unwrap();
    use_char(&engine, "丂丄丅", 1);

    let report = engine.execute_merge();
    assert_eq!(report.succeeded[0].merged.len(), 3);
    assert_eq!(engine.stats(ToneVariant::NoTone).self_learned, 0);
    assert_eq!(engine.stats(ToneVariant::NoTone).common, 4);
}

#[test]
fn cooldown_survives_restart() {
    let (_dir, config) = fixture(1, 500, 3600);
    let engine = PinyinEngine::new(config.clone()).unwrap();
    use_char(&engine, "丂", 1);
    assert_eq!(engine.execute_merge().succeeded.len(), 1);

    use_char(&engine, "丄", 1);
    let report = engine.execute_merge();
    assert!(matches!(no_tone_skip(&report), Some(SkipReason::CoolingDown { .. })));
    engine.close().unwrap();

    let reopened = PinyinEngine::new(config).unwrap();
    assert!(reopened.is_self_learned(ToneVariant::NoTone, "丄"));
    assert!(reopened.pending_merges().is_empty());
    let report = reopened.execute_merge();
    assert!(matches!(no_tone_skip(&report), Some(SkipReason::CoolingDown { .. })));
}

#[test]
fn merge_writes_backups_when_enabled() {
    let (dir, mut config) = fixture(1, 500, 0);
    config.merge.backup_before_merge = true;
    let engine = PinyinEngine::new(config).unwrap();
    use_char(&engine, "丂", 1);
    engine.execute_merge();

    let names: Vec<String> = fs::read_dir(dir.path().join("backup"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert!(names.iter().any(|n| n.starts_with("common_no_tone.")));
    assert!(names.iter().any(|n| n.starts_with("self_learn_no_tone.")));
}

#[test]
fn failed_variant_does_not_block_the_other() {
    let (_dir, config) = fixture(1, 500, 0);
    let engine = PinyinEngine::new(config.clone()).unwrap();
    use_char(&engine, "丂", 1);
    engine.convert("丄", " ", true);

    // A directory where the no-tone common table should be makes its save fail.
    let common = config.dict.path(TableFile::CommonNoTone);
    fs::remove_file(&common).unwrap();
    fs::create_dir(&common).unwrap();

    let report = engine.execute_merge();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].variant, ToneVariant::NoTone);
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(report.succeeded[0].variant, ToneVariant::WithTone);

    // The failed variant is left as it was.
    assert!(engine.is_self_learned(ToneVariant::NoTone, "丂"));
    assert!(!engine.is_self_learned(ToneVariant::WithTone, "丄"));
}

#[test]
fn concurrent_merges_keep_both_timestamps() {
    let (dir, config) = fixture(1, 500, 0);
    let engine = PinyinEngine::new(config).unwrap();
    use_char(&engine, "丂", 1);
    engine.convert("丄", " ", true);

    std::thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| engine.execute_merge());
        }
    });
    assert_eq!(engine.stats(ToneVariant::NoTone).self_learned, 0);
    assert_eq!(engine.stats(ToneVariant::WithTone).self_learned, 0);

    let state: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("merge_state.json")).unwrap()).unwrap();
    assert!(state["with_tone"].as_u64().unwrap() > 0);
    assert!(state["no_tone"].as_u64().unwrap() > 0);
}
