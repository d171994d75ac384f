// src/lib.rs

pub mod config;
pub mod core;
pub mod errors;
pub mod learning;
pub mod persistence;

pub use crate::config::EngineConfig;
pub use crate::core::cache::CacheStats;
pub use crate::core::engine::PinyinEngine;
pub use crate::core::types::{
    ConvertOptions, DictionaryStats, MergeReport, PolyphoneRule, RuleKind, SkipReason, SpecialCharConfig,
    SpecialCharMode, ToneVariant,
};
pub use crate::errors::{PinyinError, Result};
