// src/core/mod.rs

pub mod cache;
pub mod context;
pub mod dictionary;
pub mod engine;
pub mod normalizer;
pub mod phrase;
pub mod types;
