// src/services/mod.rs
pub mod analyzer;
pub mod media_processor;
pub mod store;

pub use analyzer::{Analyzer, GeminiService};
pub use media_processor::MediaProcessor;
pub use store::{MemoryStore, RedisStore, ScanStore};
