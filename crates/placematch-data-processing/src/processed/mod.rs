//! Post-ingestion processing: turning raw gazetteer records into canonical entities.

pub mod dedupe;

pub use dedupe::{DedupeConfig, DedupeOutput, dedupe, is_duplicate};
