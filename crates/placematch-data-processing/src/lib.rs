//! Gazetteer ingestion, name normalization and deduplication.
//!
//! This crate turns raw gazetteer records into the canonical [`Entity`] set the
//! `placematch` index is built from:
//!
//! ```rust
//! use placematch_data_processing::{DedupeConfig, dedupe, test_data::sample_records};
//!
//! let output = dedupe(&sample_records(), &DedupeConfig::default())?;
//! let store = output.into_store()?;
//! assert!(store.iter().all(|e| e.superseded_by.is_none()));
//! # Ok::<(), placematch_data_processing::DataError>(())
//! ```
use once_cell::sync::Lazy;
use std::path::PathBuf;
use tracing::debug;

pub mod entity;
mod error;
pub mod normalize;
pub mod processed;
pub mod raw;
pub mod states;
pub mod store;
pub mod test_data;

pub const DATA_DIR_DEFAULT: &str = "./placematch_data";

/// Global data directory path.
///
/// `$DATA_DIR` wins; otherwise the platform data directory when the `system-dirs`
/// feature is on, else [`DATA_DIR_DEFAULT`].
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(dir) = std::env::var("DATA_DIR") {
        return PathBuf::from(dir);
    }
    #[cfg(feature = "system-dirs")]
    {
        if let Some(dirs) = directories::ProjectDirs::from("", "", "placematch") {
            return dirs.data_dir().to_path_buf();
        }
    }
    PathBuf::from(DATA_DIR_DEFAULT)
});

#[must_use]
pub fn get_data_dir() -> PathBuf {
    let dir = DATA_DIR.clone();
    debug!(data_dir = ?dir, "Resolved data directory");
    dir
}

pub use entity::{Entity, EntityId, EntityKind, Point, RawLocality, StateCode, SupersededMapping};
pub use error::{DataError, IntegrityConflict, IntegrityError, Result};
pub use normalize::{AliasTable, NameNormalizer, PlaceAliasScope, fold};
pub use processed::{DedupeConfig, DedupeOutput, dedupe, is_duplicate};
pub use raw::read_raw_records;
pub use store::EntityStore;
