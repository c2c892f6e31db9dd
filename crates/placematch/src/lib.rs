//! Placematch - U.S. place-name resolution
//!
//! Placematch turns free-text mentions of U.S. states and cities ("Springfield, IL",
//! "St. Louis", "NYC") into canonical entities. Raw gazetteer records are deduplicated,
//! every name is normalized into lookup keys, and namesakes are ordered by a
//! deterministic ranker that can be steered with a state hint.
//!
//! # Quick Start
//!
//! ```rust
//! use placematch::{Context, Gazetteer, data_processing::{StateCode, test_data}};
//!
//! let gazetteer = Gazetteer::from_records(
//!     &test_data::sample_records(),
//!     &Default::default(),
//!     Default::default(),
//! )?;
//!
//! // Without context, the most populous Springfield wins
//! let results = gazetteer.lookup_city("Springfield", None);
//! assert_eq!(results[0].state_code.as_str(), "MO");
//!
//! // A state hint promotes the namesake in that state
//! let context = Context::for_state(StateCode::new("IL")?);
//! let results = gazetteer.lookup_city("Springfield", Some(&context));
//! assert_eq!(results[0].state_code.as_str(), "IL");
//!
//! // Abbreviations are symmetric
//! assert_eq!(
//!     gazetteer.lookup_city("St. Louis", None),
//!     gazetteer.lookup_city("Saint Louis", None)
//! );
//! # Ok::<(), placematch::error::PlacematchError>(())
//! ```
//!
//! # Persistence
//!
//! Built indexes are saved as versioned JSON documents and loaded back without
//! rebuilding; see [`Gazetteer::save_to_dir`] and [`Gazetteer::load_from_dir`].
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod error;
mod index;
pub mod rank;

pub use core::{Gazetteer, GazetteerBuilder, GazetteerHandle, GazetteerInfo, Resolution};

pub use config::{FuzzyParams, LookupConfig, LookupConfigBuilder};
pub use index::{
    BuildError, BuildViolation, Candidate, CityIndexDef, FormatError, INDEX_FORMAT,
    INDEX_FORMAT_VERSION, IndexBuilder, IndexDefinition, IndexError, NameIndex, StateIndexDef,
    default_index_dir,
};
pub use placematch_data_processing as data_processing;
pub use placematch_data_processing::{
    AliasTable, DedupeConfig, Entity, EntityId, EntityKind, NameNormalizer, RawLocality,
    StateCode,
};
pub use rank::Context;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Placematch library.
///
/// Sets up structured logging; `RUST_LOG` takes precedence over `level` when set.
/// Safe to call more than once, only the first call installs the subscriber.
///
/// ```rust
/// use placematch::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), placematch::error::PlacematchError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::PlacematchError> {
    LOGGER_INIT.get_or_try_init(|| -> Result<(), error::PlacematchError> {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("polars=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}
