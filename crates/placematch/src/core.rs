//! The [`Gazetteer`]: a paired state and city index with one query surface.
//!
//! ```rust
//! use placematch::{Gazetteer, LookupConfig, data_processing::test_data};
//!
//! let gazetteer = Gazetteer::from_records(
//!     &test_data::sample_records(),
//!     &Default::default(),
//!     Default::default(),
//! )?;
//!
//! let best = gazetteer.lookup_city("Springfield", None);
//! assert_eq!(best[0].state_code.as_str(), "MO");
//!
//! let resolved = gazetteer.resolve("Springfield, IL", &LookupConfig::default());
//! assert_eq!(resolved.best().map(|e| e.state_code.as_str()), Some("IL"));
//! # Ok::<(), placematch::error::PlacematchError>(())
//! ```

use std::{
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use crate::{
    config::LookupConfig,
    data_processing::{
        DedupeConfig, Entity, EntityKind, EntityStore, NameNormalizer, RawLocality, dedupe,
        read_raw_records,
    },
    error::{PlacematchError, Result},
    index::{
        CityIndexDef, IndexBuilder, IndexDefinition, NameIndex, StateIndexDef, default_index_dir,
    },
    rank::Context,
};

/// Read-only lookup service over a state index and a city index.
#[derive(Debug, Clone, PartialEq)]
pub struct Gazetteer {
    states: NameIndex,
    cities: NameIndex,
}

/// Best reading of a free-text mention such as `"Springfield, IL"`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resolution<'a> {
    /// State named explicitly (after the last comma) or matched by the whole mention.
    pub state: Option<&'a Entity>,
    /// Ranked city candidates, best first.
    pub cities: Vec<&'a Entity>,
}

impl<'a> Resolution<'a> {
    /// Top city if any, otherwise the state.
    #[must_use]
    pub fn best(&self) -> Option<&'a Entity> {
        self.cities.first().copied().or(self.state)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.cities.is_empty()
    }
}

impl Gazetteer {
    /// Index canonical entities. Superseded entities are skipped.
    pub fn build(entities: &[Entity], builder: &IndexBuilder) -> Result<Self> {
        let (states, cities) = builder.build_pair(entities)?;
        Ok(Self { states, cities })
    }

    /// Deduplicate raw records, then index the survivors.
    #[instrument(name = "Build Gazetteer from records", skip_all, fields(num_records = records.len()), level = "info")]
    pub fn from_records(
        records: &[RawLocality],
        dedupe_config: &DedupeConfig,
        normalizer: NameNormalizer,
    ) -> Result<Self> {
        let output = dedupe(records, dedupe_config)?;
        info!(
            survivors = output.entities.len(),
            superseded = output.superseded.len(),
            "Deduplication finished"
        );
        let store = EntityStore::from_dedupe(output)?;
        Self::from_store(&store, &IndexBuilder::new(normalizer))
    }

    /// Index every entity in a store, retired ones included so they are skipped
    /// rather than silently lost.
    pub fn from_store(store: &EntityStore, builder: &IndexBuilder) -> Result<Self> {
        let entities: Vec<Entity> = store.iter_all().cloned().collect();
        Self::build(&entities, builder)
    }

    /// Read a raw TSV export, deduplicate and index it.
    pub fn from_raw_file(
        path: impl AsRef<Path>,
        dedupe_config: &DedupeConfig,
        normalizer: NameNormalizer,
    ) -> Result<Self> {
        let records = read_raw_records(path)?;
        Self::from_records(&records, dedupe_config, normalizer)
    }

    /// Pair two already built indexes.
    pub fn from_components(states: NameIndex, cities: NameIndex) -> Result<Self> {
        if states.kind() != EntityKind::State || cities.kind() != EntityKind::City {
            return Err(anyhow::anyhow!(
                "expected state and city indexes, got {} and {}",
                states.kind(),
                cities.kind()
            )
            .into());
        }
        let violations = crate::index::check_pair(&states, &cities);
        if !violations.is_empty() {
            return Err(crate::index::BuildError { violations }.into());
        }
        Ok(Self { states, cities })
    }

    /// Write both indexes into `dir`.
    #[instrument(name = "Save Gazetteer", skip_all, fields(dir = ?dir.as_ref()), level = "info")]
    pub fn save_to_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        self.states.save(dir.join(StateIndexDef.file_name()))?;
        self.cities.save(dir.join(CityIndexDef.file_name()))?;
        Ok(())
    }

    /// Load both indexes from `dir`.
    #[instrument(name = "Load Gazetteer", fields(dir = ?dir.as_ref()), skip(dir), level = "info")]
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let states = NameIndex::load(dir.join(StateIndexDef.file_name()), EntityKind::State)?;
        let cities = NameIndex::load(dir.join(CityIndexDef.file_name()), EntityKind::City)?;
        Self::from_components(states, cities)
    }

    /// `None` when `dir` holds no saved indexes; errors if they exist but are bad.
    pub fn load_existing(dir: impl AsRef<Path>) -> Result<Option<Self>> {
        let dir = dir.as_ref();
        if Self::indexes_exist(dir) {
            Self::load_from_dir(dir).map(Some)
        } else {
            info!(dir = ?dir, "No existing indexes found");
            Ok(None)
        }
    }

    #[must_use]
    pub fn indexes_exist(dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        dir.join(StateIndexDef.file_name()).is_file() && dir.join(CityIndexDef.file_name()).is_file()
    }

    pub fn save_default(&self) -> Result<()> {
        self.save_to_dir(default_index_dir())
    }

    pub fn load_default() -> Result<Self> {
        Self::load_from_dir(default_index_dir())
    }

    #[must_use]
    pub fn states(&self) -> &NameIndex {
        &self.states
    }

    #[must_use]
    pub fn cities(&self) -> &NameIndex {
        &self.cities
    }

    #[must_use]
    pub fn info(&self) -> GazetteerInfo {
        GazetteerInfo {
            num_states: self.states.len(),
            num_cities: self.cities.len(),
            num_keys: self.states.num_keys() + self.cities.num_keys(),
            built_at: self.states.built_at().max(self.cities.built_at()),
        }
    }

    #[must_use]
    pub fn lookup_state(&self, query: &str, context: Option<&Context>) -> Vec<&Entity> {
        self.states.lookup(query, context)
    }

    #[must_use]
    pub fn lookup_city(&self, query: &str, context: Option<&Context>) -> Vec<&Entity> {
        self.cities.lookup(query, context)
    }

    #[must_use]
    pub fn lookup_state_with_config(&self, query: &str, config: &LookupConfig) -> Vec<&Entity> {
        self.states.lookup_with_config(query, config)
    }

    #[must_use]
    pub fn lookup_city_with_config(&self, query: &str, config: &LookupConfig) -> Vec<&Entity> {
        self.cities.lookup_with_config(query, config)
    }

    /// Resolve a mention like `"Springfield, IL"`, `"Portland"` or `"Texas"`.
    ///
    /// Text after the last comma is tried as a state; when it names one, that state
    /// becomes the context hint for the city part. Otherwise the whole mention is
    /// looked up as a city and as a state.
    #[must_use]
    #[instrument(name = "Resolve mention", skip(self, config), level = "debug")]
    pub fn resolve(&self, mention: &str, config: &LookupConfig) -> Resolution<'_> {
        if let Some((head, tail)) = mention.rsplit_once(',')
            && let Some(state) = self.states.lookup(tail, None).first().copied()
        {
            let mut city_config = config.clone();
            city_config
                .context
                .get_or_insert_with(Context::default)
                .state_code = Some(state.state_code.clone());
            let mut cities = self.cities.lookup_with_config(head, &city_config);
            if cities.is_empty() {
                cities = self.cities.lookup_with_config(mention, config);
            }
            return Resolution {
                state: Some(state),
                cities,
            };
        }

        let cities = self.cities.lookup_with_config(mention, config);
        let state = self.states.lookup_with_config(mention, config).first().copied();
        if cities.is_empty() && state.is_none() {
            warn!(mention, "Mention did not resolve");
        }
        Resolution { state, cities }
    }

    /// [`Gazetteer::resolve`] over many mentions in parallel; output order matches input.
    #[instrument(name = "Resolve mentions", skip_all, fields(num_mentions = mentions.len()), level = "info")]
    pub fn resolve_bulk<S>(&self, mentions: &[S], config: &LookupConfig) -> Vec<Resolution<'_>>
    where
        S: AsRef<str> + Sync,
    {
        mentions
            .par_iter()
            .map(|m| self.resolve(m.as_ref(), config))
            .collect()
    }
}

/// Summary of what a [`Gazetteer`] holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GazetteerInfo {
    pub num_states: usize,
    pub num_cities: usize,
    pub num_keys: usize,
    pub built_at: DateTime<Utc>,
}

impl GazetteerInfo {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Gazetteer with {} states and {} cities under {} name keys (built {})",
            self.num_states,
            self.num_cities,
            self.num_keys,
            self.built_at.to_rfc3339()
        )
    }
}

/// Shared, swappable [`Gazetteer`].
///
/// Readers take a snapshot and keep using it while a rebuilt gazetteer is swapped
/// in; they never see a half-replaced one.
#[derive(Debug, Clone)]
pub struct GazetteerHandle {
    current: Arc<RwLock<Arc<Gazetteer>>>,
}

impl GazetteerHandle {
    #[must_use]
    pub fn new(gazetteer: Gazetteer) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(gazetteer))),
        }
    }

    /// The gazetteer in service right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Gazetteer> {
        // Only whole `Arc`s are ever stored, so a poisoned lock still holds a valid value.
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Put `gazetteer` in service and return the one it replaced.
    #[instrument(name = "Swap Gazetteer", skip_all, level = "info")]
    pub fn swap(&self, gazetteer: Gazetteer) -> Arc<Gazetteer> {
        let next = Arc::new(gazetteer);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        info!(summary = next.info().summary(), "Gazetteer swapped");
        std::mem::replace(&mut *guard, next)
    }
}

impl From<Gazetteer> for GazetteerHandle {
    fn from(gazetteer: Gazetteer) -> Self {
        Self::new(gazetteer)
    }
}

/// Builder for loading or building a [`Gazetteer`] from a raw export.
#[derive(Debug, Clone, Default)]
pub struct GazetteerBuilder {
    normalizer: NameNormalizer,
    dedupe_config: DedupeConfig,
    index_dir: Option<PathBuf>,
    force_rebuild: bool,
}

impl GazetteerBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn normalizer(mut self, normalizer: NameNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    #[must_use]
    pub fn dedupe_config(mut self, config: DedupeConfig) -> Self {
        self.dedupe_config = config;
        self
    }

    /// Where indexes are cached; defaults to [`default_index_dir`].
    #[must_use]
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    /// Ignore cached indexes and rebuild from the raw export.
    #[must_use]
    pub fn force_rebuild(mut self, rebuild: bool) -> Self {
        self.force_rebuild = rebuild;
        self
    }

    /// Load cached indexes when present (and built with the same normalizer),
    /// otherwise build from `raw_path` and cache the result.
    #[instrument(name = "Initialize Gazetteer", skip(self, raw_path), fields(raw_path = ?raw_path.as_ref()), level = "info")]
    pub fn build(self, raw_path: impl AsRef<Path>) -> Result<Gazetteer> {
        let index_dir = self.index_dir.clone().unwrap_or_else(default_index_dir);
        if !self.force_rebuild {
            match Gazetteer::load_existing(&index_dir) {
                Ok(Some(gazetteer))
                    if gazetteer.states.normalizer() == &self.normalizer
                        && gazetteer.cities.normalizer() == &self.normalizer =>
                {
                    info!(summary = gazetteer.info().summary(), "Loaded cached indexes");
                    return Ok(gazetteer);
                }
                Ok(Some(_)) => info!("Cached indexes use a different normalizer, rebuilding"),
                Ok(None) => {}
                Err(PlacematchError::Format(e)) => {
                    warn!(error = %e, "Cached indexes unreadable, rebuilding");
                }
                Err(e) => return Err(e),
            }
        }
        let gazetteer = Gazetteer::from_raw_file(raw_path, &self.dedupe_config, self.normalizer)?;
        gazetteer.save_to_dir(&index_dir)?;
        Ok(gazetteer)
    }
}
