use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rapidfuzz::distance::levenshtein;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    config::{FuzzyParams, LookupConfig},
    data_processing::{Entity, EntityId, EntityKind, NameNormalizer},
    rank::{self, Context},
};

/// One entry in a key's candidate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub entity_id: EntityId,
    pub rank_score: u64,
}

/// Normalized name key -> ranked candidates, for one entity kind.
///
/// Immutable once built; share it freely across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct NameIndex {
    pub(super) kind: EntityKind,
    pub(super) built_at: DateTime<Utc>,
    pub(super) normalizer: NameNormalizer,
    pub(super) entities: BTreeMap<EntityId, Entity>,
    pub(super) keys: BTreeMap<String, Vec<Candidate>>,
}

impl NameIndex {
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Normalizer used to produce the keys. Queries go through the same one.
    #[must_use]
    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Indexed entities, by id.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[must_use]
    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    /// Pre-ranked candidates stored under an already normalized key.
    #[must_use]
    pub fn candidates(&self, key: &str) -> &[Candidate] {
        self.keys.get(key).map_or(&[], Vec::as_slice)
    }

    /// Ranked canonical entities whose names match `query`, best first.
    ///
    /// Returns an empty list for blank or unknown queries; never errors.
    #[must_use]
    pub fn lookup(&self, query: &str, context: Option<&Context>) -> Vec<&Entity> {
        let config = LookupConfig {
            context: context.cloned(),
            ..LookupConfig::default()
        };
        self.lookup_with_config(query, &config)
    }

    /// [`NameIndex::lookup`] with strict filtering, a result limit and an optional
    /// fuzzy fallback.
    #[must_use]
    #[instrument(name = "Name lookup", skip_all, level = "debug", fields(index = %self.kind, query = query))]
    pub fn lookup_with_config(&self, query: &str, config: &LookupConfig) -> Vec<&Entity> {
        let query_keys: BTreeSet<String> = self
            .normalizer
            .normalize_scoped(query, super::place_alias_scope(self.kind))
            .into_iter()
            .filter(|key| !key.is_empty())
            .collect();
        if query_keys.is_empty() {
            return Vec::new();
        }

        let mut ids = self.exact_candidate_ids(&query_keys);
        if ids.is_empty()
            && let Some(params) = config.fuzzy
        {
            ids = self.fuzzy_candidate_ids(&query_keys, params);
        }

        let context = config.context.as_ref();
        let mut ranked = rank::rank(
            ids.iter()
                .filter_map(|id| self.entities.get(id))
                .filter(|e| e.is_canonical()),
            context,
        );
        if config.strict_state
            && let Some(context) = context
        {
            ranked = rank::filter(ranked, context);
        }
        if let Some(limit) = config.limit {
            ranked.truncate(limit);
        }
        debug!(num_results = ranked.len(), "Lookup complete");
        ranked
    }

    fn exact_candidate_ids(&self, query_keys: &BTreeSet<String>) -> BTreeSet<EntityId> {
        query_keys
            .iter()
            .flat_map(|key| self.candidates(key))
            .map(|c| c.entity_id)
            .collect()
    }

    /// Candidates of the best-scoring keys at or above the similarity threshold.
    fn fuzzy_candidate_ids(
        &self,
        query_keys: &BTreeSet<String>,
        params: FuzzyParams,
    ) -> BTreeSet<EntityId> {
        let scored: Vec<(f64, &Vec<Candidate>)> = self
            .keys
            .par_iter()
            .filter_map(|(key, candidates)| {
                let score = query_keys
                    .iter()
                    .map(|q| levenshtein::normalized_similarity(q.chars(), key.chars()))
                    .fold(0.0, f64::max);
                (score >= params.min_similarity).then_some((score, candidates))
            })
            .collect();

        let best = scored.iter().map(|(score, _)| *score).fold(0.0, f64::max);
        debug!(matched_keys = scored.len(), best, "Fuzzy fallback");
        scored
            .into_iter()
            .filter(|(score, _)| (best - score).abs() < f64::EPSILON)
            .flat_map(|(_, candidates)| candidates.iter().map(|c| c.entity_id))
            .collect()
    }
}
