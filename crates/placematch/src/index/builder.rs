use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashSet;
use chrono::Utc;
use rayon::prelude::*;
use tracing::{info, instrument, warn};

use super::{
    CityIndexDef, IndexDefinition, StateIndexDef,
    error::{BuildError, BuildViolation},
    name_index::{Candidate, NameIndex},
};
use crate::{
    data_processing::{Entity, EntityId, NameNormalizer, StateCode},
    rank,
};

/// Builds name indexes from canonical entities with a fixed normalizer.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    normalizer: NameNormalizer,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(normalizer: NameNormalizer) -> Self {
        Self { normalizer }
    }

    #[must_use]
    pub fn normalizer(&self) -> &NameNormalizer {
        &self.normalizer
    }

    /// State index. Every entity must be a state.
    pub fn build_states(&self, entities: &[Entity]) -> Result<NameIndex, BuildError> {
        let mut violations = wrong_kind(&StateIndexDef, entities);
        let (index, index_violations) = self.build_index(&StateIndexDef, entities);
        violations.extend(index_violations);
        into_result(index, violations)
    }

    /// City index checked against `states`. Every entity must be a city.
    pub fn build_cities(
        &self,
        entities: &[Entity],
        states: &NameIndex,
    ) -> Result<NameIndex, BuildError> {
        let mut violations = wrong_kind(&CityIndexDef, entities);
        let (index, index_violations) = self.build_index(&CityIndexDef, entities);
        violations.extend(index_violations);
        violations.extend(check_pair(states, &index));
        into_result(index, violations)
    }

    /// Both indexes at once; violations from either are reported together.
    #[instrument(name = "Build indexes", skip_all, fields(num_entities = entities.len()), level = "info")]
    pub fn build_pair(&self, entities: &[Entity]) -> Result<(NameIndex, NameIndex), BuildError> {
        let ((states, state_violations), (cities, city_violations)) = rayon::join(
            || self.build_index(&StateIndexDef, entities),
            || self.build_index(&CityIndexDef, entities),
        );
        let mut violations = state_violations;
        violations.extend(city_violations);
        violations.extend(check_pair(&states, &cities));
        if violations.is_empty() {
            Ok((states, cities))
        } else {
            warn!(num_violations = violations.len(), "Index build rejected");
            Err(BuildError { violations })
        }
    }

    #[instrument(name = "Build name index", skip_all, fields(index_name = definition.name()), level = "debug")]
    fn build_index<D: IndexDefinition>(
        &self,
        definition: &D,
        entities: &[Entity],
    ) -> (NameIndex, Vec<BuildViolation>) {
        let mut violations = Vec::new();
        let mut selected: BTreeMap<EntityId, Entity> = BTreeMap::new();
        for entity in entities
            .iter()
            .filter(|e| e.kind == definition.kind() && e.is_canonical())
        {
            if selected.insert(entity.id, entity.clone()).is_some() {
                violations.push(BuildViolation::DuplicateEntityId {
                    id: entity.id,
                    kind: entity.kind,
                });
            }
        }

        let keyed: Vec<(EntityId, BTreeSet<String>)> = selected
            .par_iter()
            .map(|(id, entity)| (*id, self.keys_for(definition, entity)))
            .collect();

        let mut keys: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        for (id, entity_keys) in keyed {
            let entity = &selected[&id];
            if entity_keys.is_empty() {
                violations.push(BuildViolation::UnindexableName {
                    id,
                    name: entity.canonical_name.clone(),
                });
                continue;
            }
            let candidate = Candidate {
                entity_id: id,
                rank_score: rank::rank_score(entity),
            };
            for key in entity_keys {
                keys.entry(key).or_default().push(candidate);
            }
        }
        for candidates in keys.values_mut() {
            candidates.sort_by(|a, b| {
                rank::compare(&selected[&a.entity_id], &selected[&b.entity_id], None)
            });
        }

        info!(
            index = definition.name(),
            num_entities = selected.len(),
            num_keys = keys.len(),
            "Index built"
        );
        let index = NameIndex {
            kind: definition.kind(),
            built_at: Utc::now(),
            normalizer: self.normalizer.clone(),
            entities: selected,
            keys,
        };
        (index, violations)
    }

    fn keys_for<D: IndexDefinition>(&self, definition: &D, entity: &Entity) -> BTreeSet<String> {
        let scope = definition.place_alias_scope();
        definition
            .names_for(entity)
            .iter()
            .flat_map(|name| self.normalizer.normalize_scoped(name, scope))
            .filter(|key| !key.is_empty())
            .collect()
    }
}

/// Everything that must hold between a state index and a city index.
#[must_use]
pub fn check_pair(states: &NameIndex, cities: &NameIndex) -> Vec<BuildViolation> {
    let mut violations = check_shared_ids(states, cities);
    violations.extend(check_state_references(cities, states));
    violations
}

/// Ids held by both a state and a city.
fn check_shared_ids(states: &NameIndex, cities: &NameIndex) -> Vec<BuildViolation> {
    states
        .entities()
        .filter(|state| cities.get(state.id).is_some())
        .map(|state| BuildViolation::SharedEntityId { id: state.id })
        .collect()
}

/// Cities whose state code has no canonical state in `states`.
fn check_state_references(cities: &NameIndex, states: &NameIndex) -> Vec<BuildViolation> {
    let known: AHashSet<&StateCode> = states.entities().map(|s| &s.state_code).collect();
    cities
        .entities()
        .filter(|city| !known.contains(&city.state_code))
        .map(|city| BuildViolation::DanglingStateReference {
            city_id: city.id,
            city_name: city.canonical_name.clone(),
            state_code: city.state_code.clone(),
        })
        .collect()
}

fn wrong_kind<D: IndexDefinition>(definition: &D, entities: &[Entity]) -> Vec<BuildViolation> {
    entities
        .iter()
        .filter(|e| e.kind != definition.kind())
        .map(|e| BuildViolation::WrongKind {
            id: e.id,
            found: e.kind,
            expected: definition.kind(),
        })
        .collect()
}

fn into_result(index: NameIndex, violations: Vec<BuildViolation>) -> Result<NameIndex, BuildError> {
    if violations.is_empty() {
        Ok(index)
    } else {
        warn!(index = %index.kind, num_violations = violations.len(), "Index build rejected");
        Err(BuildError { violations })
    }
}
