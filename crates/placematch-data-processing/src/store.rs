//! In-memory home of canonical and retired entities after deduplication.

use std::collections::BTreeMap;

use crate::{
    entity::{Entity, EntityId, EntityKind, SupersededMapping},
    error::{IntegrityConflict, IntegrityError, Result},
    processed::DedupeOutput,
};

/// Every entity produced by one dedupe run, keyed by id.
///
/// Default iteration only sees canonical records; retired ones stay reachable through
/// [`EntityStore::get`] and [`EntityStore::iter_all`] for audit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityStore {
    records: BTreeMap<EntityId, Entity>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dedupe(output: DedupeOutput) -> Result<Self> {
        let mut store = Self::new();
        for entity in output.entities.into_iter().chain(output.retired) {
            store.insert(entity)?;
        }
        Ok(store)
    }

    /// Add a record. Ids are never reused, so a second record with the same id fails.
    pub fn insert(&mut self, entity: Entity) -> Result<()> {
        if self.records.contains_key(&entity.id) {
            return Err(IntegrityError {
                conflicts: vec![IntegrityConflict::DuplicateId(entity.id)],
            }
            .into());
        }
        self.records.insert(entity.id, entity);
        Ok(())
    }

    /// Any record, canonical or retired.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.records.get(&id)
    }

    /// The canonical record `id` ended up in, following `superseded_by` links.
    #[must_use]
    pub fn resolve(&self, id: EntityId) -> Option<&Entity> {
        let mut current = self.records.get(&id)?;
        // a chain can never be longer than the store; anything longer is a cycle
        for _ in 0..self.records.len() {
            match current.superseded_by {
                None => return Some(current),
                Some(next) => current = self.records.get(&next)?,
            }
        }
        None
    }

    /// Canonical records, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.records.values().filter(|e| e.is_canonical())
    }

    /// Canonical and retired records, ordered by id.
    pub fn iter_all(&self) -> impl Iterator<Item = &Entity> {
        self.records.values()
    }

    pub fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.iter().filter(move |e| e.kind == kind)
    }

    pub fn states(&self) -> impl Iterator<Item = &Entity> {
        self.of_kind(EntityKind::State)
    }

    pub fn cities(&self) -> impl Iterator<Item = &Entity> {
        self.of_kind(EntityKind::City)
    }

    /// Number of canonical records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn superseded_mappings(&self) -> Vec<SupersededMapping> {
        self.records
            .values()
            .filter_map(|e| {
                e.superseded_by.map(|new_id| SupersededMapping {
                    old_id: e.id,
                    new_id,
                })
            })
            .collect()
    }

    /// Owned copies of the canonical records, ready for index building.
    #[must_use]
    pub fn canonical_entities(&self) -> Vec<Entity> {
        self.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{processed::DedupeConfig, processed::dedupe, test_data::sample_records};

    fn store() -> EntityStore {
        dedupe(&sample_records(), &DedupeConfig::default())
            .unwrap()
            .into_store()
            .unwrap()
    }

    #[test]
    fn test_default_iteration_skips_retired() {
        let store = store();
        assert!(store.iter().all(Entity::is_canonical));
        assert!(store.iter_all().count() > store.len());
        assert_eq!(
            store.states().count() + store.cities().count(),
            store.len()
        );
    }

    #[test]
    fn test_resolve_follows_supersession() {
        let store = store();
        for mapping in store.superseded_mappings() {
            let retired = store.get(mapping.old_id).unwrap();
            assert_eq!(retired.superseded_by, Some(mapping.new_id));
            assert_eq!(store.resolve(mapping.old_id).unwrap().id, mapping.new_id);
        }
        assert!(store.resolve(u64::MAX).is_none());
    }

    #[test]
    fn test_ids_are_never_reused() {
        let mut store = store();
        let existing = store.iter().next().unwrap().clone();
        assert!(store.insert(existing).is_err());
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let code = crate::entity::StateCode::new("IL").unwrap();
        let mut a = Entity::new(1, EntityKind::City, "A", code.clone());
        let mut b = Entity::new(2, EntityKind::City, "B", code);
        a.superseded_by = Some(2);
        b.superseded_by = Some(1);
        let mut store = EntityStore::new();
        store.insert(a).unwrap();
        store.insert(b).unwrap();
        assert!(store.resolve(1).is_none());
        assert!(store.is_empty());
    }
}
