//! Collapse gazetteer records that denote the same real-world place.
//!
//! Records are blocked on `(kind, folded name, state)`. Within a block every pair must
//! pass [`is_duplicate`]; a block that does is merged into its most populous member, a
//! block that does not is reported as an integrity conflict. Records in different
//! states never meet, so cross-state namesakes stay distinct.

use std::cmp::Ordering;

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::{
    entity::{Entity, EntityKind, RawLocality, StateCode, SupersededMapping},
    error::{DataError, IntegrityConflict, IntegrityError, Result},
    normalize::fold,
    store::EntityStore,
};

/// Tolerances for the duplicate predicate.
///
/// The defaults are deliberately loose placeholders; tune them against real data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupeConfig {
    /// Maximum relative population difference, `|a - b| / max(a, b)`.
    pub population_tolerance: f64,
    /// Maximum great-circle distance between representative points.
    pub max_distance_km: f64,
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            population_tolerance: 0.10,
            max_distance_km: 5.0,
        }
    }
}

impl DedupeConfig {
    #[must_use]
    pub fn with_population_tolerance(mut self, tolerance: f64) -> Self {
        self.population_tolerance = tolerance;
        self
    }

    #[must_use]
    pub fn with_max_distance_km(mut self, km: f64) -> Self {
        self.max_distance_km = km;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.population_tolerance) {
            return Err(DataError::Config(format!(
                "population_tolerance must be within [0, 1], got {}",
                self.population_tolerance
            )));
        }
        if !self.max_distance_km.is_finite() || self.max_distance_km < 0.0 {
            return Err(DataError::Config(format!(
                "max_distance_km must be a non-negative finite number, got {}",
                self.max_distance_km
            )));
        }
        Ok(())
    }

    fn populations_agree(&self, a: u64, b: u64) -> bool {
        let max = a.max(b);
        max == 0 || (a.abs_diff(b) as f64 / max as f64) <= self.population_tolerance
    }
}

/// Result of a dedupe run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupeOutput {
    /// One canonical entity per real-world place, sorted by id.
    pub entities: Vec<Entity>,
    /// `old_id -> new_id` for every record merged away, sorted by `old_id`.
    pub superseded: Vec<SupersededMapping>,
    /// The merged-away records themselves, with `superseded_by` set. Kept for audit.
    pub retired: Vec<Entity>,
}

impl DedupeOutput {
    /// Collect the output into an [`EntityStore`].
    pub fn into_store(self) -> Result<EntityStore> {
        EntityStore::from_dedupe(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct BlockingKey {
    kind: EntityKind,
    state_code: StateCode,
    name: String,
}

impl BlockingKey {
    fn of(record: &RawLocality) -> Self {
        Self {
            kind: record.kind,
            state_code: record.state_code.clone(),
            name: fold(&record.name),
        }
    }
}

/// Whether two records are the same place.
///
/// Names must match once folded, and then either the populations agree within
/// tolerance, or one of them has no population, or the points are close enough.
/// Total: never fails, NaN coordinates simply never match.
#[must_use]
pub fn is_duplicate(a: &RawLocality, b: &RawLocality, config: &DedupeConfig) -> bool {
    if fold(&a.name) != fold(&b.name) {
        return false;
    }
    let populations_agree = match (a.population, b.population) {
        (Some(pa), Some(pb)) => config.populations_agree(pa, pb),
        _ => true,
    };
    let points_match = match (a.point, b.point) {
        (Some(pa), Some(pb)) => pa.distance_km(&pb) <= config.max_distance_km,
        _ => false,
    };
    populations_agree || points_match
}

/// Survivor order: highest population first (missing last), then lowest id.
fn survivor_order(a: &&RawLocality, b: &&RawLocality) -> Ordering {
    b.population
        .cmp(&a.population)
        .then_with(|| a.id.cmp(&b.id))
}

struct MergedBlock {
    entity: Entity,
    superseded: Vec<SupersededMapping>,
    retired: Vec<Entity>,
}

fn resolve_block(
    key: &BlockingKey,
    mut members: Vec<&RawLocality>,
    config: &DedupeConfig,
) -> std::result::Result<MergedBlock, Vec<IntegrityConflict>> {
    members.sort_by(survivor_order);

    let conflicts: Vec<IntegrityConflict> = members
        .iter()
        .tuple_combinations()
        .filter(|(a, b)| !is_duplicate(a, b, config))
        .map(|(a, b)| {
            let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
            IntegrityConflict::DivergentEvidence {
                kind: key.kind,
                name: first.name.clone(),
                state_code: key.state_code.clone(),
                record_ids: (first.id, second.id),
                populations: (first.population, second.population),
            }
        })
        .collect();
    if !conflicts.is_empty() {
        return Err(conflicts);
    }

    let (survivor, losers) = members
        .split_first()
        .expect("blocks are never empty");
    let mut entity = Entity::from((*survivor).clone());
    let mut superseded = Vec::with_capacity(losers.len());
    let mut retired = Vec::with_capacity(losers.len());

    for loser in losers {
        entity.add_alt_name(&loser.name);
        entity.extend_alt_names(loser.alt_names.iter().map(String::as_str));
        if entity.representative_point.is_none() {
            entity.representative_point = loser.point;
        }
        superseded.push(SupersededMapping {
            old_id: loser.id,
            new_id: survivor.id,
        });
        let mut dead = Entity::from((*loser).clone());
        dead.superseded_by = Some(survivor.id);
        retired.push(dead);
    }

    if !losers.is_empty() {
        debug!(
            survivor = survivor.id,
            merged = losers.len(),
            name = %entity.canonical_name,
            state = %entity.state_code,
            "Merged duplicate block"
        );
    }

    Ok(MergedBlock {
        entity,
        superseded,
        retired,
    })
}

/// Deduplicate raw gazetteer records into canonical entities.
///
/// Deterministic for a given multiset of records: the order they arrive in does not
/// change the survivors, the merged alternate names or the output order. Any conflict
/// fails the whole run with an [`IntegrityError`] listing every offending pair.
#[instrument(name = "Dedupe gazetteer records", skip_all, fields(num_records = records.len()), level = "info")]
pub fn dedupe(records: &[RawLocality], config: &DedupeConfig) -> Result<DedupeOutput> {
    config.validate()?;
    let t_dedupe = std::time::Instant::now();

    let mut seen = HashSet::with_capacity(records.len());
    let mut conflicts: Vec<IntegrityConflict> = records
        .iter()
        .filter(|r| !seen.insert(r.id))
        .map(|r| r.id)
        .sorted_unstable()
        .dedup()
        .map(IntegrityConflict::DuplicateId)
        .collect();

    let mut blocks: HashMap<BlockingKey, Vec<&RawLocality>> = HashMap::new();
    for record in records {
        blocks.entry(BlockingKey::of(record)).or_default().push(record);
    }
    let blocks: Vec<(BlockingKey, Vec<&RawLocality>)> = blocks
        .into_iter()
        .sorted_unstable_by(|a, b| a.0.cmp(&b.0))
        .collect();
    debug!(num_blocks = blocks.len(), "Blocked records");

    let outcomes: Vec<_> = blocks
        .into_par_iter()
        .map(|(key, members)| resolve_block(&key, members, config))
        .collect();

    let mut output = DedupeOutput::default();
    for outcome in outcomes {
        match outcome {
            Ok(merged) => {
                output.entities.push(merged.entity);
                output.superseded.extend(merged.superseded);
                output.retired.extend(merged.retired);
            }
            Err(block_conflicts) => conflicts.extend(block_conflicts),
        }
    }

    if !conflicts.is_empty() {
        warn!(
            num_conflicts = conflicts.len(),
            "Dedupe found conflicting records"
        );
        return Err(IntegrityError { conflicts }.into());
    }

    output.entities.sort_unstable_by_key(|e| e.id);
    output.superseded.sort_unstable();
    output.retired.sort_unstable_by_key(|e| e.id);

    info!(
        num_records = records.len(),
        num_entities = output.entities.len(),
        num_superseded = output.superseded.len(),
        elapsed = ?t_dedupe.elapsed(),
        "Dedupe complete"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::sample_records;

    fn city(id: u64, name: &str, state: &str) -> RawLocality {
        RawLocality::new(id, name, EntityKind::City, state).unwrap()
    }

    #[test]
    fn test_predicate() {
        let config = DedupeConfig::default();
        let a = city(1, "Springfield", "IL").with_population(114_000);
        let b = city(2, "springfield ", "IL").with_population(110_000);
        let c = city(3, "Springfield", "IL").with_population(10_000);
        let d = city(4, "Springfield", "IL");
        assert!(is_duplicate(&a, &b, &config));
        assert!(!is_duplicate(&a, &c, &config));
        assert!(is_duplicate(&a, &d, &config), "missing population never blocks a merge");
        assert!(!is_duplicate(&a, &city(5, "Shelbyville", "IL"), &config));

        let near = c.clone().with_point(39.78, -89.65);
        let a_near = a.clone().with_point(39.80, -89.64);
        assert!(is_duplicate(&a_near, &near, &config), "close points override population");
        let nan = a.clone().with_point(f64::NAN, f64::NAN);
        assert!(!is_duplicate(&nan, &near, &config));
    }

    #[test]
    fn test_population_tolerance_boundary() {
        let config = DedupeConfig::default();
        let big = city(1, "Dayton", "OH").with_population(100_000);
        let at_limit = city(2, "Dayton", "OH").with_population(90_000);
        let past_limit = city(3, "Dayton", "OH").with_population(89_999);
        assert!(is_duplicate(&big, &at_limit, &config), "a 10% gap is still a match");
        assert!(!is_duplicate(&big, &past_limit, &config));
        assert!(is_duplicate(
            &city(4, "Nowhere", "OH").with_population(0),
            &city(5, "Nowhere", "OH").with_population(0),
            &config
        ));
    }

    #[test]
    fn test_agreeing_populations_merge_despite_distance() {
        let config = DedupeConfig::default();
        let east = city(1, "Springfield", "IL")
            .with_population(114_000)
            .with_point(39.78, -89.65);
        let west = city(2, "Springfield", "IL")
            .with_population(113_000)
            .with_point(41.0, -91.0);
        assert!(east.point.unwrap().distance_km(&west.point.unwrap()) > config.max_distance_km);
        assert!(is_duplicate(&east, &west, &config));

        let out = dedupe(&[east, west], &config).unwrap();
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.superseded, vec![SupersededMapping { old_id: 2, new_id: 1 }]);
    }

    #[test]
    fn test_merge_picks_most_populous_survivor() {
        let records = vec![
            city(10, "Springfield", "IL")
                .with_population(110_000)
                .with_alt_names(["Springfield City"]),
            city(7, "SPRINGFIELD", "IL").with_point(39.78, -89.65),
            city(12, "Springfield", "IL").with_population(114_000),
        ];
        let out = dedupe(&records, &DedupeConfig::default()).unwrap();

        assert_eq!(out.entities.len(), 1);
        let entity = &out.entities[0];
        assert_eq!(entity.id, 12);
        assert_eq!(entity.population, Some(114_000));
        assert!(entity.alt_names().contains("SPRINGFIELD"));
        assert!(entity.alt_names().contains("Springfield City"));
        assert_eq!(entity.representative_point.map(|p| p.lat), Some(39.78));
        assert_eq!(
            out.superseded,
            vec![
                SupersededMapping { old_id: 7, new_id: 12 },
                SupersededMapping { old_id: 10, new_id: 12 },
            ]
        );
        assert!(out.retired.iter().all(|e| e.superseded_by == Some(12)));
    }

    #[test]
    fn test_ties_go_to_lowest_id() {
        let records = vec![city(9, "Salem", "OR"), city(4, "Salem", "OR")];
        let out = dedupe(&records, &DedupeConfig::default()).unwrap();
        assert_eq!(out.entities[0].id, 4);
        assert_eq!(out.superseded, vec![SupersededMapping { old_id: 9, new_id: 4 }]);
    }

    #[test]
    fn test_cross_state_and_cross_kind_never_merge() {
        let records = vec![
            city(1, "Springfield", "IL").with_population(114_000),
            city(2, "Springfield", "MO").with_population(150_000),
            RawLocality::new(3, "New York", EntityKind::State, "NY").unwrap(),
            city(4, "New York", "NY").with_population(8_000_000),
        ];
        let out = dedupe(&records, &DedupeConfig::default()).unwrap();
        assert_eq!(out.entities.len(), 4);
        assert!(out.superseded.is_empty());
    }

    #[test]
    fn test_conflicting_block_is_integrity_error() {
        let records = vec![
            city(1, "Franklin", "TN")
                .with_population(80_000)
                .with_point(35.92, -86.87),
            city(2, "Franklin", "TN")
                .with_population(500)
                .with_point(36.37, -85.11),
            city(3, "Clinton", "TN").with_population(10_000),
            city(4, "Clinton", "TN").with_population(900),
        ];
        let err = dedupe(&records, &DedupeConfig::default()).unwrap_err();
        let DataError::Integrity(err) = err else {
            panic!("expected integrity error, got {err:?}");
        };
        assert_eq!(err.conflicts.len(), 2, "all conflicts are reported together");
        assert_eq!(err.record_ids(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_block_reports_only_the_conflicting_pair() {
        // 1~2 and 2~3 agree within 10%, 1 and 3 do not
        let records = vec![
            city(1, "Jackson", "MS").with_population(100_000),
            city(2, "Jackson", "MS").with_population(95_000),
            city(3, "Jackson", "MS").with_population(86_000),
        ];
        let err = dedupe(&records, &DedupeConfig::default()).unwrap_err();
        let DataError::Integrity(err) = err else {
            panic!("expected integrity error, got {err:?}");
        };
        assert_eq!(err.conflicts.len(), 1);
        assert!(matches!(
            &err.conflicts[0],
            IntegrityConflict::DivergentEvidence { record_ids: (1, 3), .. }
        ));
        assert_eq!(err.record_ids(), vec![1, 3]);
    }

    #[test]
    fn test_duplicate_raw_ids_are_reported() {
        let records = vec![city(1, "Dover", "DE"), city(1, "Dover", "NH")];
        let err = dedupe(&records, &DedupeConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            DataError::Integrity(IntegrityError { ref conflicts })
                if conflicts == &[IntegrityConflict::DuplicateId(1)]
        ));
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let config = DedupeConfig::default();
        let first = dedupe(&sample_records(), &config).unwrap();
        assert!(!first.superseded.is_empty(), "fixture should contain duplicates");

        let again: Vec<RawLocality> = first.entities.iter().map(RawLocality::from).collect();
        let second = dedupe(&again, &config).unwrap();
        assert_eq!(second.entities, first.entities);
        assert!(second.superseded.is_empty());
    }

    #[test]
    fn test_deterministic_under_reordering() {
        let config = DedupeConfig::default();
        let records = sample_records();
        let mut reversed = records.clone();
        reversed.reverse();
        let mut rotated = records.clone();
        rotated.rotate_left(records.len() / 3);

        let baseline = dedupe(&records, &config).unwrap();
        assert_eq!(dedupe(&reversed, &config).unwrap(), baseline);
        assert_eq!(dedupe(&rotated, &config).unwrap(), baseline);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DedupeConfig::default().with_population_tolerance(1.5);
        assert!(matches!(dedupe(&[], &config), Err(DataError::Config(_))));
        let config = DedupeConfig::default().with_max_distance_km(f64::NAN);
        assert!(config.validate().is_err());
    }
}
