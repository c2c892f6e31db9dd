//! Name indexes over canonical entities.
//!
//! One [`NameIndex`] exists per [`EntityKind`]. Each maps every normalized variant of
//! an entity's names to a candidate list pre-ordered by the disambiguation ranker.
//! What gets indexed for a kind is decided by an [`IndexDefinition`].

mod builder;
mod name_index;
mod persist;

pub use builder::IndexBuilder;
pub use builder::check_pair;
pub use error::{BuildError, BuildViolation, FormatError, IndexError};
pub use name_index::{Candidate, NameIndex};
pub use persist::{INDEX_FORMAT, INDEX_FORMAT_VERSION, default_index_dir};

use crate::data_processing::{Entity, EntityKind, PlaceAliasScope, fold, states::state_name};

/// Describes which entities and which names go into an index.
pub trait IndexDefinition: std::fmt::Debug + Send + Sync + 'static {
    /// Unique name for this index, used in logs.
    fn name(&self) -> &'static str;

    /// Entity kind this index holds.
    fn kind(&self) -> EntityKind;

    /// File name used when the index is saved into a directory.
    fn file_name(&self) -> &'static str;

    /// Raw (un-normalized) names under which `entity` should be findable.
    fn names_for(&self, entity: &Entity) -> Vec<String>;

    /// Where postal-code aliases apply to this index's keys and queries.
    fn place_alias_scope(&self) -> PlaceAliasScope {
        PlaceAliasScope::WholeOrTrailing
    }
}

/// Alias scope of the index holding `kind`.
#[must_use]
pub fn place_alias_scope(kind: EntityKind) -> PlaceAliasScope {
    match kind {
        EntityKind::State => StateIndexDef.place_alias_scope(),
        EntityKind::City => CityIndexDef.place_alias_scope(),
    }
}

/// States, territories and DC. Findable by any name and by postal code.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateIndexDef;

impl IndexDefinition for StateIndexDef {
    fn name(&self) -> &'static str {
        "state_names"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::State
    }

    fn file_name(&self) -> &'static str {
        "us_states.json"
    }

    fn names_for(&self, entity: &Entity) -> Vec<String> {
        entity
            .names()
            .map(str::to_owned)
            .chain(std::iter::once(entity.state_code.to_string()))
            .collect()
    }
}

/// Cities. Findable by any name, alone or qualified with the state's code or name
/// ("Springfield IL", "Springfield Illinois"). Names that fold to nothing are not
/// qualified, so a bare state qualifier never becomes a city key. Postal-code aliases
/// only rewrite the qualifier: a city called "LA" is not filed under "louisiana".
#[derive(Debug, Clone, Copy, Default)]
pub struct CityIndexDef;

impl IndexDefinition for CityIndexDef {
    fn name(&self) -> &'static str {
        "city_names"
    }

    fn kind(&self) -> EntityKind {
        EntityKind::City
    }

    fn file_name(&self) -> &'static str {
        "us_cities.json"
    }

    fn place_alias_scope(&self) -> PlaceAliasScope {
        PlaceAliasScope::TrailingOnly
    }

    fn names_for(&self, entity: &Entity) -> Vec<String> {
        let code = entity.state_code.as_str();
        let full_state = state_name(&entity.state_code);
        entity
            .names()
            .filter(|name| !fold(name).is_empty())
            .flat_map(|name| {
                [
                    Some(name.to_owned()),
                    Some(format!("{name} {code}")),
                    full_state.map(|state| format!("{name} {state}")),
                ]
            })
            .flatten()
            .collect()
    }
}

mod error {
    use std::fmt;

    use itertools::Itertools;
    use thiserror::Error;

    use crate::data_processing::{EntityId, EntityKind, StateCode};

    /// One reason an entity set cannot be indexed.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum BuildViolation {
        /// A city refers to a state code with no canonical state entity.
        DanglingStateReference {
            city_id: EntityId,
            city_name: String,
            state_code: StateCode,
        },
        /// Two canonical entities of the same kind share an id.
        DuplicateEntityId { id: EntityId, kind: EntityKind },
        /// A state and a city share an id.
        SharedEntityId { id: EntityId },
        /// None of the entity's names survive normalization.
        UnindexableName { id: EntityId, name: String },
        /// A per-kind build was handed an entity of another kind.
        WrongKind {
            id: EntityId,
            found: EntityKind,
            expected: EntityKind,
        },
    }

    impl fmt::Display for BuildViolation {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::DanglingStateReference {
                    city_id,
                    city_name,
                    state_code,
                } => write!(
                    f,
                    "city {city_id} ({city_name}) references unknown state {state_code}"
                ),
                Self::DuplicateEntityId { id, kind } => {
                    write!(f, "{kind} id {id} appears more than once")
                }
                Self::SharedEntityId { id } => {
                    write!(f, "id {id} is used by both a state and a city")
                }
                Self::UnindexableName { id, name } => {
                    write!(f, "entity {id} has no indexable name (canonical {name:?})")
                }
                Self::WrongKind {
                    id,
                    found,
                    expected,
                } => write!(f, "entity {id} is a {found}, expected a {expected}"),
            }
        }
    }

    /// Every violation found while building, reported together.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub struct BuildError {
        pub violations: Vec<BuildViolation>,
    }

    impl BuildError {
        /// Ids of cities whose state could not be found.
        #[must_use]
        pub fn dangling_city_ids(&self) -> Vec<EntityId> {
            self.violations
                .iter()
                .filter_map(|v| match v {
                    BuildViolation::DanglingStateReference { city_id, .. } => Some(*city_id),
                    _ => None,
                })
                .collect()
        }
    }

    impl fmt::Display for BuildError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{} build violation(s): {}",
                self.violations.len(),
                self.violations.iter().join("; ")
            )
        }
    }

    /// A serialized index that cannot be loaded.
    #[derive(Error, Debug)]
    pub enum FormatError {
        #[error("could not read index file: {0}")]
        Io(#[from] std::io::Error),
        #[error("index file is corrupt: {0}")]
        Corrupt(#[from] serde_json::Error),
        #[error("not a placematch index (format tag {0:?})")]
        WrongFormat(Option<String>),
        #[error("unsupported index version {found:?}, expected {expected}")]
        VersionMismatch { found: Option<u64>, expected: u32 },
        #[error("index holds {found} entities, expected {expected}")]
        KindMismatch {
            found: EntityKind,
            expected: EntityKind,
        },
        #[error("index file is inconsistent: {0}")]
        Inconsistent(String),
    }

    /// Failures while writing an index.
    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Serialization error: {0}")]
        Serialize(#[from] serde_json::Error),
        #[error("Could not move index into place: {0}")]
        Persist(#[from] tempfile::PersistError),
        #[error("Entity {0} has a non-finite or out-of-range point")]
        InvalidPoint(EntityId),
    }
}
