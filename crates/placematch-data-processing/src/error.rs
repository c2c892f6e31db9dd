use std::fmt;

use polars::prelude::PolarsError;
use thiserror::Error;

use crate::entity::{EntityId, EntityKind, StateCode};

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
    #[error("Invalid state code {0:?}: expected two ASCII letters")]
    InvalidStateCode(String),
    #[error("Unknown record kind {0:?}")]
    UnknownKind(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A single piece of conflicting evidence found while deduplicating.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrityConflict {
    /// Two records share a blocking key but disagree on both population and location.
    DivergentEvidence {
        kind: EntityKind,
        name: String,
        state_code: StateCode,
        record_ids: (EntityId, EntityId),
        populations: (Option<u64>, Option<u64>),
    },
    /// The same raw id was supplied more than once.
    DuplicateId(EntityId),
}

impl fmt::Display for IntegrityConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DivergentEvidence {
                kind,
                name,
                state_code,
                record_ids: (a, b),
                populations: (pa, pb),
            } => write!(
                f,
                "{kind} {name:?} ({state_code}): records {a} and {b} disagree on population ({pa:?} vs {pb:?}) and location"
            ),
            Self::DuplicateId(id) => write!(f, "record id {id} supplied more than once"),
        }
    }
}

/// Every conflict found during one dedupe run. Never partially applied.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct IntegrityError {
    pub conflicts: Vec<IntegrityConflict>,
}

impl IntegrityError {
    /// Ids of every record involved in a conflict, sorted and unique.
    #[must_use]
    pub fn record_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .conflicts
            .iter()
            .flat_map(|c| match c {
                IntegrityConflict::DivergentEvidence {
                    record_ids: (a, b), ..
                } => vec![*a, *b],
                IntegrityConflict::DuplicateId(id) => vec![*id],
            })
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Integrity error: {} conflicting record group(s)",
            self.conflicts.len()
        )?;
        for conflict in &self.conflicts {
            write!(f, "\n  - {conflict}")?;
        }
        Ok(())
    }
}
