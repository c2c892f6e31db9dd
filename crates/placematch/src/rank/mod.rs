//! Disambiguation between entities that share a name.
//!
//! One ordering is used everywhere: at build time to pre-order each key's candidate
//! list, and at query time to re-rank a union of candidate lists under a caller's
//! [`Context`].
//!
//! 1. candidates in the hinted state come first;
//! 2. then higher population (missing counts as zero);
//! 3. then lower id, so the order is total and reproducible.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::data_processing::{Entity, StateCode};

/// Optional query-time hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    /// Prefer (or, with [`filter`], require) candidates in this state.
    pub state_code: Option<StateCode>,
    /// Only consulted by [`filter`]: drop candidates below this population.
    pub min_population: Option<u64>,
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn for_state(state_code: StateCode) -> Self {
        Self {
            state_code: Some(state_code),
            min_population: None,
        }
    }

    #[must_use]
    pub fn with_state(mut self, state_code: StateCode) -> Self {
        self.state_code = Some(state_code);
        self
    }

    #[must_use]
    pub fn with_min_population(mut self, population: u64) -> Self {
        self.min_population = Some(population);
        self
    }

    fn promotes(&self, entity: &Entity) -> bool {
        self.state_code
            .as_ref()
            .is_some_and(|code| &entity.state_code == code)
    }

    fn admits(&self, entity: &Entity) -> bool {
        self.state_code
            .as_ref()
            .is_none_or(|code| &entity.state_code == code)
            && self
                .min_population
                .is_none_or(|floor| entity.rank_population() >= floor)
    }
}

/// Score stored next to each candidate in the index.
#[must_use]
pub fn rank_score(entity: &Entity) -> u64 {
    entity.rank_population()
}

/// Total order over candidates; `Less` means "ranks higher".
#[must_use]
pub fn compare(a: &Entity, b: &Entity, context: Option<&Context>) -> Ordering {
    let promoted = |e: &Entity| context.is_some_and(|c| c.promotes(e));
    promoted(b)
        .cmp(&promoted(a))
        .then_with(|| b.rank_population().cmp(&a.rank_population()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Order candidates best first, dropping repeats of the same id.
pub fn rank<'a, I>(candidates: I, context: Option<&Context>) -> Vec<&'a Entity>
where
    I: IntoIterator<Item = &'a Entity>,
{
    let mut ranked: Vec<&Entity> = candidates.into_iter().collect();
    ranked.sort_by(|a, b| compare(a, b, context));
    ranked.dedup_by_key(|e| e.id);
    ranked
}

/// Hard post-step: keep only candidates in the hinted state and above the floor.
/// Order is preserved.
#[must_use]
pub fn filter<'a>(mut ranked: Vec<&'a Entity>, context: &Context) -> Vec<&'a Entity> {
    ranked.retain(|e| context.admits(e));
    ranked
}
