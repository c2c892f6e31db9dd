use crate::{
    data_processing::StateCode,
    error::{PlacematchError, Result},
    rank::Context,
};

/// Parameters for the approximate-match fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyParams {
    /// Normalized Levenshtein similarity (0..=1) a key must reach to match.
    pub min_similarity: f64,
}

impl Default for FuzzyParams {
    fn default() -> Self {
        Self {
            min_similarity: 0.85,
        }
    }
}

/// Per-query lookup options.
///
/// The default is exact matching, soft state preference and no limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupConfig {
    pub context: Option<Context>,
    /// Drop candidates that do not satisfy the context instead of demoting them.
    pub strict_state: bool,
    pub limit: Option<usize>,
    /// Only consulted when no exact key matches.
    pub fuzzy: Option<FuzzyParams>,
}

impl LookupConfig {
    #[must_use]
    pub fn builder() -> LookupConfigBuilder {
        LookupConfigBuilder::new()
    }
}

/// Builder for creating lookup configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct LookupConfigBuilder {
    config: LookupConfig,
}

impl LookupConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the single best match, with no fallback.
    #[must_use]
    pub fn best_only() -> Self {
        Self::new().limit(1)
    }

    /// Exact matching first, then typo-tolerant matching.
    #[must_use]
    pub fn lenient() -> Self {
        let mut builder = Self::new();
        builder.config.fuzzy = Some(FuzzyParams::default());
        builder
    }

    /// Prefer candidates in this state.
    #[must_use]
    pub fn state_hint(mut self, state_code: StateCode) -> Self {
        self.context_mut().state_code = Some(state_code);
        self
    }

    /// Like [`LookupConfigBuilder::state_hint`] but parses a postal code such as `"IL"`.
    pub fn state_code(self, code: &str) -> Result<Self> {
        Ok(self.state_hint(StateCode::new(code)?))
    }

    /// Minimum population; only applied together with [`LookupConfigBuilder::strict_state`].
    #[must_use]
    pub fn population_floor(mut self, population: u64) -> Self {
        self.context_mut().min_population = Some(population);
        self
    }

    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.config.context = Some(context);
        self
    }

    #[must_use]
    pub fn strict_state(mut self, strict: bool) -> Self {
        self.config.strict_state = strict;
        self
    }

    /// Set the maximum number of results to return
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = Some(limit);
        self
    }

    /// Enable the fuzzy fallback with the given similarity threshold.
    pub fn fuzzy(mut self, min_similarity: f64) -> Result<Self> {
        if !(min_similarity > 0.0 && min_similarity <= 1.0) {
            return Err(PlacematchError::ConfigError(format!(
                "fuzzy similarity must be in (0, 1], got {min_similarity}"
            )));
        }
        self.config.fuzzy = Some(FuzzyParams { min_similarity });
        Ok(self)
    }

    #[must_use]
    pub fn exact_only(mut self) -> Self {
        self.config.fuzzy = None;
        self
    }

    /// Build the final configuration
    #[must_use]
    pub fn build(self) -> LookupConfig {
        self.config
    }

    fn context_mut(&mut self) -> &mut Context {
        self.config.context.get_or_insert_with(Context::default)
    }
}
