//! Name normalization shared by deduplication, index building and lookup.
//!
//! [`fold`] gives the single canonical spelling of a name, used as the dedupe blocking
//! key. [`NameNormalizer::normalize`] expands that spelling into every lookup key the
//! alias table implies.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

mod aliases;

pub use aliases::{AliasPair, AliasTable};

static APOSTROPHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"['\u{2018}\u{2019}`]").expect("apostrophe pattern is valid"));
static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}\s-]+").expect("punctuation pattern is valid"));
static HYPHEN_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-{2,}").expect("hyphen pattern is valid"));

/// Fold a raw name to its canonical spelling.
///
/// Strips diacritics and case, deletes apostrophes, turns other punctuation into spaces
/// (keeping hyphens that sit between two word characters) and collapses whitespace.
///
/// ```
/// use placematch_data_processing::normalize::fold;
///
/// assert_eq!(fold("  St. Louis "), "st louis");
/// assert_eq!(fold("Coeur d'Alène"), "coeur dalene");
/// assert_eq!(fold("Wilkes-Barre"), "wilkes-barre");
/// assert_eq!(fold("Cook Co., IL"), "cook co il");
/// ```
#[must_use]
pub fn fold(raw: &str) -> String {
    let stripped: String = raw
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    let stripped = APOSTROPHES.replace_all(&stripped, "");
    let stripped = NON_WORD.replace_all(&stripped, " ");

    stripped
        .split_whitespace()
        .map(|token| HYPHEN_RUNS.replace_all(token.trim_matches('-'), "-"))
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where postal-code style place aliases may fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaceAliasScope {
    /// A whole key or its trailing tokens: "il" and "springfield il" both expand.
    #[default]
    WholeOrTrailing,
    /// Only trailing tokens that follow a name: "springfield il" expands, "il" does not.
    TrailingOnly,
}

/// Maps raw names to the set of keys they are indexed and queried under.
///
/// The alias table is data: swap it with [`NameNormalizer::new`] without touching the
/// algorithm. It is serialized with every index so lookups normalize exactly like the
/// build did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameNormalizer {
    aliases: AliasTable,
}

impl NameNormalizer {
    #[must_use]
    pub fn new(aliases: AliasTable) -> Self {
        Self { aliases }
    }

    #[must_use]
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// All lookup keys for `raw`. Never empty: input that folds to nothing yields `{""}`,
    /// which callers are expected to reject.
    ///
    /// ```
    /// use placematch_data_processing::normalize::NameNormalizer;
    ///
    /// let keys = NameNormalizer::default().normalize("St. Louis");
    /// assert!(keys.contains("st louis"));
    /// assert!(keys.contains("saint louis"));
    /// ```
    #[must_use]
    pub fn normalize(&self, raw: &str) -> BTreeSet<String> {
        self.normalize_scoped(raw, PlaceAliasScope::default())
    }

    /// [`NameNormalizer::normalize`] with an explicit [`PlaceAliasScope`].
    #[must_use]
    pub fn normalize_scoped(&self, raw: &str, scope: PlaceAliasScope) -> BTreeSet<String> {
        let base = fold(raw);
        if base.is_empty() {
            return BTreeSet::from([base]);
        }
        self.aliases.expand(&base, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_punctuation_and_whitespace() {
        assert_eq!(fold("NEW   YORK"), "new york");
        assert_eq!(fold("O'Fallon"), "ofallon");
        assert_eq!(fold("Winston–Salem"), "winston salem");
        assert_eq!(fold("Winston-Salem"), "winston-salem");
        assert_eq!(fold("- Hyphen -- Town -"), "hyphen town");
        assert_eq!(fold("Foo--Bar"), "foo-bar");
        assert_eq!(fold("Cañon City"), fold("Canon City"));
        assert_eq!(fold("?!."), "");
        assert_eq!(fold(""), "");
    }

    #[test]
    fn test_normalize_is_pure() {
        let normalizer = NameNormalizer::default();
        assert_eq!(
            normalizer.normalize("Mt. Vernon"),
            normalizer.normalize("Mt. Vernon")
        );
    }

    #[test]
    fn test_normalize_empty_yields_single_empty_key() {
        let normalizer = NameNormalizer::default();
        assert_eq!(normalizer.normalize("   ...  "), BTreeSet::from([String::new()]));
    }

    #[test]
    fn test_normalize_alias_symmetry() {
        let normalizer = NameNormalizer::default();
        assert_eq!(
            normalizer.normalize("St. Louis"),
            normalizer.normalize("Saint Louis")
        );
        assert_eq!(
            normalizer.normalize("Fort Worth"),
            normalizer.normalize("Ft Worth")
        );
    }

    #[test]
    fn test_normalize_state_suffix() {
        let normalizer = NameNormalizer::default();
        let keys = normalizer.normalize("Springfield, IL");
        assert!(keys.contains("springfield il"));
        assert!(keys.contains("springfield illinois"));

        let keys = normalizer.normalize("Illinois");
        assert!(keys.contains("il"));
    }

    #[test]
    fn test_scoped_normalize_keeps_bare_state_names() {
        let normalizer = NameNormalizer::default();
        let keys = normalizer.normalize_scoped("Washington", PlaceAliasScope::TrailingOnly);
        assert_eq!(keys, BTreeSet::from(["washington".to_string()]));
        assert!(normalizer.normalize("Washington").contains("wa"));
        assert_eq!(
            normalizer.normalize_scoped("", PlaceAliasScope::TrailingOnly),
            BTreeSet::from([String::new()])
        );
    }

    #[test]
    fn test_normalize_does_not_rewrite_leading_state_codes() {
        let keys = NameNormalizer::default().normalize("La Crosse");
        assert_eq!(keys, BTreeSet::from(["la crosse".to_string()]));
    }

    #[test]
    fn test_swapped_table() {
        let table = AliasTable::new(&[("nyc", "new york city")], &[]);
        let normalizer = NameNormalizer::new(table);
        let keys = normalizer.normalize("NYC");
        assert!(keys.contains("new york city"));
        // default expansions are gone with the default table
        assert_eq!(normalizer.normalize("St Louis").len(), 1);
    }
}
