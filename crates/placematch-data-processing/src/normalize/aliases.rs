use std::{collections::BTreeSet, io::Read};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{PlaceAliasScope, fold};
use crate::{error::Result, states::US_STATES};

/// Upper bound on keys produced for one name.
const MAX_VARIANTS: usize = 64;
/// Stop growing the closure past this many variants.
const EXPANSION_LIMIT: usize = MAX_VARIANTS * 16;

const US_TOKEN_ALIASES: [(&str, &str); 16] = [
    ("st", "saint"),
    ("ste", "sainte"),
    ("mt", "mount"),
    ("ft", "fort"),
    ("pt", "point"),
    ("n", "north"),
    ("s", "south"),
    ("e", "east"),
    ("w", "west"),
    ("hts", "heights"),
    ("spgs", "springs"),
    ("jct", "junction"),
    ("twp", "township"),
    ("vlg", "village"),
    ("co", "county"),
    ("isl", "island"),
];

/// Two spellings that denote the same thing, already folded.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AliasPair {
    pub short: String,
    pub long: String,
}

impl AliasPair {
    fn new(short: &str, long: &str) -> Option<Self> {
        let (short, long) = (fold(short), fold(long));
        (!short.is_empty() && !long.is_empty() && short != long).then_some(Self { short, long })
    }

    fn split(&self) -> (Vec<&str>, Vec<&str>) {
        (self.short.split(' ').collect(), self.long.split(' ').collect())
    }
}

/// Bidirectional abbreviation table.
///
/// * token aliases rewrite a token sequence wherever it occurs (`st` ↔ `saint`);
/// * place aliases rewrite only a whole key or its trailing tokens (`il` ↔ `illinois`),
///   so "springfield il" gains "springfield illinois" but "la crosse" stays put. Under
///   [`PlaceAliasScope::TrailingOnly`] a key that is nothing but the alias stays put too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTable {
    token_aliases: Vec<AliasPair>,
    place_aliases: Vec<AliasPair>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::us_default()
    }
}

#[derive(Deserialize)]
struct AliasTableFile {
    #[serde(default)]
    token_aliases: Vec<(String, String)>,
    #[serde(default)]
    place_aliases: Vec<(String, String)>,
}

impl AliasTable {
    /// Build a table from raw `(short, long)` pairs. Both sides are folded; pairs that fold
    /// to nothing or to the same string are dropped.
    #[must_use]
    pub fn new(token_aliases: &[(&str, &str)], place_aliases: &[(&str, &str)]) -> Self {
        let collect = |pairs: &[(&str, &str)]| -> Vec<AliasPair> {
            let set: BTreeSet<AliasPair> = pairs
                .iter()
                .filter_map(|(short, long)| AliasPair::new(short, long))
                .collect();
            set.into_iter().collect()
        };
        Self {
            token_aliases: collect(token_aliases),
            place_aliases: collect(place_aliases),
        }
    }

    /// Saint/Mount/Fort style abbreviations plus every state postal code.
    #[must_use]
    pub fn us_default() -> Self {
        Self::new(&US_TOKEN_ALIASES, &US_STATES)
    }

    /// A table that expands nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(&[], &[])
    }

    /// Load a table from JSON of the form
    /// `{"token_aliases": [["st", "saint"]], "place_aliases": [["il", "illinois"]]}`.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let file: AliasTableFile = serde_json::from_reader(reader)?;
        Ok(Self::new(
            &as_refs(&file.token_aliases),
            &as_refs(&file.place_aliases),
        ))
    }

    #[must_use]
    pub fn token_aliases(&self) -> &[AliasPair] {
        &self.token_aliases
    }

    #[must_use]
    pub fn place_aliases(&self) -> &[AliasPair] {
        &self.place_aliases
    }

    /// Every spelling of an already folded, non-empty key, the key itself included.
    ///
    /// Rewrites are applied until nothing new appears, so names that alias to each other
    /// share the same closure. Past [`MAX_VARIANTS`] the closure is cut in its own order,
    /// which does not depend on which spelling the expansion started from.
    pub(super) fn expand(&self, folded: &str, scope: PlaceAliasScope) -> BTreeSet<String> {
        let start: Vec<String> = folded.split(' ').map(str::to_string).collect();
        let mut variants = BTreeSet::from([start.clone()]);
        let mut frontier = vec![start];

        while !frontier.is_empty() && variants.len() <= EXPANSION_LIMIT {
            let mut next = Vec::new();
            for tokens in &frontier {
                for rewritten in self.rewrites(tokens, scope) {
                    if variants.insert(rewritten.clone()) {
                        next.push(rewritten);
                    }
                }
            }
            frontier = next;
        }

        if variants.len() > MAX_VARIANTS {
            warn!(key = folded, variants = variants.len(), "Truncating alias expansion");
        }
        variants
            .into_iter()
            .take(MAX_VARIANTS)
            .map(|tokens| tokens.join(" "))
            .chain(std::iter::once(folded.to_string()))
            .collect()
    }

    /// One rewrite step in every direction the table allows.
    fn rewrites(&self, tokens: &[String], scope: PlaceAliasScope) -> Vec<Vec<String>> {
        let min_prefix = match scope {
            PlaceAliasScope::WholeOrTrailing => 0,
            PlaceAliasScope::TrailingOnly => 1,
        };
        let mut out = Vec::new();
        for pair in &self.token_aliases {
            let (short, long) = pair.split();
            out.extend(replace_all(tokens, &short, &long));
            out.extend(replace_all(tokens, &long, &short));
        }
        for pair in &self.place_aliases {
            let (short, long) = pair.split();
            out.extend(replace_suffix(tokens, &short, &long, min_prefix));
            out.extend(replace_suffix(tokens, &long, &short, min_prefix));
        }
        out
    }
}

fn as_refs(pairs: &[(String, String)]) -> Vec<(&str, &str)> {
    pairs.iter().map(|(s, l)| (s.as_str(), l.as_str())).collect()
}

fn starts_with_at(tokens: &[String], at: usize, pattern: &[&str]) -> bool {
    tokens.len() >= at + pattern.len()
        && tokens[at..at + pattern.len()]
            .iter()
            .zip(pattern)
            .all(|(t, p)| t == p)
}

/// Replace every non-overlapping occurrence of `from`; `None` when there is none.
fn replace_all(tokens: &[String], from: &[&str], to: &[&str]) -> Option<Vec<String>> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    let mut replaced = false;
    while i < tokens.len() {
        if starts_with_at(tokens, i, from) {
            out.extend(to.iter().map(|t| (*t).to_string()));
            i += from.len();
            replaced = true;
        } else {
            out.push(tokens[i].clone());
            i += 1;
        }
    }
    replaced.then_some(out)
}

/// Replace `from` when it makes up the trailing tokens of `tokens`, leaving at least
/// `min_prefix` tokens in front of it.
fn replace_suffix(
    tokens: &[String],
    from: &[&str],
    to: &[&str],
    min_prefix: usize,
) -> Option<Vec<String>> {
    let at = tokens.len().checked_sub(from.len())?;
    (at >= min_prefix && starts_with_at(tokens, at, from)).then(|| {
        tokens[..at]
            .iter()
            .cloned()
            .chain(to.iter().map(|t| (*t).to_string()))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(table: &AliasTable, raw: &str) -> Vec<String> {
        table
            .expand(&fold(raw), PlaceAliasScope::WholeOrTrailing)
            .into_iter()
            .collect()
    }

    fn qualifier_keys(table: &AliasTable, raw: &str) -> Vec<String> {
        table
            .expand(&fold(raw), PlaceAliasScope::TrailingOnly)
            .into_iter()
            .collect()
    }

    #[test]
    fn test_token_aliases_apply_anywhere_both_ways() {
        let table = AliasTable::us_default();
        assert_eq!(keys(&table, "Mt Pleasant"), vec!["mount pleasant", "mt pleasant"]);
        assert_eq!(keys(&table, "Mount Pleasant"), vec!["mount pleasant", "mt pleasant"]);
    }

    #[test]
    fn test_combined_expansion() {
        let table = AliasTable::us_default();
        let expanded = keys(&table, "St Louis MO");
        for expected in [
            "st louis mo",
            "saint louis mo",
            "st louis missouri",
            "saint louis missouri",
        ] {
            assert!(expanded.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn test_multi_token_place_alias() {
        let table = AliasTable::us_default();
        let expanded = keys(&table, "Albany New York");
        assert!(expanded.contains(&"albany ny".to_string()));
        assert!(keys(&table, "New York").contains(&"ny".to_string()));
        // only a trailing match counts
        assert!(!keys(&table, "New York Mills").contains(&"ny mills".to_string()));
    }

    #[test]
    fn test_trailing_only_leaves_bare_aliases_alone() {
        let table = AliasTable::us_default();
        assert_eq!(qualifier_keys(&table, "LA"), vec!["la"]);
        assert_eq!(qualifier_keys(&table, "Virginia"), vec!["virginia"]);
        assert_eq!(qualifier_keys(&table, "New York"), vec!["new york"]);
        assert!(qualifier_keys(&table, "Albany NY").contains(&"albany new york".to_string()));
        assert!(keys(&table, "LA").contains(&"louisiana".to_string()));
    }

    #[test]
    fn test_closure_is_order_independent() {
        // `mt` is both a token alias (mount) and a postal code (montana)
        let table = AliasTable::us_default();
        let expected = vec!["butte montana", "butte mount", "butte mt"];
        assert_eq!(keys(&table, "Butte MT"), expected);
        assert_eq!(keys(&table, "Butte Montana"), expected);
        assert_eq!(keys(&table, "Butte Mount"), expected);
    }

    #[test]
    fn test_truncation_keeps_spellings_connected() {
        let table = AliasTable::us_default();
        let short = table.expand("st mt ft pt hts spgs jct", PlaceAliasScope::TrailingOnly);
        let long = table.expand(
            "saint mount fort point heights springs junction",
            PlaceAliasScope::TrailingOnly,
        );
        assert!(short.len() <= MAX_VARIANTS + 1);
        assert!(long.len() <= MAX_VARIANTS + 1);
        assert!(short.contains("st mt ft pt hts spgs jct"));
        assert!(long.contains("saint mount fort point heights springs junction"));
        assert_eq!(short.intersection(&long).count(), MAX_VARIANTS);
    }

    #[test]
    fn test_degenerate_pairs_dropped() {
        let table = AliasTable::new(&[("", "x"), ("same", "SAME"), ("st", "saint")], &[]);
        assert_eq!(table.token_aliases().len(), 1);
    }

    #[test]
    fn test_from_json_reader() {
        let json = r#"{"token_aliases": [["Mt.", "Mount"]], "place_aliases": [["IL", "Illinois"]]}"#;
        let table = AliasTable::from_json_reader(json.as_bytes()).unwrap();
        assert_eq!(
            table.token_aliases(),
            &[AliasPair {
                short: "mt".into(),
                long: "mount".into()
            }]
        );
        assert_eq!(table.place_aliases()[0].long, "illinois");
        assert!(AliasTable::from_json_reader("not json".as_bytes()).is_err());
    }
}
