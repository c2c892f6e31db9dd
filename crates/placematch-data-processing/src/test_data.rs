//! Small hand-curated gazetteer used by unit and integration tests.
//!
//! The fixture mixes the cases the pipeline has to get right: namesakes in different
//! states (Springfield, Portland, Kansas City), duplicate records of one place from
//! different vintages (Chicago, Springfield IL, Illinois), abbreviations (St. Louis,
//! Mt. Vernon, Ft. Worth), diacritics (Cañon City) and historical names.

use std::io::Write;

use itertools::Itertools;
use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;
use crate::{
    entity::{EntityKind, RawLocality},
    raw::ALT_NAME_SEPARATOR,
};

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Maximum number of records to write
    pub rows: usize,
    /// Whether to use the full fixture or a three-row minimal one
    pub realistic_data: bool,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self {
            rows: usize::MAX,
            realistic_data: true,
        }
    }
}

impl TestDataConfig {
    /// Illinois, Chicago and Springfield only
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            rows: 3,
            realistic_data: false,
        }
    }

    /// The whole fixture
    #[must_use]
    pub fn sample() -> Self {
        Self::default()
    }
}

fn state(id: u64, name: &str, code: &str) -> RawLocality {
    RawLocality::new(id, name, EntityKind::State, code).expect("fixture state codes are valid")
}

fn city(id: u64, name: &str, code: &str, population: Option<u64>) -> RawLocality {
    let record =
        RawLocality::new(id, name, EntityKind::City, code).expect("fixture state codes are valid");
    match population {
        Some(p) => record.with_population(p),
        None => record,
    }
}

/// State records, including one stale duplicate of Illinois.
#[must_use]
pub fn sample_state_records() -> Vec<RawLocality> {
    vec![
        state(1, "Illinois", "IL")
            .with_population(12_812_508)
            .with_alt_names(["Land of Lincoln"]),
        state(2, "Missouri", "MO").with_population(6_154_913),
        state(3, "New York", "NY")
            .with_population(20_201_249)
            .with_alt_names(["The Empire State"]),
        state(4, "Kansas", "KS").with_population(2_937_880),
        state(5, "Oregon", "OR").with_population(4_237_256),
        state(6, "Maine", "ME").with_population(1_362_359),
        state(7, "Texas", "TX").with_population(29_145_505),
        state(8, "Colorado", "CO").with_population(5_773_714),
        state(9, "California", "CA").with_population(39_538_223),
        state(10, "Massachusetts", "MA").with_population(7_029_917),
        state(101, "ILLINOIS", "IL").with_alt_names(["Ill."]),
    ]
}

/// City records, including stale duplicates of Chicago and Springfield, IL.
#[must_use]
pub fn sample_city_records() -> Vec<RawLocality> {
    vec![
        city(1001, "Springfield", "IL", Some(114_000)).with_point(39.7817, -89.6501),
        city(1002, "Springfield", "MO", Some(150_000)).with_point(37.2090, -93.2923),
        city(1003, "Springfield", "MA", Some(136_000)).with_point(42.1015, -72.5898),
        city(1004, "Springfield", "OR", Some(62_000)).with_point(44.0462, -123.0220),
        city(1101, "springfield", "IL", None)
            .with_point(39.80, -89.64)
            .with_alt_names(["Capital City"]),
        city(1010, "St. Louis", "MO", Some(301_578))
            .with_point(38.6270, -90.1994)
            .with_alt_names(["STL", "Mound City"]),
        city(1020, "New York", "NY", Some(8_336_817))
            .with_point(40.7128, -74.0060)
            .with_alt_names(["NYC", "New York City", "Big Apple", "New Amsterdam"]),
        city(1030, "Chicago", "IL", Some(2_746_388))
            .with_point(41.8781, -87.6298)
            .with_alt_names(["Chi-Town", "Windy City"]),
        city(1130, "Chicago", "IL", Some(2_705_994)).with_alt_names(["Chicago City"]),
        city(1040, "Kansas City", "MO", Some(508_090)).with_point(39.0997, -94.5786),
        city(1041, "Kansas City", "KS", Some(156_607)).with_point(39.1141, -94.6275),
        city(1050, "Portland", "OR", Some(652_503)).with_point(45.5152, -122.6784),
        city(1051, "Portland", "ME", Some(68_408)).with_point(43.6591, -70.2568),
        city(1060, "Mount Vernon", "NY", Some(73_893)),
        city(1070, "Fort Worth", "TX", Some(918_915)).with_alt_names(["Cowtown"]),
        city(1080, "Cañon City", "CO", Some(17_141)),
        city(1081, "Canon City", "CO", None),
        city(1090, "Los Angeles", "CA", Some(3_898_747)).with_alt_names(["LA", "City of Angels"]),
        city(1100, "Boston", "MA", Some(675_647)).with_alt_names(["Beantown"]),
    ]
}

/// Every fixture record, states first.
#[must_use]
pub fn sample_records() -> Vec<RawLocality> {
    sample_state_records()
        .into_iter()
        .chain(sample_city_records())
        .collect()
}

fn minimal_records() -> Vec<RawLocality> {
    vec![
        state(1, "Illinois", "IL").with_alt_names(["Land of Lincoln"]),
        city(1030, "Chicago", "IL", Some(2_746_388))
            .with_point(41.8781, -87.6298)
            .with_alt_names(["Chi-Town", "Windy City"]),
        city(1001, "Springfield", "IL", Some(114_000)).with_point(39.7817, -89.6501),
    ]
}

fn format_row(record: &RawLocality) -> String {
    let kind = match record.kind {
        EntityKind::State => "region",
        EntityKind::City => "locality",
    };
    let opt = |v: Option<String>| v.unwrap_or_default();
    [
        record.id.to_string(),
        record.name.clone(),
        kind.to_string(),
        record.state_code.to_string(),
        record.alt_names.iter().join(ALT_NAME_SEPARATOR),
        opt(record.population.map(|p| p.to_string())),
        opt(record.point.map(|p| p.lat.to_string())),
        opt(record.point.map(|p| p.lon.to_string())),
    ]
    .join("\t")
}

/// Write the fixture as a raw gazetteer dump into a temporary file.
pub fn create_test_data(config: &TestDataConfig) -> Result<NamedTempFile> {
    info!("Creating test data with config: {:?}", config);

    let records = if config.realistic_data {
        sample_records()
    } else {
        minimal_records()
    };

    let mut file = NamedTempFile::new()?;
    for record in records.iter().take(config.rows) {
        writeln!(file, "{}", format_row(record))?;
    }
    file.flush()?;
    Ok(file)
}
