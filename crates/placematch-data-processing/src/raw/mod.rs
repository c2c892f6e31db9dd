//! Reading raw gazetteer dumps into [`RawLocality`] records.
//!
//! The expected input is a header-less, tab-separated file with the columns
//! `id, name, kind, state_code, alt_names, population, latitude, longitude`, where
//! `kind` is `state`/`region` or `city`/`locality` and `alt_names` is `|`-separated.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::entity::RawLocality;
pub use crate::error::Result;

mod localities;

pub use localities::{ALT_NAME_SEPARATOR, get_localities_lf, records_from_df};

pub const RAW_RECORDS_FILE: &str = "us_localities.tsv";

/// Where [`read_raw_records`] looks by default: `<DATA_DIR>/raw/us_localities.tsv`.
#[must_use]
pub fn default_raw_records_path() -> PathBuf {
    crate::get_data_dir().join("raw").join(RAW_RECORDS_FILE)
}

/// Read every usable record from a raw gazetteer dump.
#[instrument(name = "Read raw gazetteer records", skip_all, fields(path = %path.as_ref().display()), level = "info")]
pub fn read_raw_records(path: impl AsRef<Path>) -> Result<Vec<RawLocality>> {
    let t_read = std::time::Instant::now();
    let df = get_localities_lf(path.as_ref())?.collect()?;
    let records = records_from_df(&df)?;
    info!(
        rows = df.height(),
        records = records.len(),
        elapsed = ?t_read.elapsed(),
        "Read raw records"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::{
        entity::EntityKind,
        error::DataError,
        test_data::{TestDataConfig, create_test_data},
    };

    #[test]
    fn test_read_generated_dump() {
        let file = create_test_data(&TestDataConfig::minimal()).unwrap();
        let records = read_raw_records(file.path()).unwrap();

        assert!(records.len() >= 3);
        let illinois = records.iter().find(|r| r.name == "Illinois").unwrap();
        assert_eq!(illinois.kind, EntityKind::State);
        assert_eq!(illinois.state_code.as_str(), "IL");

        let chicago = records.iter().find(|r| r.name == "Chicago").unwrap();
        assert_eq!(chicago.kind, EntityKind::City);
        assert_eq!(chicago.population, Some(2_746_388));
        assert!(chicago.alt_names.contains(&"Chi-Town".to_string()));
        assert!(chicago.point.is_some());
    }

    #[test]
    fn test_rows_are_skipped_or_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "1\tIllinois\tregion\til\tIll.|\t\t\t").unwrap();
        writeln!(file, "2\t\tlocality\tIL\t\t100\t\t").unwrap();
        writeln!(file, "3\tCook\tcounty\tIL\t\t5000000\t\t").unwrap();
        writeln!(file, "4\tNowhere\tlocality\tIL\t\t-5\t1.0\t").unwrap();
        file.flush().unwrap();

        let records = read_raw_records(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].alt_names, vec!["Ill.".to_string()]);
        assert_eq!(records[0].state_code.as_str(), "IL");
        assert_eq!(records[1].population, None);
        assert_eq!(records[1].point, None);

        let mut off_map = NamedTempFile::new().unwrap();
        writeln!(off_map, "5\tFaraway\tlocality\tIL\t\t10\t200.0\t10.0").unwrap();
        writeln!(off_map, "6\tNearby\tlocality\tIL\t\t10\t40.0\t-89.0").unwrap();
        off_map.flush().unwrap();
        let records = read_raw_records(off_map.path()).unwrap();
        assert_eq!(records[0].point, None, "out-of-range latitude is dropped");
        assert!(records[1].point.is_some());

        let mut bad = NamedTempFile::new().unwrap();
        writeln!(bad, "9\tSomewhere\tlocality\tIllinois\t\t\t\t").unwrap();
        bad.flush().unwrap();
        assert!(matches!(
            read_raw_records(bad.path()),
            Err(DataError::InvalidStateCode(_))
        ));
    }
}
