use std::path::Path;

use itertools::izip;
use polars::prelude::*;
use tracing::warn;

use super::Result;
use crate::entity::{EntityKind, Point, RawLocality, StateCode};

const LOCALITIES_SCHEMA: [(PlSmallStr, DataType); 8] = [
    (PlSmallStr::from_static("id"), DataType::UInt64),
    (PlSmallStr::from_static("name"), DataType::String),
    (PlSmallStr::from_static("kind"), DataType::String),
    (PlSmallStr::from_static("state_code"), DataType::String),
    (PlSmallStr::from_static("alt_names"), DataType::String),
    (PlSmallStr::from_static("population"), DataType::Int64),
    (PlSmallStr::from_static("latitude"), DataType::Float64),
    (PlSmallStr::from_static("longitude"), DataType::Float64),
];

/// Separator between alternate names inside the `alt_names` column.
pub const ALT_NAME_SEPARATOR: &str = "|";

pub fn get_localities_lf(path: impl AsRef<Path>) -> Result<LazyFrame> {
    Ok(LazyCsvReader::new(path)
        .with_separator(b'\t')
        .with_has_header(false)
        .with_schema(Some(Schema::from_iter(LOCALITIES_SCHEMA).into()))
        .finish()?
        .with_column(
            dtype_col(&DataType::String)
                .str()
                .strip_chars(lit("\"")),
        )
        .with_column(col("alt_names").str().split(lit(ALT_NAME_SEPARATOR))))
}

/// Convert a collected localities frame into records.
///
/// Rows without an id or name, and rows of a kind we do not index, are skipped with a
/// warning. A malformed state code is an error: it would otherwise surface much later
/// as a dangling reference.
pub fn records_from_df(df: &DataFrame) -> Result<Vec<RawLocality>> {
    let id_series = df.column("id")?.cast(&DataType::UInt64)?;
    let id_series = id_series.u64()?;
    let name_series = df.column("name")?.str()?;
    let kind_series = df.column("kind")?.str()?;
    let state_code_series = df.column("state_code")?.str()?;
    let alt_names_series = df.column("alt_names")?.list()?;
    let population_series = df.column("population")?.i64()?;
    let latitude_series = df.column("latitude")?.f64()?;
    let longitude_series = df.column("longitude")?.f64()?;

    let mut records = Vec::with_capacity(df.height());
    let mut skipped = 0usize;

    for (id, name, kind, state_code, alt_names, population, latitude, longitude) in izip!(
        id_series,
        name_series,
        kind_series,
        state_code_series,
        alt_names_series,
        population_series,
        latitude_series,
        longitude_series
    ) {
        let (Some(id), Some(name)) = (id, name.filter(|n| !n.trim().is_empty())) else {
            skipped += 1;
            continue;
        };
        let kind = match kind.unwrap_or_default().parse::<EntityKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(id, error = %e, "Skipping record of unsupported kind");
                skipped += 1;
                continue;
            }
        };
        let state_code = StateCode::new(state_code.unwrap_or_default())?;

        let mut alts = Vec::new();
        if let Some(val) = alt_names {
            for alt in val.str()?.iter().flatten() {
                let alt = alt.trim();
                if !alt.is_empty() {
                    alts.push(alt.to_string());
                }
            }
        }

        let population = population.and_then(|p| {
            u64::try_from(p)
                .inspect_err(|_| warn!(id, population = p, "Ignoring negative population"))
                .ok()
        });

        let point = latitude.zip(longitude).and_then(|(lat, lon)| {
            let point = Point::new(lat, lon);
            if point.is_none() {
                warn!(id, lat, lon, "Ignoring invalid coordinates");
            }
            point
        });

        records.push(RawLocality {
            id,
            name: name.to_string(),
            kind,
            state_code,
            alt_names: alts,
            population,
            point,
        });
    }

    if skipped > 0 {
        warn!(skipped, kept = records.len(), "Skipped unusable gazetteer rows");
    }
    Ok(records)
}
