//! Typed gazetteer records.
//!
//! [`RawLocality`] is what the ingestion side hands over; [`Entity`] is the canonical
//! place produced by deduplication and consumed by the index builder.

use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DataError, Result};

/// Stable identifier of a gazetteer record. Survives dedupe merges.
pub type EntityId = u64;

/// The two kinds of place this crate deals in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    State,
    City,
}

impl EntityKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::City => "city",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DataError;

    /// Accepts both our own names and the region/locality vocabulary of gazetteer dumps.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "state" | "region" => Ok(Self::State),
            "city" | "locality" => Ok(Self::City),
            other => Err(DataError::UnknownKind(other.to_string())),
        }
    }
}

/// Two-letter U.S. postal code, always stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateCode(String);

impl StateCode {
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(DataError::InvalidStateCode(code.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StateCode {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<StateCode> for String {
    fn from(code: StateCode) -> Self {
        code.0
    }
}

impl FromStr for StateCode {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Representative latitude/longitude of a place, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    const EARTH_RADIUS_KM: f64 = 6371.0088;

    /// `None` unless both coordinates are finite and within WGS84 bounds.
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let point = Self { lat, lon };
        point.is_valid().then_some(point)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Great-circle distance in kilometres (haversine). NaN if either point is not finite.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_KM * a.sqrt().clamp(0.0, 1.0).asin()
    }
}

/// A gazetteer record as supplied by the ingestion side, before deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLocality {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub state_code: StateCode,
    #[serde(default)]
    pub alt_names: Vec<String>,
    pub population: Option<u64>,
    pub point: Option<Point>,
}

impl RawLocality {
    /// Convenience constructor used heavily by fixtures.
    pub fn new(id: EntityId, name: &str, kind: EntityKind, state_code: &str) -> Result<Self> {
        Ok(Self {
            id,
            name: name.to_string(),
            kind,
            state_code: StateCode::new(state_code)?,
            alt_names: Vec::new(),
            population: None,
            point: None,
        })
    }

    #[must_use]
    pub fn with_population(mut self, population: u64) -> Self {
        self.population = Some(population);
        self
    }

    /// Invalid coordinates leave the record without a point.
    #[must_use]
    pub fn with_point(mut self, lat: f64, lon: f64) -> Self {
        self.point = Point::new(lat, lon);
        if self.point.is_none() {
            warn!(id = self.id, lat, lon, "Ignoring invalid coordinates");
        }
        self
    }

    #[must_use]
    pub fn with_alt_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alt_names.extend(names.into_iter().map(Into::into));
        self
    }
}

impl From<&Entity> for RawLocality {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            name: entity.canonical_name.clone(),
            kind: entity.kind,
            state_code: entity.state_code.clone(),
            alt_names: entity.alt_names.iter().cloned().collect(),
            population: entity.population,
            point: entity.representative_point,
        }
    }
}

/// A canonical geographic place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub canonical_name: String,
    alt_names: BTreeSet<String>,
    pub state_code: StateCode,
    pub population: Option<u64>,
    pub representative_point: Option<Point>,
    pub superseded_by: Option<EntityId>,
}

impl Entity {
    #[must_use]
    pub fn new(id: EntityId, kind: EntityKind, canonical_name: &str, state_code: StateCode) -> Self {
        Self {
            id,
            kind,
            canonical_name: canonical_name.trim().to_string(),
            alt_names: BTreeSet::new(),
            state_code,
            population: None,
            representative_point: None,
            superseded_by: None,
        }
    }

    /// Add an alternate name. Blank names and repeats of the canonical name are ignored.
    pub fn add_alt_name(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() && name != self.canonical_name {
            self.alt_names.insert(name.to_string());
        }
    }

    pub fn extend_alt_names<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for name in names {
            self.add_alt_name(name);
        }
    }

    #[must_use]
    pub fn alt_names(&self) -> &BTreeSet<String> {
        &self.alt_names
    }

    /// Canonical name followed by every alternate name.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical_name.as_str()).chain(self.alt_names.iter().map(String::as_str))
    }

    /// Population used for ranking; missing counts as zero.
    #[must_use]
    pub fn rank_population(&self) -> u64 {
        self.population.unwrap_or(0)
    }

    #[must_use]
    pub fn is_canonical(&self) -> bool {
        self.superseded_by.is_none()
    }

    #[must_use]
    pub fn is_state(&self) -> bool {
        self.kind == EntityKind::State
    }

    #[must_use]
    pub fn is_city(&self) -> bool {
        self.kind == EntityKind::City
    }
}

impl From<RawLocality> for Entity {
    fn from(raw: RawLocality) -> Self {
        let mut entity = Self::new(raw.id, raw.kind, &raw.name, raw.state_code);
        entity.extend_alt_names(raw.alt_names.iter().map(String::as_str));
        entity.population = raw.population;
        entity.representative_point = raw.point;
        entity
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Entity {{ id: {}, kind: {}, name: \"{}\", state: {} }}",
            self.id, self.kind, self.canonical_name, self.state_code
        )
    }
}

/// Records that a dead record was merged into a canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupersededMapping {
    pub old_id: EntityId,
    pub new_id: EntityId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_code_validation() {
        assert_eq!(StateCode::new(" il ").unwrap().as_str(), "IL");
        assert!(matches!(
            StateCode::new("ILL"),
            Err(DataError::InvalidStateCode(_))
        ));
        assert!(StateCode::new("1L").is_err());
        assert!(StateCode::new("").is_err());
    }

    #[test]
    fn test_alt_names_ignore_blank_and_canonical() {
        let mut entity = Entity::new(1, EntityKind::City, "Chicago", StateCode::new("IL").unwrap());
        entity.extend_alt_names(["", "  ", "Chicago", "Chi-Town", "Chi-Town"]);
        assert_eq!(entity.alt_names().len(), 1);
        assert!(entity.alt_names().contains("Chi-Town"));
        assert_eq!(entity.names().collect::<Vec<_>>(), vec!["Chicago", "Chi-Town"]);
    }

    #[test]
    fn test_kind_parsing_accepts_gazetteer_vocabulary() {
        assert_eq!("region".parse::<EntityKind>().unwrap(), EntityKind::State);
        assert_eq!("Locality".parse::<EntityKind>().unwrap(), EntityKind::City);
        assert!("county".parse::<EntityKind>().is_err());
    }

    #[test]
    fn test_distance() {
        // Springfield, IL to Springfield, MO is roughly 370 km
        let il = Point::new(39.7817, -89.6501).unwrap();
        let mo = Point::new(37.2090, -93.2923).unwrap();
        let d = il.distance_km(&mo);
        assert!((350.0..400.0).contains(&d), "unexpected distance {d}");
        assert!(il.distance_km(&il) < 1e-9);
        let nan = Point {
            lat: f64::NAN,
            lon: 0.0,
        };
        assert!(il.distance_km(&nan).is_nan());
    }

    #[test]
    fn test_invalid_points_are_rejected() {
        assert!(Point::new(f64::NAN, 0.0).is_none());
        assert!(Point::new(0.0, f64::INFINITY).is_none());
        assert!(Point::new(91.0, 0.0).is_none());
        assert!(Point::new(0.0, -180.5).is_none());
        assert!(Point::new(-90.0, 180.0).is_some());

        let record = RawLocality::new(1, "Nowhere", EntityKind::City, "KS")
            .unwrap()
            .with_point(f64::NAN, f64::NAN);
        assert_eq!(record.point, None);
    }

    #[test]
    fn test_state_code_serde_rejects_invalid() {
        let ok: StateCode = serde_json::from_str("\"mo\"").unwrap();
        assert_eq!(ok.as_str(), "MO");
        assert!(serde_json::from_str::<StateCode>("\"Missouri\"").is_err());
    }
}
