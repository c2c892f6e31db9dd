//! On-disk form of a [`NameIndex`]: one self-describing JSON document per index.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{info, instrument, warn};

use super::{
    error::{FormatError, IndexError},
    name_index::{Candidate, NameIndex},
};
use crate::data_processing::{Entity, EntityId, EntityKind, NameNormalizer, get_data_dir};

/// Tag identifying placematch index files.
pub const INDEX_FORMAT: &str = "placematch-index";
/// Bumped whenever the document layout or key generation changes.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Where [`crate::Gazetteer::save_default`] and friends keep their files.
#[must_use]
pub fn default_index_dir() -> PathBuf {
    get_data_dir().join("indexes")
}

#[derive(Serialize)]
struct IndexDocumentRef<'a> {
    format: &'static str,
    version: u32,
    kind: EntityKind,
    built_at: DateTime<Utc>,
    normalizer: &'a NameNormalizer,
    entities: Vec<&'a Entity>,
    keys: &'a BTreeMap<String, Vec<Candidate>>,
}

#[derive(Deserialize)]
struct IndexDocument {
    kind: EntityKind,
    built_at: DateTime<Utc>,
    normalizer: NameNormalizer,
    entities: Vec<Entity>,
    keys: BTreeMap<String, Vec<Candidate>>,
}

impl NameIndex {
    /// Write the index to `path`, replacing any existing file atomically.
    #[instrument(name = "Save index", skip_all, fields(kind = %self.kind, path = ?path.as_ref()), level = "info")]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        if let Some(bad) = self
            .entities
            .values()
            .find(|e| e.representative_point.is_some_and(|p| !p.is_valid()))
        {
            return Err(IndexError::InvalidPoint(bad.id));
        }

        let path = path.as_ref();
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let document = IndexDocumentRef {
            format: INDEX_FORMAT,
            version: INDEX_FORMAT_VERSION,
            kind: self.kind,
            built_at: self.built_at,
            normalizer: &self.normalizer,
            entities: self.entities.values().collect(),
            keys: &self.keys,
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, &document)?;
            writer.flush()?;
        }
        tmp.persist(path)?;
        info!(num_entities = self.entities.len(), num_keys = self.keys.len(), "Index saved");
        Ok(())
    }

    /// Read an index of the `expected` kind from `path`.
    ///
    /// Anything that is not a well-formed, current-version index of that kind is a
    /// [`FormatError`]; a partially valid file is never returned.
    #[instrument(name = "Load index", skip(path), fields(path = ?path.as_ref()), level = "info")]
    pub fn load(path: impl AsRef<Path>, expected: EntityKind) -> Result<Self, FormatError> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let value: serde_json::Value = serde_json::from_reader(reader)?;
        Self::from_json_value(value, expected)
    }

    /// Parse an index from an in-memory JSON document.
    pub fn from_json_str(text: &str, expected: EntityKind) -> Result<Self, FormatError> {
        Self::from_json_value(serde_json::from_str(text)?, expected)
    }

    fn from_json_value(value: serde_json::Value, expected: EntityKind) -> Result<Self, FormatError> {
        let format = value.get("format").and_then(|v| v.as_str());
        if format != Some(INDEX_FORMAT) {
            return Err(FormatError::WrongFormat(format.map(str::to_owned)));
        }
        let version = value.get("version").and_then(serde_json::Value::as_u64);
        if version != Some(u64::from(INDEX_FORMAT_VERSION)) {
            warn!(?version, expected = INDEX_FORMAT_VERSION, "Index version mismatch");
            return Err(FormatError::VersionMismatch {
                found: version,
                expected: INDEX_FORMAT_VERSION,
            });
        }

        let document: IndexDocument = serde_json::from_value(value)?;
        if document.kind != expected {
            return Err(FormatError::KindMismatch {
                found: document.kind,
                expected,
            });
        }
        let index = document.into_index()?;
        info!(
            kind = %index.kind,
            num_entities = index.entities.len(),
            num_keys = index.keys.len(),
            "Index loaded"
        );
        Ok(index)
    }
}

impl IndexDocument {
    fn into_index(self) -> Result<NameIndex, FormatError> {
        let mut entities: BTreeMap<EntityId, Entity> = BTreeMap::new();
        for entity in self.entities {
            if entity.kind != self.kind {
                return Err(FormatError::Inconsistent(format!(
                    "entity {} is a {}, index holds {}",
                    entity.id, entity.kind, self.kind
                )));
            }
            if !entity.is_canonical() {
                return Err(FormatError::Inconsistent(format!(
                    "entity {} is superseded",
                    entity.id
                )));
            }
            if entity.canonical_name.trim().is_empty()
                || entity.alt_names().iter().any(|n| n.trim().is_empty())
            {
                return Err(FormatError::Inconsistent(format!(
                    "entity {} has a blank name",
                    entity.id
                )));
            }
            let id = entity.id;
            if entities.insert(id, entity).is_some() {
                return Err(FormatError::Inconsistent(format!("entity {id} appears twice")));
            }
        }

        for (key, candidates) in &self.keys {
            let mut seen = BTreeSet::new();
            for candidate in candidates {
                if !entities.contains_key(&candidate.entity_id) {
                    return Err(FormatError::Inconsistent(format!(
                        "key {key:?} refers to missing entity {}",
                        candidate.entity_id
                    )));
                }
                if !seen.insert(candidate.entity_id) {
                    return Err(FormatError::Inconsistent(format!(
                        "key {key:?} lists entity {} twice",
                        candidate.entity_id
                    )));
                }
            }
        }

        Ok(NameIndex {
            kind: self.kind,
            built_at: self.built_at,
            normalizer: self.normalizer,
            entities,
            keys: self.keys,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data_processing::test_data,
        index::IndexBuilder,
    };

    fn sample_indexes() -> (NameIndex, NameIndex) {
        let entities: Vec<Entity> = test_data::sample_records()
            .into_iter()
            .filter(|r| ![101, 1101, 1130, 1081].contains(&r.id))
            .map(Entity::from)
            .collect();
        IndexBuilder::default().build_pair(&entities).unwrap()
    }

    #[test]
    fn test_save_then_load_is_identical() {
        let (states, cities) = sample_indexes();
        let dir = tempfile::tempdir().unwrap();
        let states_path = dir.path().join("nested").join("states.json");
        let cities_path = dir.path().join("cities.json");
        states.save(&states_path).unwrap();
        cities.save(&cities_path).unwrap();

        assert_eq!(NameIndex::load(&states_path, EntityKind::State).unwrap(), states);
        assert_eq!(NameIndex::load(&cities_path, EntityKind::City).unwrap(), cities);
    }

    #[test]
    fn test_save_overwrites_existing_file() {
        let (states, _) = sample_indexes();
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"stale").unwrap();
        states.save(file.path()).unwrap();
        assert!(NameIndex::load(file.path(), EntityKind::State).is_ok());
    }

    #[test]
    fn test_save_refuses_invalid_point_and_keeps_old_file() {
        let (_, mut cities) = sample_indexes();
        let file = NamedTempFile::new().unwrap();
        cities.save(file.path()).unwrap();
        let before = std::fs::read_to_string(file.path()).unwrap();

        if let Some(entity) = cities.entities.get_mut(&1010) {
            entity.representative_point = Some(crate::data_processing::Point {
                lat: f64::NAN,
                lon: f64::NAN,
            });
        }
        assert!(matches!(
            cities.save(file.path()),
            Err(IndexError::InvalidPoint(1010))
        ));
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), before);
        assert!(NameIndex::load(file.path(), EntityKind::City).is_ok());
    }

    #[test]
    fn test_load_rejects_kind_mismatch() {
        let (states, _) = sample_indexes();
        let file = NamedTempFile::new().unwrap();
        states.save(file.path()).unwrap();
        assert!(matches!(
            NameIndex::load(file.path(), EntityKind::City),
            Err(FormatError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_load_rejects_bad_headers() {
        assert!(matches!(
            NameIndex::from_json_str("{not json", EntityKind::State),
            Err(FormatError::Corrupt(_))
        ));
        assert!(matches!(
            NameIndex::from_json_str(r#"{"format":"something-else","version":1}"#, EntityKind::State),
            Err(FormatError::WrongFormat(Some(_)))
        ));
        assert!(matches!(
            NameIndex::from_json_str(r#"{"format":"placematch-index","version":99}"#, EntityKind::State),
            Err(FormatError::VersionMismatch {
                found: Some(99),
                ..
            })
        ));
        assert!(matches!(
            NameIndex::from_json_str(r#"{"format":"placematch-index","version":1}"#, EntityKind::State),
            Err(FormatError::Corrupt(_))
        ));
    }

    #[test]
    fn test_load_rejects_dangling_candidate() {
        let (states, _) = sample_indexes();
        let file = NamedTempFile::new().unwrap();
        states.save(file.path()).unwrap();
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(file.path()).unwrap()).unwrap();
        value["keys"]["illinois"][0]["entity_id"] = serde_json::json!(424_242);
        assert!(matches!(
            NameIndex::from_json_str(&value.to_string(), EntityKind::State),
            Err(FormatError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            NameIndex::load(dir.path().join("absent.json"), EntityKind::State),
            Err(FormatError::Io(_))
        ));
    }
}
