//! Read-only snapshot of the track repository and schedule store.
//!
//! Fetching the rows is the host's job; this module turns a fetched JSON
//! document (`{"tracks": [...], "schedule": [...]}`) into validated data.

use crate::error::CatalogError;
use crate::schedule::{ScheduleEntry, ScheduleRecord, validate_records};
use crate::track::Track;
use log::info;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default)]
    schedule: Vec<ScheduleRecord>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    pub tracks: Vec<Track>,
    pub entries: Vec<ScheduleEntry>,
}

impl Catalog {
    /// Build a catalog from already-fetched rows, dropping invalid schedule
    /// records with a warning.
    pub fn from_parts(tracks: Vec<Track>, records: &[ScheduleRecord]) -> Self {
        let (entries, _rejected) = validate_records(records);
        Catalog { tracks, entries }
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        Ok(Catalog::from_parts(doc.tracks, &doc.schedule))
    }

    /// Load a catalog document from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let data = fs::read_to_string(path).map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let catalog = Catalog::from_json_str(&data)?;
        info!(
            "Loaded catalog '{}': {} track(s), {} schedule entr(y/ies)",
            path.display(),
            catalog.tracks.len(),
            catalog.entries.len()
        );
        Ok(catalog)
    }

    /// Find a track by id.
    pub fn find_track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }
}
