use crate::error::CatalogError;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::tag::Accessor;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// A playable unit from the track repository.
///
/// Field names on the wire follow the storefront backend (`audio_url`,
/// `youtube_url`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(rename = "audio_url", default)]
    pub audio_uri: String,
    #[serde(rename = "cover_url", default, skip_serializing_if = "Option::is_none")]
    pub cover_uri: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_external: bool,
    /// Leak flag: hidden tracks are revealed on a schedule.
    #[serde(default, deserialize_with = "null_as_false")]
    pub is_hidden: bool,
    #[serde(rename = "youtube_url", default, skip_serializing_if = "Option::is_none")]
    pub external_video_uri: Option<String>,
}

/// The one source a track resolves to at play time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackSource<'a> {
    LocalAudio(&'a str),
    ExternalVideo(&'a str),
}

impl Track {
    /// Create a local Track by reading metadata from an audio file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let path = path.canonicalize().map_err(|e| CatalogError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let tagged_file = lofty::read_from_path(&path).map_err(|e| CatalogError::Tags {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let duration = tagged_file.properties().duration();
        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

        let title = tag
            .and_then(|t| t.title().map(|s| s.to_string()))
            .unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_else(|| "Unknown".to_string())
            });

        let artist = tag
            .and_then(|t| t.artist().map(|s| s.to_string()))
            .unwrap_or_else(|| "Unknown".to_string());

        let album = tag.and_then(|t| t.album().map(|s| s.to_string()));

        let uri = path.display().to_string();
        Ok(Track {
            id: uri.clone(),
            title,
            artist,
            album,
            audio_uri: uri,
            cover_uri: None,
            duration_seconds: Some(duration.as_secs_f64()),
            is_external: false,
            is_hidden: false,
            external_video_uri: None,
        })
    }

    /// Resolve the playable source. A non-empty external video reference
    /// takes the track away from local audio entirely.
    pub fn source(&self) -> PlaybackSource<'_> {
        match self.external_video_uri.as_deref().map(str::trim) {
            Some(uri) if !uri.is_empty() => PlaybackSource::ExternalVideo(uri),
            _ => PlaybackSource::LocalAudio(&self.audio_uri),
        }
    }

    /// Format duration as MM:SS, or `--:--` when unknown.
    pub fn duration_display(&self) -> String {
        match self.duration_seconds {
            Some(secs) if secs.is_finite() && secs >= 0.0 => {
                let secs = secs as u64;
                format!("{}:{:02}", secs / 60, secs % 60)
            }
            _ => "--:--".to_string(),
        }
    }
}

fn null_as_false<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(Option::<bool>::deserialize(d)?.unwrap_or(false))
}
