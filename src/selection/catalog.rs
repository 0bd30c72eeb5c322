//! In-memory resource catalog and catalog file loading.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ProviderError;
use crate::ports::{CatalogQuery, ResourceCatalog, Track};

/// Errors raised while loading a catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON catalog: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid YAML catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported catalog format '{0}': expected .json, .yaml or .yml")]
    UnsupportedFormat(String),
}

/// On-disk shape: either a bare list of tracks or `{ tracks: [...] }`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<Track>),
    Wrapped { tracks: Vec<Track> },
}

impl CatalogFile {
    fn into_tracks(self) -> Vec<Track> {
        match self {
            CatalogFile::List(tracks) | CatalogFile::Wrapped { tracks } => tracks,
        }
    }
}

/// Catalog held in memory. Search matches on any shared tag (case-insensitive)
/// and on the duration window, each only when the query sets it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tracks: Vec<Track>,
}

impl InMemoryCatalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Loads tracks from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        let content = std::fs::read_to_string(path)?;

        let file: CatalogFile = match extension.as_str() {
            "json" => serde_json::from_str(&content)?,
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            other => return Err(CatalogError::UnsupportedFormat(other.to_string())),
        };

        let tracks = file.into_tracks();
        tracing::debug!(path = %path.display(), tracks = tracks.len(), "Loaded catalog");
        Ok(Self::new(tracks))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn matches(track: &Track, query: &CatalogQuery, wanted: &HashSet<String>) -> bool {
        if !wanted.is_empty()
            && !track
                .tags
                .iter()
                .any(|t| wanted.contains(&t.trim().to_lowercase()))
        {
            return false;
        }
        if let Some(min) = query.min_duration_seconds {
            if track.duration_seconds < min {
                return false;
            }
        }
        if let Some(max) = query.max_duration_seconds {
            if track.duration_seconds > max {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl ResourceCatalog for InMemoryCatalog {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<Track>, ProviderError> {
        let wanted: HashSet<String> = query
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(self
            .tracks
            .iter()
            .filter(|track| Self::matches(track, query, &wanted))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Track>, ProviderError> {
        Ok(self.tracks.iter().find(|t| t.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            Track::new("calm-60", "https://m.example/calm.mp3", 60.0).with_tags(["Calm", "piano"]),
            Track::new("rock-30", "https://m.example/rock.mp3", 30.0).with_tags(["rock"]),
            Track::new("edm-120", "https://m.example/edm.mp3", 120.0).with_tags(["edm", "upbeat"]),
        ])
    }

    #[tokio::test]
    async fn test_search_by_tags_and_window() {
        let query = CatalogQuery {
            tags: vec!["calm".into(), "upbeat".into()],
            min_duration_seconds: Some(42.0),
            max_duration_seconds: Some(90.0),
            description: None,
        };
        let found = catalog().search(&query).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["calm-60"]);
    }

    #[tokio::test]
    async fn test_unconstrained_search_returns_all() {
        let found = catalog().search(&CatalogQuery::default()).await.unwrap();
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let c = catalog();
        assert!(c.get("rock-30").await.unwrap().is_some());
        assert!(c.get("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_load_json_list() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"id": "a", "tags": ["calm"], "durationSeconds": 30, "url": "https://m.example/a.mp3"}}]"#
        )
        .unwrap();

        let catalog = InMemoryCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.tracks()[0].tags, vec!["calm".to_string()]);
    }

    #[test]
    fn test_load_yaml_wrapped() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "tracks:\n  - id: b\n    durationSeconds: 45\n    url: https://m.example/b.mp3\n    tags: [upbeat]"
        )
        .unwrap();

        let catalog = InMemoryCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.tracks()[0].id, "b");
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        let err = InMemoryCatalog::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CatalogError::UnsupportedFormat(ext) if ext == "csv"));
    }
}
