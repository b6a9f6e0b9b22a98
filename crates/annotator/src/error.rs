//! Error types for every stage of the annotation pipeline.

use thiserror::Error;

/// Scene load failures (manifest, assets, decoding). All are recoverable.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("invalid scene manifest: {0}")]
    InvalidManifest(String),
    #[error("invalid asset: {0}")]
    InvalidAsset(String),
    #[error("load cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for LoadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LoadError::Malformed(e.to_string())
        } else {
            LoadError::Network(e.to_string())
        }
    }
}

/// Per-click pick failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickError {
    #[error("face index {face_index} outside face map of {face_count} faces")]
    FaceOutOfBounds { face_index: usize, face_count: usize },
    #[error("face {face_index} maps to no known instance (id {instance_id})")]
    UnmappedFace { face_index: usize, instance_id: i32 },
}

/// Highlight extraction failures; the selection stays valid without a box
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no visible mesh node with index and position data")]
    NoGeometrySource,
}

/// Save failures, surfaced next to the save control
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaveError {
    #[error("no instance selected")]
    NoSelection,
    #[error("no scene loaded")]
    NoScene,
    #[error("label must not be empty")]
    EmptyLabel,
    #[error("query must not be empty")]
    EmptyQuery,
    #[error("a save for instance {0} is already in flight")]
    InFlight(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("save rejected: {0}")]
    Rejected(String),
}

impl SaveError {
    /// Validation errors never reach the network
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SaveError::NoSelection
                | SaveError::NoScene
                | SaveError::EmptyLabel
                | SaveError::EmptyQuery
                | SaveError::InFlight(_)
        )
    }
}

impl From<reqwest::Error> for SaveError {
    fn from(e: reqwest::Error) -> Self {
        SaveError::Network(e.to_string())
    }
}

/// Fatal session errors: interaction stays disabled
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InitError {
    #[error("viewport has no drawable area ({width}x{height})")]
    InvalidViewport { width: f32, height: f32 },
    #[error("rendering capability missing: {0}")]
    MissingCapability(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid backend url '{0}'")]
    BackendUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_are_flagged() {
        assert!(SaveError::EmptyLabel.is_validation());
        assert!(SaveError::EmptyQuery.is_validation());
        assert!(SaveError::InFlight("1".into()).is_validation());
        assert!(!SaveError::Network("down".into()).is_validation());
        assert!(!SaveError::Rejected("no".into()).is_validation());
    }

    #[test]
    fn test_pick_error_messages() {
        let e = PickError::FaceOutOfBounds { face_index: 12, face_count: 10 };
        assert_eq!(e.to_string(), "face index 12 outside face map of 10 faces");
    }
}
