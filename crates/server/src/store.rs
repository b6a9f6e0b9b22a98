//! Append-only JSONL annotation store, one file per scene

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{CategoryId, SavedAnnotation, SavedAnnotationMap, DEFAULT_REGION_LABEL};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One line of `{scene_id}.jsonl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationEntry {
    pub scene_id: String,
    pub instance_id: Value,
    #[serde(default)]
    pub final_label: Option<String>,
    #[serde(default)]
    pub final_label_id: Option<i64>,
    #[serde(default)]
    pub original_category_id: CategoryId,
    #[serde(default)]
    pub region_label: Option<String>,
    #[serde(default)]
    pub region_code: Option<String>,
    #[serde(default)]
    pub bounding_box: Option<Value>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl AnnotationEntry {
    /// Instance id as the string key the client uses
    pub fn instance_key(&self) -> String {
        match &self.instance_id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn to_saved(&self) -> SavedAnnotation {
        SavedAnnotation {
            final_label: self
                .final_label
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION_LABEL.to_string()),
            query: self.query.clone().unwrap_or_default(),
            bounding_box: self.bounding_box.clone(),
        }
    }
}

pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug)]
pub struct AnnotationStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl AnnotationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, scene_id: &str) -> PathBuf {
        self.dir.join(format!("{scene_id}.jsonl"))
    }

    /// Latest annotation per instance. A missing file is an empty map.
    pub async fn load(&self, scene_id: &str) -> std::io::Result<SavedAnnotationMap> {
        let path = self.path_for(scene_id);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SavedAnnotationMap::new()),
            Err(e) => return Err(e),
        };
        Ok(parse_entries(&text, &path))
    }

    pub async fn append(&self, entry: &AnnotationEntry) -> std::io::Result<()> {
        let mut line = serde_json::to_string(entry).map_err(std::io::Error::other)?;
        line.push('\n');
        let path = self.path_for(&entry.scene_id);

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

fn parse_entries(text: &str, path: &Path) -> SavedAnnotationMap {
    let mut map = SavedAnnotationMap::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<AnnotationEntry>(line) {
            Ok(entry) => {
                map.insert(entry.instance_key(), entry.to_saved());
            }
            Err(e) => {
                tracing::warn!("skipping malformed line {} in {}: {}", line_no + 1, path.display(), e);
            }
        }
    }
    map
}
