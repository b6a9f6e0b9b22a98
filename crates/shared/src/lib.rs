use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status string the backend uses for successful responses
pub const STATUS_SUCCESS: &str = "success";

/// Region label shown when an instance carries no region
pub const DEFAULT_REGION_LABEL: &str = "N/A";

/// Region code shown when an instance carries no region
pub const DEFAULT_REGION_CODE: &str = "-";

/// Placeholder entry of the region dropdown, never a valid region
pub const REGION_PLACEHOLDER: &str = "-- Select Region --";

/// Region code → region label
pub type RegionMap = BTreeMap<String, String>;

/// Instance id (as string key) → saved annotation
pub type SavedAnnotationMap = BTreeMap<String, SavedAnnotation>;

/// Point in world space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Axis-aligned bounding box in the plain serializable form sent to the backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// A box is empty when any max component is below its min component
    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    pub fn center(&self) -> Point3 {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Strictly parse a box out of untrusted JSON.
    ///
    /// Both `min` and `max` must be objects with numeric `x`, `y`, `z`.
    /// Anything else (null, strings, missing components) yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let point = |v: &Value| -> Option<Point3> {
            let obj = v.as_object()?;
            let x = obj.get("x")?.as_f64()?;
            let y = obj.get("y")?.as_f64()?;
            let z = obj.get("z")?.as_f64()?;
            Some(Point3::new(x as f32, y as f32, z as f32))
        };
        let obj = value.as_object()?;
        Some(Self {
            min: point(obj.get("min")?)?,
            max: point(obj.get("max")?)?,
        })
    }
}

/// Category id of an instance; the preprocessing pipeline emits integers,
/// older detail tables carry strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryId {
    Int(i64),
    Text(String),
}

impl Default for CategoryId {
    fn default() -> Self {
        CategoryId::Int(-1)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryId::Int(id) => write!(f, "{id}"),
            CategoryId::Text(id) => f.write_str(id),
        }
    }
}

/// One entry of the instance detail table (`GET {details_url}`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDetailRecord {
    pub label: String,
    #[serde(default)]
    pub category_id: CategoryId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_code: Option<String>,
}

/// A previously saved annotation as returned inside `existing_annotations`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnnotation {
    pub final_label: String,
    #[serde(default)]
    pub query: String,
    /// Kept raw: stored annotations may carry null or malformed boxes
    #[serde(default)]
    pub bounding_box: Option<Value>,
}

impl SavedAnnotation {
    pub fn new(final_label: impl Into<String>, query: impl Into<String>, bbox: Option<BoundingBox>) -> Self {
        Self {
            final_label: final_label.into(),
            query: query.into(),
            bounding_box: bbox.and_then(|b| serde_json::to_value(b).ok()),
        }
    }

    /// The bounding box, if present and well-formed
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box.as_ref().and_then(BoundingBox::from_value)
    }
}

/// Response of `GET /load_scene/{scene_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoadSceneResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glb_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_map_url: Option<String>,
    #[serde(default)]
    pub existing_annotations: Option<SavedAnnotationMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// The three asset URLs of a validated scene manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneAssetUrls {
    pub glb_url: String,
    pub details_url: String,
    pub face_map_url: String,
}

impl LoadSceneResponse {
    /// Asset URLs, or `None` when the status is not success or any URL is missing/empty
    pub fn asset_urls(&self) -> Option<SceneAssetUrls> {
        if self.status != STATUS_SUCCESS {
            return None;
        }
        let non_empty = |u: &Option<String>| u.as_ref().filter(|s| !s.is_empty()).cloned();
        Some(SceneAssetUrls {
            glb_url: non_empty(&self.glb_url)?,
            details_url: non_empty(&self.details_url)?,
            face_map_url: non_empty(&self.face_map_url)?,
        })
    }
}

/// Body of `POST /save_annotation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveAnnotationRequest {
    pub scene_id: String,
    pub instance_id: String,
    pub original_category_id: CategoryId,
    pub final_label_string: String,
    pub query: String,
    pub bounding_box: Option<BoundingBox>,
    #[serde(alias = "region_label")]
    pub final_region_label: String,
    #[serde(alias = "region_code")]
    pub final_region_code: String,
}

/// Response of `POST /save_annotation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SaveAnnotationResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_label_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SaveAnnotationResponse {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}

/// Response of `GET /api/scenes`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SceneListResponse {
    pub scenes: Vec<String>,
}

/// Error body returned by the backend on 4xx/5xx
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn describe(&self) -> Option<&str> {
        self.description.as_deref().or(self.message.as_deref())
    }
}
