use std::path::Path as FsPath;

use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use shared::{
    CategoryId, LoadSceneResponse, RegionMap, SaveAnnotationResponse, SceneListResponse,
    REGION_PLACEHOLDER, STATUS_SUCCESS,
};

use crate::error::ApiError;
use crate::regions;
use crate::store::{now_timestamp, AnnotationEntry};
use crate::AppState;

const MESH_SUFFIX: &str = "_mesh.glb";
const DETAILS_SUFFIX: &str = "_details.json";
const FACE_MAP_SUFFIX: &str = "_face_map.bin";

const REQUIRED_SAVE_FIELDS: [&str; 7] = [
    "scene_id",
    "instance_id",
    "original_category_id",
    "final_label_string",
    "query",
    "final_region_label",
    "final_region_code",
];

/// Health check
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn scene_files(scene_id: &str) -> [String; 3] {
    [
        format!("{scene_id}{MESH_SUFFIX}"),
        format!("{scene_id}{DETAILS_SUFFIX}"),
        format!("{scene_id}{FACE_MAP_SUFFIX}"),
    ]
}

fn validate_scene_id(scene_id: &str) -> Result<(), ApiError> {
    if scene_id.is_empty() || scene_id.contains('/') || scene_id.contains('\\') || scene_id.contains("..") {
        return Err(ApiError::BadRequest(format!("Invalid scene id '{scene_id}'")));
    }
    Ok(())
}

/// Scenes with all three preprocessed files present
pub async fn list_scenes(State(state): State<AppState>) -> Result<Json<SceneListResponse>, ApiError> {
    let dir = &state.config.temp_dir;
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("cannot list {}: {}", dir.display(), e);
            return Ok(Json(SceneListResponse::default()));
        }
    };
    let mut scenes = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to list scenes: {e}")))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(scene_id) = name.strip_suffix(MESH_SUFFIX) else {
            continue;
        };
        if missing_files(dir, scene_id).await.is_empty() {
            scenes.push(scene_id.to_string());
        }
    }
    scenes.sort();
    Ok(Json(SceneListResponse { scenes }))
}

async fn missing_files(dir: &FsPath, scene_id: &str) -> Vec<String> {
    let mut missing = Vec::new();
    for file in scene_files(scene_id) {
        if !tokio::fs::try_exists(dir.join(&file)).await.unwrap_or(false) {
            missing.push(file);
        }
    }
    missing
}

pub async fn get_regions() -> Json<RegionMap> {
    Json(regions::region_map())
}

/// Scene manifest plus the latest saved annotation per instance
pub async fn load_scene(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> Result<Json<LoadSceneResponse>, ApiError> {
    validate_scene_id(&scene_id)?;
    let missing = missing_files(&state.config.temp_dir, &scene_id).await;
    if !missing.is_empty() {
        tracing::warn!("scene {} is missing {}", scene_id, missing.join(", "));
        return Err(ApiError::NotFound(format!(
            "Preprocessed files not found for scene {}: missing {}",
            scene_id,
            missing.join(", ")
        )));
    }

    let existing = state.store.load(&scene_id).await.map_err(|e| {
        tracing::error!("reading annotations for {} failed: {}", scene_id, e);
        ApiError::Internal(format!("Failed to read annotations: {e}"))
    })?;
    tracing::info!("scene {} requested, {} existing annotations", scene_id, existing.len());

    let [glb, details, face_map] = scene_files(&scene_id);
    Ok(Json(LoadSceneResponse {
        status: STATUS_SUCCESS.to_string(),
        glb_url: Some(format!("/temp_files/{glb}")),
        details_url: Some(format!("/temp_files/{details}")),
        face_map_url: Some(format!("/temp_files/{face_map}")),
        existing_annotations: Some(existing),
        message: None,
    }))
}

fn content_type_for(filename: &str) -> Option<&'static str> {
    let ext = FsPath::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "glb" => Some("model/gltf-binary"),
        "json" => Some("application/json"),
        "bin" => Some("application/octet-stream"),
        _ => None,
    }
}

/// Preprocessed asset files, never cached by the client
pub async fn temp_files(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    if filename.contains("..") || filename.starts_with('/') || filename.starts_with('\\') {
        return Err(ApiError::NotFound("File not found".into()));
    }
    let content_type =
        content_type_for(&filename).ok_or_else(|| ApiError::Forbidden("File type not allowed".into()))?;

    let path = state.config.temp_dir.join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::NotFound("File not found".into()));
        }
        Err(e) => {
            tracing::error!("reading {} failed: {}", path.display(), e);
            return Err(ApiError::Internal("Error serving file".into()));
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
        ],
        bytes,
    )
        .into_response())
}

fn text_field(body: &Value, key: &str) -> String {
    match body.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Validate, assign a label id and append to the scene's annotation file
pub async fn save_annotation(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<SaveAnnotationResponse>, ApiError> {
    let missing: Vec<&str> = REQUIRED_SAVE_FIELDS
        .iter()
        .copied()
        .filter(|key| body.get(key).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "Missing required data fields: {}",
            missing.join(", ")
        )));
    }

    let scene_id = text_field(&body, "scene_id");
    validate_scene_id(&scene_id)?;
    let label = text_field(&body, "final_label_string");
    if label.is_empty() {
        return Err(ApiError::BadRequest("Final label cannot be empty.".into()));
    }
    let region_label = text_field(&body, "final_region_label");
    if region_label.is_empty() || region_label == REGION_PLACEHOLDER {
        return Err(ApiError::BadRequest("Please select a valid region.".into()));
    }
    let region_code = text_field(&body, "final_region_code");
    if !regions::is_known_code(&region_code) {
        tracing::warn!("unknown region code '{}' for label '{}'", region_code, region_label);
    }

    let known = state.labels.lock().await.resolve(&label);
    let entry = AnnotationEntry {
        scene_id,
        instance_id: body["instance_id"].clone(),
        final_label: Some(known.canonical_name.clone()),
        final_label_id: Some(known.id),
        original_category_id: serde_json::from_value::<CategoryId>(body["original_category_id"].clone())
            .unwrap_or_default(),
        region_label: Some(region_label),
        region_code: Some(region_code),
        bounding_box: body.get("bounding_box").filter(|b| !b.is_null()).cloned(),
        query: Some(text_field(&body, "query")),
        timestamp: Some(now_timestamp()),
    };

    state.store.append(&entry).await.map_err(|e| {
        tracing::error!("writing annotation for {} failed: {}", entry.scene_id, e);
        ApiError::Internal(format!("Failed to save annotation: {e}"))
    })?;
    tracing::info!(
        "saved '{}' (id {}) for instance {} in {}",
        known.canonical_name,
        known.id,
        entry.instance_key(),
        entry.scene_id
    );

    Ok(Json(SaveAnnotationResponse {
        status: STATUS_SUCCESS.to_string(),
        saved_label: Some(known.canonical_name),
        saved_label_id: Some(known.id),
        message: Some("Annotation saved successfully.".into()),
    }))
}
