//! Backend access: the annotation service seen as an async trait, and its
//! HTTP implementation.

pub mod loader;

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, Url};
use shared::{
    ErrorBody, InstanceDetailRecord, LoadSceneResponse, RegionMap, SaveAnnotationRequest,
    SaveAnnotationResponse, SceneListResponse,
};

use crate::error::{ConfigError, LoadError, SaveError};
use crate::state::settings::AnnotatorSettings;

/// Detail table as served: instance id key → record
pub type DetailRecords = BTreeMap<String, InstanceDetailRecord>;

/// Requests the annotator makes against the backend
pub trait AnnotationBackend: Send + Sync + 'static {
    fn list_scenes(&self) -> impl Future<Output = Result<Vec<String>, LoadError>> + Send;

    fn get_regions(&self) -> impl Future<Output = Result<RegionMap, LoadError>> + Send;

    fn load_scene(&self, scene_id: &str) -> impl Future<Output = Result<LoadSceneResponse, LoadError>> + Send;

    fn fetch_asset(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send;

    fn fetch_details(&self, url: &str) -> impl Future<Output = Result<DetailRecords, LoadError>> + Send;

    fn fetch_face_map(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send;

    fn save_annotation(
        &self,
        request: &SaveAnnotationRequest,
    ) -> impl Future<Output = Result<SaveAnnotationResponse, SaveError>> + Send;
}

/// `reqwest` client against a base URL; relative asset URLs resolve under it
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(settings: &AnnotatorSettings) -> Result<Self, ConfigError> {
        let base = settings.backend_base()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs.max(1)))
            .build()
            .map_err(|e| ConfigError::BackendUrl(e.to_string()))?;
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolve a server path or absolute URL against the base
    pub fn resolve(&self, path: &str) -> Result<Url, LoadError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| LoadError::InvalidManifest(format!("bad url '{}': {}", path, e)))
    }

    async fn get(&self, path: &str) -> Result<Response, LoadError> {
        let url = self.resolve(path)?;
        tracing::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        check_status(response).await
    }
}

/// Map non-2xx responses to an error carrying the server's description
async fn check_status(response: Response) -> Result<Response, LoadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = error_message(response).await;
    Err(LoadError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.describe().map(str::to_string))
        .unwrap_or_else(|| format!("Server {}", status.as_u16()))
}

impl AnnotationBackend for HttpBackend {
    async fn list_scenes(&self) -> Result<Vec<String>, LoadError> {
        let list: SceneListResponse = self.get("api/scenes").await?.json().await?;
        Ok(list.scenes)
    }

    async fn get_regions(&self) -> Result<RegionMap, LoadError> {
        Ok(self.get("get_regions").await?.json().await?)
    }

    async fn load_scene(&self, scene_id: &str) -> Result<LoadSceneResponse, LoadError> {
        Ok(self.get(&format!("load_scene/{}", scene_id)).await?.json().await?)
    }

    async fn fetch_asset(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        Ok(self.get(url).await?.bytes().await?.to_vec())
    }

    async fn fetch_details(&self, url: &str) -> Result<DetailRecords, LoadError> {
        Ok(self.get(url).await?.json().await?)
    }

    async fn fetch_face_map(&self, url: &str) -> Result<Vec<u8>, LoadError> {
        Ok(self.get(url).await?.bytes().await?.to_vec())
    }

    async fn save_annotation(&self, request: &SaveAnnotationRequest) -> Result<SaveAnnotationResponse, SaveError> {
        let url = self
            .base
            .join("save_annotation")
            .map_err(|e| SaveError::Network(e.to_string()))?;
        let response = self.client.post(url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(SaveError::Rejected(error_message(response).await));
        }
        Ok(response.json().await?)
    }
}
