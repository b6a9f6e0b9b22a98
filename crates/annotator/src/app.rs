//! Async driver tying a [`ViewerSession`] to a backend and the scene loader.

use std::sync::Arc;

use shared::{SaveAnnotationRequest, SaveAnnotationResponse, SavedAnnotation};

use crate::error::{LoadError, SaveError};
use crate::net::loader::{LoadEvent, SceneLoader};
use crate::net::AnnotationBackend;
use crate::state::{Feedback, ViewerSession};
use crate::viewport::scene_graph::SceneGraph;
use crate::viewport::visuals::RedisplayReport;

pub struct Annotator<B: AnnotationBackend, G: SceneGraph> {
    pub session: ViewerSession<G>,
    loader: SceneLoader<B>,
}

impl<B: AnnotationBackend, G: SceneGraph> Annotator<B, G> {
    pub fn new(backend: Arc<B>, session: ViewerSession<G>) -> Self {
        Self {
            session,
            loader: SceneLoader::new(backend),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        self.loader.backend()
    }

    pub async fn list_scenes(&self) -> Result<Vec<String>, LoadError> {
        self.backend().list_scenes().await
    }

    /// Fetch the region table; on failure the dropdown is left empty
    pub async fn refresh_regions(&mut self) -> Result<usize, LoadError> {
        let result = self.backend().get_regions().await;
        match result {
            Ok(regions) => {
                self.session.set_regions(&regions);
                Ok(self.session.regions().len())
            }
            Err(e) => {
                tracing::error!("failed to fetch regions: {}", e);
                self.session.set_regions(&Default::default());
                Err(e)
            }
        }
    }

    /// Clear the session and start loading `scene_id` in the background,
    /// cancelling any load in flight.
    pub fn start_load(&mut self, scene_id: &str) {
        self.session.begin_scene_load(scene_id);
        self.loader.start(scene_id);
    }

    pub fn cancel_load(&mut self) {
        self.loader.cancel();
        self.session.cancel_scene_load();
    }

    /// Apply queued loader events without waiting; returns the outcome once
    /// the current load finished.
    pub fn poll(&mut self) -> Option<Result<RedisplayReport, LoadError>> {
        while let Some(event) = self.loader.try_next() {
            if let Some(outcome) = self.apply_event(event) {
                return Some(outcome);
            }
        }
        None
    }

    /// Wait until the current load finishes
    pub async fn wait_for_load(&mut self) -> Result<RedisplayReport, LoadError> {
        while let Some(event) = self.loader.next_event().await {
            if let Some(outcome) = self.apply_event(event) {
                return outcome;
            }
        }
        Err(LoadError::Cancelled)
    }

    pub async fn load_scene(&mut self, scene_id: &str) -> Result<RedisplayReport, LoadError> {
        self.start_load(scene_id);
        self.wait_for_load().await
    }

    fn apply_event(&mut self, event: LoadEvent) -> Option<Result<RedisplayReport, LoadError>> {
        match event {
            LoadEvent::Progress(message) => {
                tracing::debug!("{}", message);
                self.session.push_feedback(Feedback::Loading(message));
                None
            }
            LoadEvent::Loaded(bundle) => Some(
                self.session
                    .finish_scene_load(*bundle)
                    .ok_or(LoadError::Cancelled),
            ),
            LoadEvent::Failed(e) => {
                self.session.fail_scene_load(&e);
                Some(Err(e))
            }
        }
    }

    /// Validate the selected instance's form and detach the request so the
    /// session stays usable while it is sent.
    pub fn start_save(&mut self) -> Result<SaveTask<B>, SaveError> {
        let request = self.session.begin_save()?;
        Ok(SaveTask {
            backend: Arc::clone(self.loader.backend()),
            request,
        })
    }

    pub fn apply_save_result(&mut self, reply: SaveReply) -> Result<SavedAnnotation, SaveError> {
        self.session.complete_save(&reply.instance_id, reply.result)
    }

    /// Validate, send and apply one save of the selected instance
    pub async fn save(&mut self) -> Result<SavedAnnotation, SaveError> {
        let task = self.start_save()?;
        let reply = task.send().await;
        self.apply_save_result(reply)
    }
}

/// A validated save request on its way to the backend
pub struct SaveTask<B: AnnotationBackend> {
    backend: Arc<B>,
    request: SaveAnnotationRequest,
}

impl<B: AnnotationBackend> SaveTask<B> {
    pub fn instance_id(&self) -> &str {
        &self.request.instance_id
    }

    pub fn request(&self) -> &SaveAnnotationRequest {
        &self.request
    }

    pub async fn send(self) -> SaveReply {
        let result = self.backend.save_annotation(&self.request).await;
        SaveReply {
            instance_id: self.request.instance_id,
            result,
        }
    }
}

/// Backend answer for one [`SaveTask`]
#[derive(Debug)]
pub struct SaveReply {
    pub instance_id: String,
    pub result: Result<SaveAnnotationResponse, SaveError>,
}
