//! Cancellable scene loading with a single in-flight slot.
//!
//! Starting a load aborts the previous task and bumps the generation; any
//! event still queued from an older generation is discarded on receipt.

use std::sync::Arc;

use shared::SavedAnnotationMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::AnnotationBackend;
use crate::assets::details::InstanceDetailTable;
use crate::assets::face_map::FaceInstanceIndex;
use crate::assets::glb::decode_glb;
use crate::error::LoadError;
use crate::viewport::mesh::MeshNode;

/// Everything a scene needs before picking is enabled
#[derive(Clone, Debug)]
pub struct SceneBundle {
    pub scene_id: String,
    pub root: MeshNode,
    pub faces: FaceInstanceIndex,
    pub details: InstanceDetailTable,
    pub existing_annotations: SavedAnnotationMap,
}

#[derive(Debug)]
pub enum LoadEvent {
    Progress(String),
    Loaded(Box<SceneBundle>),
    Failed(LoadError),
}

impl LoadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadEvent::Progress(_))
    }
}

type Tagged = (u64, LoadEvent);

pub struct SceneLoader<B> {
    backend: Arc<B>,
    generation: u64,
    current: Option<(String, JoinHandle<()>)>,
    tx: mpsc::UnboundedSender<Tagged>,
    rx: mpsc::UnboundedReceiver<Tagged>,
}

impl<B: AnnotationBackend> SceneLoader<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            generation: 0,
            current: None,
            tx,
            rx,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Scene id of the load in flight
    pub fn loading(&self) -> Option<&str> {
        self.current.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start loading `scene_id`, cancelling whatever was in flight.
    /// Must be called within a tokio runtime.
    pub fn start(&mut self, scene_id: &str) -> u64 {
        self.cancel();
        let generation = self.generation;
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        let id = scene_id.to_string();

        let handle = tokio::spawn(async move {
            let progress_tx = tx.clone();
            let progress = move |msg: String| {
                let _ = progress_tx.send((generation, LoadEvent::Progress(msg)));
            };
            let event = match fetch_scene_bundle(backend.as_ref(), &id, &progress).await {
                Ok(bundle) => LoadEvent::Loaded(Box::new(bundle)),
                Err(e) => LoadEvent::Failed(e),
            };
            let _ = tx.send((generation, event));
        });
        tracing::info!("loading scene {} (generation {})", scene_id, generation);
        self.current = Some((scene_id.to_string(), handle));
        generation
    }

    /// Abort the in-flight load; its events are never delivered
    pub fn cancel(&mut self) {
        if let Some((id, handle)) = self.current.take() {
            handle.abort();
            tracing::info!("cancelled load of scene {}", id);
        }
        self.generation += 1;
    }

    /// Next event of the current load without waiting
    pub fn try_next(&mut self) -> Option<LoadEvent> {
        while let Ok((generation, event)) = self.rx.try_recv() {
            if let Some(event) = self.accept(generation, event) {
                return Some(event);
            }
        }
        None
    }

    /// Wait for the next event of the current load; `None` when idle
    pub async fn next_event(&mut self) -> Option<LoadEvent> {
        loop {
            if self.current.is_none() {
                return self.try_next();
            }
            let (generation, event) = self.rx.recv().await?;
            if let Some(event) = self.accept(generation, event) {
                return Some(event);
            }
        }
    }

    fn accept(&mut self, generation: u64, event: LoadEvent) -> Option<LoadEvent> {
        if generation != self.generation {
            tracing::debug!("dropping event of stale load generation {}", generation);
            return None;
        }
        if event.is_terminal() {
            self.current = None;
        }
        Some(event)
    }
}

impl<B> Drop for SceneLoader<B> {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.current.take() {
            handle.abort();
        }
    }
}

/// Manifest, then asset + details + face map concurrently; the first
/// failure drops the other fetches.
pub async fn fetch_scene_bundle<B: AnnotationBackend>(
    backend: &B,
    scene_id: &str,
    progress: &(dyn Fn(String) + Send + Sync),
) -> Result<SceneBundle, LoadError> {
    progress(format!("Requesting scene {}...", scene_id));
    let manifest = backend.load_scene(scene_id).await?;
    let urls = manifest.asset_urls().ok_or_else(|| {
        LoadError::InvalidManifest(
            manifest
                .message
                .clone()
                .unwrap_or_else(|| format!("status '{}' or missing asset urls", manifest.status)),
        )
    })?;

    progress(format!("Loading assets for {}...", scene_id));
    let (glb, records, face_bytes) = tokio::try_join!(
        backend.fetch_asset(&urls.glb_url),
        backend.fetch_details(&urls.details_url),
        backend.fetch_face_map(&urls.face_map_url),
    )?;

    progress("Processing model...".to_string());
    let root = decode_glb(&glb)?;
    let faces = FaceInstanceIndex::from_le_bytes(&face_bytes);
    let details = InstanceDetailTable::from_records(records);

    let triangles = root.triangle_count();
    if faces.len() != triangles {
        tracing::warn!(
            "face map has {} entries but the mesh has {} triangles",
            faces.len(),
            triangles
        );
    }
    tracing::info!(
        "scene {}: {} faces, {} instances, {} details",
        scene_id,
        faces.len(),
        faces.instance_ids().len(),
        details.len()
    );

    Ok(SceneBundle {
        scene_id: scene_id.to_string(),
        root,
        faces,
        details,
        existing_annotations: manifest.existing_annotations.unwrap_or_default(),
    })
}
