use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use axum::{
    routing::{get, post},
    Router,
};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod labels;
mod regions;
mod routes;
mod store;

use config::ServerConfig;
use labels::LabelRegistry;
use store::AnnotationStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub labels: Arc<Mutex<LabelRegistry>>,
    pub store: Arc<AnnotationStore>,
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(routes::health))
        .route("/api/scenes", get(routes::list_scenes))
        .route("/get_regions", get(routes::get_regions))
        .route("/load_scene/{scene_id}", get(routes::load_scene))
        .route("/temp_files/{*filename}", get(routes::temp_files))
        .route("/save_annotation", post(routes::save_annotation))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("server=info")))
        .init();

    let config = ServerConfig::parse();
    tokio::fs::create_dir_all(&config.annotation_dir)
        .await
        .with_context(|| format!("creating {}", config.annotation_dir.display()))?;
    if !config.temp_dir.is_dir() {
        tracing::warn!("asset directory {} does not exist", config.temp_dir.display());
    }

    let labels = LabelRegistry::load(&config.label_info_file);
    if labels.is_empty() {
        tracing::warn!("no known labels, every saved label gets a new id");
    }
    let bind_addr = config.bind_addr;
    let state = AppState {
        store: Arc::new(AnnotationStore::new(config.annotation_dir.clone())),
        labels: Arc::new(Mutex::new(labels)),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    tracing::info!("annotations stored in {}", state.store.dir().display());
    tracing::info!("annotation server running on http://{}", bind_addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
