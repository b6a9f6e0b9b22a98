//! Server configuration from flags and the environment

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

pub const DEFAULT_ANNOTATION_DIR: &str = "./annotations/";
pub const DEFAULT_LABEL_INFO_FILE: &str = "./data/catergory_mapping.txt";
pub const DEFAULT_TEMP_DIR: &str = "./temp_glb_spark/";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5004";

/// Annotation backend serving preprocessed scenes and storing labels.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "server", version, about, long_about = None)]
pub struct ServerConfig {
    /// One `{scene_id}.jsonl` per scene
    #[arg(long, env = "ANNOTATION_DIR", default_value = DEFAULT_ANNOTATION_DIR)]
    pub annotation_dir: PathBuf,

    /// Tab-separated category mapping (id, _, name, ...)
    #[arg(long, env = "LABEL_INFO_FILE", default_value = DEFAULT_LABEL_INFO_FILE)]
    pub label_info_file: PathBuf,

    /// Preprocessed `{scene}_mesh.glb`, `_details.json`, `_face_map.bin`
    #[arg(long, env = "TEMP_DIR", default_value = DEFAULT_TEMP_DIR)]
    pub temp_dir: PathBuf,

    #[arg(long, env = "BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: SocketAddr,
}
