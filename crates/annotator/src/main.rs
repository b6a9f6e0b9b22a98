use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use glam::{Vec2, Vec3};

use annotator_lib::app::Annotator;
use annotator_lib::net::HttpBackend;
use annotator_lib::state::{AnnotatorSettings, ViewerSession};
use annotator_lib::viewport::camera::ViewportRect;
use annotator_lib::viewport::picking::PickResult;
use annotator_lib::viewport::scene_graph::HeadlessScene;

/// Headless annotation run: load a scene, pick one instance and save a label.
#[derive(Parser, Debug)]
#[command(name = "annotator", version, about, long_about = None)]
struct CliArgs {
    /// Base URL of the annotation backend; overrides the settings file
    #[arg(long, env = "ANNOTATOR_BACKEND_URL")]
    backend: Option<String>,

    /// Print the scenes the backend offers
    #[arg(long, default_value_t = false)]
    list: bool,

    #[arg(long)]
    scene: Option<String>,

    /// Viewport size in pixels
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], default_values_t = [1280.0, 720.0])]
    viewport: Vec<f32>,

    /// Click position in page pixels
    #[arg(long, num_args = 2, value_names = ["X", "Y"], conflicts_with = "face")]
    click: Option<Vec<f32>>,

    /// Pick this face directly instead of casting a ray
    #[arg(long)]
    face: Option<usize>,

    /// Final label; defaults to the instance's detail label
    #[arg(long)]
    label: Option<String>,

    /// Referring expression; required to save
    #[arg(long)]
    query: Option<String>,

    /// Region label or code from the region table
    #[arg(long)]
    region: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "annotator=info,annotator_lib=info".into()),
        )
        .init();

    let args = CliArgs::parse();

    let mut settings = AnnotatorSettings::load();
    if let Some(url) = args.backend.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        settings.backend_url = url.to_string();
    }
    let backend = Arc::new(HttpBackend::new(&settings).context("invalid backend configuration")?);
    tracing::info!("backend: {}", backend.base());

    let &[width, height, ..] = args.viewport.as_slice() else {
        bail!("--viewport needs a width and a height");
    };
    let session = ViewerSession::new(settings, HeadlessScene::new(), ViewportRect::sized(width, height))
        .context("cannot initialise viewer session")?;
    let mut annotator = Annotator::new(backend, session);

    if args.list {
        for scene in annotator.list_scenes().await? {
            println!("{scene}");
        }
    }

    let Some(scene_id) = args.scene.as_deref() else {
        if !args.list {
            println!("nothing to do (use --scene <id> or --list)");
        }
        return Ok(());
    };

    if let Err(e) = annotator.refresh_regions().await {
        tracing::warn!("continuing without regions: {}", e);
    }
    let report = annotator
        .load_scene(scene_id)
        .await
        .with_context(|| format!("failed to load scene {scene_id}"))?;
    println!(
        "scene {scene_id}: {} saved annotations drawn, {} skipped",
        report.displayed,
        report.skipped()
    );

    let result = match (args.face, args.click.as_deref()) {
        (Some(face), _) => annotator.session.handle_face_hit(face, Vec3::ZERO),
        (None, Some(&[x, y])) => annotator.session.handle_click(Vec2::new(x, y)),
        _ => return Ok(()),
    };
    let hit = match result {
        Some(PickResult::Hit(hit)) => hit,
        Some(PickResult::Miss) => bail!("click hit nothing"),
        Some(other) => bail!("pick failed: {}", other.error().map(|e| e.to_string()).unwrap_or_default()),
        None => bail!("scene not ready"),
    };
    println!(
        "picked instance {} '{}' (category {}, region {} / {})",
        hit.instance_id, hit.detail.label, hit.detail.category_id, hit.detail.region_label, hit.detail.region_code
    );

    if let Some(selected) = annotator.session.confirm_pending() {
        match &selected.bounding_box {
            Some(b) => println!(
                "bounding box: min ({:.3}, {:.3}, {:.3}) max ({:.3}, {:.3}, {:.3})",
                b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
            ),
            None => println!("no bounding box"),
        }
    }

    let Some(query) = args.query else {
        return Ok(());
    };
    if let Some(label) = args.label {
        annotator.session.form.label = label;
    }
    annotator.session.form.query = query;
    if let Some(region) = args.region.as_deref() {
        let choices = annotator.session.regions().clone();
        if !annotator.session.form.select_region(&choices, region) {
            tracing::warn!("unknown region '{}', keeping the instance's region", region);
        }
    }

    let saved = annotator.save().await.context("save failed")?;
    println!("saved '{}'", saved.final_label);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("annotator").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_full_run() {
        let args = parse(&[
            "--scene", "S1", "--face", "4", "--label", "dining table", "--query", "near window",
        ])
        .unwrap();
        assert_eq!(args.scene.as_deref(), Some("S1"));
        assert_eq!(args.face, Some(4));
        assert_eq!(args.label.as_deref(), Some("dining table"));
        assert_eq!(args.query.as_deref(), Some("near window"));
        assert_eq!(args.viewport, vec![1280.0, 720.0]);
    }

    #[test]
    fn test_parse_pairs_and_errors() {
        let args = parse(&["--click", "10", "20", "--viewport", "800", "600"]).unwrap();
        assert_eq!(args.click, Some(vec![10.0, 20.0]));
        assert_eq!(args.viewport, vec![800.0, 600.0]);

        assert!(parse(&["--scene"]).is_err());
        assert!(parse(&["--face", "x"]).is_err());
        assert!(parse(&["--click", "10"]).is_err());
        assert!(parse(&["--face", "1", "--click", "1", "2"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        CliArgs::command().debug_assert();
    }
}
