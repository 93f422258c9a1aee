//! Headless driver: loads a model into a viewer, applies display toggles and
//! runs the render loop against the recording renderer.

use clap::Parser;
use model_viewer::app::{FrameTiming, HeadlessHost, ViewerShell};
use model_viewer::assets::{AssetRef, BundleError, ResourceBundle};
use model_viewer::render::HeadlessRenderer;
use model_viewer::viewer::ViewerServices;
use model_viewer::{ConfigError, ViewerOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(name = "model-viewer", version, about = "Load and render a glTF model")]
struct Cli {
    /// glTF/GLB file path or URL; falls back to `model` from the config file
    model: Option<String>,
    /// Directory whose files are offered as the resource bundle
    #[arg(long)]
    resources: Option<PathBuf>,
    /// Prefix prepended to relative references before bundle lookup
    #[arg(long, default_value = "")]
    root_path: String,
    /// JSON viewer options
    #[arg(long)]
    config: Option<PathBuf>,
    /// Environment id from the catalog
    #[arg(long)]
    environment: Option<String>,
    #[arg(long)]
    grid: bool,
    #[arg(long)]
    wireframe: bool,
    #[arg(long)]
    skeleton: bool,
    /// Show the environment as background
    #[arg(long)]
    background: bool,
    /// Frames to render, 0 renders until interrupted
    #[arg(long, default_value_t = 1)]
    frames: u64,
    #[arg(long, default_value_t = 1280)]
    width: u32,
    #[arg(long, default_value_t = 720)]
    height: u32,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no model given on the command line or in the config")]
    NoModel,
    #[error("unable to show {0}")]
    LoadFailed(String),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut options = match &cli.config {
        Some(path) => ViewerOptions::from_json_file(path)?,
        None => ViewerOptions::default(),
    };
    options.grid |= cli.grid;
    let model = cli.model.clone().or_else(|| options.model.take()).ok_or(CliError::NoModel)?;

    let (asset, bundle) = prepare_asset(&model, cli.resources.as_deref())?;
    let host = HeadlessHost::new((cli.width, cli.height));
    let mut shell = ViewerShell::new(
        HeadlessRenderer::new(),
        host,
        options,
        ViewerServices::default(),
    );
    shell.on_load(|model| {
        log::info!(
            "Showing {}: {} scenes in document, clips {:?}",
            model.url,
            model.scene_count,
            model.clips
        );
    });

    if shell.view(asset, &cli.root_path, &bundle).is_none() {
        return Err(CliError::LoadFailed(model));
    }

    shell.viewer_mut().update_state(|state| {
        if let Some(environment) = &cli.environment {
            state.environment = environment.clone();
        }
        state.wireframe |= cli.wireframe;
        state.skeleton |= cli.skeleton;
        state.background |= cli.background;
    });

    let mut timing = FrameTiming::new();
    let mut rendered = 0u64;
    while cli.frames == 0 || rendered < cli.frames {
        let frame_start = Instant::now();
        timing.update(frame_start);
        shell.animate(timing.elapsed_ms(frame_start));
        timing.set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);
        rendered += 1;
        if cli.frames == 0 || rendered < cli.frames {
            std::thread::sleep(FRAME_INTERVAL.saturating_sub(frame_start.elapsed()));
        }
    }

    let renderer = shell.viewer().renderer();
    if let Some(frame) = &renderer.last_frame {
        log::info!(
            "Rendered {} frames at {}x{}: {} nodes, {} meshes, {} lights, environment {:?}",
            renderer.frames,
            renderer.width,
            renderer.height,
            frame.nodes,
            frame.meshes,
            frame.lights,
            frame.environment
        );
    }
    Ok(())
}

/// Local files are read into memory and shown with their directory as the bundle,
/// unless `--resources` names another one. Anything else is passed as a URL.
fn prepare_asset(
    model: &str,
    resources: Option<&Path>,
) -> Result<(AssetRef, ResourceBundle), CliError> {
    let path = Path::new(model);
    let bundle_dir = resources.or_else(|| path.is_file().then(|| path.parent()).flatten());
    let bundle = match bundle_dir {
        Some(dir) if dir.as_os_str().is_empty() => ResourceBundle::from_dir(Path::new("."))?,
        Some(dir) => ResourceBundle::from_dir(dir)?,
        None => ResourceBundle::new(),
    };
    if !path.is_file() {
        return Ok((AssetRef::from(model), bundle));
    }
    let bytes = std::fs::read(path).map_err(|source| CliError::Read {
        path: model.to_string(),
        source,
    })?;
    log::info!(
        "Read {} ({} bytes), bundle holds {} files",
        model,
        bytes.len(),
        bundle.len()
    );
    Ok((AssetRef::from(bytes), bundle))
}
