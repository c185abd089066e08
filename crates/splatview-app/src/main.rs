//! splatview - Desktop viewer for Gaussian-splat scenes
//!
//! Accepts `.ply`, `.splat`, and `.ksplat` scenes from a file picker,
//! drag-and-drop, a startup argument, or a remote URL, and streams them
//! into the external splat renderer.

mod app;
mod camera;
mod render;
mod ui;

use anyhow::Result;
use clap::Parser;
use splatview_core::SceneSource;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "splatview")]
#[command(about = "Desktop viewer for Gaussian-splat scenes (.ply, .splat, .ksplat)")]
#[command(version)]
struct Args {
    /// Scene file to open on startup
    scene: Option<PathBuf>,

    /// Stream a remote scene on startup instead of opening a local file
    #[arg(long, conflicts_with = "scene")]
    url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("splatview v{}", env!("CARGO_PKG_VERSION"));

    let startup = args
        .url
        .map(SceneSource::Url)
        .or(args.scene.map(SceneSource::File));

    app::run(startup);

    Ok(())
}
