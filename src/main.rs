mod app;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tiny_rasterizer::RenderConfig;

#[derive(Parser)]
#[command(name = "tiny_rasterizer", about = "Software rasterizer with a first person camera")]
struct Cli {
    /// YAML render config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// OBJ mesh shown instead of the built-in demo scene
    #[arg(short = 'p', long)]
    asset_path: Option<PathBuf>,

    /// Frame buffer width, overrides the config
    #[arg(long)]
    width: Option<u32>,

    /// Frame buffer height, overrides the config
    #[arg(long)]
    height: Option<u32>,

    /// Render without a window and write the last frame to this PNG file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of frames rendered in headless mode
    #[arg(long, default_value = "1")]
    frames: u32,

    /// Log frames per second
    #[arg(long)]
    print_fps: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[show_image::main]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => RenderConfig::load(path)?,
        None => RenderConfig::default(),
    };
    if let Some(width) = cli.width {
        config.width = width;
    }
    if let Some(height) = cli.height {
        config.height = height;
    }

    let params = app::Params {
        config,
        asset_path: cli.asset_path,
        output: cli.output,
        frames: cli.frames,
        print_fps: cli.print_fps,
    };

    app::run(params)?;

    return Ok(());
}
