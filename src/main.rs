use clap::Parser;
use motion_grid::{
    ImageSequenceSampler, LogRenderer, MotionConfig, MotionError, MotionPipeline,
    PngDumpRenderer, RendererChain,
};
use std::path::PathBuf;
use tracing::{error, info};

/// Grid motion detector - plays back a directory of frames and reports motion per cell
#[derive(Parser)]
#[command(name = "motion_grid", version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file; defaults are used when omitted
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Directory of images played back as the video source
    #[arg(short, long, value_name = "DIR")]
    frames: PathBuf,

    /// Write each tick's difference image as a PNG into this directory
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Replay the frame directory forever
    #[arg(long)]
    loop_frames: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match MotionConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => MotionConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli, config)) {
        error!(error = %e, "motion pipeline failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: MotionConfig) -> Result<(), MotionError> {
    info!(
        frames = %cli.frames.display(),
        width = config.frame.width,
        height = config.frame.height,
        worker_threads = config.worker_threads(),
        "starting motion_grid"
    );

    let mut sampler = ImageSequenceSampler::new(&cli.frames, config.frame.width, config.frame.height)
        .mirrored(config.frame.mirror)
        .repeating(cli.loop_frames);

    let mut renderer = RendererChain::new().with(LogRenderer::new(config.render.draw_threshold));
    if let Some(dir) = &cli.dump_dir {
        renderer = renderer.with(PngDumpRenderer::new(dir)?);
        info!(dump_dir = %dir.display(), "writing difference images");
    }

    let mut pipeline = MotionPipeline::new(config)?;
    let outcome = pipeline
        .run(&mut sampler, &mut renderer, cli.max_ticks)
        .await;
    pipeline.shutdown().await;
    outcome.map(|_| ())
}
