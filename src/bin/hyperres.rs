use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hyperres", version)]
struct Cli {
    /// Engine configuration JSON. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upscale a still image to PNG.
    Image(ImageArgs),
    /// Upscale a video to MP4 (file input requires the `media-ffmpeg` feature).
    Video(VideoArgs),
    /// Print host capabilities and the safe-zone table as JSON.
    Caps,
}

#[derive(Parser, Debug)]
struct ImageArgs {
    /// Input image (any format the `image` crate decodes).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Output edge length: 256, 512, 1024, 2048, 4096, 8192 or 16384.
    #[arg(long, default_value_t = 1024)]
    resolution: u32,

    /// Algorithm id, matched case-insensitively (ATOMIC, QUANTUM, WAVELET, ...).
    #[arg(long)]
    algorithm: Option<String>,

    /// Decoration rng seed.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Parser, Debug)]
struct VideoArgs {
    /// Input video file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 256)]
    resolution: u32,

    #[arg(long)]
    algorithm: Option<String>,

    /// Keyframe stride in nominal frames.
    #[arg(long)]
    interval: Option<u32>,

    #[arg(long, value_enum)]
    codec: Option<CodecChoice>,

    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CodecChoice {
    H264,
    Png,
}

impl From<CodecChoice> for hyperres::CodecProfile {
    fn from(c: CodecChoice) -> Self {
        match c {
            CodecChoice::H264 => hyperres::CodecProfile::H264Main,
            CodecChoice::Png => hyperres::CodecProfile::Png,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = load_opts(cli.config.as_deref())?;
    match cli.cmd {
        Command::Image(args) => cmd_image(opts, args),
        Command::Video(args) => cmd_video(opts, args),
        Command::Caps => cmd_caps(opts),
    }
}

fn load_opts(path: Option<&Path>) -> anyhow::Result<hyperres::EngineOpts> {
    match path {
        Some(p) => Ok(hyperres::EngineOpts::from_path(p)?),
        None => Ok(hyperres::EngineOpts::default()),
    }
}

fn log_progress(pct: u8) {
    tracing::debug!(progress = pct, "job progress");
}

fn cmd_image(mut opts: hyperres::EngineOpts, args: ImageArgs) -> anyhow::Result<()> {
    if let Some(seed) = args.seed {
        opts.synth.seed = seed;
    }
    let resolution = hyperres::Resolution::from_px(args.resolution)?;
    let bytes = std::fs::read(&args.in_path)
        .with_context(|| format!("read image '{}'", args.in_path.display()))?;
    let source = hyperres::decode_raster(&bytes)?;

    let engine = hyperres::Engine::new(opts)?;
    let req = hyperres::ImageRequest::new(Some(source), resolution)
        .with_label(args.in_path.display().to_string())
        .with_algorithm_id(args.algorithm.as_deref());
    let png = engine.process_image(&req, Some(&log_progress), &hyperres::CancelToken::new())?;

    write_output(&args.out, &png)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_video(mut opts: hyperres::EngineOpts, args: VideoArgs) -> anyhow::Result<()> {
    if let Some(seed) = args.seed {
        opts.synth.seed = seed;
    }
    if let Some(codec) = args.codec {
        opts.encode.codec = codec.into();
    }
    let resolution = hyperres::Resolution::from_px(args.resolution)?;
    let mut source = hyperres::FfmpegVideoSource::open(&args.in_path)?;

    let engine = hyperres::Engine::new(opts)?;
    let req = hyperres::VideoRequest {
        keyframe_interval: args.interval,
        ..hyperres::VideoRequest::new(resolution).with_algorithm_id(args.algorithm.as_deref())
    };
    let Some(mp4) = engine.process_video(
        &mut source,
        &req,
        Some(&log_progress),
        &hyperres::CancelToken::new(),
    )?
    else {
        anyhow::bail!(
            "codec '{}' is not available on this host",
            engine.opts().encode.codec.label()
        );
    };

    write_output(&args.out, &mp4)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_caps(opts: hyperres::EngineOpts) -> anyhow::Result<()> {
    let engine = hyperres::Engine::new(opts)?;
    let json = serde_json::to_string_pretty(&engine.capability_report())
        .context("serialize capability report")?;
    println!("{json}");
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))
}
