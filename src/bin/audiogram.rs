use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

use audiogram::block::{self, AdminScreen, image_size};
use audiogram::media::probe_image_dimensions;
use audiogram::{
    AudiogramConfig, BlockAttributes, CommandVariant, DirectoryLibrary, EditorSession, Engine,
    FfmpegExecutor, HeaderPolicy, MediaSource, TranscodeRequest, Transcoder,
};

#[derive(Parser, Debug)]
#[command(name = "audiogram", version)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render an audiogram MP4 from local files (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Run the editor create action on a block attribute file and store the result in a library.
    Create(CreateArgs),
    /// Print the cross-origin headers and the editor inline script.
    Headers(HeadersArgs),
    /// Print the block type metadata as JSON.
    BlockType,
    /// Check a background image against the allowed sizes.
    CheckImage(CheckImageArgs),
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum VariantArg {
    Classic,
    Encoded,
    Waveform,
}

impl From<VariantArg> for CommandVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Classic => CommandVariant::Classic,
            VariantArg::Encoded => CommandVariant::Encoded,
            VariantArg::Waveform => CommandVariant::Waveform,
        }
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Audio track.
    #[arg(long)]
    audio: PathBuf,

    /// Background image.
    #[arg(long)]
    image: PathBuf,

    /// WebVTT captions.
    #[arg(long)]
    captions: PathBuf,

    /// Caption font file; defaults to `font.path` from the config.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    /// Command shape.
    #[arg(long, value_enum)]
    variant: Option<VariantArg>,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// ffmpeg binary to run.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CreateArgs {
    /// Block attribute JSON; rewritten with the uploaded audiogram.
    #[arg(long)]
    attributes: PathBuf,

    /// Media library directory.
    #[arg(long)]
    library: PathBuf,

    /// Base URL for stored media; defaults to the library directory itself.
    #[arg(long)]
    base_url: Option<String>,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// ffmpeg binary to run.
    #[arg(long)]
    ffmpeg: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct HeadersArgs {
    /// The request renders the block editor.
    #[arg(long, default_value_t = false)]
    block_editor: bool,

    /// Admin page base.
    #[arg(long, default_value = "post.php")]
    screen_base: String,

    /// Send headers on every request.
    #[arg(long, default_value_t = false)]
    always: bool,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CheckImageArgs {
    /// Image to check.
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Create(args) => cmd_create(args),
        Command::Headers(args) => cmd_headers(args),
        Command::BlockType => cmd_block_type(),
        Command::CheckImage(args) => cmd_check_image(args),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AudiogramConfig> {
    match path {
        Some(p) => AudiogramConfig::from_path(p).context("load config"),
        None => Ok(AudiogramConfig::default()),
    }
}

fn transcoder(cfg: &AudiogramConfig, ffmpeg: Option<PathBuf>) -> Transcoder {
    let program = ffmpeg.unwrap_or_else(|| cfg.ffmpeg_path.clone());
    let engine = Arc::new(Engine::new(FfmpegExecutor::new(program)));
    engine.set_progress(|p| {
        tracing::info!("progress {:.0}%", p.ratio * 100.0);
    });
    Transcoder::new(engine, cfg.transcode_opts())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(v) = args.variant {
        cfg.variant = v.into();
    }
    let font = args
        .font
        .or_else(|| cfg.font.path.clone())
        .context("no caption font: pass --font or set font.path in the config")?;

    let req = TranscodeRequest {
        audio: MediaSource::Path(args.audio),
        image: MediaSource::Path(args.image),
        captions: MediaSource::Path(args.captions),
        font: MediaSource::Path(font),
    };
    let blob = transcoder(&cfg, args.ffmpeg).transcode(&req)?;

    audiogram::ensure_parent_dir(&args.out)?;
    std::fs::write(&args.out, &blob.bytes)
        .with_context(|| format!("write mp4 '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_create(args: CreateArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;

    let text = std::fs::read_to_string(&args.attributes)
        .with_context(|| format!("read attributes '{}'", args.attributes.display()))?;
    let mut attrs: BlockAttributes = serde_json::from_str(&text)
        .with_context(|| format!("parse attributes '{}'", args.attributes.display()))?;
    if attrs.font_src.is_none()
        && let Some(path) = &cfg.font.path
    {
        attrs.font_src = Some(path.display().to_string());
    }

    let base_url = args
        .base_url
        .clone()
        .unwrap_or_else(|| args.library.display().to_string());
    let library = DirectoryLibrary::open(&args.library, base_url)?;
    let transcoder = transcoder(&cfg, args.ffmpeg);

    let mut session = EditorSession::new(attrs).with_image_size_validation(cfg.validate_image_size);
    if let (Some(w), Some(h)) = (session.attributes.image_width, session.attributes.image_height)
        && cfg.validate_image_size
    {
        image_size::validate(w, h)?;
    }
    session.persist_pending_audio(&library)?;
    let item = session.create_audiogram(&transcoder, &library)?;

    let json = serde_json::to_string_pretty(&session.attributes)?;
    std::fs::write(&args.attributes, json)
        .with_context(|| format!("write attributes '{}'", args.attributes.display()))?;
    println!("{}", block::render_saved_markup(&session.attributes));
    eprintln!("uploaded audiogram {} -> {}", item.id, item.url);
    Ok(())
}

fn cmd_headers(args: HeadersArgs) -> anyhow::Result<()> {
    let cfg = load_config(args.config.as_deref())?;
    let policy = if args.always {
        HeaderPolicy::Always
    } else {
        cfg.header_policy
    };
    let screen = AdminScreen::new(args.screen_base, args.block_editor);
    for (name, value) in block::cross_origin_headers(&screen, policy) {
        println!("{name}: {value}");
    }
    let script = block::editor_inline_script(&cfg.plugin.text_domain, &cfg.plugin.plugin_url);
    println!("{}", serde_json::to_string(&script)?);
    Ok(())
}

fn cmd_block_type() -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&block::block_type_metadata())?
    );
    Ok(())
}

fn cmd_check_image(args: CheckImageArgs) -> anyhow::Result<()> {
    let bytes =
        std::fs::read(&args.path).with_context(|| format!("read '{}'", args.path.display()))?;
    let dims = probe_image_dimensions(&bytes)?;
    image_size::validate(dims.width, dims.height)?;
    println!("{dims} ok");
    Ok(())
}
