use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use dyelot::{
    AssetManifest, AssetResolver, CompositorOpts, ControllerOpts, DEFAULT_OUTPUT_WIDTH,
    FsAssetSource, HexColor, RenderController, RenderRequest, RenderState, View,
};

#[derive(Parser, Debug)]
#[command(name = "dyelot", version)]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Compact,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a recolored garment preview as a JPEG.
    Render(RenderArgs),
    /// Print the layer resources a render would load, as JSON.
    Plan(PlanArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ViewChoice {
    Front,
    Back,
}

impl From<ViewChoice> for View {
    fn from(v: ViewChoice) -> Self {
        match v {
            ViewChoice::Front => View::Front,
            ViewChoice::Back => View::Back,
        }
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Garment asset manifest JSON. Relative layer paths resolve against its directory.
    #[arg(long)]
    manifest: PathBuf,

    /// Target color as #RRGGBB.
    #[arg(long)]
    color: String,

    /// Garment side.
    #[arg(long, value_enum, default_value_t = ViewChoice::Front)]
    view: ViewChoice,

    /// Design graphic (relative path, file:// or data: URI).
    #[arg(long)]
    design: Option<String>,

    /// Logical output width in pixels.
    #[arg(long, default_value_t = DEFAULT_OUTPUT_WIDTH)]
    width: u32,

    /// Pixel density factor.
    #[arg(long, default_value_t = 1.0)]
    dpr: f32,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = 90)]
    quality: u8,

    /// Skip the brightness pass applied to white garments.
    #[arg(long, default_value_t = false)]
    no_white_correction: bool,

    /// Give up after this many seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Output JPEG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Garment asset manifest JSON.
    #[arg(long)]
    manifest: PathBuf,

    /// Garment side.
    #[arg(long, value_enum, default_value_t = ViewChoice::Front)]
    view: ViewChoice,

    /// Design graphic reference.
    #[arg(long)]
    design: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Plan(args) => cmd_plan(args),
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let installed = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

fn resolver_for(manifest_path: &Path) -> anyhow::Result<AssetResolver<FsAssetSource>> {
    let manifest = AssetManifest::from_path(manifest_path)?;
    let root = manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    Ok(AssetResolver::new(manifest, FsAssetSource::new(root))?)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let resolver = resolver_for(&args.manifest)?;
    let color = HexColor::parse(&args.color)?;
    let mut request = RenderRequest::new(color)
        .with_output_width(args.width)
        .with_view(args.view.into());
    request.design_ref = args.design;

    let opts = ControllerOpts {
        compositor: CompositorOpts {
            device_pixel_ratio: args.dpr,
            jpeg_quality: args.quality,
            white_correction: !args.no_white_correction,
            ..CompositorOpts::default()
        },
        ..ControllerOpts::default()
    };

    let ctl = RenderController::new(resolver, request, opts)?;
    let img = match ctl.wait_settled(Duration::from_secs(args.timeout_secs)) {
        RenderState::Ready(img) => img,
        RenderState::Failed(f) => anyhow::bail!("{}", f.message),
        RenderState::Loading => anyhow::bail!("render timed out after {}s", args.timeout_secs),
    };

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, img.bytes())
        .with_context(|| format!("write jpeg '{}'", args.out.display()))?;

    let size = img.pixel_size();
    eprintln!(
        "wrote {} ({}x{}, {} bytes)",
        args.out.display(),
        size.width,
        size.height,
        img.bytes().len()
    );
    Ok(())
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let resolver = resolver_for(&args.manifest)?;
    let mut request = RenderRequest::new(HexColor::WHITE).with_view(args.view.into());
    request.design_ref = args.design;
    request.validate()?;

    let plan = resolver.plan(&request);
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
