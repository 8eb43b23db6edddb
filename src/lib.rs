//! Stig: training datasets for a camera-driven driving toy.
//!
//! The toy's recorder saves grayscale camera frames whose file names carry
//! the driver's throttle and steering input at capture time. Stig turns a
//! recordings tree into a compact, cached dataset of fixed-size frames and
//! label indices, and applies the same image normalization at inference time.
//!
//! # Modules
//!
//! - [`naming`]: the frame file name protocol
//! - [`label`]: label strings to class indices and back
//! - [`normalize`]: decode, grayscale and area-resize an image
//! - [`scan`]: frame discovery and freshness information
//! - [`dataset`]: cached dataset builds and the loader
//! - [`inspect`]: label distribution reports
//! - [`error`]: error types for stig operations

pub mod dataset;
pub mod error;
pub mod inspect;
pub mod label;
pub mod naming;
pub mod normalize;
pub mod scan;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub use error::StigError;
pub use label::LabelCodec;
pub use normalize::FrameSize;

/// The stig CLI application.
#[derive(Parser)]
#[command(name = "stig")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Build the dataset for a model, reusing the cached one if it is fresh.
    Build(BuildArgs),
    /// Print a summary of a built dataset.
    Inspect(InspectArgs),
    /// Check a built dataset, including its payload checksum.
    Verify(DatasetArgs),
    /// Normalize a single image and write the result as PNG.
    Preview(PreviewArgs),
}

/// Settings shared by every command that touches a built dataset.
#[derive(clap::Args)]
struct DatasetArgs {
    /// Name of the model the dataset is built for.
    #[arg(long, env = "MODEL_NAME")]
    model_name: String,

    /// Directory holding built datasets.
    #[arg(long, env = "DATASETS_DIR")]
    datasets_dir: PathBuf,

    #[command(flatten)]
    frame: FrameArgs,
}

#[derive(clap::Args)]
struct FrameArgs {
    /// Height of normalized frames, in pixels.
    #[arg(long, env = "FRAME_HEIGHT")]
    frame_height: u32,

    /// Width of normalized frames, in pixels.
    #[arg(long, env = "FRAME_WIDTH")]
    frame_width: u32,
}

impl FrameArgs {
    fn frame_size(&self) -> Result<FrameSize, StigError> {
        FrameSize::new(self.frame_height, self.frame_width)
    }
}

#[derive(clap::Args)]
struct BuildArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Directory holding recorded frames.
    #[arg(long, env = "RECORDINGS_DIR")]
    recordings_dir: PathBuf,

    /// Rebuild even if the cached dataset is fresh.
    #[arg(long)]
    force: bool,

    /// Decode frames on a single thread.
    #[arg(long)]
    sequential: bool,

    /// Do not show a progress bar.
    #[arg(long)]
    no_progress: bool,
}

#[derive(clap::Args)]
struct InspectArgs {
    #[command(flatten)]
    dataset: DatasetArgs,

    /// Output format for the report.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    output: ReportFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(clap::Args)]
struct PreviewArgs {
    /// Image to normalize.
    input: PathBuf,

    /// Where to write the normalized PNG.
    output: PathBuf,

    #[command(flatten)]
    frame: FrameArgs,
}

/// Run the stig CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), StigError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build(args)) => run_build(args),
        Some(Commands::Inspect(args)) => run_inspect(args),
        Some(Commands::Verify(args)) => run_verify(args),
        Some(Commands::Preview(args)) => run_preview(args),
        None => {
            println!("stig {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Builds and caches training datasets from recorded frames.");
            println!();
            println!("Run 'stig --help' for usage information.");
            Ok(())
        }
    }
}

/// Installs the global tracing subscriber, writing to stderr.
///
/// The filter comes from `STIG_LOG`, then `RUST_LOG`, then defaults to `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("STIG_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_build(args: BuildArgs) -> Result<(), StigError> {
    let mut config = dataset::BuildConfig::new(
        args.dataset.model_name,
        args.recordings_dir,
        args.dataset.datasets_dir,
        args.dataset.frame.frame_size()?,
    );
    config.force = args.force;
    config.parallel = !args.sequential;
    config.progress = !args.no_progress;

    let outcome = dataset::build_dataset(&config, &LabelCodec::standard())?;
    let artifact = &outcome.artifact;

    match outcome.status {
        dataset::CacheStatus::Fresh => println!("Dataset is up to date."),
        dataset::CacheStatus::Rebuilt(reason) => println!("Dataset rebuilt ({reason})."),
    }
    println!("  frames:     {}", artifact.len);
    println!("  frame size: {}", artifact.frame_size);
    println!("  manifest:   {}", artifact.manifest_path.display());
    println!("  images:     {}", artifact.images_path.display());
    Ok(())
}

fn open_dataset(
    args: &DatasetArgs,
    verify_checksum: bool,
) -> Result<dataset::LoadedDataset, StigError> {
    dataset::validate_model_name(&args.model_name)?;
    let manifest_path = dataset::manifest_path(&args.datasets_dir, &args.model_name);
    let options = dataset::LoadOptions {
        verify_checksum,
        ..Default::default()
    };
    dataset::LoadedDataset::open(&manifest_path, args.frame.frame_size()?, &options)
}

fn run_inspect(args: InspectArgs) -> Result<(), StigError> {
    let dataset = open_dataset(&args.dataset, false)?;
    let report = inspect::inspect_dataset(&dataset, &LabelCodec::standard());

    match args.output {
        ReportFormat::Text => print!("{report}"),
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(std::io::Error::from)?;
            println!("{json}");
        }
    }
    Ok(())
}

fn run_verify(args: DatasetArgs) -> Result<(), StigError> {
    let dataset = open_dataset(&args, true)?;
    println!(
        "Dataset OK: {} frames of {} ({})",
        dataset.len(),
        dataset.frame_size(),
        dataset.images_path().display()
    );
    Ok(())
}

fn run_preview(args: PreviewArgs) -> Result<(), StigError> {
    let size = args.frame.frame_size()?;
    let image = normalize::normalize_from_path(&args.input, size)?;
    image.save_png(&args.output)?;
    println!("Wrote {} frame to {}", size, args.output.display());
    Ok(())
}
