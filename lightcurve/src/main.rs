//! lightcurve CLI - create and run aperture photometry sessions.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use lightcurve::frame::timestamp::parse_timestamp;
use lightcurve::master_dark::MasterDark;
use lightcurve::session::first_frame_start;
use lightcurve::{
    Aperture, CentroidConfig, FitsDirectory, FrameSource, ReductionSession, Rejection,
    SessionConfig, SessionSetup, TimeAnchor,
};

#[derive(Parser)]
#[command(name = "lightcurve")]
#[command(about = "Resumable aperture photometry over a sequence of FITS frames")]
#[command(version)]
struct Cli {
    /// Log filter when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Also write a daily-rolling log file into this directory.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the header of a new session log.
    Init(InitArgs),

    /// Reduce every frame not yet in the session log.
    Run(RunArgs),

    /// Build (or reuse) a master dark from dark exposures.
    Dark(DarkArgs),
}

#[derive(Debug, Clone, Args)]
struct InitArgs {
    /// Directory holding the frames.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Session log to create.
    #[arg(long)]
    log: PathBuf,

    /// Frame name pattern, e.g. "run_*.fits".
    #[arg(long)]
    pattern: String,

    /// Region as x,y,r1,r2. Repeat for more regions.
    #[arg(long = "region", required = true, value_parser = parse_region)]
    regions: Vec<Aperture>,

    /// Reference time "YYYY-MM-DD HH:MM:SS". Defaults to the start of the
    /// first matching frame.
    #[arg(long)]
    start: Option<String>,

    /// Master dark frame name, relative to --dir.
    #[arg(long)]
    dark: Option<String>,
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Directory holding the frames.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Session log to resume.
    #[arg(long)]
    log: PathBuf,

    /// Instant of each exposure the relative time refers to.
    #[arg(long, value_enum, default_value_t = AnchorArg::Start)]
    time_anchor: AnchorArg,

    /// Centroid threshold above sky, in units of sky noise.
    #[arg(long, default_value = "3.0")]
    threshold_sigma: f64,

    /// Centroid refinement passes.
    #[arg(long, default_value = "1")]
    centroid_iterations: usize,

    /// Stop refining once the centroid moves less than this (px).
    #[arg(long, default_value = "5.0")]
    convergence_px: f64,
}

#[derive(Debug, Clone, Args)]
struct DarkArgs {
    /// Directory holding the dark exposures.
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Dark frame name pattern, e.g. "dark_*.fits".
    #[arg(long)]
    pattern: String,

    /// Output master dark path.
    #[arg(long)]
    out: PathBuf,

    /// Lowest samples dropped per pixel.
    #[arg(long, default_value = "0")]
    reject_low: usize,

    /// Highest samples dropped per pixel.
    #[arg(long, default_value = "0")]
    reject_high: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AnchorArg {
    Start,
    Mid,
}

impl From<AnchorArg> for TimeAnchor {
    fn from(value: AnchorArg) -> Self {
        match value {
            AnchorArg::Start => TimeAnchor::ExposureStart,
            AnchorArg::Mid => TimeAnchor::MidExposure,
        }
    }
}

fn parse_region(value: &str) -> Result<Aperture, String> {
    let numbers = value
        .split(',')
        .map(|n| n.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("'{value}': {e}"))?;
    let [x, y, r1, r2] = numbers[..] else {
        return Err(format!("'{value}': expected x,y,r1,r2"));
    };
    Aperture::new(x, y, r1, r2).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    common::log_setup::setup_logging(&cli.log_level, "lightcurve", cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Init(args) => init(args),
        Commands::Run(args) => run(args),
        Commands::Dark(args) => dark(args),
    }
}

fn init(args: InitArgs) -> Result<()> {
    let source = FitsDirectory::new(&args.dir);
    let start = match &args.start {
        Some(text) => parse_timestamp(text)
            .with_context(|| format!("Invalid start time '{text}'"))?,
        None => first_frame_start(&source, &args.pattern)
            .context("Cannot derive the start time from the first frame")?,
    };

    let mut setup = args
        .regions
        .into_iter()
        .fold(SessionSetup::new(&args.pattern, start), |s, r| s.with_region(r));
    if let Some(dark) = args.dark {
        setup = setup.with_dark_template(dark);
    }

    ReductionSession::create(&args.log, &setup)
        .with_context(|| format!("Failed to create session log {}", args.log.display()))
}

fn run(args: RunArgs) -> Result<()> {
    let source = FitsDirectory::new(&args.dir);
    let config = SessionConfig {
        time_anchor: args.time_anchor.into(),
        centroid: CentroidConfig {
            threshold_sigma: args.threshold_sigma,
            max_iterations: args.centroid_iterations,
            convergence_px: args.convergence_px,
        },
    };

    let mut session = ReductionSession::open(&args.log, &source)
        .with_context(|| format!("Failed to open session log {}", args.log.display()))?;
    let summary = session
        .run(&source, &config)
        .context("Reduction stopped")?;

    println!(
        "{} frames matched, {} already reduced, {} added, {} region failures",
        summary.matched, summary.skipped, summary.processed, summary.region_failures
    );
    Ok(())
}

fn dark(args: DarkArgs) -> Result<()> {
    let source = FitsDirectory::new(&args.dir);
    let inputs = source
        .list(&args.pattern)
        .with_context(|| format!("Failed to list dark frames '{}'", args.pattern))?;
    let rejection = Rejection {
        low: args.reject_low,
        high: args.reject_high,
    };

    let master = MasterDark::ensure(&args.out, &inputs, &source, rejection)
        .with_context(|| format!("Failed to build master dark {}", args.out.display()))?;
    println!(
        "Master dark {}x{} at {}",
        master.width(),
        master.height(),
        args.out.display()
    );
    Ok(())
}
