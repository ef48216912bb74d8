//! vegchange CLI - vegetation change detection and accuracy assessment

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use vegchange_algorithms::imagery::{classify, ClassifyParams};
use vegchange_algorithms::sampling::{stratified_sample, StratifiedParams};
use vegchange_algorithms::validation::validate;
use vegchange_cloud::{StacCatalog, StacClient, StacClientOptions, StacProvider};
use vegchange_core::io::{
    load_ground_truth, load_study_areas, read_geotiff, write_geotiff, write_points_csv,
    GeoTiffOptions,
};
use vegchange_core::{ChangeClass, ChangeRaster, ClassifiedRaster, Raster, StudyArea};
use vegchange_pipeline::{run_batch, ExportSink, FileExportSink, NullSink, PipelineConfig};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vegchange")]
#[command(author, version, about = "Vegetation change detection from Sentinel-2 composites", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full change-detection pipeline for every study area
    Run(RunArgs),
    /// Classify a change raster into decrease / no change / increase
    Classify {
        /// Input change raster (GeoTIFF)
        input: PathBuf,
        /// Output classified raster
        output: PathBuf,
        #[arg(long, default_value = "-0.1", allow_hyphen_values = true)]
        decrease_threshold: f64,
        #[arg(long, default_value = "0.1", allow_hyphen_values = true)]
        increase_threshold: f64,
    },
    /// Draw a stratified random sample of points from a classified raster
    Sample {
        /// Classified raster (GeoTIFF)
        input: PathBuf,
        /// Study areas (GeoJSON)
        #[arg(long)]
        areas: PathBuf,
        /// Output CSV
        output: PathBuf,
        /// Study area to sample (required when the file holds several)
        #[arg(long)]
        only: Option<String>,
        #[arg(long, default_value = "100")]
        points_per_class: usize,
        /// Sampling resolution in metres
        #[arg(long, default_value = "30")]
        scale: f64,
        /// Ground resolution of the input raster in metres
        #[arg(long, default_value = "30")]
        native_scale: f64,
        #[arg(long, default_value = "0")]
        seed: u64,
    },
    /// Validate a classified raster against labelled ground-truth points
    Validate {
        /// Classified raster (GeoTIFF)
        input: PathBuf,
        /// Ground-truth points (GeoJSON)
        ground_truth: PathBuf,
        /// Property holding the change label
        #[arg(long, default_value = "change")]
        label_field: String,
        /// Write the accuracy report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Study areas (GeoJSON FeatureCollection with a `name` property)
    #[arg(long)]
    areas: PathBuf,
    /// Ground-truth points (GeoJSON)
    #[arg(long)]
    ground_truth: Option<PathBuf>,
    /// Configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Only run the study area with this name
    #[arg(long)]
    only: Option<String>,
    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// STAC catalog: es, pc, or an API root URL
    #[arg(long, default_value = "es")]
    catalog: String,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    points_per_class: Option<usize>,
    #[arg(long, allow_hyphen_values = true)]
    decrease_threshold: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    increase_threshold: Option<f64>,
    #[arg(long)]
    max_cloud_cover: Option<f64>,
    /// Limit on each provider call, in seconds
    #[arg(long)]
    timeout: Option<u64>,
    /// Retries on transient HTTP failures
    #[arg(long, default_value = "3")]
    retries: u32,
    /// Skip all exports
    #[arg(long)]
    no_export: bool,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, &GeoTiffOptions { epsg: Some(4326) })
        .context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// The named area, or the only one in the file
fn pick_area(mut areas: Vec<StudyArea>, only: Option<&str>) -> Result<StudyArea> {
    match only {
        Some(name) => match areas.iter().position(|a| a.name() == name) {
            Some(i) => Ok(areas.swap_remove(i)),
            None => bail!("No study area named '{}'", name),
        },
        None if areas.len() == 1 => Ok(areas.remove(0)),
        None => bail!(
            "{} study areas in file, choose one with --only ({})",
            areas.len(),
            areas.iter().map(StudyArea::name).collect::<Vec<_>>().join(", ")
        ),
    }
}

fn print_class_counts(classified: &ClassifiedRaster) {
    let counts = classified.class_counts();
    let total: usize = counts.iter().sum();
    for class in ChangeClass::ALL {
        let n = counts[class.index()];
        let share = if total > 0 { 100.0 * n as f64 / total as f64 } else { 0.0 };
        println!("  {:<10} {:>10} ({:.1}%)", class.label(), n, share);
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

async fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.random_seed = seed;
    }
    if let Some(n) = args.points_per_class {
        config.points_per_class = n;
    }
    if let Some(d) = args.decrease_threshold {
        config.decrease_threshold = d;
    }
    if let Some(i) = args.increase_threshold {
        config.increase_threshold = i;
    }
    if let Some(c) = args.max_cloud_cover {
        config.max_cloud_cover = c;
    }
    if let Some(t) = args.timeout {
        config.materialize_timeout_secs = Some(t);
    }
    if let Some(dir) = args.output {
        config.output_dir = dir;
    }

    let mut areas = load_study_areas(&args.areas).context("Failed to load study areas")?;
    if let Some(name) = &args.only {
        areas.retain(|a| a.name() == name);
        if areas.is_empty() {
            bail!("No study area named '{}'", name);
        }
    }
    info!("{} study area(s)", areas.len());

    let ground_truth = match &args.ground_truth {
        Some(path) => Some(
            load_ground_truth(path, &config.label_field).context("Failed to load ground truth")?,
        ),
        None => None,
    };

    let client = StacClient::new(
        StacCatalog::parse(&args.catalog),
        StacClientOptions {
            max_retries: args.retries,
            ..Default::default()
        },
    )?;
    let mut asset_keys = vegchange_cloud::default_asset_keys();
    asset_keys.extend(config.asset_keys.clone());
    let provider = StacProvider::with_asset_keys(client, asset_keys);

    let files = FileExportSink::new(&config.output_dir);
    let sink: &dyn ExportSink = if args.no_export { &NullSink } else { &files };

    let start = Instant::now();
    let pb = spinner("Running change detection...");
    let outcomes = run_batch(&provider, &areas, ground_truth.as_ref(), &config, sink).await;
    pb.set_message("Writing exports...");
    let written = files.flush().await;
    pb.finish_and_clear();

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => println!("{report}"),
            Err(e) => {
                failed += 1;
                println!("Area: {}\n  FAILED: {e}\n", outcome.area);
            }
        }
    }
    if written > 0 {
        println!("Exports written to: {}", config.output_dir.display());
    }
    println!("  Processing time: {:.2?}", start.elapsed());

    if failed > 0 {
        bail!("{} of {} study areas failed", failed, outcomes.len());
    }
    Ok(())
}

fn run_classify(input: &Path, output: &Path, decrease: f64, increase: f64) -> Result<()> {
    let params = ClassifyParams::new(decrease, increase)?;
    let raster = read_raster(input)?;
    let start = Instant::now();
    let change = ChangeRaster::new("input", raster, 0.0);
    let classified = classify(&change, params).context("Failed to classify")?;
    let elapsed = start.elapsed();
    write_result(&classified.to_f64()?, output)?;
    print_class_counts(&classified);
    done("Classification", output, elapsed);
    Ok(())
}

fn run_sample(
    input: &Path,
    areas: &Path,
    output: &Path,
    only: Option<&str>,
    params: StratifiedParams,
    native_scale: f64,
) -> Result<()> {
    let area = pick_area(load_study_areas(areas)?, only)?;
    let raster = read_raster(input)?;
    let classified = ClassifiedRaster::from_f64(&raster, native_scale)?;

    let start = Instant::now();
    let points = stratified_sample(&classified, &area, params).context("Failed to sample")?;
    let elapsed = start.elapsed();

    for class in ChangeClass::ALL {
        let n = points.iter().filter(|p| p.sampled_class == Some(class)).count();
        if n < params.points_per_class {
            warn!("{}: only {} of {} points available", class, n, params.points_per_class);
        }
    }
    write_points_csv(&points, output).context("Failed to write points")?;
    println!("{} points drawn in '{}'", points.len(), area.name());
    done("Sample", output, elapsed);
    Ok(())
}

fn run_validate(
    input: &Path,
    ground_truth: &Path,
    label_field: &str,
    json: Option<&Path>,
) -> Result<()> {
    let raster = read_raster(input)?;
    let classified = ClassifiedRaster::from_f64(&raster, 0.0)?;
    let truth = load_ground_truth(ground_truth, label_field)?;

    let outcome = validate(&classified, truth.points());
    let report = outcome.matrix.report();

    println!("Reference points: {}", truth.len());
    println!("  Used: {}", outcome.surviving);
    println!("  Outside mask: {}", outcome.outside_mask);
    println!("  Unlabelled: {}", outcome.unlabelled);
    println!("  Unmapped labels: {}", outcome.unmapped_labels);
    for (label, n) in &outcome.unknown_labels {
        println!("    '{label}': {n}");
    }
    println!("\nConfusion matrix (rows = reference, columns = predicted):");
    println!("{}", outcome.matrix);
    match report.overall_accuracy {
        Some(oa) => println!("Overall accuracy: {:.4}", oa),
        None => println!("Overall accuracy: n/a"),
    }
    match report.kappa {
        Some(k) => println!("Kappa: {:.4}", k),
        None => println!("Kappa: n/a"),
    }

    if let Some(path) = json {
        let text = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nReport saved to: {}", path.display());
    }
    Ok(())
}

fn run_info(input: &Path) -> Result<()> {
    let raster = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();
    let gt = raster.transform();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {} x {}", gt.pixel_width, gt.pixel_height.abs());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    let share = if raster.is_empty() {
        0.0
    } else {
        100.0 * stats.valid_count as f64 / raster.len() as f64
    };
    println!("  Valid cells: {} ({:.1}%)", stats.valid_count, share);
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Run(args) => run(args).await?,
        Commands::Classify {
            input,
            output,
            decrease_threshold,
            increase_threshold,
        } => run_classify(&input, &output, decrease_threshold, increase_threshold)?,
        Commands::Sample {
            input,
            areas,
            output,
            only,
            points_per_class,
            scale,
            native_scale,
            seed,
        } => run_sample(
            &input,
            &areas,
            &output,
            only.as_deref(),
            StratifiedParams {
                points_per_class,
                scale_m: scale,
                seed,
            },
            native_scale,
        )?,
        Commands::Validate {
            input,
            ground_truth,
            label_field,
            json,
        } => run_validate(&input, &ground_truth, &label_field, json.as_deref())?,
        Commands::Info { input } => run_info(&input)?,
    }

    Ok(())
}
