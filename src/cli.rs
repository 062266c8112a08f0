// CamTrawl metadata CLI binary

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use camtrawl_metadata_lib::db::get_db_path;
use camtrawl_metadata_lib::timestamp::{format_stored, parse_stored};
use camtrawl_metadata_lib::{ConvertOptions, DeploymentMetadata, SummaryFrom};

#[derive(Parser)]
#[command(name = "ctmeta")]
#[command(about = "CamTrawl deployment metadata tool", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a summary of a deployment
    Info {
        /// Deployment directory (defaults to current directory)
        #[arg(short, long)]
        deployment: Option<PathBuf>,
        /// Window start, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        start: Option<String>,
        /// Window end, "YYYY-MM-DD HH:MM:SS"
        #[arg(long)]
        end: Option<String>,
        /// Include discarded images
        #[arg(long)]
        discards: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a metadata database for a flat-file deployment
    Convert {
        /// Deployment directory
        path: PathBuf,
        /// Camera image directory names, e.g. Manta_00-0F-31-02-AA-01
        #[arg(short, long, required = true, num_args = 1..)]
        cameras: Vec<String>,
        /// Camera labels, same order as --cameras (defaults to the camera names)
        #[arg(short, long, num_args = 1..)]
        labels: Vec<String>,
        /// Do not rename files with repeated frame numbers
        #[arg(long)]
        no_repair: bool,
    },

    /// Export cameras, images and attitude data to CSV
    Export {
        /// Output prefix, e.g. /data/out/D20210218-
        prefix: PathBuf,
        #[arg(short, long)]
        deployment: Option<PathBuf>,
    },

    /// Mark a frame range discarded (or restore it)
    Discard {
        start: i64,
        end: i64,
        /// Clear the discarded marker instead
        #[arg(long)]
        unset: bool,
        #[arg(short, long)]
        deployment: Option<PathBuf>,
    },

    /// Delete the files of discarded images
    Trim {
        #[arg(short, long)]
        deployment: Option<PathBuf>,
    },

    /// Manage frame marks
    Mark {
        #[command(subcommand)]
        action: MarkAction,
        #[arg(short, long, global = true)]
        deployment: Option<PathBuf>,
    },

    /// Fill in the deployment location and maximum depth
    Summary {
        /// Which fix to use: first, middle or last
        #[arg(long, default_value = "first")]
        from: SummaryFrom,
        #[arg(long, allow_negative_numbers = true)]
        latitude: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        longitude: Option<f64>,
        /// Replace an existing location
        #[arg(long)]
        overwrite: bool,
        #[arg(short, long)]
        deployment: Option<PathBuf>,
    },

    /// Read or write deployment parameters
    Param {
        #[command(subcommand)]
        action: ParamAction,
        #[arg(short, long, global = true)]
        deployment: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MarkAction {
    /// Add or replace the mark on a frame
    Add { frame: i64, description: String },
    /// Remove the mark on a frame
    Remove { frame: i64 },
    /// List every mark
    List,
    /// Show the first mark after a frame
    Next { frame: i64 },
    /// Show the first mark before a frame
    Prev { frame: i64 },
}

#[derive(Subcommand)]
enum ParamAction {
    /// List all parameters, or show one
    Get { name: Option<String> },
    /// Set a parameter
    Set { name: String, value: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { deployment, start, end, discards, json } => {
            cmd_info(deployment, start, end, discards, json)
        }
        Commands::Convert { path, cameras, labels, no_repair } => {
            cmd_convert(path, cameras, labels, no_repair)
        }
        Commands::Export { prefix, deployment } => cmd_export(prefix, deployment),
        Commands::Discard { start, end, unset, deployment } => cmd_discard(start, end, unset, deployment),
        Commands::Trim { deployment } => cmd_trim(deployment),
        Commands::Mark { action, deployment } => cmd_mark(action, deployment),
        Commands::Summary { from, latitude, longitude, overwrite, deployment } => {
            cmd_summary(from, latitude, longitude, overwrite, deployment)
        }
        Commands::Param { action, deployment } => cmd_param(action, deployment),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_deployment(deployment: Option<PathBuf>) -> Result<PathBuf> {
    let path = deployment.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    let path = path.canonicalize().unwrap_or(path);

    if !get_db_path(&path).exists() {
        anyhow::bail!(
            "No metadata database found at {}. Use 'ctmeta convert' for flat-file deployments.",
            path.display()
        );
    }

    Ok(path)
}

fn open_deployment(deployment: Option<PathBuf>) -> Result<DeploymentMetadata> {
    let path = resolve_deployment(deployment)?;
    let mut meta = DeploymentMetadata::new();
    meta.open(&path)
        .with_context(|| format!("Opening deployment {}", path.display()))?;
    Ok(meta)
}

fn parse_time_arg(value: Option<String>) -> Result<Option<NaiveDateTime>> {
    value
        .map(|v| parse_stored(&v).with_context(|| format!("Bad time {:?}", v)))
        .transpose()
}

fn format_time(time: Option<NaiveDateTime>) -> String {
    time.map(|t| format_stored(&t)).unwrap_or_else(|| "-".to_string())
}

fn cmd_info(
    deployment: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    discards: bool,
    json: bool,
) -> Result<()> {
    let start = parse_time_arg(start)?;
    let end = parse_time_arg(end)?;
    let mut meta = open_deployment(deployment)?;
    meta.query(start, end, discards)?;

    let depths = meta.depths()?;
    let locations = meta.locations()?;
    let summary = meta.summary()?;

    if json {
        let report = serde_json::json!({
            "deployment": meta.deployment_path()?,
            "snapshot": meta.snapshot(),
            "depth": { "min": depths.min, "max": depths.max },
            "bounds": locations.bounds,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        meta.close()?;
        return Ok(());
    }

    let snap = meta.snapshot();
    let (first, last) = snap.timespan();

    println!("Deployment: {}", meta.deployment_path()?.display());
    println!();
    println!("Time span:      {} .. {}", format_time(first), format_time(last));
    println!("UTC offset:     {} h", snap.hours_offset_to_utc);
    println!(
        "Frames:         {} .. {}",
        snap.start_image.map_or("-".to_string(), |n| n.to_string()),
        snap.end_image.map_or("-".to_string(), |n| n.to_string())
    );
    println!("Common frames:  {}", snap.image_numbers.len());
    println!("Dropped frames: {}", snap.n_dropped_images);
    println!("Marks:          {}", snap.marks.len());
    println!();

    println!("{:<32}  {:<20}  {:<10}  {:<10}  {:>7}", "Camera", "MAC", "Model", "Label", "Images");
    println!("{}", "-".repeat(86));
    for camera in &snap.cameras {
        let count = snap.images(&camera.name).map_or(0, |f| f.len());
        println!(
            "{:<32}  {:<20}  {:<10}  {:<10}  {:>7}",
            camera.name, camera.mac_address, camera.model, camera.label, count
        );
    }

    if !snap.sensor_data.is_empty() || !snap.async_data.is_empty() {
        println!();
        println!("Sensors:");
        for (sensor, headers) in &snap.sensor_data {
            for (header, frames) in headers {
                println!("  {:<12} {:<10} {:>7} frames", sensor, header, frames.len());
            }
        }
        for (sensor, headers) in &snap.async_data {
            for (header, series) in headers {
                println!("  {:<12} {:<10} {:>7} async", sensor, header, series.len());
            }
        }
    }

    if let (Some(min), Some(max)) = (depths.min, depths.max) {
        println!();
        println!("Depth:          {:.1} .. {:.1} m", min, max);
    }
    if let Some([sw, _, ne, _]) = locations.bounds {
        println!(
            "Bounds:         {:.5},{:.5} .. {:.5},{:.5}",
            sw.latitude, sw.longitude, ne.latitude, ne.longitude
        );
    }

    meta.close()?;
    Ok(())
}

fn cmd_convert(path: PathBuf, cameras: Vec<String>, labels: Vec<String>, no_repair: bool) -> Result<()> {
    let labels = if labels.is_empty() { cameras.clone() } else { labels };
    let options = ConvertOptions { repair_numbering: !no_repair };

    let mut meta = DeploymentMetadata::new();
    let report = meta
        .convert_to_database(&path, &cameras, &labels, options)
        .with_context(|| format!("Converting {}", path.display()))?;

    println!("Created {}", get_db_path(&path).display());
    println!("  Cameras:        {}", report.cameras);
    println!("  Images:         {}", report.images);
    println!("  Attitude rows:  {}", report.sensor_rows);
    println!("  Highest frame:  {}", report.max_frame);
    if report.renamed_files > 0 {
        println!("  Renamed files:  {}", report.renamed_files);
    }
    if report.skipped_files > 0 {
        println!("  Skipped files:  {}", report.skipped_files);
    }

    meta.close()?;
    Ok(())
}

fn cmd_export(prefix: PathBuf, deployment: Option<PathBuf>) -> Result<()> {
    let mut meta = open_deployment(deployment)?;
    let report = meta.export_csv(&prefix)?;

    for file in &report.files {
        println!("Wrote {}", file.display());
    }
    println!(
        "{} cameras, {} images, {} attitude rows",
        report.cameras, report.images, report.attitude_rows
    );

    meta.close()?;
    Ok(())
}

fn cmd_discard(start: i64, end: i64, unset: bool, deployment: Option<PathBuf>) -> Result<()> {
    let mut meta = open_deployment(deployment)?;
    let changed = meta.set_discarded(start, end, unset)?;
    let verb = if unset { "Restored" } else { "Discarded" };
    println!("{} {} image rows in frames {}..={}", verb, changed, start, end);
    meta.close()?;
    Ok(())
}

fn cmd_trim(deployment: Option<PathBuf>) -> Result<()> {
    let mut meta = open_deployment(deployment)?;
    let report = meta.delete_discarded_images()?;

    println!("Trim complete:");
    println!("  Removed:  {}", report.removed);
    println!("  Missing:  {}", report.missing);
    println!("  Failed:   {}", report.failed);
    for failure in &report.failures {
        println!("    {}/{}: {}", failure.camera, failure.name, failure.error);
    }

    meta.close()?;
    Ok(())
}

fn print_mark(frame: i64, description: &str) {
    println!("{:>8}  {}", frame, description);
}

fn cmd_mark(action: MarkAction, deployment: Option<PathBuf>) -> Result<()> {
    let mut meta = open_deployment(deployment)?;

    match action {
        MarkAction::Add { frame, description } => {
            meta.create_mark(frame, &description)?;
            println!("Marked frame {}", frame);
        }
        MarkAction::Remove { frame } => {
            if meta.remove_mark(frame)? {
                println!("Removed mark on frame {}", frame);
            } else {
                println!("No mark on frame {}", frame);
            }
        }
        MarkAction::List => {
            let marks = meta.all_marks()?;
            if marks.is_empty() {
                println!("No marks.");
            }
            for mark in marks {
                print_mark(mark.frame, &mark.description);
            }
        }
        MarkAction::Next { frame } => match meta.find_next_mark(frame)? {
            Some(mark) => print_mark(mark.frame, &mark.description),
            None => println!("No mark after frame {}", frame),
        },
        MarkAction::Prev { frame } => match meta.find_previous_mark(frame)? {
            Some(mark) => print_mark(mark.frame, &mark.description),
            None => println!("No mark before frame {}", frame),
        },
    }

    meta.close()?;
    Ok(())
}

fn cmd_summary(
    from: SummaryFrom,
    latitude: Option<f64>,
    longitude: Option<f64>,
    overwrite: bool,
    deployment: Option<PathBuf>,
) -> Result<()> {
    let mut meta = open_deployment(deployment)?;

    if meta.update_summary(from, (latitude, longitude), overwrite)? {
        println!("Deployment summary updated.");
    } else {
        println!("Deployment summary already has a location. Use --overwrite to replace it.");
    }
    if let Some(summary) = meta.summary()? {
        print_summary_value("Latitude", summary.latitude);
        print_summary_value("Longitude", summary.longitude);
        print_summary_value("Max depth", summary.max_depth);
    }

    meta.close()?;
    Ok(())
}

fn print_summary_value(label: &str, value: Option<f64>) {
    match value {
        Some(v) => println!("  {:<10} {}", label, v),
        None => println!("  {:<10} -", label),
    }
}

fn cmd_param(action: ParamAction, deployment: Option<PathBuf>) -> Result<()> {
    let mut meta = open_deployment(deployment)?;

    match action {
        ParamAction::Get { name: Some(name) } => match meta.get_parameter(&name)? {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Parameter {} is not set", name),
        },
        ParamAction::Get { name: None } => {
            meta.query(None, None, false)?;
            for (name, value) in meta.deployment_parameters() {
                println!("{} = {}", name, value);
            }
        }
        ParamAction::Set { name, value } => {
            meta.set_parameter(&name, &value)?;
            println!("{} = {}", name, value);
        }
    }

    meta.close()?;
    Ok(())
}
