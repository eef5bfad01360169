use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cleanrs::core::thumbnail::render_thumbnail;
use cleanrs::{
    CleanerConfig, DeletionMode, DirectoryStore, DuplicateService, ScanPhase, ScanProgress,
    ScanReport, SimilarityScorer, average_hash_distance, cosine_similarity, extract_features,
};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cleanrs", version, about = "Find and remove visually duplicate photos")]
struct Cli {
    /// Config file (default: `<config dir>/cleanrs/config.json` if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Duplicate workflows
    Duplicates {
        #[command(subcommand)]
        command: Dups,
    },

    /// Compare two images by colour histogram and average hash
    Compare {
        first: PathBuf,
        second: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum Dups {
    /// Find and list duplicate groups
    Scan {
        /// Directory to scan
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Print groups as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete duplicates, either the earliest photo of each group or a selection
    Delete {
        /// Directory to clean
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
        /// Delete the earliest photo of every group
        #[arg(long, conflicts_with = "select", required_unless_present = "select")]
        first_of_each: bool,
        /// Photo ids to delete (as printed by `scan`)
        #[arg(long, value_name = "ID", num_args = 1..)]
        select: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Only show what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Serialize)]
struct GroupView {
    name: String,
    photo_count: usize,
    size_mb: f64,
    photos: Vec<PhotoView>,
}

#[derive(Serialize)]
struct PhotoView {
    id: String,
    path: Option<PathBuf>,
    created_at: Option<String>,
    size_bytes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Duplicates { command } => match command {
            Dups::Scan { path, json } => {
                let service = open_library(&path, &config, !json)?;
                let report = run_scan(&service).await?;

                if json {
                    let groups = group_views(&service);
                    println!("{}", serde_json::to_string_pretty(&groups)?);
                } else {
                    print_report(&service, &report);
                }
            }

            Dups::Delete {
                path,
                first_of_each,
                select,
                yes,
                dry_run,
            } => {
                let service = open_library(&path, &config, true)?;
                let report = run_scan(&service).await?;
                if report.groups.is_empty() {
                    println!("No duplicates found.");
                    return Ok(());
                }

                let mode = if first_of_each {
                    DeletionMode::FirstOfEachGroup
                } else {
                    for id in &select {
                        service.select(id);
                    }
                    DeletionMode::Selected
                };

                let plan = service.plan(mode);
                for id in select.iter().filter(|id| !plan.targets.contains(*id)) {
                    eprintln!("⚠️  {} is not in any duplicate group; ignoring", id);
                }
                if plan.is_empty() {
                    println!("Nothing to delete.");
                    return Ok(());
                }

                println!("\n🗑️  {} photo(s) selected for deletion:", plan.len());
                for id in &plan.targets {
                    println!("   ▶ {}", describe(service.store(), id));
                }

                if dry_run {
                    println!("\n⚠️  Dry-run only; no files were changed.");
                    return Ok(());
                }

                if !yes {
                    let confirmed = Confirm::new()
                        .with_prompt(format!("Permanently delete {} photo(s)?", plan.len()))
                        .default(false)
                        .interact()
                        .context("Failed to read confirmation")?;
                    if !confirmed {
                        println!("Aborted; nothing was deleted.");
                        return Ok(());
                    }
                }

                let outcome = match mode {
                    DeletionMode::FirstOfEachGroup => service.delete_first_of_each_group().await,
                    DeletionMode::Selected => service.delete_selected().await,
                }
                .context("Deletion failed")?;

                println!(
                    "\n✅ Deleted {} photo(s); {} duplicate group(s) remain",
                    outcome.removed.len(),
                    outcome.groups_remaining
                );
            }
        },

        Commands::Compare { first, second } => {
            compare(&first, &second, &config)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<CleanerConfig> {
    match path {
        Some(path) => CleanerConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => CleanerConfig::load_or_default().context("Failed to load default config"),
    }
}

fn open_library(
    path: &Path,
    config: &CleanerConfig,
    show_progress: bool,
) -> Result<DuplicateService<DirectoryStore>> {
    if !path.is_dir() {
        anyhow::bail!("{} is not a directory", path.display());
    }

    let store = Arc::new(DirectoryStore::new(path, &config.extensions));
    let service = DuplicateService::new(store, config.clone());
    if !show_progress {
        return Ok(service);
    }

    println!("▶ Scanning for duplicates in: {}", path.display());
    let (progress_tx, progress_rx) = mpsc::unbounded_channel();
    tokio::spawn(drive_progress_bar(progress_rx));
    Ok(service.with_progress_sender(progress_tx))
}

async fn drive_progress_bar(mut progress_rx: mpsc::UnboundedReceiver<ScanProgress>) {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{bar:30}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.enable_steady_tick(Duration::from_millis(100));

    while let Some(progress) = progress_rx.recv().await {
        bar.set_length(progress.total as u64);
        bar.set_position(progress.processed as u64);
        match progress.phase {
            ScanPhase::Listing => bar.set_message("listing photos…"),
            ScanPhase::Fingerprinting => bar.set_message("fingerprinting…"),
            ScanPhase::Grouping => bar.set_message("grouping…"),
            ScanPhase::Complete => {
                bar.finish_with_message("scan complete");
                return;
            }
        }
    }
    bar.finish_and_clear();
}

async fn run_scan(service: &DuplicateService<DirectoryStore>) -> Result<ScanReport> {
    let start = Instant::now();
    let report = service.scan().await.context("Scan failed")?;
    log::info!("⏱ scanning took {:.2?}", start.elapsed());
    Ok(report)
}

fn describe(store: &DirectoryStore, id: &str) -> String {
    match store.path_of(id) {
        Some(path) => format!("{}  {}", id, path.display()),
        None => id.to_string(),
    }
}

fn print_report(service: &DuplicateService<DirectoryStore>, report: &ScanReport) {
    if report.skipped > 0 {
        println!("⚠️  {} photo(s) could not be read and were skipped", report.skipped);
    }
    if report.groups.is_empty() {
        println!("No duplicates found.");
        return;
    }

    println!("Found {} duplicate group(s):", report.groups.len());
    for group in &report.groups {
        println!(
            "\n✨ {} ({} photos, {:.2} MB)",
            group.name,
            group.photo_count(),
            group.size_mb
        );
        for photo in &group.photos {
            println!("   ▶ {}", describe(service.store(), &photo.id));
        }
    }
}

fn group_views(service: &DuplicateService<DirectoryStore>) -> Vec<GroupView> {
    service
        .snapshot()
        .groups
        .iter()
        .map(|group| GroupView {
            name: group.name.clone(),
            photo_count: group.photo_count(),
            size_mb: group.size_mb,
            photos: group
                .photos
                .iter()
                .map(|photo| PhotoView {
                    id: photo.id.clone(),
                    path: service.store().path_of(&photo.id),
                    created_at: photo.created_at.map(|date| date.to_rfc3339()),
                    size_bytes: photo.size_bytes,
                })
                .collect(),
        })
        .collect()
}

fn compare(first: &Path, second: &Path, config: &CleanerConfig) -> Result<()> {
    let open = |path: &Path| -> Result<image::DynamicImage> {
        let img = image::open(path).with_context(|| format!("Failed to decode {:?}", path))?;
        Ok(render_thumbnail(img, config.thumbnail_size))
    };
    let a = open(first)?;
    let b = open(second)?;

    let scorer = SimilarityScorer::new(config.similarity_threshold);
    let similarity = cosine_similarity(&extract_features(&a), &extract_features(&b));

    println!("Histogram similarity: {:.4}", similarity);
    println!(
        "Visually identical (≥ {}): {}",
        scorer.threshold(),
        if scorer.images_are_visually_identical(&a, &b) { "yes" } else { "no" }
    );
    println!("Average hash distance: {}", average_hash_distance(&a, &b));
    Ok(())
}
