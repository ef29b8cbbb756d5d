use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{error, info};

mod config;
mod dashboard;
mod embeddings;
mod error;
mod extract;
mod listing;
mod logger;
mod scoring;
mod scraper;
mod storage;
mod utils;

use config::{Config, ConfigArgs};
use listing::{Listing, NOT_SPECIFIED};
use scoring::{Method, Scorer};
use scraper::{ScrapeOptions, Scraper};
use storage::{Fallbacks, Format};

#[derive(Parser, Debug)]
#[command(
    name = "traineeship-scraper",
    about = "Erasmus Intern traineeship scraper and ranking tool"
)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape traineeship listings into CSV and JSON.
    Scrape(ScrapeArgs),
    /// Show the best matches for one query.
    Search(SearchArgs),
    /// Score every listing against one or more queries and export a ranked CSV.
    Rank(RankArgs),
    /// Browse a scraped or ranked CSV in the terminal.
    View {
        /// CSV file to display.
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// Skip fetching the detail page of each traineeship.
    #[arg(long, default_value_t = false)]
    no_details: bool,

    /// CSV output path (default: <data-dir>/erasmusintern_traineeships_<timestamp>.csv).
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Search query (job title, skills, etc.).
    query: String,

    /// Job data file, JSON or CSV (default: newest scrape in the data dir).
    #[arg(long)]
    data: Option<PathBuf>,

    /// Maximum number of results to show.
    #[arg(long, short = 'n', default_value_t = 5)]
    limit: usize,

    #[arg(long, short, value_enum, default_value_t = Method::Keyword)]
    method: Method,
}

#[derive(Args, Debug)]
struct RankArgs {
    /// One or more queries, e.g. "AI engineering" "full stack development".
    #[arg(required = true, num_args = 1..)]
    queries: Vec<String>,

    /// Job data file, JSON or CSV (default: newest scrape in the data dir).
    #[arg(long, short = 'f')]
    data: Option<PathBuf>,

    /// Ranked CSV path.
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long, short, value_enum, default_value_t = Method::Embedding)]
    method: Method,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let config = Config::from_args(&cli.config).context("configuration check failed")?;

    match cli.command {
        Command::Scrape(args) => scrape_command(&config, &args),
        Command::Search(args) => search_command(&config, &args),
        Command::Rank(args) => rank_command(&config, &args),
        Command::View { path } => dashboard::run_dashboard(&path),
    }
}

fn scrape_command(config: &Config, args: &ScrapeArgs) -> anyhow::Result<()> {
    info!("=== Starting traineeship scraper ===");

    let scraper = Scraper::from_config(config)?;
    let mut traineeships = scraper.scrape_all(ScrapeOptions {
        max_pages: config.max_pages,
        fetch_details: !args.no_details,
    });

    if traineeships.is_empty() {
        println!("No traineeships found. Check connection or website structure.");
        return Ok(());
    }

    for t in &mut traineeships {
        t.fill_missing();
    }

    let fallbacks = Fallbacks::system();
    let csv_path = storage::save_listings(
        &traineeships,
        Format::Csv,
        args.output.as_deref(),
        &config.data_dir,
        &fallbacks,
    )?;
    println!("Data saved to {}", csv_path.display());

    // The JSON copy is a convenience; its failure must not hide the CSV result.
    let json = storage::save_listings(
        &traineeships,
        Format::Json,
        None,
        &config.data_dir,
        &fallbacks,
    );
    match json {
        Ok(json_path) => println!("Data also saved as JSON to {}", json_path.display()),
        Err(e) => error!("Failed to save JSON copy: {}", e),
    }

    println!("{} traineeships scraped.", traineeships.len());
    Ok(())
}

fn load_data(config: &Config, data: Option<&Path>) -> anyhow::Result<(PathBuf, Vec<Listing>)> {
    let path = match data {
        Some(p) => p.to_path_buf(),
        None => storage::most_recent_data_file(&config.data_dir)
            .ok_or_else(|| error::Error::NoDataFile(config.data_dir.clone()))?,
    };
    let listings = storage::load_listings(&path)
        .with_context(|| format!("failed to load job data from {}", path.display()))?;
    Ok((path, listings))
}

/// Runs `f` with the scorer for `method`. The embedding model is loaded only
/// when asked for; if it is missing the command fails instead of switching
/// strategy.
fn with_scorer<T>(
    method: Method,
    f: impl FnOnce(&Scorer<'_>) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    match method {
        Method::Keyword => {
            info!("Using keyword matching...");
            f(&Scorer::Keyword)
        }
        Method::Embedding => {
            let embedder = embeddings::load_embedder()?;
            f(&Scorer::Embedding(embedder.as_ref()))
        }
    }
}

fn format_job(job: &Listing, score: f32) -> String {
    let rule = "-".repeat(80);
    format!(
        "{rule}\nTITLE: {}\nCOMPANY: {}\nLOCATION: {}\nFIELD: {}\nDURATION: {}\n\
         POSTED: {}\nDEADLINE: {}\nURL: {}\nMATCH SCORE: {:.2}\n\nDESCRIPTION:\n{}\n{rule}",
        job.title,
        job.company,
        job.location,
        job.field,
        job.duration,
        job.post_date,
        job.deadline,
        job.url,
        score,
        job.description.as_deref().unwrap_or(NOT_SPECIFIED),
    )
}

fn search_command(config: &Config, args: &SearchArgs) -> anyhow::Result<()> {
    info!("=== Searching for: {} ===", args.query);

    let (path, listings) = load_data(config, args.data.as_deref())?;
    info!("Loaded {} jobs from {}", listings.len(), path.display());

    let results = with_scorer(args.method, |scorer| {
        Ok(scoring::search(listings, &args.query, scorer, args.limit)?)
    })?;

    if results.is_empty() {
        println!("No matching jobs found.");
        return Ok(());
    }

    println!("\nFound {} matching jobs:", results.len());
    for (job, score) in &results {
        println!("{}", format_job(job, *score));
    }
    Ok(())
}

fn rank_command(config: &Config, args: &RankArgs) -> anyhow::Result<()> {
    let (path, listings) = load_data(config, args.data.as_deref())?;
    if listings.is_empty() {
        println!("No jobs loaded from {}", path.display());
        return Ok(());
    }
    info!(
        "Loaded {} jobs. Processing {} queries...",
        listings.len(),
        args.queries.len()
    );

    let ranking = with_scorer(args.method, |scorer| {
        Ok(scoring::rank(listings, &args.queries, scorer)?)
    })?;

    let output = args.output.clone().unwrap_or_else(|| {
        scoring::ranked_output_path(&config.data_dir, &args.queries, &utils::file_timestamp())
    });
    let (header, rows) = ranking.to_table();
    storage::write_table(&output, &header, &rows)
        .with_context(|| format!("failed to write rankings to {}", output.display()))?;

    if let Some(column) = ranking.sort_column() {
        info!("Ranked {} jobs by {}", rows.len(), column);
    }
    println!("Job rankings saved to {}", output.display());
    Ok(())
}
