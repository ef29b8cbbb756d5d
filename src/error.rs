//! Error types for the scraper and the ranking commands.

use std::path::PathBuf;

/// Error type for scraping, persistence and ranking.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration rejected at startup.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level HTTP failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Data file with an extension we cannot read.
    #[error("unsupported data file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// No scraped data file to rank or search.
    #[error("no data file found in {}; run `scrape` first or pass --data", .0.display())]
    NoDataFile(PathBuf),

    /// The embedding backend could not be used.
    #[error(
        "sentence embeddings unavailable: {0}\n\
         Rebuild with `cargo build --features embeddings` (requires libtorch) \
         or use `--method keyword`."
    )]
    EmbeddingsUnavailable(String),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
