use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://erasmusintern.org/traineeships";
pub const SITE_ORIGIN: &str = "https://erasmusintern.org";

/// Settings shared by every command, read from flags or the environment.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Listing index to scrape.
    #[arg(long, env = "BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Directory for scraped and ranked output (created if absent).
    #[arg(long, env = "DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Per-request timeout in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub request_timeout_secs: u64,

    /// Maximum number of index pages to scrape (0 means all pages).
    #[arg(long, env = "MAX_PAGES", default_value_t = 0, global = true)]
    pub max_pages: usize,
}

/// Validated, immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: Url,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    /// Page cap; 0 scrapes every detected page.
    pub max_pages: usize,
}

impl Config {
    /// Validates the raw arguments and prepares the data directory.
    /// Runs before any network activity; an error here aborts the run.
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let raw = args.base_url.trim();
        if !raw.starts_with(SITE_ORIGIN) {
            return Err(Error::Config(format!(
                "base URL must be a {} URL, got {:?}",
                SITE_ORIGIN, raw
            )));
        }
        let base_url = Url::parse(raw)
            .map_err(|e| Error::Config(format!("malformed base URL {:?}: {}", raw, e)))?;

        if args.request_timeout_secs == 0 {
            return Err(Error::Config("request timeout must be at least 1 second".into()));
        }

        fs::create_dir_all(&args.data_dir)?;

        Ok(Config {
            base_url,
            data_dir: args.data_dir.clone(),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            max_pages: args.max_pages,
        })
    }
}
