//! CSV/JSON persistence for scraped listings.
//!
//! Saving never gives up on the first failure: the primary path is tried
//! first, then a backup in the system temp directory, then the working
//! directory. Only an error at the last location reaches the caller.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::error::{Error, Result};
use crate::listing::{self, Listing};
use crate::utils::file_timestamp;

pub const FILE_PREFIX: &str = "erasmusintern_traineeships";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    pub fn ext(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(OsStr::to_str) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Some(Format::Csv),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(Format::Json),
            _ => None,
        }
    }
}

/// Where to go when the primary path cannot be written.
#[derive(Debug, Clone)]
pub struct Fallbacks {
    pub temp_dir: PathBuf,
    pub working_dir: PathBuf,
}

impl Fallbacks {
    pub fn system() -> Self {
        Fallbacks {
            temp_dir: std::env::temp_dir(),
            working_dir: PathBuf::from("."),
        }
    }
}

/// `<data_dir>/erasmusintern_traineeships_<timestamp>.<ext>`
pub fn default_path(data_dir: &Path, format: Format, stamp: &str) -> PathBuf {
    data_dir.join(format!("{}_{}.{}", FILE_PREFIX, stamp, format.ext()))
}

/// `name.csv` -> `name_new.csv`
pub fn disambiguate(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or(FILE_PREFIX);
    let name = match path.extension().and_then(OsStr::to_str) {
        Some(ext) => format!("{}_new.{}", stem, ext),
        None => format!("{}_new", stem),
    };
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

fn is_permission_denied(err: &Error) -> bool {
    matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::PermissionDenied)
}

fn write_csv_file(path: &Path, listings: &[Listing]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    let (header, with_description) = listing::header(listings);
    let mut wtr = csv::Writer::from_writer(BufWriter::new(file));
    wtr.write_record(&header)?;
    for l in listings {
        wtr.write_record(l.row(with_description))?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_json_file(path: &Path, listings: &[Listing]) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    listings.serialize(&mut ser)?;
    writer.flush()?;
    Ok(())
}

/// Tries `primary`, then the temp backup, then the working directory.
fn save_with_fallback<F>(
    primary: PathBuf,
    format: Format,
    stamp: &str,
    fallbacks: &Fallbacks,
    write: F,
) -> Result<PathBuf>
where
    F: Fn(&Path) -> Result<()>,
{
    let mut target = primary;
    if target.exists() && OpenOptions::new().append(true).open(&target).is_err() {
        target = disambiguate(&target);
        warn!("Original file is locked. Using new filename: {}", target.display());
    }

    let err = match write(&target) {
        Ok(()) => return Ok(target),
        Err(e) => e,
    };

    if is_permission_denied(&err) {
        let backup = fallbacks
            .temp_dir
            .join(format!("erasmusintern_backup_{}.{}", stamp, format.ext()));
        warn!(
            "Permission denied for {}. Saving to alternate location: {}",
            target.display(),
            backup.display()
        );
        match write(&backup) {
            Ok(()) => return Ok(backup),
            Err(e) => warn!("Error saving to {}: {}", backup.display(), e),
        }
    } else {
        warn!("Error saving {}: {}", target.display(), err);
    }

    let last = fallbacks.working_dir.join(format!(
        "{}_fallback_{}.{}",
        FILE_PREFIX,
        stamp,
        format.ext()
    ));
    warn!("Attempting to save to current directory: {}", last.display());
    write(&last)?;
    Ok(last)
}

/// Saves listings in `format` to `path`, or a timestamped file in `data_dir`.
/// Returns where the data actually landed.
pub fn save_listings(
    listings: &[Listing],
    format: Format,
    path: Option<&Path>,
    data_dir: &Path,
    fallbacks: &Fallbacks,
) -> Result<PathBuf> {
    let stamp = file_timestamp();
    let primary = match path {
        Some(p) => p.to_path_buf(),
        None => default_path(data_dir, format, &stamp),
    };

    let saved = match format {
        Format::Csv => save_with_fallback(primary, format, &stamp, fallbacks, |p| {
            write_csv_file(p, listings)
        })?,
        Format::Json => save_with_fallback(primary, format, &stamp, fallbacks, |p| {
            write_json_file(p, listings)
        })?,
    };
    info!("Saved {} traineeships to {}", listings.len(), saved.display());
    Ok(saved)
}

/// Reads listings from a `.json` or `.csv` file.
pub fn load_listings(path: &Path) -> Result<Vec<Listing>> {
    match Format::from_path(path) {
        Some(Format::Json) => {
            let file = File::open(path)?;
            Ok(serde_json::from_reader(BufReader::new(file))?)
        }
        Some(Format::Csv) => {
            let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
            let mut listings = Vec::new();
            for result in rdr.deserialize() {
                let record: Listing = result?;
                listings.push(record);
            }
            Ok(listings)
        }
        None => Err(Error::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Newest scraped file in `data_dir`, preferring JSON over CSV.
pub fn most_recent_data_file(data_dir: &Path) -> Option<PathBuf> {
    let entries: Vec<PathBuf> = fs::read_dir(data_dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();

    [Format::Json, Format::Csv].into_iter().find_map(|format| {
        entries
            .iter()
            .filter(|p| {
                let name = p.file_name().and_then(OsStr::to_str).unwrap_or("");
                name.starts_with(&format!("{}_", FILE_PREFIX))
                    && Format::from_path(p) == Some(format)
            })
            .max()
            .cloned()
    })
}

/// Writes an arbitrary string table as CSV.
pub fn write_table(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    ensure_parent(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(header)?;
    for row in rows {
        wtr.write_record(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Reads a CSV file into its header and rows.
pub fn read_table(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
    let header = rdr.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in rdr.records() {
        rows.push(record?.iter().map(str::to_string).collect());
    }
    Ok((header, rows))
}
