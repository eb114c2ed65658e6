//! Runtime settings, read from the environment.
//!
//! - `MONTHWISE_DB`: database file (default: platform data dir)
//! - `MONTHWISE_MONTHS_BACK` / `MONTHWISE_MONTHS_AHEAD`: sync window (12 / 24)
//! - `MONTHWISE_LOG`: tracing filter (default `monthwise=warn`)

use anyhow::{Context, Result};
use std::ops::RangeInclusive;
use std::path::PathBuf;

const DEFAULT_MONTHS_BACK: i32 = 12;
const DEFAULT_MONTHS_AHEAD: i32 = 24;
const DEFAULT_LOG_FILTER: &str = "monthwise=warn";

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) db_path: PathBuf,
    pub(crate) months_back: i32,
    pub(crate) months_ahead: i32,
    pub(crate) log_filter: String,
}

impl Settings {
    pub(crate) fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = match lookup("MONTHWISE_DB") {
            Some(path) => PathBuf::from(crate::run::shellexpand(&path)),
            None => default_db_path()?,
        };
        Ok(Self {
            db_path,
            months_back: months(&lookup, "MONTHWISE_MONTHS_BACK", DEFAULT_MONTHS_BACK)?,
            months_ahead: months(&lookup, "MONTHWISE_MONTHS_AHEAD", DEFAULT_MONTHS_AHEAD)?,
            log_filter: lookup("MONTHWISE_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.into()),
        })
    }

    /// Month offsets, relative to the current month, that sync keeps materialized.
    pub(crate) fn window(&self) -> RangeInclusive<i32> {
        -self.months_back..=self.months_ahead
    }
}

fn months(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: i32) -> Result<i32> {
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: i32 = raw
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of months, got '{raw}'"))?;
    if !(0..=1200).contains(&value) {
        anyhow::bail!("{key} must be between 0 and 1200, got {value}");
    }
    Ok(value)
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "monthwise", "Monthwise")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("monthwise.db"))
}
