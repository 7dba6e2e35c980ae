use std::path::PathBuf;

use crate::limits::*;

/// Runtime settings, read from `FLEETCAL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub snapshot_path: PathBuf,
    pub metrics_port: Option<u16>,
    pub max_cached_views: usize,
    pub default_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("./fleet.json"),
            metrics_port: None,
            max_cached_views: DEFAULT_MAX_CACHED_VIEWS,
            default_days: DEFAULT_DAY_COUNT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let snapshot_path = lookup("FLEETCAL_SNAPSHOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.snapshot_path);
        let metrics_port: Option<u16> = lookup("FLEETCAL_METRICS_PORT").and_then(|s| s.parse().ok());
        let max_cached_views: usize = lookup("FLEETCAL_MAX_CACHED_VIEWS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_cached_views);
        let default_days: u32 = lookup("FLEETCAL_DEFAULT_DAYS")
            .and_then(|s| s.parse().ok())
            .filter(|days| (1..=MAX_DAY_COUNT).contains(days))
            .unwrap_or(defaults.default_days);
        Self {
            snapshot_path,
            metrics_port,
            max_cached_views,
            default_days,
        }
    }
}
