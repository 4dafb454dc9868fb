use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DATA_REPO: &str = "https://github.com/rustwasm/wasm-weight-tracker-data";
pub const DEFAULT_CHART_SCRIPT: &str = "https://code.highcharts.com/highcharts.js";

#[derive(Debug, Clone)]
pub struct Config {
    /// Scratch directory where `measure` clones and builds benchmarks.
    pub work_dir: PathBuf,
    /// Git repository holding the `builds/` directory.
    pub data_repo: String,
    /// How many of the most recent builds end up in the feed.
    pub history_limit: usize,
    /// Script URL for the chart library embedded in rendered pages.
    pub chart_script: String,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub(crate) struct FileConfig {
    pub(crate) tracker: Option<TrackerFileConfig>,
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub(crate) struct TrackerFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) work_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) data_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) history_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) chart_script: Option<String>,
}

/// Values taken from `WEIGHT_TRACKER_*` environment variables.
#[derive(Debug, Default, Clone)]
pub(crate) struct EnvOverrides {
    pub(crate) work_dir: Option<String>,
    pub(crate) data_repo: Option<String>,
    pub(crate) history_limit: Option<usize>,
}

impl EnvOverrides {
    pub(crate) fn from_env() -> Self {
        EnvOverrides {
            work_dir: std::env::var("WEIGHT_TRACKER_WORK_DIR").ok(),
            data_repo: std::env::var("WEIGHT_TRACKER_DATA_REPO").ok(),
            history_limit: std::env::var("WEIGHT_TRACKER_HISTORY")
                .ok()
                .and_then(|s| s.parse::<usize>().ok()),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&config_file_path())
    }

    pub(crate) fn load_from(config_path: &Path) -> Result<Self> {
        let file_config = Self::load_file_config(config_path)?;
        Ok(Self::resolve(file_config, EnvOverrides::from_env()))
    }

    /// Environment variables win over the file, the file over defaults.
    pub(crate) fn resolve(file_config: FileConfig, env: EnvOverrides) -> Self {
        let tracker = file_config.tracker.unwrap_or_default();

        let work_dir = env
            .work_dir
            .or(tracker.work_dir)
            .map(|s| shellexpand(&s))
            .unwrap_or_else(default_work_dir);

        let data_repo = env
            .data_repo
            .or(tracker.data_repo)
            .unwrap_or_else(|| DEFAULT_DATA_REPO.to_string());

        let history_limit = env.history_limit.or(tracker.history_limit).unwrap_or(60);

        let chart_script = tracker
            .chart_script
            .unwrap_or_else(|| DEFAULT_CHART_SCRIPT.to_string());

        Config {
            work_dir,
            data_repo,
            history_limit,
            chart_script,
        }
    }

    /// A missing file is fine; a file that does not parse is not.
    pub(crate) fn load_file_config(config_path: &Path) -> Result<FileConfig> {
        if !config_path.exists() {
            return Ok(FileConfig::default());
        }
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", config_path.display()))
    }
}

pub(crate) fn default_work_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("weight-tracker")
}

pub(crate) fn config_file_path() -> PathBuf {
    // XDG layout on every platform, macOS included
    let config_base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(".config")
        });
    config_base.join("weight-tracker").join("config.toml")
}

fn shellexpand(s: &str) -> PathBuf {
    if let Some(rest) = s.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(s)
}
