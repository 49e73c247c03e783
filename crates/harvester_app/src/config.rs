use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use engine_logging::engine_info;
use harvester_core::JobConfig;
use harvester_engine::FetchSettings;
use serde::{Deserialize, Serialize};

const DEFAULT_JOB_DIR: &str = "job";
const RECORDS_DIR: &str = "records";

/// Contents of the `--config` RON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listing page the session opens on.
    pub start_url: String,
    /// Progress files and records; `./job` when omitted.
    #[serde(default)]
    pub job_dir: Option<PathBuf>,
    #[serde(default)]
    pub fetch: FetchSettings,
    pub job: JobConfig,
}

impl AppConfig {
    pub fn from_ron(text: &str) -> anyhow::Result<Self> {
        let config: AppConfig = ron::from_str(text)?;
        config.job.validate()?;
        Ok(config)
    }

    /// `--job-dir` wins over the file's `job_dir`.
    pub fn job_dir(&self, overridden: Option<&Path>) -> PathBuf {
        overridden
            .map(Path::to_path_buf)
            .or_else(|| self.job_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_JOB_DIR))
    }

    pub fn records_dir(&self, overridden: Option<&Path>) -> PathBuf {
        self.job_dir(overridden).join(RECORDS_DIR)
    }
}

pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let config = AppConfig::from_ron(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    engine_info!("Loaded config from {:?}", path);
    Ok(config)
}
