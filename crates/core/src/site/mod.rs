pub mod publish;
pub mod server;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const PAGE_FILE: &str = "index.html";
pub const SNAPSHOT_FILE: &str = "kraken.json";
pub const DEFAULT_PORT: u16 = 8080;

/// Serving root and fixed file names. Passed explicitly; the process never `chdir`s.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub root: PathBuf,
    pub page_file: String,
    pub snapshot_file: String,
    pub port: u16,
    /// When set, the published page is logged line by line with this pause.
    pub echo_delay: Option<Duration>,
}

impl SiteConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_file: PAGE_FILE.to_string(),
            snapshot_file: SNAPSHOT_FILE.to_string(),
            port: DEFAULT_PORT,
            echo_delay: None,
        }
    }

    pub fn page_path(&self) -> PathBuf {
        self.root.join(&self.page_file)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(&self.snapshot_file)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SiteState {
    ServingPlaceholder,
    Generating,
    ServingLive,
}

/// What `/status` reports; written only by the refresh scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStatus {
    pub state: SiteState,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SiteStatus {
    pub fn new(state: SiteState) -> Self {
        Self {
            state,
            last_success: None,
            last_error: None,
        }
    }
}
