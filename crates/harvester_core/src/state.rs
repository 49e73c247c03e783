use serde::{Deserialize, Serialize};

use crate::config::JobConfig;
use crate::view_model::HarvestView;

/// Where the harvest lifecycle currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Initializing,
    Navigating,
    Extracting,
    ProcessingItems,
    Backoff,
    Completed,
    Stopped,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Stopped)
    }
}

/// Which walk over the pages is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pass {
    #[default]
    Main,
    Rework,
}

/// Run-wide limits handed to the state machine once, at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPolicy {
    /// Substituted when the page-count strategy yields 0.
    pub default_max_pages: u32,
    pub max_session_recoveries: u32,
    pub rework_pass: bool,
}

impl Default for RunPolicy {
    fn default() -> Self {
        Self {
            default_max_pages: 1,
            max_session_recoveries: 5,
            rework_pass: false,
        }
    }
}

impl From<&JobConfig> for RunPolicy {
    fn from(config: &JobConfig) -> Self {
        Self {
            default_max_pages: config.default_max_pages,
            max_session_recoveries: config.max_session_recoveries,
            rework_pass: config.rework_pass,
        }
    }
}

/// Per-job progress.
///
/// `rework_pages` and `last_run_page` are persisted next to the state blob in
/// their own files, so they are skipped here. Everything after them only lives
/// for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestState {
    pub(crate) current_page: u32,
    pub(crate) total_pages: u32,
    #[serde(default)]
    pub(crate) finished: bool,
    #[serde(default)]
    pub(crate) consecutive_all_fail_pages: u32,
    #[serde(skip)]
    pub(crate) last_run_page: u32,
    #[serde(skip)]
    pub(crate) rework_pages: Vec<u32>,
    #[serde(skip)]
    pub(crate) phase: Phase,
    #[serde(skip)]
    pub(crate) pass: Pass,
    #[serde(skip)]
    pub(crate) rework_queue: Vec<u32>,
    #[serde(skip)]
    pub(crate) session_recoveries: u32,
    #[serde(skip)]
    pub(crate) policy: RunPolicy,
}

impl Default for HarvestState {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 0,
            finished: false,
            consecutive_all_fail_pages: 0,
            last_run_page: 1,
            rework_pages: Vec::new(),
            phase: Phase::Initializing,
            pass: Pass::Main,
            rework_queue: Vec::new(),
            session_recoveries: 0,
            policy: RunPolicy::default(),
        }
    }
}

impl HarvestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State rebuilt from what a previous run left on disk.
    ///
    /// `current_page` and `last_run_page` both start at the marker value.
    pub fn restored(
        blob: Option<HarvestState>,
        rework_pages: Vec<u32>,
        last_run_page: u32,
    ) -> Self {
        let blob = blob.unwrap_or_default();
        let marker = last_run_page.max(1);
        Self {
            current_page: marker,
            last_run_page: marker,
            rework_pages,
            total_pages: blob.total_pages,
            finished: blob.finished,
            consecutive_all_fail_pages: blob.consecutive_all_fail_pages,
            ..Self::default()
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn last_run_page(&self) -> u32 {
        self.last_run_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    pub fn rework_pages(&self) -> &[u32] {
        &self.rework_pages
    }

    /// Rework pages as they should be persisted: recorded pages followed by
    /// those a rework pass has not finished yet.
    pub fn pending_rework_pages(&self) -> Vec<u32> {
        let mut pages = self.rework_pages.clone();
        pages.extend_from_slice(&self.rework_queue);
        pages
    }

    pub fn consecutive_all_fail_pages(&self) -> u32 {
        self.consecutive_all_fail_pages
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pass(&self) -> Pass {
        self.pass
    }

    pub fn session_recoveries(&self) -> u32 {
        self.session_recoveries
    }

    pub fn view(&self) -> HarvestView {
        HarvestView {
            current_page: self.current_page,
            total_pages: self.total_pages,
            finished: self.finished,
            rework_pages: self.rework_pages.clone(),
            consecutive_all_fail_pages: self.consecutive_all_fail_pages,
        }
    }

    pub(crate) fn record_rework(&mut self, page: u32) {
        self.rework_pages.push(page);
    }

    /// Distinct rework pages in ascending order; the recorded list is emptied.
    pub(crate) fn drain_rework_pages(&mut self) -> Vec<u32> {
        let mut pages = std::mem::take(&mut self.rework_pages);
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}
