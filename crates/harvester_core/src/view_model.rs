use std::fmt;

/// Read-only snapshot of a harvest, used for status output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestView {
    pub current_page: u32,
    /// 0 while the page count is unknown.
    pub total_pages: u32,
    pub finished: bool,
    pub rework_pages: Vec<u32>,
    pub consecutive_all_fail_pages: u32,
}

impl HarvestView {
    /// Pages walked before the resume point, clamped to a known page count.
    pub fn pages_done(&self) -> u32 {
        let walked = self.current_page.saturating_sub(1);
        match self.total_pages {
            0 => walked,
            total if self.finished => total,
            total => walked.min(total),
        }
    }
}

impl fmt::Display for HarvestView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.total_pages {
            0 => write!(f, "{} page(s) done", self.pages_done()),
            total => write!(f, "{} of {total} page(s) done", self.pages_done()),
        }
    }
}
