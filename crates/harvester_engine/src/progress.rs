//! Progress Store: the three per-job files that let a harvest resume.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_warn};
use harvester_core::HarvestState;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::HarvestError;

pub const STATE_FILE: &str = "state.json";
pub const REWORK_FILE: &str = "rework_pages.json";
pub const LAST_PAGE_FILE: &str = "last_page.txt";

#[derive(Debug, Clone)]
pub struct ProgressStore {
    dir: PathBuf,
    writer: AtomicFileWriter,
}

impl ProgressStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            writer: AtomicFileWriter::new(dir.clone()),
            dir,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read whatever a previous run left behind.
    ///
    /// A missing or unreadable state blob and a missing marker are not errors.
    /// A rework file that exists but does not parse is `HarvestError::Config`.
    pub fn load(&self) -> Result<HarvestState, HarvestError> {
        let blob = self.load_state_blob();
        let rework_pages = self.load_rework_pages()?;
        let last_page = self.load_last_page();
        engine_debug!(
            "Loaded progress from {}: last page {last_page}, {} rework page(s)",
            self.dir.display(),
            rework_pages.len()
        );
        Ok(HarvestState::restored(blob, rework_pages, last_page))
    }

    pub fn save(&self, state: &HarvestState) -> Result<(), PersistError> {
        self.writer.write_json(STATE_FILE, state)?;
        self.writer.write(
            REWORK_FILE,
            serde_json::to_string(&state.pending_rework_pages())?,
        )?;
        self.writer
            .write(LAST_PAGE_FILE, state.current_page().to_string())?;
        Ok(())
    }

    fn load_state_blob(&self) -> Option<HarvestState> {
        let path = self.dir.join(STATE_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                engine_warn!("Could not read {}: {err}", path.display());
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(state) => Some(state),
            Err(err) => {
                engine_warn!("Ignoring corrupt {}: {err}", path.display());
                None
            }
        }
    }

    fn load_rework_pages(&self) -> Result<Vec<u32>, HarvestError> {
        let path = self.dir.join(REWORK_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(HarvestError::Config(format!(
                    "cannot read {}: {err}",
                    path.display()
                )))
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|err| {
            HarvestError::Config(format!(
                "import rework pages from {} failed: {err}: {content:?}",
                path.display()
            ))
        })
    }

    fn load_last_page(&self) -> u32 {
        fs::read_to_string(self.dir.join(LAST_PAGE_FILE))
            .ok()
            .and_then(|text| harvester_core::resolve::parse_page_number(&text).ok())
            .filter(|page| *page > 0)
            .unwrap_or(1)
    }
}
