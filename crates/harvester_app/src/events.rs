use engine_logging::engine_info;
use harvester_engine::{EngineEvent, ProgressSink};

/// Logs the per-page tallies. Every other event already has a log line at
/// the point the engine emits it.
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn emit(&self, event: EngineEvent) {
        if let Some(line) = page_tally(&event) {
            engine_info!("{line}");
        }
    }
}

fn page_tally(event: &EngineEvent) -> Option<String> {
    match event {
        EngineEvent::PageFinished {
            page,
            saved,
            skipped,
            unresolved,
        } => Some(format!(
            "Page {page} done: {saved} saved, {skipped} skipped, {unresolved} unresolved"
        )),
        _ => None,
    }
}
