//! Harvester engine: driver, storage and fetch seams, and the async harvest
//! loop that executes the core state machine's effects.
mod decode;
mod driver;
mod engine;
mod extra;
mod fetch;
mod filename;
mod hooks;
mod item;
mod list;
mod navigator;
mod persist;
mod progress;
mod static_driver;
mod store;
mod types;

pub use decode::{decode_body, DecodeError, DecodedBody};
pub use driver::{Driver, DriverError, ElementHandle};
pub use engine::{DiagnosticReport, HarvestEngine, NullSink, ProgressSink};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use filename::record_filename;
pub use hooks::{HarvestHooks, NoHooks};
pub use item::ItemProcessor;
pub use list::{Item, ItemNode, ListExtractor};
pub use navigator::PageNavigator;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{ProgressStore, LAST_PAGE_FILE, REWORK_FILE, STATE_FILE};
pub use static_driver::StaticHtmlDriver;
pub use store::{JsonDirStore, Record, RecordStore, StoreError};
pub use types::{
    EngineEvent, FailureKind, FetchError, FetchMetadata, FetchOutput, HarvestError, RunSummary,
};
