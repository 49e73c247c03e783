//! Harvester core: typed job configuration, strategy resolvers and the pure
//! lifecycle state machine.
mod config;
mod effect;
mod msg;
pub mod resolve;
pub mod spec;
mod state;
mod update;
mod view_model;

pub use config::{ConfigError, DiagnosticSwitches, JobConfig, Timing};
pub use effect::{Effect, NavReason};
pub use msg::Msg;
pub use resolve::ResolveError;
pub use spec::{
    CompletionCheck, ExtraContentSpec, ExtraSource, ExtractionPattern, ItemDataSpec, ItemIdSpec,
    ListLocatorSpec, Locator, LocatorKind, NavigationSpec, PageNumberSpec, RevealResult,
    RevealTrigger, PLACEHOLDER,
};
pub use state::{HarvestState, Pass, Phase, RunPolicy};
pub use update::update;
pub use view_model::HarvestView;
