use std::fmt;

use harvester_core::{ConfigError, ResolveError};
use thiserror::Error;

use crate::decode::DecodeError;
use crate::driver::DriverError;
use crate::persist::PersistError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("expected exactly one element for {locator}, found {count}")]
    AmbiguousElement { locator: String, count: usize },
    #[error("page {target} not reached within the poll budget")]
    NavigationTimeout { target: u32 },
    #[error("item {id} has empty content")]
    EmptyContent { id: String },
    #[error("session error: {0}")]
    Session(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("hook error: {0}")]
    Hook(String),
}

impl HarvestError {
    pub fn ambiguous(locator: impl fmt::Display, count: usize) -> Self {
        Self::AmbiguousElement {
            locator: locator.to_string(),
            count,
        }
    }

    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }
}

impl From<ResolveError> for HarvestError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::Parse(message) => Self::Parse(message),
            ResolveError::Validation(message) => Self::Validation(message),
        }
    }
}

impl From<DriverError> for HarvestError {
    fn from(err: DriverError) -> Self {
        Self::Session(err.to_string())
    }
}

impl From<ConfigError> for HarvestError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<DecodeError> for HarvestError {
    fn from(err: DecodeError) -> Self {
        Self::Parse(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Progress notifications emitted while a harvest runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Started {
        current_page: u32,
        total_pages: u32,
    },
    PageStarted {
        page: u32,
        items: usize,
    },
    ItemSaved {
        page: u32,
        id: String,
    },
    ItemSkipped {
        page: u32,
        id: String,
    },
    ItemUnresolved {
        page: u32,
        index: usize,
        reason: String,
    },
    PageFinished {
        page: u32,
        saved: usize,
        skipped: usize,
        unresolved: usize,
    },
    BackoffStarted {
        seconds: u64,
    },
    SessionRecovered {
        page: u32,
        recoveries: u32,
    },
    Finished(RunSummary),
}

/// What one call to `HarvestEngine::run` accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_processed: u32,
    pub items_saved: usize,
    pub items_skipped: usize,
    pub items_unresolved: usize,
    pub finished: bool,
    pub stopped: bool,
    pub rework_pages: Vec<u32>,
}
