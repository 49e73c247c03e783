use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filename::record_filename;
use crate::persist::{AtomicFileWriter, PersistError};

/// One harvested item as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub data: Vec<String>,
}

impl Record {
    pub fn new(id: impl Into<String>, data: Vec<String>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("{0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, record: Record) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Record>, StoreError>;
}

/// One pretty-printed JSON file per record, named after the record id.
pub struct JsonDirStore {
    dir: PathBuf,
    writer: AtomicFileWriter,
}

impl JsonDirStore {
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

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(record_filename(id))
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonDirStore {
    async fn save(&self, record: Record) -> Result<(), StoreError> {
        self.writer
            .write_json(&record_filename(&record.id), &record)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Record>, StoreError> {
        let content = match fs::read_to_string(self.path_for(id)) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let record: Record = serde_json::from_str(&content)?;
        // Short-hash collision.
        Ok((record.id == id).then_some(record))
    }
}
