//! Persistence of cycle records
//!
//! [`MeasurementStore`] owns the in-memory record sequence and mirrors it to a
//! [`StorageBackend`] after every append. The backend only moves whole
//! documents; it is opened inside each read or write and never held open.

mod file;
mod memory;
mod store;

pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use store::MeasurementStore;

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to read {name}: {source}")]
    Read { name: String, source: io::Error },
    #[error("failed to write {name}: {source}")]
    Write { name: String, source: io::Error },
    #[error("{name} is not a valid measurement document: {source}")]
    Corrupt {
        name: String,
        source: serde_json::Error,
    },
    #[error("failed to encode measurement document: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Whole-document storage medium
pub trait StorageBackend {
    /// Name of the stored document, also used as the upload file name
    fn name(&self) -> &str;

    /// Read the whole document. `Ok(None)` when it does not exist yet.
    fn read(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Replace the whole document. A failed write must leave the previous
    /// document readable.
    fn write(&mut self, contents: &[u8]) -> io::Result<()>;
}

impl<B: StorageBackend + ?Sized> StorageBackend for &mut B {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&mut self) -> io::Result<Option<Vec<u8>>> {
        (**self).read()
    }

    fn write(&mut self, contents: &[u8]) -> io::Result<()> {
        (**self).write(contents)
    }
}

/// Raw contents of the measurement document, as handed to the uploader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl MeasurementFile {
    pub fn new(name: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            contents,
        }
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
