use std::io;

use super::StorageBackend;

/// In-memory document with injectable failures, for dry runs and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    name: String,
    contents: Option<Vec<u8>>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Start with an existing document
    pub fn with_contents(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            contents: Some(contents.into()),
            ..Self::new(name)
        }
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn contents(&self) -> Option<&[u8]> {
        self.contents.as_deref()
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.fail_reads {
            return Err(io::Error::other("read failure"));
        }
        Ok(self.contents.clone())
    }

    fn write(&mut self, contents: &[u8]) -> io::Result<()> {
        if self.fail_writes {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "no space left"));
        }
        self.contents = Some(contents.to_vec());
        self.writes += 1;
        Ok(())
    }
}
