use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::trace;

use super::StorageBackend;

/// Measurement document on the local filesystem.
///
/// Writes go to a sibling `<name>.tmp` file which is synced and then renamed
/// over the target, so an interrupted write never truncates the document.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    name: String,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        PathBuf::from(temp)
    }
}

impl StorageBackend for FileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> io::Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&mut self, contents: &[u8]) -> io::Result<()> {
        let temp = self.temp_path();

        let result = File::create(&temp).and_then(|mut file| {
            file.write_all(contents)?;
            file.sync_all()
        });
        if let Err(e) = result.and_then(|()| fs::rename(&temp, &self.path)) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        trace!("(storage) Wrote {} bytes to {}", contents.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(test: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sonde-file-{}-{}", test, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_file_reads_none() {
        let dir = temp_dir("missing");
        let mut backend = FileBackend::new(dir.join("data.json"));

        assert_eq!(backend.name(), "data.json");
        assert_eq!(backend.read().unwrap(), None);
    }

    #[test]
    fn test_write_replaces_contents() {
        let dir = temp_dir("replace");
        let mut backend = FileBackend::new(dir.join("data.json"));

        backend.write(b"first").unwrap();
        backend.write(b"second").unwrap();

        assert_eq!(backend.read().unwrap().as_deref(), Some(&b"second"[..]));
        assert!(!dir.join("data.json.tmp").exists());
    }

    #[test]
    fn test_failed_write_keeps_previous_document() {
        let dir = temp_dir("failed");
        let mut backend = FileBackend::new(dir.join("data.json"));
        backend.write(b"kept").unwrap();

        // A directory in place of the temp file makes the create fail
        fs::create_dir(dir.join("data.json.tmp")).unwrap();
        assert!(backend.write(b"lost").is_err());

        assert_eq!(fs::read(dir.join("data.json")).unwrap(), b"kept");
    }
}
