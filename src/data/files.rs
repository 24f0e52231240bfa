use std::path::{Path, PathBuf};

use log::info;

use crate::error::{Error, Result};

/// The pair of CSV files a session works from.
#[derive(Debug, Clone)]
pub struct DataFiles {
    pub train: PathBuf,
    pub test: PathBuf,
}

impl DataFiles {
    pub fn new(train: impl Into<PathBuf>, test: impl Into<PathBuf>) -> Self {
        DataFiles { train: train.into(), test: test.into() }
    }

    /// Size of the training file in bytes, `None` if it is missing.
    pub fn train_size_bytes(&self) -> Option<u64> {
        file_size(&self.train)
    }

    pub fn test_size_bytes(&self) -> Option<u64> {
        file_size(&self.test)
    }

    /// Deletes both files. Files that are already gone are not an error.
    pub fn remove(&self) -> Result<()> {
        for path in [&self.train, &self.test] {
            match std::fs::remove_file(path) {
                Ok(()) => info!("removed '{}'", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::io(path, e)),
            }
        }
        Ok(())
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
}

/// Whole megabytes (10^6 bytes) with an "MB" suffix, or "n/a".
pub fn size_label(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) => format!("{}MB", b / 1_000_000),
        None => "n/a".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_labels() {
        assert_eq!(size_label(Some(109_575_994)), "109MB");
        assert_eq!(size_label(Some(999)), "0MB");
        assert_eq!(size_label(None), "n/a");
    }

    #[test]
    fn remove_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("ferrite-digits-files-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let files = DataFiles::new(dir.join("train.csv"), dir.join("test.csv"));
        std::fs::write(&files.train, b"0,1\n").unwrap();

        assert_eq!(files.train_size_bytes(), Some(4));
        assert_eq!(files.test_size_bytes(), None);
        files.remove().unwrap();
        assert_eq!(files.train_size_bytes(), None);
        files.remove().unwrap();
        let _ = std::fs::remove_dir(&dir);
    }
}
