use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("{} exists and is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("cannot create output directory {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("output directory {} is not writable: {source}", path.display())]
    NotWritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Create `dir` if needed and confirm a file can be staged inside it.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(PersistError::NotADirectory(dir.to_path_buf())),
        Ok(_) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|source| PersistError::Create {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        Err(source) => {
            return Err(PersistError::Create {
                path: dir.to_path_buf(),
                source,
            })
        }
    }
    staging_file(dir)
        .map(drop)
        .map_err(|source| PersistError::NotWritable {
            path: dir.to_path_buf(),
            source,
        })
}

// Hidden, and removed on drop unless persisted.
fn staging_file(dir: &Path) -> io::Result<NamedTempFile> {
    Builder::new()
        .prefix(".docconv-")
        .suffix(".part")
        .tempfile_in(dir)
}

/// Writes whole documents into one directory. Content is staged in a hidden
/// file and renamed over the target, so readers never see a partial document.
/// Concurrent writers of one name race and the last rename wins.
#[derive(Debug, Clone)]
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        let failed = |source: io::Error| PersistError::Write {
            path: target.clone(),
            source,
        };

        let mut staged = staging_file(&self.dir).map_err(failed)?;
        staged.write_all(content).map_err(failed)?;
        staged.as_file().sync_all().map_err(failed)?;
        staged.persist(&target).map_err(|err| failed(err.error))?;
        Ok(target)
    }
}
