use crate::{EngineError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Hands downloaded bytes over to local storage under a given file name.
pub trait Persistence {
    fn save_locally(&self, bytes: &[u8], file_name: &str) -> Result<()>;
}

impl<P: Persistence + ?Sized> Persistence for &P {
    fn save_locally(&self, bytes: &[u8], file_name: &str) -> Result<()> {
        (**self).save_locally(bytes, file_name)
    }
}

/// Writes files into one directory. Payloads are staged in a temp file next to the target
/// and renamed into place; the staging file is removed whenever the save does not complete.
#[derive(Debug, Clone)]
pub struct DirectoryPersistence {
    dir: PathBuf,
}

impl DirectoryPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Persistence for DirectoryPersistence {
    fn save_locally(&self, bytes: &[u8], file_name: &str) -> Result<()> {
        check_file_name(file_name)?;
        std::fs::create_dir_all(&self.dir)?;

        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(bytes)?;
        staged.flush()?;
        staged
            .persist(self.dir.join(file_name))
            .map_err(|err| EngineError::Io(err.error))?;
        Ok(())
    }
}

fn check_file_name(file_name: &str) -> Result<()> {
    let unsafe_name = file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(EngineError::UnsafeFileName(file_name.to_string()));
    }
    Ok(())
}
