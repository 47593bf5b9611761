use crate::naming::RunPrefix;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub base_dir: PathBuf,
}

impl OutputPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// `./downloads` under the working directory.
    pub fn default_base_dir() -> PathBuf {
        match std::env::current_dir() {
            Ok(dir) => dir.join("downloads"),
            Err(_) => PathBuf::from("downloads"),
        }
    }

    pub fn default_config_path() -> PathBuf {
        PathBuf::from("imagegrab.json")
    }

    pub fn images_dir(&self) -> PathBuf {
        self.base_dir.clone()
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.base_dir.join("reports")
    }

    pub fn manifest_path(&self, prefix: &RunPrefix) -> PathBuf {
        self.reports_dir().join(format!("{prefix}_manifest.csv"))
    }

    pub fn summary_path(&self, prefix: &RunPrefix) -> PathBuf {
        self.reports_dir().join(format!("{prefix}_summary.json"))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.images_dir())?;
        std::fs::create_dir_all(self.reports_dir())?;
        Ok(())
    }
}
