//! Filesystem implementation of the `LogArchive` port.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::LogArchive;
use crate::domain::{RunId, RunLog};

/// Writes `run_<id>.zip`, one `run_<id>_<member>` per log member and
/// `run_<id>_combined.txt` into a directory.
#[derive(Debug, Clone)]
pub struct FsLogArchive {
    dir: PathBuf,
}

impl FsLogArchive {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl LogArchive for FsLogArchive {
    fn save(&self, run_id: RunId, log: &RunLog) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create {}", self.dir.display()))?;

        if !log.archive.is_empty() {
            let path = self.dir.join(format!("run_{run_id}.zip"));
            std::fs::write(&path, &log.archive)
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        for file in &log.files {
            let path = self.dir.join(format!("run_{run_id}_{}", flatten(&file.name)));
            std::fs::write(&path, &file.content)
                .with_context(|| format!("cannot write {}", path.display()))?;
        }
        let combined = self.dir.join(format!("run_{run_id}_combined.txt"));
        std::fs::write(&combined, log.combined())
            .with_context(|| format!("cannot write {}", combined.display()))?;
        Ok(combined)
    }
}

/// Member names contain `/` for per-job folders; keep them in one directory.
fn flatten(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect()
}
