//! On-disk scan results.
//!
//! Layout under the results root, one directory per run:
//!
//! ```text
//! <root>/2025-08-11_07-00-00/
//!     commit_hash.json      the Snapshot
//!     updated_commit.json   ChangeSet::updated_commits
//!     new_repo.json         ChangeSet::new_repositories
//!     new_branch.json       ChangeSet::new_branches
//!     scan_targets.json     optional
//! ```
//!
//! Directory names sort lexically in chronological order, so the latest run
//! is the greatest name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::scan::ScanTarget;
use crate::snapshot::{ChangeSet, Snapshot};

/// `strftime` format of run directory names.
pub const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Run directories written by older tooling use colons in the time part.
const LEGACY_RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

pub const SNAPSHOT_FILE: &str = "commit_hash.json";
pub const UPDATED_COMMITS_FILE: &str = "updated_commit.json";
pub const NEW_REPOSITORIES_FILE: &str = "new_repo.json";
pub const NEW_BRANCHES_FILE: &str = "new_branch.json";
pub const SCAN_TARGETS_FILE: &str = "scan_targets.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Root directory holding one subdirectory per run.
#[derive(Debug, Clone)]
pub struct ScanStore {
    root: PathBuf,
}

impl ScanStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run directories, oldest first. A missing root has no runs.
    pub fn runs(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&self.root, e)),
        };

        let mut runs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root, e))?;
            let path = entry.path();
            if path.is_dir()
                && let Some(started_at) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(parse_run_name)
            {
                runs.push((started_at, path));
            }
        }
        runs.sort();
        Ok(runs.into_iter().map(|(_, path)| path).collect())
    }

    /// `commit_hash.json` of the most recent run that has one.
    pub fn latest_snapshot_path(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .runs()?
            .into_iter()
            .rev()
            .map(|run| run.join(SNAPSHOT_FILE))
            .find(|path| path.is_file()))
    }

    /// The previous run's snapshot, `None` if there has been no run.
    ///
    /// A snapshot file that exists but cannot be parsed is an error, not
    /// `None`: diffing against nothing would report every branch as new.
    pub fn load_latest_snapshot(&self) -> Result<Option<Snapshot>> {
        match self.latest_snapshot_path()? {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading previous snapshot");
                load_snapshot(&path).map(Some)
            }
            None => {
                tracing::info!(root = %self.root.display(), "No previous snapshot found");
                Ok(None)
            }
        }
    }

    /// Create the directory for a run that started at `started_at`.
    pub fn create_run(&self, started_at: DateTime<Utc>) -> Result<ScanDir> {
        let path = self
            .root
            .join(started_at.format(RUN_DIR_FORMAT).to_string());
        fs::create_dir_all(&path).map_err(|e| StoreError::io(&path, e))?;
        tracing::debug!(path = %path.display(), "Created run directory");
        Ok(ScanDir { path })
    }
}

fn parse_run_name(name: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(name, RUN_DIR_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(name, LEGACY_RUN_DIR_FORMAT))
        .ok()
}

/// One run's output directory.
#[derive(Debug, Clone)]
pub struct ScanDir {
    path: PathBuf,
}

impl ScanDir {
    /// Open an existing run directory.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_snapshot(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        self.write_json(SNAPSHOT_FILE, snapshot)
    }

    /// Write the three change-set files.
    pub fn write_change_set(&self, changes: &ChangeSet) -> Result<()> {
        self.write_json(UPDATED_COMMITS_FILE, &changes.updated_commits)?;
        self.write_json(NEW_REPOSITORIES_FILE, &changes.new_repositories)?;
        self.write_json(NEW_BRANCHES_FILE, &changes.new_branches)?;
        Ok(())
    }

    pub fn write_scan_targets(&self, targets: &[ScanTarget]) -> Result<PathBuf> {
        self.write_json(SCAN_TARGETS_FILE, &targets)
    }

    pub fn read_snapshot(&self) -> Result<Snapshot> {
        load_snapshot(&self.path.join(SNAPSHOT_FILE))
    }

    /// Read back the change set written by [`write_change_set`](Self::write_change_set).
    pub fn read_change_set(&self) -> Result<ChangeSet> {
        Ok(ChangeSet {
            updated_commits: read_json(&self.path.join(UPDATED_COMMITS_FILE))?,
            new_repositories: read_json(&self.path.join(NEW_REPOSITORIES_FILE))?,
            new_branches: read_json(&self.path.join(NEW_BRANCHES_FILE))?,
        })
    }

    /// Pretty-printed JSON, written to a temporary name and renamed into
    /// place so a crash never leaves a truncated file behind.
    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path.join(name);
        let tmp = self.path.join(format!(".{name}.tmp"));

        let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::io(&path, e))?;

        tracing::debug!(path = %path.display(), "Wrote scan result file");
        Ok(path)
    }
}

/// Read a `commit_hash.json` file.
pub fn load_snapshot(path: &Path) -> Result<Snapshot> {
    read_json(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}
