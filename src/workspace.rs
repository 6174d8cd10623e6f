//! Workspace and staging directory lifecycle.
//!
//! A workspace is a root directory with three staging directories and the
//! bundled default source image:
//!
//! ```text
//! <root>/
//! ├── .mosaic.lock      # held for the duration of a run
//! ├── img_def.png       # default source image, written on first use
//! ├── img_src/          # the staged source image
//! ├── img_in/           # staged tiles: 0.jpg, 1.png, ...
//! └── img_out/          # compositor request and output
//! ```
//!
//! Staging directories are never updated in place. [`Workspace::reset`]
//! deletes a directory and recreates it empty, so nothing leaks from a
//! previous run. Because of that, two runs on one root would destroy each
//! other's files; [`Workspace::lock`] makes the second one fail instead.

use crate::config::WorkspaceConfig;
use crate::naming::OUTPUT_FILE;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

const LOCK_FILE: &str = ".mosaic.lock";

/// Image used as the source when no remote image can be resolved.
const DEFAULT_ASSET_BYTES: &[u8] = include_bytes!("../assets/img_def.png");

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Failed to remove {path}: {source}")]
    Remove { path: PathBuf, source: io::Error },
    #[error("Failed to create {path}: {source}")]
    Create { path: PathBuf, source: io::Error },
    #[error("Workspace {root} is in use by another run (delete {lock} if it is stale)")]
    Locked { root: PathBuf, lock: PathBuf },
}

/// One of the three staging directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingDir {
    Source,
    Tiles,
    Output,
}

/// Resolved paths of a workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    source_dir: PathBuf,
    tiles_dir: PathBuf,
    output_dir: PathBuf,
    default_asset: PathBuf,
}

impl Workspace {
    /// Workspace at `root` with the stock directory names.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::from_config(&WorkspaceConfig {
            root: root.into(),
            ..WorkspaceConfig::default()
        })
    }

    pub fn from_config(config: &WorkspaceConfig) -> Self {
        let root = config.root.clone();
        Self {
            source_dir: root.join(&config.source_dir),
            tiles_dir: root.join(&config.tiles_dir),
            output_dir: root.join(&config.output_dir),
            default_asset: root.join(&config.default_asset),
            root,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dir(&self, which: StagingDir) -> &Path {
        match which {
            StagingDir::Source => &self.source_dir,
            StagingDir::Tiles => &self.tiles_dir,
            StagingDir::Output => &self.output_dir,
        }
    }

    /// Path of the bundled default source image (may not exist yet).
    pub fn default_asset(&self) -> &Path {
        &self.default_asset
    }

    /// Where the compositor writes the finished mosaic.
    pub fn output_target(&self) -> PathBuf {
        self.output_dir.join(OUTPUT_FILE)
    }

    /// Delete a staging directory if present and recreate it empty.
    ///
    /// Calling this twice in a row is fine: the second call finds an empty
    /// directory, removes it, and creates it again.
    pub fn reset(&self, which: StagingDir) -> Result<PathBuf, WorkspaceError> {
        let dir = self.dir(which).to_path_buf();
        if let Ok(meta) = fs::symlink_metadata(&dir) {
            let removed = if meta.is_dir() {
                fs::remove_dir_all(&dir)
            } else {
                fs::remove_file(&dir)
            };
            removed.map_err(|source| WorkspaceError::Remove {
                path: dir.clone(),
                source,
            })?;
        }
        fs::create_dir_all(&dir).map_err(|source| WorkspaceError::Create {
            path: dir.clone(),
            source,
        })?;
        debug!(dir = %dir.display(), "staging directory reset");
        Ok(dir)
    }

    /// Write the bundled default image unless a file is already there.
    ///
    /// An existing file is left alone so users can drop in their own default.
    pub fn ensure_default_asset(&self) -> Result<PathBuf, WorkspaceError> {
        if self.default_asset.is_file() {
            return Ok(self.default_asset.clone());
        }
        let create_err = |source| WorkspaceError::Create {
            path: self.default_asset.clone(),
            source,
        };
        if let Some(parent) = self.default_asset.parent() {
            fs::create_dir_all(parent).map_err(create_err)?;
        }
        fs::write(&self.default_asset, DEFAULT_ASSET_BYTES).map_err(create_err)?;
        Ok(self.default_asset.clone())
    }

    /// Take the exclusive run lock for this workspace.
    ///
    /// The lock is released when the returned guard is dropped.
    pub fn lock(&self) -> Result<WorkspaceLock, WorkspaceError> {
        fs::create_dir_all(&self.root).map_err(|source| WorkspaceError::Create {
            path: self.root.clone(),
            source,
        })?;
        let path = self.root.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(WorkspaceError::Locked {
                    root: self.root.clone(),
                    lock: path,
                });
            }
            Err(source) => return Err(WorkspaceError::Create { path, source }),
        };
        // The pid only helps a human decide whether a leftover lock is stale.
        let _ = writeln!(file, "{}", std::process::id());
        Ok(WorkspaceLock { path })
    }

    /// Files directly inside a staging directory, sorted by path.
    ///
    /// A missing directory yields an empty list.
    pub fn staged_files(&self, which: StagingDir) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(self.dir(which))
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .collect();
        files.sort();
        files
    }
}

/// Guard for an acquired workspace lock; removes the lock file on drop.
#[derive(Debug)]
pub struct WorkspaceLock {
    path: PathBuf,
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
