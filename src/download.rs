//! Resource downloads with per-item failure isolation.
//!
//! [`DownloadManager::fetch`] moves one URL to one file. The two staging
//! helpers build on it with different failure policies:
//!
//! - **Source** ([`DownloadManager::stage_source`]): a local source needs no
//!   network at all. A failed remote download is reported and the bundled
//!   default is used in its place, so the source track always ends with an
//!   existing file.
//! - **Tiles** ([`DownloadManager::stage_tiles`]): tiles are fetched in
//!   candidate order. A failed tile is recorded and skipped; the batch never
//!   aborts. Successful tiles are numbered by a running success counter, so
//!   the staged files are always `0..succeeded` with no gaps, and the staged
//!   list is already in the order the compositor receives it.
//!
//! Requests use a fixed timeout and are never retried.

use crate::naming::{source_file_name, tile_file_name};
use crate::types::{ImageSource, StagedFile, StagedRole, TileCandidate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Redirect hops followed before a download counts as a redirect loop.
const MAX_REDIRECTS: usize = 10;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Fetches the body of a URL.
///
/// Implementations treat any non-2xx status as an error.
pub trait HttpFetch {
    fn get(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// [`HttpFetch`] over a blocking reqwest client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self { client })
    }
}

impl HttpFetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        let response = self.client.get(url).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

/// Result of staging the source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStaging {
    /// `path` always exists afterwards; `success` is false when the remote
    /// download failed and the default asset stands in.
    pub staged: StagedFile,
    pub failure: Option<String>,
}

/// A tile that could not be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFailure {
    pub index: usize,
    pub url: String,
    pub error: String,
}

/// Result of downloading a batch of tiles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileBatch {
    /// Successful tiles only, in candidate order.
    pub staged: Vec<StagedFile>,
    pub failures: Vec<TileFailure>,
    pub attempted: usize,
}

impl TileBatch {
    pub fn succeeded(&self) -> usize {
        self.staged.len()
    }

    /// Staged paths in compositor order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.staged.iter().map(|f| f.path.clone()).collect()
    }
}

pub struct DownloadManager<F> {
    fetcher: F,
}

impl<F: HttpFetch> DownloadManager<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Download `url` into `dest`, returning the number of bytes written.
    ///
    /// A partially written file is removed on failure.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let body = self.fetcher.get(url)?;
        if let Err(source) = fs::write(dest, &body) {
            let _ = fs::remove_file(dest);
            return Err(DownloadError::Write {
                path: dest.to_path_buf(),
                source,
            });
        }
        debug!(url, dest = %dest.display(), bytes = body.len(), "downloaded");
        Ok(body.len() as u64)
    }

    /// Put the source image in place.
    ///
    /// `dir` must already exist (see [`Workspace::reset`](crate::workspace::Workspace::reset)).
    pub fn stage_source(
        &self,
        source: &ImageSource,
        dir: &Path,
        default_asset: &Path,
    ) -> SourceStaging {
        if source.is_local() {
            return SourceStaging {
                staged: StagedFile {
                    role: StagedRole::Source,
                    path: PathBuf::from(&source.locator),
                    success: true,
                },
                failure: None,
            };
        }

        let dest = dir.join(source_file_name(&source.locator));
        match self.fetch(&source.locator, &dest) {
            Ok(_) => SourceStaging {
                staged: StagedFile {
                    role: StagedRole::Source,
                    path: dest,
                    success: true,
                },
                failure: None,
            },
            Err(err) => {
                warn!(url = %source.locator, error = %err, "source download failed, using default image");
                SourceStaging {
                    staged: StagedFile {
                        role: StagedRole::Source,
                        path: default_asset.to_path_buf(),
                        success: false,
                    },
                    failure: Some(err.to_string()),
                }
            }
        }
    }

    /// Download every candidate into `dir`, skipping the ones that fail.
    pub fn stage_tiles(&self, candidates: &[TileCandidate], dir: &Path) -> TileBatch {
        let mut batch = TileBatch {
            attempted: candidates.len(),
            ..TileBatch::default()
        };

        for candidate in candidates {
            let dest = dir.join(tile_file_name(batch.succeeded(), &candidate.url));
            match self.fetch(&candidate.url, &dest) {
                Ok(_) => batch.staged.push(StagedFile {
                    role: StagedRole::Tile(candidate.index),
                    path: dest,
                    success: true,
                }),
                Err(err) => {
                    warn!(index = candidate.index, url = %candidate.url, error = %err, "tile skipped");
                    batch.failures.push(TileFailure {
                        index: candidate.index,
                        url: candidate.url.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        batch
    }
}
