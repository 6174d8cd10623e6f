//! Status-driven orchestration of a mosaic run.
//!
//! The controller owns three tracks, each with its own [`TrackStatus`]:
//!
//! ```text
//! Source   Pending ─resolve source─▶ Resolved ─stage source─▶ Materialized
//! Tiles    Pending ─collect tiles──▶ Resolved ─stage tiles──▶ Materialized
//! Config   Pending ─derive/accept──▶ Resolved ─finalize─────▶ Materialized
//! ```
//!
//! followed by a gate that hands everything to the [`Compositor`]. The gate
//! opens only when Source and Tiles are both materialized. Tiles only
//! materializes with at least one tile on disk.
//!
//! ## Resuming
//!
//! [`PipelineController::make`] runs only the stages whose status says they
//! are due, so calling it again after a failure picks up where the last call
//! stopped:
//!
//! - a track in `FetchFailed` goes back to `Pending` and fetches again
//! - a track in `StageFailed` goes back to `Resolved` and stages again
//! - a materialized track is never redone
//!
//! Config returns to `Pending` whenever Tiles re-materializes, since the tile
//! count feeds the derivation. Composition happens at most once per
//! controller; later calls return the recorded output path.
//!
//! ## Failures
//!
//! Network trouble on the source never fails its track: it falls back to the
//! bundled default. Unreachable tiles are skipped, but a batch where every
//! download failed fails Tiles with `StageFailed`. A listing error, or a
//! listing with no qualifying post, fails Tiles with `FetchFailed`. A staging
//! directory that cannot be reset fails its track with `StageFailed`. A config that cannot be derived leaves Config pending
//! and the gate falls back to [`CompositionConfig::default`].

use crate::autoconfig::AutoConfigurator;
use crate::compose::{ComposeError, CompositionRequest, Compositor};
use crate::config::CompositionSettings;
use crate::download::{DownloadManager, HttpFetch, TileBatch, TileFailure};
use crate::feed::FeedClient;
use crate::source::{FallbackReason, resolve_source};
use crate::tiles::collect_candidates;
use crate::types::{
    CompositionConfig, FinalConfig, ImageSource, ListingSpec, StagedFile, TileCandidate,
};
use crate::workspace::{StagingDir, Workspace, WorkspaceError};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

// ============================================================================
// Tracks, statuses, stages
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Source,
    Tiles,
    Config,
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Track::Source => "source",
            Track::Tiles => "tiles",
            Track::Config => "config",
        })
    }
}

/// Progress of one track.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackStatus {
    #[default]
    Pending,
    Resolved,
    Materialized,
    /// The remote lookup for this track failed.
    FetchFailed,
    /// The staging directory for this track could not be prepared.
    StageFailed,
}

impl TrackStatus {
    /// Numeric form used in diagnostics.
    pub fn code(self) -> i8 {
        match self {
            TrackStatus::Pending => 0,
            TrackStatus::Resolved => 1,
            TrackStatus::Materialized => 2,
            TrackStatus::FetchFailed => -1,
            TrackStatus::StageFailed => -2,
        }
    }

    pub fn is_failed(self) -> bool {
        matches!(self, TrackStatus::FetchFailed | TrackStatus::StageFailed)
    }
}

impl fmt::Display for TrackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackStatus::Pending => "pending",
            TrackStatus::Resolved => "resolved",
            TrackStatus::Materialized => "materialized",
            TrackStatus::FetchFailed => "fetch failed",
            TrackStatus::StageFailed => "stage failed",
        };
        write!(f, "{name} ({})", self.code())
    }
}

/// A step of the Source or Tiles track that can fail.
///
/// Resolving the source has no entry: it falls back to the default image
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    StageSource,
    CollectTiles,
    StageTiles,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::StageSource => "stage source",
            Stage::CollectTiles => "collect tiles",
            Stage::StageTiles => "stage tiles",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stage '{stage}' failed: {reason}")]
    StageFailed { stage: Stage, reason: String },
    #[error("Workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error("Composition failed: {0}")]
    Compose(#[from] ComposeError),
}

// ============================================================================
// Progress events
// ============================================================================

/// Progress reported while [`PipelineController::make`] runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    SourceResolved {
        source: ImageSource,
        fallback: Option<FallbackReason>,
    },
    SourceStaged {
        path: PathBuf,
        /// Download error when the default image stands in for the remote one.
        download_failure: Option<String>,
    },
    CandidatesCollected {
        kept: usize,
        scanned: usize,
    },
    TileSkipped(TileFailure),
    TilesStaged {
        succeeded: usize,
        attempted: usize,
    },
    ConfigDerived {
        config: FinalConfig,
        manual: bool,
    },
    ConfigDerivationFailed {
        error: String,
    },
    ConfigDefaulted {
        config: FinalConfig,
    },
    StageFailed {
        stage: Stage,
        error: String,
    },
    Composed {
        target: PathBuf,
        tiles: usize,
    },
}

// ============================================================================
// Controller
// ============================================================================

/// Drives one community through the whole pipeline.
pub struct PipelineController<C, H, X> {
    community: String,
    listing: ListingSpec,
    composition: CompositionSettings,
    workspace: Workspace,
    feed: C,
    downloads: DownloadManager<H>,
    compositor: X,
    events: Option<Sender<PipelineEvent>>,

    source_status: TrackStatus,
    tiles_status: TrackStatus,
    config_status: TrackStatus,
    source: Option<ImageSource>,
    staged_source: Option<StagedFile>,
    candidates: Vec<TileCandidate>,
    staged_tiles: Vec<StagedFile>,
    config: Option<CompositionConfig>,
    last_failure: Option<(Stage, String)>,
    output: Option<PathBuf>,
}

impl<C, H, X> PipelineController<C, H, X>
where
    C: FeedClient,
    H: HttpFetch,
    X: Compositor,
{
    pub fn new(
        community: impl Into<String>,
        listing: ListingSpec,
        workspace: Workspace,
        feed: C,
        fetcher: H,
        compositor: X,
    ) -> Self {
        Self {
            community: community.into(),
            listing,
            composition: CompositionSettings::default(),
            workspace,
            feed,
            downloads: DownloadManager::new(fetcher),
            compositor,
            events: None,
            source_status: TrackStatus::Pending,
            tiles_status: TrackStatus::Pending,
            config_status: TrackStatus::Pending,
            source: None,
            staged_source: None,
            candidates: Vec::new(),
            staged_tiles: Vec::new(),
            config: None,
            last_failure: None,
            output: None,
        }
    }

    /// Use `settings` to decide between derived and user-supplied parameters.
    pub fn with_composition(mut self, settings: CompositionSettings) -> Self {
        self.composition = settings;
        self
    }

    /// Send progress events to `tx`.
    pub fn with_events(mut self, tx: Sender<PipelineEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn status(&self, track: Track) -> TrackStatus {
        match track {
            Track::Source => self.source_status,
            Track::Tiles => self.tiles_status,
            Track::Config => self.config_status,
        }
    }

    pub fn source(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    pub fn staged_source(&self) -> Option<&StagedFile> {
        self.staged_source.as_ref()
    }

    pub fn candidates(&self) -> &[TileCandidate] {
        &self.candidates
    }

    pub fn staged_tiles(&self) -> &[StagedFile] {
        &self.staged_tiles
    }

    /// Config accepted or derived for this run, if any.
    pub fn config(&self) -> Option<&CompositionConfig> {
        self.config.as_ref()
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Run every stage that is due and compose the mosaic.
    ///
    /// Returns the path of the finished image.
    pub fn make(&mut self) -> Result<PathBuf, PipelineError> {
        if let Some(output) = &self.output {
            return Ok(output.clone());
        }
        let _lock = self.workspace.lock()?;

        self.rewind_failed_tracks();
        self.last_failure = None;

        self.run_source_track();
        self.run_tiles_track();
        self.run_config_track();

        self.check_gate()?;
        let config = self.finalize_config();
        self.compose(config)
    }

    fn rewind_failed_tracks(&mut self) {
        for status in [&mut self.source_status, &mut self.tiles_status] {
            *status = match *status {
                TrackStatus::FetchFailed => TrackStatus::Pending,
                TrackStatus::StageFailed => TrackStatus::Resolved,
                other => other,
            };
        }
    }

    // ------------------------------------------------------------------------
    // Source track
    // ------------------------------------------------------------------------

    fn run_source_track(&mut self) {
        if self.source_status == TrackStatus::Pending {
            let resolution =
                resolve_source(&self.feed, &self.community, self.workspace.default_asset());
            self.emit(PipelineEvent::SourceResolved {
                source: resolution.source.clone(),
                fallback: resolution.fallback,
            });
            self.source = Some(resolution.source);
            self.source_status = TrackStatus::Resolved;
        }

        if self.source_status == TrackStatus::Resolved {
            match self.stage_source() {
                Ok(staged) => {
                    self.staged_source = Some(staged);
                    self.source_status = TrackStatus::Materialized;
                }
                Err(err) => {
                    self.source_status = TrackStatus::StageFailed;
                    self.fail(Stage::StageSource, err.to_string());
                }
            }
        }
    }

    fn stage_source(&self) -> Result<StagedFile, WorkspaceError> {
        let dir = self.workspace.reset(StagingDir::Source)?;
        let default_asset = self.workspace.ensure_default_asset()?;
        let source = self
            .source
            .clone()
            .unwrap_or_else(|| ImageSource::local(default_asset.to_string_lossy()));

        let staging = self.downloads.stage_source(&source, &dir, &default_asset);
        self.emit(PipelineEvent::SourceStaged {
            path: staging.staged.path.clone(),
            download_failure: staging.failure,
        });
        Ok(staging.staged)
    }

    // ------------------------------------------------------------------------
    // Tiles track
    // ------------------------------------------------------------------------

    fn run_tiles_track(&mut self) {
        if self.tiles_status == TrackStatus::Pending {
            match collect_candidates(&self.feed, &self.community, &self.listing) {
                Ok(collection) => {
                    self.emit(PipelineEvent::CandidatesCollected {
                        kept: collection.candidates.len(),
                        scanned: collection.scanned,
                    });
                    self.candidates = collection.candidates;
                    if self.candidates.is_empty() {
                        // The listing may have new posts next time.
                        self.tiles_status = TrackStatus::FetchFailed;
                        self.fail(
                            Stage::CollectTiles,
                            format!("no post qualifies as a tile ({} scanned)", collection.scanned),
                        );
                    } else {
                        self.tiles_status = TrackStatus::Resolved;
                    }
                }
                Err(err) => {
                    self.candidates.clear();
                    self.tiles_status = TrackStatus::FetchFailed;
                    self.fail(Stage::CollectTiles, err.to_string());
                }
            }
        }

        if self.tiles_status == TrackStatus::Resolved {
            match self.workspace.reset(StagingDir::Tiles) {
                Ok(dir) => {
                    let batch = self.downloads.stage_tiles(&self.candidates, &dir);
                    for failure in &batch.failures {
                        self.emit(PipelineEvent::TileSkipped(failure.clone()));
                    }
                    self.emit(PipelineEvent::TilesStaged {
                        succeeded: batch.succeeded(),
                        attempted: batch.attempted,
                    });
                    if batch.succeeded() == 0 {
                        self.staged_tiles.clear();
                        self.tiles_status = TrackStatus::StageFailed;
                        self.fail(Stage::StageTiles, all_tiles_failed(&batch));
                        return;
                    }
                    self.staged_tiles = batch.staged;
                    self.tiles_status = TrackStatus::Materialized;
                    // New tile set, so any earlier derivation is stale.
                    self.config = None;
                    self.config_status = TrackStatus::Pending;
                }
                Err(err) => {
                    self.tiles_status = TrackStatus::StageFailed;
                    self.fail(Stage::StageTiles, err.to_string());
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Config track
    // ------------------------------------------------------------------------

    fn run_config_track(&mut self) {
        if self.config_status != TrackStatus::Pending
            || self.source_status != TrackStatus::Materialized
            || self.tiles_status != TrackStatus::Materialized
        {
            return;
        }

        if let Some(manual) = self.composition.manual_config() {
            self.emit(PipelineEvent::ConfigDerived {
                config: manual.finalize(),
                manual: true,
            });
            self.config = Some(manual);
            self.config_status = TrackStatus::Resolved;
            return;
        }

        let auto = AutoConfigurator {
            target_width: self.composition.target_width,
            prefer_reuse: self.composition.allow_tile_reuse,
            color_mode: self.composition.color_mode,
        };
        let source_path = self.staged_source.as_ref().map(|s| s.path.as_path());
        match auto.derive(source_path, self.staged_tiles.len()) {
            Ok(config) => {
                self.emit(PipelineEvent::ConfigDerived {
                    config: config.finalize(),
                    manual: false,
                });
                self.config = Some(config);
                self.config_status = TrackStatus::Resolved;
            }
            Err(err) => {
                warn!(error = %err, "could not derive composition config");
                self.emit(PipelineEvent::ConfigDerivationFailed {
                    error: err.to_string(),
                });
            }
        }
    }

    // ------------------------------------------------------------------------
    // Gate and composition
    // ------------------------------------------------------------------------

    fn check_gate(&self) -> Result<(), PipelineError> {
        let incomplete = [
            (self.source_status, Stage::StageSource),
            (self.tiles_status, Stage::StageTiles),
        ]
        .into_iter()
        .find(|(status, _)| *status != TrackStatus::Materialized);

        if let Some((status, fallback_stage)) = incomplete {
            let (stage, reason) = self
                .last_failure
                .clone()
                .unwrap_or_else(|| (fallback_stage, format!("track is {status}")));
            return Err(PipelineError::StageFailed { stage, reason });
        }
        Ok(())
    }

    fn finalize_config(&mut self) -> FinalConfig {
        match self.config {
            Some(config) => {
                self.config_status = TrackStatus::Materialized;
                config.finalize()
            }
            None => {
                let fallback = CompositionConfig {
                    color_mode: self.composition.color_mode,
                    ..CompositionConfig::default()
                }
                .finalize();
                warn!(config = ?fallback, "using default composition config");
                self.emit(PipelineEvent::ConfigDefaulted { config: fallback });
                fallback
            }
        }
    }

    fn compose(&mut self, config: FinalConfig) -> Result<PathBuf, PipelineError> {
        let source_path = match &self.staged_source {
            Some(staged) => staged.path.clone(),
            None => self.workspace.default_asset().to_path_buf(),
        };
        self.workspace.reset(StagingDir::Output)?;
        let target = self.workspace.output_target();
        let tile_paths: Vec<PathBuf> = self.staged_tiles.iter().map(|t| t.path.clone()).collect();
        let tiles = tile_paths.len();

        let request = CompositionRequest::new(source_path, target.clone(), tile_paths, &config);
        self.compositor.compose(&request)?;

        info!(community = %self.community, target = %target.display(), tiles, "mosaic composed");
        self.emit(PipelineEvent::Composed {
            target: target.clone(),
            tiles,
        });
        self.output = Some(target.clone());
        Ok(target)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn fail(&mut self, stage: Stage, error: String) {
        warn!(community = %self.community, %stage, %error, "stage failed");
        self.emit(PipelineEvent::StageFailed {
            stage,
            error: error.clone(),
        });
        self.last_failure = Some((stage, error));
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = &self.events {
            // The receiver going away only means nobody is listening.
            let _ = tx.send(event);
        }
    }
}

fn all_tiles_failed(batch: &TileBatch) -> String {
    let mut reason = format!("all {} tile downloads failed", batch.attempted);
    if let Some(first) = batch.failures.first() {
        reason.push_str(&format!(" (first: {}: {})", first.url, first.error));
    }
    reason
}
