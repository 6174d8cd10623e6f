//! # Reddit Mosaic
//!
//! Builds a photo mosaic of a subreddit out of its own posts. The community's
//! header image becomes the picture to approximate; the highest-scored image
//! posts become the tiles.
//!
//! # Architecture: Two Tracks and a Gate
//!
//! A run is driven by the [`pipeline::PipelineController`]. It advances two
//! independent tracks, derives composition parameters once both are on disk,
//! and hands the result to an external compositor:
//!
//! ```text
//! Source   community metadata → source image URL → img_src/img_src.<ext>
//! Tiles    ranked listing     → tile candidates  → img_in/0.jpg, 1.png, ...
//!                                      ↓
//! Config   source dimensions + tile count → tile geometry
//!                                      ↓
//! Gate     compositor(img_src, img_in/*, config) → img_out/img_out.png
//! ```
//!
//! Each track carries a status, so a run that fails halfway can be resumed
//! without redoing the stages that already succeeded. Network failures are
//! absorbed where they happen: the source falls back to a bundled default
//! image and unreachable tiles are skipped.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Track statuses, resume logic, the composition gate |
//! | [`source`] | Picks the source image from community metadata, with fallback |
//! | [`tiles`] | Filters a ranked listing down to tile candidates |
//! | [`download`] | Single-URL fetch and batch tile staging with failure isolation |
//! | [`workspace`] | Staging directory reset, bundled default image, run lock |
//! | [`autoconfig`] | Derives tile geometry from the source image and tile count |
//! | [`compose`] | Compositor trait and the external-command implementation |
//! | [`feed`] | Feed client trait and the Reddit JSON implementation |
//! | [`config`] | `mosaic.toml` loading, merging, and validation |
//! | [`types`] | Values passed between stages |
//! | [`naming`] | File naming for staged images |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Compositor Is External
//!
//! Matching tiles to image regions is a separate program. This crate only
//! reads image headers (for the source's dimensions) and never decodes or
//! resamples pixels. The compositor receives a JSON request listing the
//! source, the tiles, and the finalized parameters.
//!
//! ## Fresh Staging Directories
//!
//! Every download stage deletes its directory and recreates it before writing.
//! Files from an earlier run can never end up in the mosaic. Since that makes
//! two concurrent runs on one workspace destructive, a lock file guards each
//! run.
//!
//! ## Compacted Tile Numbering
//!
//! Tiles are written as `<n>.<ext>` where `n` counts successful downloads, so
//! the tile directory never has gaps and the compositor receives exactly the
//! files that exist, in download order. The original candidate index stays on
//! the in-memory staged record.

pub mod autoconfig;
pub mod compose;
pub mod config;
pub mod download;
pub mod feed;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod tiles;
pub mod types;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_helpers;
