//! Composition parameter derivation.
//!
//! Given the staged source image and the number of staged tiles, derives
//! tile geometry so the mosaic lands near a reference output width:
//!
//! ```text
//! tile_aspect_ratio = W / H
//! enlargement       = floor(target_width / W)
//! tile_width        = sqrt((target_width / tile_aspect_ratio) * (target_width / tile_count)) / 2
//! ```
//!
//! Tile width and enlargement are then finalized (rounded, at least 1) and
//! the grid is sized from the finalized values. If that grid has more slots
//! than there are tiles, tile reuse is forced on; otherwise the caller's
//! preference stands.
//!
//! Only the image header is read. The file handle lives inside
//! [`read_dimensions`] and is closed on every return path.

use crate::types::{ColorMode, CompositionConfig, FinalConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Reference output width the derivation scales towards.
pub const DEFAULT_TARGET_WIDTH: u32 = 1920;

#[derive(Error, Debug)]
pub enum AutoConfigError {
    #[error("Source image has not been staged")]
    SourceNotStaged,
    #[error("Cannot read source image {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Source image {0} has zero width or height")]
    EmptyImage(PathBuf),
    #[error("No tiles available to derive a tile size from")]
    NoTiles,
}

/// Pixel size of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Read an image's pixel dimensions from its header.
pub fn read_dimensions(path: &Path) -> Result<Dimensions, AutoConfigError> {
    let (width, height) =
        image::image_dimensions(path).map_err(|source| AutoConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    if width == 0 || height == 0 {
        return Err(AutoConfigError::EmptyImage(path.to_path_buf()));
    }
    Ok(Dimensions { width, height })
}

/// Number of tiles the compositor places for `source` under `config`.
///
/// The output is the source scaled by `enlargement`, cut into a grid of
/// `tile_width × tile_width / tile_aspect_ratio` cells. Partial cells at the
/// right and bottom edges count as full slots.
pub fn required_tile_slots(source: Dimensions, config: &FinalConfig) -> u64 {
    let enlargement = f64::from(config.enlargement);
    let tile_w = f64::from(config.tile_width);
    let tile_h = tile_w / config.tile_aspect_ratio;
    let cols = (f64::from(source.width) * enlargement / tile_w).ceil();
    let rows = (f64::from(source.height) * enlargement / tile_h).ceil();
    (cols * rows) as u64
}

/// Derives a [`CompositionConfig`] from the staged source and tile count.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfigurator {
    pub target_width: u32,
    /// Kept unless the grid needs more slots than there are tiles.
    pub prefer_reuse: bool,
    pub color_mode: ColorMode,
}

impl Default for AutoConfigurator {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            prefer_reuse: false,
            color_mode: ColorMode::Rgb,
        }
    }
}

impl AutoConfigurator {
    /// Derive parameters for the image at `source` and `tile_count` tiles.
    ///
    /// `source` is `None` when the source track has not staged a file yet.
    pub fn derive(
        &self,
        source: Option<&Path>,
        tile_count: usize,
    ) -> Result<CompositionConfig, AutoConfigError> {
        let path = source.ok_or(AutoConfigError::SourceNotStaged)?;
        let dims = read_dimensions(path)?;
        self.derive_from_dimensions(dims, tile_count)
    }

    /// The pure part of [`derive`](Self::derive).
    pub fn derive_from_dimensions(
        &self,
        dims: Dimensions,
        tile_count: usize,
    ) -> Result<CompositionConfig, AutoConfigError> {
        if tile_count == 0 {
            return Err(AutoConfigError::NoTiles);
        }
        let width = f64::from(dims.width);
        let height = f64::from(dims.height);
        let target = f64::from(self.target_width);

        let tile_aspect_ratio = width / height;
        let enlargement = (target / width).floor();
        let tile_width =
            ((target / tile_aspect_ratio) * (target / tile_count as f64)).sqrt() / 2.0;

        let mut config = CompositionConfig {
            tile_aspect_ratio,
            tile_width,
            enlargement,
            allow_tile_reuse: self.prefer_reuse,
            color_mode: self.color_mode,
        };
        let slots = required_tile_slots(dims, &config.finalize());
        if slots > tile_count as u64 {
            config.allow_tile_reuse = true;
        }
        debug!(
            width = dims.width,
            height = dims.height,
            tile_count,
            slots,
            ?config,
            "derived composition config"
        );
        Ok(config)
    }
}
