//! Shared types passed between pipeline stages.
//!
//! The resolver, collector, download manager and auto-configurator never talk
//! to each other directly; the [`pipeline`](crate::pipeline) controller moves
//! these values between them. Keeping them in one module keeps that hand-off
//! explicit.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where the source image comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// The bundled default asset inside the workspace.
    Local,
    /// A URL taken from the community's metadata.
    Remote,
}

/// The one image the mosaic is built to approximate.
///
/// When `origin` is [`Origin::Local`], `locator` is always the path of the
/// bundled default asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSource {
    pub origin: Origin,
    pub locator: String,
}

impl ImageSource {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            origin: Origin::Local,
            locator: path.into(),
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            origin: Origin::Remote,
            locator: url.into(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }
}

/// A post whose linked image qualifies as a mosaic tile.
///
/// `index` is assigned in listing scan order and never reassigned within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileCandidate {
    pub index: usize,
    pub url: String,
}

/// What a staged file is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagedRole {
    Source,
    /// Carries the candidate index the tile was collected under.
    Tile(usize),
}

/// A file written (or reused) in a staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub role: StagedRole,
    pub path: PathBuf,
    pub success: bool,
}

// =============================================================================
// Listing specification
// =============================================================================

/// Ranked listing to draw tiles from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Top,
    Hot,
    New,
    Controversial,
    Rising,
    #[serde(rename = "randomrising")]
    #[value(name = "randomrising")]
    RandomRising,
}

impl Category {
    /// Path segment of the listing endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Top => "top",
            Category::Hot => "hot",
            Category::New => "new",
            Category::Controversial => "controversial",
            Category::Rising => "rising",
            Category::RandomRising => "randomrising",
        }
    }

    /// Only time-ranked listings accept a time window.
    pub fn takes_time_window(self) -> bool {
        matches!(self, Category::Top | Category::Controversial)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TimeWindow {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeWindow {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Hour => "hour",
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
            TimeWindow::Month => "month",
            TimeWindow::Year => "year",
            TimeWindow::All => "all",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which posts to scan and how strict the filter is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ListingSpec {
    pub category: Category,
    pub time_window: TimeWindow,
    /// Maximum number of listing entries to scan (not the number kept).
    pub limit: usize,
    pub min_score: i64,
}

// =============================================================================
// Composition parameters
// =============================================================================

/// Color space the compositor matches tiles in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Rgb,
    Grayscale,
}

/// Composition parameters before finalization.
///
/// Values may be fractional here; [`CompositionConfig::finalize`] produces
/// the integer form the compositor receives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompositionConfig {
    /// Tile width divided by tile height.
    pub tile_aspect_ratio: f64,
    pub tile_width: f64,
    pub enlargement: f64,
    pub allow_tile_reuse: bool,
    pub color_mode: ColorMode,
}

impl Default for CompositionConfig {
    /// Used when nothing could be derived: wide tiles, generous enlargement,
    /// reuse on so a short tile set still fills the grid.
    fn default() -> Self {
        Self {
            tile_aspect_ratio: 1920.0 / 800.0,
            tile_width: 300.0,
            enlargement: 20.0,
            allow_tile_reuse: true,
            color_mode: ColorMode::Rgb,
        }
    }
}

impl CompositionConfig {
    /// Round tile width and enlargement to the nearest positive integer.
    pub fn finalize(&self) -> FinalConfig {
        FinalConfig {
            tile_aspect_ratio: self.tile_aspect_ratio,
            tile_width: round_positive(self.tile_width),
            enlargement: round_positive(self.enlargement),
            allow_tile_reuse: self.allow_tile_reuse,
            color_mode: self.color_mode,
        }
    }
}

/// Nearest integer, never below 1. Non-finite input maps to 1.
pub(crate) fn round_positive(value: f64) -> u32 {
    if !value.is_finite() || value < 1.0 {
        return 1;
    }
    value.round().min(u32::MAX as f64) as u32
}

/// Composition parameters exactly as handed to the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FinalConfig {
    pub tile_aspect_ratio: f64,
    pub tile_width: u32,
    pub enlargement: u32,
    pub allow_tile_reuse: bool,
    pub color_mode: ColorMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_source_constructors() {
        let local = ImageSource::local("img_def.png");
        assert!(local.is_local());
        assert_eq!(local.locator, "img_def.png");

        let remote = ImageSource::remote("https://example.com/a.png");
        assert_eq!(remote.origin, Origin::Remote);
        assert!(!remote.is_local());
    }

    #[test]
    fn only_top_and_controversial_take_time_window() {
        assert!(Category::Top.takes_time_window());
        assert!(Category::Controversial.takes_time_window());
        assert!(!Category::Hot.takes_time_window());
        assert!(!Category::New.takes_time_window());
        assert!(!Category::Rising.takes_time_window());
        assert!(!Category::RandomRising.takes_time_window());
    }

    #[test]
    fn category_serde_names_match_endpoints() {
        let json = serde_json::to_string(&Category::RandomRising).unwrap();
        assert_eq!(json, "\"randomrising\"");
        let parsed: Category = serde_json::from_str("\"controversial\"").unwrap();
        assert_eq!(parsed, Category::Controversial);
    }

    #[test]
    fn finalize_rounds_to_nearest() {
        let config = CompositionConfig {
            tile_aspect_ratio: 1.5,
            tile_width: 89.6,
            enlargement: 2.4,
            allow_tile_reuse: false,
            color_mode: ColorMode::Rgb,
        };
        let fin = config.finalize();
        assert_eq!(fin.tile_width, 90);
        assert_eq!(fin.enlargement, 2);
        assert_eq!(fin.tile_aspect_ratio, 1.5);
    }

    #[test]
    fn finalize_never_yields_zero() {
        let config = CompositionConfig {
            tile_width: 0.2,
            enlargement: 0.0,
            ..Default::default()
        };
        let fin = config.finalize();
        assert_eq!(fin.tile_width, 1);
        assert_eq!(fin.enlargement, 1);
    }

    #[test]
    fn round_positive_handles_nan() {
        assert_eq!(round_positive(f64::NAN), 1);
        assert_eq!(round_positive(f64::INFINITY), 1);
    }

    #[test]
    fn default_composition_config_is_usable() {
        let fin = CompositionConfig::default().finalize();
        assert_eq!(fin.tile_width, 300);
        assert_eq!(fin.enlargement, 20);
        assert!(fin.allow_tile_reuse);
        assert_eq!(fin.color_mode, ColorMode::Rgb);
    }
}
