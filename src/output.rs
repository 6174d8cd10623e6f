//! CLI output formatting.
//!
//! Output leads with what was decided (which image, how many tiles, which
//! parameters) and shows paths and URLs as indented context lines.
//!
//! # Output Format
//!
//! ## make
//!
//! ```text
//! Source: https://styles.redditmedia.com/header.png
//!     Staged: img_src/img_src.png
//! Tiles: 3 candidates from 100 posts
//!     001 skipped: https://i.redd.it/b.png (HTTP 404)
//!     Staged: 2 of 3
//! Config (auto): tile 90px, ratio 1.778, enlargement x1, reuse on, rgb
//! Mosaic: img_out/img_out.png (2 tiles)
//! ```
//!
//! ## collect
//!
//! ```text
//! Tiles: 2 candidates from 5 posts
//!     000 https://i.redd.it/a.jpg
//!     001 https://i.redd.it/c.png
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::config::MosaicConfig;
use crate::pipeline::{PipelineEvent, Track, TrackStatus};
use crate::source::Resolution;
use crate::tiles::Collection;
use crate::types::{ColorMode, FinalConfig, ImageSource};
use crate::workspace::{StagingDir, Workspace};

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 0-based candidate index as 3-digit zero-padded.
fn format_index(index: usize) -> String {
    format!("{:0>3}", index)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn source_line(source: &ImageSource) -> String {
    if source.is_local() {
        format!("Source: default image ({})", source.locator)
    } else {
        format!("Source: {}", source.locator)
    }
}

fn config_line(label: &str, config: &FinalConfig) -> String {
    let color = match config.color_mode {
        ColorMode::Rgb => "rgb",
        ColorMode::Grayscale => "grayscale",
    };
    format!(
        "Config ({label}): tile {}px, ratio {:.3}, enlargement x{}, reuse {}, {color}",
        config.tile_width,
        config.tile_aspect_ratio,
        config.enlargement,
        if config.allow_tile_reuse { "on" } else { "off" },
    )
}

// ============================================================================
// make: pipeline events
// ============================================================================

/// Format a single pipeline progress event as display lines.
pub fn format_pipeline_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::SourceResolved { source, fallback } => {
            let mut lines = vec![source_line(source)];
            if let Some(reason) = fallback {
                lines.push(format!("{}Fallback: {}", indent(1), reason));
            }
            lines
        }
        PipelineEvent::SourceStaged {
            path,
            download_failure,
        } => {
            let mut lines = Vec::new();
            if let Some(err) = download_failure {
                lines.push(format!(
                    "{}Download failed: {err}, using default image",
                    indent(1)
                ));
            }
            lines.push(format!("{}Staged: {}", indent(1), path.display()));
            lines
        }
        PipelineEvent::CandidatesCollected { kept, scanned } => vec![format!(
            "Tiles: {} from {}",
            plural(*kept, "candidate", "candidates"),
            plural(*scanned, "post", "posts"),
        )],
        PipelineEvent::TileSkipped(failure) => vec![format!(
            "{}{} skipped: {} ({})",
            indent(1),
            format_index(failure.index),
            failure.url,
            failure.error
        )],
        PipelineEvent::TilesStaged {
            succeeded,
            attempted,
        } => vec![format!("{}Staged: {succeeded} of {attempted}", indent(1))],
        PipelineEvent::ConfigDerived { config, manual } => {
            vec![config_line(if *manual { "manual" } else { "auto" }, config)]
        }
        PipelineEvent::ConfigDerivationFailed { error } => {
            vec![format!("Config: could not derive parameters: {error}")]
        }
        PipelineEvent::ConfigDefaulted { config } => vec![config_line("default", config)],
        PipelineEvent::StageFailed { stage, error } => {
            vec![format!("Failed: {stage}"), format!("{}{error}", indent(1))]
        }
        PipelineEvent::Composed { target, tiles } => vec![format!(
            "Mosaic: {} ({})",
            target.display(),
            plural(*tiles, "tile", "tiles")
        )],
    }
}

/// Format the final status of every track.
///
/// ```text
/// Status
///     source: materialized (2)
///     tiles: fetch failed (-1)
///     config: pending (0)
/// ```
pub fn format_track_summary(statuses: &[(Track, TrackStatus)]) -> Vec<String> {
    let mut lines = vec!["Status".to_string()];
    for (track, status) in statuses {
        let marker = if status.is_failed() { "  <-" } else { "" };
        lines.push(format!("{}{track}: {status}{marker}", indent(1)));
    }
    lines
}

pub fn print_track_summary(statuses: &[(Track, TrackStatus)]) {
    for line in format_track_summary(statuses) {
        println!("{}", line);
    }
}

// ============================================================================
// source / collect
// ============================================================================

/// Format the result of resolving a community's source image.
pub fn format_resolution(resolution: &Resolution) -> Vec<String> {
    format_pipeline_event(&PipelineEvent::SourceResolved {
        source: resolution.source.clone(),
        fallback: resolution.fallback.clone(),
    })
}

pub fn print_resolution(resolution: &Resolution) {
    for line in format_resolution(resolution) {
        println!("{}", line);
    }
}

/// Format collected tile candidates, one per line.
pub fn format_collection(collection: &Collection) -> Vec<String> {
    let mut lines = format_pipeline_event(&PipelineEvent::CandidatesCollected {
        kept: collection.candidates.len(),
        scanned: collection.scanned,
    });
    for candidate in &collection.candidates {
        lines.push(format!(
            "{}{} {}",
            indent(1),
            format_index(candidate.index),
            candidate.url
        ));
    }
    lines
}

pub fn print_collection(collection: &Collection) {
    for line in format_collection(collection) {
        println!("{}", line);
    }
}

// ============================================================================
// check
// ============================================================================

/// Format the resolved listing and workspace layout of a config.
///
/// ```text
/// Listing
///     top, week, 700 posts, score >= 2000
/// Workspace
///     Source: ./img_src
///     Tiles: ./img_in
///     Output: ./img_out/img_out.png
///     Default image: ./img_def.png
/// Compositor
///     mosaic
/// ```
pub fn format_check_output(config: &MosaicConfig, workspace: &Workspace) -> Vec<String> {
    let spec = config.listing.spec();
    let window = if spec.category.takes_time_window() {
        format!(", {}", spec.time_window)
    } else {
        String::new()
    };
    let mut compositor = config.compositor.program.clone();
    for arg in &config.compositor.args {
        compositor.push(' ');
        compositor.push_str(arg);
    }

    vec![
        "Listing".to_string(),
        format!(
            "{}{}{window}, {}, score >= {}",
            indent(1),
            spec.category,
            plural(spec.limit, "post", "posts"),
            spec.min_score
        ),
        "Workspace".to_string(),
        format!(
            "{}Source: {}{}",
            indent(1),
            workspace.dir(StagingDir::Source).display(),
            staged_note(workspace, StagingDir::Source)
        ),
        format!(
            "{}Tiles: {}{}",
            indent(1),
            workspace.dir(StagingDir::Tiles).display(),
            staged_note(workspace, StagingDir::Tiles)
        ),
        format!(
            "{}Output: {}",
            indent(1),
            workspace.output_target().display()
        ),
        format!(
            "{}Default image: {}",
            indent(1),
            workspace.default_asset().display()
        ),
        "Compositor".to_string(),
        format!("{}{compositor}", indent(1)),
    ]
}

/// " (3 files staged)" for a staging directory holding files from a past run.
fn staged_note(workspace: &Workspace, which: StagingDir) -> String {
    match workspace.staged_files(which).len() {
        0 => String::new(),
        n => format!(" ({} staged)", plural(n, "file", "files")),
    }
}

pub fn print_check_output(config: &MosaicConfig, workspace: &Workspace) {
    for line in format_check_output(config, workspace) {
        println!("{}", line);
    }
}
