//! Hand-off to the external mosaic compositor.
//!
//! The pipeline never touches pixels. It assembles a [`CompositionRequest`]
//! and passes it to a [`Compositor`]. [`CommandCompositor`] writes the request
//! as JSON next to the output target and runs a configured program with the
//! request path as its last argument:
//!
//! ```text
//! <program> [args...] <workspace>/img_out/request.json
//! ```
//!
//! The program reads the request, writes `target_path`, and exits 0. A
//! non-zero exit is reported with whatever the program wrote to stderr.

use crate::types::{ColorMode, FinalConfig};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::{debug, info};

/// File name of the request written into the output directory.
pub const REQUEST_FILE: &str = "request.json";

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Failed to write composition request {path}: {source}")]
    WriteRequest { path: PathBuf, source: io::Error },
    #[error("Failed to serialize composition request: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to start compositor '{program}': {source}")]
    Spawn { program: String, source: io::Error },
    #[error("Compositor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Everything the compositor needs for one mosaic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositionRequest {
    pub source_path: PathBuf,
    pub target_path: PathBuf,
    /// Staged tiles in the order they were downloaded.
    pub tile_paths: Vec<PathBuf>,
    pub tile_aspect_ratio: f64,
    pub tile_width: u32,
    pub enlargement: u32,
    pub allow_tile_reuse: bool,
    pub color_mode: ColorMode,
}

impl CompositionRequest {
    pub fn new(
        source_path: PathBuf,
        target_path: PathBuf,
        tile_paths: Vec<PathBuf>,
        config: &FinalConfig,
    ) -> Self {
        Self {
            source_path,
            target_path,
            tile_paths,
            tile_aspect_ratio: config.tile_aspect_ratio,
            tile_width: config.tile_width,
            enlargement: config.enlargement,
            allow_tile_reuse: config.allow_tile_reuse,
            color_mode: config.color_mode,
        }
    }
}

/// Builds the output mosaic from a request.
pub trait Compositor {
    fn compose(&self, request: &CompositionRequest) -> Result<(), ComposeError>;
}

/// [`Compositor`] that shells out to an external program.
#[derive(Debug, Clone)]
pub struct CommandCompositor {
    program: String,
    args: Vec<String>,
}

impl CommandCompositor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Where the request for `target` is written.
    pub fn request_path(target: &Path) -> PathBuf {
        target
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(REQUEST_FILE)
    }
}

impl Compositor for CommandCompositor {
    fn compose(&self, request: &CompositionRequest) -> Result<(), ComposeError> {
        let request_path = Self::request_path(&request.target_path);
        let json = serde_json::to_string_pretty(request)?;
        fs::write(&request_path, json).map_err(|source| ComposeError::WriteRequest {
            path: request_path.clone(),
            source,
        })?;

        debug!(program = %self.program, args = ?self.args, request = %request_path.display(), "running compositor");
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&request_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| ComposeError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ComposeError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        info!(target = %request.target_path.display(), tiles = request.tile_paths.len(), "compositor finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(dir: &Path) -> CompositionRequest {
        let config = FinalConfig {
            tile_aspect_ratio: 1.5,
            tile_width: 90,
            enlargement: 2,
            allow_tile_reuse: true,
            color_mode: ColorMode::Grayscale,
        };
        CompositionRequest::new(
            dir.join("img_src/img_src.png"),
            dir.join("img_out/img_out.png"),
            vec![dir.join("img_in/0.jpg"), dir.join("img_in/1.png")],
            &config,
        )
    }

    #[test]
    fn request_carries_final_config() {
        let tmp = TempDir::new().unwrap();
        let req = request(tmp.path());
        assert_eq!(req.tile_width, 90);
        assert_eq!(req.enlargement, 2);
        assert!(req.allow_tile_reuse);
        assert_eq!(req.tile_paths.len(), 2);
    }

    #[test]
    fn request_json_shape() {
        let tmp = TempDir::new().unwrap();
        let value = serde_json::to_value(request(tmp.path())).unwrap();
        assert_eq!(value["tile_width"], 90);
        assert_eq!(value["color_mode"], "grayscale");
        assert_eq!(value["tile_paths"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn request_path_sits_next_to_target() {
        assert_eq!(
            CommandCompositor::request_path(Path::new("/w/img_out/img_out.png")),
            PathBuf::from("/w/img_out/request.json")
        );
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("img_out")).unwrap();
        let compositor = CommandCompositor::new("definitely-not-a-real-compositor-binary", vec![]);
        let err = compositor.compose(&request(tmp.path())).unwrap_err();
        assert!(matches!(err, ComposeError::Spawn { .. }));
        assert!(tmp.path().join("img_out/request.json").exists());
    }

    #[test]
    fn missing_output_dir_is_write_error() {
        let tmp = TempDir::new().unwrap();
        let compositor = CommandCompositor::new("true", vec![]);
        let err = compositor.compose(&request(tmp.path())).unwrap_err();
        assert!(matches!(err, ComposeError::WriteRequest { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn successful_program_receives_request_path() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("img_out")).unwrap();
        // `sh -c script <request>` binds the request path to $0.
        let compositor = CommandCompositor::new(
            "sh",
            vec!["-c".into(), "cp \"$0\" \"$(dirname \"$0\")/seen.json\"".into()],
        );
        compositor.compose(&request(tmp.path())).unwrap();

        let seen = fs::read_to_string(tmp.path().join("img_out/seen.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&seen).unwrap();
        assert_eq!(value["enlargement"], 2);
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_reports_stderr() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("img_out")).unwrap();
        let compositor = CommandCompositor::new(
            "sh",
            vec!["-c".into(), "echo 'no tiles fit' >&2; exit 3".into()],
        );
        match compositor.compose(&request(tmp.path())).unwrap_err() {
            ComposeError::Failed { stderr, .. } => assert_eq!(stderr, "no tiles fit"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
