//! Run configuration.
//!
//! Handles loading, validating, and merging `mosaic.toml`. Stock defaults are
//! serialized to a TOML table and the user file is merged on top of it key by
//! key, so a config file only needs the values it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [credentials]
//! client_id = ""
//! client_secret = ""
//! user_agent = "reddit-mosaic/0.3.0"
//!
//! [workspace]
//! root = "."
//! source_dir = "img_src"
//! tiles_dir = "img_in"
//! output_dir = "img_out"
//! default_asset = "img_def.png"
//!
//! [listing]
//! preset = "week"           # day | week | month | year | all | custom
//! category = "top"          # used when preset = "custom"
//! time_window = "week"
//! limit = 700
//! min_score = 2000
//!
//! [download]
//! timeout_secs = 30
//!
//! [composition]
//! mode = "auto"             # auto | manual
//! target_width = 1920
//! allow_tile_reuse = false
//! color_mode = "rgb"        # rgb | grayscale
//!
//! [compositor]
//! program = "mosaic"
//! args = []
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::{Category, ColorMode, CompositionConfig, ListingSpec, TimeWindow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "mosaic.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Run configuration loaded from `mosaic.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MosaicConfig {
    /// Credentials handed to the feed client.
    pub credentials: Credentials,
    /// Staging directory layout.
    pub workspace: WorkspaceConfig,
    /// Which listing tiles are drawn from.
    pub listing: ListingConfig,
    /// Network settings for downloads and feed requests.
    pub download: DownloadConfig,
    /// Composition parameters (auto-derived or manual).
    pub composition: CompositionSettings,
    /// External compositor invocation.
    pub compositor: CompositorConfig,
}

impl MosaicConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.credentials.user_agent.trim().is_empty() {
            return Err(ConfigError::Validation(
                "credentials.user_agent must not be empty".into(),
            ));
        }
        self.workspace.validate()?;
        if self.listing.preset == Preset::Custom && self.listing.limit == 0 {
            return Err(ConfigError::Validation(
                "listing.limit must be greater than 0".into(),
            ));
        }
        if self.download.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "download.timeout_secs must be greater than 0".into(),
            ));
        }
        self.composition.validate()?;
        if self.compositor.program.trim().is_empty() {
            return Err(ConfigError::Validation(
                "compositor.program must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Feed-client credentials.
///
/// Passed explicitly into the client constructor; nothing reads them from
/// process-wide state. `Debug` redacts the secret.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: default_user_agent(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn default_user_agent() -> String {
    format!("reddit-mosaic/{}", env!("CARGO_PKG_VERSION"))
}

/// Staging directory layout, relative to `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub source_dir: String,
    pub tiles_dir: String,
    pub output_dir: String,
    /// Bundled image used whenever the source cannot be resolved remotely.
    pub default_asset: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            source_dir: "img_src".to_string(),
            tiles_dir: "img_in".to_string(),
            output_dir: "img_out".to_string(),
            default_asset: "img_def.png".to_string(),
        }
    }
}

impl WorkspaceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let dirs = [
            ("workspace.source_dir", &self.source_dir),
            ("workspace.tiles_dir", &self.tiles_dir),
            ("workspace.output_dir", &self.output_dir),
            ("workspace.default_asset", &self.default_asset),
        ];
        for (key, value) in dirs {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
            if Path::new(value.as_str()).components().count() != 1 {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a single path component, got {value:?}"
                )));
            }
        }
        let staging = [&self.source_dir, &self.tiles_dir, &self.output_dir];
        for (i, a) in staging.iter().enumerate() {
            if staging[i + 1..].contains(a) {
                return Err(ConfigError::Validation(format!(
                    "staging directories must be distinct, {a:?} is used twice"
                )));
            }
        }
        Ok(())
    }
}

/// Named listing presets.
///
/// Each widens the time window and raises the score bar together, so longer
/// windows do not flood the tile set with low-effort posts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Day,
    #[default]
    Week,
    Month,
    Year,
    All,
    /// Use the explicit `category`/`time_window`/`limit`/`min_score` values.
    Custom,
}

impl Preset {
    /// The listing a preset stands for; `None` for [`Preset::Custom`].
    pub fn spec(self) -> Option<ListingSpec> {
        let (time_window, limit, min_score) = match self {
            Preset::Day => (TimeWindow::Day, 100, 1000),
            Preset::Week => (TimeWindow::Week, 700, 2000),
            Preset::Month => (TimeWindow::Month, 3000, 4000),
            Preset::Year => (TimeWindow::Year, 36500, 8000),
            Preset::All => (TimeWindow::All, 500_000, 16000),
            Preset::Custom => return None,
        };
        Some(ListingSpec {
            category: Category::Top,
            time_window,
            limit,
            min_score,
        })
    }
}

/// Listing selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingConfig {
    pub preset: Preset,
    pub category: Category,
    pub time_window: TimeWindow,
    pub limit: usize,
    pub min_score: i64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            preset: Preset::Week,
            category: Category::Top,
            time_window: TimeWindow::Week,
            limit: 700,
            min_score: 2000,
        }
    }
}

impl ListingConfig {
    /// Resolve the preset (or the custom fields) into a concrete spec.
    pub fn spec(&self) -> ListingSpec {
        self.preset.spec().unwrap_or(ListingSpec {
            category: self.category,
            time_window: self.time_window,
            limit: self.limit,
            min_score: self.min_score,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    /// Per-request timeout in seconds. No request is retried.
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl DownloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Whether composition parameters are derived or taken as given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompositionMode {
    #[default]
    Auto,
    Manual,
}

/// Composition settings.
///
/// In `auto` mode only `target_width`, `allow_tile_reuse` (as a preference)
/// and `color_mode` apply. In `manual` mode the three geometry fields are
/// required and used verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositionSettings {
    pub mode: CompositionMode,
    /// Reference output width the derivation scales towards.
    pub target_width: u32,
    pub allow_tile_reuse: bool,
    pub color_mode: ColorMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_aspect_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enlargement: Option<f64>,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            mode: CompositionMode::Auto,
            target_width: 1920,
            allow_tile_reuse: false,
            color_mode: ColorMode::Rgb,
            tile_aspect_ratio: None,
            tile_width: None,
            enlargement: None,
        }
    }
}

impl CompositionSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.target_width == 0 {
            return Err(ConfigError::Validation(
                "composition.target_width must be greater than 0".into(),
            ));
        }
        let geometry = [
            ("composition.tile_aspect_ratio", self.tile_aspect_ratio),
            ("composition.tile_width", self.tile_width),
            ("composition.enlargement", self.enlargement),
        ];
        for (key, value) in geometry {
            match value {
                Some(v) if !(v.is_finite() && v > 0.0) => {
                    return Err(ConfigError::Validation(format!(
                        "{key} must be a positive number"
                    )));
                }
                None if self.mode == CompositionMode::Manual => {
                    return Err(ConfigError::Validation(format!(
                        "{key} is required when composition.mode = \"manual\""
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// The user-supplied config, when running in manual mode.
    pub fn manual_config(&self) -> Option<CompositionConfig> {
        if self.mode != CompositionMode::Manual {
            return None;
        }
        Some(CompositionConfig {
            tile_aspect_ratio: self.tile_aspect_ratio?,
            tile_width: self.tile_width?,
            enlargement: self.enlargement?,
            allow_tile_reuse: self.allow_tile_reuse,
            color_mode: self.color_mode,
        })
    }
}

/// How the external compositor is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompositorConfig {
    pub program: String,
    /// Extra arguments placed before the request file path.
    pub args: Vec<String>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            program: "mosaic".to_string(),
            args: Vec::new(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(MosaicConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MosaicConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MosaicConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`, falling back to stock defaults when
/// the file is absent.
pub fn load_config(path: &Path) -> Result<MosaicConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `mosaic.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# reddit-mosaic configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Credentials passed to the feed client
# ---------------------------------------------------------------------------
[credentials]
client_id = ""
client_secret = ""
# Sent with every request. Reddit throttles generic agents hard.
# user_agent = "reddit-mosaic/<version>"

# ---------------------------------------------------------------------------
# Workspace layout. Staging directories are wiped at the start of each run.
# ---------------------------------------------------------------------------
[workspace]
root = "."
source_dir = "img_src"
tiles_dir = "img_in"
output_dir = "img_out"
# Written from the built-in image when missing; used when the community has
# no header, banner, or icon image.
default_asset = "img_def.png"

# ---------------------------------------------------------------------------
# Tile listing
# ---------------------------------------------------------------------------
[listing]
# day   -> top of day,   scan 100,    min score 1000
# week  -> top of week,  scan 700,    min score 2000
# month -> top of month, scan 3000,   min score 4000
# year  -> top of year,  scan 36500,  min score 8000
# all   -> top of all,   scan 500000, min score 16000
# custom -> use the four keys below
preset = "week"
category = "top"          # top | hot | new | controversial | rising | randomrising
time_window = "week"      # hour | day | week | month | year | all (top/controversial only)
limit = 700
min_score = 2000

# ---------------------------------------------------------------------------
# Network
# ---------------------------------------------------------------------------
[download]
# Per-request timeout. Failed requests are not retried.
timeout_secs = 30

# ---------------------------------------------------------------------------
# Composition
# ---------------------------------------------------------------------------
[composition]
# auto: derive tile geometry from the source image and tile count.
# manual: use tile_aspect_ratio, tile_width and enlargement below.
mode = "auto"
target_width = 1920
# In auto mode this is a preference; reuse is forced on when there are
# fewer tiles than grid slots.
allow_tile_reuse = false
color_mode = "rgb"        # rgb | grayscale
# tile_aspect_ratio = 1.5
# tile_width = 60
# enlargement = 4

# ---------------------------------------------------------------------------
# External compositor
# ---------------------------------------------------------------------------
[compositor]
# Invoked as: <program> <args...> <workspace>/img_out/request.json
program = "mosaic"
args = []
"##
}
