//! Naming conventions for staged files and remote image URLs.
//!
//! Every file the pipeline writes gets its name here, so the tile batch and
//! the path list handed to the compositor can never disagree:
//!
//! - `img_src/img_src.<ext>`: the downloaded source image
//! - `img_in/<n>.<ext>`: tile `n`, where `n` counts *successful* downloads
//!   from 0 (failed tiles leave no gap)
//! - `img_out/img_out.png`: the compositor's target
//!
//! `<ext>` is always the lowercase extension of the URL's path component.
//! Query strings and fragments are ignored, so
//! `https://i.redd.it/abc.JPG?width=640` has extension `jpg`.

/// Extensions a listing entry's URL must carry to become a tile candidate.
pub const TILE_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg"];

/// Stem of the staged source image.
pub const SOURCE_STEM: &str = "img_src";

/// File name of the compositor's output inside the output directory.
pub const OUTPUT_FILE: &str = "img_out.png";

/// Used when a source URL has no usable extension.
const FALLBACK_EXTENSION: &str = "png";

/// Lowercase extension of a URL's path, if it has one.
///
/// Falls back to plain string splitting when the URL does not parse, so
/// scheme-less links from a listing are still classified.
pub fn url_extension(url: &str) -> Option<String> {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    let file = path.rsplit('/').next()?;
    let (stem, ext) = file.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the URL points at one of the [`TILE_EXTENSIONS`].
pub fn is_tile_image(url: &str) -> bool {
    url_extension(url).is_some_and(|ext| TILE_EXTENSIONS.contains(&ext.as_str()))
}

/// File name for the staged source image downloaded from `url`.
pub fn source_file_name(url: &str) -> String {
    let ext = url_extension(url).unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
    format!("{SOURCE_STEM}.{ext}")
}

/// File name for the tile staged at `position` (0-based, compacted).
pub fn tile_file_name(position: usize, url: &str) -> String {
    let ext = url_extension(url).unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
    format!("{position}.{ext}")
}
