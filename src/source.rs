//! Source image resolution.
//!
//! A community's metadata can carry up to three images. They are tried in a
//! fixed priority order and the first non-empty one wins:
//!
//! ```text
//! header image → banner background image → icon image → bundled default
//! ```
//!
//! Resolution never fails. A metadata request that errors for any reason
//! (connection, status, timeout, redirect loop, malformed body) and a
//! community with no images both resolve to the bundled default asset, and
//! the reason is returned alongside so the caller can report it.

use crate::feed::{CommunityMetadata, FeedClient};
use crate::types::ImageSource;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Why the bundled default was used instead of a remote image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The metadata request failed; carries the error text.
    MetadataUnavailable(String),
    /// Metadata arrived but every image field was empty.
    NoImageFields,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::MetadataUnavailable(err) => {
                write!(f, "community metadata unavailable: {err}")
            }
            FallbackReason::NoImageFields => f.write_str("community has no header, banner, or icon image"),
        }
    }
}

/// Outcome of [`resolve_source`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub source: ImageSource,
    /// Set whenever `source` is the local default.
    pub fallback: Option<FallbackReason>,
}

/// Pick the highest-priority non-empty image from community metadata.
///
/// Values are trimmed before the emptiness check.
pub fn pick_image(metadata: &CommunityMetadata) -> Option<&str> {
    [
        metadata.header_image.as_str(),
        metadata.banner_background_image.as_str(),
        metadata.icon_image.as_str(),
    ]
    .into_iter()
    .map(str::trim)
    .find(|s| !s.is_empty())
}

/// Resolve the source image for `community`, falling back to `default_asset`.
pub fn resolve_source(
    feed: &impl FeedClient,
    community: &str,
    default_asset: &Path,
) -> Resolution {
    let fallback = |reason: FallbackReason| {
        warn!(community, %reason, "using default source image");
        Resolution {
            source: ImageSource::local(default_asset.to_string_lossy()),
            fallback: Some(reason),
        }
    };

    let metadata = match feed.community_metadata(community) {
        Ok(m) => m,
        Err(err) => return fallback(FallbackReason::MetadataUnavailable(err.to_string())),
    };

    match pick_image(&metadata) {
        Some(url) => {
            info!(community, url, "resolved source image");
            Resolution {
                source: ImageSource::remote(url),
                fallback: None,
            }
        }
        None => fallback(FallbackReason::NoImageFields),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockFeed;
    use crate::types::Origin;

    fn metadata(header: &str, banner: &str, icon: &str) -> CommunityMetadata {
        CommunityMetadata {
            header_image: header.to_string(),
            banner_background_image: banner.to_string(),
            icon_image: icon.to_string(),
        }
    }

    // =========================================================================
    // pick_image() tests
    // =========================================================================

    #[test]
    fn header_wins_over_everything() {
        let meta = metadata("h.png", "b.png", "i.png");
        assert_eq!(pick_image(&meta), Some("h.png"));
    }

    #[test]
    fn banner_used_when_header_empty() {
        let meta = metadata("", "b.png", "i.png");
        assert_eq!(pick_image(&meta), Some("b.png"));
    }

    #[test]
    fn icon_used_last() {
        let meta = metadata("", "", "i.png");
        assert_eq!(pick_image(&meta), Some("i.png"));
    }

    #[test]
    fn whitespace_only_counts_as_empty() {
        let meta = metadata("   ", "", "i.png");
        assert_eq!(pick_image(&meta), Some("i.png"));
    }

    #[test]
    fn all_empty_picks_nothing() {
        assert_eq!(pick_image(&CommunityMetadata::default()), None);
    }

    // =========================================================================
    // resolve_source() tests
    // =========================================================================

    #[test]
    fn resolves_remote_header() {
        let feed = MockFeed::new().with_metadata(metadata("https://x/h.png", "https://x/b.png", ""));
        let res = resolve_source(&feed, "pics", Path::new("/ws/img_def.png"));
        assert_eq!(res.source, ImageSource::remote("https://x/h.png"));
        assert!(res.fallback.is_none());
    }

    #[test]
    fn all_empty_falls_back_to_default() {
        let feed = MockFeed::new().with_metadata(CommunityMetadata::default());
        let res = resolve_source(&feed, "pics", Path::new("/ws/img_def.png"));
        assert_eq!(res.source.origin, Origin::Local);
        assert_eq!(res.source.locator, "/ws/img_def.png");
        assert_eq!(res.fallback, Some(FallbackReason::NoImageFields));
    }

    #[test]
    fn metadata_failure_falls_back_to_default() {
        let feed = MockFeed::new().with_metadata_error(503);
        let res = resolve_source(&feed, "pics", Path::new("img_def.png"));
        assert!(res.source.is_local());
        match res.fallback {
            Some(FallbackReason::MetadataUnavailable(msg)) => assert!(msg.contains("503")),
            other => panic!("unexpected fallback: {other:?}"),
        }
    }

    #[test]
    fn fallback_reason_display() {
        assert_eq!(
            FallbackReason::NoImageFields.to_string(),
            "community has no header, banner, or icon image"
        );
        assert!(
            FallbackReason::MetadataUnavailable("timed out".to_string())
                .to_string()
                .ends_with("timed out")
        );
    }
}
