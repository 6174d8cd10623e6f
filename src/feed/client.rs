//! Feed client trait and the values it returns.
//!
//! The [`FeedClient`] trait is the seam between the pipeline and the
//! community feed. The production implementation is
//! [`RedditClient`](super::reddit::RedditClient); tests swap in a mock that
//! serves canned metadata and listings.

use crate::types::ListingSpec;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Image fields of a community's metadata.
///
/// Each field is empty when the community does not set it; a client must
/// map absent or `null` values to the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommunityMetadata {
    pub header_image: String,
    pub banner_background_image: String,
    pub icon_image: String,
}

/// One listing entry, reduced to the fields the tile filter reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Text post, or a link post that also carries body text.
    pub has_self_text: bool,
    pub url: String,
    pub score: i64,
    /// Flagged as mature content.
    pub is_mature: bool,
}

/// Read access to a community feed.
pub trait FeedClient {
    /// Look up the community's header, banner and icon images.
    fn community_metadata(&self, community: &str) -> Result<CommunityMetadata, FeedError>;

    /// Fetch up to `spec.limit` entries of the requested listing, in rank order.
    ///
    /// Only `spec.category`, `spec.time_window` and `spec.limit` apply here;
    /// score filtering is the caller's job.
    fn listing(&self, community: &str, spec: &ListingSpec) -> Result<Vec<Post>, FeedError>;
}

/// Check a community name before it is spliced into a request path.
///
/// Accepts an optional `r/` prefix and ASCII letters, digits and underscores.
pub fn normalize_community(name: &str) -> Result<&str, FeedError> {
    let trimmed = name.trim();
    let bare = trimmed
        .strip_prefix("/r/")
        .or_else(|| trimmed.strip_prefix("r/"))
        .unwrap_or(trimmed);
    if bare.is_empty() {
        return Err(FeedError::InvalidRequest(
            "community name is empty".to_string(),
        ));
    }
    if !bare.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(FeedError::InvalidRequest(format!(
            "invalid community name {name:?}"
        )));
    }
    Ok(bare)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_accepted() {
        assert_eq!(normalize_community("EarthPorn").unwrap(), "EarthPorn");
    }

    #[test]
    fn prefix_and_whitespace_stripped() {
        assert_eq!(normalize_community(" r/pics ").unwrap(), "pics");
        assert_eq!(normalize_community("/r/spaceporn").unwrap(), "spaceporn");
    }

    #[test]
    fn underscores_and_digits_allowed() {
        assert_eq!(normalize_community("Old_School_2").unwrap(), "Old_School_2");
    }

    #[test]
    fn empty_name_rejected() {
        assert!(matches!(
            normalize_community("r/"),
            Err(FeedError::InvalidRequest(_))
        ));
    }

    #[test]
    fn path_characters_rejected() {
        assert!(normalize_community("pics/../about").is_err());
        assert!(normalize_community("pics?x=1").is_err());
    }
}
