//! Tile candidate collection.
//!
//! Scans a ranked listing of the community and keeps posts whose linked image
//! can serve as a mosaic tile. A post qualifies when all of these hold:
//!
//! 1. it is a link post without body text
//! 2. its URL path ends in one of [`TILE_EXTENSIONS`](crate::naming::TILE_EXTENSIONS)
//! 3. its score is at least `min_score`
//! 4. it is not flagged as mature content
//!
//! Survivors are numbered from 0 in scan order. Those indices are fixed for the
//! run; download failures later on do not renumber candidates.

use crate::feed::{FeedClient, FeedError, Post};
use crate::naming::is_tile_image;
use crate::types::{ListingSpec, TileCandidate};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ListingError {
    #[error("Invalid listing spec: {0}")]
    InvalidSpec(String),
    #[error("Listing request failed: {0}")]
    Feed(#[from] FeedError),
}

/// Why a listing entry was not kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    SelfText,
    NotAnImage,
    LowScore,
    Mature,
}

/// Result of scanning one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub candidates: Vec<TileCandidate>,
    /// Listing entries examined, kept or not.
    pub scanned: usize,
}

/// Check a post against the tile filter.
pub fn check(post: &Post, min_score: i64) -> Result<(), Rejection> {
    if post.has_self_text {
        return Err(Rejection::SelfText);
    }
    if !is_tile_image(&post.url) {
        return Err(Rejection::NotAnImage);
    }
    if post.score < min_score {
        return Err(Rejection::LowScore);
    }
    if post.is_mature {
        return Err(Rejection::Mature);
    }
    Ok(())
}

pub fn qualifies(post: &Post, min_score: i64) -> bool {
    check(post, min_score).is_ok()
}

/// Fetch the listing described by `spec` and filter it down to candidates.
///
/// A malformed spec or a failed listing request yields an error and no
/// candidates at all.
pub fn collect_candidates(
    feed: &impl FeedClient,
    community: &str,
    spec: &ListingSpec,
) -> Result<Collection, ListingError> {
    if spec.limit == 0 {
        return Err(ListingError::InvalidSpec(
            "limit must be greater than 0".to_string(),
        ));
    }

    let posts = feed.listing(community, spec)?;
    let mut scanned = 0;
    let mut candidates = Vec::new();
    for post in posts.into_iter().take(spec.limit) {
        scanned += 1;
        match check(&post, spec.min_score) {
            Ok(()) => candidates.push(TileCandidate {
                index: candidates.len(),
                url: post.url,
            }),
            Err(reason) => debug!(url = %post.url, score = post.score, ?reason, "post rejected"),
        }
    }

    info!(
        community,
        category = %spec.category,
        scanned,
        kept = candidates.len(),
        "collected tile candidates"
    );
    Ok(Collection {
        candidates,
        scanned,
    })
}
