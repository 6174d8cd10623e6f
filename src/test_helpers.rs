//! Shared test doubles for the reddit-mosaic test suite.
//!
//! Every external seam of the pipeline has a mock here that serves canned
//! responses and records how it was called:
//!
//! - [`MockFeed`] for [`FeedClient`]
//! - [`MockFetcher`] for [`HttpFetch`]
//! - [`MockCompositor`] for [`Compositor`]
//!
//! Recordings sit behind `Mutex` because the traits take `&self`.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let feed = MockFeed::new()
//!     .with_metadata(CommunityMetadata { header_image: "https://x/h.png".into(), ..Default::default() })
//!     .with_posts(vec![link_post("https://i.redd.it/a.jpg", 5000)]);
//! let fetcher = MockFetcher::new().with_body("https://x/h.png", &png_bytes(16, 9));
//! ```

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;

use crate::compose::{ComposeError, CompositionRequest, Compositor};
use crate::download::{DownloadError, HttpFetch};
use crate::feed::{CommunityMetadata, FeedClient, FeedError, Post};
use crate::types::ListingSpec;

// =========================================================================
// Fixtures
// =========================================================================

/// A qualifying-shaped link post: no body text, not mature.
pub fn link_post(url: &str, score: i64) -> Post {
    Post {
        has_self_text: false,
        url: url.to_string(),
        score,
        is_mature: false,
    }
}

/// Encode a black RGB image of the given size as PNG.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    image::RgbImage::new(width, height)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

// =========================================================================
// Feed
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCall {
    Metadata(String),
    Listing(String),
}

/// Feed serving fixed metadata and a fixed listing.
#[derive(Default)]
pub struct MockFeed {
    metadata: CommunityMetadata,
    metadata_error: Option<u16>,
    posts: Vec<Post>,
    listing_error: Mutex<Option<String>>,
    calls: Mutex<Vec<FeedCall>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, metadata: CommunityMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Metadata requests fail with this HTTP status.
    pub fn with_metadata_error(mut self, status: u16) -> Self {
        self.metadata_error = Some(status);
        self
    }

    pub fn with_posts(mut self, posts: Vec<Post>) -> Self {
        self.posts = posts;
        self
    }

    /// Listing requests fail with [`FeedError::InvalidRequest`].
    pub fn with_listing_error(self, message: &str) -> Self {
        *self.listing_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn clear_listing_error(&self) {
        *self.listing_error.lock().unwrap() = None;
    }

    pub fn calls(&self) -> Vec<FeedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn metadata_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, FeedCall::Metadata(_)))
            .count()
    }

    pub fn listing_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, FeedCall::Listing(_)))
            .count()
    }
}

impl FeedClient for MockFeed {
    fn community_metadata(&self, community: &str) -> Result<CommunityMetadata, FeedError> {
        self.calls
            .lock()
            .unwrap()
            .push(FeedCall::Metadata(community.to_string()));
        match self.metadata_error {
            Some(status) => Err(FeedError::Status {
                status,
                url: format!("mock://r/{community}/about.json"),
            }),
            None => Ok(self.metadata.clone()),
        }
    }

    fn listing(&self, community: &str, _spec: &ListingSpec) -> Result<Vec<Post>, FeedError> {
        self.calls
            .lock()
            .unwrap()
            .push(FeedCall::Listing(community.to_string()));
        match self.listing_error.lock().unwrap().clone() {
            Some(message) => Err(FeedError::InvalidRequest(message)),
            None => Ok(self.posts.clone()),
        }
    }
}

// =========================================================================
// HTTP
// =========================================================================

enum Reply {
    Body(Vec<u8>),
    Status(u16),
}

/// Fetcher with per-URL canned replies. Unknown URLs answer 404.
#[derive(Default)]
pub struct MockFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(self, url: &str, body: &[u8]) -> Self {
        self.serve(url, body);
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Status(status));
        self
    }

    /// Answer `url` with `body` from now on.
    pub fn serve(&self, url: &str, body: &[u8]) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Body(body.to_vec()));
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpFetch for MockFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.replies.lock().unwrap().get(url) {
            Some(Reply::Body(body)) => Ok(body.clone()),
            Some(Reply::Status(status)) => Err(DownloadError::Status(*status)),
            None => Err(DownloadError::Status(404)),
        }
    }
}

// =========================================================================
// Compositor
// =========================================================================

/// Compositor that records requests and writes nothing.
#[derive(Default)]
pub struct MockCompositor {
    calls: Mutex<Vec<CompositionRequest>>,
    fail_next: Mutex<Option<String>>,
}

impl MockCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `compose` call fail with this stderr text.
    pub fn fail_next(&self, stderr: &str) {
        *self.fail_next.lock().unwrap() = Some(stderr.to_string());
    }

    pub fn calls(&self) -> Vec<CompositionRequest> {
        self.calls.lock().unwrap().clone()
    }
}

impl Compositor for MockCompositor {
    fn compose(&self, request: &CompositionRequest) -> Result<(), ComposeError> {
        self.calls.lock().unwrap().push(request.clone());
        match self.fail_next.lock().unwrap().take() {
            Some(stderr) => Err(ComposeError::Failed {
                status: "exit status: 1".to_string(),
                stderr,
            }),
            None => Ok(()),
        }
    }
}
