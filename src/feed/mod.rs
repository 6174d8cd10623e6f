//! Community feed access.
//!
//! - **Client**: [`FeedClient`] trait, [`CommunityMetadata`], [`Post`]
//! - **Reddit**: [`RedditClient`], the production implementation

pub mod client;
pub mod reddit;

pub use client::{CommunityMetadata, FeedClient, FeedError, Post, normalize_community};
pub use reddit::RedditClient;
