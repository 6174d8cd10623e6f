//! Reddit implementation of [`FeedClient`] over the public JSON endpoints.
//!
//! | Operation | Endpoint |
//! |---|---|
//! | Metadata | `GET /r/<sub>/about.json` |
//! | Listing | `GET /r/<sub>/<category>.json?limit=<n>&t=<window>&after=<cursor>` |
//!
//! Listings are paged 100 entries at a time, following the `after` cursor
//! until `limit` entries were seen or the listing ends. Every request carries
//! the configured user agent and the configured timeout; nothing is retried.
//!
//! Requests pass `raw_json=1`, but `&amp;` is still unescaped in returned
//! URLs because some mirrors ignore the flag.

use super::client::{CommunityMetadata, FeedClient, FeedError, Post, normalize_community};
use crate::config::Credentials;
use crate::types::ListingSpec;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://www.reddit.com";

/// Maximum entries Reddit returns per listing page.
const PAGE_SIZE: usize = 100;

/// Redirect hops followed before the request counts as a redirect loop.
const MAX_REDIRECTS: usize = 10;

pub struct RedditClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl RedditClient {
    /// Build a client from explicit credentials.
    ///
    /// Only the user agent is sent; the id/secret pair is for authenticated
    /// deployments and is ignored by the public endpoints.
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(credentials.user_agent.clone())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at a different host (mirrors, local test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        debug!(url, ?query, "feed request");
        let response = self.http.get(url).query(query).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let body = response.text()?;
        Ok(serde_json::from_str(&body)?)
    }
}

impl FeedClient for RedditClient {
    fn community_metadata(&self, community: &str) -> Result<CommunityMetadata, FeedError> {
        let community = normalize_community(community)?;
        let url = format!("{}/r/{}/about.json", self.base_url, community);
        let about: AboutResponse = self.get_json(&url, &[("raw_json", "1".to_string())])?;
        Ok(about.data.into())
    }

    fn listing(&self, community: &str, spec: &ListingSpec) -> Result<Vec<Post>, FeedError> {
        if spec.limit == 0 {
            return Err(FeedError::InvalidRequest(
                "listing limit must be greater than 0".to_string(),
            ));
        }
        let community = normalize_community(community)?;
        let url = format!(
            "{}/r/{}/{}.json",
            self.base_url,
            community,
            spec.category.as_str()
        );

        let mut posts = Vec::new();
        let mut after: Option<String> = None;
        while posts.len() < spec.limit {
            let page_size = (spec.limit - posts.len()).min(PAGE_SIZE);
            let mut query = vec![
                ("limit", page_size.to_string()),
                ("raw_json", "1".to_string()),
            ];
            if spec.category.takes_time_window() {
                query.push(("t", spec.time_window.as_str().to_string()));
            }
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let page: ListingResponse = self.get_json(&url, &query)?;
            let fetched = page.data.children.len();
            posts.extend(page.data.children.into_iter().map(|c| Post::from(c.data)));
            after = page.data.after;
            if fetched == 0 || after.is_none() {
                break;
            }
        }
        posts.truncate(spec.limit);
        Ok(posts)
    }
}

// =============================================================================
// Wire format
// =============================================================================

/// Deserialize a string that may be missing or `null` as empty.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn unescape_amp(url: &str) -> String {
    url.replace("&amp;", "&")
}

#[derive(Debug, Deserialize)]
struct AboutResponse {
    data: AboutData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AboutData {
    #[serde(deserialize_with = "null_as_empty")]
    header_img: String,
    #[serde(deserialize_with = "null_as_empty")]
    banner_background_image: String,
    #[serde(deserialize_with = "null_as_empty")]
    icon_img: String,
}

impl From<AboutData> for CommunityMetadata {
    fn from(data: AboutData) -> Self {
        Self {
            header_image: unescape_amp(&data.header_img),
            banner_background_image: unescape_amp(&data.banner_background_image),
            icon_image: unescape_amp(&data.icon_img),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
    #[serde(default)]
    after: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostData {
    is_self: bool,
    #[serde(deserialize_with = "null_as_empty")]
    selftext: String,
    #[serde(deserialize_with = "null_as_empty")]
    url: String,
    score: i64,
    over_18: bool,
}

impl From<PostData> for Post {
    fn from(data: PostData) -> Self {
        Self {
            has_self_text: data.is_self || !data.selftext.is_empty(),
            url: unescape_amp(&data.url),
            score: data.score,
            is_mature: data.over_18,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn about_with_all_fields() {
        let json = r#"{"kind": "t5", "data": {
            "header_img": "https://b.thumbs.redditmedia.com/h.png",
            "banner_background_image": "https://styles.redditmedia.com/b.jpg?width=4000&amp;s=x",
            "icon_img": "https://b.thumbs.redditmedia.com/i.png",
            "subscribers": 12
        }}"#;
        let about: AboutResponse = serde_json::from_str(json).unwrap();
        let meta = CommunityMetadata::from(about.data);
        assert_eq!(meta.header_image, "https://b.thumbs.redditmedia.com/h.png");
        assert_eq!(
            meta.banner_background_image,
            "https://styles.redditmedia.com/b.jpg?width=4000&s=x"
        );
        assert_eq!(meta.icon_image, "https://b.thumbs.redditmedia.com/i.png");
    }

    #[test]
    fn about_null_and_missing_fields_are_empty() {
        let json = r#"{"data": {"header_img": null, "icon_img": ""}}"#;
        let about: AboutResponse = serde_json::from_str(json).unwrap();
        let meta = CommunityMetadata::from(about.data);
        assert_eq!(meta, CommunityMetadata::default());
    }

    #[test]
    fn about_without_data_is_error() {
        let result: Result<AboutResponse, _> = serde_json::from_str(r#"{"error": 404}"#);
        assert!(result.is_err());
    }

    #[test]
    fn listing_page_parses_posts() {
        let json = r#"{"kind": "Listing", "data": {
            "after": "t3_abc",
            "children": [
                {"kind": "t3", "data": {"is_self": false, "selftext": "", "url": "https://i.redd.it/a.jpg", "score": 5000, "over_18": false}},
                {"kind": "t3", "data": {"is_self": true, "selftext": "hello", "url": "https://www.reddit.com/r/x/comments/1", "score": 9000, "over_18": false}},
                {"kind": "t3", "data": {"is_self": false, "selftext": "", "url": "https://i.redd.it/b.png", "score": 12, "over_18": true}}
            ]
        }}"#;
        let page: ListingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.data.after.as_deref(), Some("t3_abc"));

        let posts: Vec<Post> = page.data.children.into_iter().map(|c| c.data.into()).collect();
        assert_eq!(posts.len(), 3);
        assert!(!posts[0].has_self_text);
        assert_eq!(posts[0].score, 5000);
        assert!(posts[1].has_self_text);
        assert!(posts[2].is_mature);
    }

    #[test]
    fn link_post_with_body_counts_as_self_text() {
        let data = PostData {
            is_self: false,
            selftext: "source in comments".to_string(),
            url: "https://i.redd.it/a.jpg".to_string(),
            score: 1,
            over_18: false,
        };
        assert!(Post::from(data).has_self_text);
    }

    #[test]
    fn last_listing_page_has_no_cursor() {
        let json = r#"{"data": {"after": null, "children": []}}"#;
        let page: ListingResponse = serde_json::from_str(json).unwrap();
        assert!(page.data.after.is_none());
        assert!(page.data.children.is_empty());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = RedditClient::new(&Credentials::default(), Duration::from_secs(1))
            .unwrap()
            .with_base_url("http://localhost:9999/");
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[test]
    fn zero_limit_is_invalid_request() {
        use crate::types::{Category, TimeWindow};
        let client = RedditClient::new(&Credentials::default(), Duration::from_secs(1)).unwrap();
        let spec = ListingSpec {
            category: Category::Top,
            time_window: TimeWindow::Week,
            limit: 0,
            min_score: 0,
        };
        assert!(matches!(
            client.listing("pics", &spec),
            Err(FeedError::InvalidRequest(_))
        ));
    }
}
