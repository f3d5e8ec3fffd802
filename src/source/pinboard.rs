//! Pinboard v1 API client.
//!
//! Every request is a GET carrying `auth_token` and `format=json`. Requests
//! are retried per [`RetryPolicy`]; the token never appears in logs or errors.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::retry::{RetryDecision, RetryPolicy, parse_retry_after};
use super::{BookmarkSource, SourceError, TagAction, TagPolicy};
use crate::item::{BookmarkMeta, Item};
use crate::user_agent;

/// Production API base URL.
pub const DEFAULT_API_ENDPOINT: &str = "https://api.pinboard.in";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 60;

const UPDATE_PATH: &str = "/v1/posts/update";
const ALL_PATH: &str = "/v1/posts/all";
const DELETE_PATH: &str = "/v1/posts/delete";
const ADD_PATH: &str = "/v1/posts/add";

/// Client for the Pinboard bookmarks API.
#[derive(Debug, Clone)]
pub struct PinboardClient {
    client: Client,
    base: Url,
    token: String,
    policy: TagPolicy,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    update_time: String,
}

#[derive(Debug, Deserialize)]
struct ResultResponse {
    result_code: String,
}

#[derive(Debug, Deserialize)]
struct PinboardPost {
    href: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tags: String,
    #[serde(default)]
    time: String,
    #[serde(default)]
    shared: String,
    #[serde(default)]
    toread: String,
}

impl From<PinboardPost> for Item {
    fn from(post: PinboardPost) -> Self {
        let meta = BookmarkMeta {
            tags: post.tags.split_whitespace().map(str::to_string).collect(),
            time: post.time,
            shared: post.shared == "yes",
            to_read: post.toread == "yes",
        };
        Item::from_bookmark(post.href, post.description, meta)
    }
}

impl PinboardClient {
    /// Creates a client for `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidEndpoint`] if `endpoint` is not an
    /// absolute URL or the HTTP client cannot be built.
    pub fn new(
        endpoint: &str,
        token: impl Into<String>,
        policy: TagPolicy,
        retry: RetryPolicy,
    ) -> Result<Self, SourceError> {
        let invalid = || SourceError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
        };
        let base = Url::parse(endpoint).map_err(|_| invalid())?;
        if base.cannot_be_a_base() {
            return Err(invalid());
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|_| invalid())?;
        Ok(Self {
            client,
            base,
            token: token.into(),
            policy,
            retry,
        })
    }

    /// Issues `path` with `params`, retrying per policy, and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let mut attempt = 1;
        loop {
            match self.send_once(path, params).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    match self
                        .retry
                        .should_retry(error.failure_type(), attempt, error.retry_after())
                    {
                        RetryDecision::Retry {
                            delay,
                            attempt: next,
                        } => {
                            warn!(
                                endpoint = path,
                                attempt,
                                delay_ms = delay.as_millis(),
                                error = %error,
                                "request failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(endpoint = path, attempt, reason = %reason, "giving up");
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, SourceError> {
        let mut url = self.base.join(path).map_err(|_| SourceError::InvalidEndpoint {
            endpoint: self.base.to_string(),
        })?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().copied())
            .append_pair("auth_token", &self.token)
            .append_pair("format", "json");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::request(path, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(SourceError::HttpStatus {
                endpoint: path.to_string(),
                status: status.as_u16(),
                retry_after,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SourceError::request(path, e))?;
        serde_json::from_str(&body).map_err(|e| SourceError::decode(path, e.to_string()))
    }

    async fn expect_done(&self, path: &str, params: &[(&str, &str)]) -> Result<(), SourceError> {
        let response: ResultResponse = self.get_json(path, params).await?;
        if response.result_code == "done" {
            Ok(())
        } else {
            Err(SourceError::Rejected {
                endpoint: path.to_string(),
                code: response.result_code,
            })
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

#[async_trait]
impl BookmarkSource for PinboardClient {
    #[instrument(skip(self))]
    async fn last_updated(&self) -> Result<DateTime<Utc>, SourceError> {
        let response: UpdateResponse = self.get_json(UPDATE_PATH, &[]).await?;
        DateTime::parse_from_rfc3339(&response.update_time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| SourceError::decode(UPDATE_PATH, format!("update_time: {e}")))
    }

    #[instrument(skip(self))]
    async fn items(&self, tag: &str) -> Result<Vec<Item>, SourceError> {
        let posts: Vec<PinboardPost> = self.get_json(ALL_PATH, &[("tag", tag)]).await?;
        debug!(count = posts.len(), "fetched tagged bookmarks");
        Ok(posts.into_iter().map(Item::from).collect())
    }

    #[instrument(skip(self, item), fields(url = %item.url))]
    async fn mutate_or_delete_tag(&self, item: &Item) -> Result<(), SourceError> {
        let Some(meta) = &item.meta else {
            debug!("synthetic item, no bookmark to update");
            return Ok(());
        };

        match self.policy.action_for(meta) {
            TagAction::Keep => Ok(()),
            TagAction::Delete => {
                self.expect_done(DELETE_PATH, &[("url", item.url.as_str())])
                    .await?;
                info!("deleted bookmark");
                Ok(())
            }
            TagAction::Retag(tags) => {
                let joined = tags.join(" ");
                let mut params = vec![
                    ("replace", "yes"),
                    ("url", item.url.as_str()),
                    ("description", item.description.as_str()),
                    ("time", meta.time.as_str()),
                    ("shared", yes_no(meta.shared)),
                    ("toread", yes_no(meta.to_read)),
                ];
                if !joined.is_empty() {
                    params.push(("tags", joined.as_str()));
                }
                self.expect_done(ADD_PATH, &params).await?;
                info!(tag = %self.policy.tag, "removed tag from bookmark");
                Ok(())
            }
        }
    }
}
