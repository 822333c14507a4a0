use anyhow::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest_oauth1::OAuthClientProvider;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::config::Config;
use crate::core::friendship::SocialGraph;
use crate::models::{Account, PendingTweet, Status, TrendingTopic};
use crate::queue::Publisher;

const API_URL: &str = "https://api.twitter.com/1.1";
const UPLOAD_URL: &str = "https://upload.twitter.com/1.1/media/upload.json";

// upload in 4MB segments
const CHUNK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct TrendGroup {
    pub trends: Vec<TrendingTopic>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub statuses: Vec<Status>,
}

#[derive(Debug, Deserialize)]
pub struct UserPage {
    pub users: Vec<Account>,
    pub next_cursor: i64,
}

#[derive(Debug, Deserialize)]
pub struct MediaInitResponse {
    pub media_id: u64,
}

/// OAuth1-signed client for the v1.1 REST API.
pub struct Twitter {
    client: reqwest::Client,
    consumer_key: String,
    consumer_secret: String,
    access_token: String,
    access_token_secret: String,
    screen_name: String,
    page_size: u32,
    pictures_dir: PathBuf,
}

impl Twitter {
    pub fn new(config: &Config) -> Self {
        Twitter {
            client: reqwest::Client::new(),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            access_token: config.access_token.clone(),
            access_token_secret: config.access_token_secret.clone(),
            screen_name: config.screen_name.clone(),
            page_size: config.page_size,
            pictures_dir: config.pictures_dir.clone(),
        }
    }

    fn secrets(&self) -> reqwest_oauth1::Secrets<'_> {
        reqwest_oauth1::Secrets::new(&*self.consumer_key, &*self.consumer_secret)
            .token(&*self.access_token, &*self.access_token_secret)
    }

    /// Check the response status; a non-2xx logs the status and body and
    /// becomes an error for the caller.
    async fn require_success(
        response: reqwest::Response,
        action: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("{} failed with status {}: {}", action, status, body);
            return Err(anyhow::anyhow!("{} failed with status {}", action, status));
        }
        Ok(response)
    }

    /// Same check for fire-and-forget mutations: failures are logged and
    /// swallowed.
    async fn log_failure(response: reqwest::Response, action: &str) {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("{} failed with status {}: {}", action, status, body);
        }
    }

    async fn user_page(&self, endpoint: &str, cursor: i64) -> Result<(i64, Vec<Account>)> {
        let url = format!("{}/{}", API_URL, endpoint);
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .get(&url)
            .query(&[
                ("count", self.page_size.to_string()),
                ("cursor", cursor.to_string()),
                ("screen_name", self.screen_name.clone()),
            ])
            .send()
            .await?;

        let action = format!("fetching {}", endpoint);
        let response = Self::require_success(response, &action).await?;
        let page: UserPage = response.json().await?;
        Ok((page.next_cursor, page.users))
    }

    async fn fire_and_forget(&self, url: &str, params: &[(&str, String)], action: &str) -> Result<()> {
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .post(url)
            .query(params)
            .send()
            .await?;
        Self::log_failure(response, action).await;
        Ok(())
    }

    /// Three-phase chunked upload: INIT, sequential APPENDs, FINALIZE.
    /// Returns the media id to attach to the status update.
    pub async fn upload_media(&self, file_name: &str) -> Result<u64> {
        let path = self.pictures_dir.join(file_name);
        let bytes = fs::read(&path)?;

        let init_response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .post(UPLOAD_URL)
            .form(&[
                ("command", "INIT".to_string()),
                ("media_type", "image/jpeg".to_string()),
                ("total_bytes", bytes.len().to_string()),
            ])
            .send()
            .await?;
        let init_response = Self::require_success(init_response, "media upload INIT").await?;
        let init: MediaInitResponse = init_response.json().await?;
        let media_id = init.media_id;
        log::info!("{} INIT succeeded", file_name);

        for (segment_index, chunk) in bytes.chunks(CHUNK_SIZE).enumerate() {
            let append_response = self
                .client
                .clone()
                .oauth1(self.secrets())
                .post(UPLOAD_URL)
                .form(&[
                    ("command", "APPEND".to_string()),
                    ("media_id", media_id.to_string()),
                    ("segment_index", segment_index.to_string()),
                    ("media_data", BASE64.encode(chunk)),
                ])
                .send()
                .await?;
            let action = format!("media upload APPEND segment {} of {}", segment_index, file_name);
            Self::require_success(append_response, &action).await?;
        }
        log::info!("{} APPEND succeeded", file_name);

        let fin_response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .post(UPLOAD_URL)
            .form(&[
                ("command", "FINALIZE".to_string()),
                ("media_id", media_id.to_string()),
            ])
            .send()
            .await?;
        Self::require_success(fin_response, "media upload FINALIZE").await?;
        log::info!("{} {} FINALIZE succeeded", file_name, media_id);

        Ok(media_id)
    }

    /// Publish a status update with an attached media id. Unlike the
    /// fire-and-forget mutations this propagates failure, so the queue
    /// is not advanced past an unposted tweet.
    pub async fn post_status(&self, text: &str, media_id: u64) -> Result<()> {
        let url = format!("{}/statuses/update.json", API_URL);
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .post(&url)
            .form(&[
                ("status", text.to_string()),
                ("media_ids", media_id.to_string()),
            ])
            .send()
            .await?;
        Self::require_success(response, "posting the status update").await?;
        log::info!("posted: {}", text);
        Ok(())
    }
}

#[async_trait]
impl SocialGraph for Twitter {
    async fn trending_topics(&self, woeid: u32) -> Result<Vec<TrendingTopic>> {
        let url = format!("{}/trends/place.json", API_URL);
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .get(&url)
            .query(&[("id", woeid.to_string())])
            .send()
            .await?;
        let response = Self::require_success(response, "fetching trends").await?;

        // the endpoint wraps the trend list in a one-element array
        let mut groups: Vec<TrendGroup> = response.json().await?;
        let trends = match groups.first_mut() {
            Some(group) => std::mem::take(&mut group.trends),
            None => Vec::new(),
        };
        Ok(trends)
    }

    async fn search_tweets(&self, query: &str, count: u32) -> Result<Vec<Status>> {
        let url = format!("{}/search/tweets.json", API_URL);
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .get(&url)
            .query(&[("q", query.to_string()), ("count", count.to_string())])
            .send()
            .await?;

        let action = format!("searching tweets with query: {}", query);
        let response = Self::require_success(response, &action).await?;
        let search: SearchResponse = response.json().await?;
        log::info!(
            "tweet search with {} returned {} results",
            query,
            search.statuses.len()
        );
        Ok(search.statuses)
    }

    async fn friends_page(&self, cursor: i64) -> Result<(i64, Vec<Account>)> {
        self.user_page("friends/list.json", cursor).await
    }

    async fn followers_page(&self, cursor: i64) -> Result<(i64, Vec<Account>)> {
        self.user_page("followers/list.json", cursor).await
    }

    async fn liked_tweets(&self) -> Result<Vec<Status>> {
        let url = format!("{}/favorites/list.json", API_URL);
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .get(&url)
            .query(&[
                ("count", self.page_size.to_string()),
                ("screen_name", self.screen_name.clone()),
            ])
            .send()
            .await?;
        let response = Self::require_success(response, "fetching liked tweets").await?;
        let tweets: Vec<Status> = response.json().await?;
        Ok(tweets)
    }

    async fn follow(&self, user_id: u64) -> Result<()> {
        let url = format!("{}/friendships/create.json", API_URL);
        let action = format!("following user {}", user_id);
        self.fire_and_forget(&url, &[("user_id", user_id.to_string())], &action)
            .await
    }

    async fn unfollow(&self, user_id: u64) -> Result<()> {
        let url = format!("{}/friendships/destroy.json", API_URL);
        let action = format!("unfollowing user {}", user_id);
        self.fire_and_forget(&url, &[("user_id", user_id.to_string())], &action)
            .await
    }

    async fn like(&self, tweet_id: u64) -> Result<()> {
        let url = format!("{}/favorites/create.json", API_URL);
        let action = format!("liking tweet {}", tweet_id);
        self.fire_and_forget(&url, &[("id", tweet_id.to_string())], &action)
            .await
    }

    async fn unlike(&self, tweet_id: u64) -> Result<()> {
        let url = format!("{}/favorites/destroy.json", API_URL);
        let action = format!("unliking tweet {}", tweet_id);
        self.fire_and_forget(&url, &[("id", tweet_id.to_string())], &action)
            .await
    }
}

#[async_trait]
impl Publisher for Twitter {
    async fn publish(&self, tweet: &PendingTweet) -> Result<()> {
        let media_id = self.upload_media(&tweet.img).await?;
        self.post_status(&tweet.text, media_id).await
    }
}
