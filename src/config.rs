use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Everything the bot needs from the environment, loaded once at startup
/// and passed explicitly into each component.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth1 consumer key for the Twitter app
    pub consumer_key: String,

    /// OAuth1 consumer secret
    pub consumer_secret: String,

    /// OAuth1 access token of the account being driven
    pub access_token: String,

    /// OAuth1 access token secret
    pub access_token_secret: String,

    /// Screen name of the account being driven (used for the
    /// friends/followers listings)
    pub screen_name: String,

    /// Where-on-earth id for the trends lookup (defaults to Canada)
    pub trends_woeid: u32,

    /// How many of the top trends feed the follow search
    pub trend_count: usize,

    /// Max tweets per trend search
    pub search_count: u32,

    /// Accounts per friends/followers page
    pub page_size: u32,

    /// Pause between follow/like calls
    pub follow_delay: Duration,

    /// Pause between purge page fetches and unfollow/unlike calls
    pub purge_delay: Duration,

    /// Whether the purge job also un-likes previously liked tweets
    pub unlike_on_purge: bool,

    /// Directory holding the tweet queue document
    pub storage_dir: PathBuf,

    /// Directory holding the images referenced by queued tweets
    pub pictures_dir: PathBuf,

    /// Scheduler poll interval
    pub poll_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    /// Returns an error if any of the OAuth credentials or the screen
    /// name is missing.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        Ok(Config {
            consumer_key: env::var("TWITTER_CONSUMER_KEY")
                .context("TWITTER_CONSUMER_KEY must be set")?,

            consumer_secret: env::var("TWITTER_CONSUMER_SECRET")
                .context("TWITTER_CONSUMER_SECRET must be set")?,

            access_token: env::var("TWITTER_ACCESS_TOKEN")
                .context("TWITTER_ACCESS_TOKEN must be set")?,

            access_token_secret: env::var("TWITTER_ACCESS_TOKEN_SECRET")
                .context("TWITTER_ACCESS_TOKEN_SECRET must be set")?,

            screen_name: env::var("SCREEN_NAME").context("SCREEN_NAME must be set")?,

            trends_woeid: env::var("TRENDS_WOEID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(23424775),

            trend_count: env::var("TREND_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),

            search_count: env::var("SEARCH_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),

            page_size: env::var("PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(200),

            follow_delay: Duration::from_secs(
                env::var("FOLLOW_DELAY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            ),

            purge_delay: Duration::from_secs(
                env::var("PURGE_DELAY_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            ),

            unlike_on_purge: env::var("UNLIKE_ON_PURGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),

            storage_dir: env::var("STORAGE_DIR")
                .unwrap_or_else(|_| "./storage".to_string())
                .into(),

            pictures_dir: env::var("PICTURES_DIR")
                .unwrap_or_else(|_| "resources/pictures".to_string())
                .into(),

            poll_interval: Duration::from_secs(
                env::var("POLL_INTERVAL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(50),
            ),
        })
    }
}
