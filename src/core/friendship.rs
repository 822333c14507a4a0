use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::config::Config;
use crate::models::{Account, Status, TrendingTopic};
use crate::pacing::Pacer;

/// The remote social graph, as seen by the reconciler: paginated reads
/// of who follows whom, plus single fire-and-forget mutations.
#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn trending_topics(&self, woeid: u32) -> Result<Vec<TrendingTopic>>;
    async fn search_tweets(&self, query: &str, count: u32) -> Result<Vec<Status>>;

    /// One page of the accounts the user follows. Cursor -1 starts the
    /// listing; a returned cursor of 0 means the listing is complete.
    async fn friends_page(&self, cursor: i64) -> Result<(i64, Vec<Account>)>;

    /// One page of the accounts following the user. Same cursor protocol.
    async fn followers_page(&self, cursor: i64) -> Result<(i64, Vec<Account>)>;

    async fn liked_tweets(&self) -> Result<Vec<Status>>;

    async fn follow(&self, user_id: u64) -> Result<()>;
    async fn unfollow(&self, user_id: u64) -> Result<()>;
    async fn like(&self, tweet_id: u64) -> Result<()>;
    async fn unlike(&self, tweet_id: u64) -> Result<()>;
}

#[derive(Clone, Copy)]
enum GraphSide {
    Friends,
    Followers,
}

/// Grows and prunes the account's friend list: follows accounts active
/// on the current trends, unfollows accounts that have not reciprocated.
pub struct FriendshipService<G, P> {
    graph: G,
    pacer: P,
    trends_woeid: u32,
    trend_count: usize,
    search_count: u32,
    follow_delay: Duration,
    purge_delay: Duration,
    unlike_on_purge: bool,
}

impl<G: SocialGraph, P: Pacer> FriendshipService<G, P> {
    pub fn new(graph: G, pacer: P, config: &Config) -> Self {
        FriendshipService {
            graph,
            pacer,
            trends_woeid: config.trends_woeid,
            trend_count: config.trend_count,
            search_count: config.search_count,
            follow_delay: config.follow_delay,
            purge_delay: config.purge_delay,
            unlike_on_purge: config.unlike_on_purge,
        }
    }

    /// Follow (and like one tweet of) every distinct author tweeting
    /// about the current top trends. A trend or search fetch failure
    /// aborts the whole pass before any mutation.
    pub async fn create(&self) -> Result<()> {
        let trends = self.graph.trending_topics(self.trends_woeid).await?;
        let top_trends: Vec<TrendingTopic> =
            trends.into_iter().take(self.trend_count).collect();
        if top_trends.is_empty() {
            log::info!("no trends available, nothing to do");
            return Ok(());
        }
        log::info!(
            "top trends are: {:?}",
            top_trends.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        let query = top_trends
            .iter()
            .map(|t| t.query.as_str())
            .collect::<Vec<_>>()
            .join(" OR ");
        let tweets = self.graph.search_tweets(&query, self.search_count).await?;

        // one tweet per distinct author; iteration order is irrelevant
        let mut tweet_by_author: HashMap<u64, u64> = HashMap::new();
        for tweet in tweets {
            tweet_by_author.insert(tweet.user.id, tweet.id);
        }

        log::info!("adding {} friends", tweet_by_author.len());
        for (user_id, tweet_id) in tweet_by_author {
            if let Err(e) = self.graph.follow(user_id).await {
                log::error!("follow call for {} failed: {:#}", user_id, e);
            }
            if let Err(e) = self.graph.like(tweet_id).await {
                log::error!("like call for {} failed: {:#}", tweet_id, e);
            }
            self.pacer.pause(self.follow_delay).await;
        }
        Ok(())
    }

    /// Unfollow every account that has not followed back, then
    /// optionally clear the likes list. Both the friends and followers
    /// listings are materialized in full before any unfollow is issued;
    /// a page failure aborts the pass so the set difference is never
    /// computed from partial data.
    pub async fn purge(&self) -> Result<()> {
        let friend_ids = self.collect_ids(GraphSide::Friends).await?;
        let follower_ids = self.collect_ids(GraphSide::Followers).await?;

        log::info!("{} friends", friend_ids.len());
        log::info!("{} followers", follower_ids.len());

        let to_unfollow: Vec<u64> = friend_ids.difference(&follower_ids).copied().collect();
        log::info!("removing {} friends", to_unfollow.len());
        for user_id in to_unfollow {
            if let Err(e) = self.graph.unfollow(user_id).await {
                log::error!("unfollow call for {} failed: {:#}", user_id, e);
            }
            self.pacer.pause(self.purge_delay).await;
        }

        if self.unlike_on_purge {
            // independent stage: a failure here must not matter to the
            // unfollow phase that already ran
            match self.graph.liked_tweets().await {
                Ok(liked) => {
                    log::info!("unliking {} tweets", liked.len());
                    for tweet in liked {
                        if let Err(e) = self.graph.unlike(tweet.id).await {
                            log::error!("unlike call for {} failed: {:#}", tweet.id, e);
                        }
                        self.pacer.pause(self.purge_delay).await;
                    }
                }
                Err(e) => log::error!("skipping unlike stage: {:#}", e),
            }
        }
        log::info!("purge completed");
        Ok(())
    }

    /// Accumulate one side of the graph across all pages. Stops when the
    /// server returns the 0 end-of-list cursor.
    async fn collect_ids(&self, side: GraphSide) -> Result<HashSet<u64>> {
        let mut ids = HashSet::new();
        let mut cursor = -1;
        while cursor != 0 {
            let (next_cursor, accounts) = match side {
                GraphSide::Friends => self.graph.friends_page(cursor).await?,
                GraphSide::Followers => self.graph.followers_page(cursor).await?,
            };
            ids.extend(accounts.into_iter().map(|account| account.id));
            cursor = next_cursor;
            if cursor != 0 {
                self.pacer.pause(self.purge_delay).await;
            }
        }
        Ok(ids)
    }
}
