use serde::{Deserialize, Serialize};

/// An account on the platform. Referenced by id only; never persisted.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: u64,
    #[serde(default)]
    pub screen_name: String,
}

/// A trending topic with its pre-built search query. Fetched fresh each
/// create pass, never cached.
#[derive(Debug, Deserialize, Clone)]
pub struct TrendingTopic {
    pub name: String,
    pub query: String,
}

/// A tweet as returned by search or the favourites list.
#[derive(Debug, Deserialize, Clone)]
pub struct Status {
    pub id: u64,
    pub user: Account,
}

/// One entry of the local tweet queue. The on-disk keys are `text` and
/// `img`; `img` is a file name resolved against the pictures directory.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PendingTweet {
    pub text: String,
    pub img: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Create,
    Purge,
    Tweet,
}
