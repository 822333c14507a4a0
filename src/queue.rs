use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::PendingTweet;

/// Durable tweet queue: tweets waiting to go out plus the archive of
/// everything already posted. Both sequences live in one document so a
/// tweet moves between them atomically.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct QueueState {
    pub pending: Vec<PendingTweet>,
    pub posted: Vec<PendingTweet>,
}

pub struct TweetStore {
    path: PathBuf,
}

impl TweetStore {
    const FILE_NAME: &'static str = "tweets.json";

    pub fn new(storage_dir: &Path) -> Self {
        TweetStore {
            path: storage_dir.join(Self::FILE_NAME),
        }
    }

    /// Load the queue from disk. A missing file is an empty queue.
    pub fn load(&self) -> Result<QueueState> {
        if self.path.exists() {
            let data = fs::read_to_string(&self.path)
                .with_context(|| format!("reading {}", self.path.display()))?;
            let state: QueueState = serde_json::from_str(&data)
                .with_context(|| format!("parsing {}", self.path.display()))?;
            Ok(state)
        } else {
            Ok(QueueState::default())
        }
    }

    /// Rewrite the queue document. Writes to a temp file in the same
    /// directory and renames it over the old document, so a crash
    /// mid-write can never leave pending and posted out of step.
    pub fn save(&self, state: &QueueState) -> Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;
        let data = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

/// Publishes one tweet: media upload plus status update, succeeding
/// only if both did.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, tweet: &PendingTweet) -> Result<()>;
}

pub struct TweetService<P> {
    store: TweetStore,
    publisher: P,
}

impl<P: Publisher> TweetService<P> {
    pub fn new(store: TweetStore, publisher: P) -> Self {
        TweetService { store, publisher }
    }

    /// Post the head of the pending queue, if any. The entry moves to
    /// the posted archive only after the publish fully succeeded; on
    /// any failure the queue is left untouched, so the tweet goes out
    /// on a later attempt (at-least-once).
    pub async fn post_next(&self) -> Result<()> {
        let mut state = self.store.load()?;

        let tweet = match state.pending.first() {
            Some(tweet) => tweet.clone(),
            None => {
                log::info!("tweet queue is empty");
                return Ok(());
            }
        };

        self.publisher.publish(&tweet).await?;

        state.pending.remove(0);
        state.posted.push(tweet);
        self.store.save(&state)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakePublisher {
        fail: bool,
        published: Mutex<Vec<PendingTweet>>,
    }

    impl FakePublisher {
        fn new(fail: bool) -> Self {
            FakePublisher {
                fail,
                published: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(&self, tweet: &PendingTweet) -> Result<()> {
            if self.fail {
                return Err(anyhow::anyhow!("media upload APPEND failed with status 500"));
            }
            self.published.lock().unwrap().push(tweet.clone());
            Ok(())
        }
    }

    static DIR_SEQ: AtomicUsize = AtomicUsize::new(0);

    fn scratch_store() -> TweetStore {
        let dir = std::env::temp_dir().join(format!(
            "trendflock-queue-{}-{}",
            std::process::id(),
            DIR_SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        fs::create_dir_all(&dir).unwrap();
        TweetStore::new(&dir)
    }

    fn tweet(text: &str) -> PendingTweet {
        PendingTweet {
            text: text.to_string(),
            img: "x.jpg".to_string(),
        }
    }

    #[test]
    fn missing_file_loads_as_empty_queue() {
        let store = scratch_store();
        let state = store.load().unwrap();
        assert!(state.pending.is_empty());
        assert!(state.posted.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = scratch_store();
        let state = QueueState {
            pending: vec![tweet("hi")],
            posted: vec![tweet("old")],
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[tokio::test]
    async fn post_next_moves_head_to_posted_on_success() {
        let store = scratch_store();
        store
            .save(&QueueState {
                pending: vec![tweet("first"), tweet("second")],
                posted: vec![],
            })
            .unwrap();

        let service = TweetService::new(store, FakePublisher::new(false));
        service.post_next().await.unwrap();

        let state = service.store.load().unwrap();
        assert_eq!(state.pending, vec![tweet("second")]);
        assert_eq!(state.posted, vec![tweet("first")]);
        assert_eq!(
            *service.publisher.published.lock().unwrap(),
            vec![tweet("first")]
        );
    }

    #[tokio::test]
    async fn failed_publish_leaves_the_queue_untouched() {
        let store = scratch_store();
        let initial = QueueState {
            pending: vec![tweet("hi")],
            posted: vec![],
        };
        store.save(&initial).unwrap();

        let service = TweetService::new(store, FakePublisher::new(true));
        assert!(service.post_next().await.is_err());

        assert_eq!(service.store.load().unwrap(), initial);
    }

    #[tokio::test]
    async fn post_next_on_empty_queue_is_a_noop() {
        let store = scratch_store();
        let path = store.path.clone();

        let service = TweetService::new(store, FakePublisher::new(false));
        service.post_next().await.unwrap();

        // no publish call and no file written
        assert!(service.publisher.published.lock().unwrap().is_empty());
        assert!(!path.exists());
    }
}
