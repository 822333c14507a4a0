use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;

/// Pause policy between rate-limited remote calls.
///
/// The remote API caps mutation volume, so the reconciler spaces its
/// calls out with fixed pauses rather than adaptive backoff. Injecting
/// the policy lets tests run the loops without real sleeps.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self, wait: Duration);
}

/// Production pacer: a plain tokio sleep.
pub struct SleepPacer;

#[async_trait]
impl Pacer for SleepPacer {
    async fn pause(&self, wait: Duration) {
        sleep(wait).await;
    }
}
