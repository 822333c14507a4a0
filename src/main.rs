mod config;
mod core;
mod models;
mod pacing;
mod providers;
mod queue;

use crate::config::Config;
use crate::core::friendship::FriendshipService;
use crate::core::scheduler::{default_schedule, Scheduler};
use crate::pacing::SleepPacer;
use crate::providers::twitter::Twitter;
use crate::queue::{TweetService, TweetStore};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    pretty_env_logger::init();

    let config = Config::from_env()?;

    let friendship = FriendshipService::new(Twitter::new(&config), SleepPacer, &config);
    let tweets = TweetService::new(TweetStore::new(&config.storage_dir), Twitter::new(&config));

    let mut scheduler = Scheduler::new(friendship, tweets, config.poll_interval);
    for entry in default_schedule() {
        scheduler.register(entry);
    }

    log::info!("starting trendflock for @{}", config.screen_name);
    scheduler.run().await
}
