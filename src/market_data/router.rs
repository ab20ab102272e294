// Router keeps the latest quote flowing from a feed to whoever composes orders
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::types::Quote;
use crate::market_data::adapters::QuoteFeed;

/// Background poller publishing the most recent good quote for one asset.
pub struct QuotePoller {
    rx: watch::Receiver<Option<Quote>>,
    task: JoinHandle<()>,
}

impl QuotePoller {
    /// Poll `feed` every `interval`. The first poll fires immediately.
    pub fn spawn<F>(feed: Arc<F>, asset_id: &str, interval: Duration) -> Self
    where
        F: QuoteFeed + ?Sized + 'static,
    {
        let (tx, rx) = watch::channel(None);
        let asset_id = asset_id.to_string();
        info!(%asset_id, interval_ms = interval.as_millis() as u64, "Starting quote poller");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match feed.quote(&asset_id).await {
                    Ok(quote) => {
                        debug!(%asset_id, price = %quote.price, "Quote updated");
                        if tx.send(Some(quote)).is_err() {
                            debug!(%asset_id, "All quote receivers dropped, stopping poller");
                            break;
                        }
                    }
                    // Keep serving the last good quote
                    Err(e) => warn!(%asset_id, error = %e, "Quote poll failed"),
                }
            }
        });

        Self { rx, task }
    }

    /// Latest quote, if any poll has succeeded yet.
    pub fn latest(&self) -> Option<Quote> {
        *self.rx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Quote>> {
        self.rx.clone()
    }

    /// Wait until the first quote arrives.
    pub async fn first_quote(&mut self) -> Option<Quote> {
        let guard = self.rx.wait_for(|q| q.is_some()).await.ok()?;
        *guard
    }
}

impl Drop for QuotePoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Fetch several assets concurrently, keeping only the ones that resolved.
pub async fn fetch_many<F>(feed: &F, asset_ids: &[&str]) -> Vec<(String, Quote)>
where
    F: QuoteFeed + ?Sized,
{
    let results = join_all(asset_ids.iter().map(|id| feed.quote(id))).await;
    asset_ids
        .iter()
        .zip(results)
        .filter_map(|(id, result)| match result {
            Ok(quote) => Some((id.to_string(), quote)),
            Err(e) => {
                warn!(asset_id = %id, error = %e, "Dropping asset without quote");
                None
            }
        })
        .collect()
}
