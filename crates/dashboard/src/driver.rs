use std::sync::Arc;

use engine::{DetailView, MapRenderer, OverlayEngine};
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use streaming::DataSource;
use tracing::debug;

use crate::store::MapStore;

/// Performs the store's dataset fetches against a [`DataSource`].
///
/// Fetches queued together run concurrently and are handed back in
/// completion order, so one slow dataset never holds up the others.
#[derive(Clone)]
pub struct FetchDriver {
    source: Arc<dyn DataSource>,
}

impl FetchDriver {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    /// Runs until the store has no queued requests. Returns the number of
    /// fetches completed.
    pub async fn run_until_idle<R, O, D>(&self, store: &mut MapStore<R, O, D>) -> usize
    where
        R: MapRenderer,
        O: OverlayEngine,
        D: DetailView,
    {
        let mut completed = 0;
        loop {
            let requests = store.take_fetch_requests();
            if requests.is_empty() {
                return completed;
            }
            debug!("fetching {} datasets", requests.len());

            let mut in_flight: FuturesUnordered<_> = requests
                .into_iter()
                .map(|req| {
                    let source = Arc::clone(&self.source);
                    async move {
                        let result = source.fetch(&req.dataset_id).await;
                        (req.ticket, result)
                    }
                })
                .collect();

            while let Some((ticket, result)) = in_flight.next().await {
                store.complete_fetch(ticket, result);
                completed += 1;
            }
        }
    }
}
