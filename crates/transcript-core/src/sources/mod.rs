//! Built-in transcript strategies and the fetcher assembled from config.

mod full_fetch;
mod index;
mod scrape;

pub use full_fetch::{FullFetchStrategy, MetadataExtractor, YtDlpExtractor};
pub use index::IndexStrategy;
pub use scrape::ScrapeStrategy;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::captions::Transcript;
use crate::config::{FetcherConfig, StrategyKind};
use crate::fetcher::{Failure, Fetcher, Strategy};
use crate::loader::{DocumentLoader, HttpLoader};

/// Run `fut` under the strategy's own deadline.
pub(crate) async fn with_deadline<T, F>(strategy: &str, limit: Duration, fut: F) -> Result<T, Failure>
where
    F: Future<Output = Result<T, Failure>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Failure::transient(format!(
            "{} did not finish within {}ms",
            strategy,
            limit.as_millis()
        ))),
    }
}

/// Build the fetcher for `config.strategies`, sharing one HTTP loader.
pub fn build_fetcher(config: &FetcherConfig) -> Fetcher<Transcript> {
    let loader: Arc<dyn DocumentLoader> = Arc::new(HttpLoader::from_config(config));
    build_fetcher_with_loader(config, loader)
}

pub fn build_fetcher_with_loader(
    config: &FetcherConfig,
    loader: Arc<dyn DocumentLoader>,
) -> Fetcher<Transcript> {
    config
        .strategies
        .iter()
        .fold(Fetcher::new(), |fetcher, kind| {
            let strategy: Arc<dyn Strategy<Transcript>> = match kind {
                StrategyKind::Index => Arc::new(IndexStrategy::from_config(config, loader.clone())),
                StrategyKind::Scrape => {
                    Arc::new(ScrapeStrategy::from_config(config, loader.clone()))
                }
                StrategyKind::FullFetch => Arc::new(FullFetchStrategy::from_config(
                    config,
                    Arc::new(YtDlpExtractor::from_config(config)),
                    loader.clone(),
                )),
            };
            fetcher.with_strategy(strategy)
        })
}
