//! Process-wide title metadata and completion-rate caches.
//!
//! Classification and completion rates are account independent, so one
//! [`TitleCatalog`] is shared by every account. Concurrent lookups of one
//! title are coalesced into a single request; failed lookups are not cached.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use moka::future::Cache;
use tokio_util::sync::CancellationToken;

use crate::client::{CompletionRates, ProductInfo, RateLimitedClient, TitleId};
use crate::error::{BoostError, Result};
use crate::storage::GlobalTitleFacts;

/// Cached value for `id`, fetching it at most once across concurrent callers.
///
/// Waiting is cancellable. When the caller that ran the fetch was aborted
/// (its own token or session), waiters retry and one of them fetches instead.
async fn get_or_fetch<V, F, Fut>(
    cache: &Cache<TitleId, Arc<V>>,
    id: TitleId,
    cancel: &CancellationToken,
    fetch: F,
) -> Result<Arc<V>>
where
    V: Send + Sync + 'static,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<V>>,
{
    loop {
        let ran = AtomicBool::new(false);
        let init = async {
            ran.store(true, Ordering::Relaxed);
            fetch().await.map(Arc::new)
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(BoostError::Canceled),
            result = cache.try_get_with(id, init) => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_abort() && !ran.load(Ordering::Relaxed) => {
                log::debug!("Shared lookup of title {} was aborted, retrying", id);
            }
            Err(e) => return Err(BoostError::from(e)),
        }
    }
}

/// Shared cache of per-title metadata.
pub struct TitleCatalog {
    facts: Arc<GlobalTitleFacts>,
    products: Cache<TitleId, Arc<ProductInfo>>,
    rates: Cache<TitleId, Arc<CompletionRates>>,
}

impl std::fmt::Debug for TitleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TitleCatalog")
            .field("products", &self.products.entry_count())
            .field("rates", &self.rates.entry_count())
            .finish_non_exhaustive()
    }
}

impl TitleCatalog {
    /// Create an empty catalog recording discovered facts into `facts`.
    ///
    /// Entries never expire: both facts are stable for the life of the process.
    pub fn new(facts: Arc<GlobalTitleFacts>) -> Self {
        Self {
            facts,
            products: Cache::builder().build(),
            rates: Cache::builder().build(),
        }
    }

    /// The account-independent facts this catalog records into.
    pub fn facts(&self) -> &Arc<GlobalTitleFacts> {
        &self.facts
    }

    /// Cached classification, without a lookup.
    pub async fn cached_product_info(&self, id: TitleId) -> Option<Arc<ProductInfo>> {
        self.products.get(&id).await
    }

    /// Classification of a title, fetched once per process.
    ///
    /// A successful fetch records missing achievements and anti-cheat in the
    /// global facts, whatever the caller's restriction settings are.
    pub async fn product_info(
        &self,
        client: &RateLimitedClient,
        id: TitleId,
        cancel: &CancellationToken,
    ) -> Result<Arc<ProductInfo>> {
        get_or_fetch(&self.products, id, cancel, || async {
            let classification = client.title_classification(id, cancel).await?;
            let info = ProductInfo::from_classification(id, classification);
            if !info.has_achievements && self.facts.non_achievement.insert(id) {
                log::info!("Title {} ({}) has no achievements", id, info.name);
            }
            if info.has_anti_cheat && self.facts.anti_cheat.insert(id) {
                log::info!("Title {} ({}) has anti-cheat enabled", id, info.name);
            }
            Ok(info)
        })
        .await
    }

    /// Global completion rates of a title, fetched once per process.
    pub async fn completion_rates(
        &self,
        client: &RateLimitedClient,
        id: TitleId,
        cancel: &CancellationToken,
    ) -> Result<Arc<CompletionRates>> {
        get_or_fetch(&self.rates, id, cancel, || client.completion_rates(id, cancel)).await
    }
}
