mod error;
mod mutations;
mod queries;
pub mod reconcile;
pub mod store;

pub use error::EngineError;
pub use reconcile::{reconcile, synthesize, SYNTHETIC_ID_PREFIX};
pub use store::{InMemoryStore, OpeningStore};

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};

use crate::cleanup::{BookingCleanup, RetainAvailability};
use crate::gateway::AvailabilityGateway;
use crate::merchant::MerchantTokenSource;
use crate::model::OpeningEvent;
use crate::notify::NotifyHub;
use crate::observability;

pub type FillLock = Arc<Mutex<()>>;

/// Command/query surface over openings.
///
/// Owns the store handle; nothing else writes openings. Every collaborator is
/// injected so tests and embedders can swap the platform, the token lookup
/// and the storage.
pub struct Engine {
    pub(super) store: Arc<dyn OpeningStore>,
    pub(super) gateway: Arc<dyn AvailabilityGateway>,
    pub(super) tokens: Arc<dyn MerchantTokenSource>,
    pub(super) cleanup: Arc<dyn BookingCleanup>,
    pub notify: Arc<NotifyHub>,
    /// One lock per opening id with a fill in flight; a fill holds it from the
    /// status check to the write.
    pub(super) fill_locks: DashMap<String, FillLock>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn OpeningStore>,
        gateway: Arc<dyn AvailabilityGateway>,
        tokens: Arc<dyn MerchantTokenSource>,
    ) -> Self {
        Self {
            store,
            gateway,
            tokens,
            cleanup: Arc::new(RetainAvailability),
            notify: Arc::new(NotifyHub::new()),
            fill_locks: DashMap::new(),
        }
    }

    pub fn with_cleanup(mut self, cleanup: Arc<dyn BookingCleanup>) -> Self {
        self.cleanup = cleanup;
        self
    }

    pub fn store(&self) -> &dyn OpeningStore {
        self.store.as_ref()
    }

    /// Subscribe to created/filled events of one company.
    pub fn subscribe(&self, company_id: &str) -> broadcast::Receiver<OpeningEvent> {
        self.notify.subscribe(company_id)
    }

    /// Merchant token for a company, or an authorization failure.
    pub(super) fn merchant_token(&self, company_id: &str) -> Result<String, EngineError> {
        self.tokens
            .token_for(company_id)
            .ok_or_else(|| {
                EngineError::Authorization(format!(
                    "invalid company or missing Square token: {company_id}"
                ))
            })
    }

    /// The lock for `opening_id`, created on first use. Pair with a
    /// [`FillLockRelease`] so the entry goes away once the fill is done.
    pub(super) fn fill_lock(&self, opening_id: &str) -> FillLock {
        self.fill_locks
            .entry(opening_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Persist + notify in one call.
    pub(super) fn commit(&self, event: OpeningEvent) -> Result<(), EngineError> {
        self.store.put(event.opening().clone())?;
        metrics::gauge!(observability::OPENINGS_TRACKED).set(self.store.len() as f64);
        self.notify.send(&event);
        Ok(())
    }
}

/// Removes an opening's lock entry on drop, unless another fill still holds
/// a clone of it. Must be dropped after the guard and before the `FillLock`
/// it was paired with, which reverse declaration order gives for free.
pub(super) struct FillLockRelease<'a> {
    locks: &'a DashMap<String, FillLock>,
    opening_id: &'a str,
}

impl<'a> FillLockRelease<'a> {
    pub(super) fn new(locks: &'a DashMap<String, FillLock>, opening_id: &'a str) -> Self {
        Self { locks, opening_id }
    }
}

impl Drop for FillLockRelease<'_> {
    fn drop(&mut self) {
        // Two references left: the map's and the releasing caller's.
        self.locks
            .remove_if(self.opening_id, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

/// Record outcome and latency of one engine operation.
pub(super) fn record<T>(operation: &'static str, started: Instant, result: &Result<T, EngineError>) {
    let outcome = observability::outcome_label(result);
    metrics::counter!(observability::OPERATIONS_TOTAL, "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(observability::OPERATION_DURATION_SECONDS, "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
