use dashmap::DashMap;

use crate::model::*;

use super::EngineError;

/// Storage seam for openings. The in-memory map stands in for a database;
/// anything implementing this can replace it without touching reconciliation.
pub trait OpeningStore: Send + Sync {
    /// Insert or overwrite by `opening_id`.
    fn put(&self, opening: Opening) -> Result<(), EngineError>;

    fn get(&self, opening_id: &str) -> Option<Opening>;

    /// Lookup by platform availability id. Only OPEN openings are returned:
    /// a filled opening's slot is consumed.
    fn find_by_external_availability_id(&self, availability_id: &str) -> Option<Opening>;

    /// True if any opening, whatever its status, carries this availability id.
    fn references_external_availability(&self, availability_id: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct InMemoryStore {
    openings: DashMap<String, Opening>,
    /// Secondary index: external availability id → opening id
    by_availability: DashMap<String, String>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            openings: DashMap::new(),
            by_availability: DashMap::new(),
        }
    }
}

impl OpeningStore for InMemoryStore {
    fn put(&self, opening: Opening) -> Result<(), EngineError> {
        if opening.opening_id.is_empty() {
            return Err(EngineError::Validation("openingId is required".into()));
        }
        let opening_id = opening.opening_id.clone();
        let av_id = opening.external_availability_id.clone();

        // Record before index: a reader following the index always finds it.
        let previous = self.openings.insert(opening_id.clone(), opening);
        if let Some(stale) = previous.and_then(|p| p.external_availability_id)
            && av_id.as_deref() != Some(stale.as_str())
        {
            self.by_availability
                .remove_if(&stale, |_, owner| *owner == opening_id);
        }
        if let Some(av_id) = av_id {
            self.by_availability.insert(av_id, opening_id);
        }
        Ok(())
    }

    fn get(&self, opening_id: &str) -> Option<Opening> {
        self.openings.get(opening_id).map(|e| e.value().clone())
    }

    fn find_by_external_availability_id(&self, availability_id: &str) -> Option<Opening> {
        let opening_id = self.by_availability.get(availability_id)?.value().clone();
        self.get(&opening_id).filter(|o| {
            o.is_open() && o.external_availability_id.as_deref() == Some(availability_id)
        })
    }

    fn references_external_availability(&self, availability_id: &str) -> bool {
        self.by_availability.contains_key(availability_id)
    }

    fn len(&self) -> usize {
        self.openings.len()
    }
}
