use crate::model::*;

use super::store::OpeningStore;

/// Id prefix for openings synthesized from untracked platform records.
pub const SYNTHETIC_ID_PREFIX: &str = "square_av_";

// ── Reconciliation ───────────────────────────────────────────────

/// Merge a platform search result with what QwiSHi tracks.
///
/// For each availability, in input order:
/// 1. an OPEN opening references it → that opening, unchanged;
/// 2. no opening references it at all → a transient OPEN view built from the record;
/// 3. otherwise it was filled through QwiSHi → dropped.
///
/// Reads the store, never writes it.
pub fn reconcile(
    availabilities: &[ExternalAvailability],
    store: &dyn OpeningStore,
    window: &SearchWindow,
) -> Vec<Opening> {
    availabilities
        .iter()
        .filter_map(|av| {
            if let Some(existing) = store.find_by_external_availability_id(&av.id) {
                Some(existing)
            } else if !store.references_external_availability(&av.id) {
                Some(synthesize(av, window))
            } else {
                None
            }
        })
        .collect()
}

/// Opening-shaped view of an availability nobody in QwiSHi created.
/// `end_at` is empty: search results do not reliably carry the slot end.
pub fn synthesize(av: &ExternalAvailability, window: &SearchWindow) -> Opening {
    let segment = av.first_segment();
    Opening {
        opening_id: format!("{SYNTHETIC_ID_PREFIX}{}", av.id),
        external_availability_id: Some(av.id.clone()),
        external_booking_id: None,
        company_id: window.company_id.clone(),
        location_id: av
            .location_id
            .clone()
            .unwrap_or_else(|| window.location_id.clone()),
        service_type_id: segment
            .and_then(|s| s.service_variation_id.clone())
            .unwrap_or_else(|| window.service_type_id.clone()),
        team_member_id: segment.and_then(|s| s.team_member_id.clone()),
        start_at: av.start_at.clone().unwrap_or_default(),
        end_at: String::new(),
        status: OpeningStatus::Open,
        notes: None,
    }
}
