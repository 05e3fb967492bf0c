use std::time::Instant;

use tracing::debug;

use crate::auth::{Action, Principal};
use crate::model::*;

use super::reconcile::reconcile;
use super::{record, Engine, EngineError};

fn required(field: &'static str, value: Option<String>) -> Result<String, EngineError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| EngineError::Validation(format!("missing query parameter: {field}")))
}

impl OpeningQuery {
    /// All five parameters are required.
    pub fn into_window(self) -> Result<SearchWindow, EngineError> {
        Ok(SearchWindow {
            company_id: required("companyId", self.company_id)?,
            location_id: required("locationSquareId", self.location_square_id)?,
            service_type_id: required("serviceVariationSquareId", self.service_variation_square_id)?,
            range_start: required("startAt", self.start_at)?,
            range_end: required("endAt", self.end_at)?,
        })
    }
}

impl Engine {
    /// Openings bookable in a window: the platform's search merged with what
    /// QwiSHi tracks. Read-only.
    pub async fn list_openings(
        &self,
        principal: &Principal,
        query: OpeningQuery,
    ) -> Result<Vec<Opening>, EngineError> {
        let started = Instant::now();
        let result = self.list_openings_inner(principal, query).await;
        record("list_openings", started, &result);
        result
    }

    async fn list_openings_inner(
        &self,
        principal: &Principal,
        query: OpeningQuery,
    ) -> Result<Vec<Opening>, EngineError> {
        principal.authorize(Action::ListOpenings)?;
        let window = query.into_window()?;
        let token = self.merchant_token(&window.company_id)?;

        let availabilities = self
            .gateway
            .search_availabilities(
                &token,
                &window.location_id,
                &window.service_type_id,
                &window.range_start,
                &window.range_end,
            )
            .await?;

        let merged = reconcile(&availabilities, self.store.as_ref(), &window);
        debug!(
            company_id = %window.company_id,
            found = availabilities.len(),
            listed = merged.len(),
            "openings reconciled"
        );
        Ok(merged)
    }

    pub fn get_opening(&self, principal: &Principal, opening_id: &str) -> Result<Opening, EngineError> {
        principal.authorize(Action::ViewOpening)?;
        self.store
            .get(opening_id)
            .ok_or_else(|| EngineError::NotFound(opening_id.to_string()))
    }
}
