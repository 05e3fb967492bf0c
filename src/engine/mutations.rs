use std::time::Instant;

use chrono::DateTime;
use tracing::{info, warn};
use ulid::Ulid;

use crate::auth::{Action, Principal};
use crate::model::*;
use crate::observability;

use super::{record, Engine, EngineError, FillLockRelease};

fn require(field: &'static str, value: &str) -> Result<(), EngineError> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{field} is required")));
    }
    Ok(())
}

pub(crate) fn validate_create(req: &CreateOpening) -> Result<(), EngineError> {
    require("companyId", &req.company_id)?;
    require("locationSquareId", &req.location_square_id)?;
    require("serviceVariationSquareId", &req.service_variation_square_id)?;
    require("startAt", &req.start_at)?;
    require("endAt", &req.end_at)?;
    // Unparsable bounds are let through (the gateway falls back to a default
    // duration); bounds that parse must be ordered.
    if let (Ok(start), Ok(end)) = (
        DateTime::parse_from_rfc3339(&req.start_at),
        DateTime::parse_from_rfc3339(&req.end_at),
    ) && end <= start
    {
        return Err(EngineError::Validation("endAt must be after startAt".into()));
    }
    Ok(())
}

pub(crate) fn validate_fill(req: &FillOpening) -> Result<(), EngineError> {
    require("employeeQwishiId", &req.employee_id)?;
    require("employeeSquareTeamMemberId", &req.team_member_id)
}

impl Engine {
    fn open_opening(&self, opening_id: &str) -> Result<Opening, EngineError> {
        self.store
            .get(opening_id)
            .filter(Opening::is_open)
            .ok_or_else(|| EngineError::NotFound(opening_id.to_string()))
    }

    /// Publish a new opening on the platform and start tracking it.
    pub async fn create_opening(
        &self,
        principal: &Principal,
        req: CreateOpening,
    ) -> Result<Opening, EngineError> {
        let started = Instant::now();
        let result = self.create_opening_inner(principal, req).await;
        record("create_opening", started, &result);
        result
    }

    async fn create_opening_inner(
        &self,
        principal: &Principal,
        req: CreateOpening,
    ) -> Result<Opening, EngineError> {
        principal.authorize(Action::CreateOpening)?;
        validate_create(&req)?;
        let token = self.merchant_token(&req.company_id)?;

        let av = self
            .gateway
            .create_availability(
                &token,
                &AvailabilityRequest {
                    location_id: req.location_square_id.clone(),
                    service_type_id: req.service_variation_square_id.clone(),
                    team_member_id: req.team_member_square_id.clone(),
                    start_at: req.start_at.clone(),
                    end_at: req.end_at.clone(),
                },
            )
            .await
            .map_err(|e| {
                warn!(company_id = %req.company_id, "create availability failed: {e}");
                e
            })?;

        let opening = Opening {
            opening_id: Ulid::new().to_string(),
            external_availability_id: Some(av.id),
            external_booking_id: None,
            company_id: req.company_id,
            location_id: req.location_square_id,
            service_type_id: req.service_variation_square_id,
            team_member_id: req.team_member_square_id,
            start_at: av.start_at.unwrap_or(req.start_at),
            // Availability does not echo the end time.
            end_at: req.end_at,
            status: OpeningStatus::Open,
            notes: req.notes,
        };

        self.commit(OpeningEvent::Created {
            opening: opening.clone(),
        })?;
        metrics::counter!(observability::OPENINGS_CREATED_TOTAL).increment(1);
        info!(
            opening_id = %opening.opening_id,
            company_id = %opening.company_id,
            by = %principal.subject,
            "opening created"
        );
        Ok(opening)
    }

    /// Book an employee onto an open opening.
    ///
    /// Serialized per opening: a concurrent second fill waits, then sees
    /// FILLED and is rejected. Nothing is written unless the booking succeeds.
    pub async fn fill_opening(
        &self,
        principal: &Principal,
        opening_id: &str,
        req: FillOpening,
    ) -> Result<Opening, EngineError> {
        let started = Instant::now();
        let result = self.fill_opening_inner(principal, opening_id, req).await;
        record("fill_opening", started, &result);
        result
    }

    async fn fill_opening_inner(
        &self,
        principal: &Principal,
        opening_id: &str,
        req: FillOpening,
    ) -> Result<Opening, EngineError> {
        principal.authorize(Action::FillOpening)?;
        validate_fill(&req)?;

        // Unknown and filled ids are turned away before a lock entry exists.
        self.open_opening(opening_id)?;

        let lock = self.fill_lock(opening_id);
        let _release = FillLockRelease::new(&self.fill_locks, opening_id);
        let _guard = lock.lock().await;

        // Re-read under the lock: a fill that held it may have finished.
        let opening = self.open_opening(opening_id)?;
        let token = self.merchant_token(&opening.company_id)?;

        let booking = self
            .gateway
            .create_booking(
                &token,
                &BookingRequest {
                    availability_id: opening.external_availability_id.clone(),
                    location_id: opening.location_id.clone(),
                    service_type_id: opening.service_type_id.clone(),
                    start_at: opening.start_at.clone(),
                    team_member_id: req.team_member_id.clone(),
                    note: req.customer_note.clone(),
                },
            )
            .await
            .map_err(|e| {
                warn!(opening_id, "create booking failed: {e}");
                e
            })?;

        let filled = opening
            .filled(booking.id)
            .ok_or_else(|| EngineError::NotFound(opening_id.to_string()))?;
        self.commit(OpeningEvent::Filled {
            opening: filled.clone(),
            employee_id: req.employee_id.clone(),
        })?;
        metrics::counter!(observability::OPENINGS_FILLED_TOTAL).increment(1);
        info!(
            opening_id,
            booking_id = ?filled.external_booking_id,
            employee_id = %req.employee_id,
            "opening filled"
        );

        if let Err(e) = self.cleanup.after_booking(&token, &filled).await {
            metrics::counter!(observability::CLEANUP_FAILURES_TOTAL).increment(1);
            warn!(opening_id, "post-booking cleanup failed: {e}");
        }
        Ok(filled)
    }
}
