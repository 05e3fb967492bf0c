use serde::{Deserialize, Serialize};

/// Lifecycle of an opening. Only `Open -> Filled` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpeningStatus {
    Open,
    Filled,
}

/// A shift opening as QwiSHi tracks it.
///
/// Wire names match the client contract (`qwishiOpeningId`, `squareAvailabilityId`, ...).
/// Timestamps stay the ISO-8601 strings the client sent; a view synthesized from
/// a platform search may carry an empty `end_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opening {
    #[serde(rename = "qwishiOpeningId")]
    pub opening_id: String,
    #[serde(rename = "squareAvailabilityId")]
    pub external_availability_id: Option<String>,
    #[serde(rename = "squareBookingId")]
    pub external_booking_id: Option<String>,
    pub company_id: String,
    #[serde(rename = "locationSquareId")]
    pub location_id: String,
    #[serde(rename = "serviceVariationSquareId")]
    pub service_type_id: String,
    #[serde(rename = "teamMemberSquareId")]
    pub team_member_id: Option<String>,
    pub start_at: String,
    pub end_at: String,
    pub status: OpeningStatus,
    pub notes: Option<String>,
}

impl Opening {
    pub fn is_open(&self) -> bool {
        self.status == OpeningStatus::Open
    }

    /// Apply the OPEN -> FILLED transition. Returns `None` if already filled.
    /// The external availability id is carried over untouched.
    pub fn filled(&self, booking_id: String) -> Option<Opening> {
        if !self.is_open() {
            return None;
        }
        Some(Opening {
            status: OpeningStatus::Filled,
            external_booking_id: Some(booking_id),
            ..self.clone()
        })
    }
}

// ── Platform records ─────────────────────────────────────────────

/// One appointment segment of a platform availability or booking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_variation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_member_id: Option<String>,
}

/// A bookable slot as the scheduling platform reports it. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAvailability {
    pub id: String,
    #[serde(default)]
    pub start_at: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default)]
    pub appointment_segments: Vec<AppointmentSegment>,
}

impl ExternalAvailability {
    pub fn first_segment(&self) -> Option<&AppointmentSegment> {
        self.appointment_segments.first()
    }
}

/// A confirmed booking on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalBooking {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_at: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
}

// ── Commands ─────────────────────────────────────────────────────

/// Body of `POST /openings`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOpening {
    pub company_id: String,
    pub location_square_id: String,
    pub service_variation_square_id: String,
    #[serde(default)]
    pub team_member_square_id: Option<String>,
    pub start_at: String,
    pub end_at: String,
    #[serde(default)]
    pub notes: Option<String>,
}

pub const DEFAULT_FILL_NOTE: &str = "Shift filled by QwiSHi app.";

fn default_fill_note() -> Option<String> {
    Some(DEFAULT_FILL_NOTE.to_string())
}

/// Body of `POST /openings/{id}/fill`. An absent `customerNote` gets the
/// default note; an explicit `null` leaves it to the gateway's default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillOpening {
    #[serde(rename = "employeeQwishiId")]
    pub employee_id: String,
    #[serde(rename = "employeeSquareTeamMemberId")]
    pub team_member_id: String,
    #[serde(default = "default_fill_note")]
    pub customer_note: Option<String>,
}

/// Query of `GET /openings`. Every field is required; they are optional here
/// so a missing one maps to a validation error instead of an extractor rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpeningQuery {
    pub company_id: Option<String>,
    pub location_square_id: Option<String>,
    pub service_variation_square_id: Option<String>,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
}

/// A validated search window, as handed to reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchWindow {
    pub company_id: String,
    pub location_id: String,
    pub service_type_id: String,
    pub range_start: String,
    pub range_end: String,
}

// ── Gateway requests ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvailabilityRequest {
    pub location_id: String,
    pub service_type_id: String,
    pub team_member_id: Option<String>,
    pub start_at: String,
    pub end_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub availability_id: Option<String>,
    pub location_id: String,
    pub service_type_id: String,
    pub start_at: String,
    pub team_member_id: String,
    pub note: Option<String>,
}

// ── Events ───────────────────────────────────────────────────────

/// Published to per-company subscribers after a committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OpeningEvent {
    Created { opening: Opening },
    Filled { opening: Opening, employee_id: String },
}

impl OpeningEvent {
    pub fn opening(&self) -> &Opening {
        match self {
            OpeningEvent::Created { opening } | OpeningEvent::Filled { opening, .. } => opening,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OpeningEvent::Created { .. } => "created",
            OpeningEvent::Filled { .. } => "filled",
        }
    }
}
