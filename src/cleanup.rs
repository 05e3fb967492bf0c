//! Post-booking hook for the platform availability record.
//!
//! Once a booking fills an opening, the availability it was created from is
//! still on the platform. Whether that record should be removed depends on
//! whether one availability can be booked more than once, which is not
//! settled. The engine therefore calls a hook and the default one leaves the
//! record alone.

use async_trait::async_trait;
use tracing::debug;

use crate::engine::EngineError;
use crate::model::Opening;

#[async_trait]
pub trait BookingCleanup: Send + Sync {
    /// Called once per successful fill with the FILLED opening. Errors are
    /// logged by the engine and never undo the fill.
    async fn after_booking(&self, merchant_token: &str, opening: &Opening) -> Result<(), EngineError>;
}

/// Leaves the platform availability as it is.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetainAvailability;

#[async_trait]
impl BookingCleanup for RetainAvailability {
    async fn after_booking(&self, _merchant_token: &str, opening: &Opening) -> Result<(), EngineError> {
        debug!(
            opening_id = %opening.opening_id,
            availability_id = ?opening.external_availability_id,
            "availability retained after booking"
        );
        Ok(())
    }
}
