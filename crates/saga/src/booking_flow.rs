//! The hotel booking saga definition.

use std::sync::Arc;

use crate::steps::{InitiateDeposit, ReserveRoom, SagaStep, SendNotification};

/// Saga type tag stored on every outbox row of this flow.
pub const SAGA_TYPE: &str = "HotelBooking";

pub const STEP_INITIATE_DEPOSIT: &str = "initiate_deposit";
pub const STEP_RESERVE_ROOM: &str = "reserve_room";
pub const STEP_SEND_NOTIFICATION: &str = "send_notification";

/// The forward step sequence. Compensation runs in reverse over the
/// same list.
pub fn booking_steps() -> Vec<Arc<dyn SagaStep>> {
    vec![
        Arc::new(InitiateDeposit),
        Arc::new(ReserveRoom),
        Arc::new(SendNotification),
    ]
}
