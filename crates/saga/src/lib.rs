//! Booking saga: orchestrator, reply listener, and participant workers.
//!
//! The orchestrator drives one booking through deposit, room
//! reservation, and guest notification, compensating completed steps in
//! reverse when a later one fails. All of its durable state lives in
//! outbox rows; the orchestrator itself holds nothing between replies.

pub mod booking_flow;
pub mod error;
pub mod listener;
pub mod orchestrator;
pub mod services;
pub mod steps;
pub mod worker;

pub use booking_flow::{booking_steps, SAGA_TYPE};
pub use error::SagaError;
pub use listener::{HandleOutcome, ReplyListener};
pub use orchestrator::SagaOrchestrator;
pub use steps::{SagaStep, StepContext};
pub use worker::{
    NotificationParticipant, ParticipantHandler, ParticipantWorker, PaymentParticipant,
    RoomParticipant, WorkerOutcome,
};
