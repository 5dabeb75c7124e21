//! Booking aggregate status.

use serde::{Deserialize, Serialize};

/// The guest-visible status of a booking.
///
/// Status transitions:
/// ```text
/// Pending ──► DepositPaid ──► Reserved ──► Confirmed
///    │             │             │
///    └─────────────┴─────────────┴──► Cancelled
/// ```
///
/// The originating request only ever observes `Pending` (saga accepted);
/// every later change surfaces asynchronously through this status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BookingStatus {
    /// Booking created, saga accepted but no remote step confirmed yet.
    #[default]
    Pending,

    /// The deposit charge was confirmed by the payment service.
    DepositPaid,

    /// The rooms were reserved by the room service.
    Reserved,

    /// All saga steps succeeded (terminal state).
    Confirmed,

    /// The saga compensated or failed; the booking is void (terminal state).
    Cancelled,
}

impl BookingStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Cancelled)
    }

    /// Returns true if the transition to `next` is legal.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (Pending, DepositPaid) => true,
            (DepositPaid, Reserved) => true,
            (Reserved, Confirmed) => true,
            (Pending | DepositPaid | Reserved, Cancelled) => true,
            _ => false,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::DepositPaid => "DepositPaid",
            BookingStatus::Reserved => "Reserved",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(BookingStatus::Pending),
            "DepositPaid" => Some(BookingStatus::DepositPaid),
            "Reserved" => Some(BookingStatus::Reserved),
            "Confirmed" => Some(BookingStatus::Confirmed),
            "Cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_pending() {
        assert_eq!(BookingStatus::default(), BookingStatus::Pending);
    }

    #[test]
    fn test_happy_path_transitions() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::DepositPaid));
        assert!(BookingStatus::DepositPaid.can_transition_to(BookingStatus::Reserved));
        assert!(BookingStatus::Reserved.can_transition_to(BookingStatus::Confirmed));
    }

    #[test]
    fn test_cancellation_from_any_non_terminal() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::DepositPaid.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::Reserved.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn test_terminal_states_cannot_move() {
        assert!(!BookingStatus::Confirmed.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Pending));
        assert!(BookingStatus::Confirmed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_no_regression() {
        assert!(!BookingStatus::Reserved.can_transition_to(BookingStatus::DepositPaid));
        assert!(!BookingStatus::DepositPaid.can_transition_to(BookingStatus::Pending));
    }

    #[test]
    fn test_display() {
        assert_eq!(BookingStatus::Pending.to_string(), "Pending");
        assert_eq!(BookingStatus::Confirmed.to_string(), "Confirmed");
    }
}
