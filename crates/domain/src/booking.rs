//! Booking aggregate snapshot and value objects.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use common::{BookingId, BookingStatus};

use crate::error::BookingError;

/// A monetary amount in cents.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.0
    }

    /// Returns true for a strictly positive amount.
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

/// Identifier of a physical room, as the room service knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Creates a room ID from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the room ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The booking aggregate as the saga sees it.
///
/// Availability and pricing rules live behind the collaborator services;
/// this snapshot carries only what the coordination layer needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub guest_email: String,
    pub room_ids: Vec<RoomId>,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub deposit: Money,
    pub status: BookingStatus,
}

impl Booking {
    /// Creates a new pending booking.
    pub fn new(
        guest_email: impl Into<String>,
        room_ids: Vec<RoomId>,
        check_in: NaiveDate,
        check_out: NaiveDate,
        deposit: Money,
    ) -> Self {
        Self {
            id: BookingId::new(),
            guest_email: guest_email.into(),
            room_ids,
            check_in,
            check_out,
            deposit,
            status: BookingStatus::Pending,
        }
    }

    /// Validates the booking before a saga may start for it.
    ///
    /// This is the only synchronous rejection point the caller ever sees;
    /// every later failure surfaces as a status change.
    pub fn validate_for_reservation(&self) -> Result<(), BookingError> {
        if self.status != BookingStatus::Pending {
            return Err(BookingError::NotPending {
                actual: self.status,
            });
        }
        if self.room_ids.is_empty() {
            return Err(BookingError::NoRooms);
        }
        if self.check_out <= self.check_in {
            return Err(BookingError::InvalidStay {
                check_in: self.check_in,
                check_out: self.check_out,
            });
        }
        if !self.deposit.is_positive() {
            return Err(BookingError::InvalidDeposit(self.deposit));
        }
        Ok(())
    }

    /// Advances the booking status, rejecting illegal transitions.
    pub fn transition_to(&mut self, next: BookingStatus) -> Result<(), BookingError> {
        if !self.status.can_transition_to(next) {
            return Err(BookingError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_booking() -> Booking {
        Booking::new(
            "guest@example.com",
            vec![RoomId::new("R-204")],
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 4).unwrap(),
            Money::from_cents(15000),
        )
    }

    #[test]
    fn test_new_booking_is_pending() {
        let booking = valid_booking();
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.validate_for_reservation().is_ok());
    }

    #[test]
    fn test_validation_rejects_no_rooms() {
        let mut booking = valid_booking();
        booking.room_ids.clear();
        assert!(matches!(
            booking.validate_for_reservation(),
            Err(BookingError::NoRooms)
        ));
    }

    #[test]
    fn test_validation_rejects_inverted_stay() {
        let mut booking = valid_booking();
        booking.check_out = booking.check_in;
        assert!(matches!(
            booking.validate_for_reservation(),
            Err(BookingError::InvalidStay { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_zero_deposit() {
        let mut booking = valid_booking();
        booking.deposit = Money::from_cents(0);
        assert!(matches!(
            booking.validate_for_reservation(),
            Err(BookingError::InvalidDeposit(_))
        ));
    }

    #[test]
    fn test_validation_rejects_non_pending() {
        let mut booking = valid_booking();
        booking.status = BookingStatus::Confirmed;
        assert!(matches!(
            booking.validate_for_reservation(),
            Err(BookingError::NotPending { .. })
        ));
    }

    #[test]
    fn test_transition_happy_path() {
        let mut booking = valid_booking();
        booking.transition_to(BookingStatus::DepositPaid).unwrap();
        booking.transition_to(BookingStatus::Reserved).unwrap();
        booking.transition_to(BookingStatus::Confirmed).unwrap();
        assert!(booking.status.is_terminal());
    }

    #[test]
    fn test_transition_rejects_regression() {
        let mut booking = valid_booking();
        booking.transition_to(BookingStatus::DepositPaid).unwrap();
        let result = booking.transition_to(BookingStatus::Pending);
        assert!(matches!(
            result,
            Err(BookingError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(15000).to_string(), "150.00");
        assert_eq!(Money::from_cents(105).to_string(), "1.05");
    }
}
