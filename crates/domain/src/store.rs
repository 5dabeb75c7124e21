//! Booking persistence boundary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::{BookingId, BookingStatus};

use crate::booking::Booking;
use crate::error::DomainError;

/// Storage for booking snapshots.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn save(&self, booking: Booking) -> Result<(), DomainError>;

    async fn get(&self, id: BookingId) -> Result<Option<Booking>, DomainError>;

    /// Advances a booking's status, validating the transition.
    async fn update_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<Booking, DomainError>;
}

/// In-memory booking store for tests and local runs.
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self {
            bookings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn count(&self) -> usize {
        self.bookings.read().await.len()
    }
}

impl Default for InMemoryBookingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn save(&self, booking: Booking) -> Result<(), DomainError> {
        self.bookings.write().await.insert(booking.id, booking);
        Ok(())
    }

    async fn get(&self, id: BookingId) -> Result<Option<Booking>, DomainError> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: BookingId,
        status: BookingStatus,
    ) -> Result<Booking, DomainError> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&id)
            .ok_or(DomainError::BookingNotFound(id))?;
        booking.transition_to(status)?;
        Ok(booking.clone())
    }
}
