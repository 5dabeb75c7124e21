use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use common::BookingId;
use domain::RoomId;

use super::ServiceRejection;

/// Reserves and releases rooms for a stay.
#[async_trait]
pub trait RoomInventory: Send + Sync {
    /// Reserves the rooms for the stay. Returns a reservation reference.
    async fn reserve(
        &self,
        booking_id: BookingId,
        room_ids: &[RoomId],
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<String, ServiceRejection>;

    /// Releases whatever was reserved for the booking. Idempotent on
    /// the participant side.
    async fn release(&self, booking_id: BookingId) -> Result<String, ServiceRejection>;
}

/// In-memory inventory with a failure toggle for tests.
pub struct InMemoryRoomInventory {
    fail_on_reserve: AtomicBool,
    next_reference: AtomicU64,
    reservations: Arc<RwLock<Vec<(BookingId, Vec<RoomId>)>>>,
    releases: Arc<RwLock<Vec<BookingId>>>,
}

impl InMemoryRoomInventory {
    pub fn new() -> Self {
        Self {
            fail_on_reserve: AtomicBool::new(false),
            next_reference: AtomicU64::new(1),
            reservations: Arc::new(RwLock::new(Vec::new())),
            releases: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn set_fail_on_reserve(&self, fail: bool) {
        self.fail_on_reserve.store(fail, Ordering::SeqCst);
    }

    pub async fn reservation_count(&self) -> usize {
        self.reservations.read().await.len()
    }

    pub async fn was_released(&self, booking_id: BookingId) -> bool {
        self.releases.read().await.contains(&booking_id)
    }

    fn reference(&self) -> String {
        let n = self.next_reference.fetch_add(1, Ordering::SeqCst);
        format!("RES-{n:04}")
    }
}

impl Default for InMemoryRoomInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoomInventory for InMemoryRoomInventory {
    async fn reserve(
        &self,
        booking_id: BookingId,
        room_ids: &[RoomId],
        _check_in: NaiveDate,
        _check_out: NaiveDate,
    ) -> Result<String, ServiceRejection> {
        if self.fail_on_reserve.load(Ordering::SeqCst) {
            return Err(ServiceRejection::new("no rooms available"));
        }
        self.reservations
            .write()
            .await
            .push((booking_id, room_ids.to_vec()));
        Ok(self.reference())
    }

    async fn release(&self, booking_id: BookingId) -> Result<String, ServiceRejection> {
        self.releases.write().await.push(booking_id);
        Ok(self.reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stay() -> (NaiveDate, NaiveDate) {
        (
            NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            NaiveDate::from_ymd_opt(2026, 9, 4).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_reserve_and_release() {
        let inventory = InMemoryRoomInventory::new();
        let booking_id = BookingId::new();
        let (check_in, check_out) = stay();

        inventory
            .reserve(booking_id, &[RoomId::new("R-204")], check_in, check_out)
            .await
            .unwrap();
        assert_eq!(inventory.reservation_count().await, 1);

        inventory.release(booking_id).await.unwrap();
        assert!(inventory.was_released(booking_id).await);
    }

    #[tokio::test]
    async fn test_reserve_failure_toggle() {
        let inventory = InMemoryRoomInventory::new();
        inventory.set_fail_on_reserve(true);
        let (check_in, check_out) = stay();

        let result = inventory
            .reserve(BookingId::new(), &[RoomId::new("R-204")], check_in, check_out)
            .await;
        assert!(result.is_err());
        assert_eq!(inventory.reservation_count().await, 0);
    }
}
