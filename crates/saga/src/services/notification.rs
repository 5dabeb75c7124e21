use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::BookingId;

use super::ServiceRejection;

/// Sends and cancels guest notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends the booking confirmation. Returns a notification reference.
    async fn send(
        &self,
        booking_id: BookingId,
        guest_email: &str,
    ) -> Result<String, ServiceRejection>;

    /// Sends a cancellation notice superseding any earlier confirmation.
    /// Idempotent on the participant side.
    async fn cancel(&self, booking_id: BookingId) -> Result<String, ServiceRejection>;
}

/// In-memory notifier with a failure toggle for tests.
pub struct InMemoryNotifier {
    fail_on_send: AtomicBool,
    next_reference: AtomicU64,
    sent: Arc<RwLock<Vec<(BookingId, String)>>>,
    cancelled: Arc<RwLock<Vec<BookingId>>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self {
            fail_on_send: AtomicBool::new(false),
            next_reference: AtomicU64::new(1),
            sent: Arc::new(RwLock::new(Vec::new())),
            cancelled: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn set_fail_on_send(&self, fail: bool) {
        self.fail_on_send.store(fail, Ordering::SeqCst);
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }

    pub async fn was_cancelled(&self, booking_id: BookingId) -> bool {
        self.cancelled.read().await.contains(&booking_id)
    }

    fn reference(&self) -> String {
        let n = self.next_reference.fetch_add(1, Ordering::SeqCst);
        format!("NTF-{n:04}")
    }
}

impl Default for InMemoryNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(
        &self,
        booking_id: BookingId,
        guest_email: &str,
    ) -> Result<String, ServiceRejection> {
        if self.fail_on_send.load(Ordering::SeqCst) {
            return Err(ServiceRejection::new("mail relay unavailable"));
        }
        self.sent
            .write()
            .await
            .push((booking_id, guest_email.to_string()));
        Ok(self.reference())
    }

    async fn cancel(&self, booking_id: BookingId) -> Result<String, ServiceRejection> {
        self.cancelled.write().await.push(booking_id);
        Ok(self.reference())
    }
}
