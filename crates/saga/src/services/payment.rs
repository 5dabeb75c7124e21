use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use common::BookingId;

use super::ServiceRejection;

/// Charges and refunds booking deposits.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the deposit. Returns a payment reference.
    async fn charge(
        &self,
        booking_id: BookingId,
        amount_cents: i64,
    ) -> Result<String, ServiceRejection>;

    /// Refunds whatever was charged for the booking. Returns a refund
    /// reference. Refunding a booking that was never charged succeeds;
    /// refunds are idempotent on the participant side.
    async fn refund(&self, booking_id: BookingId) -> Result<String, ServiceRejection>;
}

/// In-memory gateway with failure toggles for tests.
pub struct InMemoryPaymentGateway {
    fail_on_charge: AtomicBool,
    next_reference: AtomicU64,
    charges: Arc<RwLock<Vec<(BookingId, i64)>>>,
    refunds: Arc<RwLock<Vec<BookingId>>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self {
            fail_on_charge: AtomicBool::new(false),
            next_reference: AtomicU64::new(1),
            charges: Arc::new(RwLock::new(Vec::new())),
            refunds: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn set_fail_on_charge(&self, fail: bool) {
        self.fail_on_charge.store(fail, Ordering::SeqCst);
    }

    pub async fn charge_count(&self) -> usize {
        self.charges.read().await.len()
    }

    pub async fn refund_count(&self) -> usize {
        self.refunds.read().await.len()
    }

    pub async fn was_refunded(&self, booking_id: BookingId) -> bool {
        self.refunds.read().await.contains(&booking_id)
    }

    fn reference(&self, prefix: &str) -> String {
        let n = self.next_reference.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}-{n:04}")
    }
}

impl Default for InMemoryPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn charge(
        &self,
        booking_id: BookingId,
        amount_cents: i64,
    ) -> Result<String, ServiceRejection> {
        if self.fail_on_charge.load(Ordering::SeqCst) {
            return Err(ServiceRejection::new("card declined"));
        }
        self.charges.write().await.push((booking_id, amount_cents));
        Ok(self.reference("PAY"))
    }

    async fn refund(&self, booking_id: BookingId) -> Result<String, ServiceRejection> {
        self.refunds.write().await.push(booking_id);
        Ok(self.reference("RFD"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_charge_returns_sequential_references() {
        let gateway = InMemoryPaymentGateway::new();
        let first = gateway.charge(BookingId::new(), 10000).await.unwrap();
        let second = gateway.charge(BookingId::new(), 20000).await.unwrap();
        assert_eq!(first, "PAY-0001");
        assert_eq!(second, "PAY-0002");
        assert_eq!(gateway.charge_count().await, 2);
    }

    #[tokio::test]
    async fn test_charge_failure_toggle() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_charge(true);
        assert!(gateway.charge(BookingId::new(), 10000).await.is_err());
        assert_eq!(gateway.charge_count().await, 0);
    }

    #[tokio::test]
    async fn test_refund_succeeds_even_without_charge() {
        let gateway = InMemoryPaymentGateway::new();
        let booking_id = BookingId::new();
        gateway.refund(booking_id).await.unwrap();
        assert!(gateway.was_refunded(booking_id).await);
    }
}
