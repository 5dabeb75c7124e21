//! Outbox and saga status state machines.

use serde::{Deserialize, Serialize};

/// Delivery status of a single outbox row.
///
/// Status transitions are monotonic:
/// ```text
/// Started ──┬──► Completed
///           └──► Failed
/// ```
/// A row is never deleted while `Started`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutboxStatus {
    /// Row is durably stored and queued for send.
    #[default]
    Started,

    /// Broker acknowledged the send (terminal state).
    Completed,

    /// Send failed permanently or the retry budget was exhausted (terminal state).
    Failed,
}

impl OutboxStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboxStatus::Completed | OutboxStatus::Failed)
    }

    /// Returns true if the transition to `next` is legal.
    pub fn can_transition_to(&self, next: OutboxStatus) -> bool {
        matches!(
            (self, next),
            (
                OutboxStatus::Started,
                OutboxStatus::Completed | OutboxStatus::Failed
            )
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Started => "Started",
            OutboxStatus::Completed => "Completed",
            OutboxStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The orchestrator's view of one participant's progress within a saga.
///
/// Status transitions:
/// ```text
/// Started ──► Processing ──► Succeeded
///    │             │
///    └─────────────┴──► Compensating ──► Compensated
/// ```
/// `Failed` is terminal and reachable from any non-terminal state when a
/// step cannot be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SagaStatus {
    /// Row emitted, awaiting the participant's reply.
    #[default]
    Started,

    /// Reply received, downstream steps still in progress.
    Processing,

    /// The whole saga completed successfully (terminal state).
    Succeeded,

    /// A compensating action for this participant is in flight.
    Compensating,

    /// The participant's effect was undone (terminal state).
    Compensated,

    /// The step could not complete or be compensated (terminal state).
    Failed,
}

impl SagaStatus {
    /// The statuses the relay considers still in flight and worth retrying.
    pub const RETRYABLE: [SagaStatus; 3] = [
        SagaStatus::Started,
        SagaStatus::Processing,
        SagaStatus::Compensating,
    ];

    /// The terminal statuses eligible for garbage collection once delivered.
    pub const TERMINAL: [SagaStatus; 3] = [
        SagaStatus::Succeeded,
        SagaStatus::Compensated,
        SagaStatus::Failed,
    ];

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SagaStatus::Succeeded | SagaStatus::Compensated | SagaStatus::Failed
        )
    }

    /// Returns true if the transition to `next` is legal.
    ///
    /// The machine only moves forward, except for the explicit compensation
    /// path; it never both advances and compensates.
    pub fn can_transition_to(&self, next: SagaStatus) -> bool {
        use SagaStatus::*;
        match (self, next) {
            (Started, Processing) => true,
            (Processing, Succeeded) => true,
            (Started | Processing, Compensating) => true,
            // A row whose effect never landed is compensated in place.
            (Started | Processing, Compensated) => true,
            (Compensating, Compensated) => true,
            (Started | Processing | Compensating, Failed) => true,
            _ => false,
        }
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Started => "Started",
            SagaStatus::Processing => "Processing",
            SagaStatus::Succeeded => "Succeeded",
            SagaStatus::Compensating => "Compensating",
            SagaStatus::Compensated => "Compensated",
            SagaStatus::Failed => "Failed",
        }
    }

    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Started" => Some(SagaStatus::Started),
            "Processing" => Some(SagaStatus::Processing),
            "Succeeded" => Some(SagaStatus::Succeeded),
            "Compensating" => Some(SagaStatus::Compensating),
            "Compensated" => Some(SagaStatus::Compensated),
            "Failed" => Some(SagaStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl OutboxStatus {
    /// Parses a status from its string name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Started" => Some(OutboxStatus::Started),
            "Completed" => Some(OutboxStatus::Completed),
            "Failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbox_status_monotonic() {
        assert!(OutboxStatus::Started.can_transition_to(OutboxStatus::Completed));
        assert!(OutboxStatus::Started.can_transition_to(OutboxStatus::Failed));
        assert!(!OutboxStatus::Completed.can_transition_to(OutboxStatus::Started));
        assert!(!OutboxStatus::Failed.can_transition_to(OutboxStatus::Completed));
        assert!(!OutboxStatus::Completed.can_transition_to(OutboxStatus::Failed));
    }

    #[test]
    fn test_outbox_status_terminal() {
        assert!(!OutboxStatus::Started.is_terminal());
        assert!(OutboxStatus::Completed.is_terminal());
        assert!(OutboxStatus::Failed.is_terminal());
    }

    #[test]
    fn test_saga_status_happy_path() {
        assert!(SagaStatus::Started.can_transition_to(SagaStatus::Processing));
        assert!(SagaStatus::Processing.can_transition_to(SagaStatus::Succeeded));
    }

    #[test]
    fn test_saga_status_compensation_path() {
        assert!(SagaStatus::Started.can_transition_to(SagaStatus::Compensating));
        assert!(SagaStatus::Processing.can_transition_to(SagaStatus::Compensating));
        assert!(SagaStatus::Compensating.can_transition_to(SagaStatus::Compensated));
        assert!(SagaStatus::Processing.can_transition_to(SagaStatus::Compensated));
    }

    #[test]
    fn test_saga_status_failed_from_any_non_terminal() {
        assert!(SagaStatus::Started.can_transition_to(SagaStatus::Failed));
        assert!(SagaStatus::Processing.can_transition_to(SagaStatus::Failed));
        assert!(SagaStatus::Compensating.can_transition_to(SagaStatus::Failed));
    }

    #[test]
    fn test_saga_status_never_regresses() {
        assert!(!SagaStatus::Succeeded.can_transition_to(SagaStatus::Started));
        assert!(!SagaStatus::Compensated.can_transition_to(SagaStatus::Compensating));
        assert!(!SagaStatus::Failed.can_transition_to(SagaStatus::Processing));
        assert!(!SagaStatus::Processing.can_transition_to(SagaStatus::Started));
        // A compensating row never advances again.
        assert!(!SagaStatus::Compensating.can_transition_to(SagaStatus::Processing));
        assert!(!SagaStatus::Compensating.can_transition_to(SagaStatus::Succeeded));
    }

    #[test]
    fn test_saga_status_terminal_set() {
        for status in SagaStatus::TERMINAL {
            assert!(status.is_terminal());
        }
        for status in SagaStatus::RETRYABLE {
            assert!(!status.is_terminal());
        }
    }

    /// Property test over random valid transition sequences: a walk that only
    /// follows `can_transition_to` never revisits an earlier status.
    #[test]
    fn test_random_walks_are_monotonic() {
        use SagaStatus::*;
        let all = [Started, Processing, Succeeded, Compensating, Compensated, Failed];

        // Deterministic pseudo-random sequence, no rng dependency needed.
        let mut seed: u64 = 0x5eed;
        for _ in 0..200 {
            let mut current = Started;
            let mut visited = vec![current];
            loop {
                let candidates: Vec<SagaStatus> = all
                    .iter()
                    .copied()
                    .filter(|next| current.can_transition_to(*next))
                    .collect();
                if candidates.is_empty() {
                    break;
                }
                seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let next = candidates[(seed >> 33) as usize % candidates.len()];
                assert!(
                    !visited.contains(&next),
                    "status regressed: {current} -> {next} revisits {visited:?}"
                );
                visited.push(next);
                current = next;
            }
            assert!(current.is_terminal());
        }
    }

    #[test]
    fn test_parse_roundtrip() {
        for status in [
            SagaStatus::Started,
            SagaStatus::Processing,
            SagaStatus::Succeeded,
            SagaStatus::Compensating,
            SagaStatus::Compensated,
            SagaStatus::Failed,
        ] {
            assert_eq!(SagaStatus::parse(status.as_str()), Some(status));
        }
        for status in [
            OutboxStatus::Started,
            OutboxStatus::Completed,
            OutboxStatus::Failed,
        ] {
            assert_eq!(OutboxStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SagaStatus::parse("Bogus"), None);
    }

    #[test]
    fn test_serialization() {
        let status = SagaStatus::Compensating;
        let json = serde_json::to_string(&status).unwrap();
        let deserialized: SagaStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, deserialized);
    }
}
