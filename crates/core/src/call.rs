//! Reminder call record and lifecycle state graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decision::Decision;
use crate::error::CallError;

/// Spoken in place of a medicine name when the caller did not provide one.
pub const DEFAULT_MEDICINE_PHRASE: &str = "your medication";

/// Correlation token linking an outbound call, its webhook callbacks and the
/// logical reminder record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(String);

impl CallId {
    /// Generate a fresh token for a new reminder attempt.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CallId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CallId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a reminder call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum CallState {
    /// Created, outbound call not yet placed
    #[default]
    Pending,
    /// Outbound call placed, waiting for the provider to connect
    Dialing,
    /// Prompt played, waiting for a keypress or speech within the gather window
    AwaitingResponse,
    /// Patient confirmed taking the medication
    Confirmed,
    /// Patient denied taking the medication
    Denied,
    /// No usable answer; the patient is directed to a caregiver
    Unrecognized,
    /// A follow-up attempt has been scheduled after a denial
    FollowUpScheduled,
    /// Terminal: nothing further will happen for this reminder
    Completed,
    /// The provider could not complete the call leg
    Failed,
}

impl CallState {
    /// Get allowed transitions from the current state.
    ///
    /// The graph is monotonic: the only re-entry into an earlier state is
    /// `FollowUpScheduled -> Dialing` for the next attempt.
    pub fn allowed_transitions(&self) -> Vec<CallState> {
        match self {
            CallState::Pending => vec![CallState::Dialing, CallState::Failed],
            CallState::Dialing => vec![CallState::AwaitingResponse, CallState::Failed],
            CallState::AwaitingResponse => vec![
                CallState::Confirmed,
                CallState::Denied,
                CallState::Unrecognized,
                CallState::Failed,
            ],
            CallState::Confirmed => vec![CallState::Completed, CallState::Failed],
            CallState::Denied => vec![
                CallState::FollowUpScheduled,
                CallState::Completed,
                CallState::Failed,
            ],
            CallState::Unrecognized => vec![CallState::Completed, CallState::Failed],
            CallState::FollowUpScheduled => vec![
                CallState::Dialing,
                CallState::Completed,
                CallState::Failed,
            ],
            CallState::Failed => vec![CallState::Completed],
            CallState::Completed => vec![],
        }
    }

    /// Check if a transition to the target state is allowed.
    pub fn can_transition_to(&self, target: CallState) -> bool {
        self.allowed_transitions().contains(&target)
    }

    /// Terminal states accept no further input events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Completed | CallState::Failed)
    }
}

impl std::fmt::Display for CallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallState::Pending => "pending",
            CallState::Dialing => "dialing",
            CallState::AwaitingResponse => "awaiting_response",
            CallState::Confirmed => "confirmed",
            CallState::Denied => "denied",
            CallState::Unrecognized => "unrecognized",
            CallState::FollowUpScheduled => "follow_up_scheduled",
            CallState::Completed => "completed",
            CallState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One logical medication reminder and its current position in the call flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderCall {
    /// Correlation token, unique per logical reminder
    pub id: CallId,
    /// Destination number
    pub phone_number: String,
    /// Medicine label spoken in the prompt
    pub medicine_name: String,
    /// Current lifecycle state
    pub state: CallState,
    /// Dial attempts made for this reminder, starts at 1
    pub attempt_count: u32,
    /// Provider identifier of the in-flight call leg; one per attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_call_ref: Option<String>,
    /// Classified outcome, recorded once a response or timeout is processed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Provider-reported reason, recorded when the call fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// When the reminder was created
    pub created_at: DateTime<Utc>,
    /// Refreshed on every transition; drives terminal-entry eviction
    pub updated_at: DateTime<Utc>,
}

impl ReminderCall {
    /// Create a new reminder in `Pending` with a fresh correlation token.
    ///
    /// An empty medicine name falls back to a generic phrase.
    pub fn new(phone_number: impl Into<String>, medicine_name: Option<String>) -> Self {
        let now = Utc::now();
        let medicine_name = medicine_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MEDICINE_PHRASE.to_string());

        Self {
            id: CallId::generate(),
            phone_number: phone_number.into(),
            medicine_name,
            state: CallState::Pending,
            attempt_count: 1,
            provider_call_ref: None,
            decision: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a validated state transition.
    ///
    /// Illegal moves are rejected with `CallError::InvalidTransition` so a
    /// late or out-of-order callback is detectable instead of silently
    /// corrupting the record.
    pub fn transition_to(&mut self, target: CallState) -> Result<(), CallError> {
        if !self.state.can_transition_to(target) {
            return Err(CallError::InvalidTransition {
                from: self.state,
                to: target,
            });
        }

        tracing::debug!(call_id = %self.id, from = %self.state, to = %target, "state transition");
        self.state = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Terminal records are kept only for the eviction grace period.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(CallState::Pending.can_transition_to(CallState::Dialing));
        assert!(CallState::Dialing.can_transition_to(CallState::AwaitingResponse));
        assert!(CallState::AwaitingResponse.can_transition_to(CallState::Confirmed));
        assert!(CallState::Denied.can_transition_to(CallState::FollowUpScheduled));
        assert!(CallState::FollowUpScheduled.can_transition_to(CallState::Dialing));

        assert!(!CallState::Pending.can_transition_to(CallState::AwaitingResponse));
        assert!(!CallState::Completed.can_transition_to(CallState::Dialing));
        assert!(!CallState::Confirmed.can_transition_to(CallState::Denied));
    }

    #[test]
    fn test_terminal_states() {
        assert!(CallState::Completed.is_terminal());
        assert!(CallState::Failed.is_terminal());
        assert!(!CallState::AwaitingResponse.is_terminal());
        assert!(!CallState::FollowUpScheduled.is_terminal());
    }

    #[test]
    fn test_new_call_defaults() {
        let call = ReminderCall::new("+15551234567", Some("Metformin".to_string()));
        assert_eq!(call.state, CallState::Pending);
        assert_eq!(call.attempt_count, 1);
        assert!(call.provider_call_ref.is_none());
        assert!(call.decision.is_none());

        let call = ReminderCall::new("+15551234567", None);
        assert_eq!(call.medicine_name, DEFAULT_MEDICINE_PHRASE);

        let call = ReminderCall::new("+15551234567", Some("  ".to_string()));
        assert_eq!(call.medicine_name, DEFAULT_MEDICINE_PHRASE);
    }

    #[test]
    fn test_transition_to_rejects_illegal_move() {
        let mut call = ReminderCall::new("+15551234567", None);
        let err = call.transition_to(CallState::AwaitingResponse).unwrap_err();
        assert!(matches!(
            err,
            CallError::InvalidTransition {
                from: CallState::Pending,
                to: CallState::AwaitingResponse,
            }
        ));
        assert_eq!(call.state, CallState::Pending);

        call.transition_to(CallState::Dialing).unwrap();
        assert_eq!(call.state, CallState::Dialing);
    }
}
