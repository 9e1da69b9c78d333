//! Call-flow state machine
//!
//! Advances one reminder call through its lifecycle in response to provider
//! callback events. Each handler validates the current state first, so a
//! duplicate or out-of-order webhook surfaces as a typed error instead of
//! silently corrupting the record.

use medcall_core::{CallState, Decision, ReminderCall};

use crate::classifier::ResponseClassifier;
use crate::FlowError;

/// Event handlers for the reminder call lifecycle.
///
/// The machine never renders prompt text and never schedules anything; it
/// only moves the record along the state graph and reports what happened.
#[derive(Debug, Clone, Default)]
pub struct CallFlow {
    classifier: ResponseClassifier,
}

impl CallFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: ResponseClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ResponseClassifier {
        &self.classifier
    }

    /// The outbound call leg was placed.
    ///
    /// `Pending -> Dialing` for the first attempt, or
    /// `FollowUpScheduled -> Dialing` for a re-dial (incrementing the attempt
    /// count). Records the provider ref for this leg.
    pub fn on_dialed(
        &self,
        call: &mut ReminderCall,
        provider_ref: impl Into<String>,
    ) -> Result<(), FlowError> {
        let redial = call.state == CallState::FollowUpScheduled;
        call.transition_to(CallState::Dialing)?;
        if redial {
            call.attempt_count += 1;
        }
        call.provider_call_ref = Some(provider_ref.into());
        Ok(())
    }

    /// The provider answered and the reminder prompt was played.
    pub fn on_prompt_delivered(&self, call: &mut ReminderCall) -> Result<(), FlowError> {
        call.transition_to(CallState::AwaitingResponse)?;
        Ok(())
    }

    /// A gather result arrived; classify it and branch.
    ///
    /// Requires `AwaitingResponse` — anything else is a [`FlowError::StaleCallback`],
    /// a recoverable no-op. Confirmed and Unrecognized run to `Completed`;
    /// Denied stops at `Denied` so the follow-up policy can pick the next hop.
    pub fn on_response(
        &self,
        call: &mut ReminderCall,
        digits: Option<&str>,
        transcript: Option<&str>,
    ) -> Result<Decision, FlowError> {
        if call.state != CallState::AwaitingResponse {
            return Err(FlowError::StaleCallback {
                call_id: call.id.clone(),
                state: call.state,
            });
        }

        let decision = self.classifier.classify(digits, transcript);
        call.decision = Some(decision);
        match decision {
            Decision::Confirmed => {
                call.transition_to(CallState::Confirmed)?;
                call.transition_to(CallState::Completed)?;
            }
            Decision::Denied => {
                call.transition_to(CallState::Denied)?;
            }
            Decision::Unrecognized => {
                call.transition_to(CallState::Unrecognized)?;
                call.transition_to(CallState::Completed)?;
            }
        }
        call.provider_call_ref = None;

        tracing::info!(
            call_id = %call.id,
            decision = %decision,
            attempt = call.attempt_count,
            "gather result classified"
        );
        Ok(decision)
    }

    /// No input arrived inside the gather window.
    ///
    /// Same terminal branch as an unrecognized answer: the patient is
    /// directed to a caregiver. Stale once the call has moved on, which
    /// covers a timer racing a just-processed response.
    pub fn on_timeout(&self, call: &mut ReminderCall) -> Result<(), FlowError> {
        if call.state != CallState::AwaitingResponse {
            return Err(FlowError::StaleCallback {
                call_id: call.id.clone(),
                state: call.state,
            });
        }

        call.decision = Some(Decision::Unrecognized);
        call.transition_to(CallState::Unrecognized)?;
        call.transition_to(CallState::Completed)?;
        call.provider_call_ref = None;
        tracing::info!(call_id = %call.id, "gather window elapsed with no input");
        Ok(())
    }

    /// The provider reported the call leg failed, was busy, or went unanswered.
    ///
    /// Any non-terminal state moves to `Failed -> Completed` with the reason
    /// recorded; terminal calls yield a stale no-op.
    pub fn on_provider_failure(
        &self,
        call: &mut ReminderCall,
        reason: &str,
    ) -> Result<(), FlowError> {
        if call.state.is_terminal() {
            return Err(FlowError::StaleCallback {
                call_id: call.id.clone(),
                state: call.state,
            });
        }

        call.failure_reason = Some(reason.to_string());
        call.provider_call_ref = None;
        call.transition_to(CallState::Failed)?;
        call.transition_to(CallState::Completed)?;
        tracing::warn!(call_id = %call.id, reason, "provider reported failure");
        Ok(())
    }
}
