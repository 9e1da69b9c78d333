//! Reminder orchestration
//!
//! Owns everything around the state machine: initiation and validation,
//! callback URL construction, the gather-window timer, and the follow-up
//! policy after a denial. The machine decides transitions; the orchestrator
//! decides what happens next and what the patient hears.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use medcall_config::{PromptCatalog, ReminderConfig, Settings};
use medcall_core::{CallId, CallState, Decision, ReminderCall};
use medcall_flow::CallFlow;
use medcall_telephony::{CallGateway, StatusCallback, VoiceResponse};

use crate::metrics;
use crate::registry::{CallRegistry, SharedCall};
use crate::ServerError;

/// Destination numbers: optional `+`, 7-15 digits.
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone pattern compiles"));

/// Result of a successful initiation.
#[derive(Debug, Clone)]
pub struct StartedReminder {
    pub call_id: CallId,
    pub provider_ref: String,
    pub phone_number: String,
}

/// Drives reminder calls end to end.
pub struct ReminderOrchestrator {
    registry: Arc<CallRegistry>,
    gateway: Arc<dyn CallGateway>,
    flow: CallFlow,
    prompts: Arc<PromptCatalog>,
    config: ReminderConfig,
    voice: String,
    public_base_url: String,
}

impl ReminderOrchestrator {
    pub fn new(
        settings: &Settings,
        registry: Arc<CallRegistry>,
        gateway: Arc<dyn CallGateway>,
        prompts: Arc<PromptCatalog>,
    ) -> Self {
        Self {
            registry,
            gateway,
            flow: CallFlow::new(),
            prompts,
            config: settings.reminder.clone(),
            voice: settings.provider.voice.clone(),
            public_base_url: settings
                .server
                .public_base_url
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn registry(&self) -> &Arc<CallRegistry> {
        &self.registry
    }

    /// Validate the request, register the call and place the first attempt.
    pub async fn start_reminder(
        self: &Arc<Self>,
        phone_number: &str,
        medicine_name: Option<String>,
    ) -> Result<StartedReminder, ServerError> {
        let phone_number = phone_number.trim();
        if phone_number.is_empty() {
            return Err(ServerError::InvalidRequest(
                "Phone number is required".to_string(),
            ));
        }
        if !PHONE_PATTERN.is_match(phone_number) {
            return Err(ServerError::InvalidRequest(format!(
                "Not a valid phone number: {phone_number}"
            )));
        }

        let call = ReminderCall::new(phone_number, medicine_name);
        let call_id = call.id.clone();
        let entry = self.registry.insert(call)?;

        let provider_ref = self.dial(&entry, &call_id).await?;
        metrics::record_call_started();

        Ok(StartedReminder {
            call_id,
            provider_ref,
            phone_number: phone_number.to_string(),
        })
    }

    /// Place the call leg for the current attempt and mark the record dialed.
    ///
    /// A placement failure marks this attempt `Failed -> Completed`; the
    /// error is surfaced but never retried automatically.
    async fn dial(&self, entry: &SharedCall, call_id: &CallId) -> Result<String, ServerError> {
        let (phone_number, medicine_name) = {
            let call = entry.lock();
            (call.phone_number.clone(), call.medicine_name.clone())
        };

        let voice_url = self.callback_url(
            "/voice-webhook",
            &[
                ("call", call_id.as_str()),
                ("medicine", medicine_name.as_str()),
            ],
        )?;
        let status_url = self.callback_url("/call-status", &[("call", call_id.as_str())])?;

        match self
            .gateway
            .place_call(&phone_number, &voice_url, &status_url)
            .await
        {
            Ok(provider_ref) => {
                let mut call = entry.lock();
                if let Err(err) = self.flow.on_dialed(&mut call, provider_ref.clone()) {
                    // The call moved on while the leg was being placed; the
                    // stray leg will hear the unavailable closing.
                    tracing::warn!(%call_id, %err, "call advanced during placement");
                }
                Ok(provider_ref)
            }
            Err(err) => {
                tracing::error!(%call_id, %err, "call placement failed");
                let mut call = entry.lock();
                if let Err(flow_err) = self.flow.on_provider_failure(&mut call, &err.to_string()) {
                    tracing::debug!(%call_id, %flow_err, "placement failure on settled call");
                }
                metrics::record_provider_failure();
                Err(ServerError::Provider(err))
            }
        }
    }

    fn callback_url(&self, path: &str, params: &[(&str, &str)]) -> Result<String, ServerError> {
        let base = format!("{}{}", self.public_base_url, path);
        let url = reqwest::Url::parse_with_params(&base, params)
            .map_err(|err| ServerError::Internal(format!("bad callback URL {base}: {err}")))?;
        Ok(url.to_string())
    }

    /// The provider answered and is fetching the voice document.
    ///
    /// Marks the prompt delivered, arms the gather-window timer and returns
    /// the greeting markup. A re-fetch while already awaiting input serves
    /// the same document again; anything else gets the unavailable closing.
    pub fn deliver_prompt(self: &Arc<Self>, call_id: &CallId) -> String {
        let Some(entry) = self.registry.get(call_id) else {
            tracing::warn!(%call_id, "voice webhook for unknown call");
            return self.unavailable_closing();
        };

        let greeting = {
            let mut call = entry.lock();
            if call.state == CallState::AwaitingResponse {
                self.prompts.greeting_for(&call.medicine_name)
            } else {
                match self.flow.on_prompt_delivered(&mut call) {
                    Ok(()) => self.prompts.greeting_for(&call.medicine_name),
                    Err(err) => {
                        tracing::warn!(%call_id, %err, "prompt fetch in unexpected state");
                        return self.unavailable_closing();
                    }
                }
            }
        };

        self.arm_gather_timeout(call_id.clone());

        let action_url = match self.callback_url("/handle-response", &[("call", call_id.as_str())])
        {
            Ok(url) => url,
            Err(err) => {
                tracing::error!(%call_id, %err, "could not build gather action URL");
                return self.unavailable_closing();
            }
        };

        VoiceResponse::reminder_prompt(
            &greeting,
            &action_url,
            self.config.gather_timeout_secs,
            &self.voice,
            &self.prompts.no_input,
        )
    }

    /// A gather result arrived: classify, apply the follow-up policy and
    /// return the closing the patient hears.
    pub fn handle_response(
        self: &Arc<Self>,
        call_id: &CallId,
        digits: Option<&str>,
        transcript: Option<&str>,
    ) -> String {
        let Some(entry) = self.registry.get(call_id) else {
            tracing::warn!(%call_id, "gather callback for unknown call");
            return self.unavailable_closing();
        };

        let mut schedule_follow_up = false;
        let closing = {
            let mut call = entry.lock();
            match self.flow.on_response(&mut call, digits, transcript) {
                Ok(decision) => {
                    metrics::record_decision(decision);
                    let will_retry = decision == Decision::Denied
                        && call.attempt_count < self.config.max_attempts;

                    if decision == Decision::Denied {
                        if will_retry {
                            if call.transition_to(CallState::FollowUpScheduled).is_ok() {
                                schedule_follow_up = true;
                            }
                        } else if call.transition_to(CallState::Completed).is_ok() {
                            tracing::info!(
                                %call_id,
                                attempts = call.attempt_count,
                                "attempt cap reached, escalating to caregiver"
                            );
                        }
                    }

                    self.prompts.decision_prompt(
                        decision,
                        will_retry,
                        self.config.follow_up_delay_secs,
                    )
                }
                Err(err) if err.is_stale() => {
                    // Duplicate or late webhook: repeat the closing the
                    // patient already heard, touch nothing.
                    tracing::debug!(%call_id, "stale gather callback acknowledged");
                    match call.decision {
                        Some(decision) => self.prompts.decision_prompt(
                            decision,
                            call.state == CallState::FollowUpScheduled,
                            self.config.follow_up_delay_secs,
                        ),
                        None => self.prompts.unavailable.clone(),
                    }
                }
                Err(err) => {
                    tracing::error!(%call_id, %err, "gather callback violated the call flow");
                    if !call.state.is_terminal() {
                        let _ = call.transition_to(CallState::Failed);
                        let _ = call.transition_to(CallState::Completed);
                    }
                    self.prompts.unavailable.clone()
                }
            }
        };

        if schedule_follow_up {
            metrics::record_follow_up_scheduled();
            self.schedule_follow_up(call_id.clone());
        }

        VoiceResponse::closing(&closing, &self.voice)
    }

    /// Map a provider status update onto the call flow. Idempotent,
    /// side-effect-only; unknown or stale legs are ignored.
    pub fn handle_status(&self, call_id: &CallId, callback: &StatusCallback) {
        if !callback.is_failure() {
            tracing::debug!(
                %call_id,
                provider_ref = %callback.call_sid,
                status = %callback.call_status,
                "call status update"
            );
            return;
        }

        let Some(entry) = self.registry.get(call_id) else {
            tracing::warn!(%call_id, "status callback for unknown call");
            return;
        };

        let mut call = entry.lock();
        match &call.provider_call_ref {
            // The ref is only live while its attempt is dialing or awaiting
            // input; anything else is a leftover from an earlier leg.
            None => {
                tracing::debug!(%call_id, "status callback for settled attempt");
                return;
            }
            Some(current) if current != &callback.call_sid => {
                tracing::debug!(
                    %call_id,
                    provider_ref = %callback.call_sid,
                    "status callback for superseded leg"
                );
                return;
            }
            Some(_) => {}
        }

        match self.flow.on_provider_failure(&mut call, &callback.call_status) {
            Ok(()) => metrics::record_provider_failure(),
            Err(err) if err.is_stale() => {
                tracing::debug!(%call_id, "failure status on settled call");
            }
            Err(err) => {
                tracing::error!(%call_id, %err, "status callback violated the call flow");
            }
        }
    }

    /// Arm the gather-window timer for a just-delivered prompt.
    ///
    /// The window gets extra slack so a response webhook in flight wins the
    /// race against the timer.
    fn arm_gather_timeout(self: &Arc<Self>, call_id: CallId) {
        let orchestrator = Arc::clone(self);
        let window = Duration::from_secs(
            self.config.gather_timeout_secs + self.config.timeout_slack_secs,
        );

        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            orchestrator.fire_gather_timeout(&call_id);
        });
    }

    /// Raise the timeout event if the call is still waiting for input.
    pub fn fire_gather_timeout(&self, call_id: &CallId) {
        let Some(entry) = self.registry.get(call_id) else {
            return;
        };

        let mut call = entry.lock();
        match self.flow.on_timeout(&mut call) {
            Ok(()) => {
                metrics::record_decision(Decision::Unrecognized);
                tracing::info!(%call_id, "no response within the gather window");
            }
            Err(err) if err.is_stale() => {
                tracing::debug!(%call_id, "gather timer fired after the call settled");
            }
            Err(err) => {
                tracing::error!(%call_id, %err, "gather timer violated the call flow");
            }
        }
    }

    /// Schedule the follow-up attempt after the configured delay.
    fn schedule_follow_up(self: &Arc<Self>, call_id: CallId) {
        let orchestrator = Arc::clone(self);
        let delay = Duration::from_secs(self.config.follow_up_delay_secs);

        tracing::info!(%call_id, delay_secs = delay.as_secs(), "follow-up scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = orchestrator.fire_follow_up(&call_id).await {
                tracing::error!(%call_id, %err, "follow-up attempt failed");
            }
        });
    }

    /// Place the follow-up attempt, re-checking state at fire time: a call
    /// that is no longer `FollowUpScheduled` (completed, failed, evicted)
    /// cancels the attempt.
    pub async fn fire_follow_up(self: &Arc<Self>, call_id: &CallId) -> Result<(), ServerError> {
        let Some(entry) = self.registry.get(call_id) else {
            tracing::debug!(%call_id, "follow-up cancelled: call evicted");
            return Ok(());
        };

        {
            let call = entry.lock();
            if call.state != CallState::FollowUpScheduled {
                tracing::debug!(%call_id, state = %call.state, "follow-up cancelled");
                return Ok(());
            }
        }

        let provider_ref = self.dial(&entry, call_id).await?;
        metrics::record_call_started();
        tracing::info!(%call_id, %provider_ref, "follow-up attempt placed");
        Ok(())
    }

    /// Closing served when a webhook cannot be correlated or processed.
    pub fn unavailable_closing(&self) -> String {
        VoiceResponse::closing(&self.prompts.unavailable, &self.voice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use medcall_telephony::TelephonyError;

    #[derive(Default)]
    struct MockGateway {
        placed: Mutex<Vec<(String, String, String)>>,
        fail: bool,
    }

    impl MockGateway {
        fn failing() -> Self {
            Self {
                placed: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn placed_count(&self) -> usize {
            self.placed.lock().len()
        }
    }

    #[async_trait]
    impl CallGateway for MockGateway {
        async fn place_call(
            &self,
            to: &str,
            voice_url: &str,
            status_url: &str,
        ) -> Result<String, TelephonyError> {
            if self.fail {
                return Err(TelephonyError::Api {
                    status: 401,
                    body: "authentication failed".to_string(),
                });
            }
            let mut placed = self.placed.lock();
            placed.push((
                to.to_string(),
                voice_url.to_string(),
                status_url.to_string(),
            ));
            Ok(format!("CA{:03}", placed.len()))
        }
    }

    fn orchestrator_with(
        gateway: Arc<MockGateway>,
        max_attempts: u32,
    ) -> Arc<ReminderOrchestrator> {
        let mut settings = Settings::default();
        settings.reminder.max_attempts = max_attempts;

        Arc::new(ReminderOrchestrator::new(
            &settings,
            Arc::new(CallRegistry::new(10)),
            gateway,
            Arc::new(PromptCatalog::default()),
        ))
    }

    fn state_of(orchestrator: &Arc<ReminderOrchestrator>, call_id: &CallId) -> CallState {
        orchestrator.registry().get(call_id).unwrap().lock().state
    }

    #[tokio::test]
    async fn test_start_reminder_places_call_and_dials() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway.clone(), 3);

        let started = orchestrator
            .start_reminder("+15551234567", Some("Metformin".to_string()))
            .await
            .unwrap();

        assert_eq!(started.provider_ref, "CA001");
        assert_eq!(state_of(&orchestrator, &started.call_id), CallState::Dialing);

        let placed = gateway.placed.lock();
        let (to, voice_url, status_url) = &placed[0];
        assert_eq!(to, "+15551234567");
        assert!(voice_url.contains(started.call_id.as_str()));
        assert!(voice_url.contains("medicine=Metformin"));
        assert!(status_url.contains("/call-status"));
    }

    #[tokio::test]
    async fn test_start_reminder_rejects_bad_phone_numbers() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway.clone(), 3);

        for phone in ["", "   ", "not-a-number", "+1 555"] {
            let err = orchestrator.start_reminder(phone, None).await.unwrap_err();
            assert!(matches!(err, ServerError::InvalidRequest(_)), "phone: {phone:?}");
        }

        // No provider call placed, nothing registered
        assert_eq!(gateway.placed_count(), 0);
        assert_eq!(orchestrator.registry().count(), 0);
    }

    #[tokio::test]
    async fn test_placement_failure_marks_attempt_failed() {
        let gateway = Arc::new(MockGateway::failing());
        let orchestrator = orchestrator_with(gateway, 3);

        let err = orchestrator
            .start_reminder("+15551234567", None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Provider(_)));

        // The record is terminal with the reason kept
        assert_eq!(orchestrator.registry().count(), 1);
        let call_id = orchestrator.registry().list().remove(0);
        let entry = orchestrator.registry().get(&call_id).unwrap();
        let call = entry.lock();
        assert_eq!(call.state, CallState::Completed);
        assert!(call.failure_reason.is_some());
    }

    #[tokio::test]
    async fn test_confirmed_scenario_runs_to_completed() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway, 3);

        let started = orchestrator
            .start_reminder("+15551234567", Some("Metformin".to_string()))
            .await
            .unwrap();

        let twiml = orchestrator.deliver_prompt(&started.call_id);
        assert!(twiml.contains("Metformin"));
        assert!(twiml.contains("<Gather"));
        assert_eq!(
            state_of(&orchestrator, &started.call_id),
            CallState::AwaitingResponse
        );

        let closing = orchestrator.handle_response(&started.call_id, Some("1"), None);
        assert!(closing.contains("Thank you for taking your medication"));
        assert_eq!(
            state_of(&orchestrator, &started.call_id),
            CallState::Completed
        );
    }

    #[tokio::test]
    async fn test_denied_scenario_schedules_follow_up() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway.clone(), 3);

        let started = orchestrator
            .start_reminder("+15551234567", None)
            .await
            .unwrap();
        orchestrator.deliver_prompt(&started.call_id);

        let closing =
            orchestrator.handle_response(&started.call_id, None, Some("no I haven't"));
        assert!(closing.contains("call again in 5 minutes"));
        assert_eq!(
            state_of(&orchestrator, &started.call_id),
            CallState::FollowUpScheduled
        );

        // Fire the scheduled attempt directly
        orchestrator.fire_follow_up(&started.call_id).await.unwrap();
        assert_eq!(state_of(&orchestrator, &started.call_id), CallState::Dialing);
        assert_eq!(gateway.placed_count(), 2);

        let entry = orchestrator.registry().get(&started.call_id).unwrap();
        assert_eq!(entry.lock().attempt_count, 2);
    }

    #[tokio::test]
    async fn test_follow_up_cap_escalates_instead_of_retrying() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway.clone(), 2);

        let started = orchestrator
            .start_reminder("+15551234567", None)
            .await
            .unwrap();

        // Attempt 1: denied, follow-up scheduled
        orchestrator.deliver_prompt(&started.call_id);
        orchestrator.handle_response(&started.call_id, Some("2"), None);
        orchestrator.fire_follow_up(&started.call_id).await.unwrap();

        // Attempt 2: denied again, cap reached
        orchestrator.deliver_prompt(&started.call_id);
        let closing = orchestrator.handle_response(&started.call_id, Some("2"), None);
        assert!(closing.contains("contact your caregiver"));
        assert_eq!(
            state_of(&orchestrator, &started.call_id),
            CallState::Completed
        );

        // No third attempt is ever placed
        orchestrator.fire_follow_up(&started.call_id).await.unwrap();
        assert_eq!(gateway.placed_count(), 2);
    }

    #[tokio::test]
    async fn test_unrecognized_response_directs_to_caregiver() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway, 3);

        let started = orchestrator
            .start_reminder("+15551234567", None)
            .await
            .unwrap();
        orchestrator.deliver_prompt(&started.call_id);

        let closing =
            orchestrator.handle_response(&started.call_id, None, Some("maybe later"));
        assert!(closing.contains("contact your caregiver"));
        assert_eq!(
            state_of(&orchestrator, &started.call_id),
            CallState::Completed
        );
    }

    #[tokio::test]
    async fn test_duplicate_gather_callback_repeats_closing() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway, 3);

        let started = orchestrator
            .start_reminder("+15551234567", None)
            .await
            .unwrap();
        orchestrator.deliver_prompt(&started.call_id);

        let first = orchestrator.handle_response(&started.call_id, Some("1"), None);
        let second = orchestrator.handle_response(&started.call_id, Some("1"), None);
        assert_eq!(first, second);
        assert_eq!(
            state_of(&orchestrator, &started.call_id),
            CallState::Completed
        );
    }

    #[tokio::test]
    async fn test_gather_timeout_completes_as_unrecognized() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway, 3);

        let started = orchestrator
            .start_reminder("+15551234567", None)
            .await
            .unwrap();
        orchestrator.deliver_prompt(&started.call_id);

        orchestrator.fire_gather_timeout(&started.call_id);
        let entry = orchestrator.registry().get(&started.call_id).unwrap();
        let call = entry.lock();
        assert_eq!(call.state, CallState::Completed);
        assert_eq!(call.decision, Some(Decision::Unrecognized));
    }

    #[tokio::test]
    async fn test_follow_up_cancelled_when_call_settles_first() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway.clone(), 3);

        let started = orchestrator
            .start_reminder("+15551234567", None)
            .await
            .unwrap();
        orchestrator.deliver_prompt(&started.call_id);
        orchestrator.handle_response(&started.call_id, Some("2"), None);

        // Caregiver resolves the reminder before the timer fires
        {
            let entry = orchestrator.registry().get(&started.call_id).unwrap();
            entry.lock().transition_to(CallState::Completed).unwrap();
        }

        orchestrator.fire_follow_up(&started.call_id).await.unwrap();
        assert_eq!(gateway.placed_count(), 1);
        assert_eq!(
            state_of(&orchestrator, &started.call_id),
            CallState::Completed
        );
    }

    #[tokio::test]
    async fn test_status_callback_failure_mapping() {
        let gateway = Arc::new(MockGateway::default());
        let orchestrator = orchestrator_with(gateway, 3);

        let started = orchestrator
            .start_reminder("+15551234567", None)
            .await
            .unwrap();

        // A status for some other leg is ignored
        orchestrator.handle_status(
            &started.call_id,
            &StatusCallback {
                call_sid: "CA999".to_string(),
                call_status: "failed".to_string(),
                call_duration: None,
            },
        );
        assert_eq!(state_of(&orchestrator, &started.call_id), CallState::Dialing);

        // The live leg failing settles the call
        orchestrator.handle_status(
            &started.call_id,
            &StatusCallback {
                call_sid: started.provider_ref.clone(),
                call_status: "no-answer".to_string(),
                call_duration: None,
            },
        );
        let entry = orchestrator.registry().get(&started.call_id).unwrap();
        let call = entry.lock();
        assert_eq!(call.state, CallState::Completed);
        assert_eq!(call.failure_reason.as_deref(), Some("no-answer"));
    }
}
