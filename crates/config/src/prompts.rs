//! Spoken prompt catalog
//!
//! Every fixed string the patient hears lives here, keyed by outcome, so new
//! phrasings or languages can be added without touching the state machine.
//! The patient always hears a definitive closing statement before hangup.

use serde::{Deserialize, Serialize};

use medcall_core::Decision;

/// Placeholder replaced with the medicine label in the greeting.
const MEDICINE_SLOT: &str = "{medicine}";
/// Placeholder replaced with the follow-up delay in the retry notice.
const MINUTES_SLOT: &str = "{minutes}";

/// Fixed spoken strings, one per call-flow outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptCatalog {
    /// Played when the call connects; contains the `{medicine}` slot
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Closing after a confirmed response
    #[serde(default = "default_confirmed")]
    pub confirmed: String,

    /// Closing after a denial when a follow-up will be placed; contains the
    /// `{minutes}` slot
    #[serde(default = "default_denied_retry")]
    pub denied_retry: String,

    /// Closing after a denial once the attempt cap is reached
    #[serde(default = "default_denied_escalate")]
    pub denied_escalate: String,

    /// Closing after an answer that could not be understood
    #[serde(default = "default_unrecognized")]
    pub unrecognized: String,

    /// Closing when the gather window elapses with no input
    #[serde(default = "default_no_input")]
    pub no_input: String,

    /// Closing when the service cannot correlate or process the call
    #[serde(default = "default_unavailable")]
    pub unavailable: String,
}

fn default_greeting() -> String {
    "Hello! This is your medication reminder. Have you taken your {medicine}? \
     Press 1 if yes, press 2 if no, or say yes or no."
        .to_string()
}

fn default_confirmed() -> String {
    "Great! Thank you for taking your medication. Have a wonderful day!".to_string()
}

fn default_denied_retry() -> String {
    "Please take your medication now. I'll call again in {minutes} minutes to check.".to_string()
}

fn default_denied_escalate() -> String {
    "Please take your medication now and contact your caregiver for help.".to_string()
}

fn default_unrecognized() -> String {
    "I didn't understand your response. Please contact your caregiver.".to_string()
}

fn default_no_input() -> String {
    "I didn't receive a response. Please call your caregiver.".to_string()
}

fn default_unavailable() -> String {
    "The reminder service is temporarily unavailable. Please contact your caregiver.".to_string()
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            confirmed: default_confirmed(),
            denied_retry: default_denied_retry(),
            denied_escalate: default_denied_escalate(),
            unrecognized: default_unrecognized(),
            no_input: default_no_input(),
            unavailable: default_unavailable(),
        }
    }
}

impl PromptCatalog {
    /// Render the greeting for a specific medicine.
    pub fn greeting_for(&self, medicine: &str) -> String {
        self.greeting.replace(MEDICINE_SLOT, medicine)
    }

    /// Render the retry notice for the configured follow-up delay.
    pub fn denied_retry_for(&self, delay_secs: u64) -> String {
        let minutes = (delay_secs.max(60) / 60).to_string();
        self.denied_retry.replace(MINUTES_SLOT, &minutes)
    }

    /// Map a classified decision to its closing statement.
    ///
    /// `will_retry` selects between the retry notice and the escalation
    /// closing for a denial.
    pub fn decision_prompt(&self, decision: Decision, will_retry: bool, delay_secs: u64) -> String {
        match decision {
            Decision::Confirmed => self.confirmed.clone(),
            Decision::Denied if will_retry => self.denied_retry_for(delay_secs),
            Decision::Denied => self.denied_escalate.clone(),
            Decision::Unrecognized => self.unrecognized.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_interpolates_medicine() {
        let catalog = PromptCatalog::default();
        let greeting = catalog.greeting_for("Metformin");
        assert!(greeting.contains("Metformin"));
        assert!(!greeting.contains(MEDICINE_SLOT));
    }

    #[test]
    fn test_retry_notice_interpolates_minutes() {
        let catalog = PromptCatalog::default();
        assert!(catalog.denied_retry_for(300).contains("5 minutes"));
        assert!(catalog.denied_retry_for(600).contains("10 minutes"));
        // Sub-minute delays round up to one minute
        assert!(catalog.denied_retry_for(10).contains("1 minutes"));
    }

    #[test]
    fn test_decision_prompts() {
        let catalog = PromptCatalog::default();
        assert_eq!(
            catalog.decision_prompt(Decision::Confirmed, false, 300),
            catalog.confirmed
        );
        assert!(catalog
            .decision_prompt(Decision::Denied, true, 300)
            .contains("call again"));
        assert_eq!(
            catalog.decision_prompt(Decision::Denied, false, 300),
            catalog.denied_escalate
        );
        assert_eq!(
            catalog.decision_prompt(Decision::Unrecognized, false, 300),
            catalog.unrecognized
        );
    }
}
