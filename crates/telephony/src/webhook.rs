//! Webhook payloads posted by the provider
//!
//! Deserialized once at the HTTP boundary; handlers work with these typed
//! structs, never with raw form fields.

use serde::Deserialize;

/// Gather result posted after the patient presses a key or speaks.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GatherResult {
    /// Provider identifier of the call leg
    pub call_sid: Option<String>,
    /// Keypad digits, when the patient pressed a key
    pub digits: Option<String>,
    /// Speech transcript, when the patient spoke
    pub speech_result: Option<String>,
    /// Transcription confidence (0.0 to 1.0)
    pub confidence: Option<f64>,
}

/// Call status update posted as the leg progresses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusCallback {
    /// Provider identifier of the call leg
    pub call_sid: String,
    /// Leg status: queued, ringing, in-progress, completed, failed, busy, no-answer, canceled
    pub call_status: String,
    /// Duration in seconds, present once the leg ends
    pub call_duration: Option<u32>,
}

impl StatusCallback {
    /// Statuses meaning the leg ended without a conversation.
    pub fn is_failure(&self) -> bool {
        matches!(
            self.call_status.as_str(),
            "failed" | "busy" | "no-answer" | "canceled"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_result_pascal_case_fields() {
        let form = "CallSid=CA123&Digits=1&SpeechResult=yes";
        let result: GatherResult = serde_urlencoded_from_str(form);
        assert_eq!(result.call_sid.as_deref(), Some("CA123"));
        assert_eq!(result.digits.as_deref(), Some("1"));
        assert_eq!(result.speech_result.as_deref(), Some("yes"));
        assert!(result.confidence.is_none());
    }

    #[test]
    fn test_status_failure_mapping() {
        for status in ["failed", "busy", "no-answer", "canceled"] {
            let callback = StatusCallback {
                call_sid: "CA123".to_string(),
                call_status: status.to_string(),
                call_duration: None,
            };
            assert!(callback.is_failure(), "status: {status}");
        }

        let callback = StatusCallback {
            call_sid: "CA123".to_string(),
            call_status: "completed".to_string(),
            call_duration: Some(14),
        };
        assert!(!callback.is_failure());
    }

    fn serde_urlencoded_from_str(form: &str) -> GatherResult {
        let pairs: Vec<(String, String)> = form
            .split('&')
            .filter_map(|pair| {
                let (key, value) = pair.split_once('=')?;
                Some((key.to_string(), value.to_string()))
            })
            .collect();
        let json = serde_json::Map::from_iter(
            pairs
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::String(v))),
        );
        serde_json::from_value(serde_json::Value::Object(json)).unwrap()
    }
}
