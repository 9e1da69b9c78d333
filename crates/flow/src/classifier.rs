//! Patient response classification
//!
//! Maps raw gather input (a keypad digit and/or a speech transcript) to a
//! binary decision. Pure function of its inputs.

use medcall_core::Decision;

/// Keypad digit meaning "yes".
const CONFIRM_DIGIT: &str = "1";
/// Keypad digit meaning "no".
const DENY_DIGIT: &str = "2";

const POSITIVE_WORDS: &[&str] = &["yes", "yeah", "yep", "ok", "okay", "taken", "done"];
const NEGATIVE_WORDS: &[&str] = &["no", "not", "nope", "haven't", "didn't"];

/// Classifies gather results into [`Decision`]s.
///
/// Word sets are data on the classifier so phrasings can be extended without
/// touching the matching logic.
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    positive: Vec<String>,
    negative: Vec<String>,
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseClassifier {
    /// Create a classifier with the default yes/no word sets.
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().map(|w| w.to_string()).collect(),
            negative: NEGATIVE_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }

    /// Create a classifier with custom word sets (lower-cased for matching).
    pub fn with_word_sets(
        positive: impl IntoIterator<Item = String>,
        negative: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            positive: positive.into_iter().map(|w| w.to_lowercase()).collect(),
            negative: negative.into_iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Classify a gather result.
    ///
    /// Priority order: the keypad digits "1"/"2" are authoritative and win
    /// over any transcript; any other digit falls through to transcript
    /// matching. Transcript matching is plain lower-cased substring
    /// containment, positive set checked first — "not" also matches inside
    /// "notable". Absent or empty input yields `Unrecognized`.
    pub fn classify(&self, digits: Option<&str>, transcript: Option<&str>) -> Decision {
        match digits {
            Some(CONFIRM_DIGIT) => return Decision::Confirmed,
            Some(DENY_DIGIT) => return Decision::Denied,
            _ => {}
        }

        let Some(transcript) = transcript else {
            return Decision::Unrecognized;
        };
        let lowered = transcript.to_lowercase();

        if self.positive.iter().any(|word| lowered.contains(word.as_str())) {
            return Decision::Confirmed;
        }
        if self.negative.iter().any(|word| lowered.contains(word.as_str())) {
            return Decision::Denied;
        }

        Decision::Unrecognized
    }
}
