//! Decision produced by classifying a patient response

use serde::{Deserialize, Serialize};

/// Outcome of classifying a keypress or speech transcript.
///
/// `Unrecognized` is a defined outcome, not an error: the call flow treats it
/// as a terminal branch that directs the patient to a human caregiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Medication was taken
    Confirmed,
    /// Medication was not taken
    Denied,
    /// Input was absent or could not be mapped to yes/no
    Unrecognized,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Confirmed => "confirmed",
            Decision::Denied => "denied",
            Decision::Unrecognized => "unrecognized",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
