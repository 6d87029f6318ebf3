//! Keyword-rule intent classification for caller turns.
//!
//! `classify` is a pure function: the same input always yields the same tag.
//! Rules are an ordered list of patterns and the first match wins;
//! scheduling keywords are checked before info keywords before greetings, so
//! "hi, I'd like to book an appointment" classifies as scheduling, not a
//! greeting. This is a policy seam; callers may substitute a model-based
//! classifier without changing the contract.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Intent tag for one caller turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentTag {
    ScheduleInterview,
    Info,
    Greeting,
    Unknown,
}

impl std::fmt::Display for IntentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentTag::ScheduleInterview => write!(f, "schedule_interview"),
            IntentTag::Info => write!(f, "info"),
            IntentTag::Greeting => write!(f, "greeting"),
            IntentTag::Unknown => write!(f, "unknown"),
        }
    }
}

impl IntentTag {
    /// Extra prompt guidance for this intent, appended to the system prompt
    /// when building the inference request. `None` means no extra steering.
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            IntentTag::ScheduleInterview => Some(
                "The caller wants to schedule an interview or appointment. \
                 Collect their name, preferred date and time, and a callback \
                 number, confirming each detail back to them.",
            ),
            IntentTag::Info => Some(
                "The caller is asking for information. Answer concisely and \
                 offer to help with anything else.",
            ),
            IntentTag::Greeting => Some(
                "The caller is greeting you. Greet them back warmly and ask \
                 how you can help.",
            ),
            IntentTag::Unknown => None,
        }
    }
}

/// Ordered rule table. First match wins.
static RULES: Lazy<Vec<(IntentTag, Regex)>> = Lazy::new(|| {
    vec![
        (
            IntentTag::ScheduleInterview,
            Regex::new(
                r"(?i)\b(schedul\w*|reschedul\w*|book\w*|appointment\w*|interview\w*|availab\w*|meeting\w*|slot)\b",
            )
            .expect("schedule rule"),
        ),
        (
            IntentTag::Info,
            Regex::new(
                r"(?i)\b(hours?|open(ing)?|close[sd]?|pric\w*|cost\w*|fees?|rates?|address|location|directions?|information|info|question)\b",
            )
            .expect("info rule"),
        ),
        (
            IntentTag::Greeting,
            Regex::new(r"(?i)\b(hi|hello|hey|howdy|good\s+(morning|afternoon|evening))\b")
                .expect("greeting rule"),
        ),
    ]
});

/// Classify a caller turn into an [`IntentTag`].
pub fn classify(text: &str) -> IntentTag {
    for (tag, rule) in RULES.iter() {
        if rule.is_match(text) {
            return *tag;
        }
    }
    IntentTag::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_keywords() {
        assert_eq!(
            classify("I'd like to book an appointment"),
            IntentTag::ScheduleInterview
        );
        assert_eq!(
            classify("can we schedule the interview for Tuesday?"),
            IntentTag::ScheduleInterview
        );
        assert_eq!(
            classify("what's your availability next week"),
            IntentTag::ScheduleInterview
        );
    }

    #[test]
    fn test_info_keywords() {
        assert_eq!(classify("what are your hours?"), IntentTag::Info);
        assert_eq!(classify("how much does it cost"), IntentTag::Info);
        assert_eq!(classify("where is your location"), IntentTag::Info);
    }

    #[test]
    fn test_greeting_keywords() {
        assert_eq!(classify("hello there"), IntentTag::Greeting);
        assert_eq!(classify("Good morning!"), IntentTag::Greeting);
    }

    #[test]
    fn test_priority_schedule_beats_greeting() {
        // Scheduling keywords are checked first even when a greeting is present.
        assert_eq!(
            classify("hi, I want to book an interview"),
            IntentTag::ScheduleInterview
        );
    }

    #[test]
    fn test_priority_info_beats_greeting() {
        assert_eq!(classify("hello, what are your hours?"), IntentTag::Info);
    }

    #[test]
    fn test_unknown() {
        assert_eq!(classify("the quick brown fox"), IntentTag::Unknown);
        assert_eq!(classify(""), IntentTag::Unknown);
    }

    #[test]
    fn test_idempotent() {
        let text = "I'd like to book an appointment";
        assert_eq!(classify(text), classify(text));
    }

    #[test]
    fn test_display_matches_serde() {
        for tag in [
            IntentTag::ScheduleInterview,
            IntentTag::Info,
            IntentTag::Greeting,
            IntentTag::Unknown,
        ] {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{tag}\""));
        }
    }
}
