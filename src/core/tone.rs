//! Emotion-label to tone-descriptor mapping.
//!
//! The telephony stream may carry a detected emotion label on transcript
//! frames. `tone_for` translates that label into a free-text delivery
//! instruction folded into the system prompt, so the assistant's voice
//! matches the caller's state. Pure and total: matching is case-insensitive
//! and anything unrecognized (including empty input) maps to the default.

/// Tone instruction used when the label is unknown, absent, or neutral.
pub const DEFAULT_TONE: &str = "calm, warm and professional";

/// Map an emotion label to a tone descriptor.
pub fn tone_for(emotion: &str) -> &'static str {
    match emotion.trim().to_lowercase().as_str() {
        "neutral" => DEFAULT_TONE,
        "happy" | "excited" | "joyful" => "upbeat and friendly, matching the caller's energy",
        "sad" | "disappointed" => "gentle, patient and sympathetic",
        "angry" | "frustrated" | "annoyed" => {
            "calm, apologetic and de-escalating, acknowledging the caller's frustration"
        }
        "anxious" | "worried" | "nervous" => "reassuring, steady and unhurried",
        "confused" => "clear and slow, explaining one thing at a time",
        "urgent" | "hurried" => "brisk and efficient while staying polite",
        _ => DEFAULT_TONE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_labels() {
        assert!(tone_for("happy").contains("upbeat"));
        assert!(tone_for("sad").contains("sympathetic"));
        assert!(tone_for("angry").contains("de-escalating"));
        assert!(tone_for("anxious").contains("reassuring"));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(tone_for("HAPPY"), tone_for("happy"));
        assert_eq!(tone_for("Frustrated"), tone_for("frustrated"));
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(tone_for("  excited  "), tone_for("excited"));
    }

    #[test]
    fn test_unknown_and_empty_use_default() {
        assert_eq!(tone_for("bewildered-ish"), DEFAULT_TONE);
        assert_eq!(tone_for(""), DEFAULT_TONE);
        assert_eq!(tone_for("neutral"), DEFAULT_TONE);
    }

    #[test]
    fn test_idempotent() {
        assert_eq!(tone_for("sad"), tone_for("sad"));
    }
}
