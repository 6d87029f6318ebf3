//! System-prompt assembly for one turn.

use crate::core::intent::IntentTag;

/// Compose the system prompt for a turn from the configured persona, the
/// tone instruction for the caller's current emotion, and any
/// intent-specific steering. The persona always comes first.
pub fn build_system_prompt(persona: &str, tone: &str, intent: IntentTag) -> String {
    let mut prompt = String::with_capacity(persona.len() + 128);
    prompt.push_str(persona.trim());
    prompt.push_str("\n\nSpeak in a tone that is ");
    prompt.push_str(tone);
    prompt.push('.');
    if let Some(guidance) = intent.guidance() {
        prompt.push_str("\n\n");
        prompt.push_str(guidance);
    }
    prompt
}
