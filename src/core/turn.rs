//! Turn accumulation: deciding when buffered caller input forms one turn.
//!
//! A [`TurnBuffer`] is owned by exactly one call session and is only touched
//! from that session's event loop, so it needs no internal locking. Two
//! policies are supported:
//!
//! - [`TurnPolicy::TimeWindow`]: raw audio fragments accumulate and the
//!   buffer flushes when the session's periodic [`TurnBuffer::poll`] observes
//!   that the window has elapsed since the last flush and at least one
//!   fragment has arrived. Pushes never flush by themselves.
//! - [`TurnPolicy::ExplicitFinality`]: pre-transcribed text fragments flush
//!   immediately when one arrives with `is_final = true`; partial fragments
//!   only update the running partial-text view.
//!
//! The detected emotion label is sticky: it defaults to `"neutral"`, is
//! overwritten whenever a frame carries a new label, and survives flushes.

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

/// Default label before any frame reports an emotion.
pub const DEFAULT_EMOTION: &str = "neutral";

/// Flush policy for a call's turn buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPolicy {
    /// Batch audio fragments, flushing once per elapsed window.
    TimeWindow { window: Duration },
    /// Flush on transcript fragments tagged final.
    ExplicitFinality,
}

/// One unit of caller input pushed into the buffer.
#[derive(Debug, Clone)]
pub enum Fragment {
    /// Raw or base64-decoded audio bytes from a media frame.
    Audio(Bytes),
    /// A transcript fragment, final or partial.
    Transcript { text: String, is_final: bool },
}

/// The accumulated content of one complete turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnPayload {
    /// Audio fragments in arrival order. Empty for text-only turns.
    pub audio: Vec<Bytes>,
    /// Finalized transcript text, when the turn came in as text.
    pub text: Option<String>,
    /// Emotion label in effect at flush time.
    pub emotion: String,
}

impl TurnPayload {
    /// Total audio byte length across fragments.
    pub fn audio_len(&self) -> usize {
        self.audio.iter().map(|b| b.len()).sum()
    }
}

/// Outcome of a push or poll.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushDecision {
    /// Input buffered (or ignored); no turn is ready.
    None,
    /// A complete turn is ready for inference.
    Flush(TurnPayload),
}

/// Per-call accumulator deciding when input constitutes a complete turn.
#[derive(Debug)]
pub struct TurnBuffer {
    policy: TurnPolicy,
    audio: Vec<Bytes>,
    partial_text: String,
    emotion: String,
    last_flush: Instant,
}

impl TurnBuffer {
    pub fn new(policy: TurnPolicy) -> Self {
        Self {
            policy,
            audio: Vec::new(),
            partial_text: String::new(),
            emotion: DEFAULT_EMOTION.to_string(),
            last_flush: Instant::now(),
        }
    }

    /// Overwrite the sticky emotion label.
    pub fn set_emotion(&mut self, label: &str) {
        if !label.trim().is_empty() {
            self.emotion = label.trim().to_string();
        }
    }

    /// Current sticky emotion label.
    pub fn emotion(&self) -> &str {
        &self.emotion
    }

    /// True if no fragment has arrived since the last flush.
    pub fn is_empty(&self) -> bool {
        self.audio.is_empty() && self.partial_text.is_empty()
    }

    /// Number of buffered audio fragments.
    pub fn fragment_count(&self) -> usize {
        self.audio.len()
    }

    /// Feed one fragment into the buffer.
    pub fn push(&mut self, fragment: Fragment) -> FlushDecision {
        match fragment {
            Fragment::Audio(bytes) => {
                self.audio.push(bytes);
                // Time-window flushes only happen from poll(); audio arriving
                // under the finality policy waits for a final transcript.
                FlushDecision::None
            }
            Fragment::Transcript { text, is_final } => {
                if is_final {
                    self.flush(Some(text))
                } else {
                    self.partial_text = text;
                    FlushDecision::None
                }
            }
        }
    }

    /// Periodic check from the session event loop.
    ///
    /// Under the time-window policy this flushes when the window has elapsed
    /// since the last flush and at least one fragment is buffered. Under the
    /// finality policy it never flushes.
    pub fn poll(&mut self, now: Instant) -> FlushDecision {
        match self.policy {
            TurnPolicy::TimeWindow { window } => {
                if !self.is_empty() && now.duration_since(self.last_flush) >= window {
                    self.flush(None)
                } else {
                    FlushDecision::None
                }
            }
            TurnPolicy::ExplicitFinality => FlushDecision::None,
        }
    }

    /// Drain whatever is pending into a payload without waiting for the
    /// policy to trigger. Used when a call ends with `flush_on_close` set.
    pub fn take_pending(&mut self) -> Option<TurnPayload> {
        if self.is_empty() {
            return None;
        }
        let text = if self.partial_text.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial_text))
        };
        match self.flush(text) {
            FlushDecision::Flush(payload) => Some(payload),
            FlushDecision::None => None,
        }
    }

    fn flush(&mut self, text: Option<String>) -> FlushDecision {
        let payload = TurnPayload {
            audio: std::mem::take(&mut self.audio),
            text,
            emotion: self.emotion.clone(),
        };
        self.partial_text.clear();
        self.last_flush = Instant::now();
        FlushDecision::Flush(payload)
    }
}
