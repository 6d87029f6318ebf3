pub mod inference;
pub mod intent;
pub mod ledger;
pub mod session;
pub mod tone;
pub mod turn;

// Re-export commonly used types for convenience
pub use inference::{
    AssistantReply, ExtractionStrategy, FALLBACK_APOLOGY, HttpInference, InferenceBackend,
    InferenceConfig, InferenceOutcome, InferenceRequest, UserInput,
};

pub use ledger::{CallLedger, FsLedger, LedgerError, LogEvent, MemoryEntry, MemoryLedger, MemoryRole};

pub use session::{
    BinaryMediaPolicy, CallSession, CallState, InboundFrame, MessageRoute, OutboundFrame,
    SessionPolicy, SessionRegistry,
};

pub use turn::{FlushDecision, Fragment, TurnBuffer, TurnPayload, TurnPolicy};
