//! Per-call persistence: conversation memory and append-only event logs.
//!
//! Every call owns exactly two records, keyed by its call id: an ordered list
//! of [`MemoryEntry`] values (the conversation as replayed to the inference
//! backend) and an append-only sequence of [`LogEvent`] values used for audit
//! and debugging, never for control flow.
//!
//! The [`CallLedger`] trait keeps the storage mechanism swappable: the
//! filesystem implementation in [`fs`] backs production, while
//! [`MemoryLedger`] backs tests. Writes for the same call are serialized by
//! the single-flight-per-call invariant upstream, so implementations only
//! need atomic append/replace semantics per record.

mod fs;

pub use fs::FsLedger;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Well-known event kind tags written by the bridge.
///
/// Free-form kinds are allowed; these constants cover the events the core
/// emits itself so tests and operators can grep for them consistently.
pub mod event_kind {
    pub const WS_CONNECT: &str = "ws_connect";
    pub const WS_CLOSE: &str = "ws_close";
    pub const CALL_START: &str = "call_start";
    pub const CALL_END: &str = "call_end";
    pub const TURN_FLUSH: &str = "turn_flush";
    pub const TURN_DISCARDED: &str = "turn_discarded";
    pub const ASSISTANT_REPLY: &str = "assistant_reply";
    pub const BACKEND_FAILURE: &str = "backend_failure";
    pub const MALFORMED_FRAME: &str = "malformed_frame";
    pub const UNKNOWN_EVENT: &str = "unknown_event";
}

/// Role of a conversation memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRole {
    System,
    User,
    Assistant,
}

/// One entry in a call's conversation memory.
///
/// Entries are append-only and their insertion order is the conversation
/// order; it must be preserved when replayed to the inference backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub role: MemoryRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create an entry stamped with the current time.
    pub fn now(role: MemoryRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One append-only audit event for a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl LogEvent {
    /// Create an event stamped with the current time.
    pub fn new(kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Errors surfaced by ledger implementations.
///
/// Persistence failures are never allowed to abort an in-progress turn; the
/// session logs them via `tracing` and carries on (best-effort durability).
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage abstraction for per-call memory and event logs.
///
/// Records for different calls never share storage; concurrent writers for
/// different calls never contend on the same record.
#[async_trait]
pub trait CallLedger: Send + Sync {
    /// Read the ordered conversation memory for a call.
    ///
    /// A call with no stored memory yields an empty list.
    async fn memory(&self, call_id: &str) -> Result<Vec<MemoryEntry>, LedgerError>;

    /// Replace the full conversation memory for a call.
    async fn replace_memory(
        &self,
        call_id: &str,
        entries: &[MemoryEntry],
    ) -> Result<(), LedgerError>;

    /// Append one event to the call's log. Entries are write-once.
    async fn append_event(&self, call_id: &str, event: LogEvent) -> Result<(), LedgerError>;

    /// Read the full event log for a call, in append order.
    async fn events(&self, call_id: &str) -> Result<Vec<LogEvent>, LedgerError>;

    /// Move both of a call's records under a new identifier.
    ///
    /// Used when a provider-supplied call id replaces the provisional one:
    /// anything already written under `from` must afterwards be readable
    /// under `to`, keeping one memory record and one log record per call.
    /// Records that do not exist yet are not an error.
    async fn rename(&self, from: &str, to: &str) -> Result<(), LedgerError>;
}

/// In-memory ledger used by tests and useful for ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    memories: DashMap<String, Vec<MemoryEntry>>,
    logs: DashMap<String, Vec<LogEvent>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CallLedger for MemoryLedger {
    async fn memory(&self, call_id: &str) -> Result<Vec<MemoryEntry>, LedgerError> {
        Ok(self
            .memories
            .get(call_id)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn replace_memory(
        &self,
        call_id: &str,
        entries: &[MemoryEntry],
    ) -> Result<(), LedgerError> {
        self.memories.insert(call_id.to_string(), entries.to_vec());
        Ok(())
    }

    async fn append_event(&self, call_id: &str, event: LogEvent) -> Result<(), LedgerError> {
        self.logs.entry(call_id.to_string()).or_default().push(event);
        Ok(())
    }

    async fn events(&self, call_id: &str) -> Result<Vec<LogEvent>, LedgerError> {
        Ok(self
            .logs
            .get(call_id)
            .map(|e| e.value().clone())
            .unwrap_or_default())
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), LedgerError> {
        if let Some((_, entries)) = self.memories.remove(from) {
            self.memories.insert(to.to_string(), entries);
        }
        if let Some((_, events)) = self.logs.remove(from) {
            self.logs.insert(to.to_string(), events);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_role_serialization() {
        assert_eq!(
            serde_json::to_string(&MemoryRole::System).unwrap(),
            r#""system""#
        );
        assert_eq!(
            serde_json::to_string(&MemoryRole::User).unwrap(),
            r#""user""#
        );
        assert_eq!(
            serde_json::to_string(&MemoryRole::Assistant).unwrap(),
            r#""assistant""#
        );
    }

    #[test]
    fn test_memory_entry_roundtrip() {
        let entry = MemoryEntry::now(MemoryRole::User, "hello");
        let json = serde_json::to_string(&entry).unwrap();
        let back: MemoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[tokio::test]
    async fn test_memory_ledger_empty_call() {
        let ledger = MemoryLedger::new();
        assert!(ledger.memory("nope").await.unwrap().is_empty());
        assert!(ledger.events("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_ledger_replace_preserves_order() {
        let ledger = MemoryLedger::new();
        let entries = vec![
            MemoryEntry::now(MemoryRole::User, "first"),
            MemoryEntry::now(MemoryRole::Assistant, "second"),
            MemoryEntry::now(MemoryRole::User, "third"),
        ];
        ledger.replace_memory("call-1", &entries).await.unwrap();

        let stored = ledger.memory("call-1").await.unwrap();
        let contents: Vec<_> = stored.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_memory_ledger_events_append_only() {
        let ledger = MemoryLedger::new();
        ledger
            .append_event("call-1", LogEvent::new(event_kind::WS_CONNECT, serde_json::json!({})))
            .await
            .unwrap();
        ledger
            .append_event(
                "call-1",
                LogEvent::new(event_kind::TURN_FLUSH, serde_json::json!({"fragments": 3})),
            )
            .await
            .unwrap();

        let events = ledger.events("call-1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, event_kind::WS_CONNECT);
        assert_eq!(events[1].kind, event_kind::TURN_FLUSH);
    }

    #[tokio::test]
    async fn test_memory_ledger_calls_are_isolated() {
        let ledger = MemoryLedger::new();
        ledger
            .replace_memory("a", &[MemoryEntry::now(MemoryRole::User, "for a")])
            .await
            .unwrap();
        ledger
            .replace_memory("b", &[MemoryEntry::now(MemoryRole::User, "for b")])
            .await
            .unwrap();

        assert_eq!(ledger.memory("a").await.unwrap()[0].content, "for a");
        assert_eq!(ledger.memory("b").await.unwrap()[0].content, "for b");
    }

    #[tokio::test]
    async fn test_memory_ledger_rename_moves_both_records() {
        let ledger = MemoryLedger::new();
        ledger
            .replace_memory("tmp-id", &[MemoryEntry::now(MemoryRole::User, "hello")])
            .await
            .unwrap();
        ledger
            .append_event("tmp-id", LogEvent::new(event_kind::WS_CONNECT, serde_json::json!({})))
            .await
            .unwrap();

        ledger.rename("tmp-id", "CA-prov").await.unwrap();

        assert!(ledger.memory("tmp-id").await.unwrap().is_empty());
        assert!(ledger.events("tmp-id").await.unwrap().is_empty());
        assert_eq!(ledger.memory("CA-prov").await.unwrap()[0].content, "hello");
        assert_eq!(
            ledger.events("CA-prov").await.unwrap()[0].kind,
            event_kind::WS_CONNECT
        );
    }

    #[tokio::test]
    async fn test_memory_ledger_rename_with_nothing_written() {
        let ledger = MemoryLedger::new();
        ledger.rename("tmp-id", "CA-prov").await.unwrap();
        assert!(ledger.events("CA-prov").await.unwrap().is_empty());
    }
}
