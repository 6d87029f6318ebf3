//! Registry of live calls.
//!
//! One record per active call, created when the connection opens and removed
//! when it closes. The registry owns only lifecycle metadata; conversation
//! state lives in the session task and persisted data in the ledger, which
//! outlives the record. Backed by a sharded concurrent map so connection
//! tasks never serialize on a global lock.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle state of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallState {
    Connecting,
    Active,
    Ended,
}

/// Lifecycle metadata for one live call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub created_at: DateTime<Utc>,
    pub state: CallState,
}

/// Maps call identifiers to live call records.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    calls: DashMap<String, CallRecord>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new call under a freshly generated identifier.
    ///
    /// UUIDv4 gives enough entropy that identifiers never collide across
    /// concurrent calls; no two records ever share one.
    pub fn register(&self) -> String {
        let call_id = Uuid::new_v4().to_string();
        self.calls.insert(
            call_id.clone(),
            CallRecord {
                created_at: Utc::now(),
                state: CallState::Connecting,
            },
        );
        call_id
    }

    /// Re-key a call under the provider-supplied identifier from its `start`
    /// frame. Returns the identifier now in effect: the provider's when the
    /// re-key happened, the current one when the provider id is blank or
    /// already taken by another live call.
    pub fn adopt(&self, current_id: &str, provider_id: &str) -> String {
        let provider_id = provider_id.trim();
        if provider_id.is_empty() || provider_id == current_id {
            return current_id.to_string();
        }
        if self.calls.contains_key(provider_id) {
            return current_id.to_string();
        }
        if let Some((_, record)) = self.calls.remove(current_id) {
            self.calls.insert(provider_id.to_string(), record);
            provider_id.to_string()
        } else {
            current_id.to_string()
        }
    }

    pub fn set_state(&self, call_id: &str, state: CallState) {
        if let Some(mut record) = self.calls.get_mut(call_id) {
            record.state = state;
        }
    }

    pub fn state_of(&self, call_id: &str) -> Option<CallState> {
        self.calls.get(call_id).map(|r| r.state)
    }

    /// Drop the record for a closed call. Ledger data persists independently.
    pub fn remove(&self, call_id: &str) {
        self.calls.remove(call_id);
    }

    /// Number of registered calls, live or ended-but-not-yet-removed.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}
