//! Filesystem-backed call ledger.
//!
//! Layout under the configured data directory:
//! - `{call_id}.memory.json`: full-replace ordered [`MemoryEntry`] list
//! - `{call_id}.events.jsonl`: append-only JSON-lines [`LogEvent`] records
//!
//! Memory replacement writes to a temporary sibling file and renames it over
//! the record, so a crashed write never leaves a torn memory file. Event
//! appends rely on the OS append mode; one event is one line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{CallLedger, LedgerError, LogEvent, MemoryEntry};

/// Per-call record storage on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsLedger {
    root: PathBuf,
}

impl FsLedger {
    /// Create a ledger rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "call ledger directory ready");
        Ok(Self { root })
    }

    fn memory_path(&self, call_id: &str) -> PathBuf {
        self.root.join(format!("{}.memory.json", sanitize(call_id)))
    }

    fn events_path(&self, call_id: &str) -> PathBuf {
        self.root.join(format!("{}.events.jsonl", sanitize(call_id)))
    }

    /// Root directory holding the per-call records.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Restrict call ids to a filesystem-safe alphabet. Call ids are either
/// UUIDs we generated or provider-supplied SIDs; anything else is replaced
/// so a hostile id cannot escape the data directory.
fn sanitize(call_id: &str) -> String {
    call_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl CallLedger for FsLedger {
    async fn memory(&self, call_id: &str) -> Result<Vec<MemoryEntry>, LedgerError> {
        let path = self.memory_path(call_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn replace_memory(
        &self,
        call_id: &str,
        entries: &[MemoryEntry],
    ) -> Result<(), LedgerError> {
        let path = self.memory_path(call_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn append_event(&self, call_id: &str, event: LogEvent) -> Result<(), LedgerError> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.events_path(call_id))
            .await?;
        file.write_all(&line).await?;
        Ok(())
    }

    async fn events(&self, call_id: &str) -> Result<Vec<LogEvent>, LedgerError> {
        let path = self.events_path(call_id);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            events.push(serde_json::from_str(line)?);
        }
        Ok(events)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<(), LedgerError> {
        for (src, dst) in [
            (self.memory_path(from), self.memory_path(to)),
            (self.events_path(from), self.events_path(to)),
        ] {
            match tokio::fs::rename(&src, &dst).await {
                Ok(()) => {}
                // A record that was never written has nothing to move.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
