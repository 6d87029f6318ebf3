//! Shared application state.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ServerConfig;
use crate::core::inference::{HttpInference, InferenceBackend};
use crate::core::ledger::{CallLedger, FsLedger, LedgerError};
use crate::core::session::SessionRegistry;

/// Returned when a new call connection would exceed the configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimitReached;

/// State shared across all handlers.
///
/// Construction wires the production collaborators (filesystem ledger, HTTP
/// inference backend) from configuration; tests inject their own via
/// [`AppState::with_collaborators`].
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<SessionRegistry>,
    pub ledger: Arc<dyn CallLedger>,
    pub backend: Arc<dyn InferenceBackend>,
    active_connections: AtomicUsize,
}

impl AppState {
    /// Build production state from configuration. Creates the data directory
    /// if it does not exist.
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, LedgerError> {
        let ledger = Arc::new(FsLedger::new(&config.data_dir).await?);
        let backend = Arc::new(HttpInference::new(config.inference_config()));
        Ok(Self::with_collaborators(config, ledger, backend))
    }

    /// Build state around explicit collaborators.
    pub fn with_collaborators(
        config: ServerConfig,
        ledger: Arc<dyn CallLedger>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            ledger,
            backend,
            active_connections: AtomicUsize::new(0),
        })
    }

    /// Reserve a connection slot. Fails when the configured global limit is
    /// reached; unlimited when no limit is configured.
    pub fn try_acquire_connection(&self) -> Result<(), ConnectionLimitReached> {
        let Some(limit) = self.config.max_websocket_connections else {
            self.active_connections.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        };
        let mut current = self.active_connections.load(Ordering::SeqCst);
        loop {
            if current >= limit {
                return Err(ConnectionLimitReached);
            }
            match self.active_connections.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Release a previously acquired connection slot.
    pub fn release_connection(&self) {
        let previous = self.active_connections.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "release without matching acquire");
    }

    /// Current number of live call connections.
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}
