//! HTTP and WebSocket request handlers
//!
//! This module organizes all handlers into logical groups:
//! - `api` - Health check endpoint
//! - `call` - Call stream WebSocket (telephony duplex connection)
//! - `webhook` - Telephony provider incoming-call webhook

pub mod api;
pub mod call;
pub mod webhook;

// Re-export commonly used handlers for convenient access
pub use call::call_handler;
pub use webhook::incoming_call;
