//! Testing utilities
//!
//! Provides a mock transport for exercising the engine without a real
//! channel: sent frames are recorded for inspection, and the transport
//! can be switched into a broken state to provoke abnormal stops.

use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Error type for the mock transport
#[derive(Debug, thiserror::Error)]
pub enum MockTransportError {
    #[error("Transport is disconnected")]
    Disconnected,
}

/// Mock transport for testing - records sent frames, never blocks.
///
/// Clones share the same frame log and connection flag, so a test can
/// keep one clone while the engine owns another.
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Frames that were sent via this transport
    sent: Arc<Mutex<Vec<String>>>,

    /// Connection status; once broken, every send fails
    broken: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a new connected mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// All frames sent via this transport, in send order.
    pub fn sent_frames(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// All sent frames parsed as JSON values, for order-insensitive
    /// comparison against expected frames.
    pub fn sent_values(&self) -> Vec<serde_json::Value> {
        self.sent_frames()
            .iter()
            .map(|frame| serde_json::from_str(frame).expect("mock transport sent invalid JSON"))
            .collect()
    }

    /// Break the channel: every subsequent send fails.
    pub fn break_pipe(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Whether the channel is still usable.
    pub fn is_connected(&self) -> bool {
        !self.broken.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = MockTransportError;

    async fn send(&mut self, frame: &str) -> Result<(), Self::Error> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(MockTransportError::Disconnected);
        }
        self.sent.lock().unwrap().push(frame.to_string());
        Ok(())
    }
}
