//! Transport seam - the caller-supplied send side of the channel
//!
//! The engine never owns the socket. The host hands it a [`Transport`]
//! for the outbound direction and drives the inbound direction itself by
//! feeding frames to the engine (see [`crate::engine`]). Framing,
//! reconnection and authentication all live on the host's side of this
//! trait.

use async_trait::async_trait;

/// Outbound half of a bidirectional text channel.
///
/// A send failure is treated as the connection being dead: the engine
/// stops abnormally and never retries.
#[async_trait]
pub trait Transport: Send {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send one text frame.
    async fn send(&mut self, frame: &str) -> Result<(), Self::Error>;
}
