//! Connection engine - correlation and dispatch over one channel
//!
//! A per-connection state machine that multiplexes both protocol roles
//! over a single transport:
//!
//! - **Server role**: inbound requests and notifications are dispatched
//!   to the handlers registered on the [`RpcBuilder`].
//! - **Client role**: outbound calls issued through the [`RpcHandle`]
//!   are correlated to their responses by id (or by id-set for batches)
//!   and delivered through one-shot reply channels.
//!
//! The engine is a single-owner actor: all inputs arrive on one mailbox
//! and are consumed sequentially, so no state is ever shared. See
//! [`state::Engine`] for the inbound/outbound flows and
//! [`handle::RpcHandle`] for the caller surface.

pub mod builder;
pub mod command;
pub mod handle;
pub mod state;

pub use builder::{HandlerError, NotificationHandler, RequestHandler, RpcBuilder};
pub use command::{BatchResults, CallOutcome, Command, Event};
pub use handle::{BatchCall, CallError, RequestError, RpcHandle};
pub use state::{Engine, Next, StopReason};
