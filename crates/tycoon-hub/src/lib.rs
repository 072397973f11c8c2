//! Broadcast hub for the Tycoon simulation.
//!
//! An Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`): clients authenticate with a signed
//!   token, then receive every completed tick plus alerts and balance
//!   updates for their own company.
//! - **REST endpoints**: `/api/health` and `/api/market/data`.
//!
//! # Architecture
//!
//! ```text
//! Scheduler --> TickPublisher --(broadcast)--> Relay --> Registry
//!                                                          |
//!                          per-connection bounded queue <--+
//!                                   |
//!                              writer task --> socket
//! ```
//!
//! The scheduler never waits on the hub: the publisher's channels are
//! non-blocking and the registry only `try_send`s into connection queues.
//! A [`heartbeat`] sweep prunes connections that stop answering pings.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod heartbeat;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use auth::{AuthError, Claims, HmacTokenVerifier, TokenVerifier};
pub use error::HubError;
pub use router::build_router;
pub use server::{bind, serve, start_server};
pub use state::HubState;
