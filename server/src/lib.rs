//! # Scan-Tag Coordinator Library
//!
//! This library provides the authoritative server for a location-based tag
//! game. Players tag each other by scanning printed markers; the marker
//! detection happens on the clients, which send already-decoded actions
//! identified by a small integer scan code. The server owns all game state and
//! tells every participant what happened.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Session
//! One [`session::Session`] holds the lifecycle state (lobby, countdown,
//! active, ended), the roster and every pending timer. Clients never mutate
//! state directly; they request actions and conform to the broadcasts that
//! follow.
//!
//! ### Client Management
//! Handles the lifecycle of client connections:
//! - Connection handshake and connection id assignment
//! - Heartbeat tracking and timeout-driven implicit disconnects
//! - Address lookup for unicast events
//!
//! ### Event Delivery
//! Every session step returns a list of [`session::Outbound`] events, each
//! addressed to everyone, one connection, or everyone but one connection. The
//! network layer turns these into datagrams in the order they were produced.
//!
//! ## Architecture Design
//!
//! ### Single-Owner Session
//! The network loop owns the session by value. Inbound packets, connection
//! timeouts and timer polls are funnelled through one `tokio::select!` loop,
//! so each step runs to completion before the next one starts and no lock
//! guards game state.
//!
//! ### Deadline Timers
//! The countdown, buff expiries and the post-game reset are stored as
//! deadlines inside the session and fired by [`session::Session::poll`].
//! Buff expiries remember the roster generation they were scheduled under
//! and are discarded once the roster has been replaced.
//!
//! ## Module Organization
//!
//! - `roster`: ordered players, symbol assignment, leadership
//! - `combat`: shots, purchases, treasure, weapon changes, win conditions
//! - `effects`: pending buff expiries
//! - `session`: lifecycle state machine and the action entry point
//! - `client_manager`: connection registry
//! - `network`: UDP transport and the run loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 20 timer polls per second, up to 32 connections, 10s heartbeat timeout
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(50),
//!         32,
//!         Duration::from_secs(10),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The session can also be driven without any networking:
//!
//! ```rust
//! use server::session::{Session, SessionState};
//! use shared::{ClientAction, JoinRole};
//! use std::time::Instant;
//!
//! let mut session = Session::new();
//! let events = session.handle(
//!     1,
//!     ClientAction::JoinLobby { name: "ada".to_string(), role: JoinRole::Player },
//!     Instant::now(),
//! );
//! assert_eq!(events.len(), 1);
//! assert_eq!(session.state(), SessionState::Lobby);
//! ```

pub mod client_manager;
pub mod combat;
pub mod effects;
pub mod error;
pub mod network;
pub mod roster;
pub mod session;
mod utils;

pub use error::ActionError;
pub use session::{Outbound, Recipient, Session, SessionState};
