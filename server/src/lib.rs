//! # Arena Session Server Library
//!
//! This library provides the authoritative session server for a browser-based,
//! team-versus-team arrow arena. Browsers connect over WebSocket, exchange named JSON
//! events, and the server keeps the canonical roster, arrows in flight, team scores
//! and session lifecycle.
//!
//! ## Core Responsibilities
//!
//! ### Session Authority
//! The server owns every player record, every arrow and the score ledger. Clients
//! report what their physics engine observed (movement, shots, hits); the server
//! validates those reports against its own records and broadcasts the consequences.
//! Team, angle and point values are always derived server-side.
//!
//! ### Client Management
//! Handles the complete lifecycle of client connections including:
//! - Connection establishment and the authentication handshake
//! - Deferred admission while the team bases are still unknown
//! - Disconnection handling and cleanup
//! - One-time reload notices for connections that lost their player
//!
//! ### Event Fan-out
//! Every accepted action produces events for the origin, for the other players, or
//! for everyone, in the order the protocol promises.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! Connection tasks only parse frames and write queued frames. All state lives in one
//! [`dispatcher::Dispatcher`] owned by the server loop, which handles one event at a
//! time. Handlers therefore never interleave, and a hit resolution can never observe a
//! half-applied hit.
//!
//! ### WebSocket Transport
//! Events are text frames of the form `{"event": "<name>", "data": <payload>}`.
//! Pings keep idle connections alive and a sweep drops silent ones.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Per-connection context: handshake phase, reload notice flag, activity tracking.
//!
//! ### Dispatcher Module (`dispatcher`)
//! Maps client events onto game operations and decides who is told about them.
//!
//! ### Game Module (`game`)
//! The session state: player and arrow stores, score ledger, spawn allocator and
//! lifecycle, plus the operations that change them.
//!
//! ### Supporting Modules
//! - `combat`: hit resolution and scoring
//! - `teams`: team balancing and spawn placement
//! - `entity_store`: keyed stores for players and arrows
//! - `score`: per-team point ledger
//! - `session`: running/stopped lifecycle
//! - `config`: game rules and server settings
//!
//! ### Network Module (`network`)
//! WebSocket accept loop, per-connection reader/writer tasks and delivery of
//! dispatcher output.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new("0.0.0.0:3000", ServerConfig::default()).await?;
//!
//!     // Runs until the process is stopped:
//!     // - Accepts WebSocket connections up to the client limit
//!     // - Dispatches client events one at a time
//!     // - Drops connections that stop answering pings
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Trust Boundary
//!
//! Hit detection runs in the browsers, so a modified client can report hits that did
//! not happen. The server only guarantees that reports refer to known players and
//! arrows in flight, and that each arrow scores at most once.

pub mod client_manager;
pub mod combat;
pub mod config;
pub mod dispatcher;
pub mod entity_store;
pub mod game;
pub mod network;
pub mod score;
pub mod session;
pub mod teams;
pub mod utils;
