//! # Match Host Library
//!
//! This library provides the authoritative actor of a networked two-sided
//! ball match. It owns the only writable copy of the match state, executes
//! every state-changing command, and broadcasts the resulting writes so that
//! each peer's mirror converges on the same truth.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The host runs the session state machine, the ball state machine and the
//! scoring rules from the `shared` crate. Peers never write match state; they
//! send commands and paddle contacts, and watch the effects arrive.
//!
//! ### Command Routing
//! Commands from the host console and from peers are queued in arrival order
//! and executed one at a time at the start of the next tick. A command that
//! fails its guard (wrong seat, wrong state) is dropped without a reply.
//!
//! ### State Broadcasting
//! Every command and every tick that commits writes produces one sequenced
//! `StateUpdate` datagram. A peer that sees a gap in the sequence asks for a
//! `StateSnapshot`. The ball's position is streamed every tick for display.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All match logic runs inside one `select!` loop, so there is no locking
//! around the session itself. Socket reads, socket writes, timeout checks
//! and console input run as separate tasks that talk to the loop over
//! channels.
//!
//! ### Fixed Tick
//! The match clock advances by the configured tick length, never by wall
//! time, so pausing and resuming never drifts.
//!
//! ### Seats
//! The host always plays the Home side. The first peer to connect takes the
//! Guest seat; later peers are observers. Losing the Guest seat pauses an
//! active match.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Connection tracking, address lookup and heartbeat timeouts.
//!
//! ### Config Module (`config`)
//! `ServerConfig`, loadable from TOML and overridable from the command line.
//!
//! ### Game Module (`game`)
//! `HostGame`: the session, the command router and the simulated ball body
//! tied together behind a tick function.
//!
//! ### Physics Module (`physics`)
//! A minimal stand-in for the external rigid-body simulator: a point-mass
//! body and a table that reports bounces and floor contacts.
//!
//! ### Network Module (`network`)
//! UDP socket management, packet dispatch and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         auto_start: true,
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::new(&config).await?;
//!
//!     // Runs until the process is stopped. Type `serve`, `pause`,
//!     // `resume`, `restart` or `hit` on stdin to play the Home side.
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod physics;
