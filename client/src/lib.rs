//! # Match Peer Library
//!
//! This library provides the non-authoritative side of a networked two-sided
//! ball match. A peer never writes match state. It mirrors what the host
//! commits, forwards its player's commands and paddle contacts, and presents
//! the result on the console.
//!
//! ## Architecture Overview
//!
//! ### Mirrored State
//! The peer holds a mirror `ReplicatedState` fed only by the host's
//! sequenced `StateUpdate` datagrams. Each datagram carries every write of
//! one host command or tick, and is applied as a whole before any listener
//! runs, so the scoreboard never shows a half-applied point.
//!
//! ### Gap Recovery
//! Updates are applied in arrival order. An update older than the newest
//! one seen is dropped. A jump in the sequence is applied immediately and a
//! `SyncRequest` goes back to the host, whose `StateSnapshot` brings the
//! mirror back in line.
//!
//! ### Ball Prediction
//! The host streams ball snapshots every tick. Between snapshots the peer
//! extrapolates the ball under gravity for display and for aiming console
//! swings. The prediction is advisory: scoring only ever happens on the host.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! `PeerGame`: the mirror, sequence tracking and the ball snapshot buffer.
//!
//! ### Input Module (`input`)
//! Console line parsing and swing debouncing.
//!
//! ### Network Module (`network`)
//! UDP connection, heartbeats and the main loop.
//!
//! ### Scoreboard Module (`scoreboard`)
//! A console presentation sink with an `MM:SS` match clock.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Simulate 50ms of round-trip latency, heartbeat every second
//!     let mut client = Client::new("127.0.0.1:8080", 50, 1000).await?;
//!
//!     // Type `serve`, `pause`, `resume`, `restart`, `hit` or `quit`
//!     client.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod scoreboard;
