//! # Shared Match Core
//!
//! Host-authoritative state for a two-sided ball game played over the
//! network. The host owns the only writable copy of the match; peers hold
//! mirrors that change only when the host's committed writes reach them.
//!
//! ## Layers
//!
//! - [`ReplicatedValue`] / [`ReplicatedState`]: single-writer fields with
//!   ordered change notification
//! - [`CommandRouter`]: authority guard and in-order command execution
//! - [`Ball`]: serve, flight assist and paddle contact handling
//! - [`ScoringEngine`]: contact memory and rally settlement
//! - [`Session`]: lifecycle, clock, points, deuce and serve rotation
//!
//! ## Wire Protocol
//!
//! [`Packet`] is serialized with `bincode` into single UDP datagrams.
//! Committed writes travel as [`FieldUpdate`] batches tagged with a sequence
//! number; a peer that notices a gap asks for a full snapshot.

pub mod ball;
pub mod config;
pub mod error;
pub mod math;
pub mod replicated;
pub mod router;
pub mod scoring;
pub mod session;
pub mod state;
pub mod types;

pub use ball::{paddle_swing, Ball, ForceMode, RigidBody};
pub use config::{BallConfig, MatchConfig};
pub use error::CoreError;
pub use math::Vec3;
pub use replicated::{Authority, ReplicatedValue};
pub use router::{CommandRouter, Participant};
pub use scoring::{ContactMemory, ScoringEngine, ScoringRule};
pub use session::{serve_side, Session};
pub use state::{FieldUpdate, ReplicatedState, ScoreBoard, SessionListener};
pub use types::{BallState, Command, ParseCommandError, SessionState, Side};

use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Command {
        command: Command,
    },
    /// The contacting side is the sender's seat.
    PaddleContact {
        normal: Vec3,
        velocity: Vec3,
    },
    SyncRequest,
    Heartbeat,
    Disconnect,

    Connected {
        client_id: u32,
        side: Option<Side>,
    },
    StateUpdate {
        sequence: u32,
        updates: Vec<FieldUpdate>,
    },
    StateSnapshot {
        sequence: u32,
        updates: Vec<FieldUpdate>,
    },
    BallSnapshot {
        tick: u32,
        state: BallState,
        position: Vec3,
        velocity: Vec3,
    },
    Disconnected {
        reason: String,
    },
}
