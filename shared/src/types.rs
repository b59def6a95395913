use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One end of the table. The host always plays Home.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Home,
    Guest,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Home => Side::Guest,
            Side::Guest => Side::Home,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Home => write!(f, "Home"),
            Side::Guest => write!(f, "Guest"),
        }
    }
}

/// Match lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionState {
    #[default]
    Inactive,
    Active,
    Paused,
    Ended,
}

/// Flight state of the live ball.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BallState {
    #[default]
    Held,
    Serving,
    Waiting,
    Active,
}

/// Names the state a rejected transition was attempted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateLabel {
    Session(SessionState),
    Ball(BallState),
}

impl fmt::Display for StateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateLabel::Session(state) => write!(f, "session {:?}", state),
            StateLabel::Ball(state) => write!(f, "ball {:?}", state),
        }
    }
}

/// State-changing requests any participant may issue.
/// Only the authoritative actor executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Serve,
    Pause,
    Resume,
    Restart,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::Start => "start",
            Command::Serve => "serve",
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Restart => "restart",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown command '{0}' (expected start, serve, pause, resume or restart)")]
pub struct ParseCommandError(pub String);

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "serve" => Ok(Command::Serve),
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            "restart" => Ok(Command::Restart),
            other => Err(ParseCommandError(other.to_string())),
        }
    }
}
