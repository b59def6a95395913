use crate::error::CoreError;
use crate::types::Side;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// How a completed rally is turned into a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScoringRule {
    /// The side opposite the table half the ball last touched scores.
    #[default]
    LandingSide,
    /// The side whose paddle struck the ball last scores.
    LastPaddle,
}

/// Most recent contacts of the live ball, consumed at the next floor contact.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactMemory {
    pub last_paddle: Option<Side>,
    pub last_table: Option<Side>,
    /// Ball clock reading of the last processed paddle contact.
    pub last_collision_at: Option<f32>,
}

impl ContactMemory {
    pub fn clear(&mut self) {
        *self = ContactMemory::default();
    }

    pub fn is_complete(&self) -> bool {
        self.last_paddle.is_some() && self.last_table.is_some()
    }
}

impl ScoringRule {
    /// Side awarded the point for a rally that ended with `memory`.
    pub fn decide(&self, memory: &ContactMemory) -> Result<Side, CoreError> {
        match (memory.last_paddle, memory.last_table) {
            (Some(paddle), Some(table)) => Ok(match self {
                ScoringRule::LandingSide => table.opponent(),
                ScoringRule::LastPaddle => paddle,
            }),
            (paddle, table) => Err(CoreError::IncompleteContactMemory { paddle, table }),
        }
    }
}

/// Interprets paddle and table-side contact streams into scoring decisions.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    rule: ScoringRule,
    memory: ContactMemory,
}

impl ScoringEngine {
    pub fn new(rule: ScoringRule) -> Self {
        Self {
            rule,
            memory: ContactMemory::default(),
        }
    }

    pub fn rule(&self) -> ScoringRule {
        self.rule
    }

    pub fn memory(&self) -> &ContactMemory {
        &self.memory
    }

    pub fn record_paddle(&mut self, side: Side, at: f32) {
        self.memory.last_paddle = Some(side);
        self.memory.last_collision_at = Some(at);
    }

    /// Repeated entries of the same half just overwrite the tag.
    pub fn record_table_side(&mut self, side: Side) {
        if self.memory.last_table != Some(side) {
            debug!("Ball entered {} half", side);
        }
        self.memory.last_table = Some(side);
    }

    /// Settles the rally on floor contact. Memory is cleared either way.
    pub fn on_floor_contact(&mut self) -> Result<Side, CoreError> {
        let decision = self.rule.decide(&self.memory);
        self.memory.clear();
        if let Err(err) = &decision {
            warn!("Dead ball, no point awarded: {}", err);
        }
        decision
    }

    pub fn clear(&mut self) {
        self.memory.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landing_on_guest_half_scores_home() {
        let mut engine = ScoringEngine::new(ScoringRule::LandingSide);
        engine.record_paddle(Side::Home, 1.0);
        engine.record_table_side(Side::Guest);

        assert_eq!(engine.on_floor_contact(), Ok(Side::Home));
        assert_eq!(*engine.memory(), ContactMemory::default());
    }

    #[test]
    fn test_landing_rule_ignores_paddle() {
        let mut engine = ScoringEngine::new(ScoringRule::LandingSide);
        engine.record_paddle(Side::Guest, 0.5);
        engine.record_table_side(Side::Guest);
        assert_eq!(engine.on_floor_contact(), Ok(Side::Home));
    }

    #[test]
    fn test_last_tag_wins() {
        let mut engine = ScoringEngine::default();
        engine.record_table_side(Side::Home);
        engine.record_paddle(Side::Home, 0.1);
        engine.record_table_side(Side::Guest);
        engine.record_table_side(Side::Guest);
        engine.record_paddle(Side::Guest, 0.4);
        engine.record_table_side(Side::Home);

        assert_eq!(engine.on_floor_contact(), Ok(Side::Guest));
    }

    #[test]
    fn test_incomplete_memory_is_no_decision() {
        let mut engine = ScoringEngine::default();
        engine.record_table_side(Side::Guest);

        let result = engine.on_floor_contact();
        assert_eq!(
            result,
            Err(CoreError::IncompleteContactMemory {
                paddle: None,
                table: Some(Side::Guest),
            })
        );
        assert!(!engine.memory().is_complete());
        assert_eq!(engine.memory().last_table, None);
    }

    #[test]
    fn test_last_paddle_rule() {
        let memory = ContactMemory {
            last_paddle: Some(Side::Guest),
            last_table: Some(Side::Guest),
            last_collision_at: None,
        };
        assert_eq!(ScoringRule::LastPaddle.decide(&memory), Ok(Side::Guest));
        assert_eq!(ScoringRule::LandingSide.decide(&memory), Ok(Side::Home));
    }
}
