use crate::math::Vec3;
use crate::scoring::ScoringRule;
use crate::types::Side;
use serde::{Deserialize, Serialize};

/// Tuning for serve and flight assist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallConfig {
    /// Upward velocity given to the ball on serve.
    pub serve_impulse: f32,
    pub min_velocity: f32,
    pub max_velocity: f32,
    /// Fraction of the way towards the clamped velocity covered per tick.
    pub smoothing: f32,
    /// Scale of the pull back towards the centre line.
    pub assist_strength: f32,
    /// Direction from the Home end towards the Guest end.
    pub opponent_axis: Vec3,
    /// Seconds during which further paddle contacts are ignored.
    pub collision_cooldown: f32,
    /// Largest random component added per axis on a paddle hit.
    pub max_perturbation: f32,
    pub seed: u64,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            serve_impulse: 5.0,
            min_velocity: 2.0,
            max_velocity: 12.0,
            smoothing: 0.2,
            assist_strength: 0.1,
            opponent_axis: Vec3::FORWARD,
            collision_cooldown: 0.1,
            max_perturbation: 0.3,
            seed: 0x5EED,
        }
    }
}

/// Rules and layout of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Countdown length in seconds.
    pub match_duration: f32,
    pub points_to_win: u32,
    pub win_margin: u32,
    /// Both scores at or above this enter deuce.
    pub deuce_threshold: u32,
    pub host_serve_location: Vec3,
    pub guest_serve_location: Vec3,
    pub scoring_rule: ScoringRule,
    pub ball: BallConfig,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            match_duration: 300.0,
            points_to_win: 11,
            win_margin: 2,
            deuce_threshold: 10,
            host_serve_location: Vec3::new(0.0, 1.1, -1.2),
            guest_serve_location: Vec3::new(0.0, 1.1, 1.2),
            scoring_rule: ScoringRule::default(),
            ball: BallConfig::default(),
        }
    }
}

impl MatchConfig {
    pub fn serve_location(&self, side: Side) -> Vec3 {
        match side {
            Side::Home => self.host_serve_location,
            Side::Guest => self.guest_serve_location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatchConfig::default();
        assert_eq!(config.points_to_win, 11);
        assert_eq!(config.win_margin, 2);
        assert_eq!(config.deuce_threshold, 10);
        assert_eq!(config.ball.serve_impulse, 5.0);
        assert_eq!(config.scoring_rule, ScoringRule::LandingSide);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: MatchConfig = toml::from_str(
            r#"
            match_duration = 120.0
            scoring_rule = "LastPaddle"

            [ball]
            max_velocity = 9.5
            "#,
        )
        .unwrap();

        assert_eq!(config.match_duration, 120.0);
        assert_eq!(config.scoring_rule, ScoringRule::LastPaddle);
        assert_eq!(config.ball.max_velocity, 9.5);
        assert_eq!(config.ball.min_velocity, 2.0);
        assert_eq!(config.points_to_win, 11);
    }

    #[test]
    fn test_serve_location_per_side() {
        let config = MatchConfig::default();
        assert!(config.serve_location(Side::Home).z < 0.0);
        assert!(config.serve_location(Side::Guest).z > 0.0);
    }
}
