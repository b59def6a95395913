use serde::{Deserialize, Serialize};
use shared::MatchConfig;
use std::path::Path;
use std::time::Duration;

/// Host settings, loadable from a TOML file.
///
/// ```toml
/// port = 9000
/// auto_start = true
///
/// [match]
/// match_duration = 120.0
///
/// [match.ball]
/// max_velocity = 10.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Fixed simulation ticks per second
    pub tick_rate: u32,
    pub max_clients: usize,
    /// Start the match as soon as a peer takes the Guest seat
    pub auto_start: bool,
    #[serde(rename = "match")]
    pub game: MatchConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_rate: 60,
            max_clients: 4,
            auto_start: false,
            game: MatchConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&text)?)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Length of one fixed tick. A zero tick rate is treated as 1 Hz.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::ScoringRule;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.tick_duration().as_millis(), 16);
        assert!(!config.auto_start);
    }

    #[test]
    fn test_from_toml_nested_match() {
        let config = ServerConfig::from_toml(
            r#"
            port = 9000
            auto_start = true

            [match]
            match_duration = 120.0
            scoring_rule = "LastPaddle"

            [match.ball]
            max_velocity = 10.0
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.auto_start);
        assert_eq!(config.game.match_duration, 120.0);
        assert_eq!(config.game.scoring_rule, ScoringRule::LastPaddle);
        assert_eq!(config.game.ball.max_velocity, 10.0);
        assert_eq!(config.game.ball.serve_impulse, 5.0);
    }

    #[test]
    fn test_zero_tick_rate() {
        let config = ServerConfig {
            tick_rate: 0,
            ..ServerConfig::default()
        };
        assert_eq!(config.tick_duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(ServerConfig::from_toml("port = \"not a number\"").is_err());
    }
}
