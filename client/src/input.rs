use shared::{Command, ParseCommandError};
use std::time::{Duration, Instant};

/// Something the player typed on the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(Command),
    /// Swing the paddle at the ball
    Hit,
    /// Ask the host for a full snapshot
    Sync,
    Quit,
}

/// Turns console lines into inputs and debounces paddle swings.
pub struct InputManager {
    hit_cooldown: Duration,
    last_hit: Option<Instant>,
}

impl InputManager {
    pub fn new() -> Self {
        Self::with_cooldown(Duration::from_millis(100))
    }

    pub fn with_cooldown(hit_cooldown: Duration) -> Self {
        Self {
            hit_cooldown,
            last_hit: None,
        }
    }

    /// Parses one line. Blank lines and swings repeated within the cooldown
    /// yield `None`.
    pub fn parse(&mut self, line: &str) -> Result<Option<ConsoleInput>, ParseCommandError> {
        self.parse_at(line, Instant::now())
    }

    pub fn parse_at(
        &mut self,
        line: &str,
        now: Instant,
    ) -> Result<Option<ConsoleInput>, ParseCommandError> {
        let word = line.trim().to_ascii_lowercase();
        let input = match word.as_str() {
            "" => return Ok(None),
            "hit" | "h" => ConsoleInput::Hit,
            "sync" => ConsoleInput::Sync,
            "quit" | "exit" | "q" => ConsoleInput::Quit,
            other => ConsoleInput::Command(other.parse()?),
        };

        if input == ConsoleInput::Hit {
            if let Some(last) = self.last_hit {
                if now.duration_since(last) < self.hit_cooldown {
                    return Ok(None);
                }
            }
            self.last_hit = Some(now);
        }

        Ok(Some(input))
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands_and_keywords() {
        let mut input = InputManager::new();
        assert_eq!(
            input.parse("serve\n"),
            Ok(Some(ConsoleInput::Command(Command::Serve)))
        );
        assert_eq!(
            input.parse("  Restart "),
            Ok(Some(ConsoleInput::Command(Command::Restart)))
        );
        assert_eq!(input.parse("sync"), Ok(Some(ConsoleInput::Sync)));
        assert_eq!(input.parse("q"), Ok(Some(ConsoleInput::Quit)));
        assert_eq!(input.parse("   "), Ok(None));
        assert!(input.parse("jump").is_err());
    }

    #[test]
    fn test_hit_cooldown() {
        let mut input = InputManager::with_cooldown(Duration::from_millis(100));
        let start = Instant::now();

        assert_eq!(input.parse_at("hit", start), Ok(Some(ConsoleInput::Hit)));
        assert_eq!(
            input.parse_at("hit", start + Duration::from_millis(50)),
            Ok(None)
        );
        assert_eq!(
            input.parse_at("h", start + Duration::from_millis(150)),
            Ok(Some(ConsoleInput::Hit))
        );
    }
}
