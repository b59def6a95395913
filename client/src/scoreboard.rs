use log::warn;
use parking_lot::Mutex;
use shared::{BallState, SessionListener, SessionState, Side};
use std::io::Write;
use std::sync::Arc;

/// Formats remaining seconds as `MM:SS`, rounding down.
pub fn format_clock(remaining_seconds: f32) -> String {
    let total = remaining_seconds.max(0.0).floor() as u32;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// What the scoreboard currently shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreboardView {
    pub session: SessionState,
    pub host_score: u32,
    pub guest_score: u32,
    pub remaining_seconds: f32,
    pub serve_side: Side,
    pub ball: BallState,
    pub winner: Option<Side>,
}

impl Default for ScoreboardView {
    fn default() -> Self {
        Self {
            session: SessionState::Inactive,
            host_score: 0,
            guest_score: 0,
            remaining_seconds: 0.0,
            serve_side: Side::Home,
            ball: BallState::Held,
            winner: None,
        }
    }
}

impl ScoreboardView {
    pub fn score_line(&self) -> String {
        format!(
            "[{}] Home {} - {} Guest",
            format_clock(self.remaining_seconds),
            self.host_score,
            self.guest_score
        )
    }

    pub fn status_line(&self) -> String {
        let mut line = format!(
            "{} | {:?} | {} to serve",
            self.score_line(),
            self.session,
            self.serve_side
        );
        if let Some(winner) = self.winner {
            line.push_str(&format!(" | {} won", winner));
        }
        line
    }
}

/// Console presentation sink. Prints one line per visible change and keeps
/// a [`ScoreboardView`] other tasks can read through [`ConsoleScoreboard::view`].
pub struct ConsoleScoreboard {
    view: Arc<Mutex<ScoreboardView>>,
    out: Box<dyn Write + Send>,
    shown_minute: Option<u32>,
}

impl ConsoleScoreboard {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            view: Arc::new(Mutex::new(ScoreboardView::default())),
            out,
            shown_minute: None,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn view(&self) -> Arc<Mutex<ScoreboardView>> {
        Arc::clone(&self.view)
    }

    fn print(&mut self, line: String) {
        if let Err(e) = writeln!(self.out, "{}", line).and_then(|_| self.out.flush()) {
            warn!("Scoreboard output failed: {}", e);
        }
    }
}

impl SessionListener for ConsoleScoreboard {
    fn on_session_state_changed(&mut self, _previous: SessionState, current: SessionState) {
        let line = {
            let mut view = self.view.lock();
            view.session = current;
            view.status_line()
        };
        self.print(line);
    }

    fn on_score_changed(&mut self, side: Side, score: u32) {
        let line = {
            let mut view = self.view.lock();
            match side {
                Side::Home => view.host_score = score,
                Side::Guest => view.guest_score = score,
            }
            view.score_line()
        };
        self.print(line);
    }

    fn on_timer_changed(&mut self, remaining_seconds: f32) {
        let line = {
            let mut view = self.view.lock();
            view.remaining_seconds = remaining_seconds;
            view.score_line()
        };
        // Only announce whole minutes
        let minute = (remaining_seconds.max(0.0) / 60.0).floor() as u32;
        if self.shown_minute != Some(minute) {
            self.shown_minute = Some(minute);
            self.print(line);
        }
    }

    fn on_ball_state_changed(&mut self, _previous: BallState, current: BallState) {
        self.view.lock().ball = current;
    }

    fn on_serve_side_changed(&mut self, side: Side) {
        self.view.lock().serve_side = side;
        self.print(format!("{} to serve", side));
    }

    fn on_winner_changed(&mut self, winner: Option<Side>) {
        self.view.lock().winner = winner;
        if let Some(winner) = winner {
            self.print(format!("{} wins the match!", winner));
        }
    }
}
