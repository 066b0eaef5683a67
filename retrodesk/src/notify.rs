//! Desktop notifications for phase transitions.

use crate::session::{NextStart, SessionEnd};
use retrodesk_ipc::Phase;
use std::io::Write;
use tracing::{debug, warn};

const APP_NAME: &str = "retrodesk";

#[derive(Debug, Clone, Copy)]
pub struct Notifier {
    sound_enabled: bool,
}

impl Notifier {
    pub fn new(sound_enabled: bool) -> Self {
        Self { sound_enabled }
    }

    pub fn session_ended(&self, end: &SessionEnd) {
        let (summary, body) = message(end);
        self.send(&summary, &body);
    }

    pub fn send(&self, summary: &str, body: &str) {
        if let Err(e) = notify_rust::Notification::new()
            .summary(summary)
            .body(body)
            .appname(APP_NAME)
            .show()
        {
            warn!("failed to send notification: {}", e);
        }
        if self.sound_enabled {
            self.bell();
        }
    }

    fn bell(&self) {
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
            debug!("bell failed: {}", e);
        }
    }
}

/// Summary and body shown when a phase ends.
pub fn message(end: &SessionEnd) -> (String, String) {
    let summary = if end.completed.is_break() {
        format!("{} over", end.completed.label())
    } else {
        "Focus session complete".to_string()
    };
    let body = match (&end.next_start, end.next) {
        (NextStart::Blocked(_), _) => "Select a task to start the next focus session.".to_string(),
        (NextStart::Running, Phase::Focus) => "Back to work.".to_string(),
        (NextStart::Running, next) => format!("{} started.", next.label()),
        (NextStart::Waiting, Phase::LongBreak) => {
            "Time for a long break. Press start when ready.".to_string()
        }
        (NextStart::Waiting, next) => format!("{} is ready. Press start when ready.", next.label()),
    };
    (summary, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SessionError;

    fn end(completed: Phase, next: Phase, next_start: NextStart) -> SessionEnd {
        SessionEnd {
            completed,
            next,
            cycles_completed: 0,
            credited_task: None,
            minutes: 25,
            next_start,
        }
    }

    #[test]
    fn focus_end_announces_the_break() {
        let (summary, body) = message(&end(Phase::Focus, Phase::LongBreak, NextStart::Waiting));
        assert_eq!(summary, "Focus session complete");
        assert!(body.contains("long break"));
    }

    #[test]
    fn break_end_with_no_task_asks_for_one() {
        let (summary, body) = message(&end(
            Phase::ShortBreak,
            Phase::Focus,
            NextStart::Blocked(SessionError::NoTaskSelected),
        ));
        assert!(summary.ends_with("over"));
        assert!(body.contains("Select a task"));
    }

    #[test]
    fn auto_started_focus_says_so() {
        let (_, body) = message(&end(Phase::LongBreak, Phase::Focus, NextStart::Running));
        assert_eq!(body, "Back to work.");
    }
}
