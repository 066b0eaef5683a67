use crate::config::TimerSettings;
use crate::error::SessionError;
use crate::tasks::TaskId;
use retrodesk_ipc::{Phase, SessionStatus, TimerState};
use serde::{Deserialize, Serialize};

/// What is written to storage; `is_running` is deliberately absent so a
/// reload always comes back paused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub seconds_remaining: u32,
    pub phase: Phase,
    pub cycles_completed: u32,
    pub selected_task_id: Option<TaskId>,
}

/// How the phase after a transition was left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStart {
    Running,
    Waiting,
    Blocked(SessionError),
}

/// Outcome of a phase ending, by expiry or by skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub completed: Phase,
    pub next: Phase,
    pub cycles_completed: u32,
    /// Task whose pomodoro count should go up. Only set for focus phases.
    pub credited_task: Option<TaskId>,
    /// Minutes credited to history: the configured focus length for a focus
    /// phase, the whole minutes actually spent for a break.
    pub minutes: u32,
    pub next_start: NextStart,
}

/// Pomodoro phase bookkeeping. Holds no timers; the controller feeds ticks.
#[derive(Debug, Clone)]
pub struct SessionMachine {
    settings: TimerSettings,
    phase: Phase,
    seconds_remaining: u32,
    cycles_completed: u32,
    running: bool,
    selected_task: Option<TaskId>,
}

impl SessionMachine {
    pub fn new(settings: TimerSettings) -> Self {
        Self {
            settings,
            phase: Phase::Focus,
            seconds_remaining: settings.duration_secs(Phase::Focus),
            cycles_completed: 0,
            running: false,
            selected_task: None,
        }
    }

    /// Rebuilds a paused machine from storage, pulling out-of-range values
    /// back inside the invariants.
    pub fn restore(settings: TimerSettings, persisted: &PersistedSession) -> Self {
        let full = settings.duration_secs(persisted.phase);
        let seconds_remaining = match persisted.seconds_remaining {
            0 => full,
            seconds => seconds.min(full),
        };
        Self {
            settings,
            phase: persisted.phase,
            seconds_remaining,
            cycles_completed: persisted.cycles_completed % settings.pomodoros_per_long_break.max(1),
            running: false,
            selected_task: persisted.selected_task_id,
        }
    }

    pub fn snapshot(&self) -> PersistedSession {
        PersistedSession {
            seconds_remaining: self.seconds_remaining,
            phase: self.phase,
            cycles_completed: self.cycles_completed,
            selected_task_id: self.selected_task,
        }
    }

    pub fn status(&self) -> SessionStatus {
        let total_seconds = self.total_seconds();
        let state = if self.running {
            TimerState::Running
        } else if self.seconds_remaining >= total_seconds {
            TimerState::Idle
        } else {
            TimerState::Paused
        };
        SessionStatus {
            phase: self.phase,
            state,
            seconds_remaining: self.seconds_remaining,
            total_seconds,
            cycles_completed: self.cycles_completed,
            selected_task: self.selected_task,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn selected_task(&self) -> Option<TaskId> {
        self.selected_task
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    pub fn total_seconds(&self) -> u32 {
        self.settings.duration_secs(self.phase)
    }

    pub fn select_task(&mut self, task: Option<TaskId>) {
        self.selected_task = task;
    }

    /// Takes effect when the next phase begins; the running countdown keeps
    /// its remaining seconds.
    pub fn set_settings(&mut self, settings: TimerSettings) {
        self.settings = settings;
    }

    /// `Ok(false)` when already running.
    pub fn start(&mut self) -> Result<bool, SessionError> {
        if self.running {
            return Ok(false);
        }
        if self.phase == Phase::Focus && self.selected_task.is_none() {
            return Err(SessionError::NoTaskSelected);
        }
        self.running = true;
        Ok(true)
    }

    /// Returns whether the machine was running.
    pub fn pause(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn reset(&mut self) {
        self.running = false;
        self.seconds_remaining = self.total_seconds();
    }

    /// One second elapsed. Returns the transition when the phase expires.
    pub fn tick(&mut self) -> Option<SessionEnd> {
        if !self.running {
            return None;
        }
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining > 0 {
            return None;
        }
        self.running = false;
        Some(self.finish_phase())
    }

    /// Ends the current phase now, exactly as if it had expired. A skipped
    /// focus phase still counts as completed.
    pub fn skip(&mut self) -> SessionEnd {
        self.running = false;
        self.finish_phase()
    }

    fn finish_phase(&mut self) -> SessionEnd {
        let completed = self.phase;
        let minutes = if completed.is_break() {
            self.total_seconds().saturating_sub(self.seconds_remaining) / 60
        } else {
            self.settings.minutes(completed)
        };
        let mut credited_task = None;

        let next = match completed {
            Phase::Focus => {
                credited_task = self.selected_task;
                self.cycles_completed += 1;
                if self.cycles_completed >= self.settings.pomodoros_per_long_break {
                    self.cycles_completed = 0;
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
        };

        self.phase = next;
        self.seconds_remaining = self.settings.duration_secs(next);

        let next_start = if self.settings.auto_start_breaks || next == Phase::Focus {
            match self.start() {
                Ok(_) => NextStart::Running,
                Err(e) => NextStart::Blocked(e),
            }
        } else {
            NextStart::Waiting
        };

        SessionEnd {
            completed,
            next,
            cycles_completed: self.cycles_completed,
            credited_task,
            minutes,
            next_start,
        }
    }
}
