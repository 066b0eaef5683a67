//! Drives a [`SessionMachine`] from a one-second tick and runs the side
//! effects of each phase transition.

use super::machine::{NextStart, SessionEnd, SessionMachine};
use crate::clock::{self, TickHandle, TICK_PERIOD};
use crate::config::TimerSettings;
use crate::error::SessionError;
use crate::history::SessionHistory;
use crate::persistence::Persistence;
use crate::tasks::{Task, TaskApi, TaskId};
use chrono::Local;
use retrodesk_ipc::{Phase, SessionStatus};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Tick { seconds_remaining: u32 },
    StateChanged { phase: Phase, running: bool },
    SessionEnded(SessionEnd),
    /// The backend stored a pomodoro credit; carries the updated task.
    TaskCredited(Task),
    /// A phase that should have started on its own could not.
    StartRejected(SessionError),
}

struct Inner {
    machine: SessionMachine,
    history: SessionHistory,
    ticker: Option<TickHandle>,
    /// Bumped whenever the ticker is replaced or stopped; stale ticks compare
    /// against it and bail out.
    generation: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    events: broadcast::Sender<SessionEvent>,
    tasks: Arc<dyn TaskApi>,
    persistence: Persistence,
}

/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    pub fn new(
        machine: SessionMachine,
        history: SessionHistory,
        tasks: Arc<dyn TaskApi>,
        persistence: Persistence,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    machine,
                    history,
                    ticker: None,
                    generation: 0,
                }),
                events,
                tasks,
                persistence,
            }),
        }
    }

    /// Restores the last saved session and history, or starts fresh.
    pub fn load(settings: TimerSettings, tasks: Arc<dyn TaskApi>, persistence: Persistence) -> Self {
        let machine = match persistence.load_session() {
            Some(saved) => SessionMachine::restore(settings, &saved),
            None => SessionMachine::new(settings),
        };
        let history = persistence.load_history();
        Self::new(machine, history, tasks, persistence)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.shared.lock().machine.status()
    }

    pub fn history(&self) -> SessionHistory {
        self.shared.lock().history.clone()
    }

    pub fn settings(&self) -> TimerSettings {
        *self.shared.lock().machine.settings()
    }

    pub fn is_ticking(&self) -> bool {
        self.shared
            .lock()
            .ticker
            .as_ref()
            .is_some_and(TickHandle::is_active)
    }

    /// Begins counting down. A second call while running does nothing.
    pub fn start(&self) -> Result<(), SessionError> {
        let mut inner = self.shared.lock();
        if inner.machine.start()? {
            self.arm(&mut inner);
            self.shared.emit_state(&inner);
            self.shared.persist(&inner);
            info!("started {}", inner.machine.phase().label());
        }
        Ok(())
    }

    /// Stops the countdown. No tick lands after this returns.
    pub fn pause(&self) {
        let mut inner = self.shared.lock();
        Shared::disarm(&mut inner);
        if inner.machine.pause() {
            self.shared.emit_state(&inner);
            self.shared.persist(&inner);
            info!("paused at {}s", inner.machine.seconds_remaining());
        }
    }

    pub fn reset(&self) {
        let mut inner = self.shared.lock();
        Shared::disarm(&mut inner);
        inner.machine.reset();
        self.shared.emit_state(&inner);
        self.shared.emit_tick(&inner);
        self.shared.persist(&inner);
    }

    pub fn skip(&self) {
        let mut inner = self.shared.lock();
        Shared::disarm(&mut inner);
        let end = inner.machine.skip();
        info!("skipped {}", end.completed.label());
        self.shared.finish(&mut inner, end);
        if inner.machine.is_running() {
            self.arm(&mut inner);
        }
    }

    pub fn select_task(&self, task: Option<TaskId>) {
        let mut inner = self.shared.lock();
        inner.machine.select_task(task);
        self.shared.persist(&inner);
    }

    pub fn set_settings(&self, settings: TimerSettings) {
        self.shared.lock().machine.set_settings(settings);
    }

    fn arm(&self, inner: &mut Inner) {
        inner.generation += 1;
        let generation = inner.generation;
        let shared = Arc::downgrade(&self.shared);
        inner.ticker = Some(clock::every(TICK_PERIOD, move || {
            Shared::on_tick(&shared, generation)
        }));
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disarm(inner: &mut Inner) {
        inner.generation += 1;
        if let Some(mut ticker) = inner.ticker.take() {
            ticker.cancel();
        }
    }

    fn on_tick(shared: &Weak<Shared>, generation: u64) -> ControlFlow<()> {
        // The controller is gone; nothing left to drive.
        let Some(shared) = shared.upgrade() else {
            return ControlFlow::Break(());
        };
        let mut inner = shared.lock();
        if inner.generation != generation || !inner.machine.is_running() {
            return ControlFlow::Break(());
        }

        let end = inner.machine.tick();
        match end {
            Some(end) => shared.finish(&mut inner, end),
            None => {
                shared.emit_tick(&inner);
                shared.persist(&inner);
            }
        }

        if inner.machine.is_running() {
            ControlFlow::Continue(())
        } else {
            debug!("countdown stopped at phase end");
            ControlFlow::Break(())
        }
    }

    /// Records the completed phase, credits the task and announces the new
    /// phase. Persistence and task-API failures are logged only.
    fn finish(&self, inner: &mut Inner, end: SessionEnd) {
        let today = Local::now().date_naive();
        if !end.completed.is_break() {
            inner.history.record_focus(today, end.minutes);
        } else if end.minutes > 0 {
            inner.history.record_break(today, end.minutes);
        }
        if let Err(e) = self.persistence.save_history(&inner.history) {
            warn!("failed to save session history: {}", e);
        }

        if let Some(task) = end.credited_task {
            self.credit_task(task);
        }

        info!(
            "{} finished, next {} (cycles {})",
            end.completed.label(),
            end.next.label(),
            end.cycles_completed
        );
        let next_start = end.next_start.clone();
        self.emit(SessionEvent::SessionEnded(end));
        self.emit(SessionEvent::StateChanged {
            phase: inner.machine.phase(),
            running: false,
        });
        self.emit_tick(inner);
        match next_start {
            NextStart::Running => self.emit_state(inner),
            NextStart::Blocked(e) => self.emit(SessionEvent::StartRejected(e)),
            NextStart::Waiting => {}
        }
        self.persist(inner);
    }

    fn credit_task(&self, task: TaskId) {
        let tasks = Arc::clone(&self.tasks);
        let events = self.events.clone();
        tokio::spawn(async move {
            match tasks.increment_pomodoro_count(task).await {
                Ok(updated) => {
                    debug!(
                        "task {} now has {} pomodoros",
                        updated.id, updated.pomodoro_count
                    );
                    let _ = events.send(SessionEvent::TaskCredited(updated));
                }
                Err(e) => warn!("failed to credit task {}: {}", task, e),
            }
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn emit_state(&self, inner: &Inner) {
        self.emit(SessionEvent::StateChanged {
            phase: inner.machine.phase(),
            running: inner.machine.is_running(),
        });
    }

    fn emit_tick(&self, inner: &Inner) {
        self.emit(SessionEvent::Tick {
            seconds_remaining: inner.machine.seconds_remaining(),
        });
    }

    fn persist(&self, inner: &Inner) {
        if let Err(e) = self.persistence.save_session(&inner.machine.snapshot()) {
            warn!("failed to save session: {}", e);
        }
    }
}
