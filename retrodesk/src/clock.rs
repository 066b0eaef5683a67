//! Cancellable repeating task on the tokio timer.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Handle to a scheduled repeating task. Dropping it cancels the task.
#[derive(Debug)]
pub struct TickHandle {
    task: Option<JoinHandle<()>>,
}

impl TickHandle {
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TickHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs `callback` every `period`, first firing one period from now.
///
/// The task ends when the callback returns `ControlFlow::Break` or the handle
/// is cancelled. Must be called from within a tokio runtime.
pub fn every<F>(period: Duration, mut callback: F) -> TickHandle
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if callback().is_break() {
                break;
            }
        }
        debug!("repeating task stopped");
    });
    TickHandle { task: Some(task) }
}
