mod controller;
mod machine;

pub use controller::{SessionController, SessionEvent};
pub use machine::{NextStart, PersistedSession, SessionEnd, SessionMachine};
