//! Core of the retro desktop: the pomodoro session engine, the window
//! registry with pointer gestures, and the storage and task-backend seams the
//! terminal frontend plugs into.

pub mod clock;
pub mod config;
pub mod drag;
pub mod error;
pub mod history;
pub mod notify;
pub mod persistence;
pub mod session;
pub mod tasks;
pub mod windows;
