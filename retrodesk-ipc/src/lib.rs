//! Inter-process communication between retrodesk and retrodeskctl
//!
//! We use Unix domain sockets for local IPC. Every message is one line of
//! JSON; the client writes a `Command`, the desktop answers with a `Response`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Commands that retrodeskctl can send to retrodesk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Start,
    Pause,
    Reset,
    Skip,
    Status,
    AddTask { text: String },
    DeleteTask { id: u64 },
    SelectTask { id: Option<u64> },
    ListTasks,
    Open { app: String },
    Minimize { app: String },
    Close { app: String },
    ShowDesktop,
    CloseAll,
    ListWindows,
}

/// Responses from retrodesk back to retrodeskctl
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Status(SessionStatus),
    Tasks(Vec<TaskSummary>),
    Windows(Vec<WindowSummary>),
    Error(String),
}

/// Pomodoro phase. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }

    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Focus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerState {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: Phase,
    pub state: TimerState,
    pub seconds_remaining: u32,
    pub total_seconds: u32,
    pub cycles_completed: u32,
    pub selected_task: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: u64,
    pub text: String,
    pub completed: bool,
    pub pomodoro_count: u32,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub id: u64,
    pub app: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub z_index: u64,
    pub minimized: bool,
    pub active: bool,
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused - is retrodesk running?")]
    ConnectionRefused,

    #[error("Connection closed before a message was received")]
    Closed,
}

pub const SOCKET_PATH: &str = "/tmp/retrodesk.sock";

/// Writes `message` as a single JSON line and flushes.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one JSON line. A closed stream yields `IpcError::Closed`.
pub async fn read_message<R, T>(reader: &mut R) -> Result<T, IpcError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Err(IpcError::Closed);
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn command_survives_the_wire() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut server = BufReader::new(server);

        write_message(&mut client, &Command::Open { app: "tasks".into() })
            .await
            .expect("write");
        let received: Command = read_message(&mut server).await.expect("read");

        assert_eq!(received, Command::Open { app: "tasks".into() });
    }

    #[tokio::test]
    async fn consecutive_messages_are_framed_by_newlines() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut server = BufReader::new(server);

        write_message(&mut client, &Command::Start).await.expect("write");
        write_message(&mut client, &Command::SelectTask { id: Some(7) })
            .await
            .expect("write");

        let first: Command = read_message(&mut server).await.expect("first");
        let second: Command = read_message(&mut server).await.expect("second");
        assert_eq!(first, Command::Start);
        assert_eq!(second, Command::SelectTask { id: Some(7) });
    }

    #[tokio::test]
    async fn closed_stream_is_reported() {
        let (client, server) = tokio::io::duplex(16);
        drop(client);
        let mut server = BufReader::new(server);

        let result: Result<Command, _> = read_message(&mut server).await;
        assert!(matches!(result, Err(IpcError::Closed)));
    }

    #[test]
    fn phase_serializes_in_snake_case() {
        let json = serde_json::to_string(&Phase::ShortBreak).expect("serialize");
        assert_eq!(json, "\"short_break\"");
        assert!(Phase::LongBreak.is_break());
        assert!(!Phase::Focus.is_break());
    }
}
