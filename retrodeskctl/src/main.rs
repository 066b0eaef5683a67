use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use retrodesk_ipc::{
    read_message, write_message, Command, IpcError, Response, SessionStatus, TimerState,
    SOCKET_PATH,
};
use tokio::io::BufReader;
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "retrodeskctl")]
#[command(about = "Control the Retrodesk timer and windows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the current phase
    Start,
    /// Pause the timer
    Pause,
    /// Reset the current phase to its full duration
    Reset,
    /// End the current phase now
    Skip,
    /// Get timer status
    Status,
    /// Add, delete or select a task
    Task {
        #[arg(short, long)]
        add: Option<String>,
        #[arg(short, long)]
        delete: Option<u64>,
        #[arg(short, long)]
        select: Option<u64>,
        /// Clear the task selection
        #[arg(long)]
        deselect: bool,
    },
    /// List all tasks
    Tasks,
    /// Open (or focus) an app window
    Open { app: String },
    /// Minimize an app window
    Minimize { app: String },
    /// Close an app window
    Close { app: String },
    /// Minimize every window
    ShowDesktop,
    /// Close every window
    CloseAll,
    /// List open windows
    Windows,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Convert CLI command to IPC command
    let command = match cli.command {
        Commands::Start => Command::Start,
        Commands::Pause => Command::Pause,
        Commands::Reset => Command::Reset,
        Commands::Skip => Command::Skip,
        Commands::Status => Command::Status,
        Commands::Task { add: Some(text), .. } => Command::AddTask { text },
        Commands::Task {
            delete: Some(id), ..
        } => Command::DeleteTask { id },
        Commands::Task {
            select: Some(id), ..
        } => Command::SelectTask { id: Some(id) },
        Commands::Task { deselect: true, .. } => Command::SelectTask { id: None },
        Commands::Task { .. } | Commands::Tasks => Command::ListTasks,
        Commands::Open { app } => Command::Open { app },
        Commands::Minimize { app } => Command::Minimize { app },
        Commands::Close { app } => Command::Close { app },
        Commands::ShowDesktop => Command::ShowDesktop,
        Commands::CloseAll => Command::CloseAll,
        Commands::Windows => Command::ListWindows,
    };

    let response = send_command(command)
        .await
        .context("failed to talk to retrodesk")?;

    match response {
        Response::Ok => println!("OK"),
        Response::Status(status) => print_status(&status),
        Response::Tasks(tasks) => {
            for task in tasks {
                let check = if task.completed { "✓" } else { " " };
                let marker = if task.selected { "▸" } else { " " };
                println!(
                    "{}[{}] {}: {} ({} pomodoros)",
                    marker, check, task.id, task.text, task.pomodoro_count
                );
            }
        }
        Response::Windows(windows) => {
            for window in windows {
                let flag = if window.minimized {
                    "minimized"
                } else if window.active {
                    "active"
                } else {
                    ""
                };
                println!(
                    "{:>4} {:<11} {}x{} at ({}, {}) z={} {}",
                    window.id,
                    window.app,
                    window.width,
                    window.height,
                    window.x,
                    window.y,
                    window.z_index,
                    flag
                );
            }
        }
        Response::Error(e) => eprintln!("Error: {}", e),
    }

    Ok(())
}

fn print_status(status: &SessionStatus) {
    let state = match status.state {
        TimerState::Idle => "idle",
        TimerState::Running => "running",
        TimerState::Paused => "paused",
    };
    println!("Phase: {} ({})", status.phase.label(), state);
    println!(
        "Remaining: {:02}:{:02} of {:02}:{:02}",
        status.seconds_remaining / 60,
        status.seconds_remaining % 60,
        status.total_seconds / 60,
        status.total_seconds % 60
    );
    println!("Cycles: {}", status.cycles_completed);
    match status.selected_task {
        Some(id) => println!("Task: {}", id),
        None => println!("Task: none"),
    }
}

async fn send_command(cmd: Command) -> Result<Response, IpcError> {
    let stream = UnixStream::connect(SOCKET_PATH).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::ConnectionRefused | std::io::ErrorKind::NotFound => {
            IpcError::ConnectionRefused
        }
        _ => IpcError::Io(e),
    })?;
    let (reader, mut writer) = stream.into_split();

    write_message(&mut writer, &cmd).await?;

    let mut reader = BufReader::new(reader);
    read_message(&mut reader).await
}
