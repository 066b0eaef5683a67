//! Unix domain socket server for IPC

use crate::app::App;
use anyhow::{Context, Result};
use retrodesk_ipc::{read_message, write_message, Command, IpcError, Response, SOCKET_PATH};
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

pub async fn start(app: Arc<Mutex<App>>) -> Result<()> {
    serve(Path::new(SOCKET_PATH), app).await
}

pub async fn serve(path: &Path, app: Arc<Mutex<App>>) -> Result<()> {
    // A previous run may have left its socket behind.
    let _ = std::fs::remove_file(path);

    let listener = UnixListener::bind(path)
        .with_context(|| format!("failed to bind {}", path.display()))?;
    info!("IPC server listening on {}", path.display());

    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                let app = Arc::clone(&app);
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, app).await {
                        error!("Error handling client: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
            }
        }
    }
}

async fn handle_client(stream: UnixStream, app: Arc<Mutex<App>>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let command: Command = match read_message(&mut reader).await {
            Ok(command) => command,
            Err(IpcError::Closed) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        debug!("ipc command {:?}", command);
        let response = execute(&app, command).await;
        write_message(&mut writer, &response).await?;
    }
}

/// Applies one command to the shared desktop.
pub async fn execute(app: &Mutex<App>, command: Command) -> Response {
    let mut app = app.lock().await;
    match command {
        Command::Start => match app.start() {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error(e.to_string()),
        },
        Command::Pause => {
            app.session.pause();
            Response::Ok
        }
        Command::Reset => {
            app.session.reset();
            Response::Ok
        }
        Command::Skip => {
            app.session.skip();
            Response::Ok
        }
        Command::Status => Response::Status(app.status()),
        Command::AddTask { text } => match app.add_task(&text).await {
            Ok(_) => Response::Tasks(app.task_summaries()),
            Err(e) => Response::Error(e.to_string()),
        },
        Command::DeleteTask { id } => match app.delete_task(id).await {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error(e.to_string()),
        },
        Command::SelectTask { id } => match app.select_task(id) {
            Ok(()) => Response::Ok,
            Err(e) => Response::Error(e.to_string()),
        },
        Command::ListTasks => Response::Tasks(app.task_summaries()),
        Command::Open { app: name } => desk_response(app.open_named(&name)),
        Command::Minimize { app: name } => desk_response(app.minimize_named(&name)),
        Command::Close { app: name } => desk_response(app.close_named(&name)),
        Command::ShowDesktop => {
            app.show_desktop();
            Response::Ok
        }
        Command::CloseAll => {
            app.close_all();
            Response::Ok
        }
        Command::ListWindows => Response::Windows(app.window_summaries()),
    }
}

fn desk_response(result: Result<(), retrodesk::error::DeskError>) -> Response {
    match result {
        Ok(()) => Response::Ok,
        Err(e) => Response::Error(e.to_string()),
    }
}
