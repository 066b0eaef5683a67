use anyhow::{Context, Result};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use retrodesk::config::{load_config, Config};
use retrodesk::notify::Notifier;
use retrodesk::persistence::{FileStore, Persistence};
use retrodesk::session::SessionEvent;
use retrodesk::tasks::{HttpTaskApi, InMemoryTaskApi, TaskApi};
use retrodesk::windows::AppType;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app;
mod ipc;
mod layout;
mod ui;

use app::{viewport_for, App};

const LOG_ENV: &str = "RETRODESK_LOG";
const REDRAW_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    let store = FileStore::open_default();
    init_logging(store.as_ref().ok().map(FileStore::dir));

    let config = load_config().unwrap_or_else(|e| {
        warn!("invalid configuration, using defaults: {}", e);
        Config::default()
    });
    let persistence = match store {
        Ok(store) => Persistence::new(store),
        Err(e) => {
            warn!("no data directory, state will not survive a restart: {}", e);
            Persistence::in_memory()
        }
    };
    let api = task_api(&config);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let (width, height) = crossterm::terminal::size()?;
    let mut app = App::new(
        config.clone(),
        api,
        persistence,
        viewport_for(&config, width, height),
    );
    app.refresh_tasks().await;
    app.open_app(AppType::Timer);
    let events = app.session.subscribe();
    let app = Arc::new(Mutex::new(app));

    let ipc_app = Arc::clone(&app);
    tokio::spawn(async move {
        if let Err(e) = ipc::server::start(ipc_app).await {
            error!("IPC server stopped: {:#}", e);
        }
    });
    tokio::spawn(forward_session_events(
        Arc::clone(&app),
        events,
        Notifier::new(config.timer.sound_enabled),
    ));

    let res = run_app(&mut terminal, Arc::clone(&app)).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    {
        let app = app.lock().await;
        app.session.pause();
        app.save_geometry();
    }
    let _ = std::fs::remove_file(retrodesk_ipc::SOCKET_PATH);
    info!("retrodesk exiting");

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

/// Logs go to a file so they never draw over the desktop.
fn init_logging(data_dir: Option<&Path>) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let log_file = data_dir.and_then(|dir| File::create(dir.join("retrodesk.log")).ok());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false);
    let _ = match log_file {
        Some(file) => builder.with_writer(std::sync::Mutex::new(file)).try_init(),
        None => builder.with_writer(io::sink).try_init(),
    };
}

fn task_api(config: &Config) -> Arc<dyn TaskApi> {
    let Some(base_url) = &config.api.base_url else {
        info!("no task backend configured, keeping tasks in memory");
        return Arc::new(InMemoryTaskApi::default());
    };
    match HttpTaskApi::new(base_url, config.api.token.clone()) {
        Ok(api) => {
            info!("using task backend at {}", base_url);
            Arc::new(api)
        }
        Err(e) => {
            warn!("unusable task backend, keeping tasks in memory: {}", e);
            Arc::new(InMemoryTaskApi::default())
        }
    }
}

async fn forward_session_events(
    app: Arc<Mutex<App>>,
    mut events: broadcast::Receiver<SessionEvent>,
    notifier: Notifier,
) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::SessionEnded(end)) => {
                tokio::task::spawn_blocking(move || notifier.session_ended(&end));
            }
            Ok(event @ (SessionEvent::TaskCredited(_) | SessionEvent::StartRejected(_))) => {
                app.lock().await.apply_session_event(&event);
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("missed {} session events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: Arc<Mutex<App>>) -> Result<()> {
    let mut events = EventStream::new();
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);

    loop {
        {
            let app = app.lock().await;
            if app.should_quit {
                return Ok(());
            }
            terminal.draw(|f| ui::draw(f, &app))?;
        }

        tokio::select! {
            _ = redraw.tick() => {}
            maybe_event = events.next() => {
                let Some(event) = maybe_event else {
                    return Ok(());
                };
                let event = event.context("failed to read terminal event")?;
                let mut app = app.lock().await;
                match event {
                    Event::Key(key) if key.kind == KeyEventKind::Press => app.handle_key(key).await,
                    Event::Mouse(mouse) => app.handle_mouse(mouse),
                    Event::Resize(width, height) => app.resize(width, height),
                    _ => {}
                }
            }
        }
    }
}
