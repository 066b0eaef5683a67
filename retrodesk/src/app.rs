use crate::layout::{self, app_for_key};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use retrodesk::config::{load_config, Config};
use retrodesk::drag::PointerAction;
use retrodesk::error::{DeskError, SessionError, TaskApiError};
use retrodesk::persistence::Persistence;
use retrodesk::session::{SessionController, SessionEvent};
use retrodesk::tasks::{Task, TaskApi, TaskId};
use retrodesk::windows::{
    AppType, NullHost, Point, SizeLimits, Viewport, WindowManager, WindowState,
};
use retrodesk_ipc::{SessionStatus, TaskSummary, TimerState, WindowSummary};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default, Clone, Copy, PartialEq, Eq, Debug)]
pub enum AppMode {
    #[default]
    Normal,
    AddingTask,
}

/// Desktop state shared by the terminal loop and the IPC server.
pub struct App {
    pub config: Config,
    pub windows: WindowManager,
    pub session: SessionController,
    pub tasks: Vec<Task>,
    pub task_cursor: usize,
    pub mode: AppMode,
    pub input_buffer: String,
    pub status_line: Option<String>,
    pub should_quit: bool,
    api: Arc<dyn TaskApi>,
    persistence: Persistence,
}

pub fn viewport_for(config: &Config, width: u16, height: u16) -> Viewport {
    Viewport {
        width: i32::from(width),
        height: i32::from(height),
        menu_bar_height: config.desktop.menu_bar_height,
    }
}

impl App {
    pub fn new(
        config: Config,
        api: Arc<dyn TaskApi>,
        persistence: Persistence,
        viewport: Viewport,
    ) -> Self {
        let windows = WindowManager::new(
            viewport,
            SizeLimits::from(&config.desktop),
            Box::new(NullHost),
        )
        .with_saved_geometry(persistence.load_geometry());
        let session = SessionController::load(config.timer, Arc::clone(&api), persistence.clone());
        Self {
            config,
            windows,
            session,
            tasks: Vec::new(),
            task_cursor: 0,
            mode: AppMode::Normal,
            input_buffer: String::new(),
            status_line: None,
            should_quit: false,
            api,
            persistence,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn selected_task(&self) -> Option<TaskId> {
        self.session.status().selected_task
    }

    fn notify(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!("status: {}", message);
        self.status_line = Some(message);
    }

    // Session

    pub fn start(&mut self) -> Result<(), SessionError> {
        let result = self.session.start();
        if let Err(e) = &result {
            self.notify(format!("{e}"));
        }
        result
    }

    /// Folds a session event into desktop state. Task counts only change
    /// once the backend has confirmed the credit.
    pub fn apply_session_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::TaskCredited(updated) => {
                if let Some(task) = self.tasks.iter_mut().find(|task| task.id == updated.id) {
                    *task = updated.clone();
                }
            }
            SessionEvent::StartRejected(e) => {
                self.notify(format!("Next session not started: {e}"));
            }
            _ => {}
        }
    }

    /// Adopts new settings. Timer changes take effect from the next phase.
    pub fn apply_config(&mut self, config: Config) {
        self.session.set_settings(config.timer);
        self.config = config;
        info!("configuration applied");
    }

    pub fn reload_config(&mut self) {
        match load_config() {
            Ok(config) => {
                self.apply_config(config);
                self.notify("Configuration reloaded");
            }
            Err(e) => {
                warn!("keeping current configuration: {}", e);
                self.notify(format!("Could not reload configuration: {e}"));
            }
        }
    }

    pub fn toggle_session(&mut self) {
        if self.status().state == TimerState::Running {
            self.session.pause();
        } else {
            // Already reported on the status line.
            let _ = self.start();
        }
    }

    // Tasks

    /// Reloads the task list. A persisted selection that no longer exists is
    /// dropped.
    pub async fn refresh_tasks(&mut self) {
        match self.api.list_tasks().await {
            Ok(tasks) => {
                self.tasks = tasks;
                if let Some(id) = self.selected_task() {
                    if !self.tasks.iter().any(|task| task.id == id) {
                        info!("selected task {} is gone", id);
                        self.session.select_task(None);
                    }
                }
                self.sync_cursor();
            }
            Err(e) => {
                warn!("failed to load tasks: {}", e);
                self.notify(format!("Could not load tasks: {e}"));
            }
        }
    }

    fn sync_cursor(&mut self) {
        if let Some(id) = self.selected_task() {
            if let Some(index) = self.tasks.iter().position(|task| task.id == id) {
                self.task_cursor = index;
                return;
            }
        }
        self.task_cursor = self.task_cursor.min(self.tasks.len().saturating_sub(1));
    }

    /// Selects `id` for the next focus phase. Fails when the task is unknown.
    pub fn select_task(&mut self, id: Option<TaskId>) -> Result<(), TaskApiError> {
        if let Some(id) = id {
            if !self.tasks.iter().any(|task| task.id == id) {
                return Err(TaskApiError::NotFound(id));
            }
        }
        self.session.select_task(id);
        self.sync_cursor();
        Ok(())
    }

    pub fn move_selection(&mut self, down: bool) {
        if self.tasks.is_empty() {
            return;
        }
        self.task_cursor = if down {
            (self.task_cursor + 1).min(self.tasks.len() - 1)
        } else {
            self.task_cursor.saturating_sub(1)
        };
        let id = self.tasks[self.task_cursor].id;
        self.session.select_task(Some(id));
    }

    pub async fn add_task(&mut self, text: &str) -> Result<Task, TaskApiError> {
        let task = self.api.create_task(text).await?;
        info!("added task {}", task.id);
        self.tasks.push(task.clone());
        if self.selected_task().is_none() {
            self.session.select_task(Some(task.id));
        }
        self.sync_cursor();
        Ok(task)
    }

    pub async fn delete_task(&mut self, id: TaskId) -> Result<(), TaskApiError> {
        self.api.delete_task(id).await?;
        self.tasks.retain(|task| task.id != id);
        if self.selected_task() == Some(id) {
            self.session.select_task(None);
        }
        self.sync_cursor();
        Ok(())
    }

    pub async fn delete_task_under_cursor(&mut self) {
        let Some(id) = self.tasks.get(self.task_cursor).map(|task| task.id) else {
            return;
        };
        if let Err(e) = self.delete_task(id).await {
            self.notify(format!("Could not delete task: {e}"));
        }
    }

    pub fn task_summaries(&self) -> Vec<TaskSummary> {
        let selected = self.selected_task();
        self.tasks
            .iter()
            .map(|task| TaskSummary {
                id: task.id,
                text: task.text.clone(),
                completed: task.completed,
                pomodoro_count: task.pomodoro_count,
                selected: selected == Some(task.id),
            })
            .collect()
    }

    // Windows

    pub fn open_app(&mut self, app: AppType) {
        self.windows.open(app);
    }

    pub fn open_named(&mut self, name: &str) -> Result<(), DeskError> {
        self.windows.open_named(name)?;
        Ok(())
    }

    pub fn minimize_named(&mut self, name: &str) -> Result<(), DeskError> {
        let app = name.parse::<AppType>()?;
        let window = self
            .windows
            .find(app)
            .ok_or_else(|| DeskError::NoWindow(app.to_string()))?;
        let id = window.id;
        self.windows.minimize(id);
        Ok(())
    }

    pub fn close_named(&mut self, name: &str) -> Result<(), DeskError> {
        let app = name.parse::<AppType>()?;
        let window = self
            .windows
            .find(app)
            .ok_or_else(|| DeskError::NoWindow(app.to_string()))?;
        let id = window.id;
        self.windows.close(id);
        self.save_geometry();
        Ok(())
    }

    pub fn close_active(&mut self) {
        if let Some(id) = self.windows.active() {
            self.windows.close(id);
            self.save_geometry();
        }
    }

    pub fn minimize_active(&mut self) {
        if let Some(id) = self.windows.active() {
            self.windows.minimize(id);
        }
    }

    pub fn show_desktop(&mut self) {
        self.windows.show_desktop();
    }

    pub fn close_all(&mut self) {
        self.windows.close_all();
        self.save_geometry();
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        let viewport = viewport_for(&self.config, width, height);
        self.windows.set_viewport(viewport);
    }

    pub fn save_geometry(&self) {
        if let Err(e) = self.persistence.save_geometry(&self.windows.geometry_snapshot()) {
            warn!("failed to save window geometry: {}", e);
        }
    }

    pub fn window_summaries(&self) -> Vec<WindowSummary> {
        let active = self.windows.active();
        self.windows
            .windows()
            .iter()
            .map(|window| WindowSummary {
                id: window.id.0,
                app: window.app.to_string(),
                x: window.geometry.x,
                y: window.geometry.y,
                width: window.geometry.width,
                height: window.geometry.height,
                z_index: window.z_index,
                minimized: window.state == WindowState::Minimized,
                active: active == Some(window.id),
            })
            .collect()
    }

    // Input

    pub fn handle_mouse(&mut self, event: MouseEvent) {
        let point = Point::new(i32::from(event.column), i32::from(event.row));
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => self.pointer_down(point),
            MouseEventKind::Drag(MouseButton::Left) => {
                self.windows.pointer_move(point);
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if self.windows.pointer_up(point).is_some() {
                    self.save_geometry();
                }
            }
            _ => {}
        }
    }

    fn pointer_down(&mut self, point: Point) {
        if let Some(id) = layout::taskbar_slot_at(&self.windows, point) {
            self.windows.restore(id);
            return;
        }
        match self.windows.pointer_down(point) {
            PointerAction::Missed => {
                if let Some(app) = layout::icon_at(self.windows.viewport(), point) {
                    self.open_app(app);
                }
            }
            PointerAction::Closed(_) => self.save_geometry(),
            _ => {}
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) {
        match self.mode {
            AppMode::Normal => self.handle_normal_key(key).await,
            AppMode::AddingTask => self.handle_input_key(key).await,
        }
    }

    async fn handle_normal_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        self.status_line = None;
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char(' ') => self.toggle_session(),
            KeyCode::Char('r') => self.session.reset(),
            KeyCode::Char('s') => self.session.skip(),
            KeyCode::Char('a') => {
                self.mode = AppMode::AddingTask;
                self.input_buffer.clear();
            }
            KeyCode::Char('d') => self.delete_task_under_cursor().await,
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(true),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(false),
            KeyCode::Char('D') => self.show_desktop(),
            KeyCode::Char('W') => self.close_all(),
            KeyCode::Char('x') | KeyCode::Esc => self.close_active(),
            KeyCode::Char('m') => self.minimize_active(),
            KeyCode::Char('L') => self.reload_config(),
            KeyCode::Char(c) => {
                if let Some(app) = app_for_key(c) {
                    self.open_app(app);
                }
            }
            _ => {}
        }
    }

    async fn handle_input_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.mode = AppMode::Normal;
                self.input_buffer.clear();
            }
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.input_buffer);
                self.mode = AppMode::Normal;
                if text.trim().is_empty() {
                    return;
                }
                if let Err(e) = self.add_task(&text).await {
                    self.notify(format!("Could not add task: {e}"));
                }
            }
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            KeyCode::Char(c) => self.input_buffer.push(c),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;
    use retrodesk::tasks::InMemoryTaskApi;
    use retrodesk_ipc::Phase;

    fn app_with(tasks: Vec<Task>) -> App {
        let config = Config::default();
        let viewport = viewport_for(&config, 120, 40);
        App::new(
            config,
            Arc::new(InMemoryTaskApi::with_tasks(tasks)),
            Persistence::in_memory(),
            viewport,
        )
    }

    fn task(id: TaskId, text: &str) -> Task {
        Task {
            id,
            text: text.to_string(),
            completed: false,
            pomodoro_count: 0,
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: crossterm::event::KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[tokio::test]
    async fn space_without_a_task_reports_instead_of_starting() {
        let mut app = app_with(vec![]);
        app.handle_key(key(KeyCode::Char(' '))).await;

        assert_eq!(app.status().state, TimerState::Idle);
        assert!(app.status_line.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn space_toggles_once_a_task_is_selected() {
        let mut app = app_with(vec![task(1, "read"), task(2, "write")]);
        app.refresh_tasks().await;
        app.handle_key(key(KeyCode::Char('j'))).await;
        assert_eq!(app.selected_task(), Some(2));

        app.handle_key(key(KeyCode::Char(' '))).await;
        assert_eq!(app.status().state, TimerState::Running);
        app.handle_key(key(KeyCode::Char(' '))).await;
        assert_ne!(app.status().state, TimerState::Running);
    }

    #[tokio::test]
    async fn typed_task_is_created_and_selected() {
        let mut app = app_with(vec![]);
        app.handle_key(key(KeyCode::Char('a'))).await;
        for c in "plan".chars() {
            app.handle_key(key(KeyCode::Char(c))).await;
        }
        app.handle_key(key(KeyCode::Enter)).await;

        assert_eq!(app.mode, AppMode::Normal);
        assert_eq!(app.tasks.len(), 1);
        assert_eq!(app.tasks[0].text, "plan");
        assert_eq!(app.selected_task(), Some(app.tasks[0].id));
    }

    #[tokio::test]
    async fn deleting_the_selected_task_clears_the_selection() {
        let mut app = app_with(vec![task(1, "read")]);
        app.refresh_tasks().await;
        app.select_task(Some(1)).unwrap();

        app.handle_key(key(KeyCode::Char('d'))).await;

        assert!(app.tasks.is_empty());
        assert_eq!(app.selected_task(), None);
    }

    #[tokio::test]
    async fn stale_persisted_selection_is_dropped_on_refresh() {
        let mut app = app_with(vec![task(1, "read")]);
        app.session.select_task(Some(99));

        app.refresh_tasks().await;

        assert_eq!(app.selected_task(), None);
    }

    #[tokio::test]
    async fn selecting_an_unknown_task_fails() {
        let mut app = app_with(vec![task(1, "read")]);
        app.refresh_tasks().await;
        assert!(matches!(app.select_task(Some(7)), Err(TaskApiError::NotFound(7))));
        assert_eq!(app.selected_task(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_key_moves_to_the_break() {
        let mut app = app_with(vec![task(1, "read")]);
        app.refresh_tasks().await;
        app.select_task(Some(1)).unwrap();

        app.handle_key(key(KeyCode::Char('s'))).await;

        assert_eq!(app.status().phase, Phase::ShortBreak);
    }

    #[tokio::test]
    async fn number_keys_open_apps() {
        let mut app = app_with(vec![]);
        app.handle_key(key(KeyCode::Char('1'))).await;
        app.handle_key(key(KeyCode::Char('2'))).await;

        let summaries = app.window_summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].app, "tasks");
        assert!(summaries[1].active);

        app.handle_key(key(KeyCode::Char('D'))).await;
        assert!(app.window_summaries().iter().all(|w| w.minimized));

        app.handle_key(key(KeyCode::Char('W'))).await;
        assert!(app.window_summaries().is_empty());
    }

    #[test]
    fn clicking_an_icon_opens_its_app() {
        let mut app = app_with(vec![]);
        let (_, at) = layout::icon_slots(app.windows.viewport())[2];

        app.handle_mouse(mouse(
            MouseEventKind::Down(MouseButton::Left),
            at.x as u16 + 1,
            at.y as u16,
        ));

        assert!(app.windows.find(AppType::Dashboard).is_some());
    }

    #[test]
    fn dragging_a_title_bar_moves_and_remembers_the_window() {
        let mut app = app_with(vec![]);
        app.open_app(AppType::Timer);
        let start = app.windows.find(AppType::Timer).unwrap().geometry;
        let (x, y) = (start.x as u16 + 2, start.y as u16);

        app.handle_mouse(mouse(MouseEventKind::Down(MouseButton::Left), x, y));
        app.handle_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), x + 10, y + 5));
        app.handle_mouse(mouse(MouseEventKind::Up(MouseButton::Left), x + 10, y + 5));

        let moved = app.windows.find(AppType::Timer).unwrap().geometry;
        assert_eq!((moved.x, moved.y), (start.x + 10, start.y + 5));
        assert_eq!(app.persistence.load_geometry().get(&AppType::Timer), Some(&moved));
    }

    #[test]
    fn taskbar_click_restores_a_minimized_window() {
        let mut app = app_with(vec![]);
        app.open_app(AppType::About);
        app.minimize_active();
        let slot = layout::taskbar_slots(&app.windows)[0].clone();

        app.handle_mouse(mouse(
            MouseEventKind::Down(MouseButton::Left),
            slot.x as u16,
            0,
        ));

        let window = app.windows.find(AppType::About).unwrap();
        assert_eq!(window.state, WindowState::Normal);
        assert_eq!(app.windows.active(), Some(window.id));
    }

    #[test]
    fn named_window_commands_report_unknown_apps() {
        let mut app = app_with(vec![]);
        assert_eq!(
            app.open_named("solitaire"),
            Err(DeskError::UnknownApp("solitaire".to_string()))
        );
        assert_eq!(
            app.close_named("timer"),
            Err(DeskError::NoWindow("timer".to_string()))
        );
        app.open_named("Timer").unwrap();
        app.minimize_named("timer").unwrap();
        assert!(app.window_summaries()[0].minimized);
    }

    #[test]
    fn terminal_resize_pulls_windows_inside() {
        let mut app = app_with(vec![]);
        app.open_app(AppType::Tasks);
        app.resize(60, 20);

        let geometry = app.windows.find(AppType::Tasks).unwrap().geometry;
        assert!(geometry.right() <= 60);
        assert!(geometry.bottom() <= 20);
    }

    struct RejectingTaskApi {
        tasks: Vec<Task>,
    }

    #[async_trait::async_trait]
    impl TaskApi for RejectingTaskApi {
        async fn list_tasks(&self) -> Result<Vec<Task>, TaskApiError> {
            Ok(self.tasks.clone())
        }

        async fn create_task(&self, _text: &str) -> Result<Task, TaskApiError> {
            Err(rejected())
        }

        async fn delete_task(&self, _id: TaskId) -> Result<(), TaskApiError> {
            Err(rejected())
        }

        async fn increment_pomodoro_count(&self, _id: TaskId) -> Result<Task, TaskApiError> {
            Err(rejected())
        }
    }

    fn rejected() -> TaskApiError {
        TaskApiError::Http {
            status: 500,
            body: "backend down".to_string(),
        }
    }

    async fn settle(app: &mut App, events: &mut tokio::sync::broadcast::Receiver<SessionEvent>) {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        while let Ok(event) = events.try_recv() {
            app.apply_session_event(&event);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_credit_updates_the_task_list() {
        let mut app = app_with(vec![task(1, "read")]);
        app.refresh_tasks().await;
        app.select_task(Some(1)).unwrap();
        let mut events = app.session.subscribe();

        app.session.skip();
        settle(&mut app, &mut events).await;

        assert_eq!(app.tasks[0].pomodoro_count, 1);
        assert_eq!(app.task_summaries()[0].pomodoro_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_credit_leaves_the_count_alone() {
        let config = Config::default();
        let viewport = viewport_for(&config, 120, 40);
        let mut app = App::new(
            config,
            Arc::new(RejectingTaskApi {
                tasks: vec![task(1, "read")],
            }),
            Persistence::in_memory(),
            viewport,
        );
        app.refresh_tasks().await;
        app.select_task(Some(1)).unwrap();
        let mut events = app.session.subscribe();

        app.session.skip();
        settle(&mut app, &mut events).await;

        assert_eq!(app.status().phase, Phase::ShortBreak);
        assert_eq!(app.tasks[0].pomodoro_count, 0);
    }

    #[tokio::test]
    async fn blocked_start_shows_on_the_status_line() {
        let mut app = app_with(vec![]);
        app.apply_session_event(&SessionEvent::StartRejected(SessionError::NoTaskSelected));
        assert!(app
            .status_line
            .as_deref()
            .is_some_and(|line| line.starts_with("Next session not started")));
    }

    #[tokio::test]
    async fn applied_config_changes_the_next_phase_length() {
        let mut app = app_with(vec![]);
        let mut config = Config::default();
        config.timer.focus_minutes = 50;

        app.apply_config(config);

        assert_eq!(app.config.timer.focus_minutes, 50);
        assert_eq!(app.session.settings().focus_minutes, 50);
        app.session.reset();
        assert_eq!(app.status().seconds_remaining, 50 * 60);
    }
}
