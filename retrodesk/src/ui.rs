use crate::app::{App, AppMode};
use crate::layout::{self, key_for_app, ICON_WIDTH};
use chrono::Local;
use retrodesk::drag::BUTTON_WIDTH;
use retrodesk::windows::{AppType, Geometry, WindowRecord};
use retrodesk_ipc::{Phase, TimerState};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Gauge, Paragraph, Wrap},
    Frame,
};

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let menu_height = (app.config.desktop.menu_bar_height.max(0) as u16).min(area.height);
    let menu_area = Rect::new(area.x, area.y, area.width, menu_height);
    let desktop_area = Rect::new(
        area.x,
        area.y + menu_height,
        area.width,
        area.height - menu_height,
    );

    draw_desktop(f, desktop_area, app);
    let active = app.windows.active();
    for window in app.windows.windows_in_paint_order() {
        draw_window(f, area, app, window, active == Some(window.id));
    }
    draw_menu_bar(f, menu_area, app);
    draw_status_line(f, desktop_area, app);
}

fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn state_icon(app: &App, state: TimerState) -> &str {
    let icons = &app.config.icons;
    match state {
        TimerState::Running => &icons.play,
        TimerState::Paused => &icons.pause,
        TimerState::Idle => &icons.stop,
    }
}

fn draw_menu_bar(f: &mut Frame, area: Rect, app: &App) {
    if area.height == 0 {
        return;
    }
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let status = app.status();
    let bar_style = Style::default().bg(theme.foreground).fg(theme.background);

    let line = Line::from(vec![
        Span::styled(" RetroDesk ", bar_style.add_modifier(Modifier::BOLD)),
        Span::styled(format!("{} ", icons.separator), bar_style),
        Span::styled(format!("{} ", Local::now().format("%H:%M")), bar_style),
        Span::styled(format!("{} ", icons.separator), bar_style),
        Span::styled(
            format!(
                "{} {} {} ",
                state_icon(app, status.state),
                status.phase.label(),
                format_clock(status.seconds_remaining)
            ),
            bar_style.fg(phase_color(app, status.phase)),
        ),
    ]);
    f.render_widget(Paragraph::new(line).style(bar_style), area);

    let buf = f.buffer_mut();
    for slot in layout::taskbar_slots(&app.windows) {
        buf.set_string(
            area.x + slot.x as u16,
            area.y,
            &slot.label,
            bar_style.add_modifier(Modifier::REVERSED),
        );
    }
}

fn phase_color(app: &App, phase: Phase) -> ratatui::style::Color {
    match phase {
        Phase::Focus => app.config.theme.red,
        Phase::ShortBreak => app.config.theme.green,
        Phase::LongBreak => app.config.theme.blue,
    }
}

fn draw_desktop(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    f.render_widget(Block::default().style(Style::default().bg(theme.desktop)), area);

    let icon_style = Style::default().bg(theme.desktop).fg(theme.foreground);
    let buf = f.buffer_mut();
    for (app_type, at) in layout::icon_slots(app.windows.viewport()) {
        if at.y as u16 >= area.bottom() {
            continue;
        }
        let label: String = format!("[{}] {}", key_for_app(app_type), app_type.title())
            .chars()
            .take(ICON_WIDTH as usize)
            .collect();
        buf.set_string(at.x as u16, at.y as u16, label, icon_style);
    }
}

fn window_rect(geometry: Geometry, bounds: Rect) -> Rect {
    let x = geometry.x.max(0) as u16;
    let y = geometry.y.max(0) as u16;
    Rect::new(x, y, geometry.width.max(0) as u16, geometry.height.max(0) as u16).intersection(bounds)
}

fn draw_window(f: &mut Frame, bounds: Rect, app: &App, window: &WindowRecord, focused: bool) {
    let theme = &app.config.theme;
    let rect = window_rect(window.geometry, bounds);
    if rect.width < 2 || rect.height < 2 {
        return;
    }
    let border_color = if focused { theme.selection } else { theme.gray };
    let title_style = if focused {
        Style::default().fg(theme.background).bg(theme.selection).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.gray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(if focused { BorderType::Double } else { BorderType::Plain })
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(format!(" {} ", window.app.title()), title_style))
        .style(Style::default().bg(theme.background).fg(theme.foreground));
    let inner = block.inner(rect);
    f.render_widget(Clear, rect);
    f.render_widget(block, rect);

    let border = window.geometry.right() - 1;
    let buttons_x = border - 2 * BUTTON_WIDTH;
    let buf = f.buffer_mut();
    if buttons_x > window.geometry.x && buttons_x >= 0 && (buttons_x as u16) < rect.right() {
        buf.set_string(
            buttons_x as u16,
            rect.y,
            "[_][x]",
            Style::default().fg(border_color).bg(theme.background),
        );
    }
    buf.set_string(
        rect.right() - 1,
        rect.bottom() - 1,
        &app.config.icons.resize_handle,
        Style::default().fg(border_color).bg(theme.background),
    );

    match window.app {
        AppType::Timer => draw_timer(f, inner, app),
        AppType::Tasks => draw_tasks(f, inner, app),
        AppType::Dashboard => draw_dashboard(f, inner, app),
        AppType::Settings => draw_settings(f, inner, app),
        AppType::About => draw_about(f, inner, app),
        other => draw_placeholder(f, inner, app, other),
    }
}

fn draw_timer(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let status = app.status();
    let settings = app.session.settings();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    f.render_widget(
        Paragraph::new(Span::styled(
            status.phase.label(),
            Style::default().fg(phase_color(app, status.phase)).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center),
        chunks[0],
    );
    f.render_widget(
        Paragraph::new(format!(
            "{} {}",
            state_icon(app, status.state),
            format_clock(status.seconds_remaining)
        ))
        .style(Style::default().fg(theme.foreground).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center),
        chunks[1],
    );

    let elapsed = status.total_seconds.saturating_sub(status.seconds_remaining);
    let ratio = if status.total_seconds == 0 {
        0.0
    } else {
        f64::from(elapsed) / f64::from(status.total_seconds)
    };
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(phase_color(app, status.phase)).bg(theme.black))
            .ratio(ratio.clamp(0.0, 1.0))
            .label(""),
        chunks[2],
    );

    let per_long_break = settings.pomodoros_per_long_break;
    let done = status.cycles_completed.min(per_long_break) as usize;
    let cycles = format!(
        "{}{}",
        icons.cycle_done.repeat(done),
        icons.cycle_pending.repeat(per_long_break as usize - done)
    );
    f.render_widget(
        Paragraph::new(cycles)
            .style(Style::default().fg(theme.yellow))
            .alignment(Alignment::Center),
        chunks[3],
    );

    let task_line = match status.selected_task.and_then(|id| app.tasks.iter().find(|t| t.id == id)) {
        Some(task) => Span::styled(task.text.clone(), Style::default().fg(theme.cyan)),
        None => Span::styled("no task selected", Style::default().fg(theme.gray)),
    };
    f.render_widget(Paragraph::new(task_line).alignment(Alignment::Center), chunks[4]);
    f.render_widget(
        Paragraph::new("space start/pause  r reset  s skip")
            .style(Style::default().fg(theme.gray))
            .alignment(Alignment::Center),
        chunks[5],
    );
}

fn draw_tasks(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let selected = app.selected_task();

    let input_height = u16::from(app.mode == AppMode::AddingTask);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(input_height)])
        .split(area);

    if app.tasks.is_empty() {
        f.render_widget(
            Paragraph::new("No tasks. Press 'a' to add one.")
                .style(Style::default().fg(theme.gray))
                .alignment(Alignment::Center),
            chunks[0],
        );
    } else {
        let lines: Vec<Line> = app
            .tasks
            .iter()
            .enumerate()
            .map(|(i, task)| {
                let marker = if i == app.task_cursor {
                    Span::styled(icons.select.clone(), Style::default().fg(theme.selection))
                } else {
                    Span::raw(" ")
                };
                let check = if task.completed { &icons.done } else { &icons.pending };
                let text_style = if task.completed {
                    Style::default().fg(theme.gray).add_modifier(Modifier::CROSSED_OUT)
                } else if selected == Some(task.id) {
                    Style::default().fg(theme.selection).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.foreground)
                };
                Line::from(vec![
                    marker,
                    Span::raw(format!(" {check} ")),
                    Span::styled(task.text.clone(), text_style),
                    Span::styled(
                        format!(" {}{}", icons.cycle_done, task.pomodoro_count),
                        Style::default().fg(theme.yellow),
                    ),
                ])
            })
            .collect();
        // Keep the cursor in view.
        let scroll = (app.task_cursor as u16).saturating_sub(chunks[0].height.saturating_sub(1));
        f.render_widget(Paragraph::new(lines).scroll((scroll, 0)), chunks[0]);
    }

    if input_height > 0 {
        f.render_widget(
            Paragraph::new(Line::from(vec![
                Span::styled("new: ", Style::default().fg(theme.yellow)),
                Span::raw(app.input_buffer.clone()),
                Span::styled(
                    icons.input_cursor.clone(),
                    Style::default().add_modifier(Modifier::SLOW_BLINK),
                ),
            ])),
            chunks[1],
        );
    }
}

fn draw_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let history = app.session.history();
    let today = Local::now().date_naive();
    let totals = history.totals();

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Sessions ", Style::default().fg(theme.gray)),
            Span::raw(totals.focus_sessions.to_string()),
            Span::styled("  Focus ", Style::default().fg(theme.gray)),
            Span::raw(format!("{}h{:02}m", totals.focus_minutes / 60, totals.focus_minutes % 60)),
        ]),
        Line::from(vec![
            Span::styled("Breaks ", Style::default().fg(theme.gray)),
            Span::raw(format!("{}m", totals.break_minutes)),
            Span::styled("  Streak ", Style::default().fg(theme.gray)),
            Span::raw(format!("{} days", history.streak(today))),
        ]),
        Line::from(""),
    ];

    let recent = history.recent(today, 7);
    let peak = recent.iter().map(|day| day.focus_minutes).max().unwrap_or(0).max(1);
    let bar_width = u32::from(area.width.saturating_sub(12)).max(1);
    for day in recent {
        let filled = day.focus_minutes * bar_width / peak;
        lines.push(Line::from(vec![
            Span::styled(day.date.format("%a %d ").to_string(), Style::default().fg(theme.gray)),
            Span::styled(
                icons.progress_filled.repeat(filled as usize),
                Style::default().fg(theme.green),
            ),
            Span::raw(format!(" {}", day.focus_minutes)),
        ]));
    }
    f.render_widget(Paragraph::new(lines), area);
}

fn draw_settings(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let settings = app.session.settings();
    let row = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<22}"), Style::default().fg(theme.gray)),
            Span::raw(value),
        ])
    };
    let mut lines = vec![
        row("Focus", format!("{} min", settings.focus_minutes)),
        row("Short break", format!("{} min", settings.short_break_minutes)),
        row("Long break", format!("{} min", settings.long_break_minutes)),
        row("Long break every", format!("{} sessions", settings.pomodoros_per_long_break)),
        row("Auto-start breaks", settings.auto_start_breaks.to_string()),
        row("Sound", settings.sound_enabled.to_string()),
        row(
            "Task backend",
            app.config.api.base_url.clone().unwrap_or_else(|| "local".to_string()),
        ),
        Line::from(""),
    ];
    if let Some(path) = retrodesk::config::config_path() {
        lines.push(Line::from(Span::styled(
            format!("Edit {} and press L to reload", path.display()),
            Style::default().fg(theme.gray),
        )));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
}

fn draw_about(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let lines = vec![
        Line::from(Span::styled(
            format!("RetroDesk {}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(theme.selection).add_modifier(Modifier::BOLD),
        )),
        Line::from("A pomodoro desktop for the terminal."),
        Line::from(""),
        Line::from(Span::styled(
            "1-9,0,T open apps  x close  m minimize",
            Style::default().fg(theme.gray),
        )),
        Line::from(Span::styled(
            "a add  d delete  j/k select task",
            Style::default().fg(theme.gray),
        )),
        Line::from(Span::styled(
            "D show desktop  W close all  q quit",
            Style::default().fg(theme.gray),
        )),
    ];
    f.render_widget(
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_placeholder(f: &mut Frame, area: Rect, app: &App, app_type: AppType) {
    f.render_widget(
        Paragraph::new(format!("{} is not available on this desktop.", app_type.title()))
            .style(Style::default().fg(app.config.theme.gray))
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn draw_status_line(f: &mut Frame, desktop: Rect, app: &App) {
    let Some(message) = &app.status_line else {
        return;
    };
    if desktop.height == 0 {
        return;
    }
    let area = Rect::new(desktop.x, desktop.bottom() - 1, desktop.width, 1);
    f.render_widget(
        Paragraph::new(format!(" {message} ")).style(
            Style::default()
                .bg(app.config.theme.yellow)
                .fg(app.config.theme.background)
                .add_modifier(Modifier::BOLD),
        ),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use retrodesk::config::Config;
    use retrodesk::persistence::Persistence;
    use retrodesk::tasks::InMemoryTaskApi;
    use std::sync::Arc;

    fn render(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn app() -> App {
        let config = Config::default();
        let viewport = crate::app::viewport_for(&config, 100, 30);
        App::new(
            config,
            Arc::new(InMemoryTaskApi::default()),
            Persistence::in_memory(),
            viewport,
        )
    }

    #[test]
    fn clock_format_pads_minutes_and_seconds() {
        assert_eq!(format_clock(1500), "25:00");
        assert_eq!(format_clock(61), "01:01");
        assert_eq!(format_clock(0), "00:00");
    }

    #[test]
    fn menu_bar_shows_the_countdown() {
        let screen = render(&app(), 100, 30);
        let menu = screen.lines().next().unwrap();
        assert!(menu.contains("RetroDesk"));
        assert!(menu.contains("Focus 25:00"));
    }

    #[test]
    fn windows_draw_title_and_buttons() {
        let mut app = app();
        app.open_app(AppType::Timer);
        let geometry = app.windows.find(AppType::Timer).unwrap().geometry;

        let screen = render(&app, 100, 30);
        let title_row = screen.lines().nth(geometry.y as usize).unwrap();
        assert!(title_row.contains("Pomodoro"));
        assert!(title_row.contains("[_][x]"));
        assert!(screen.contains("no task selected"));
    }

    #[test]
    fn placeholder_apps_say_they_are_unavailable() {
        let mut app = app();
        app.open_app(AppType::Trash);
        let screen = render(&app, 100, 30);
        assert!(screen.contains("Trash is not"));
    }
}
