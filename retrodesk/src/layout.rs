//! Where things sit on the desktop surface, shared by drawing and hit-testing.

use retrodesk::windows::{AppType, Point, Viewport, WindowId, WindowManager};

pub const ICON_WIDTH: i32 = 14;
const ICON_COLUMN: i32 = 1;
const ICON_SPACING: i32 = 2;

/// Row of each desktop icon, top to bottom. Icons that do not fit are left out.
pub fn icon_slots(viewport: Viewport) -> Vec<(AppType, Point)> {
    AppType::ALL
        .into_iter()
        .enumerate()
        .map(|(i, app)| {
            let y = viewport.menu_bar_height + 1 + i as i32 * ICON_SPACING;
            (app, Point::new(ICON_COLUMN, y))
        })
        .filter(|(_, at)| at.y < viewport.height)
        .collect()
}

pub fn icon_at(viewport: Viewport, point: Point) -> Option<AppType> {
    icon_slots(viewport)
        .into_iter()
        .find(|(_, at)| point.y == at.y && point.x >= at.x && point.x < at.x + ICON_WIDTH)
        .map(|(app, _)| app)
}

/// Key that opens an app from the desktop.
pub fn app_for_key(c: char) -> Option<AppType> {
    match c {
        '1'..='9' => AppType::ALL.get(c as usize - '1' as usize).copied(),
        '0' => AppType::ALL.get(9).copied(),
        'T' => Some(AppType::Trash),
        _ => None,
    }
}

pub fn key_for_app(app: AppType) -> char {
    match AppType::ALL.iter().position(|&candidate| candidate == app) {
        Some(i) if i < 9 => char::from(b'1' + i as u8),
        Some(9) => '0',
        _ => 'T',
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskbarSlot {
    pub id: WindowId,
    pub label: String,
    pub x: i32,
}

impl TaskbarSlot {
    pub fn width(&self) -> i32 {
        self.label.chars().count() as i32
    }

    pub fn contains(&self, x: i32) -> bool {
        x >= self.x && x < self.x + self.width()
    }
}

/// Minimized windows, packed against the right edge of the menu bar.
pub fn taskbar_slots(windows: &WindowManager) -> Vec<TaskbarSlot> {
    let mut right = windows.viewport().width - 1;
    let mut slots = Vec::new();
    for window in windows.minimized() {
        let label = format!("[{}]", window.app.title());
        let width = label.chars().count() as i32;
        let x = right - width;
        if x < 0 {
            break;
        }
        slots.push(TaskbarSlot {
            id: window.id,
            label,
            x,
        });
        right = x - 1;
    }
    slots
}

pub fn taskbar_slot_at(windows: &WindowManager, point: Point) -> Option<WindowId> {
    if point.y >= windows.viewport().menu_bar_height {
        return None;
    }
    taskbar_slots(windows)
        .into_iter()
        .find(|slot| slot.contains(point.x))
        .map(|slot| slot.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrodesk::windows::{NullHost, SizeLimits};

    fn viewport() -> Viewport {
        Viewport {
            width: 100,
            height: 30,
            menu_bar_height: 1,
        }
    }

    #[test]
    fn icons_stack_below_the_menu_bar() {
        let slots = icon_slots(viewport());
        assert_eq!(slots[0], (AppType::Timer, Point::new(1, 2)));
        assert_eq!(slots[1].1.y, 4);
        assert_eq!(icon_at(viewport(), Point::new(5, 4)), Some(AppType::Tasks));
        assert_eq!(icon_at(viewport(), Point::new(5, 3)), None);
        assert_eq!(icon_at(viewport(), Point::new(ICON_WIDTH + 1, 2)), None);
    }

    #[test]
    fn short_terminals_drop_trailing_icons() {
        let small = Viewport {
            height: 6,
            ..viewport()
        };
        assert_eq!(icon_slots(small).len(), 3);
    }

    #[test]
    fn every_app_has_a_key() {
        for app in AppType::ALL {
            assert_eq!(app_for_key(key_for_app(app)), Some(app));
        }
        assert_eq!(app_for_key('x'), None);
    }

    #[test]
    fn taskbar_lists_minimized_windows_from_the_right() {
        let mut windows =
            WindowManager::new(viewport(), SizeLimits::default(), Box::new(NullHost));
        let timer = windows.open(AppType::Timer);
        let tasks = windows.open(AppType::Tasks);
        windows.open(AppType::About);
        windows.minimize(timer);
        windows.minimize(tasks);

        let slots = taskbar_slots(&windows);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].label, "[Pomodoro]");
        assert_eq!(slots[0].x + slots[0].width(), 99);
        assert_eq!(slots[1].x + slots[1].width(), slots[0].x - 1);

        let on_tasks = Point::new(slots[1].x + 1, 0);
        assert_eq!(taskbar_slot_at(&windows, on_tasks), Some(tasks));
        assert_eq!(taskbar_slot_at(&windows, Point::new(slots[1].x + 1, 1)), None);
    }
}
