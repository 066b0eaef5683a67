//! Window registry and lifecycle: one window per app, focus ordering,
//! minimize/restore and close.

use crate::config::DesktopSettings;
use crate::drag::{clamp_geometry, Gesture};
use crate::error::DeskError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppType {
    Timer,
    Tasks,
    Dashboard,
    Auth,
    Trash,
    Ambient,
    Meditation,
    Folder,
    Tutorial,
    About,
    Settings,
}

impl AppType {
    pub const ALL: [AppType; 11] = [
        AppType::Timer,
        AppType::Tasks,
        AppType::Dashboard,
        AppType::Ambient,
        AppType::Meditation,
        AppType::Folder,
        AppType::Tutorial,
        AppType::Settings,
        AppType::About,
        AppType::Auth,
        AppType::Trash,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppType::Timer => "timer",
            AppType::Tasks => "tasks",
            AppType::Dashboard => "dashboard",
            AppType::Auth => "auth",
            AppType::Trash => "trash",
            AppType::Ambient => "ambient",
            AppType::Meditation => "meditation",
            AppType::Folder => "folder",
            AppType::Tutorial => "tutorial",
            AppType::About => "about",
            AppType::Settings => "settings",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            AppType::Timer => "Pomodoro",
            AppType::Tasks => "Tasks",
            AppType::Dashboard => "Statistics",
            AppType::Auth => "Sign In",
            AppType::Trash => "Trash",
            AppType::Ambient => "Ambient Noise",
            AppType::Meditation => "Meditation",
            AppType::Folder => "Documents",
            AppType::Tutorial => "Tutorial",
            AppType::About => "About",
            AppType::Settings => "Settings",
        }
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppType {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AppType::ALL
            .into_iter()
            .find(|app| app.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| DeskError::UnknownApp(wanted.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "win-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }
}

/// Drawable area. The top `menu_bar_height` rows are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
    pub menu_bar_height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimits {
    pub min_width: i32,
    pub min_height: i32,
    pub default_width: i32,
    pub default_height: i32,
}

impl From<&DesktopSettings> for SizeLimits {
    fn from(settings: &DesktopSettings) -> Self {
        Self {
            min_width: settings.min_window_width,
            min_height: settings.min_window_height,
            default_width: settings.default_window_width,
            default_height: settings.default_window_height,
        }
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self::from(&DesktopSettings::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowState {
    Normal,
    Minimized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub id: WindowId,
    pub app: AppType,
    pub geometry: Geometry,
    pub z_index: u64,
    pub state: WindowState,
}

impl WindowRecord {
    pub fn is_visible(&self) -> bool {
        self.state == WindowState::Normal
    }
}

/// Content provider for window bodies.
pub trait WindowHost: Send {
    fn mount(&mut self, id: WindowId, app: AppType) -> Result<(), DeskError>;

    fn unmount(&mut self, id: WindowId, app: AppType) -> Result<(), DeskError>;

    fn set_visible(&mut self, _id: WindowId, _visible: bool) {}
}

/// Host for frontends that render straight from the registry.
#[derive(Debug, Default)]
pub struct NullHost;

impl WindowHost for NullHost {
    fn mount(&mut self, _id: WindowId, _app: AppType) -> Result<(), DeskError> {
        Ok(())
    }

    fn unmount(&mut self, _id: WindowId, _app: AppType) -> Result<(), DeskError> {
        Ok(())
    }
}

const CASCADE_LIMIT: i32 = 8;

pub struct WindowManager {
    pub(crate) windows: Vec<WindowRecord>,
    active: Option<WindowId>,
    next_id: u64,
    z_counter: u64,
    pub(crate) viewport: Viewport,
    pub(crate) limits: SizeLimits,
    saved: BTreeMap<AppType, Geometry>,
    pub(crate) gesture: Option<(WindowId, Gesture)>,
    host: Box<dyn WindowHost>,
}

impl WindowManager {
    pub fn new(viewport: Viewport, limits: SizeLimits, host: Box<dyn WindowHost>) -> Self {
        Self {
            windows: Vec::new(),
            active: None,
            next_id: 1,
            z_counter: 0,
            viewport,
            limits,
            saved: BTreeMap::new(),
            gesture: None,
            host,
        }
    }

    /// Geometry remembered per app, applied the next time the app opens.
    pub fn with_saved_geometry(mut self, saved: BTreeMap<AppType, Geometry>) -> Self {
        self.saved = saved;
        self
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowRecord> {
        self.windows.iter().find(|window| window.id == id)
    }

    fn get_mut(&mut self, id: WindowId) -> Option<&mut WindowRecord> {
        self.windows.iter_mut().find(|window| window.id == id)
    }

    pub fn find(&self, app: AppType) -> Option<&WindowRecord> {
        self.windows.iter().find(|window| window.app == app)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Windows in insertion order.
    pub fn windows(&self) -> &[WindowRecord] {
        &self.windows
    }

    pub fn active(&self) -> Option<WindowId> {
        self.active
    }

    pub fn minimized(&self) -> impl Iterator<Item = &WindowRecord> {
        self.windows.iter().filter(|window| !window.is_visible())
    }

    /// Visible windows, bottom-most first.
    pub fn windows_in_paint_order(&self) -> Vec<&WindowRecord> {
        let mut visible: Vec<_> = self.windows.iter().filter(|w| w.is_visible()).collect();
        visible.sort_by_key(|window| window.z_index);
        visible
    }

    pub fn topmost_at(&self, point: Point) -> Option<&WindowRecord> {
        self.windows
            .iter()
            .filter(|window| window.is_visible() && window.geometry.contains(point))
            .max_by_key(|window| window.z_index)
    }

    /// Focuses the app's window if one exists (restoring it when minimized),
    /// otherwise creates it.
    pub fn open(&mut self, app: AppType) -> WindowId {
        if let Some(existing) = self.find(app) {
            let (id, state) = (existing.id, existing.state);
            match state {
                WindowState::Minimized => self.restore(id),
                WindowState::Normal => {
                    self.focus(id);
                }
            }
            return id;
        }

        let id = WindowId(self.next_id);
        self.next_id += 1;
        let geometry = match self.saved.get(&app) {
            Some(saved) => clamp_geometry(*saved, self.viewport, self.limits),
            None => self.default_geometry(),
        };
        self.z_counter += 1;
        self.windows.push(WindowRecord {
            id,
            app,
            geometry,
            z_index: self.z_counter,
            state: WindowState::Normal,
        });
        info!("opened {} window {}", app, id);
        if let Err(e) = self.host.mount(id, app) {
            warn!("failed to render {} window {}: {}", app, id, e);
        }
        self.focus(id);
        id
    }

    /// Like [`open`](Self::open), for identifiers coming from outside.
    pub fn open_named(&mut self, name: &str) -> Result<WindowId, DeskError> {
        let app = name.parse::<AppType>().inspect_err(|e| {
            warn!("ignoring open request: {}", e);
        })?;
        Ok(self.open(app))
    }

    fn default_geometry(&self) -> Geometry {
        let step = (self.windows.len() as i32).min(CASCADE_LIMIT);
        let candidate = Geometry::new(
            4 + 2 * step,
            self.viewport.menu_bar_height + 1 + step,
            self.limits.default_width,
            self.limits.default_height,
        );
        clamp_geometry(candidate, self.viewport, self.limits)
    }

    /// Raises `id` above every other window and makes it the only active one.
    /// Minimized windows are left alone; use [`restore`](Self::restore).
    pub fn focus(&mut self, id: WindowId) -> bool {
        let next = self.z_counter + 1;
        let Some(window) = self.get_mut(id) else {
            return false;
        };
        if window.state == WindowState::Minimized {
            return false;
        }
        window.z_index = next;
        self.z_counter = next;
        self.active = Some(id);
        debug!("focused {} (z={})", id, next);
        true
    }

    pub fn minimize(&mut self, id: WindowId) {
        let Some(window) = self.get_mut(id) else {
            return;
        };
        if window.state == WindowState::Minimized {
            return;
        }
        window.state = WindowState::Minimized;
        self.host.set_visible(id, false);
        if self.active == Some(id) {
            self.active = None;
        }
        if matches!(self.gesture, Some((target, _)) if target == id) {
            self.gesture = None;
        }
        debug!("minimized {}", id);
    }

    pub fn restore(&mut self, id: WindowId) {
        let Some(window) = self.get_mut(id) else {
            return;
        };
        if window.state == WindowState::Minimized {
            window.state = WindowState::Normal;
            self.host.set_visible(id, true);
        }
        self.focus(id);
    }

    pub fn close(&mut self, id: WindowId) -> bool {
        let Some(index) = self.windows.iter().position(|window| window.id == id) else {
            return false;
        };
        let window = self.windows.remove(index);
        self.saved.insert(window.app, window.geometry);
        if self.active == Some(id) {
            self.active = None;
        }
        if matches!(self.gesture, Some((target, _)) if target == id) {
            self.gesture = None;
        }
        if let Err(e) = self.host.unmount(id, window.app) {
            warn!("failed to tear down {} window {}: {}", window.app, id, e);
        }
        info!("closed {} window {}", window.app, id);
        true
    }

    pub fn show_desktop(&mut self) {
        let visible: Vec<_> = self
            .windows
            .iter()
            .filter(|window| window.is_visible())
            .map(|window| window.id)
            .collect();
        for id in visible {
            self.minimize(id);
        }
    }

    pub fn close_all(&mut self) {
        let ids: Vec<_> = self.windows.iter().map(|window| window.id).collect();
        for id in ids {
            self.close(id);
        }
    }

    /// Applies a new viewport and pulls every window back inside it.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        let limits = self.limits;
        for window in &mut self.windows {
            window.geometry = clamp_geometry(window.geometry, viewport, limits);
        }
    }

    /// Last known geometry per app: open windows plus remembered closed ones.
    pub fn geometry_snapshot(&self) -> BTreeMap<AppType, Geometry> {
        let mut snapshot = self.saved.clone();
        for window in &self.windows {
            snapshot.insert(window.app, window.geometry);
        }
        snapshot
    }
}
