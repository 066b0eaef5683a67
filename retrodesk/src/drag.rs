//! Pointer-driven move and resize with viewport clamping.
//!
//! A press is claimed by exactly one region of the topmost window under the
//! pointer: the title bar starts a move, the bottom-right cell starts a resize,
//! the title-bar buttons act immediately and never start a gesture.

use crate::windows::{AppType, Geometry, Point, SizeLimits, Viewport, WindowId, WindowManager};
use tracing::debug;

/// Width of each title-bar button, `[_]` and `[x]`.
pub const BUTTON_WIDTH: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitRegion {
    CloseButton,
    MinimizeButton,
    TitleBar,
    ResizeHandle,
    Body,
}

/// Buttons sit just inside the right border of the title row, close last.
pub fn hit_test(geometry: &Geometry, point: Point) -> Option<HitRegion> {
    if !geometry.contains(point) {
        return None;
    }
    let border = geometry.right() - 1;
    if point.y == geometry.y {
        let close_start = border - BUTTON_WIDTH;
        let minimize_start = close_start - BUTTON_WIDTH;
        return Some(if point.x >= close_start && point.x < border {
            HitRegion::CloseButton
        } else if point.x >= minimize_start && point.x < close_start {
            HitRegion::MinimizeButton
        } else {
            HitRegion::TitleBar
        });
    }
    if point.x == border && point.y == geometry.bottom() - 1 {
        return Some(HitRegion::ResizeHandle);
    }
    Some(HitRegion::Body)
}

/// Keeps the whole window inside the viewport and below the menu bar. A window
/// larger than the viewport is pinned to the top-left corner.
pub fn clamp_position(geometry: Geometry, viewport: Viewport) -> Geometry {
    let max_x = (viewport.width - geometry.width).max(0);
    let min_y = viewport.menu_bar_height;
    let max_y = (viewport.height - geometry.height).max(min_y);
    Geometry {
        x: geometry.x.clamp(0, max_x),
        y: geometry.y.clamp(min_y, max_y),
        ..geometry
    }
}

/// Caps the size at the viewport's right/bottom edge, then floors it at the
/// minimum. The minimum wins when both cannot hold.
pub fn clamp_size(geometry: Geometry, viewport: Viewport, limits: SizeLimits) -> Geometry {
    Geometry {
        width: geometry
            .width
            .min(viewport.width - geometry.x)
            .max(limits.min_width),
        height: geometry
            .height
            .min(viewport.height - geometry.y)
            .max(limits.min_height),
        ..geometry
    }
}

/// Fits size to the usable area, then position.
pub fn clamp_geometry(geometry: Geometry, viewport: Viewport, limits: SizeLimits) -> Geometry {
    let usable_height = viewport.height - viewport.menu_bar_height;
    let sized = Geometry {
        width: geometry
            .width
            .clamp(limits.min_width, viewport.width.max(limits.min_width)),
        height: geometry
            .height
            .clamp(limits.min_height, usable_height.max(limits.min_height)),
        ..geometry
    };
    clamp_position(sized, viewport)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gesture {
    Move {
        offset: Point,
    },
    Resize {
        origin: Point,
        start_width: i32,
        start_height: i32,
    },
}

impl Gesture {
    pub fn begin_move(geometry: Geometry, pointer: Point) -> Self {
        Gesture::Move {
            offset: Point::new(pointer.x - geometry.x, pointer.y - geometry.y),
        }
    }

    pub fn begin_resize(geometry: Geometry, pointer: Point) -> Self {
        Gesture::Resize {
            origin: pointer,
            start_width: geometry.width,
            start_height: geometry.height,
        }
    }

    pub fn apply(
        &self,
        geometry: Geometry,
        pointer: Point,
        viewport: Viewport,
        limits: SizeLimits,
    ) -> Geometry {
        match *self {
            Gesture::Move { offset } => clamp_position(
                Geometry {
                    x: pointer.x - offset.x,
                    y: pointer.y - offset.y,
                    ..geometry
                },
                viewport,
            ),
            Gesture::Resize {
                origin,
                start_width,
                start_height,
            } => clamp_size(
                Geometry {
                    width: start_width + (pointer.x - origin.x),
                    height: start_height + (pointer.y - origin.y),
                    ..geometry
                },
                viewport,
                limits,
            ),
        }
    }
}

/// What a pointer press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    /// Nothing visible under the pointer.
    Missed,
    Focused(WindowId),
    Closed(WindowId),
    Minimized(WindowId),
    MoveStarted(WindowId),
    ResizeStarted(WindowId),
}

impl WindowManager {
    pub fn pointer_down(&mut self, point: Point) -> PointerAction {
        let Some(window) = self.topmost_at(point) else {
            return PointerAction::Missed;
        };
        let (id, geometry) = (window.id, window.geometry);
        self.gesture = None;
        match hit_test(&geometry, point) {
            Some(HitRegion::CloseButton) => {
                self.close(id);
                PointerAction::Closed(id)
            }
            Some(HitRegion::MinimizeButton) => {
                self.minimize(id);
                PointerAction::Minimized(id)
            }
            Some(HitRegion::TitleBar) => {
                self.focus(id);
                self.gesture = Some((id, Gesture::begin_move(geometry, point)));
                PointerAction::MoveStarted(id)
            }
            Some(HitRegion::ResizeHandle) => {
                self.focus(id);
                self.gesture = Some((id, Gesture::begin_resize(geometry, point)));
                PointerAction::ResizeStarted(id)
            }
            Some(HitRegion::Body) | None => {
                self.focus(id);
                PointerAction::Focused(id)
            }
        }
    }

    /// Updates the captured window, returning its new geometry.
    pub fn pointer_move(&mut self, point: Point) -> Option<Geometry> {
        let (id, gesture) = self.gesture?;
        let (viewport, limits) = (self.viewport, self.limits);
        let window = self.windows.iter_mut().find(|window| window.id == id)?;
        window.geometry = gesture.apply(window.geometry, point, viewport, limits);
        Some(window.geometry)
    }

    /// Ends the gesture and reports the final geometry for persistence.
    pub fn pointer_up(&mut self, point: Point) -> Option<(WindowId, AppType, Geometry)> {
        self.pointer_move(point)?;
        let (id, _) = self.gesture.take()?;
        let window = self.get(id)?;
        debug!("{} settled at {:?}", id, window.geometry);
        Some((id, window.app, window.geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::tests::{manager, viewport};
    use crate::windows::WindowState;
    use proptest::prelude::*;

    fn place(manager: &mut WindowManager, app: AppType, geometry: Geometry) -> WindowId {
        let id = manager.open(app);
        let index = manager.windows.iter().position(|w| w.id == id).unwrap();
        manager.windows[index].geometry = geometry;
        id
    }

    #[test]
    fn hit_test_distinguishes_title_bar_regions() {
        let g = Geometry::new(10, 5, 30, 10);
        // right border at x=39, close at 36..39, minimize at 33..36
        assert_eq!(hit_test(&g, Point::new(12, 5)), Some(HitRegion::TitleBar));
        assert_eq!(hit_test(&g, Point::new(37, 5)), Some(HitRegion::CloseButton));
        assert_eq!(hit_test(&g, Point::new(34, 5)), Some(HitRegion::MinimizeButton));
        assert_eq!(hit_test(&g, Point::new(39, 5)), Some(HitRegion::TitleBar));
        assert_eq!(hit_test(&g, Point::new(39, 14)), Some(HitRegion::ResizeHandle));
        assert_eq!(hit_test(&g, Point::new(20, 9)), Some(HitRegion::Body));
        assert_eq!(hit_test(&g, Point::new(40, 9)), None);
    }

    #[test]
    fn dragging_by_the_title_bar_moves_the_window() {
        let mut manager = manager();
        let id = place(&mut manager, AppType::Timer, Geometry::new(10, 5, 30, 10));

        assert_eq!(
            manager.pointer_down(Point::new(14, 5)),
            PointerAction::MoveStarted(id)
        );
        manager.pointer_move(Point::new(24, 9));
        let settled = manager.pointer_up(Point::new(34, 12));

        assert_eq!(
            settled,
            Some((id, AppType::Timer, Geometry::new(30, 12, 30, 10)))
        );
        assert!(manager.gesture.is_none());
        assert_eq!(manager.pointer_move(Point::new(0, 0)), None);
    }

    #[test]
    fn dragging_above_the_menu_bar_is_clamped() {
        let mut manager = manager();
        place(&mut manager, AppType::Timer, Geometry::new(10, 5, 30, 10));

        manager.pointer_down(Point::new(14, 5));
        let geometry = manager.pointer_move(Point::new(-50, -20)).unwrap();

        assert_eq!(geometry, Geometry::new(0, 1, 30, 10));
    }

    #[test]
    fn dragging_past_the_bottom_right_is_clamped() {
        let mut manager = manager();
        place(&mut manager, AppType::Timer, Geometry::new(10, 5, 30, 10));

        manager.pointer_down(Point::new(14, 5));
        let geometry = manager.pointer_move(Point::new(500, 500)).unwrap();

        assert_eq!(geometry, Geometry::new(90, 30, 30, 10));
    }

    #[test]
    fn resize_floors_at_the_minimum_size() {
        let mut manager = manager();
        let id = place(&mut manager, AppType::Tasks, Geometry::new(10, 5, 30, 10));

        assert_eq!(
            manager.pointer_down(Point::new(39, 14)),
            PointerAction::ResizeStarted(id)
        );
        let geometry = manager.pointer_move(Point::new(0, 0)).unwrap();

        let limits = SizeLimits::default();
        assert_eq!(geometry.width, limits.min_width);
        assert_eq!(geometry.height, limits.min_height);
        assert_eq!((geometry.x, geometry.y), (10, 5));
    }

    #[test]
    fn resize_stops_at_the_viewport_edge() {
        let mut manager = manager();
        place(&mut manager, AppType::Tasks, Geometry::new(10, 5, 30, 10));

        manager.pointer_down(Point::new(39, 14));
        let geometry = manager.pointer_move(Point::new(300, 300)).unwrap();

        assert_eq!(geometry, Geometry::new(10, 5, 110, 35));
    }

    #[test]
    fn title_bar_buttons_never_start_a_drag() {
        let mut manager = manager();
        let keep = place(&mut manager, AppType::Timer, Geometry::new(10, 5, 30, 10));
        let closing = place(&mut manager, AppType::Tasks, Geometry::new(50, 5, 30, 10));

        assert_eq!(
            manager.pointer_down(Point::new(35, 5)),
            PointerAction::Minimized(keep)
        );
        assert!(manager.gesture.is_none());
        assert_eq!(manager.get(keep).unwrap().state, WindowState::Minimized);

        assert_eq!(
            manager.pointer_down(Point::new(77, 5)),
            PointerAction::Closed(closing)
        );
        assert!(manager.gesture.is_none());
        assert!(manager.get(closing).is_none());
    }

    #[test]
    fn pressing_a_lower_window_body_focuses_it() {
        let mut manager = manager();
        let lower = place(&mut manager, AppType::Timer, Geometry::new(10, 5, 30, 10));
        place(&mut manager, AppType::Tasks, Geometry::new(30, 8, 30, 10));

        assert_eq!(
            manager.pointer_down(Point::new(12, 8)),
            PointerAction::Focused(lower)
        );
        assert_eq!(manager.active(), Some(lower));
        assert_eq!(manager.pointer_down(Point::new(100, 38)), PointerAction::Missed);
    }

    #[test]
    fn closing_the_dragged_window_drops_the_gesture() {
        let mut manager = manager();
        let id = place(&mut manager, AppType::Timer, Geometry::new(10, 5, 30, 10));
        manager.pointer_down(Point::new(14, 5));
        manager.close(id);

        assert!(manager.gesture.is_none());
        assert_eq!(manager.pointer_up(Point::new(20, 20)), None);
    }

    fn arb_geometry() -> impl Strategy<Value = Geometry> {
        (0..100i32, 1..30i32, 24..=120i32, 6..=39i32)
            .prop_map(|(x, y, width, height)| Geometry::new(x, y, width, height))
    }

    proptest! {
        #[test]
        fn moved_windows_stay_inside_the_viewport(
            geometry in arb_geometry(),
            grab_x in 0..24i32,
            to_x in -500..500i32,
            to_y in -500..500i32,
        ) {
            let viewport = viewport();
            let start = clamp_geometry(geometry, viewport, SizeLimits::default());
            let grab = Point::new(start.x + grab_x, start.y);
            let moved = Gesture::begin_move(start, grab)
                .apply(start, Point::new(to_x, to_y), viewport, SizeLimits::default());

            prop_assert!(moved.x >= 0);
            prop_assert!(moved.right() <= viewport.width);
            prop_assert!(moved.y >= viewport.menu_bar_height);
            prop_assert!(moved.bottom() <= viewport.height);
            prop_assert_eq!((moved.width, moved.height), (start.width, start.height));
        }

        #[test]
        fn resized_windows_respect_minimum_and_viewport(
            geometry in arb_geometry(),
            to_x in -500..500i32,
            to_y in -500..500i32,
        ) {
            let viewport = viewport();
            let limits = SizeLimits::default();
            let start = clamp_geometry(geometry, viewport, limits);
            let corner = Point::new(start.right() - 1, start.bottom() - 1);
            let resized = Gesture::begin_resize(start, corner)
                .apply(start, Point::new(to_x, to_y), viewport, limits);

            prop_assert!(resized.width >= limits.min_width);
            prop_assert!(resized.height >= limits.min_height);
            prop_assert_eq!((resized.x, resized.y), (start.x, start.y));
            if viewport.width - start.x >= limits.min_width {
                prop_assert!(resized.right() <= viewport.width);
            }
            if viewport.height - start.y >= limits.min_height {
                prop_assert!(resized.bottom() <= viewport.height);
            }
        }
    }
}
