use std::time::{Duration, Instant};

use crate::debounce::Debouncer;

const THUMBNAIL_SCROLL_MS: f64 = 250.0;

/// Keyboard intents, independent of the windowing backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Forward,
    Backward,
    First,
    Last,
}

/// Current page (1-indexed) and page count. Until the count is known every
/// move is a no-op; afterwards every move is clamped into `[1, page_count]`.
#[derive(Debug, Clone)]
pub struct PageNavigator {
    current: u32,
    page_count: Option<u32>,
}

impl Default for PageNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl PageNavigator {
    pub fn new() -> Self {
        Self {
            current: 1,
            page_count: None,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_count
    }

    pub fn is_ready(&self) -> bool {
        self.page_count.is_some()
    }

    pub fn set_page_count(&mut self, count: u32) {
        if count == 0 {
            log::warn!("Ignoring empty page count");
            return;
        }
        self.page_count = Some(count);
        self.current = self.current.clamp(1, count);
    }

    pub fn advance(&mut self) -> bool {
        self.jump_to(self.current.saturating_add(1))
    }

    pub fn retreat(&mut self) -> bool {
        self.jump_to(self.current.saturating_sub(1))
    }

    /// Returns true when the current page actually changed.
    pub fn jump_to(&mut self, page: u32) -> bool {
        let Some(count) = self.page_count else {
            return false;
        };
        let page = page.clamp(1, count);
        if page == self.current {
            return false;
        }
        self.current = page;
        true
    }

    /// Keys are ignored while a text field owns the keyboard.
    pub fn apply_key(&mut self, key: NavKey, text_focused: bool) -> bool {
        if text_focused {
            return false;
        }
        match key {
            NavKey::Forward => self.advance(),
            NavKey::Backward => self.retreat(),
            NavKey::First => self.jump_to(1),
            NavKey::Last => self.jump_to(self.page_count.unwrap_or(self.current)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelDirection {
    Forward,
    Backward,
}

/// Collapses a burst of wheel ticks into one page step, taken in the
/// direction of the last non-zero tick once the burst has been quiet for the
/// debounce window.
pub struct WheelNavigator {
    debounce: Debouncer,
    direction: Option<WheelDirection>,
}

impl WheelNavigator {
    pub fn new(window: Duration) -> Self {
        Self {
            debounce: Debouncer::new(window),
            direction: None,
        }
    }

    /// Positive delta means scrolling toward later pages.
    pub fn on_wheel(&mut self, delta_y: f32, text_focused: bool, now: Instant) {
        if text_focused || delta_y == 0.0 || !delta_y.is_finite() {
            return;
        }
        self.direction = Some(if delta_y > 0.0 {
            WheelDirection::Forward
        } else {
            WheelDirection::Backward
        });
        self.debounce.trigger(now);
    }

    pub fn poll(&mut self, now: Instant) -> Option<WheelDirection> {
        if !self.debounce.fire_if_due(now) {
            return None;
        }
        self.direction.take()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }
}

/// Scroll offset that brings `[item_top, item_bottom]` fully into the window
/// starting at `view_top`, or `None` when it is already visible. Items above
/// align to the top edge, items below align to the bottom edge.
pub fn minimal_scroll_target(
    item_top: f32,
    item_bottom: f32,
    view_top: f32,
    view_height: f32,
) -> Option<f32> {
    let view_bottom = view_top + view_height;
    if item_top < view_top {
        Some(item_top.max(0.0))
    } else if item_bottom > view_bottom {
        Some((item_bottom - view_height).max(0.0))
    } else {
        None
    }
}

struct ScrollAnimation {
    from: f32,
    to: f32,
    start: Instant,
}

/// Vertical offset of the thumbnail list, animated toward the active page.
pub struct ThumbnailScroller {
    offset: f32,
    animation: Option<ScrollAnimation>,
    duration_ms: f64,
}

impl Default for ThumbnailScroller {
    fn default() -> Self {
        Self::new()
    }
}

impl ThumbnailScroller {
    pub fn new() -> Self {
        Self {
            offset: 0.0,
            animation: None,
            duration_ms: THUMBNAIL_SCROLL_MS,
        }
    }

    /// Offset reported by the list itself (user scrolling). Cancels any animation.
    pub fn set_offset(&mut self, offset: f32) {
        self.offset = offset.max(0.0);
        self.animation = None;
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    /// Start a smooth scroll if the item is not fully visible.
    pub fn reveal(&mut self, item_top: f32, item_bottom: f32, view_height: f32, now: Instant) -> bool {
        let current = self.offset_at(now);
        match minimal_scroll_target(item_top, item_bottom, current, view_height) {
            Some(target) if (target - current).abs() > f32::EPSILON => {
                self.animation = Some(ScrollAnimation {
                    from: current,
                    to: target,
                    start: now,
                });
                true
            }
            _ => false,
        }
    }

    /// Advance the animation and return the offset to apply at `now`.
    pub fn offset_at(&mut self, now: Instant) -> f32 {
        if let Some(anim) = &self.animation {
            let elapsed = now.saturating_duration_since(anim.start).as_secs_f64() * 1000.0;
            let t = (elapsed / self.duration_ms).min(1.0);
            let eased = 1.0 - (1.0 - t).powi(3); // cubic ease-out
            self.offset = anim.from + (anim.to - anim.from) * eased as f32;
            if t >= 1.0 {
                self.animation = None;
            }
        }
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(count: u32) -> PageNavigator {
        let mut nav = PageNavigator::new();
        nav.set_page_count(count);
        nav
    }

    #[test]
    fn test_unknown_page_count_ignores_moves() {
        let mut nav = PageNavigator::new();
        assert!(!nav.advance());
        assert!(!nav.jump_to(4));
        assert_eq!(nav.current_page(), 1);
    }

    #[test]
    fn test_edges_are_no_ops() {
        let mut nav = ready(3);
        assert!(!nav.retreat());
        assert_eq!(nav.current_page(), 1);
        nav.jump_to(3);
        assert!(!nav.advance());
        assert_eq!(nav.current_page(), 3);
    }

    #[test]
    fn test_random_walk_stays_in_range() {
        // xorshift so the walk is deterministic
        let mut state: u32 = 0x9E37_79B9;
        for count in [1u32, 2, 5, 17] {
            let mut nav = ready(count);
            for _ in 0..500 {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                if state % 2 == 0 {
                    nav.advance();
                } else {
                    nav.retreat();
                }
                assert!((1..=count).contains(&nav.current_page()));
            }
        }
    }

    #[test]
    fn test_jump_clamps() {
        let mut nav = ready(10);
        assert!(nav.jump_to(99));
        assert_eq!(nav.current_page(), 10);
        assert!(nav.jump_to(0));
        assert_eq!(nav.current_page(), 1);
    }

    #[test]
    fn test_keys_suppressed_while_editing_text() {
        let mut nav = ready(4);
        assert!(!nav.apply_key(NavKey::Forward, true));
        assert!(nav.apply_key(NavKey::Forward, false));
        assert!(nav.apply_key(NavKey::Last, false));
        assert_eq!(nav.current_page(), 4);
        assert!(nav.apply_key(NavKey::First, false));
        assert_eq!(nav.current_page(), 1);
    }

    #[test]
    fn test_page_count_clamps_existing_position() {
        let mut nav = ready(10);
        nav.jump_to(8);
        nav.set_page_count(5);
        assert_eq!(nav.current_page(), 5);
    }

    #[test]
    fn test_wheel_burst_yields_single_step() {
        let start = Instant::now();
        let window = Duration::from_millis(50);
        let mut wheel = WheelNavigator::new(window);
        for i in 0..6u64 {
            wheel.on_wheel(3.0, false, start + Duration::from_millis(i * 10));
        }
        let last = start + Duration::from_millis(50);
        assert_eq!(wheel.poll(last + Duration::from_millis(49)), None);
        assert_eq!(wheel.poll(last + window), Some(WheelDirection::Forward));
        assert_eq!(wheel.poll(last + window * 3), None);
    }

    #[test]
    fn test_wheel_uses_last_direction_and_respects_focus() {
        let now = Instant::now();
        let window = Duration::from_millis(50);
        let mut wheel = WheelNavigator::new(window);
        wheel.on_wheel(2.0, false, now);
        wheel.on_wheel(-1.0, false, now + Duration::from_millis(5));
        wheel.on_wheel(5.0, true, now + Duration::from_millis(10));
        assert_eq!(
            wheel.poll(now + Duration::from_millis(5) + window),
            Some(WheelDirection::Backward)
        );
    }

    #[test]
    fn test_minimal_scroll_target() {
        // visible
        assert_eq!(minimal_scroll_target(100.0, 200.0, 50.0, 300.0), None);
        // above: align top
        assert_eq!(minimal_scroll_target(20.0, 120.0, 50.0, 300.0), Some(20.0));
        // below: align bottom
        assert_eq!(minimal_scroll_target(300.0, 400.0, 50.0, 300.0), Some(100.0));
    }

    #[test]
    fn test_thumbnail_scroll_animates_to_target() {
        let now = Instant::now();
        let mut scroller = ThumbnailScroller::new();
        assert!(scroller.reveal(900.0, 1000.0, 400.0, now));
        let mid = scroller.offset_at(now + Duration::from_millis(100));
        assert!(mid > 0.0 && mid < 600.0);
        let end = scroller.offset_at(now + Duration::from_millis(300));
        assert_eq!(end, 600.0);
        assert!(!scroller.is_animating());
        assert!(!scroller.reveal(700.0, 800.0, 400.0, now + Duration::from_millis(400)));
    }
}
