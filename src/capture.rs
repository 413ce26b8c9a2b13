use std::io::Cursor;

use image::{ImageFormat, RgbImage};
use thiserror::Error;

use crate::document::RenderedSurface;
use crate::session::SharedSession;

/// Selections narrower or shorter than this (surface-local units) are dropped.
pub const MIN_SELECTION_PX: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Drag corners. Extents come from min/max of the corners, so the rectangle
/// is the same whichever way the drag went.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRect {
    pub start_x: f32,
    pub start_y: f32,
    pub end_x: f32,
    pub end_y: f32,
}

impl SelectionRect {
    pub fn from_corners(start: Point, end: Point) -> Self {
        Self {
            start_x: start.x,
            start_y: start.y,
            end_x: end.x,
            end_y: end.y,
        }
    }

    pub fn left(&self) -> f32 {
        self.start_x.min(self.end_x)
    }

    pub fn top(&self) -> f32 {
        self.start_y.min(self.end_y)
    }

    pub fn width(&self) -> f32 {
        self.start_x.max(self.end_x) - self.left()
    }

    pub fn height(&self) -> f32 {
        self.start_y.max(self.end_y) - self.top()
    }

    pub fn is_at_least(&self, min: f32) -> bool {
        self.width() >= min && self.height() >= min
    }

    /// Intersect with the displayed page `[0, width] x [0, height]`.
    pub fn clamped(&self, width: f32, height: f32) -> Self {
        let x0 = self.left().clamp(0.0, width);
        let y0 = self.top().clamp(0.0, height);
        let x1 = (self.left() + self.width()).clamp(0.0, width);
        let y1 = (self.top() + self.height()).clamp(0.0, height);
        Self {
            start_x: x0,
            start_y: y0,
            end_x: x1,
            end_y: y1,
        }
    }
}

/// A region of the native pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl NativeRect {
    /// Intersect with a `width x height` buffer; `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<NativeRect> {
        let x = self.x.min(width);
        let y = self.y.min(height);
        let w = self.width.min(width - x);
        let h = self.height.min(height - y);
        if w == 0 || h == 0 {
            return None;
        }
        Some(NativeRect {
            x,
            y,
            width: w,
            height: h,
        })
    }
}

/// Map a surface-local selection into native pixels. Each axis scales by
/// `native / displayed` independently. `None` when the displayed size is
/// degenerate.
pub fn map_selection_to_native(
    displayed_width: f32,
    displayed_height: f32,
    native_width: u32,
    native_height: u32,
    rect: &SelectionRect,
) -> Option<NativeRect> {
    if displayed_width <= 0.0 || displayed_height <= 0.0 {
        return None;
    }
    let scale_x = native_width as f32 / displayed_width;
    let scale_y = native_height as f32 / displayed_height;
    Some(NativeRect {
        x: (rect.left() * scale_x).round().max(0.0) as u32,
        y: (rect.top() * scale_y).round().max(0.0) as u32,
        width: (rect.width() * scale_x).round().max(0.0) as u32,
        height: (rect.height() * scale_y).round().max(0.0) as u32,
    })
}

/// An encoded capture ready to attach to a question.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub serial: u64,
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("the page is still rendering")]
    SurfaceNotReady,
    #[error("the page pixels could not be read")]
    Unreadable,
    #[error("the page has no displayed size")]
    NoDisplaySize,
    #[error("the selection lies outside the page")]
    EmptyRegion,
    #[error("failed to encode the capture: {0}")]
    Encode(#[from] image::ImageError),
}

/// Copy `rect` out of `surface` into a fresh buffer and encode it as PNG.
/// Returns (png_bytes, width, height).
pub fn extract_region(
    surface: &RenderedSurface,
    rect: NativeRect,
) -> Result<(Vec<u8>, u32, u32), CaptureError> {
    if !surface.is_readable() {
        return Err(CaptureError::Unreadable);
    }
    let rect = rect
        .clamp_to(surface.width, surface.height)
        .ok_or(CaptureError::EmptyRegion)?;

    let stride = surface.width as usize * 3;
    let row_len = rect.width as usize * 3;
    let mut pixels = Vec::with_capacity(row_len * rect.height as usize);
    for row in rect.y..rect.y + rect.height {
        let start = row as usize * stride + rect.x as usize * 3;
        pixels.extend_from_slice(&surface.pixels[start..start + row_len]);
    }
    let region = RgbImage::from_raw(rect.width, rect.height, pixels).ok_or(CaptureError::Unreadable)?;

    let mut png = Vec::new();
    region.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok((png, rect.width, rect.height))
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    Idle,
    Armed,
    Selecting(SelectionRect),
    /// Extraction committed; always followed by a return to `Idle`.
    Extracted,
}

#[derive(Debug)]
pub enum CaptureOutcome {
    /// The event had no meaning in the current state.
    Ignored,
    Selecting,
    /// Released below the size threshold.
    Discarded,
    Captured { serial: u64, width: u32, height: u32 },
    Failed(CaptureError),
}

pub struct CaptureEngine {
    session: SharedSession,
    state: CaptureState,
    min_selection: f32,
    next_serial: u64,
}

impl CaptureEngine {
    pub fn new(session: SharedSession, min_selection: f32) -> Self {
        Self {
            session,
            state: CaptureState::Idle,
            min_selection,
            next_serial: 1,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    /// Opening the panel ends capture mode in the session without going
    /// through the engine, so the session has the final say.
    pub fn is_armed(&self) -> bool {
        !matches!(self.state, CaptureState::Idle) && self.session.capture_mode()
    }

    /// The live selection while dragging.
    pub fn selection(&self) -> Option<SelectionRect> {
        match self.state {
            CaptureState::Selecting(rect) if self.session.capture_mode() => Some(rect),
            _ => None,
        }
    }

    pub fn toggle(&mut self) {
        self.sync_with_session();
        if self.is_armed() {
            self.disarm();
        } else {
            self.arm();
        }
    }

    pub fn arm(&mut self) {
        self.session.arm_capture();
        self.state = CaptureState::Armed;
        log::debug!("Capture armed");
    }

    /// Leave capture mode, dropping any selection in progress.
    pub fn disarm(&mut self) {
        self.session.disarm_capture();
        self.state = CaptureState::Idle;
    }

    /// Capture mode can be switched off from the panel side.
    fn sync_with_session(&mut self) {
        if self.state != CaptureState::Idle && !self.session.capture_mode() {
            self.state = CaptureState::Idle;
        }
    }

    pub fn pointer_down(&mut self, at: Point) -> CaptureOutcome {
        self.sync_with_session();
        if self.state != CaptureState::Armed {
            return CaptureOutcome::Ignored;
        }
        self.state = CaptureState::Selecting(SelectionRect::from_corners(at, at));
        CaptureOutcome::Selecting
    }

    pub fn pointer_move(&mut self, at: Point) -> CaptureOutcome {
        self.sync_with_session();
        match &mut self.state {
            CaptureState::Selecting(rect) => {
                rect.end_x = at.x;
                rect.end_y = at.y;
                CaptureOutcome::Selecting
            }
            _ => CaptureOutcome::Ignored,
        }
    }

    /// Finish the drag. `surface` is the page as currently rendered (if any)
    /// and `displayed` its on-screen size in surface-local units.
    pub fn pointer_up(
        &mut self,
        at: Point,
        surface: Option<&RenderedSurface>,
        displayed: (f32, f32),
    ) -> CaptureOutcome {
        self.sync_with_session();
        let CaptureState::Selecting(mut rect) = self.state else {
            return CaptureOutcome::Ignored;
        };
        rect.end_x = at.x;
        rect.end_y = at.y;

        if !rect.is_at_least(self.min_selection) {
            log::debug!(
                "Selection {:.0}x{:.0} below threshold, discarded",
                rect.width(),
                rect.height()
            );
            self.disarm();
            return CaptureOutcome::Discarded;
        }

        self.state = CaptureState::Extracted;
        let result = self.extract(&rect, surface, displayed);
        self.disarm();

        match result {
            Ok(image) => {
                let outcome = CaptureOutcome::Captured {
                    serial: image.serial,
                    width: image.width,
                    height: image.height,
                };
                log::info!(
                    "Captured {}x{} region of page {}",
                    image.width,
                    image.height,
                    self.session.current_page()
                );
                self.session.set_captured_image(image);
                outcome
            }
            Err(e) => {
                log::warn!("Region capture failed: {}", e);
                CaptureOutcome::Failed(e)
            }
        }
    }

    fn extract(
        &mut self,
        rect: &SelectionRect,
        surface: Option<&RenderedSurface>,
        (displayed_width, displayed_height): (f32, f32),
    ) -> Result<CapturedImage, CaptureError> {
        let surface = surface.ok_or(CaptureError::SurfaceNotReady)?;
        let visible = rect.clamped(displayed_width, displayed_height);
        let native = map_selection_to_native(
            displayed_width,
            displayed_height,
            surface.width,
            surface.height,
            &visible,
        )
        .ok_or(CaptureError::NoDisplaySize)?;
        let (png, width, height) = extract_region(surface, native)?;

        let serial = self.next_serial;
        self.next_serial += 1;
        Ok(CapturedImage {
            serial,
            png,
            width,
            height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1600x1600 surface whose red channel encodes x/8 and green y/8.
    fn gradient_surface() -> RenderedSurface {
        let (w, h) = (1600u32, 1600u32);
        let mut pixels = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                pixels.extend_from_slice(&[(x / 8) as u8, (y / 8) as u8, 0]);
            }
        }
        RenderedSurface::new(1, w, h, pixels)
    }

    fn armed_engine() -> (CaptureEngine, SharedSession) {
        let session = SharedSession::new("doc");
        let mut engine = CaptureEngine::new(session.clone(), MIN_SELECTION_PX);
        engine.arm();
        (engine, session)
    }

    #[test]
    fn test_rect_is_direction_independent() {
        let a = SelectionRect::from_corners(Point::new(10.0, 20.0), Point::new(110.0, 70.0));
        let b = SelectionRect::from_corners(Point::new(110.0, 70.0), Point::new(10.0, 20.0));
        for r in [a, b] {
            assert_eq!((r.left(), r.top(), r.width(), r.height()), (10.0, 20.0, 100.0, 50.0));
        }
    }

    #[test]
    fn test_mapping_scales_per_axis() {
        let rect = SelectionRect::from_corners(Point::new(50.0, 50.0), Point::new(70.0, 70.0));
        let native = map_selection_to_native(400.0, 400.0, 1600, 1600, &rect).unwrap();
        assert_eq!(
            native,
            NativeRect {
                x: 200,
                y: 200,
                width: 80,
                height: 80
            }
        );

        let skewed = map_selection_to_native(400.0, 200.0, 800, 800, &rect).unwrap();
        assert_eq!((skewed.x, skewed.y, skewed.width, skewed.height), (100, 200, 40, 80));
        assert!(map_selection_to_native(0.0, 200.0, 800, 800, &rect).is_none());
    }

    #[test]
    fn test_mapped_crop_matches_proportional_crop() {
        let surface = gradient_surface();
        let rect = SelectionRect::from_corners(Point::new(50.0, 50.0), Point::new(70.0, 70.0));
        let native = map_selection_to_native(400.0, 400.0, 1600, 1600, &rect).unwrap();
        let (png, w, h) = extract_region(&surface, native).unwrap();
        assert_eq!((w, h), (80, 80));

        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [25, 25, 0]);
        assert_eq!(decoded.get_pixel(79, 79).0, [34, 34, 0]);
    }

    #[test]
    fn test_native_rect_clamped_to_buffer() {
        let r = NativeRect {
            x: 90,
            y: 0,
            width: 50,
            height: 10,
        };
        assert_eq!(
            r.clamp_to(100, 100),
            Some(NativeRect {
                x: 90,
                y: 0,
                width: 10,
                height: 10
            })
        );
        let outside = NativeRect {
            x: 120,
            y: 0,
            width: 5,
            height: 5,
        };
        assert_eq!(outside.clamp_to(100, 100), None);
    }

    #[test]
    fn test_small_drag_is_discarded_silently() {
        let (mut engine, session) = armed_engine();
        engine.pointer_down(Point::new(100.0, 100.0));
        engine.pointer_move(Point::new(300.0, 105.0));
        let outcome = engine.pointer_up(Point::new(300.0, 109.0), None, (400.0, 400.0));
        assert!(matches!(outcome, CaptureOutcome::Discarded));
        assert_eq!(engine.state(), &CaptureState::Idle);
        assert!(!session.capture_mode());
        assert!(!session.has_captured_image());
    }

    #[test]
    fn test_narrow_drag_is_discarded() {
        let (mut engine, session) = armed_engine();
        let surface = gradient_surface();
        engine.pointer_down(Point::new(100.0, 100.0));
        let outcome = engine.pointer_up(Point::new(109.0, 300.0), Some(&surface), (400.0, 400.0));
        assert!(matches!(outcome, CaptureOutcome::Discarded));
        assert!(!session.capture_mode());
        assert!(!session.has_captured_image());
    }

    #[test]
    fn test_selection_off_page_is_empty_region() {
        let (mut engine, session) = armed_engine();
        let surface = gradient_surface();
        engine.pointer_down(Point::new(420.0, 50.0));
        let outcome = engine.pointer_up(Point::new(480.0, 120.0), Some(&surface), (400.0, 400.0));
        assert!(matches!(outcome, CaptureOutcome::Failed(CaptureError::EmptyRegion)));
        assert_eq!(engine.state(), &CaptureState::Idle);
        assert!(!session.has_captured_image());
    }

    #[test]
    fn test_opening_panel_ends_armed_state() {
        let (mut engine, session) = armed_engine();
        assert!(engine.is_armed());
        session.toggle_panel();
        assert!(!engine.is_armed());
        assert_eq!(engine.is_armed(), session.capture_mode());

        engine.arm();
        engine.pointer_down(Point::new(10.0, 10.0));
        assert!(engine.selection().is_some());
        session.set_panel_open(true);
        assert!(!engine.is_armed());
        assert!(engine.selection().is_none());
    }

    #[test]
    fn test_offset_crop_reads_the_right_rows() {
        let surface = gradient_surface();
        let rect = NativeRect {
            x: 800,
            y: 1592,
            width: 16,
            height: 8,
        };
        let (png, w, h) = extract_region(&surface, rect).unwrap();
        assert_eq!((w, h), (16, 8));
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [100, 199, 0]);
        assert_eq!(decoded.get_pixel(15, 7).0, [101, 199, 0]);
    }

    #[test]
    fn test_successful_capture_publishes_and_resets() {
        let (mut engine, session) = armed_engine();
        let surface = gradient_surface();
        engine.pointer_down(Point::new(70.0, 70.0));
        engine.pointer_move(Point::new(60.0, 60.0));
        assert_eq!(engine.selection().map(|r| r.width()), Some(10.0));
        let outcome = engine.pointer_up(Point::new(50.0, 50.0), Some(&surface), (400.0, 400.0));

        assert!(matches!(
            outcome,
            CaptureOutcome::Captured {
                width: 80,
                height: 80,
                ..
            }
        ));
        assert_eq!(engine.state(), &CaptureState::Idle);
        assert!(engine.selection().is_none());
        assert!(!session.capture_mode());
        assert_eq!(session.captured_image().map(|i| i.width), Some(80));
    }

    #[test]
    fn test_unready_surface_fails_without_publishing() {
        let (mut engine, session) = armed_engine();
        engine.pointer_down(Point::new(0.0, 0.0));
        let outcome = engine.pointer_up(Point::new(50.0, 50.0), None, (400.0, 400.0));
        assert!(matches!(outcome, CaptureOutcome::Failed(CaptureError::SurfaceNotReady)));
        assert_eq!(engine.state(), &CaptureState::Idle);
        assert!(!session.capture_mode());
        assert!(!session.has_captured_image());
    }

    #[test]
    fn test_second_capture_overwrites_first() {
        let (mut engine, session) = armed_engine();
        let surface = gradient_surface();
        engine.pointer_down(Point::new(0.0, 0.0));
        engine.pointer_up(Point::new(20.0, 20.0), Some(&surface), (400.0, 400.0));

        engine.arm();
        engine.pointer_down(Point::new(0.0, 0.0));
        engine.pointer_up(Point::new(40.0, 40.0), Some(&surface), (400.0, 400.0));

        let pending = session.take_captured_image().unwrap();
        assert_eq!(pending.serial, 2);
        assert_eq!(pending.width, 160);
        assert!(session.take_captured_image().is_none());
    }

    #[test]
    fn test_pointer_ignored_unless_armed() {
        let session = SharedSession::new("doc");
        let mut engine = CaptureEngine::new(session.clone(), MIN_SELECTION_PX);
        assert!(matches!(engine.pointer_down(Point::new(1.0, 1.0)), CaptureOutcome::Ignored));

        engine.arm();
        session.set_panel_open(true);
        assert!(matches!(engine.pointer_down(Point::new(1.0, 1.0)), CaptureOutcome::Ignored));
        assert_eq!(engine.state(), &CaptureState::Idle);
    }

    #[test]
    fn test_selection_clamped_to_page() {
        let (mut engine, session) = armed_engine();
        let surface = gradient_surface();
        engine.pointer_down(Point::new(380.0, 380.0));
        engine.pointer_up(Point::new(450.0, 450.0), Some(&surface), (400.0, 400.0));
        let image = session.captured_image().unwrap();
        assert_eq!((image.width, image.height), (80, 80));
    }
}
