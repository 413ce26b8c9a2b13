use std::time::{Duration, Instant};

use crate::capture::{CaptureEngine, CaptureOutcome, Point};
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::document::{DocumentError, DocumentMetadata, DocumentStore, RenderedSurface};
use crate::layout::{LayoutEngine, LayoutMetrics, LayoutTrigger};
use crate::navigation::{NavKey, PageNavigator, ThumbnailScroller, WheelDirection, WheelNavigator};
use crate::notes::NoteStore;
use crate::session::SharedSession;

/// Input the viewer reacts to. Pointer positions are surface-local.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerEvent {
    Key(NavKey),
    /// Positive means toward later pages.
    Wheel(f32),
    Layout(LayoutTrigger, LayoutMetrics),
    JumpTo(u32),
    ToggleCapture,
    CancelCapture,
    TogglePanel,
    PointerDown(Point),
    PointerMove(Point),
    PointerUp(Point),
}

/// What currently occupies the page area.
#[derive(Debug, Clone, PartialEq)]
pub enum PageView {
    Loading,
    Ready(RenderedSurface),
    Failed(String),
}

/// Typing pauses this long before a note is written out.
const NOTE_SAVE_DELAY: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub expires_at: Instant,
}

/// Uniform thumbnail rows as laid out by the sidebar.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ThumbnailGeometry {
    row_height: f32,
    view_height: f32,
}

/// One open document: navigation, layout, rendering, capture and notes.
pub struct Viewer<S: DocumentStore> {
    store: S,
    document_id: String,
    session: SharedSession,
    metadata: DocumentMetadata,
    navigator: PageNavigator,
    layout: LayoutEngine,
    wheel: WheelNavigator,
    capture: CaptureEngine,
    notes: NoteStore,
    note_save: Debouncer,
    thumbnails: ThumbnailScroller,
    thumbnail_geometry: Option<ThumbnailGeometry>,
    page: PageView,
    render_scale: f32,
    text_focused: bool,
    notice: Option<Notice>,
    notice_duration: Duration,
}

impl<S: DocumentStore> Viewer<S> {
    pub fn open(store: S, document_id: impl Into<String>, config: &Config, notes: NoteStore) -> Self {
        let document_id = document_id.into();
        let session = SharedSession::new(document_id.clone());
        let mut navigator = PageNavigator::new();
        let mut layout = LayoutEngine::new(config.layout(), LayoutMetrics::default());
        let mut page = PageView::Loading;

        match store.page_count(&document_id) {
            Ok(count) => {
                navigator.set_page_count(count);
                session.set_page_count(count);
                log::info!("{} has {} page(s)", document_id, count);
            }
            Err(e) => {
                log::error!("Failed to read page count of {}: {}", document_id, e);
                page = PageView::Failed(e.to_string());
            }
        }

        match store.page_size(&document_id, 1) {
            Ok(size) => {
                layout.set_aspect_ratio(size.aspect_ratio());
            }
            Err(e) => log::warn!("No page size for {}: {}", document_id, e),
        }

        let metadata = store.metadata(&document_id).unwrap_or_else(|e| {
            log::warn!("No metadata for {}: {}", document_id, e);
            DocumentMetadata::default()
        });

        let capture = CaptureEngine::new(session.clone(), config.min_selection_px);

        Self {
            store,
            document_id,
            session,
            metadata,
            navigator,
            layout,
            wheel: WheelNavigator::new(config.wheel_debounce()),
            capture,
            notes,
            note_save: Debouncer::new(NOTE_SAVE_DELAY),
            thumbnails: ThumbnailScroller::new(),
            thumbnail_geometry: None,
            page,
            render_scale: 1.0,
            text_focused: false,
            notice: None,
            notice_duration: config.notice_duration(),
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn current_page(&self) -> u32 {
        self.navigator.current_page()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.navigator.page_count()
    }

    pub fn page(&self) -> &PageView {
        &self.page
    }

    pub fn capture(&self) -> &CaptureEngine {
        &self.capture
    }

    pub fn notes(&self) -> &NoteStore {
        &self.notes
    }

    /// Replace the current page's note. Saving waits for a pause in typing.
    pub fn edit_note(&mut self, text: impl Into<String>, now: Instant) {
        let page = self.navigator.current_page();
        if self.notes.set(page, text) {
            self.note_save.trigger(now);
        }
    }

    pub fn clear_note(&mut self, now: Instant) {
        self.edit_note(String::new(), now);
    }

    /// Write pending note edits now, e.g. when the editor loses focus.
    pub fn save_notes(&mut self) {
        self.note_save.cancel();
        if self.notes.has_unsaved() {
            self.notes.flush();
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.layout.aspect_ratio()
    }

    /// On-screen size of the page in logical pixels.
    pub fn displayed_size(&self) -> Option<(f32, f32)> {
        let width = self.layout.target_width().filter(|w| *w > 0.0)?;
        let height = match &self.page {
            PageView::Ready(surface) if surface.width > 0 => {
                width * surface.height as f32 / surface.width as f32
            }
            _ => width / self.layout.aspect_ratio(),
        };
        Some((width, height))
    }

    /// Text editing controls own the keyboard and the wheel while focused.
    pub fn set_text_focus(&mut self, focused: bool) {
        self.text_focused = focused;
    }

    /// Physical pixels per logical pixel; pages render at native resolution.
    pub fn set_render_scale(&mut self, scale: f32) {
        if scale > 0.0 && (scale - self.render_scale).abs() > f32::EPSILON {
            self.render_scale = scale;
            self.render_current();
        }
    }

    pub fn set_thumbnail_geometry(&mut self, row_height: f32, view_height: f32) {
        self.thumbnail_geometry = Some(ThumbnailGeometry {
            row_height,
            view_height,
        });
    }

    /// The sidebar was scrolled by the user.
    pub fn thumbnails_scrolled(&mut self, offset: f32) {
        if !self.thumbnails.is_animating() {
            self.thumbnails.set_offset(offset);
        }
    }

    /// Offset the thumbnail list should show at `now`, when animating.
    pub fn thumbnail_offset(&mut self, now: Instant) -> Option<f32> {
        if self.thumbnails.is_animating() {
            Some(self.thumbnails.offset_at(now))
        } else {
            None
        }
    }

    pub fn render_thumbnail(&self, page: u32, width: u32) -> Result<RenderedSurface, DocumentError> {
        self.store.render_page(&self.document_id, page, width)
    }

    pub fn handle(&mut self, event: ViewerEvent, now: Instant) {
        match event {
            ViewerEvent::Key(key) => {
                if self.navigator.apply_key(key, self.text_focused) {
                    self.page_changed(now);
                }
            }
            ViewerEvent::Wheel(delta_y) => self.wheel.on_wheel(delta_y, self.text_focused, now),
            ViewerEvent::Layout(trigger, metrics) => {
                if metrics != *self.layout.metrics() {
                    self.layout.trigger(trigger, metrics, now);
                }
            }
            ViewerEvent::JumpTo(page) => {
                if self.navigator.jump_to(page) {
                    self.page_changed(now);
                }
            }
            ViewerEvent::ToggleCapture => self.capture.toggle(),
            ViewerEvent::CancelCapture => {
                if self.capture.is_armed() {
                    self.capture.disarm();
                }
            }
            ViewerEvent::TogglePanel => self.session.toggle_panel(),
            ViewerEvent::PointerDown(at) => {
                self.capture.pointer_down(at);
            }
            ViewerEvent::PointerMove(at) => {
                self.capture.pointer_move(at);
            }
            ViewerEvent::PointerUp(at) => self.finish_capture(at, now),
        }
    }

    /// Fire any due timers. Returns true if something visible changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = false;

        if let Some(direction) = self.wheel.poll(now) {
            let moved = match direction {
                WheelDirection::Forward => self.navigator.advance(),
                WheelDirection::Backward => self.navigator.retreat(),
            };
            if moved {
                self.page_changed(now);
                changed = true;
            }
        }

        if self.layout.poll(now).is_some() {
            self.render_current();
            changed = true;
        }

        if self.note_save.fire_if_due(now) {
            self.notes.flush();
        }

        if self.notice.as_ref().is_some_and(|n| now >= n.expires_at) {
            self.notice = None;
            changed = true;
        }

        changed
    }

    /// Earliest pending timer, for scheduling the next wake-up.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.wheel.next_deadline(),
            self.layout.next_deadline(),
            self.note_save.deadline(),
            self.notice.as_ref().map(|n| n.expires_at),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Lay out against the current geometry without waiting for the settle window.
    pub fn relayout_now(&mut self) {
        if self.layout.recompute_now().is_some() || self.page == PageView::Loading {
            self.render_current();
        }
    }

    /// Re-request the current page, e.g. after a render failure.
    pub fn retry(&mut self) {
        self.render_current();
    }

    pub fn show_notice(&mut self, message: impl Into<String>, now: Instant) {
        let message = message.into();
        log::info!("Notice: {}", message);
        self.notice = Some(Notice {
            message,
            expires_at: now + self.notice_duration,
        });
    }

    fn page_changed(&mut self, now: Instant) {
        let page = self.navigator.current_page();
        log::debug!("Page {} of {:?}", page, self.navigator.page_count());
        self.session.set_current_page(page);
        self.save_notes();
        if self.capture.is_armed() {
            self.capture.disarm();
        }
        self.render_current();

        if let Some(geometry) = self.thumbnail_geometry {
            let top = (page - 1) as f32 * geometry.row_height;
            self.thumbnails
                .reveal(top, top + geometry.row_height, geometry.view_height, now);
        }
    }

    fn render_current(&mut self) {
        if !self.navigator.is_ready() {
            return;
        }
        let Some(width) = self.layout.target_width() else {
            self.page = PageView::Loading;
            return;
        };
        let native_width = (width * self.render_scale).round() as u32;
        if native_width == 0 {
            self.page = PageView::Loading;
            return;
        }

        let page = self.navigator.current_page();
        self.page = match self.store.render_page(&self.document_id, page, native_width) {
            Ok(surface) => PageView::Ready(surface),
            Err(e) => {
                log::error!("Failed to render page {}: {}", page, e);
                PageView::Failed(e.to_string())
            }
        };
    }

    fn finish_capture(&mut self, at: Point, now: Instant) {
        let displayed = self.displayed_size().unwrap_or((0.0, 0.0));
        let surface = match &self.page {
            PageView::Ready(surface) => Some(surface),
            _ => None,
        };
        let outcome = self.capture.pointer_up(at, surface, displayed);
        if let CaptureOutcome::Failed(e) = outcome {
            self.show_notice(format!("Capture failed: {}", e), now);
        }
    }
}
