pub mod assistant;
pub mod note_bar;
pub mod notice;
pub mod shortcuts;
pub mod thumbnails;
pub mod toolbar;

use std::time::Instant;

use crate::chat::ChatTranscript;
use crate::document::DocumentStore;
use crate::navigation::NavKey;
use crate::viewer::Viewer;

/// Space kept around the page inside the content area.
pub const PAGE_MARGIN: f32 = 12.0;

#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    OpenFile,
    Navigate(NavKey),
    GoToPage(u32),
    ToggleCapture,
    TogglePanel,
    Ask(String),
    DismissCapture,
    RetryPage,
}

pub struct UiState {
    pub show_shortcuts: bool,
    pub draft: String,
    pub content_rect: egui::Rect,
    pub thumbnails: thumbnails::ThumbnailCache,
    pub capture_preview: Option<assistant::CapturePreview>,
    /// Shown in place of a document when opening failed.
    pub open_error: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            show_shortcuts: false,
            draft: String::new(),
            content_rect: egui::Rect::EVERYTHING,
            thumbnails: thumbnails::ThumbnailCache::default(),
            capture_preview: None,
            open_error: None,
        }
    }
}

impl UiState {
    /// Forget per-document state when another document is opened.
    pub fn reset_document(&mut self) {
        self.thumbnails.clear();
        self.capture_preview = None;
        self.draft.clear();
        self.open_error = None;
    }
}

/// Where the page sits inside the content area: horizontally centred,
/// top-aligned below the margin.
pub fn page_rect(content: egui::Rect, displayed: (f32, f32)) -> egui::Rect {
    let (width, height) = displayed;
    egui::Rect::from_min_size(
        egui::pos2(content.center().x - width / 2.0, content.top() + PAGE_MARGIN),
        egui::vec2(width, height),
    )
}

/// Build the whole overlay for one frame. Returns the actions to apply.
pub fn build_ui<S: DocumentStore>(
    ctx: &egui::Context,
    state: &mut UiState,
    viewer: Option<&mut Viewer<S>>,
    transcript: &ChatTranscript,
    thumbnail_width: u32,
    now: Instant,
) -> Vec<UiAction> {
    let mut actions = Vec::new();

    let Some(viewer) = viewer else {
        actions.extend(toolbar::show_toolbar::<S>(ctx, state, None, transcript.is_waiting()));
        actions.extend(notice::show_empty_state(ctx, state.open_error.as_deref()));
        shortcuts::show_shortcuts_window(ctx, &mut state.show_shortcuts);
        state.content_rect = ctx.available_rect();
        return actions;
    };

    actions.extend(toolbar::show_toolbar(
        ctx,
        state,
        Some(&*viewer),
        transcript.is_waiting(),
    ));
    note_bar::show_note_bar(ctx, viewer, now);
    actions.extend(thumbnails::show_thumbnails(
        ctx,
        &mut state.thumbnails,
        viewer,
        thumbnail_width,
        now,
    ));
    actions.extend(assistant::show_assistant_panel(
        ctx,
        state,
        viewer.session(),
        transcript,
    ));

    state.content_rect = ctx.available_rect();

    if let Some(displayed) = viewer.displayed_size() {
        let page = page_rect(state.content_rect, displayed);
        actions.extend(notice::show_page_status(ctx, page, viewer.page()));
        if viewer.capture().is_armed() && ctx.pointer_hover_pos().is_some_and(|p| page.contains(p)) {
            ctx.set_cursor_icon(egui::CursorIcon::Crosshair);
        }
    }
    if let Some(notice) = viewer.notice() {
        notice::show_notice(ctx, state.content_rect, notice);
    }
    shortcuts::show_shortcuts_window(ctx, &mut state.show_shortcuts);

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_rect_centres_below_margin() {
        let content = egui::Rect::from_min_size(egui::pos2(100.0, 40.0), egui::vec2(800.0, 600.0));
        let page = page_rect(content, (400.0, 300.0));
        assert_eq!(page.min, egui::pos2(300.0, 40.0 + PAGE_MARGIN));
        assert_eq!(page.size(), egui::vec2(400.0, 300.0));
    }
}
