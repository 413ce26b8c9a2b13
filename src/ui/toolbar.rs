use crate::document::DocumentStore;
use crate::navigation::NavKey;
use crate::ui::{UiAction, UiState};
use crate::viewer::Viewer;

pub fn show_toolbar<S: DocumentStore>(
    ctx: &egui::Context,
    state: &mut UiState,
    viewer: Option<&Viewer<S>>,
    waiting: bool,
) -> Vec<UiAction> {
    let mut actions = Vec::new();

    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui.button("Open...").on_hover_text("Ctrl+O").clicked() {
                actions.push(UiAction::OpenFile);
            }

            if let Some(viewer) = viewer {
                ui.separator();
                let page = viewer.current_page();
                let count = viewer.page_count();
                if ui
                    .add_enabled(page > 1, egui::Button::new("\u{25C0}"))
                    .on_hover_text("Previous page")
                    .clicked()
                {
                    actions.push(UiAction::Navigate(NavKey::Backward));
                }
                match count {
                    Some(count) => ui.label(format!("Page {} / {}", page, count)),
                    None => ui.label(format!("Page {}", page)),
                };
                if ui
                    .add_enabled(count.is_some_and(|c| page < c), egui::Button::new("\u{25B6}"))
                    .on_hover_text("Next page")
                    .clicked()
                {
                    actions.push(UiAction::Navigate(NavKey::Forward));
                }

                ui.separator();
                let metadata = viewer.metadata();
                let title = metadata
                    .title
                    .clone()
                    .unwrap_or_else(|| viewer.document_id().to_string());
                let label = ui.label(egui::RichText::new(title).strong());
                if let Some(created) = &metadata.created {
                    label.on_hover_text(format!("Created {}", created));
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("?").on_hover_text("Keyboard shortcuts (F1)").clicked() {
                    state.show_shortcuts = !state.show_shortcuts;
                }
                let Some(viewer) = viewer else {
                    return;
                };
                let session = viewer.session();

                let mut ask = String::from("Ask");
                if session.has_captured_image() {
                    ask.push_str(" \u{25CF}");
                }
                if ui
                    .selectable_label(session.panel_open(), ask)
                    .on_hover_text("Show or hide the assistant")
                    .clicked()
                {
                    actions.push(UiAction::TogglePanel);
                }
                if ui
                    .selectable_label(session.capture_mode(), "Capture")
                    .on_hover_text("Drag over the page to capture a region")
                    .clicked()
                {
                    actions.push(UiAction::ToggleCapture);
                }
                if waiting {
                    ui.spinner();
                }
            });
        });
    });

    actions
}
