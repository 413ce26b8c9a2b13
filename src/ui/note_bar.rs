use std::time::Instant;

use crate::document::DocumentStore;
use crate::viewer::Viewer;

/// Note for the current page. Saved after a pause in typing or when the
/// field loses focus.
pub fn show_note_bar<S: DocumentStore>(ctx: &egui::Context, viewer: &mut Viewer<S>, now: Instant) {
    let page = viewer.current_page();
    egui::TopBottomPanel::bottom("note_bar")
        .resizable(false)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(format!("Note, page {}", page));
                if viewer.notes().has_note(page) && ui.small_button("Clear").clicked() {
                    viewer.clear_note(now);
                }
            });
            let mut text = viewer.notes().get(page).to_string();
            let response = ui.add(
                egui::TextEdit::multiline(&mut text)
                    .id(egui::Id::new(("note", page)))
                    .desired_rows(2)
                    .desired_width(f32::INFINITY)
                    .hint_text("Write a note for this page"),
            );
            if response.changed() {
                viewer.edit_note(text, now);
            }
            if response.lost_focus() {
                viewer.save_notes();
            }
        });
}
