use crate::ui::UiAction;
use crate::viewer::{Notice, PageView};

/// Transient alert along the bottom of the content area.
pub fn show_notice(ctx: &egui::Context, content: egui::Rect, notice: &Notice) {
    egui::Area::new(egui::Id::new("notice"))
        .order(egui::Order::Foreground)
        .fixed_pos(egui::pos2(content.center().x, content.bottom() - 16.0))
        .pivot(egui::Align2::CENTER_BOTTOM)
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style())
                .fill(egui::Color32::from_rgb(120, 40, 40))
                .show(ui, |ui| {
                    ui.label(egui::RichText::new(&notice.message).color(egui::Color32::WHITE));
                });
        });
}

/// Spinner or error placeholder over the page while it has no surface.
pub fn show_page_status(ctx: &egui::Context, page: egui::Rect, view: &PageView) -> Vec<UiAction> {
    let mut actions = Vec::new();
    if matches!(view, PageView::Ready(_)) {
        return actions;
    }

    egui::Area::new(egui::Id::from("page_status"))
        .fixed_pos(page.center())
        .pivot(egui::Align2::CENTER_CENTER)
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| match view {
                PageView::Loading => {
                    ui.spinner();
                    ui.label("Rendering page...");
                }
                PageView::Failed(reason) => {
                    ui.label(egui::RichText::new("This page could not be displayed.").strong());
                    ui.label(egui::RichText::new(reason).small().weak());
                    if ui.button("Retry").clicked() {
                        actions.push(UiAction::RetryPage);
                    }
                }
                PageView::Ready(_) => {}
            });
        });

    actions
}

pub fn show_empty_state(ctx: &egui::Context, error: Option<&str>) -> Vec<UiAction> {
    let mut actions = Vec::new();
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() / 3.0);
            ui.heading("No document open");
            if let Some(error) = error {
                ui.colored_label(egui::Color32::from_rgb(220, 90, 90), error);
            }
            if ui.button("Open a PDF...").clicked() {
                actions.push(UiAction::OpenFile);
            }
        });
    });
    actions
}
