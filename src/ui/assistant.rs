use crate::chat::{ChatTranscript, Sender};
use crate::session::SharedSession;
use crate::ui::{UiAction, UiState};

/// Texture of the pending capture, keyed by capture serial.
pub struct CapturePreview {
    serial: u64,
    texture: egui::TextureHandle,
}

fn decode_preview(ctx: &egui::Context, serial: u64, png: &[u8]) -> Option<CapturePreview> {
    let rgba = match image::load_from_memory(png) {
        Ok(decoded) => decoded.to_rgba8(),
        Err(e) => {
            log::warn!("Could not decode capture #{} for preview: {}", serial, e);
            return None;
        }
    };
    let size = [rgba.width() as usize, rgba.height() as usize];
    let image = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
    Some(CapturePreview {
        serial,
        texture: ctx.load_texture(format!("capture-{}", serial), image, egui::TextureOptions::LINEAR),
    })
}

pub fn show_assistant_panel(
    ctx: &egui::Context,
    state: &mut UiState,
    session: &SharedSession,
    transcript: &ChatTranscript,
) -> Vec<UiAction> {
    let mut actions = Vec::new();

    egui::SidePanel::right("assistant")
        .resizable(true)
        .default_width(420.0)
        .min_width(280.0)
        .show_animated(ctx, session.panel_open(), |ui| {
            egui::TopBottomPanel::bottom("assistant_input")
                .show_inside(ui, |ui| show_input(ui, state, session, &mut actions));

            egui::CentralPanel::default().show_inside(ui, |ui| {
                if transcript.is_empty() {
                    ui.vertical_centered(|ui| {
                        ui.add_space(ui.available_height() / 3.0);
                        ui.heading("Any questions?");
                        ui.label(format!("Ask about page {}.", session.current_page()));
                    });
                    return;
                }
                egui::ScrollArea::vertical()
                    .auto_shrink(false)
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for message in transcript.messages() {
                            let (fill, heading) = match message.sender {
                                Sender::User => (ui.visuals().faint_bg_color, "You"),
                                Sender::Assistant => (ui.visuals().extreme_bg_color, "Assistant"),
                                Sender::Error => (egui::Color32::from_rgb(90, 30, 30), "Error"),
                            };
                            egui::Frame::new()
                                .fill(fill)
                                .corner_radius(6.0)
                                .inner_margin(8.0)
                                .show(ui, |ui| {
                                    ui.set_width(ui.available_width());
                                    let mut header = heading.to_string();
                                    if let Some(page) = message.page {
                                        header.push_str(&format!(" \u{00B7} p. {}", page));
                                    }
                                    if let Some((w, h)) = message.attachment {
                                        header.push_str(&format!(" \u{00B7} image {}\u{00D7}{}", w, h));
                                    }
                                    ui.label(egui::RichText::new(header).small().weak());
                                    ui.label(&message.text);
                                });
                            ui.add_space(4.0);
                        }
                        if transcript.is_waiting() {
                            ui.horizontal(|ui| {
                                ui.spinner();
                                ui.label("Thinking...");
                            });
                        }
                    });
            });
        });

    actions
}

fn show_input(ui: &mut egui::Ui, state: &mut UiState, session: &SharedSession, actions: &mut Vec<UiAction>) {
    match session.captured_image() {
        Some(image) => {
            if state.capture_preview.as_ref().map(|p| p.serial) != Some(image.serial) {
                state.capture_preview = decode_preview(ui.ctx(), image.serial, &image.png);
            }
            ui.horizontal(|ui| {
                if let Some(preview) = &state.capture_preview {
                    let size = preview.texture.size_vec2();
                    let scale = (160.0 / size.x).min(96.0 / size.y).min(1.0);
                    ui.image((preview.texture.id(), size * scale));
                }
                ui.vertical(|ui| {
                    ui.label(format!("{}\u{00D7}{} capture attached", image.width, image.height));
                    if ui.button("Remove").clicked() {
                        actions.push(UiAction::DismissCapture);
                    }
                });
            });
        }
        None => state.capture_preview = None,
    }

    let input_id = egui::Id::new("assistant_input_text");
    // Enter sends; Shift+Enter falls through to the editor as a newline.
    let send_key = ui.memory(|m| m.has_focus(input_id))
        && ui.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Enter));

    let mut send = send_key;
    ui.horizontal(|ui| {
        let button_width = 56.0;
        ui.add(
            egui::TextEdit::multiline(&mut state.draft)
                .id(input_id)
                .desired_rows(2)
                .desired_width(ui.available_width() - button_width)
                .hint_text(format!("Ask about page {}", session.current_page())),
        );
        if ui
            .add_enabled(!state.draft.trim().is_empty(), egui::Button::new("Send"))
            .clicked()
        {
            send = true;
        }
    });

    if send {
        let text = state.draft.trim().to_string();
        if !text.is_empty() {
            actions.push(UiAction::Ask(text));
            state.draft.clear();
        }
    }
}
