pub fn show_shortcuts_window(ctx: &egui::Context, show: &mut bool) {
    let sections: &[(&str, &[(&str, &str)])] = &[
        (
            "General",
            &[
                ("Ctrl+O", "Open file"),
                ("Ctrl+Q", "Quit"),
                ("F1", "Toggle this dialog"),
            ][..],
        ),
        (
            "Pages",
            &[
                ("Right / Down / PgDn", "Next page"),
                ("Left / Up / PgUp", "Previous page"),
                ("Home", "First page"),
                ("End", "Last page"),
                ("Mouse wheel", "One page per scroll gesture"),
                ("Click thumbnail", "Go to page"),
            ][..],
        ),
        (
            "Capture",
            &[
                ("Capture button", "Arm or disarm region capture"),
                ("Drag on page", "Select the region to capture"),
                ("Escape", "Cancel capture"),
            ][..],
        ),
        (
            "Assistant",
            &[
                ("Enter", "Send question"),
                ("Shift+Enter", "New line"),
            ][..],
        ),
    ];

    egui::Window::new("Keyboard Shortcuts")
        .open(show)
        .resizable(false)
        .collapsible(false)
        .default_width(360.0)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            for (i, (heading, bindings)) in sections.iter().enumerate() {
                if i > 0 {
                    ui.add_space(6.0);
                }
                ui.strong(*heading);
                egui::Grid::new(("shortcuts", i))
                    .num_columns(2)
                    .spacing([20.0, 4.0])
                    .show(ui, |ui| {
                        for (key, desc) in *bindings {
                            ui.label(egui::RichText::new(*key).monospace());
                            ui.label(*desc);
                            ui.end_row();
                        }
                    });
            }
        });
}
