use std::ffi::CString;
use std::sync::Arc;

use anyhow::Result;
use egui_winit::EventResponse;
use glutin::display::{GetGlDisplay, GlDisplay};
use winit::window::Window;

/// egui drawn with glow on top of the skia-rendered page.
pub struct Overlay {
    ctx: egui::Context,
    winit_state: egui_winit::State,
    painter: egui_glow::Painter,
    pending: Option<egui::FullOutput>,
    pixels_per_point: f32,
}

impl Overlay {
    /// The GL context must be current and the GL loader initialized.
    pub fn new(window: &Window, gl_context: &glutin::context::PossiblyCurrentContext) -> Result<Self> {
        let display = gl_context.display();
        let glow_context = unsafe {
            glow::Context::from_loader_function(|name| match CString::new(name) {
                Ok(name) => display.get_proc_address(name.as_c_str()).cast(),
                Err(_) => std::ptr::null(),
            })
        };
        let painter = egui_glow::Painter::new(Arc::new(glow_context), "", None, false)?;

        let ctx = egui::Context::default();
        let winit_state = egui_winit::State::new(
            ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            None,
            None,
            None,
        );

        Ok(Self {
            ctx,
            winit_state,
            painter,
            pending: None,
            pixels_per_point: window.scale_factor() as f32,
        })
    }

    pub fn ctx(&self) -> &egui::Context {
        &self.ctx
    }

    pub fn on_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) -> EventResponse {
        self.winit_state.on_window_event(window, event)
    }

    /// A text field has keyboard focus.
    pub fn wants_keyboard(&self) -> bool {
        self.ctx.wants_keyboard_input()
    }

    /// Pointer is over an egui panel or window rather than the page.
    pub fn wants_pointer(&self) -> bool {
        self.ctx.is_pointer_over_area() || self.ctx.is_using_pointer()
    }

    /// Run one UI pass. Output is held until [`Overlay::paint`].
    pub fn run<T>(&mut self, window: &Window, build: impl FnOnce(&egui::Context) -> T) -> T {
        let raw_input = self.winit_state.take_egui_input(window);
        self.ctx.begin_pass(raw_input);
        let result = build(&self.ctx);
        self.pixels_per_point = self.ctx.pixels_per_point();
        let mut output = self.ctx.end_pass();
        let platform_output = std::mem::take(&mut output.platform_output);
        self.winit_state.handle_platform_output(window, platform_output);
        self.pending = Some(output);
        result
    }

    /// Delay egui asked for before its next repaint, if any.
    pub fn repaint_delay(&self) -> Option<std::time::Duration> {
        self.pending
            .as_ref()
            .and_then(|output| output.viewport_output.get(&egui::ViewportId::ROOT))
            .map(|viewport| viewport.repaint_delay)
    }

    /// Paint the last pass into the current framebuffer.
    pub fn paint(&mut self, window: &Window) {
        let Some(output) = self.pending.take() else {
            return;
        };
        let meshes = self.ctx.tessellate(output.shapes, self.pixels_per_point);
        let size = window.inner_size();
        self.painter.paint_and_update_textures(
            [size.width, size.height],
            self.pixels_per_point,
            &meshes,
            &output.textures_delta,
        );
    }
}

impl Drop for Overlay {
    fn drop(&mut self) {
        self.painter.destroy();
    }
}
