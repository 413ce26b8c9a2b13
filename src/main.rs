use std::ffi::{c_void, CString};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use gl::types::*;
use glutin::{
    config::{ConfigTemplateBuilder, GlConfig},
    context::{ContextApi, ContextAttributesBuilder, PossiblyCurrentContext},
    display::{Display, GetGlDisplay, GlDisplay},
    prelude::{GlSurface, NotCurrentGlContext},
    surface::{Surface as GlutinSurface, SurfaceAttributesBuilder, WindowSurface},
};
use glutin_winit::DisplayBuilder;
use raw_window_handle::HasWindowHandle;
use skia_safe::{
    gpu::{self, backend_render_targets, gl::FramebufferInfo, SurfaceOrigin},
    AlphaType, Color, ColorType, Data, ImageInfo, Paint, PaintStyle, Rect, Surface,
};
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, ModifiersState, NamedKey},
    window::{Window, WindowId},
};

use pagechat::capture::Point;
use pagechat::chat::{BackendError, ChatTranscript, HttpBackend, Question};
use pagechat::config::Config;
use pagechat::document::{MupdfStore, RenderedSurface};
use pagechat::gui::Overlay;
use pagechat::layout::{LayoutMetrics, LayoutTrigger};
use pagechat::navigation::NavKey;
use pagechat::notes::{JsonNoteFile, NoteStore};
use pagechat::ui::{self, UiAction, UiState, PAGE_MARGIN};
use pagechat::viewer::{PageView, Viewer, ViewerEvent};
use pagechat::worker::{ChatReply, ChatRequest, ChatWorker};

/// How often to check for backend replies while a request is in flight.
const WORKER_POLL: Duration = Duration::from_millis(50);

/// Read a PDF page by page, capture regions of it and ask questions about them.
#[derive(Parser, Debug)]
#[command(name = "pagechat", version, about)]
struct Args {
    /// Local PDF to open.
    path: Option<PathBuf>,

    /// Download and open the document published under this id.
    #[arg(long, conflicts_with = "path")]
    public_id: Option<String>,

    /// Backend base URL. Overrides BACKEND_URL and the config file.
    #[arg(long)]
    backend_url: Option<String>,

    /// Page to show first.
    #[arg(long, default_value_t = 1)]
    page: u32,
}

/// Ensures DirectContext drops before Window (prevents AMD GPU segfaults).
struct Env {
    surface: Surface,
    gl_surface: GlutinSurface<WindowSurface>,
    gr_context: gpu::DirectContext,
    gl_context: PossiblyCurrentContext,
    window: Window,
    fb_info: FramebufferInfo,
    num_samples: usize,
    stencil_size: usize,
}

impl Drop for Env {
    fn drop(&mut self) {
        self.gr_context.release_resources_and_abandon();
    }
}

/// Skia copy of the current page surface.
struct PageImage {
    page: u32,
    width: u32,
    height: u32,
    image: skia_safe::Image,
}

struct App {
    // Declared before `env` so the glow painter goes while the context lives.
    overlay: Overlay,
    env: Env,
    config: Config,
    worker: Option<ChatWorker>,
    viewer: Option<Viewer<MupdfStore>>,
    transcript: ChatTranscript,
    ui_state: UiState,
    page_image: Option<PageImage>,
    /// Pointer position in logical pixels.
    cursor: Option<(f32, f32)>,
    modifiers: ModifiersState,
    last_viewport: (f32, f32),
    last_panel_open: bool,
    repaint_at: Option<Instant>,
}

fn gl_proc(display: &Display, name: &str) -> *const c_void {
    match CString::new(name) {
        Ok(name) => display.get_proc_address(name.as_c_str()),
        Err(_) => std::ptr::null(),
    }
}

fn create_surface(
    window: &Window,
    fb_info: FramebufferInfo,
    gr_context: &mut gpu::DirectContext,
    num_samples: usize,
    stencil_size: usize,
) -> Result<Surface> {
    let size = window.inner_size();
    let size = (
        i32::try_from(size.width).context("window width out of range")?,
        i32::try_from(size.height).context("window height out of range")?,
    );
    let backend_render_target =
        backend_render_targets::make_gl(size, num_samples, stencil_size, fb_info);

    gpu::surfaces::wrap_backend_render_target(
        gr_context,
        &backend_render_target,
        SurfaceOrigin::BottomLeft,
        ColorType::RGBA8888,
        None,
        None,
    )
    .context("could not create skia surface")
}

fn create_env(el: &EventLoop<()>) -> Result<Env> {
    let window_attributes = Window::default_attributes()
        .with_inner_size(LogicalSize::new(1400.0, 900.0))
        .with_resizable(true)
        .with_title("pagechat");

    let template = ConfigTemplateBuilder::new()
        .with_alpha_size(8)
        .with_transparency(true);

    let display_builder = DisplayBuilder::new().with_window_attributes(Some(window_attributes));
    let (window, gl_config) = display_builder
        .build(el, template, |configs| {
            configs
                .reduce(|accum, config| {
                    let transparency_check = config.supports_transparency().unwrap_or(false)
                        & !accum.supports_transparency().unwrap_or(false);
                    if transparency_check || config.num_samples() < accum.num_samples() {
                        config
                    } else {
                        accum
                    }
                })
                .expect("display offered no GL configs")
        })
        .map_err(|e| anyhow!("could not build GL display: {}", e))?;
    let window = window.context("could not create window with OpenGL context")?;
    let window_handle = window
        .window_handle()
        .context("failed to retrieve window handle")?;
    let raw_window_handle = window_handle.as_raw();

    let context_attributes = ContextAttributesBuilder::new().build(Some(raw_window_handle));
    let fallback_context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::Gles(None))
        .build(Some(raw_window_handle));

    let display = gl_config.display();
    let not_current_gl_context = unsafe {
        match display.create_context(&gl_config, &context_attributes) {
            Ok(context) => context,
            Err(_) => display
                .create_context(&gl_config, &fallback_context_attributes)
                .context("failed to create GL context")?,
        }
    };

    let (width, height): (u32, u32) = window.inner_size().into();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        raw_window_handle,
        NonZeroU32::new(width).context("window has zero width")?,
        NonZeroU32::new(height).context("window has zero height")?,
    );

    let gl_surface = unsafe {
        display
            .create_window_surface(&gl_config, &attrs)
            .context("could not create GL window surface")?
    };

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .context("could not make GL context current")?;

    gl::load_with(|s| gl_proc(&display, s));
    let interface = skia_safe::gpu::gl::Interface::new_load_with(|name| {
        if name == "eglGetCurrentDisplay" {
            return std::ptr::null();
        }
        gl_proc(&display, name)
    })
    .context("could not create skia GL interface")?;

    let mut gr_context = skia_safe::gpu::direct_contexts::make_gl(interface, None)
        .context("could not create skia direct context")?;

    let fb_info = {
        let mut fboid: GLint = 0;
        unsafe { gl::GetIntegerv(gl::FRAMEBUFFER_BINDING, &mut fboid) };
        FramebufferInfo {
            fboid: u32::try_from(fboid).context("invalid framebuffer id")?,
            format: skia_safe::gpu::gl::Format::RGBA8.into(),
            ..Default::default()
        }
    };

    let num_samples = gl_config.num_samples() as usize;
    let stencil_size = gl_config.stencil_size() as usize;
    let surface = create_surface(&window, fb_info, &mut gr_context, num_samples, stencil_size)?;

    Ok(Env {
        surface,
        gl_surface,
        gr_context,
        gl_context,
        window,
        fb_info,
        num_samples,
        stencil_size,
    })
}

/// Convert the page surface to a skia image, reusing the last one when it
/// still matches.
fn page_image<'a>(cache: &'a mut Option<PageImage>, surface: &RenderedSurface) -> Option<&'a skia_safe::Image> {
    let stale = !matches!(cache, Some(c) if c.page == surface.page && c.width == surface.width && c.height == surface.height);
    if stale {
        let info = ImageInfo::new(
            (surface.width as i32, surface.height as i32),
            ColorType::RGBA8888,
            AlphaType::Unpremul,
            None,
        );
        let rgba = surface.to_rgba();
        *cache = skia_safe::images::raster_from_data(&info, Data::new_copy(&rgba), surface.width as usize * 4)
            .map(|image| PageImage {
                page: surface.page,
                width: surface.width,
                height: surface.height,
                image,
            });
        if cache.is_none() {
            log::warn!("Could not upload page {} to skia", surface.page);
        }
    }
    cache.as_ref().map(|c| &c.image)
}

fn nav_key(key: &Key) -> Option<NavKey> {
    match key {
        Key::Named(NamedKey::ArrowRight | NamedKey::ArrowDown | NamedKey::PageDown) => Some(NavKey::Forward),
        Key::Named(NamedKey::ArrowLeft | NamedKey::ArrowUp | NamedKey::PageUp) => Some(NavKey::Backward),
        Key::Named(NamedKey::Home) => Some(NavKey::First),
        Key::Named(NamedKey::End) => Some(NavKey::Last),
        _ => None,
    }
}

/// winit reports wheel-up as positive; pages advance on positive deltas.
/// A drag that started on the page gets its release even when egui claims
/// the pointer, otherwise the selection never finishes.
fn ends_selection(state: ElementState, button: MouseButton, selecting: bool) -> bool {
    selecting && state == ElementState::Released && button == MouseButton::Left
}

fn wheel_delta(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y,
        MouseScrollDelta::PixelDelta(pos) => -(pos.y as f32),
    }
}

fn apply_to_viewer(viewer: &mut Viewer<MupdfStore>, action: UiAction, now: Instant) {
    match action {
        UiAction::Navigate(key) => {
            viewer.set_text_focus(false);
            viewer.handle(ViewerEvent::Key(key), now);
        }
        UiAction::GoToPage(page) => viewer.handle(ViewerEvent::JumpTo(page), now),
        UiAction::ToggleCapture => viewer.handle(ViewerEvent::ToggleCapture, now),
        UiAction::TogglePanel => viewer.handle(ViewerEvent::TogglePanel, now),
        UiAction::DismissCapture => viewer.session().clear_captured_image(),
        UiAction::RetryPage => viewer.retry(),
        UiAction::OpenFile | UiAction::Ask(_) => {}
    }
}

fn fetch_remote(config: &Config, public_id: &str) -> Result<MupdfStore> {
    let backend = HttpBackend::new(config.backend_url.clone())?;
    let bytes = backend
        .fetch_document(public_id)
        .with_context(|| format!("could not download document {}", public_id))?;
    log::info!("Downloaded {} ({} bytes)", public_id, bytes.len());
    Ok(MupdfStore::from_bytes(public_id, &bytes)?)
}

fn start_worker(config: &Config) -> Option<ChatWorker> {
    let backend = match HttpBackend::new(config.backend_url.clone()) {
        Ok(backend) => backend,
        Err(e) => {
            log::warn!("Assistant disabled: {}", e);
            return None;
        }
    };
    match ChatWorker::new(Box::new(backend)) {
        Ok(worker) => Some(worker),
        Err(e) => {
            log::warn!("Failed to spawn chat worker: {}", e);
            None
        }
    }
}

impl App {
    fn scale_factor(&self) -> f32 {
        self.env.window.scale_factor() as f32
    }

    fn open_document(&mut self, store: MupdfStore, start_page: u32) {
        let id = store.id().to_string();
        let notes = NoteStore::with_persistence(id.clone(), Box::new(JsonNoteFile::default_location()));
        let mut viewer = Viewer::open(store, id.clone(), &self.config, notes);
        viewer.set_render_scale(self.scale_factor());
        if start_page > 1 {
            viewer.handle(ViewerEvent::JumpTo(start_page), Instant::now());
        }

        let title = viewer.metadata().title.clone().unwrap_or_else(|| id.clone());
        self.env.window.set_title(&format!("{} - pagechat", title));

        self.ui_state.reset_document();
        self.page_image = None;
        self.transcript = ChatTranscript::default();
        if let Some(worker) = &mut self.worker {
            worker.submit(ChatRequest::History(id));
        }
        self.viewer = Some(viewer);
        self.env.window.request_redraw();
    }

    fn open_path(&mut self, path: PathBuf) {
        log::info!("Opening {}", path.display());
        match MupdfStore::open(&path) {
            Ok(store) => self.open_document(store, 1),
            Err(e) => {
                let message = format!("Could not open {}: {}", path.display(), e);
                log::error!("{}", message);
                match &mut self.viewer {
                    Some(viewer) => viewer.show_notice(message, Instant::now()),
                    None => self.ui_state.open_error = Some(message),
                }
            }
        }
    }

    fn open_file_dialog(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter("PDF", &["pdf"])
            .pick_file();
        if let Some(path) = picked {
            self.open_path(path);
        }
    }

    fn ask(&mut self, text: String) {
        let Some(viewer) = &self.viewer else {
            return;
        };
        let session = viewer.session();
        let question = Question {
            document_id: session.document_id(),
            page: session.current_page(),
            text,
            image: session.take_captured_image(),
        };
        self.transcript.push_question(&question);
        let submitted = match &mut self.worker {
            Some(worker) => worker.submit(ChatRequest::Ask(question)),
            None => false,
        };
        if !submitted {
            self.transcript
                .push_reply(Err(BackendError::Network("assistant is not available".into())));
        }
    }

    fn apply(&mut self, action: UiAction, now: Instant) {
        match action {
            UiAction::OpenFile => self.open_file_dialog(),
            UiAction::Ask(text) => self.ask(text),
            action => {
                if let Some(viewer) = &mut self.viewer {
                    apply_to_viewer(viewer, action, now);
                }
            }
        }
    }

    /// Feed the geometry the overlay left for the page into the layout engine.
    fn sync_layout(&mut self, now: Instant) {
        let scale = self.scale_factor();
        let size = self.env.window.inner_size();
        let viewport = (size.width as f32 / scale, size.height as f32 / scale);
        let Some(viewer) = &mut self.viewer else {
            return;
        };

        let panel_open = viewer.session().panel_open();
        let metrics = LayoutMetrics {
            container_width: (self.ui_state.content_rect.width() - 2.0 * PAGE_MARGIN).max(0.0),
            viewport_width: viewport.0,
            viewport_height: viewport.1,
            side_panel_open: panel_open,
        };
        let trigger = if panel_open != self.last_panel_open {
            LayoutTrigger::TransitionEnded
        } else if viewport != self.last_viewport {
            LayoutTrigger::ViewportResized
        } else {
            LayoutTrigger::ContainerResized
        };
        self.last_panel_open = panel_open;
        self.last_viewport = viewport;

        viewer.handle(ViewerEvent::Layout(trigger, metrics), now);
        if viewer.displayed_size().is_none() {
            viewer.relayout_now();
            self.env.window.request_redraw();
        }
    }

    /// Pointer position relative to the top-left of the displayed page.
    fn page_local_cursor(&self) -> Option<Point> {
        let viewer = self.viewer.as_ref()?;
        let (x, y) = self.cursor?;
        let rect = ui::page_rect(self.ui_state.content_rect, viewer.displayed_size()?);
        Some(Point::new(x - rect.min.x, y - rect.min.y))
    }

    fn cursor_over_page(&self) -> bool {
        let (Some(viewer), Some((x, y))) = (&self.viewer, self.cursor) else {
            return false;
        };
        viewer
            .displayed_size()
            .map(|d| ui::page_rect(self.ui_state.content_rect, d))
            .is_some_and(|rect| rect.contains(egui::pos2(x, y)))
    }

    fn poll_worker(&mut self) -> bool {
        let Some(worker) = &mut self.worker else {
            return false;
        };
        let current = self.viewer.as_ref().map(|v| v.document_id().to_string());
        let mut changed = false;
        while let Some(reply) = worker.poll() {
            match reply {
                ChatReply::Answer {
                    document_id,
                    answer,
                } if Some(&document_id) == current.as_ref() => {
                    self.transcript.push_reply(answer);
                    changed = true;
                }
                ChatReply::History {
                    document_id,
                    entries: Ok(entries),
                } if Some(&document_id) == current.as_ref() => {
                    log::info!("Restored {} exchange(s) for {}", entries.len(), document_id);
                    self.transcript.load_history(entries);
                    changed = true;
                }
                ChatReply::History { entries: Err(_), .. } => {}
                ChatReply::Answer { document_id, .. } | ChatReply::History { document_id, .. } => {
                    log::debug!("Dropping reply for closed document {}", document_id);
                }
            }
        }
        changed
    }

    fn redraw(&mut self) {
        let size = self.env.window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }
        let now = Instant::now();

        if let Some(viewer) = &mut self.viewer {
            viewer.set_text_focus(self.overlay.wants_keyboard());
        }
        let actions = {
            let viewer = self.viewer.as_mut();
            let ui_state = &mut self.ui_state;
            let transcript = &self.transcript;
            let thumbnail_width = self.config.thumbnail_width;
            self.overlay.run(&self.env.window, |ctx| {
                ui::build_ui(ctx, ui_state, viewer, transcript, thumbnail_width, now)
            })
        };
        for action in actions {
            self.apply(action, now);
        }
        self.sync_layout(now);

        let scale = self.scale_factor();
        let canvas = self.env.surface.canvas();
        canvas.clear(Color::from_argb(255, 72, 72, 72));

        if let Some(viewer) = &self.viewer {
            if let Some(displayed) = viewer.displayed_size() {
                let rect = ui::page_rect(self.ui_state.content_rect, displayed);
                let dst = Rect::from_xywh(rect.min.x, rect.min.y, rect.width(), rect.height());
                canvas.save();
                canvas.scale((scale, scale));

                let mut white_paint = Paint::default();
                white_paint.set_color(Color::WHITE);
                canvas.draw_rect(dst, &white_paint);

                if let PageView::Ready(surface) = viewer.page() {
                    if let Some(image) = page_image(&mut self.page_image, surface) {
                        let mut paint = Paint::default();
                        paint.set_anti_alias(true);
                        canvas.draw_image_rect(image, None, dst, &paint);
                    }
                }

                if let Some(selection) = viewer.capture().selection() {
                    let sel = Rect::from_xywh(
                        rect.min.x + selection.left(),
                        rect.min.y + selection.top(),
                        selection.width(),
                        selection.height(),
                    );
                    let mut fill = Paint::default();
                    fill.set_color(Color::from_argb(50, 66, 133, 244));
                    canvas.draw_rect(sel, &fill);
                    let mut stroke = Paint::default();
                    stroke.set_style(PaintStyle::Stroke);
                    stroke.set_stroke_width(1.5);
                    stroke.set_anti_alias(true);
                    stroke.set_color(Color::from_argb(230, 66, 133, 244));
                    canvas.draw_rect(sel, &stroke);
                }
                canvas.restore();
            }
        }

        self.env.gr_context.flush_and_submit();
        self.overlay.paint(&self.env.window);
        if let Err(e) = self.env.gl_surface.swap_buffers(&self.env.gl_context) {
            log::error!("Failed to swap buffers: {}", e);
        }
        // egui leaves GL state skia does not track.
        self.env.gr_context.reset(None);

        self.repaint_at = match self.overlay.repaint_delay() {
            Some(delay) if delay.is_zero() => {
                self.env.window.request_redraw();
                None
            }
            Some(delay) if delay < Duration::from_secs(60) => Some(now + delay),
            _ => None,
        };
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, key: &Key) {
        let now = Instant::now();
        if self.modifiers.control_key() {
            match key {
                Key::Character(c) if c.as_str() == "o" => self.open_file_dialog(),
                Key::Character(c) if c.as_str() == "q" => event_loop.exit(),
                _ => {}
            }
            return;
        }
        match key {
            Key::Named(NamedKey::F1) => self.ui_state.show_shortcuts = !self.ui_state.show_shortcuts,
            Key::Named(NamedKey::Escape) => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.handle(ViewerEvent::CancelCapture, now);
                }
            }
            key => {
                if let (Some(viewer), Some(nav)) = (&mut self.viewer, nav_key(key)) {
                    viewer.set_text_focus(self.overlay.wants_keyboard());
                    viewer.handle(ViewerEvent::Key(nav), now);
                }
            }
        }
        self.env.window.request_redraw();
    }

    fn handle_pointer(&mut self, event: &WindowEvent) {
        let now = Instant::now();
        let local = self.page_local_cursor();
        let over_ui = self.overlay.wants_pointer();
        let on_page = self.cursor_over_page();
        let Some(viewer) = &mut self.viewer else {
            return;
        };
        let selecting = viewer.capture().selection().is_some();

        match event {
            WindowEvent::CursorMoved { .. } if selecting => {
                if let Some(at) = local {
                    viewer.handle(ViewerEvent::PointerMove(at), now);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } if !over_ui && on_page => {
                if let Some(at) = local {
                    viewer.handle(ViewerEvent::PointerDown(at), now);
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Released,
                button: MouseButton::Left,
                ..
            } if selecting => match local {
                Some(at) => viewer.handle(ViewerEvent::PointerUp(at), now),
                None => viewer.handle(ViewerEvent::CancelCapture, now),
            },
            WindowEvent::MouseWheel { delta, .. } if !over_ui => {
                viewer.set_text_focus(self.overlay.wants_keyboard());
                viewer.handle(ViewerEvent::Wheel(wheel_delta(*delta)), now);
            }
            _ => return,
        }
        self.env.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, _event_loop: &ActiveEventLoop) {}

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let response = self.overlay.on_window_event(&self.env.window, &event);
        if response.repaint {
            self.env.window.request_redraw();
        }

        match &event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(physical_size) => {
                match create_surface(
                    &self.env.window,
                    self.env.fb_info,
                    &mut self.env.gr_context,
                    self.env.num_samples,
                    self.env.stencil_size,
                ) {
                    Ok(surface) => self.env.surface = surface,
                    Err(e) => log::error!("{:#}", e),
                }
                if let (Some(w), Some(h)) = (
                    NonZeroU32::new(physical_size.width),
                    NonZeroU32::new(physical_size.height),
                ) {
                    self.env.gl_surface.resize(&self.env.gl_context, w, h);
                }
                self.env.window.request_redraw();
            }

            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.set_render_scale(*scale_factor as f32);
                }
            }

            WindowEvent::ModifiersChanged(modifiers) => self.modifiers = modifiers.state(),

            WindowEvent::CursorMoved { position, .. } => {
                let logical = position.to_logical::<f32>(self.env.window.scale_factor());
                self.cursor = Some((logical.x, logical.y));
                self.handle_pointer(&event);
            }

            WindowEvent::CursorLeft { .. } => self.cursor = None,

            WindowEvent::MouseInput { state, button, .. } => {
                let selecting = self
                    .viewer
                    .as_ref()
                    .is_some_and(|v| v.capture().selection().is_some());
                if !response.consumed || ends_selection(*state, *button, selecting) {
                    self.handle_pointer(&event);
                }
            }

            WindowEvent::MouseWheel { .. } => {
                if !response.consumed {
                    self.handle_pointer(&event);
                }
            }

            WindowEvent::KeyboardInput { event: key_event, .. } => {
                if key_event.state == ElementState::Pressed && !response.consumed {
                    self.handle_key(event_loop, &key_event.logical_key);
                }
            }

            WindowEvent::RedrawRequested => self.redraw(),

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let mut redraw = self.poll_worker();
        if let Some(viewer) = &mut self.viewer {
            redraw |= viewer.tick(now);
        }
        if self.repaint_at.is_some_and(|at| at <= now) {
            self.repaint_at = None;
            redraw = true;
        }
        if redraw {
            self.env.window.request_redraw();
        }

        let busy = self.worker.as_ref().is_some_and(|w| !w.is_idle());
        let wake = [
            self.viewer.as_ref().and_then(|v| v.next_deadline()),
            self.repaint_at,
            busy.then(|| now + WORKER_POLL),
        ]
        .into_iter()
        .flatten()
        .min();
        event_loop.set_control_flow(match wake {
            Some(at) => ControlFlow::WaitUntil(at),
            None => ControlFlow::Wait,
        });
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = Config::load();
    if let Some(url) = args.backend_url {
        config.backend_url = url;
    }
    log::info!("Using backend {}", config.backend_url);

    let initial = match (&args.path, &args.public_id) {
        (Some(path), _) => Some(MupdfStore::open(path).with_context(|| format!("could not open {}", path.display()))),
        (None, Some(id)) => Some(fetch_remote(&config, id)),
        (None, None) => None,
    };

    let el = EventLoop::new()?;
    let env = create_env(&el)?;
    let overlay = Overlay::new(&env.window, &env.gl_context)?;
    let worker = start_worker(&config);

    let mut app = App {
        overlay,
        env,
        config,
        worker,
        viewer: None,
        transcript: ChatTranscript::default(),
        ui_state: UiState::default(),
        page_image: None,
        cursor: None,
        modifiers: ModifiersState::empty(),
        last_viewport: (0.0, 0.0),
        last_panel_open: true,
        repaint_at: None,
    };

    match initial {
        Some(Ok(store)) => app.open_document(store, args.page),
        Some(Err(e)) => {
            log::error!("{:#}", e);
            app.ui_state.open_error = Some(format!("{:#}", e));
        }
        None => {}
    }

    el.run_app(&mut app).context("event loop failed")?;

    Ok(())
}
