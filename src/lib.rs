pub mod capture;
pub mod chat;
pub mod config;
pub mod debounce;
pub mod document;
pub mod gui;
pub mod layout;
pub mod navigation;
pub mod notes;
pub mod session;
pub mod ui;
pub mod viewer;
pub mod worker;

use anyhow::Result;
use mupdf::{Colorspace, Matrix};

/// Render a page to packed RGB samples, scaled so its width matches `target_width`.
/// `page_index` is 0-based. Returns (rgb_bytes, pixel_width, pixel_height).
pub fn render_page_pixmap(
    doc: &mupdf::Document,
    page_index: i32,
    target_width: u32,
) -> Result<(Vec<u8>, u32, u32)> {
    let page = doc.load_page(page_index)?;
    let bounds = page.bounds()?;
    let width_pts = (bounds.x1 - bounds.x0) as f64;
    anyhow::ensure!(width_pts > 0.0, "page {} has zero width", page_index + 1);

    let scale = (target_width as f64 / width_pts) as f32;
    let pixmap = page.to_pixmap(
        &Matrix::new_scale(scale, scale),
        &Colorspace::device_rgb(),
        false,
        true,
    )?;

    let pixel_width = pixmap.width();
    let pixel_height = pixmap.height();
    let samples = pixmap.samples().to_vec();
    log::debug!(
        "Rendered page {} at {}x{} (scale {:.3})",
        page_index + 1,
        pixel_width,
        pixel_height,
        scale
    );

    Ok((samples, pixel_width, pixel_height))
}
