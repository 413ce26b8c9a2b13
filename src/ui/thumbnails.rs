use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::document::DocumentStore;
use crate::ui::UiAction;
use crate::viewer::Viewer;

const LABEL_HEIGHT: f32 = 16.0;
/// Thumbnails are rendered lazily, a few per frame.
const RENDERS_PER_FRAME: usize = 2;

#[derive(Default)]
pub struct ThumbnailCache {
    textures: HashMap<u32, egui::TextureHandle>,
    failed: HashSet<u32>,
}

impl ThumbnailCache {
    pub fn clear(&mut self) {
        self.textures.clear();
        self.failed.clear();
    }

    fn ensure<S: DocumentStore>(&mut self, ctx: &egui::Context, viewer: &Viewer<S>, page: u32, width: u32) {
        if self.textures.contains_key(&page) || self.failed.contains(&page) {
            return;
        }
        match viewer.render_thumbnail(page, width) {
            Ok(surface) => {
                let image = egui::ColorImage::from_rgba_unmultiplied(
                    [surface.width as usize, surface.height as usize],
                    &surface.to_rgba(),
                );
                let texture = ctx.load_texture(format!("thumb-{}", page), image, egui::TextureOptions::LINEAR);
                self.textures.insert(page, texture);
            }
            Err(e) => {
                log::warn!("Thumbnail for page {} failed: {}", page, e);
                self.failed.insert(page);
            }
        }
    }

    fn is_missing(&self, page: u32) -> bool {
        !self.textures.contains_key(&page) && !self.failed.contains(&page)
    }
}

pub fn show_thumbnails<S: DocumentStore>(
    ctx: &egui::Context,
    cache: &mut ThumbnailCache,
    viewer: &mut Viewer<S>,
    width: u32,
    now: Instant,
) -> Vec<UiAction> {
    let mut actions = Vec::new();
    let Some(count) = viewer.page_count() else {
        return actions;
    };

    let thumb_width = width as f32;
    let thumb_height = thumb_width / viewer.aspect_ratio();
    let row_height = thumb_height + LABEL_HEIGHT;
    let animated = viewer.thumbnail_offset(now);

    egui::SidePanel::left("thumbnails")
        .resizable(false)
        .exact_width(thumb_width + 24.0)
        .show(ctx, |ui| {
            let stride = row_height + ui.spacing().item_spacing.y;
            let mut area = egui::ScrollArea::vertical()
                .id_salt("thumbnail_scroll")
                .auto_shrink(false);
            if let Some(offset) = animated {
                area = area.vertical_scroll_offset(offset);
                ctx.request_repaint();
            }

            let reader: &Viewer<S> = viewer;
            let current = reader.current_page();
            let mut budget = RENDERS_PER_FRAME;
            let output = area.show_rows(ui, row_height, count as usize, |ui, rows| {
                for row in rows {
                    let page = row as u32 + 1;
                    if budget > 0 && cache.is_missing(page) {
                        budget -= 1;
                        cache.ensure(ctx, reader, page, width);
                    } else if cache.is_missing(page) {
                        ctx.request_repaint();
                    }

                    let (rect, response) = ui.allocate_exact_size(
                        egui::vec2(thumb_width, row_height),
                        egui::Sense::click(),
                    );
                    let image_rect =
                        egui::Rect::from_min_size(rect.min, egui::vec2(thumb_width, thumb_height));
                    let painter = ui.painter();

                    match cache.textures.get(&page) {
                        Some(texture) => painter.image(
                            texture.id(),
                            image_rect,
                            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                            egui::Color32::WHITE,
                        ),
                        None => painter.rect_filled(image_rect, 2.0, egui::Color32::from_gray(60)),
                    };
                    if page == current {
                        painter.rect_stroke(
                            image_rect,
                            2.0,
                            egui::Stroke::new(2.0, egui::Color32::from_rgb(66, 133, 244)),
                            egui::StrokeKind::Outside,
                        );
                    }
                    if reader.notes().has_note(page) {
                        painter.circle_filled(
                            image_rect.right_top() + egui::vec2(-8.0, 8.0),
                            4.5,
                            egui::Color32::from_rgb(245, 166, 35),
                        );
                    }
                    painter.text(
                        egui::pos2(rect.center().x, image_rect.bottom() + 2.0),
                        egui::Align2::CENTER_TOP,
                        page.to_string(),
                        egui::FontId::proportional(12.0),
                        ui.visuals().text_color(),
                    );

                    if response.on_hover_text(format!("Page {}", page)).clicked() {
                        actions.push(UiAction::GoToPage(page));
                    }
                }
            });

            viewer.set_thumbnail_geometry(stride, output.inner_rect.height());
            if animated.is_none() {
                viewer.thumbnails_scrolled(output.state.offset.y);
            }
        });

    actions
}
