use std::path::Path;

use mupdf::MetadataName;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unknown document id {0:?}")]
    UnknownDocument(String),
    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("invalid render width {0}")]
    InvalidWidth(u32),
    #[error("render failed: {0}")]
    Render(String),
    #[error("failed to open document: {0}")]
    Open(String),
}

impl From<mupdf::Error> for DocumentError {
    fn from(e: mupdf::Error) -> Self {
        DocumentError::Render(e.to_string())
    }
}

/// Native page size in document units (points).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// Width over height; 1.0 for degenerate pages.
    pub fn aspect_ratio(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub created: Option<String>,
}

/// A rendered page: packed RGB8 samples at native pixel resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSurface {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RenderedSurface {
    pub fn new(page: u32, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            page,
            width,
            height,
            pixels,
        }
    }

    /// Pixel data is only readable when the buffer covers the full surface.
    pub fn is_readable(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() >= self.width as usize * self.height as usize * 3
    }

    /// Expand to RGBA8 for texture upload.
    pub fn to_rgba(&self) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(self.pixels.len() / 3 * 4);
        for px in self.pixels.chunks_exact(3) {
            rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
        }
        rgba
    }
}

/// Source of page counts, page renders and metadata. Pages are 1-indexed.
pub trait DocumentStore {
    fn page_count(&self, document_id: &str) -> Result<u32, DocumentError>;

    fn page_size(&self, document_id: &str, page: u32) -> Result<PageSize, DocumentError>;

    fn render_page(
        &self,
        document_id: &str,
        page: u32,
        target_width_px: u32,
    ) -> Result<RenderedSurface, DocumentError>;

    fn metadata(&self, document_id: &str) -> Result<DocumentMetadata, DocumentError>;
}

/// A single MuPDF document served under one id.
pub struct MupdfStore {
    id: String,
    doc: mupdf::Document,
}

impl MupdfStore {
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| DocumentError::Open(format!("non UTF-8 path {}", path.display())))?;
        let doc = mupdf::Document::open(path_str).map_err(|e| DocumentError::Open(e.to_string()))?;
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.to_string());
        log::info!("Opened {} as document {:?}", path.display(), id);
        Ok(Self { id, doc })
    }

    pub fn from_bytes(id: impl Into<String>, bytes: &[u8]) -> Result<Self, DocumentError> {
        let doc = mupdf::Document::from_bytes(bytes, "application/pdf")
            .map_err(|e| DocumentError::Open(e.to_string()))?;
        Ok(Self { id: id.into(), doc })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn check_id(&self, document_id: &str) -> Result<(), DocumentError> {
        if document_id == self.id {
            Ok(())
        } else {
            Err(DocumentError::UnknownDocument(document_id.to_string()))
        }
    }

    fn page_index(&self, page: u32) -> Result<i32, DocumentError> {
        let page_count = self.doc.page_count()? as u32;
        if page == 0 || page > page_count {
            return Err(DocumentError::PageOutOfRange { page, page_count });
        }
        Ok(page as i32 - 1)
    }

    fn metadata_field(&self, name: MetadataName) -> Option<String> {
        self.doc
            .metadata(name)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }
}

impl DocumentStore for MupdfStore {
    fn page_count(&self, document_id: &str) -> Result<u32, DocumentError> {
        self.check_id(document_id)?;
        Ok(self.doc.page_count()? as u32)
    }

    fn page_size(&self, document_id: &str, page: u32) -> Result<PageSize, DocumentError> {
        self.check_id(document_id)?;
        let bounds = self.doc.load_page(self.page_index(page)?)?.bounds()?;
        Ok(PageSize {
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        })
    }

    fn render_page(
        &self,
        document_id: &str,
        page: u32,
        target_width_px: u32,
    ) -> Result<RenderedSurface, DocumentError> {
        self.check_id(document_id)?;
        if target_width_px == 0 {
            return Err(DocumentError::InvalidWidth(target_width_px));
        }
        let index = self.page_index(page)?;
        let (pixels, width, height) =
            crate::render_page_pixmap(&self.doc, index, target_width_px)
                .map_err(|e| DocumentError::Render(e.to_string()))?;
        Ok(RenderedSurface::new(page, width, height, pixels))
    }

    fn metadata(&self, document_id: &str) -> Result<DocumentMetadata, DocumentError> {
        self.check_id(document_id)?;
        Ok(DocumentMetadata {
            title: self.metadata_field(MetadataName::Title),
            created: self.metadata_field(MetadataName::CreationDate),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aspect_ratio_defaults_for_degenerate_page() {
        let size = PageSize {
            width: 0.0,
            height: 792.0,
        };
        assert_eq!(size.aspect_ratio(), 1.0);
        let letter = PageSize {
            width: 612.0,
            height: 792.0,
        };
        assert!((letter.aspect_ratio() - 0.7727).abs() < 1e-3);
    }

    #[test]
    fn test_surface_readability() {
        let surface = RenderedSurface::new(1, 2, 2, vec![0; 12]);
        assert!(surface.is_readable());
        let truncated = RenderedSurface::new(1, 2, 2, vec![0; 6]);
        assert!(!truncated.is_readable());
        let empty = RenderedSurface::new(1, 0, 0, Vec::new());
        assert!(!empty.is_readable());
    }

    #[test]
    fn test_to_rgba_adds_opaque_alpha() {
        let surface = RenderedSurface::new(1, 2, 1, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(surface.to_rgba(), vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }
}
