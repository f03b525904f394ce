// src/pdf/mod.rs
pub mod search;

use std::path::Path;

use mupdf::{Colorspace, Document, ImageFormat, Matrix, TextPageFlags};

use crate::utils::error::PdfError;

// Rasterization zoom factor. TOC pages are rendered at 2x so the oracle
// can read small page-number columns reliably.
const RASTER_ZOOM: f32 = 2.0;

/// Page-level access to an open document.
///
/// Implementors provide the low-level page operations; everything above
/// this trait (TOC location, span resolution, content slicing) is written
/// against it so tests can substitute an in-memory document.
pub trait DocumentPages {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Literal text search within one page's text layer.
    fn page_has_text(&self, page: usize, needle: &str) -> Result<bool, PdfError>;

    /// Plain text of one page, in reading order.
    fn page_text(&self, page: usize) -> Result<String, PdfError>;

    /// Fixed-format raster (PNG, RGB, no alpha) of one page.
    fn render_page_png(&self, page: usize) -> Result<Vec<u8>, PdfError>;
}

/// MuPDF-backed implementation of [`DocumentPages`].
///
/// The document handle is exclusively owned by one parsing session and is
/// not shared across sessions.
pub struct MupdfDocument {
    document: Document,
    page_count: usize,
}

impl MupdfDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PdfError> {
        let path = path.as_ref();
        let path_str = path
            .to_str()
            .ok_or_else(|| PdfError::Open("invalid path encoding".into()))?;

        let document =
            Document::open(path_str).map_err(|e| PdfError::Open(e.to_string()))?;
        let page_count = document
            .page_count()
            .map_err(|e| PdfError::Open(e.to_string()))? as usize;

        tracing::debug!("Opened {} ({} pages)", path.display(), page_count);
        Ok(Self {
            document,
            page_count,
        })
    }

    fn load_page(&self, page: usize) -> Result<mupdf::Page, PdfError> {
        if page >= self.page_count {
            return Err(PdfError::Page(page, "page index out of range".into()));
        }
        self.document
            .load_page(page as i32)
            .map_err(|e| PdfError::Page(page, e.to_string()))
    }
}

impl DocumentPages for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_has_text(&self, page: usize, needle: &str) -> Result<bool, PdfError> {
        let loaded = self.load_page(page)?;
        let hits = loaded
            .search(needle, 16)
            .map_err(|e| PdfError::Text(page, e.to_string()))?;
        Ok(!hits.is_empty())
    }

    fn page_text(&self, page: usize) -> Result<String, PdfError> {
        let loaded = self.load_page(page)?;
        let text_page = loaded
            .to_text_page(TextPageFlags::empty())
            .map_err(|e| PdfError::Text(page, e.to_string()))?;

        // Block/line iteration matches PyMuPDF's get_text() reading order.
        let mut page_text = String::new();
        for block in text_page.blocks() {
            for line in block.lines() {
                let line_text: String = line
                    .chars()
                    .map(|c| c.char().unwrap_or('\u{FFFD}'))
                    .collect();
                page_text.push_str(&line_text);
                page_text.push('\n');
            }
        }
        Ok(page_text)
    }

    fn render_page_png(&self, page: usize) -> Result<Vec<u8>, PdfError> {
        let loaded = self.load_page(page)?;
        let matrix = Matrix::new_scale(RASTER_ZOOM, RASTER_ZOOM);
        let pixmap = loaded
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 0.0, false)
            .map_err(|e| PdfError::Render(page, e.to_string()))?;

        // MuPDF only writes encoded images to paths, so round-trip through
        // a scratch file that is removed when the handle drops.
        let scratch = tempfile::tempdir()?;
        let png_path = scratch.path().join(format!("page_{}.png", page));
        let png_str = png_path
            .to_str()
            .ok_or_else(|| PdfError::Render(page, "invalid scratch path".into()))?;
        pixmap
            .save_as(png_str, ImageFormat::PNG)
            .map_err(|e| PdfError::Render(page, e.to_string()))?;

        Ok(std::fs::read(&png_path)?)
    }
}
