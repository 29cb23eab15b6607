//! Document capability used by the editor: page structure, resource
//! embedding, drawing and serialization, plus a preview rasterizer.

mod document;
pub mod fonts;
mod raster;

pub use document::{CopiedPage, LopdfDocument};
pub use fonts::{encode_win_ansi, FontVariant};
pub use raster::{PageRasterizer, PreviewRasterizer, RenderError, RgbaImage, ThumbnailSize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    pub const LETTER: PageSize = PageSize {
        width_pt: 612.0,
        height_pt: 792.0,
    };

    pub fn new(width_pt: f32, height_pt: f32) -> Self {
        Self {
            width_pt,
            height_pt,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.width_pt.is_finite()
            && self.height_pt.is_finite()
            && self.width_pt > 0.0
            && self.height_pt > 0.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::LETTER
    }
}

/// Rectangle in PDF user space, origin at the bottom-left of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PdfRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl PdfColor {
    pub const BLACK: PdfColor = PdfColor {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };
    pub const WHITE: PdfColor = PdfColor {
        r: 1.0,
        g: 1.0,
        b: 1.0,
    };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

impl From<(f32, f32, f32)> for PdfColor {
    fn from((r, g, b): (f32, f32, f32)) -> Self {
        Self { r, g, b }
    }
}

/// Fill and/or stroke for [`PageDocument::draw_rect`]. Neither set draws
/// nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectStyle {
    pub fill: Option<PdfColor>,
    pub stroke: Option<PdfColor>,
    pub line_width: f32,
}

impl RectStyle {
    pub fn filled(color: PdfColor) -> Self {
        Self {
            fill: Some(color),
            stroke: None,
            line_width: 0.0,
        }
    }

    pub fn stroked(color: PdfColor, line_width: f32) -> Self {
        Self {
            fill: None,
            stroke: Some(color),
            line_width,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    /// `image/png` or `image/jpeg` (also `image/jpg`).
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

/// Handle to a font embedded in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontRef {
    name: String,
    variant: FontVariant,
}

impl FontRef {
    pub fn new(name: impl Into<String>, variant: FontVariant) -> Self {
        Self {
            name: name.into(),
            variant,
        }
    }

    /// Resource name the font is referenced by in page content.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> FontVariant {
        self.variant
    }

    pub fn width_of_text_at_size(&self, text: &str, size: f32) -> f32 {
        self.variant.text_width(text, size)
    }
}

/// Handle to an image embedded in a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    name: String,
    width_px: u32,
    height_px: u32,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, width_px: u32, height_px: u32) -> Self {
        Self {
            name: name.into(),
            width_px,
            height_px,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width_px(&self) -> u32 {
        self.width_px
    }

    pub fn height_px(&self) -> u32 {
        self.height_px
    }
}

/// What to put at a new page slot.
#[derive(Debug, Clone)]
pub enum PageSource<C> {
    Blank(PageSize),
    Copied(C),
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),
    #[error("image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("backend error: {0}")]
    Backend(String),
}

/// A loaded, mutable paged document.
///
/// Page indices are 0-based. Drawing calls use PDF user space (points,
/// bottom-left origin) and take effect when the document is saved.
pub trait PageDocument {
    /// A page detached from its source document, ready for insertion.
    type CopiedPage: Clone;

    fn page_count(&self) -> u32;

    fn page_size(&self, index: u32) -> Result<PageSize, PdfEngineError>;

    /// Inserts a page so that it ends up at `index` (`0..=page_count`).
    fn insert_page(
        &mut self,
        index: u32,
        source: PageSource<Self::CopiedPage>,
    ) -> Result<(), PdfEngineError>;

    fn remove_page(&mut self, index: u32) -> Result<(), PdfEngineError>;

    /// Moves the page at `from` so that it ends up at `to`, keeping the
    /// page itself (and anything that refers to it) intact.
    fn move_page(&mut self, from: u32, to: u32) -> Result<(), PdfEngineError>;

    /// Detaches copies of `indices` from `source`, in the given order.
    fn copy_pages(
        &self,
        source: &Self,
        indices: &[u32],
    ) -> Result<Vec<Self::CopiedPage>, PdfEngineError>
    where
        Self: Sized;

    fn copied_page_size(page: &Self::CopiedPage) -> PageSize;

    /// Embeds one of the standard fonts. Embedding the same variant twice
    /// returns the same handle.
    fn embed_font(&mut self, variant: FontVariant) -> Result<FontRef, PdfEngineError>;

    fn embed_image(&mut self, bytes: &[u8], format: ImageFormat)
        -> Result<ImageRef, PdfEngineError>;

    /// Draws one line of text with its baseline starting at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &mut self,
        index: u32,
        text: &str,
        x: f32,
        y: f32,
        font: &FontRef,
        size: f32,
        color: PdfColor,
    ) -> Result<(), PdfEngineError>;

    /// Draws `image` stretched over `rect`.
    fn draw_image(&mut self, index: u32, image: &ImageRef, rect: PdfRect)
        -> Result<(), PdfEngineError>;

    fn draw_rect(&mut self, index: u32, rect: PdfRect, style: RectStyle)
        -> Result<(), PdfEngineError>;

    fn draw_line(
        &mut self,
        index: u32,
        from: (f32, f32),
        to: (f32, f32),
        thickness: f32,
        color: PdfColor,
    ) -> Result<(), PdfEngineError>;

    /// Serializes the document, including everything drawn so far.
    fn save(&mut self) -> Result<Vec<u8>, PdfEngineError>;
}
