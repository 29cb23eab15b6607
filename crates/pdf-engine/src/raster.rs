use crate::{PageDocument, PdfEngineError};
use image::{ImageBuffer, Rgba};
use stampwork_scheduler::{CancellationToken, Interrupted};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render cancelled")]
    Cancelled,
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
}

impl Interrupted for RenderError {
    fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self {
            width_px: 256,
            height_px: 256,
        }
    }
}

/// Rendering capability: page `page_number` (1-based) at `scale` pixels
/// per point.
pub trait PageRasterizer<D: PageDocument> {
    fn render_page(
        &self,
        document: &D,
        page_number: u32,
        scale: f32,
        token: &CancellationToken,
    ) -> Result<RgbaImage, RenderError>;

    fn render_thumbnail(
        &self,
        document: &D,
        page_number: u32,
        target: ThumbnailSize,
        token: &CancellationToken,
    ) -> Result<RgbaImage, RenderError> {
        let page = self.render_page(document, page_number, 0.25, token)?;
        check(token)?;
        Ok(image::imageops::thumbnail(&page, target.width_px.max(1), target.height_px.max(1)))
    }
}

/// Placeholder raster: a white page of the right size with a light border.
/// Page content is not rasterized.
#[derive(Debug, Clone, Copy)]
pub struct PreviewRasterizer {
    pub background: Rgba<u8>,
    pub border: Rgba<u8>,
}

impl Default for PreviewRasterizer {
    fn default() -> Self {
        Self {
            background: Rgba([255, 255, 255, 255]),
            border: Rgba([220, 220, 220, 255]),
        }
    }
}

impl<D: PageDocument> PageRasterizer<D> for PreviewRasterizer {
    fn render_page(
        &self,
        document: &D,
        page_number: u32,
        scale: f32,
        token: &CancellationToken,
    ) -> Result<RgbaImage, RenderError> {
        check(token)?;

        if page_number == 0 {
            return Err(PdfEngineError::PageOutOfRange {
                page: page_number,
                page_count: document.page_count(),
            }
            .into());
        }
        let page_size = document.page_size(page_number - 1)?;
        let scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };

        let width = (page_size.width_pt * scale).round().max(1.0) as u32;
        let height = (page_size.height_pt * scale).round().max(1.0) as u32;
        let mut image = RgbaImage::from_pixel(width, height, self.background);
        check(token)?;

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, self.border);
                image.put_pixel(x, height - 1, self.border);
            }
            for y in 0..height {
                image.put_pixel(0, y, self.border);
                image.put_pixel(width - 1, y, self.border);
            }
        }

        check(token)?;
        Ok(image)
    }
}

fn check(token: &CancellationToken) -> Result<(), RenderError> {
    if token.is_cancelled() {
        log::debug!("render cancelled");
        return Err(RenderError::Cancelled);
    }
    Ok(())
}
