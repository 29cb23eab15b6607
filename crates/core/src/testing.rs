//! In-memory document that records draw calls.

use pdf_engine::{
    FontRef, FontVariant, ImageFormat, ImageRef, PageDocument, PageSize, PageSource, PdfColor,
    PdfEngineError, PdfRect, RectStyle,
};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCall {
    Text {
        index: u32,
        text: String,
        x: f32,
        y: f32,
        variant: FontVariant,
        size: f32,
    },
    Image {
        index: u32,
        rect: PdfRect,
    },
    Rect {
        index: u32,
        rect: PdfRect,
        style: RectStyle,
    },
    Line {
        index: u32,
        from: (f32, f32),
        to: (f32, f32),
        thickness: f32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDocument {
    pub pages: Vec<PageSize>,
    pub calls: Vec<DrawCall>,
    pub embedded_fonts: Vec<FontVariant>,
    pub embedded_images: Vec<ImageFormat>,
    pub reject_images: bool,
    pub saves: usize,
}

impl RecordingDocument {
    pub fn new(pages: &[PageSize]) -> Self {
        Self {
            pages: pages.to_vec(),
            ..Self::default()
        }
    }

    pub fn texts(&self) -> Vec<(String, f32, f32, FontVariant, f32)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DrawCall::Text {
                    text,
                    x,
                    y,
                    variant,
                    size,
                    ..
                } => {
                    Some((text.clone(), *x, *y, *variant, *size))
                }
                _ => None,
            })
            .collect()
    }

    pub fn images(&self) -> Vec<PdfRect> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                DrawCall::Image { rect, .. } => Some(*rect),
                _ => None,
            })
            .collect()
    }

    fn check(&self, index: u32) -> Result<(), PdfEngineError> {
        if index as usize >= self.pages.len() {
            return Err(PdfEngineError::PageOutOfRange {
                page: index,
                page_count: self.page_count(),
            });
        }
        Ok(())
    }
}

impl PageDocument for RecordingDocument {
    type CopiedPage = PageSize;

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, index: u32) -> Result<PageSize, PdfEngineError> {
        self.check(index)?;
        Ok(self.pages[index as usize])
    }

    fn insert_page(
        &mut self,
        index: u32,
        source: PageSource<PageSize>,
    ) -> Result<(), PdfEngineError> {
        if index as usize > self.pages.len() {
            return Err(PdfEngineError::PageOutOfRange {
                page: index,
                page_count: self.page_count(),
            });
        }
        let size = match source {
            PageSource::Blank(size) | PageSource::Copied(size) => size,
        };
        self.pages.insert(index as usize, size);
        Ok(())
    }

    fn remove_page(&mut self, index: u32) -> Result<(), PdfEngineError> {
        self.check(index)?;
        self.pages.remove(index as usize);
        Ok(())
    }

    fn move_page(&mut self, from: u32, to: u32) -> Result<(), PdfEngineError> {
        self.check(from)?;
        self.check(to)?;
        let page = self.pages.remove(from as usize);
        self.pages.insert(to as usize, page);
        Ok(())
    }

    fn copy_pages(&self, source: &Self, indices: &[u32]) -> Result<Vec<PageSize>, PdfEngineError> {
        indices.iter().map(|&index| source.page_size(index)).collect()
    }

    fn copied_page_size(page: &PageSize) -> PageSize {
        *page
    }

    fn embed_font(&mut self, variant: FontVariant) -> Result<FontRef, PdfEngineError> {
        if !self.embedded_fonts.contains(&variant) {
            self.embedded_fonts.push(variant);
        }
        Ok(FontRef::new(variant.base_font(), variant))
    }

    fn embed_image(
        &mut self,
        bytes: &[u8],
        format: ImageFormat,
    ) -> Result<ImageRef, PdfEngineError> {
        if self.reject_images {
            return Err(PdfEngineError::UnsupportedImage("rejected".to_owned()));
        }
        let decoded = image::load_from_memory(bytes)?;
        self.embedded_images.push(format);
        Ok(ImageRef::new(
            format!("Im{}", self.embedded_images.len()),
            decoded.width(),
            decoded.height(),
        ))
    }

    fn draw_text(
        &mut self,
        index: u32,
        text: &str,
        x: f32,
        y: f32,
        font: &FontRef,
        size: f32,
        _color: PdfColor,
    ) -> Result<(), PdfEngineError> {
        self.check(index)?;
        self.calls.push(DrawCall::Text {
            index,
            text: text.to_owned(),
            x,
            y,
            variant: font.variant(),
            size,
        });
        Ok(())
    }

    fn draw_image(
        &mut self,
        index: u32,
        _image: &ImageRef,
        rect: PdfRect,
    ) -> Result<(), PdfEngineError> {
        self.check(index)?;
        self.calls.push(DrawCall::Image { index, rect });
        Ok(())
    }

    fn draw_rect(
        &mut self,
        index: u32,
        rect: PdfRect,
        style: RectStyle,
    ) -> Result<(), PdfEngineError> {
        self.check(index)?;
        self.calls.push(DrawCall::Rect { index, rect, style });
        Ok(())
    }

    fn draw_line(
        &mut self,
        index: u32,
        from: (f32, f32),
        to: (f32, f32),
        thickness: f32,
        _color: PdfColor,
    ) -> Result<(), PdfEngineError> {
        self.check(index)?;
        self.calls.push(DrawCall::Line {
            index,
            from,
            to,
            thickness,
        });
        Ok(())
    }

    fn save(&mut self) -> Result<Vec<u8>, PdfEngineError> {
        self.saves += 1;
        Ok(b"%PDF-1.7 recorded".to_vec())
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Jpeg)
        .expect("encode jpeg");
    bytes.into_inner()
}
