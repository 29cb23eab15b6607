//! Export: burns overlay elements into page content.
//!
//! Elements are visited in page order. Each one is mapped into the page's
//! native space, clamped, and drawn through the [`PageDocument`] capability.
//! A broken image only costs that element a placeholder; the export itself
//! fails only when the document cannot be drawn on or saved.

use crate::image_data::decode_data_url;
use doc_model::{
    parse_hex_color, ElementKind, FontStyle, FontWeight, OverlayElement, PageTransform, Snapshot,
    TargetBox, TargetSize, TextAlign, TextDecoration,
};
use pdf_engine::{FontVariant, PageDocument, PdfColor, PdfEngineError, PdfRect, RectStyle};
use std::fmt;

/// Screen-pixel font size used for date values.
const DATE_FONT_SIZE: f64 = 14.0;
/// Screen-pixel upper bound for table cell text.
const TABLE_FONT_SIZE: f64 = 12.0;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("snapshot has {snapshot} pages but the document has {document}")]
    PageCountMismatch { snapshot: u32, document: u32 },
    #[error("no page geometry recorded for page {0}")]
    MissingGeometry(u32),
    #[error(transparent)]
    Document(#[from] PdfEngineError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlattenOptions {
    pub placeholder_fill: PdfColor,
    pub placeholder_border: PdfColor,
    /// Log elements dropped for lying off the page at `warn` instead of `debug`.
    pub log_skipped_elements: bool,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            placeholder_fill: PdfColor::rgb(0.9, 0.9, 0.9),
            placeholder_border: PdfColor::rgb(0.6, 0.6, 0.6),
            log_skipped_elements: false,
        }
    }
}

/// What happened to the elements of one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenReport {
    pub drawn: usize,
    /// Off the page, or nothing to draw.
    pub skipped: usize,
    /// Images that failed to decode or embed.
    pub placeholders: usize,
}

impl fmt::Display for FlattenReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} drawn, {} skipped, {} placeholders",
            self.drawn, self.skipped, self.placeholders
        )
    }
}

enum Drawn {
    Content,
    Nothing,
    Placeholder,
}

/// Flattens with default options.
pub fn flatten<D: PageDocument>(
    snapshot: &Snapshot,
    document: &mut D,
) -> Result<Vec<u8>, ExportError> {
    ExportFlattener::default().flatten(snapshot, document)
}

#[derive(Debug, Clone, Default)]
pub struct ExportFlattener {
    options: FlattenOptions,
}

impl ExportFlattener {
    pub fn new(options: FlattenOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FlattenOptions {
        &self.options
    }

    pub fn flatten<D: PageDocument>(
        &self,
        snapshot: &Snapshot,
        document: &mut D,
    ) -> Result<Vec<u8>, ExportError> {
        self.flatten_with_report(snapshot, document).map(|(bytes, _)| bytes)
    }

    /// Draws every element into `document` and serializes it. On error the
    /// document may hold part of the overlays, so callers that keep editing
    /// should pass a copy.
    pub fn flatten_with_report<D: PageDocument>(
        &self,
        snapshot: &Snapshot,
        document: &mut D,
    ) -> Result<(Vec<u8>, FlattenReport), ExportError> {
        if snapshot.total_pages() != document.page_count() {
            return Err(ExportError::PageCountMismatch {
                snapshot: snapshot.total_pages(),
                document: document.page_count(),
            });
        }

        let mut report = FlattenReport::default();
        for element in snapshot.elements().in_page_order() {
            let index = element
                .page
                .checked_sub(1)
                .ok_or(ExportError::MissingGeometry(element.page))?;
            let native = document.page_size(index)?;
            let target = TargetSize::new(f64::from(native.width_pt), f64::from(native.height_pt));
            let transform = snapshot
                .transform(element.page, target)
                .ok_or(ExportError::MissingGeometry(element.page))?;

            let raw_box = transform.to_target(&element.rect());
            let Some(target_box) = clamp_to_target(raw_box, target) else {
                self.log_skipped(element);
                report.skipped += 1;
                continue;
            };

            let mut page = PageCanvas {
                document: &mut *document,
                index,
                transform,
            };
            match self.draw_element(&mut page, element, target_box)? {
                Drawn::Content => report.drawn += 1,
                Drawn::Nothing => report.skipped += 1,
                Drawn::Placeholder => report.placeholders += 1,
            }
        }

        let bytes = document.save()?;
        log::debug!("flattened {} elements: {report}", snapshot.elements().len());
        Ok((bytes, report))
    }

    fn log_skipped(&self, element: &OverlayElement) {
        if self.options.log_skipped_elements {
            log::warn!("element {} lies outside page {}, skipping", element.id, element.page);
        } else {
            log::debug!("element {} lies outside page {}, skipping", element.id, element.page);
        }
    }

    fn draw_element<D: PageDocument>(
        &self,
        page: &mut PageCanvas<'_, D>,
        element: &OverlayElement,
        target_box: TargetBox,
    ) -> Result<Drawn, ExportError> {
        match &element.kind {
            ElementKind::Text(text) => page.text(
                &TextRun {
                    content: &text.content,
                    font_size: text.font_size,
                    color: parse_hex_color(&text.color).into(),
                    variant: FontVariant::select(
                        text.font_weight == FontWeight::Bold,
                        text.font_style == FontStyle::Italic,
                    ),
                    align: text.text_align,
                    underline: text.text_decoration == TextDecoration::Underline,
                },
                target_box,
            ),
            ElementKind::TextField(field) => {
                page.text(&TextRun::plain(&field.value, field.font_size), target_box)
            }
            ElementKind::Date(field) => {
                page.text(&TextRun::plain(&field.value, DATE_FONT_SIZE), target_box)
            }
            ElementKind::Heading(heading) => page.text(
                &TextRun {
                    variant: FontVariant::Bold,
                    ..TextRun::plain(&heading.text, heading.font_size())
                },
                target_box,
            ),
            ElementKind::Image(image) | ElementKind::Signature(image) => {
                self.image(page, element, &image.image_data, target_box)
            }
            ElementKind::Initials(field) => {
                self.image(page, element, &field.image_data, target_box)
            }
            ElementKind::ImageBlock(block) => {
                self.image(page, element, &block.image_data, target_box)
            }
            ElementKind::Checkbox(field) => page.checkbox(field.checked, target_box),
            ElementKind::Video(_) => {
                page.frame(
                    target_box,
                    self.options.placeholder_fill,
                    self.options.placeholder_border,
                )?;
                Ok(Drawn::Content)
            }
            ElementKind::Table(table) => page.table(&table.rows, target_box),
        }
    }

    fn image<D: PageDocument>(
        &self,
        page: &mut PageCanvas<'_, D>,
        element: &OverlayElement,
        image_data: &str,
        target_box: TargetBox,
    ) -> Result<Drawn, ExportError> {
        if image_data.is_empty() {
            return Ok(Drawn::Nothing);
        }

        let embedded = decode_data_url(image_data)
            .map_err(|error| error.to_string())
            .and_then(|decoded| {
                page.document
                    .embed_image(&decoded.bytes, decoded.format)
                    .map_err(|error| error.to_string())
            });

        match embedded {
            Ok(image) => {
                let rect = fit_centered(image.width_px(), image.height_px(), target_box);
                page.document.draw_image(page.index, &image, rect)?;
                Ok(Drawn::Content)
            }
            Err(error) => {
                log::warn!(
                    "element {}: image could not be embedded ({error}), drawing placeholder",
                    element.id
                );
                page.frame(
                    target_box,
                    self.options.placeholder_fill,
                    self.options.placeholder_border,
                )?;
                Ok(Drawn::Placeholder)
            }
        }
    }
}

/// Returns `None` when `raw` has no area inside the page. Otherwise the
/// origin is pulled to `>= 0` and the extent cut at the page edge.
pub fn clamp_to_target(raw: TargetBox, page: TargetSize) -> Option<TargetBox> {
    if raw.right() <= 0.0 || raw.x >= page.width || raw.top() <= 0.0 || raw.y >= page.height {
        return None;
    }

    let x = raw.x.max(0.0);
    let y = raw.y.max(0.0);
    let width = raw.width.min(page.width - x);
    let height = raw.height.min(page.height - y);
    if width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some(TargetBox::new(x, y, width, height))
}

/// Largest rectangle with the image's aspect ratio that fits `target_box`,
/// centered in it.
pub fn fit_centered(width_px: u32, height_px: u32, target_box: TargetBox) -> PdfRect {
    let (width_px, height_px) = (f64::from(width_px.max(1)), f64::from(height_px.max(1)));
    let scale = (target_box.width / width_px).min(target_box.height / height_px);
    let width = width_px * scale;
    let height = height_px * scale;

    PdfRect::new(
        (target_box.x + (target_box.width - width) / 2.0) as f32,
        (target_box.y + (target_box.height - height) / 2.0) as f32,
        width as f32,
        height as f32,
    )
}

struct TextRun<'a> {
    content: &'a str,
    /// Screen pixels.
    font_size: f64,
    color: PdfColor,
    variant: FontVariant,
    align: TextAlign,
    underline: bool,
}

impl<'a> TextRun<'a> {
    fn plain(content: &'a str, font_size: f64) -> Self {
        Self {
            content,
            font_size,
            color: PdfColor::BLACK,
            variant: FontVariant::Regular,
            align: TextAlign::Left,
            underline: false,
        }
    }
}

/// One page of the document plus the transform of the element being drawn.
struct PageCanvas<'d, D> {
    document: &'d mut D,
    index: u32,
    transform: PageTransform,
}

impl<D: PageDocument> PageCanvas<'_, D> {
    fn stroke_width(&self) -> f32 {
        (self.transform.uniform_scale() as f32).max(0.5)
    }

    fn text(&mut self, run: &TextRun<'_>, target_box: TargetBox) -> Result<Drawn, ExportError> {
        if run.content.trim().is_empty() {
            return Ok(Drawn::Nothing);
        }

        let font = self.document.embed_font(run.variant)?;
        let size = (run.font_size * self.transform.uniform_scale()) as f32;
        let left = target_box.x as f32;
        let width = target_box.width as f32;

        let mut baseline = target_box.top() as f32;
        for line in run.content.split('\n').map(|line| line.trim_end_matches('\r')) {
            baseline -= size;
            if line.is_empty() {
                continue;
            }

            let line_width = font.width_of_text_at_size(line, size);
            let x = match run.align {
                TextAlign::Left => left,
                TextAlign::Center => left + (width - line_width) / 2.0,
                TextAlign::Right => left + width - line_width,
            };
            self.document.draw_text(self.index, line, x, baseline, &font, size, run.color)?;
        }

        if run.underline {
            let y = baseline - size * 0.15;
            let thickness = (size / 18.0).max(0.5);
            self.document
                .draw_line(self.index, (left, y), (left + width, y), thickness, run.color)?;
        }
        Ok(Drawn::Content)
    }

    fn checkbox(&mut self, checked: bool, target_box: TargetBox) -> Result<Drawn, ExportError> {
        let rect = pdf_rect(target_box);
        let line_width = self.stroke_width();
        self.document.draw_rect(self.index, rect, RectStyle::stroked(PdfColor::BLACK, line_width))?;

        if checked {
            let inset_x = rect.width * 0.2;
            let inset_y = rect.height * 0.2;
            let (x0, x1) = (rect.x + inset_x, rect.x + rect.width - inset_x);
            let (y0, y1) = (rect.y + inset_y, rect.y + rect.height - inset_y);
            let cross = line_width * 1.5;
            self.document
                .draw_line(self.index, (x0, y0), (x1, y1), cross, PdfColor::BLACK)?;
            self.document
                .draw_line(self.index, (x0, y1), (x1, y0), cross, PdfColor::BLACK)?;
        }
        Ok(Drawn::Content)
    }

    fn frame(
        &mut self,
        target_box: TargetBox,
        fill: PdfColor,
        border: PdfColor,
    ) -> Result<(), ExportError> {
        let style = RectStyle {
            fill: Some(fill),
            stroke: Some(border),
            line_width: self.stroke_width(),
        };
        self.document.draw_rect(self.index, pdf_rect(target_box), style)?;
        Ok(())
    }

    fn table(&mut self, rows: &[Vec<String>], target_box: TargetBox) -> Result<Drawn, ExportError> {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if rows.is_empty() || columns == 0 {
            return Ok(Drawn::Nothing);
        }

        let rect = pdf_rect(target_box);
        let line_width = self.stroke_width();
        let cell_width = rect.width / columns as f32;
        let cell_height = rect.height / rows.len() as f32;
        let top = rect.y + rect.height;

        self.document.draw_rect(self.index, rect, RectStyle::stroked(PdfColor::BLACK, line_width))?;
        for column in 1..columns {
            let x = rect.x + cell_width * column as f32;
            self.document
                .draw_line(self.index, (x, rect.y), (x, top), line_width, PdfColor::BLACK)?;
        }
        for row in 1..rows.len() {
            let y = top - cell_height * row as f32;
            self.document.draw_line(
                self.index,
                (rect.x, y),
                (rect.x + rect.width, y),
                line_width,
                PdfColor::BLACK,
            )?;
        }

        if rows.iter().flatten().all(|cell| cell.trim().is_empty()) {
            return Ok(Drawn::Content);
        }

        let font = self.document.embed_font(FontVariant::Regular)?;
        let size =
            ((TABLE_FONT_SIZE * self.transform.uniform_scale()) as f32).min(cell_height * 0.6);
        let padding = line_width * 2.0;
        for (row_index, row) in rows.iter().enumerate() {
            let cell_bottom = top - cell_height * (row_index + 1) as f32;
            let baseline = cell_bottom + (cell_height - size) / 2.0 + size * 0.2;
            for (column, cell) in row.iter().enumerate() {
                if cell.trim().is_empty() {
                    continue;
                }
                let x = rect.x + cell_width * column as f32 + padding;
                self.document
                    .draw_text(self.index, cell, x, baseline, &font, size, PdfColor::BLACK)?;
            }
        }
        Ok(Drawn::Content)
    }
}

fn pdf_rect(target_box: TargetBox) -> PdfRect {
    PdfRect::new(
        target_box.x as f32,
        target_box.y as f32,
        target_box.width as f32,
        target_box.height as f32,
    )
}
