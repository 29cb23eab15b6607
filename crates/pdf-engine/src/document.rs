//! `lopdf`-backed [`PageDocument`].

use crate::fonts::{encode_win_ansi, FontVariant};
use crate::{
    FontRef, ImageFormat, ImageRef, PageDocument, PageSize, PageSource, PdfColor, PdfEngineError,
    PdfRect, RectStyle,
};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::ImageDecoder;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Write};
use std::path::Path;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

/// A page detached from its source document: its dictionary with inherited
/// attributes filled in, plus every object it references.
#[derive(Debug, Clone)]
pub struct CopiedPage {
    page: Dictionary,
    objects: BTreeMap<ObjectId, Object>,
    size: PageSize,
}

impl CopiedPage {
    pub fn size(&self) -> PageSize {
        self.size
    }
}

/// Drawing recorded for one page, written out on save.
#[derive(Debug, Clone, Default)]
struct PageOverlay {
    operations: Vec<Operation>,
    fonts: BTreeSet<String>,
    images: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct LopdfDocument {
    document: Document,
    /// Page object ids in page order.
    pages: Vec<ObjectId>,
    overlays: BTreeMap<ObjectId, PageOverlay>,
    fonts: BTreeMap<FontVariant, FontRef>,
    /// Resource name -> object id for everything embedded through this handle.
    resources: BTreeMap<String, ObjectId>,
}

impl LopdfDocument {
    pub fn load(bytes: &[u8]) -> Result<Self, PdfEngineError> {
        if bytes.windows(b"/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let document = Document::load_mem(bytes)?;
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        log::debug!("loaded document with {} pages", pages.len());
        Ok(Self::from_parts(document, pages))
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, PdfEngineError> {
        let bytes = std::fs::read(path)?;
        Self::load(&bytes)
    }

    /// A new document with one empty page per size.
    pub fn with_blank_pages(sizes: &[PageSize]) -> Result<Self, PdfEngineError> {
        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        let mut kids = Vec::with_capacity(sizes.len());
        let mut pages = Vec::with_capacity(sizes.len());

        for size in sizes {
            let page_id = document.add_object(blank_page(*size, Some(pages_id)));
            kids.push(Object::Reference(page_id));
            pages.push(page_id);
        }

        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => sizes.len() as i64,
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        Ok(Self::from_parts(document, pages))
    }

    fn from_parts(document: Document, pages: Vec<ObjectId>) -> Self {
        Self {
            document,
            pages,
            overlays: BTreeMap::new(),
            fonts: BTreeMap::new(),
            resources: BTreeMap::new(),
        }
    }

    fn page_id(&self, index: u32) -> Result<ObjectId, PdfEngineError> {
        self.pages.get(index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: index,
            page_count: self.page_count(),
        })
    }

    fn page_dict(&self, page_id: ObjectId) -> Result<&Dictionary, PdfEngineError> {
        Ok(self.document.get_object(page_id)?.as_dict()?)
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, PdfEngineError> {
        Ok(self.document.get_object_mut(page_id)?.as_dict_mut()?)
    }

    /// Looks `key` up on the page, then on its ancestors, resolving a
    /// top-level reference.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut current = Some(page_id);
        while let Some(id) = current {
            let dict = self.document.get_object(id).and_then(Object::as_dict).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(self.resolve(value).clone());
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.document.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    fn media_box_size(&self, page_id: ObjectId) -> PageSize {
        self.inherited(page_id, b"MediaBox")
            .and_then(|media_box| size_from_box(&media_box))
            .unwrap_or(PageSize::LETTER)
    }

    fn overlay(&mut self, index: u32) -> Result<&mut PageOverlay, PdfEngineError> {
        let page_id = self.page_id(index)?;
        Ok(self.overlays.entry(page_id).or_default())
    }

    fn next_resource_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.resources.len() + 1)
    }

    /// Links `page_id` into the page tree so that it becomes page `index`.
    fn attach_page(&mut self, index: u32, page_id: ObjectId) -> Result<(), PdfEngineError> {
        let parent_id = match self.pages.get(index as usize).or(self.pages.last()) {
            Some(anchor) => self.page_dict(*anchor)?.get(b"Parent")?.as_reference()?,
            None => self.document.catalog()?.get(b"Pages")?.as_reference()?,
        };
        let before = self.pages.get(index as usize).copied();

        let kids = self.document.get_object_mut(parent_id)?.as_dict_mut()?.get_mut(b"Kids")?;
        let kids = kids.as_array_mut()?;
        let position = before
            .and_then(|anchor| {
                kids.iter().position(|kid| kid.as_reference().ok() == Some(anchor))
            })
            .unwrap_or(kids.len());
        kids.insert(position, Object::Reference(page_id));

        self.page_dict_mut(page_id)?.set("Parent", parent_id);
        self.adjust_counts(parent_id, 1);
        self.pages.insert(index as usize, page_id);
        Ok(())
    }

    /// Takes page `index` out of the page tree. The page object itself stays
    /// in the document.
    fn unlink_page(&mut self, index: u32) -> Result<ObjectId, PdfEngineError> {
        let page_id = self.page_id(index)?;
        let parent_id = self.page_dict(page_id)?.get(b"Parent")?.as_reference()?;

        let kids = self.document.get_object_mut(parent_id)?.as_dict_mut()?.get_mut(b"Kids")?;
        kids.as_array_mut()?.retain(|kid| kid.as_reference().ok() != Some(page_id));

        self.adjust_counts(parent_id, -1);
        self.pages.remove(index as usize);
        Ok(page_id)
    }

    /// Removes page `index`. Its content and resources become unreachable
    /// and are pruned on save.
    fn detach_page(&mut self, index: u32) -> Result<(), PdfEngineError> {
        let page_id = self.unlink_page(index)?;
        self.document.objects.remove(&page_id);
        self.overlays.remove(&page_id);
        Ok(())
    }

    /// Drops every object no longer reachable from the trailer, along with
    /// any embedded resource that went with it.
    fn prune_unreachable(&mut self) {
        let pruned: BTreeSet<ObjectId> = self.document.prune_objects().into_iter().collect();
        if pruned.is_empty() {
            return;
        }

        log::debug!("pruned {} unreachable objects", pruned.len());
        self.resources.retain(|_, id| !pruned.contains(id));
        let resources = &self.resources;
        self.fonts.retain(|_, font| resources.contains_key(font.name()));
    }

    /// Adds `delta` to `/Count` on `node` and every ancestor.
    fn adjust_counts(&mut self, node: ObjectId, delta: i64) {
        let mut current = Some(node);
        while let Some(id) = current {
            let Ok(dict) = self.document.get_object_mut(id).and_then(Object::as_dict_mut) else {
                break;
            };
            let count = dict.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
            dict.set("Count", (count + delta).max(0));
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
    }

    fn detach_copy(&self, index: u32) -> Result<CopiedPage, PdfEngineError> {
        let page_id = self.page_id(index)?;
        let mut page = self.page_dict(page_id)?.clone();
        page.remove(b"Parent");
        for key in INHERITABLE {
            if !page.has(key) {
                if let Some(value) = self.inherited(page_id, key) {
                    page.set(key.to_vec(), value);
                }
            }
        }

        let mut objects = BTreeMap::new();
        let mut pending = Vec::new();
        for (_, value) in page.iter() {
            collect_references(value, &mut pending);
        }
        while let Some(id) = pending.pop() {
            if objects.contains_key(&id) {
                continue;
            }
            let Ok(object) = self.document.get_object(id) else {
                continue;
            };
            // Links to other pages would drag the whole page tree along.
            if is_page_tree_node(object) {
                continue;
            }
            collect_references(object, &mut pending);
            objects.insert(id, object.clone());
        }

        let size = page.get(b"MediaBox").ok().and_then(size_from_box).unwrap_or(PageSize::LETTER);
        Ok(CopiedPage {
            page,
            objects,
            size,
        })
    }

    /// Adds a detached page's objects under fresh ids and returns the new
    /// page object id. References that were not copied become `null`.
    fn import_copy(&mut self, copied: CopiedPage) -> ObjectId {
        let ids: BTreeMap<ObjectId, ObjectId> = copied
            .objects
            .keys()
            .map(|old| (*old, self.document.new_object_id()))
            .collect();

        for (old, mut object) in copied.objects {
            remap_references(&mut object, &ids);
            if let Some(new) = ids.get(&old) {
                self.document.objects.insert(*new, object);
            }
        }

        let mut page = Object::Dictionary(copied.page);
        remap_references(&mut page, &ids);
        self.document.add_object(page)
    }

    fn add_jpeg(&mut self, bytes: &[u8]) -> Result<(ObjectId, u32, u32), PdfEngineError> {
        let decoder = image::codecs::jpeg::JpegDecoder::new(Cursor::new(bytes))?;
        let (width, height) = decoder.dimensions();
        let color_space = match decoder.color_type() {
            image::ColorType::L8 => "DeviceGray",
            image::ColorType::Rgb8 => "DeviceRGB",
            other => {
                return Err(PdfEngineError::UnsupportedImage(format!("jpeg color type {other:?}")))
            }
        };

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes.to_vec(),
        );
        Ok((self.document.add_object(stream), width, height))
    }

    fn add_png(&mut self, bytes: &[u8]) -> Result<(ObjectId, u32, u32), PdfEngineError> {
        let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();

        let mut rgb = Vec::with_capacity((width * height * 3) as usize);
        let mut alpha = Vec::with_capacity((width * height) as usize);
        for pixel in rgba.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel.0[3]);
        }

        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        if alpha.iter().any(|value| *value != u8::MAX) {
            let smask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                deflate(&alpha)?,
            );
            image_dict.set("SMask", self.document.add_object(smask));
        }

        let stream = Stream::new(image_dict, deflate(&rgb)?);
        Ok((self.document.add_object(stream), width, height))
    }

    /// Writes recorded overlays into the page content. Existing content is
    /// wrapped in `q`/`Q` so its graphics state cannot leak into ours.
    fn commit_overlays(&mut self) -> Result<(), PdfEngineError> {
        let overlays = std::mem::take(&mut self.overlays);

        for (page_id, overlay) in overlays {
            if overlay.operations.is_empty() {
                continue;
            }

            let mut contents = Vec::new();
            let open = self.document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
            contents.push(Object::Reference(open));
            match self.page_dict(page_id)?.get(b"Contents") {
                Ok(Object::Reference(id)) => match self.document.get_object(*id) {
                    Ok(Object::Array(items)) => contents.extend(items.iter().cloned()),
                    _ => contents.push(Object::Reference(*id)),
                },
                Ok(Object::Array(items)) => contents.extend(items.iter().cloned()),
                _ => {}
            }

            let mut body = b"Q\n".to_vec();
            let overlay_content = Content {
                operations: overlay.operations,
            };
            body.extend(overlay_content.encode()?);
            let close = self.document.add_object(Stream::new(Dictionary::new(), body));
            contents.push(Object::Reference(close));

            let mut resources = match self.inherited(page_id, b"Resources") {
                Some(Object::Dictionary(dict)) => dict,
                _ => Dictionary::new(),
            };
            self.merge_resources(&mut resources, b"Font", &overlay.fonts);
            self.merge_resources(&mut resources, b"XObject", &overlay.images);

            let page = self.page_dict_mut(page_id)?;
            page.set("Contents", contents);
            page.set("Resources", resources);
        }

        Ok(())
    }

    fn merge_resources(
        &self,
        resources: &mut Dictionary,
        category: &[u8],
        names: &BTreeSet<String>,
    ) {
        if names.is_empty() {
            return;
        }

        let mut entries = match resources.get(category).map(|value| self.resolve(value)) {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        for name in names {
            if let Some(id) = self.resources.get(name) {
                entries.set(name.as_bytes().to_vec(), *id);
            }
        }
        resources.set(category.to_vec(), entries);
    }
}

impl PageDocument for LopdfDocument {
    type CopiedPage = CopiedPage;

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, index: u32) -> Result<PageSize, PdfEngineError> {
        Ok(self.media_box_size(self.page_id(index)?))
    }

    fn insert_page(
        &mut self,
        index: u32,
        source: PageSource<CopiedPage>,
    ) -> Result<(), PdfEngineError> {
        if index > self.page_count() {
            return Err(PdfEngineError::PageOutOfRange {
                page: index,
                page_count: self.page_count(),
            });
        }

        let page_id = match source {
            PageSource::Blank(size) => self.document.add_object(blank_page(size, None)),
            PageSource::Copied(copied) => self.import_copy(copied),
        };
        self.attach_page(index, page_id)
    }

    fn remove_page(&mut self, index: u32) -> Result<(), PdfEngineError> {
        self.detach_page(index)
    }

    fn move_page(&mut self, from: u32, to: u32) -> Result<(), PdfEngineError> {
        let page_count = self.page_count();
        if to >= page_count {
            return Err(PdfEngineError::PageOutOfRange {
                page: to,
                page_count,
            });
        }
        if from == to {
            return self.page_id(from).map(|_| ());
        }

        let page_id = self.unlink_page(from)?;
        self.attach_page(to, page_id)
    }

    fn copy_pages(
        &self,
        source: &Self,
        indices: &[u32],
    ) -> Result<Vec<CopiedPage>, PdfEngineError> {
        indices.iter().map(|index| source.detach_copy(*index)).collect()
    }

    fn copied_page_size(page: &CopiedPage) -> PageSize {
        page.size
    }

    fn embed_font(&mut self, variant: FontVariant) -> Result<FontRef, PdfEngineError> {
        if let Some(font) = self.fonts.get(&variant) {
            return Ok(font.clone());
        }

        let font_id = self.document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => variant.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        let font = FontRef::new(self.next_resource_name("StampF"), variant);
        self.resources.insert(font.name().to_owned(), font_id);
        self.fonts.insert(variant, font.clone());
        Ok(font)
    }

    fn embed_image(
        &mut self,
        bytes: &[u8],
        format: ImageFormat,
    ) -> Result<ImageRef, PdfEngineError> {
        let (image_id, width, height) = match format {
            ImageFormat::Jpeg => self.add_jpeg(bytes)?,
            ImageFormat::Png => self.add_png(bytes)?,
        };

        let image = ImageRef::new(self.next_resource_name("StampIm"), width, height);
        self.resources.insert(image.name().to_owned(), image_id);
        Ok(image)
    }

    fn draw_text(
        &mut self,
        index: u32,
        text: &str,
        x: f32,
        y: f32,
        font: &FontRef,
        size: f32,
        color: PdfColor,
    ) -> Result<(), PdfEngineError> {
        if !self.resources.contains_key(font.name()) {
            return Err(PdfEngineError::Backend(format!("font {} is not embedded", font.name())));
        }

        let overlay = self.overlay(index)?;
        overlay.fonts.insert(font.name().to_owned());
        overlay.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.name().as_bytes().to_vec()), real(size)]),
            Operation::new("rg", color_operands(color)),
            Operation::new("Td", vec![real(x), real(y)]),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ]);
        Ok(())
    }

    fn draw_image(
        &mut self,
        index: u32,
        image: &ImageRef,
        rect: PdfRect,
    ) -> Result<(), PdfEngineError> {
        if !self.resources.contains_key(image.name()) {
            return Err(PdfEngineError::Backend(format!("image {} is not embedded", image.name())));
        }

        let overlay = self.overlay(index)?;
        overlay.images.insert(image.name().to_owned());
        overlay.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    real(rect.width),
                    real(0.0),
                    real(0.0),
                    real(rect.height),
                    real(rect.x),
                    real(rect.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(image.name().as_bytes().to_vec())]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn draw_rect(
        &mut self,
        index: u32,
        rect: PdfRect,
        style: RectStyle,
    ) -> Result<(), PdfEngineError> {
        let paint = match (style.fill, style.stroke) {
            (Some(_), Some(_)) => "B",
            (Some(_), None) => "f",
            (None, Some(_)) => "S",
            (None, None) => return Ok(()),
        };

        let overlay = self.overlay(index)?;
        overlay.operations.push(Operation::new("q", vec![]));
        if let Some(fill) = style.fill {
            overlay.operations.push(Operation::new("rg", color_operands(fill)));
        }
        if let Some(stroke) = style.stroke {
            overlay.operations.push(Operation::new("RG", color_operands(stroke)));
            overlay.operations.push(Operation::new("w", vec![real(style.line_width)]));
        }
        overlay.operations.extend([
            Operation::new(
                "re",
                vec![real(rect.x), real(rect.y), real(rect.width), real(rect.height)],
            ),
            Operation::new(paint, vec![]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn draw_line(
        &mut self,
        index: u32,
        from: (f32, f32),
        to: (f32, f32),
        thickness: f32,
        color: PdfColor,
    ) -> Result<(), PdfEngineError> {
        let overlay = self.overlay(index)?;
        overlay.operations.extend([
            Operation::new("q", vec![]),
            Operation::new("RG", color_operands(color)),
            Operation::new("w", vec![real(thickness)]),
            Operation::new("m", vec![real(from.0), real(from.1)]),
            Operation::new("l", vec![real(to.0), real(to.1)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        Ok(())
    }

    fn save(&mut self) -> Result<Vec<u8>, PdfEngineError> {
        self.commit_overlays()?;
        self.prune_unreachable();

        let mut buffer = Vec::new();
        self.document.save_to(&mut buffer)?;
        Ok(buffer)
    }
}

fn blank_page(size: PageSize, parent: Option<ObjectId>) -> Dictionary {
    let mut page = dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), real(size.width_pt), real(size.height_pt)],
        "Resources" => Dictionary::new(),
    };
    if let Some(parent) = parent {
        page.set("Parent", parent);
    }
    page
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

fn color_operands(color: PdfColor) -> Vec<Object> {
    vec![real(color.r), real(color.g), real(color.b)]
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

fn size_from_box(media_box: &Object) -> Option<PageSize> {
    let array = media_box.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }
    let x0 = number(&array[0])?;
    let y0 = number(&array[1])?;
    let x1 = number(&array[2])?;
    let y1 = number(&array[3])?;
    Some(PageSize {
        width_pt: (x1 - x0).abs(),
        height_pt: (y1 - y0).abs(),
    })
}

fn is_page_tree_node(object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(dict.get(b"Type").and_then(Object::as_name), Ok(b"Page" | b"Pages"))
}

fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        Object::Dictionary(dict) => {
            dict.iter().for_each(|(_, value)| collect_references(value, out))
        }
        Object::Stream(stream) => {
            stream.dict.iter().for_each(|(_, value)| collect_references(value, out))
        }
        _ => {}
    }
}

fn remap_references(object: &mut Object, ids: &BTreeMap<ObjectId, ObjectId>) {
    if let Object::Reference(id) = object {
        let mapped = ids.get(id).copied();
        *object = mapped.map_or(Object::Null, Object::Reference);
        return;
    }

    match object {
        Object::Array(items) => items.iter_mut().for_each(|item| remap_references(item, ids)),
        Object::Dictionary(dict) => {
            dict.iter_mut().for_each(|(_, value)| remap_references(value, ids))
        }
        Object::Stream(stream) => {
            stream.dict.iter_mut().for_each(|(_, value)| remap_references(value, ids))
        }
        _ => {}
    }
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfEngineError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
