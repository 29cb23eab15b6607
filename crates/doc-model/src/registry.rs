//! Element registry: identity, default geometry and bounds clamping.

use crate::element::{ElementId, ElementKind, ElementPatch, ElementType, OverlayElement};
use crate::geometry::{ScreenPoint, ScreenRect, ScreenSize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("element {0} not found")]
    NotFound(ElementId),
    #[error("cannot change element {id} from {from} to {to}")]
    KindMismatch {
        id: ElementId,
        from: ElementType,
        to: ElementType,
    },
    #[error("element {0} is not a block")]
    NotABlock(ElementId),
}

/// Keeps `rect` inside `[0, width] x [0, height]`, shrinking it if it is
/// larger than the page.
pub fn clamp_to_page(rect: ScreenRect, bounds: ScreenSize) -> ScreenRect {
    let width = rect.width.max(0.0).min(bounds.width);
    let height = rect.height.max(0.0).min(bounds.height);
    let x = rect.x.max(0.0).min(bounds.width - width);
    let y = rect.y.max(0.0).min(bounds.height - height);

    ScreenRect {
        x,
        y,
        width,
        height,
    }
}

/// All overlay elements of a document, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementRegistry {
    elements: Vec<OverlayElement>,
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, id: ElementId) -> Option<&OverlayElement> {
        self.elements.iter().find(|element| element.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OverlayElement> {
        self.elements.iter()
    }

    /// Elements in page order; insertion order within a page.
    pub fn in_page_order(&self) -> Vec<&OverlayElement> {
        let mut elements: Vec<&OverlayElement> = self.elements.iter().collect();
        elements.sort_by_key(|element| element.page);
        elements
    }

    pub fn list_by_page(&self, page: u32) -> Vec<&OverlayElement> {
        self.elements.iter().filter(|element| element.page == page).collect()
    }

    /// Block elements on `page`, sorted by flow order.
    pub fn blocks_on_page(&self, page: u32) -> Vec<&OverlayElement> {
        let mut blocks: Vec<&OverlayElement> = self
            .elements
            .iter()
            .filter(|element| element.page == page && element.is_block())
            .collect();
        blocks.sort_by_key(|element| element.kind.block_order());
        blocks
    }

    /// Places a new element of `element_type` with its top-left corner at
    /// `anchor`, using the type's default size.
    pub fn add(
        &mut self,
        element_type: ElementType,
        page: u32,
        anchor: ScreenPoint,
        page_size: ScreenSize,
    ) -> ElementId {
        self.add_kind(element_type.default_kind(0), page, anchor, page_size)
    }

    /// Like [`add`](Self::add) with an explicit payload. Block order is
    /// always assigned here, appended after the page's existing blocks.
    pub fn add_kind(
        &mut self,
        mut kind: ElementKind,
        page: u32,
        anchor: ScreenPoint,
        page_size: ScreenSize,
    ) -> ElementId {
        let element_type = kind.element_type();
        if element_type.is_block() {
            kind.set_block_order(self.block_count(page));
        }

        let size = element_type.default_size();
        let rect =
            clamp_to_page(ScreenRect::new(anchor.x, anchor.y, size.width, size.height), page_size);
        let id = ElementId::new_v4();

        self.elements.push(OverlayElement {
            id,
            page,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            kind,
        });

        log::debug!("added {element_type} element {id} on page {page}");
        id
    }

    /// Applies `patch` in place. Geometry is clamped to `page_size`; the id,
    /// page and block order are preserved.
    pub fn update(
        &mut self,
        id: ElementId,
        patch: ElementPatch,
        page_size: ScreenSize,
    ) -> Result<(), RegistryError> {
        let element = self
            .elements
            .iter_mut()
            .find(|element| element.id == id)
            .ok_or(RegistryError::NotFound(id))?;

        if let Some(mut kind) = patch.kind {
            let (from, to) = (element.element_type(), kind.element_type());
            if from != to {
                return Err(RegistryError::KindMismatch { id, from, to });
            }
            if let Some(order) = element.kind.block_order() {
                kind.set_block_order(order);
            }
            element.kind = kind;
        }

        if let (Some(text), ElementKind::Text(props)) = (patch.text, &mut element.kind) {
            text.apply(props);
        }

        if let Some(image_data) = patch.image_data {
            match &mut element.kind {
                ElementKind::Image(props) | ElementKind::Signature(props) => {
                    props.image_data = image_data;
                }
                ElementKind::Initials(field) => field.image_data = image_data,
                ElementKind::ImageBlock(block) => block.image_data = image_data,
                _ => {}
            }
        }

        let rect = ScreenRect::new(
            patch.x.unwrap_or(element.x),
            patch.y.unwrap_or(element.y),
            patch.width.unwrap_or(element.width),
            patch.height.unwrap_or(element.height),
        );
        let rect = clamp_to_page(rect, page_size);
        element.x = rect.x;
        element.y = rect.y;
        element.width = rect.width;
        element.height = rect.height;

        Ok(())
    }

    pub fn remove(&mut self, id: ElementId) -> Result<OverlayElement, RegistryError> {
        let index = self
            .elements
            .iter()
            .position(|element| element.id == id)
            .ok_or(RegistryError::NotFound(id))?;

        let removed = self.elements.remove(index);
        if removed.is_block() {
            self.compact_block_orders(removed.page);
        }
        Ok(removed)
    }

    /// Drops `ids` without touching block orders. Only valid when whole
    /// pages go away, as in a page delete.
    pub fn discard(&mut self, ids: &[ElementId]) -> usize {
        let before = self.elements.len();
        self.elements.retain(|element| !ids.contains(&element.id));
        before - self.elements.len()
    }

    /// Moves every element through `mapping`. Elements whose page maps to
    /// `None` are left untouched and returned so the caller can remove them.
    pub fn renumber_pages(&mut self, mapping: impl Fn(u32) -> Option<u32>) -> Vec<ElementId> {
        let mut orphaned = Vec::new();

        for element in &mut self.elements {
            match mapping(element.page) {
                Some(page) => element.page = page,
                None => orphaned.push(element.id),
            }
        }

        orphaned
    }

    /// Moves a block to `new_order` within its page, shifting the others.
    pub fn set_block_order(&mut self, id: ElementId, new_order: u32) -> Result<(), RegistryError> {
        let element = self.get(id).ok_or(RegistryError::NotFound(id))?;
        if !element.is_block() {
            return Err(RegistryError::NotABlock(id));
        }

        let page = element.page;
        let mut ordered: Vec<ElementId> =
            self.blocks_on_page(page).into_iter().map(|block| block.id).collect();
        ordered.retain(|block_id| *block_id != id);
        let position = (new_order as usize).min(ordered.len());
        ordered.insert(position, id);

        self.assign_block_orders(&ordered);
        Ok(())
    }

    pub(crate) fn elements_mut(&mut self) -> impl Iterator<Item = &mut OverlayElement> {
        self.elements.iter_mut()
    }

    fn block_count(&self, page: u32) -> u32 {
        self.elements.iter().filter(|element| element.page == page && element.is_block()).count()
            as u32
    }

    fn compact_block_orders(&mut self, page: u32) {
        let ordered: Vec<ElementId> =
            self.blocks_on_page(page).into_iter().map(|block| block.id).collect();
        self.assign_block_orders(&ordered);
    }

    fn assign_block_orders(&mut self, ordered: &[ElementId]) {
        for (order, block_id) in ordered.iter().enumerate() {
            if let Some(element) = self.elements.iter_mut().find(|element| element.id == *block_id)
            {
                element.kind.set_block_order(order as u32);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{TextAlign, TextPatch};

    const PAGE: ScreenSize = ScreenSize {
        width: 600.0,
        height: 800.0,
    };

    #[test]
    fn add_assigns_default_size_and_unique_ids() {
        let mut registry = ElementRegistry::new();
        let a = registry.add(ElementType::TextField, 1, ScreenPoint::new(10.0, 10.0), PAGE);
        let b = registry.add(ElementType::TextField, 1, ScreenPoint::new(10.0, 10.0), PAGE);

        assert_ne!(a, b);
        let element = registry.get(a).expect("element exists");
        assert_eq!((element.width, element.height), (200.0, 40.0));
    }

    #[test]
    fn add_clamps_anchor_into_page() {
        let mut registry = ElementRegistry::new();
        let id = registry.add(ElementType::Signature, 1, ScreenPoint::new(590.0, -20.0), PAGE);

        let element = registry.get(id).expect("element exists");
        assert_eq!(element.x, 450.0);
        assert_eq!(element.y, 0.0);
        assert!(element.x + element.width <= PAGE.width);
    }

    #[test]
    fn oversized_element_shrinks_to_page() {
        let tiny = ScreenSize::new(100.0, 30.0);
        let mut registry = ElementRegistry::new();
        let id = registry.add(ElementType::Table, 1, ScreenPoint::new(5.0, 5.0), tiny);

        let element = registry.get(id).expect("element exists");
        assert_eq!(element.rect(), ScreenRect::new(0.0, 0.0, 100.0, 30.0));
    }

    #[test]
    fn update_preserves_identity_and_page() {
        let mut registry = ElementRegistry::new();
        let id = registry.add(ElementType::Text, 3, ScreenPoint::new(0.0, 0.0), PAGE);

        registry
            .update(
                id,
                ElementPatch {
                    x: Some(100.0),
                    text: Some(TextPatch {
                        content: Some("Signed".to_owned()),
                        text_align: Some(TextAlign::Right),
                        ..TextPatch::default()
                    }),
                    ..ElementPatch::default()
                },
                PAGE,
            )
            .expect("update succeeds");

        let element = registry.get(id).expect("element exists");
        assert_eq!(element.id, id);
        assert_eq!(element.page, 3);
        assert_eq!(element.x, 100.0);
        let ElementKind::Text(props) = &element.kind else {
            panic!("expected text kind");
        };
        assert_eq!(props.content, "Signed");
        assert_eq!(props.text_align, TextAlign::Right);
    }

    #[test]
    fn update_and_remove_unknown_id_report_not_found() {
        let mut registry = ElementRegistry::new();
        registry.add(ElementType::Checkbox, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        let before = registry.clone();
        let ghost = ElementId::new_v4();

        assert_eq!(
            registry.update(ghost, ElementPatch::moved_to(1.0, 1.0), PAGE),
            Err(RegistryError::NotFound(ghost))
        );
        assert_eq!(registry.remove(ghost), Err(RegistryError::NotFound(ghost)));
        assert_eq!(registry, before);
    }

    #[test]
    fn kind_replacement_must_keep_type() {
        let mut registry = ElementRegistry::new();
        let id = registry.add(ElementType::Image, 1, ScreenPoint::new(0.0, 0.0), PAGE);

        let result = registry.update(
            id,
            ElementPatch {
                kind: Some(ElementType::Video.default_kind(0)),
                ..ElementPatch::default()
            },
            PAGE,
        );

        assert!(matches!(result, Err(RegistryError::KindMismatch { .. })));
    }

    #[test]
    fn block_orders_stay_contiguous_on_remove() {
        let mut registry = ElementRegistry::new();
        let first = registry.add(ElementType::Heading, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        let second = registry.add(ElementType::Table, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        let third = registry.add(ElementType::Video, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        let other_page = registry.add(ElementType::Heading, 2, ScreenPoint::new(0.0, 0.0), PAGE);

        assert_eq!(registry.get(third).and_then(|e| e.kind.block_order()), Some(2));
        assert_eq!(registry.get(other_page).and_then(|e| e.kind.block_order()), Some(0));

        registry.remove(first).expect("remove succeeds");

        assert_eq!(registry.get(second).and_then(|e| e.kind.block_order()), Some(0));
        assert_eq!(registry.get(third).and_then(|e| e.kind.block_order()), Some(1));
    }

    #[test]
    fn set_block_order_moves_block_and_renumbers_the_rest() {
        let mut registry = ElementRegistry::new();
        let a = registry.add(ElementType::Heading, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        let b = registry.add(ElementType::ImageBlock, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        let c = registry.add(ElementType::Table, 1, ScreenPoint::new(0.0, 0.0), PAGE);

        registry.set_block_order(c, 0).expect("reorder succeeds");

        let order: Vec<ElementId> = registry.blocks_on_page(1).iter().map(|e| e.id).collect();
        assert_eq!(order, vec![c, a, b]);

        let text = registry.add(ElementType::Text, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        assert_eq!(registry.set_block_order(text, 0), Err(RegistryError::NotABlock(text)));
    }

    #[test]
    fn renumber_reports_orphans_without_touching_them() {
        let mut registry = ElementRegistry::new();
        let keep = registry.add(ElementType::Text, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        let orphan = registry.add(ElementType::Text, 2, ScreenPoint::new(0.0, 0.0), PAGE);

        let orphans = registry.renumber_pages(|page| if page == 2 { None } else { Some(page + 4) });

        assert_eq!(orphans, vec![orphan]);
        assert_eq!(registry.get(keep).map(|e| e.page), Some(5));
        assert_eq!(registry.get(orphan).map(|e| e.page), Some(2));
    }

    #[test]
    fn list_by_page_filters() {
        let mut registry = ElementRegistry::new();
        registry.add(ElementType::Text, 1, ScreenPoint::new(0.0, 0.0), PAGE);
        registry.add(ElementType::Date, 2, ScreenPoint::new(0.0, 0.0), PAGE);
        registry.add(ElementType::Initials, 2, ScreenPoint::new(0.0, 0.0), PAGE);

        assert_eq!(registry.list_by_page(1).len(), 1);
        assert_eq!(registry.list_by_page(2).len(), 2);
        assert!(registry.list_by_page(3).is_empty());
    }
}
