//! Document snapshot and the copy-on-write state holder.

use crate::element::{ElementId, ElementKind, ElementPatch, ElementType, OverlayElement};
use crate::geometry::{PageGeometry, PageTransform, ScreenPoint, ScreenSize, TargetSize};
use crate::registry::{ElementRegistry, RegistryError};
use crate::structure::{apply_structure_edit, StructureEdit, StructureEditError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A broken snapshot invariant.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("snapshot has no pages")]
    NoPages,
    #[error("page geometry numbers {found:?} do not cover 1..={total_pages}")]
    GeometryMismatch { total_pages: u32, found: Vec<u32> },
    #[error("element {id} is on page {page} but the document has {total_pages} pages")]
    ElementOutOfRange {
        id: ElementId,
        page: u32,
        total_pages: u32,
    },
    #[error("element id {0} is used more than once")]
    DuplicateId(ElementId),
    #[error("block orders on page {page} are {orders:?}, expected 0..{}", .orders.len())]
    BlockOrderGap { page: u32, orders: Vec<u32> },
}

/// Everything the editor knows about the document's pages and overlays.
///
/// Snapshots are values: edits produce a new snapshot and leave the old one
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub(crate) total_pages: u32,
    /// Sorted by page number.
    pub(crate) page_geometry: Vec<PageGeometry>,
    pub(crate) elements: ElementRegistry,
}

impl Snapshot {
    /// One geometry entry per page size, numbered from 1.
    pub fn new(page_sizes: &[ScreenSize]) -> Result<Self, InvariantViolation> {
        if page_sizes.is_empty() {
            return Err(InvariantViolation::NoPages);
        }

        let page_geometry = page_sizes
            .iter()
            .enumerate()
            .map(|(index, size)| PageGeometry::new(index as u32 + 1, *size))
            .collect();

        Ok(Self {
            total_pages: page_sizes.len() as u32,
            page_geometry,
            elements: ElementRegistry::new(),
        })
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn page_geometry(&self) -> &[PageGeometry] {
        &self.page_geometry
    }

    pub fn geometry(&self, page: u32) -> Option<&PageGeometry> {
        self.page_geometry.iter().find(|entry| entry.page_number == page)
    }

    pub fn elements(&self) -> &ElementRegistry {
        &self.elements
    }

    pub fn element(&self, id: ElementId) -> Option<&OverlayElement> {
        self.elements.get(id)
    }

    /// Transform for `page` given the document's native size of that page.
    pub fn transform(&self, page: u32, target: TargetSize) -> Option<PageTransform> {
        self.geometry(page).map(|geometry| PageTransform::new(*geometry, target))
    }

    pub fn add_element(
        &self,
        element_type: ElementType,
        page: u32,
        anchor: ScreenPoint,
    ) -> Result<(Self, ElementId), StructureEditError> {
        self.add_element_kind(element_type.default_kind(0), page, anchor)
    }

    pub fn add_element_kind(
        &self,
        kind: ElementKind,
        page: u32,
        anchor: ScreenPoint,
    ) -> Result<(Self, ElementId), StructureEditError> {
        let geometry = *self
            .geometry(page)
            .ok_or(StructureEditError::InvalidPage {
                page,
                total_pages: self.total_pages,
            })?;

        let mut next = self.clone();
        let id = next.elements.add_kind(kind, page, anchor, geometry.size());
        Ok((next, id))
    }

    /// Updates non-structural fields. Unknown ids report `NotFound` and
    /// leave the snapshot as it was.
    pub fn update_element(
        &self,
        id: ElementId,
        patch: ElementPatch,
    ) -> Result<Self, RegistryError> {
        let page_size = self.page_size_of(id)?;
        let mut next = self.clone();
        next.elements.update(id, patch, page_size)?;
        Ok(next)
    }

    pub fn remove_element(&self, id: ElementId) -> Result<Self, RegistryError> {
        let mut next = self.clone();
        next.elements.remove(id)?;
        Ok(next)
    }

    pub fn set_block_order(&self, id: ElementId, order: u32) -> Result<Self, RegistryError> {
        let mut next = self.clone();
        next.elements.set_block_order(id, order)?;
        Ok(next)
    }

    fn page_size_of(&self, id: ElementId) -> Result<ScreenSize, RegistryError> {
        let element = self.elements.get(id).ok_or(RegistryError::NotFound(id))?;
        Ok(self
            .geometry(element.page)
            .map(PageGeometry::size)
            .unwrap_or(ScreenSize::new(f64::MAX, f64::MAX)))
    }

    /// Checks every snapshot invariant.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        if self.total_pages == 0 {
            return Err(InvariantViolation::NoPages);
        }

        let found: Vec<u32> = self.page_geometry.iter().map(|entry| entry.page_number).collect();
        if !found.iter().copied().eq(1..=self.total_pages) {
            return Err(InvariantViolation::GeometryMismatch {
                total_pages: self.total_pages,
                found,
            });
        }

        let mut seen = std::collections::HashSet::new();
        let mut block_orders: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

        for element in self.elements.iter() {
            if element.page < 1 || element.page > self.total_pages {
                return Err(InvariantViolation::ElementOutOfRange {
                    id: element.id,
                    page: element.page,
                    total_pages: self.total_pages,
                });
            }
            if !seen.insert(element.id) {
                return Err(InvariantViolation::DuplicateId(element.id));
            }
            if let Some(order) = element.kind.block_order() {
                block_orders.entry(element.page).or_default().push(order);
            }
        }

        for (page, mut orders) in block_orders {
            orders.sort_unstable();
            if !orders.iter().copied().eq(0..orders.len() as u32) {
                return Err(InvariantViolation::BlockOrderGap { page, orders });
            }
        }

        Ok(())
    }
}

/// Holds the current snapshot behind an `Arc`.
///
/// Every committed change swaps in a new `Arc`; readers that cloned the
/// previous one keep a consistent view.
#[derive(Debug, Clone)]
pub struct EditorState {
    current: Arc<Snapshot>,
}

impl EditorState {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            current: Arc::new(snapshot),
        }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current)
    }

    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Applies a structural edit; on error nothing changes.
    pub fn apply(&mut self, edit: StructureEdit) -> Result<(), StructureEditError> {
        let next = apply_structure_edit(&self.current, edit)?;
        self.replace(next);
        Ok(())
    }

    /// Computes a structural edit without committing it, so the caller can
    /// mirror it elsewhere first.
    pub fn stage(&self, edit: StructureEdit) -> Result<StagedEdit, StructureEditError> {
        let next = apply_structure_edit(&self.current, edit)?;
        Ok(StagedEdit {
            base: Arc::clone(&self.current),
            next,
        })
    }

    /// Commits a staged edit. Fails with [`StructureEditError::Stale`] if the
    /// state changed since the edit was staged.
    pub fn commit(&mut self, staged: StagedEdit) -> Result<(), StructureEditError> {
        if !Arc::ptr_eq(&staged.base, &self.current) {
            return Err(StructureEditError::Stale);
        }
        self.replace(staged.next);
        Ok(())
    }

    fn replace(&mut self, next: Snapshot) {
        self.current = Arc::new(next);
    }

    pub fn add_element(
        &mut self,
        element_type: ElementType,
        page: u32,
        anchor: ScreenPoint,
    ) -> Result<ElementId, StructureEditError> {
        let (next, id) = self.current.add_element(element_type, page, anchor)?;
        self.replace(next);
        Ok(id)
    }

    pub fn add_element_kind(
        &mut self,
        kind: ElementKind,
        page: u32,
        anchor: ScreenPoint,
    ) -> Result<ElementId, StructureEditError> {
        let (next, id) = self.current.add_element_kind(kind, page, anchor)?;
        self.replace(next);
        Ok(id)
    }

    pub fn update_element(
        &mut self,
        id: ElementId,
        patch: ElementPatch,
    ) -> Result<(), RegistryError> {
        let next = self.current.update_element(id, patch)?;
        self.replace(next);
        Ok(())
    }

    pub fn remove_element(&mut self, id: ElementId) -> Result<(), RegistryError> {
        let next = self.current.remove_element(id)?;
        self.replace(next);
        Ok(())
    }

    pub fn set_block_order(&mut self, id: ElementId, order: u32) -> Result<(), RegistryError> {
        let next = self.current.set_block_order(id, order)?;
        self.replace(next);
        Ok(())
    }
}

/// A structural edit computed against one snapshot, waiting to be committed.
#[derive(Debug, Clone)]
pub struct StagedEdit {
    base: Arc<Snapshot>,
    next: Snapshot,
}

impl StagedEdit {
    /// The snapshot the edit will produce.
    pub fn snapshot(&self) -> &Snapshot {
        &self.next
    }
}
