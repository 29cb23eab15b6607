//! A loaded document together with its overlay snapshot.
//!
//! Structural edits touch both: the snapshot through the structure editor
//! and the document through [`PageDocument`]. Both new values are computed
//! first and swapped in together, so a failure leaves the session as it was.

use crate::flatten::{ExportError, ExportFlattener, FlattenReport};
use doc_model::{
    EditorState, ElementId, ElementKind, ElementPatch, ElementType,
    InvariantViolation, RegistryError, ScreenPoint, ScreenSize, Snapshot, StructureEdit,
    StructureEditError,
};
use pdf_engine::{LopdfDocument, PageDocument, PageSize, PageSource, PdfEngineError};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to load document: {0}")]
    Load(#[source] PdfEngineError),
    #[error(transparent)]
    Structure(#[from] StructureEditError),
    #[error(transparent)]
    Document(#[from] PdfEngineError),
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] InvariantViolation),
    #[error("snapshot has {snapshot} pages but the document has {document}")]
    PageCountMismatch { snapshot: u32, document: u32 },
    #[error("preview scale must be positive and finite, got {0}")]
    InvalidScale(f64),
}

pub struct EditorSession<D: PageDocument> {
    document: D,
    state: EditorState,
    preview_scale: f64,
    flattener: ExportFlattener,
}

impl EditorSession<LopdfDocument> {
    /// Parses `bytes` and records every page at native size times
    /// `preview_scale`.
    pub fn load(bytes: &[u8], preview_scale: f64) -> Result<Self, SessionError> {
        let document = LopdfDocument::load(bytes).map_err(SessionError::Load)?;
        Self::from_document(document, preview_scale)
    }
}

impl<D: PageDocument + Clone> EditorSession<D> {
    pub fn from_document(document: D, preview_scale: f64) -> Result<Self, SessionError> {
        check_scale(preview_scale)?;
        let sizes = (0..document.page_count())
            .map(|index| document.page_size(index).map(|size| screen_size(size, preview_scale)))
            .collect::<Result<Vec<_>, _>>()?;
        let snapshot = Snapshot::new(&sizes)?;

        log::debug!("session opened with {} pages at scale {preview_scale}", sizes.len());
        Ok(Self::assemble(document, snapshot, preview_scale))
    }

    /// Resumes a stored snapshot against its document.
    pub fn with_snapshot(
        document: D,
        snapshot: Snapshot,
        preview_scale: f64,
    ) -> Result<Self, SessionError> {
        check_scale(preview_scale)?;
        snapshot.validate()?;
        if snapshot.total_pages() != document.page_count() {
            return Err(SessionError::PageCountMismatch {
                snapshot: snapshot.total_pages(),
                document: document.page_count(),
            });
        }
        Ok(Self::assemble(document, snapshot, preview_scale))
    }

    fn assemble(document: D, snapshot: Snapshot, preview_scale: f64) -> Self {
        Self {
            document,
            state: EditorState::new(snapshot),
            preview_scale,
            flattener: ExportFlattener::default(),
        }
    }

    pub fn with_flattener(mut self, flattener: ExportFlattener) -> Self {
        self.flattener = flattener;
        self
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.state.snapshot()
    }

    pub fn current(&self) -> &Snapshot {
        self.state.current()
    }

    pub fn preview_scale(&self) -> f64 {
        self.preview_scale
    }

    pub fn insert_blank_page(
        &mut self,
        after_page: u32,
        size: PageSize,
    ) -> Result<(), SessionError> {
        let edit = StructureEdit::InsertBlankPage {
            after_page,
            size: screen_size(size, self.preview_scale),
        };
        self.commit(edit, |document| document.insert_page(after_page, PageSource::Blank(size)))
    }

    /// Copies `indices` (0-based) out of `source` and inserts them after
    /// `after_page`, in order.
    pub fn insert_copied_pages(
        &mut self,
        after_page: u32,
        source: &D,
        indices: &[u32],
    ) -> Result<(), SessionError> {
        let copies = self.document.copy_pages(source, indices)?;
        let sizes = copies
            .iter()
            .map(|page| screen_size(D::copied_page_size(page), self.preview_scale))
            .collect();

        self.commit(StructureEdit::InsertCopiedPages { after_page, sizes }, |document| {
            for (offset, page) in (0u32..).zip(copies) {
                document.insert_page(after_page + offset, PageSource::Copied(page))?;
            }
            Ok(())
        })
    }

    pub fn delete_page(&mut self, page: u32) -> Result<(), SessionError> {
        self.commit(StructureEdit::DeletePage { page }, |document| document.remove_page(page - 1))
    }

    /// Moves the page at `source_index` so it ends up at `dest_index`
    /// (both 0-based). The document keeps the same page object, so links and
    /// form fields that point at it stay valid.
    pub fn reorder_page(&mut self, source_index: u32, dest_index: u32) -> Result<(), SessionError> {
        let edit = StructureEdit::ReorderPage {
            source_index,
            dest_index,
        };
        self.commit(edit, |document| {
            if source_index == dest_index {
                return Ok(());
            }
            document.move_page(source_index, dest_index)
        })
    }

    /// The page was re-rendered at a new on-screen size.
    pub fn record_page_geometry(
        &mut self,
        page: u32,
        size: ScreenSize,
    ) -> Result<(), SessionError> {
        self.state.apply(StructureEdit::RecordPageGeometry { page, size })?;
        Ok(())
    }

    pub fn add_element(
        &mut self,
        element_type: ElementType,
        page: u32,
        anchor: ScreenPoint,
    ) -> Result<ElementId, SessionError> {
        Ok(self.state.add_element(element_type, page, anchor)?)
    }

    pub fn add_element_kind(
        &mut self,
        kind: ElementKind,
        page: u32,
        anchor: ScreenPoint,
    ) -> Result<ElementId, SessionError> {
        Ok(self.state.add_element_kind(kind, page, anchor)?)
    }

    pub fn update_element(
        &mut self,
        id: ElementId,
        patch: ElementPatch,
    ) -> Result<(), RegistryError> {
        self.state.update_element(id, patch)
    }

    pub fn remove_element(&mut self, id: ElementId) -> Result<(), RegistryError> {
        self.state.remove_element(id)
    }

    pub fn set_block_order(&mut self, id: ElementId, order: u32) -> Result<(), RegistryError> {
        self.state.set_block_order(id, order)
    }

    /// Flattens a copy of the document; the session stays editable.
    pub fn export(&self) -> Result<Vec<u8>, ExportError> {
        self.export_with_report().map(|(bytes, _)| bytes)
    }

    pub fn export_with_report(&self) -> Result<(Vec<u8>, FlattenReport), ExportError> {
        let mut document = self.document.clone();
        self.flattener.flatten_with_report(self.state.current(), &mut document)
    }

    fn commit(
        &mut self,
        edit: StructureEdit,
        mutate: impl FnOnce(&mut D) -> Result<(), PdfEngineError>,
    ) -> Result<(), SessionError> {
        let staged = self.state.stage(edit)?;
        let mut document = self.document.clone();
        mutate(&mut document)?;

        let total_pages = staged.snapshot().total_pages();
        if total_pages != document.page_count() {
            return Err(SessionError::PageCountMismatch {
                snapshot: total_pages,
                document: document.page_count(),
            });
        }

        self.state.commit(staged)?;
        self.document = document;
        Ok(())
    }
}

fn check_scale(preview_scale: f64) -> Result<(), SessionError> {
    if preview_scale.is_finite() && preview_scale > 0.0 {
        Ok(())
    } else {
        Err(SessionError::InvalidScale(preview_scale))
    }
}

fn screen_size(size: PageSize, preview_scale: f64) -> ScreenSize {
    ScreenSize::new(
        f64::from(size.width_pt) * preview_scale,
        f64::from(size.height_pt) * preview_scale,
    )
}
