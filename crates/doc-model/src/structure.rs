//! Page structure editor.
//!
//! Structural edits (insert, delete, reorder) are the only transitions that
//! change the page count, the page geometry table or an element's page. Each
//! one reads the pre-edit snapshot, computes a single old-page -> new-page
//! mapping from it and builds a fresh snapshot; the input is never modified.

use crate::element::ElementKind;
use crate::geometry::{PageGeometry, ScreenSize};
use crate::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StructureEditError {
    #[error("cannot delete the last remaining page")]
    CannotDeleteLastPage,
    #[error("page {page} is out of range (document has {total_pages} pages)")]
    InvalidPage { page: u32, total_pages: u32 },
    #[error("page index {index} is out of range (document has {total_pages} pages)")]
    InvalidIndex { index: u32, total_pages: u32 },
    #[error("no pages to insert")]
    EmptyInsert,
    #[error("invalid page size {width}x{height}")]
    InvalidGeometry { width: f64, height: f64 },
    #[error("edit was staged against a snapshot that is no longer current")]
    Stale,
}

/// A structural edit command.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureEdit {
    /// Inserts one blank page so that it becomes `after_page + 1`.
    /// `after_page == 0` inserts at the front.
    InsertBlankPage { after_page: u32, size: ScreenSize },
    /// Inserts pages copied from another document after `after_page`, one
    /// screen size per copied page.
    InsertCopiedPages {
        after_page: u32,
        sizes: Vec<ScreenSize>,
    },
    DeletePage { page: u32 },
    /// Moves the page at 0-based `source_index` to `dest_index`.
    ReorderPage { source_index: u32, dest_index: u32 },
    /// Records a new on-screen size for `page` and rescales its elements.
    RecordPageGeometry { page: u32, size: ScreenSize },
}

/// Computes the snapshot that results from `edit`.
pub fn apply_structure_edit(
    snapshot: &Snapshot,
    edit: StructureEdit,
) -> Result<Snapshot, StructureEditError> {
    let next = match &edit {
        StructureEdit::InsertBlankPage { after_page, size } => {
            insert_pages(snapshot, *after_page, std::slice::from_ref(size))?
        }
        StructureEdit::InsertCopiedPages { after_page, sizes } => {
            insert_pages(snapshot, *after_page, sizes)?
        }
        StructureEdit::DeletePage { page } => delete_page(snapshot, *page)?,
        StructureEdit::ReorderPage {
            source_index,
            dest_index,
        } => reorder_page(snapshot, *source_index, *dest_index)?,
        StructureEdit::RecordPageGeometry { page, size } => {
            record_page_geometry(snapshot, *page, *size)?
        }
    };

    debug_assert_eq!(next.validate(), Ok(()));
    log::debug!("{edit:?}: {} -> {} pages", snapshot.total_pages, next.total_pages);
    Ok(next)
}

/// Where page `page` lands when `source_page` is moved to `dest_page`
/// (both 1-based).
///
/// Moving forward closes the gap from above: pages in
/// `source_page < p <= dest_page` move down one. Moving backward opens it from
/// below: pages in `dest_page <= p < source_page` move up one.
pub fn reordered_page(page: u32, source_page: u32, dest_page: u32) -> u32 {
    if page == source_page {
        dest_page
    } else if source_page < dest_page && page > source_page && page <= dest_page {
        page - 1
    } else if source_page > dest_page && page >= dest_page && page < source_page {
        page + 1
    } else {
        page
    }
}

fn insert_pages(
    snapshot: &Snapshot,
    after_page: u32,
    sizes: &[ScreenSize],
) -> Result<Snapshot, StructureEditError> {
    if after_page > snapshot.total_pages {
        return Err(StructureEditError::InvalidPage {
            page: after_page,
            total_pages: snapshot.total_pages,
        });
    }
    if sizes.is_empty() {
        return Err(StructureEditError::EmptyInsert);
    }
    if let Some(size) = sizes.iter().find(|size| !size.is_valid()) {
        return Err(StructureEditError::InvalidGeometry {
            width: size.width,
            height: size.height,
        });
    }

    let count = sizes.len() as u32;
    let mut next = remap(snapshot, snapshot.total_pages + count, |page| {
        Some(if page > after_page { page + count } else { page })
    });

    next.page_geometry.extend(
        sizes
            .iter()
            .zip(after_page + 1..)
            .map(|(size, page_number)| PageGeometry::new(page_number, *size)),
    );
    next.page_geometry.sort_by_key(|entry| entry.page_number);

    Ok(next)
}

fn delete_page(snapshot: &Snapshot, page: u32) -> Result<Snapshot, StructureEditError> {
    if snapshot.total_pages == 1 {
        return Err(StructureEditError::CannotDeleteLastPage);
    }
    check_page(snapshot, page)?;

    Ok(remap(snapshot, snapshot.total_pages - 1, |candidate| {
        if candidate == page {
            None
        } else if candidate > page {
            Some(candidate - 1)
        } else {
            Some(candidate)
        }
    }))
}

fn reorder_page(
    snapshot: &Snapshot,
    source_index: u32,
    dest_index: u32,
) -> Result<Snapshot, StructureEditError> {
    for index in [source_index, dest_index] {
        if index >= snapshot.total_pages {
            return Err(StructureEditError::InvalidIndex {
                index,
                total_pages: snapshot.total_pages,
            });
        }
    }

    if source_index == dest_index {
        return Ok(snapshot.clone());
    }

    let (source_page, dest_page) = (source_index + 1, dest_index + 1);
    Ok(remap(snapshot, snapshot.total_pages, |page| {
        Some(reordered_page(page, source_page, dest_page))
    }))
}

fn record_page_geometry(
    snapshot: &Snapshot,
    page: u32,
    size: ScreenSize,
) -> Result<Snapshot, StructureEditError> {
    check_page(snapshot, page)?;
    if !size.is_valid() {
        return Err(StructureEditError::InvalidGeometry {
            width: size.width,
            height: size.height,
        });
    }

    let mut next = snapshot.clone();
    let Some(entry) = next.page_geometry.iter_mut().find(|entry| entry.page_number == page) else {
        return Err(StructureEditError::InvalidPage {
            page,
            total_pages: snapshot.total_pages,
        });
    };

    let sx = size.width / entry.screen_width;
    let sy = size.height / entry.screen_height;
    *entry = PageGeometry::new(page, size);

    if sx == 1.0 && sy == 1.0 {
        return Ok(next);
    }

    let font_scale = sx.min(sy);
    for element in next.elements.elements_mut().filter(|element| element.page == page) {
        element.x *= sx;
        element.y *= sy;
        element.width *= sx;
        element.height *= sy;

        match &mut element.kind {
            ElementKind::Text(props) => props.font_size *= font_scale,
            ElementKind::TextField(props) => props.font_size *= font_scale,
            _ => {}
        }
    }

    Ok(next)
}

fn check_page(snapshot: &Snapshot, page: u32) -> Result<(), StructureEditError> {
    if page == 0 || page > snapshot.total_pages {
        return Err(StructureEditError::InvalidPage {
            page,
            total_pages: snapshot.total_pages,
        });
    }
    Ok(())
}

/// Builds the post-edit snapshot from the pre-edit one through `mapping`.
/// Geometry and elements whose page maps to `None` are dropped.
fn remap(snapshot: &Snapshot, total_pages: u32, mapping: impl Fn(u32) -> Option<u32>) -> Snapshot {
    let mut page_geometry: Vec<PageGeometry> = snapshot
        .page_geometry
        .iter()
        .filter_map(|entry| {
            mapping(entry.page_number).map(|page_number| PageGeometry {
                page_number,
                ..*entry
            })
        })
        .collect();
    page_geometry.sort_by_key(|entry| entry.page_number);

    let mut elements = snapshot.elements.clone();
    let orphaned = elements.renumber_pages(&mapping);
    if !orphaned.is_empty() {
        log::debug!("dropping {} elements on removed pages", orphaned.len());
        elements.discard(&orphaned);
    }

    Snapshot {
        total_pages,
        page_geometry,
        elements,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementId, ElementType, TextProps};
    use crate::geometry::ScreenPoint;

    fn pages(sizes: &[(f64, f64)]) -> Snapshot {
        let sizes: Vec<ScreenSize> = sizes.iter().map(|(w, h)| ScreenSize::new(*w, *h)).collect();
        Snapshot::new(&sizes).expect("snapshot")
    }

    fn with_element(snapshot: Snapshot, page: u32) -> (Snapshot, ElementId) {
        snapshot.add_element(ElementType::Text, page, ScreenPoint::new(10.0, 10.0)).expect("add")
    }

    fn page_of(snapshot: &Snapshot, id: ElementId) -> Option<u32> {
        snapshot.element(id).map(|element| element.page)
    }

    fn geometry_numbers(snapshot: &Snapshot) -> Vec<u32> {
        snapshot.page_geometry().iter().map(|entry| entry.page_number).collect()
    }

    #[test]
    fn insert_blank_page_shifts_later_elements() {
        let (snapshot, e) = with_element(pages(&[(600.0, 800.0), (600.0, 800.0)]), 2);

        let next = apply_structure_edit(
            &snapshot,
            StructureEdit::InsertBlankPage {
                after_page: 1,
                size: ScreenSize::new(500.0, 700.0),
            },
        )
        .expect("insert succeeds");

        assert_eq!(next.total_pages(), 3);
        assert_eq!(page_of(&next, e), Some(3));
        assert_eq!(geometry_numbers(&next), vec![1, 2, 3]);
        assert_eq!(next.geometry(2).map(|g| g.size()), Some(ScreenSize::new(500.0, 700.0)));
        assert_eq!(next.geometry(3).map(|g| g.size()), Some(ScreenSize::new(600.0, 800.0)));
        assert_eq!(page_of(&snapshot, e), Some(2), "input snapshot must not change");
    }

    #[test]
    fn insert_at_front_and_at_end() {
        let (snapshot, e) = with_element(pages(&[(600.0, 800.0)]), 1);

        let front = apply_structure_edit(
            &snapshot,
            StructureEdit::InsertBlankPage {
                after_page: 0,
                size: ScreenSize::new(1.0, 1.0),
            },
        )
        .expect("insert at front");
        assert_eq!(page_of(&front, e), Some(2));

        let end = apply_structure_edit(
            &snapshot,
            StructureEdit::InsertBlankPage {
                after_page: 1,
                size: ScreenSize::new(1.0, 1.0),
            },
        )
        .expect("insert at end");
        assert_eq!(page_of(&end, e), Some(1));
        assert_eq!(end.total_pages(), 2);
    }

    #[test]
    fn insert_copied_pages_shifts_by_count() {
        let (snapshot, e) = with_element(pages(&[(600.0, 800.0), (600.0, 800.0)]), 2);
        let copied = vec![ScreenSize::new(300.0, 400.0), ScreenSize::new(800.0, 600.0)];

        let next = apply_structure_edit(
            &snapshot,
            StructureEdit::InsertCopiedPages {
                after_page: 1,
                sizes: copied.clone(),
            },
        )
        .expect("insert succeeds");

        assert_eq!(next.total_pages(), 4);
        assert_eq!(page_of(&next, e), Some(4));
        assert_eq!(next.geometry(2).map(|g| g.size()), Some(copied[0]));
        assert_eq!(next.geometry(3).map(|g| g.size()), Some(copied[1]));
    }

    #[test]
    fn insert_rejects_bad_input() {
        let snapshot = pages(&[(600.0, 800.0)]);

        assert_eq!(
            apply_structure_edit(
                &snapshot,
                StructureEdit::InsertBlankPage {
                    after_page: 2,
                    size: ScreenSize::new(1.0, 1.0),
                },
            ),
            Err(StructureEditError::InvalidPage {
                page: 2,
                total_pages: 1,
            })
        );
        assert_eq!(
            apply_structure_edit(
                &snapshot,
                StructureEdit::InsertCopiedPages {
                    after_page: 1,
                    sizes: Vec::new(),
                },
            ),
            Err(StructureEditError::EmptyInsert)
        );
        assert!(matches!(
            apply_structure_edit(
                &snapshot,
                StructureEdit::InsertBlankPage {
                    after_page: 1,
                    size: ScreenSize::new(0.0, 1.0),
                },
            ),
            Err(StructureEditError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn delete_page_removes_its_elements_and_shifts_the_rest() {
        let snapshot = pages(&[(600.0, 800.0), (610.0, 810.0), (620.0, 820.0)]);
        let (snapshot, first) = with_element(snapshot, 1);
        let (snapshot, second) = with_element(snapshot, 2);
        let (snapshot, third) = with_element(snapshot, 3);

        let next = apply_structure_edit(&snapshot, StructureEdit::DeletePage { page: 2 })
            .expect("delete succeeds");

        assert_eq!(next.total_pages(), 2);
        assert_eq!(page_of(&next, first), Some(1));
        assert_eq!(page_of(&next, second), None);
        assert_eq!(page_of(&next, third), Some(2));
        assert_eq!(next.geometry(2).map(|g| g.size()), Some(ScreenSize::new(620.0, 820.0)));
        assert_eq!(geometry_numbers(&next), vec![1, 2]);
    }

    #[test]
    fn deleting_last_page_is_rejected() {
        let (snapshot, _) = with_element(pages(&[(600.0, 800.0)]), 1);

        assert_eq!(
            apply_structure_edit(&snapshot, StructureEdit::DeletePage { page: 1 }),
            Err(StructureEditError::CannotDeleteLastPage)
        );
        assert_eq!(
            apply_structure_edit(
                &pages(&[(1.0, 1.0), (1.0, 1.0)]),
                StructureEdit::DeletePage { page: 3 }
            ),
            Err(StructureEditError::InvalidPage {
                page: 3,
                total_pages: 2,
            })
        );
    }

    #[test]
    fn insert_then_delete_restores_snapshot() {
        let snapshot = pages(&[(600.0, 800.0), (612.0, 792.0), (595.0, 842.0)]);
        let (snapshot, _) = with_element(snapshot, 1);
        let (snapshot, _) = with_element(snapshot, 2);
        let (snapshot, _) = with_element(snapshot, 3);

        for after_page in 0..=3 {
            let inserted = apply_structure_edit(
                &snapshot,
                StructureEdit::InsertBlankPage {
                    after_page,
                    size: ScreenSize::new(100.0, 100.0),
                },
            )
            .expect("insert");
            let delete = StructureEdit::DeletePage {
                page: after_page + 1,
            };
            let restored = apply_structure_edit(&inserted, delete).expect("delete");

            assert_eq!(restored, snapshot);
        }
    }

    #[test]
    fn reorder_same_index_is_noop() {
        let (snapshot, _) = with_element(pages(&[(1.0, 1.0), (2.0, 2.0)]), 2);

        for index in 0..2 {
            let next = apply_structure_edit(
                &snapshot,
                StructureEdit::ReorderPage {
                    source_index: index,
                    dest_index: index,
                },
            )
            .expect("reorder");
            assert_eq!(next, snapshot);
        }
    }

    #[test]
    fn reorder_forward_closes_gap_from_above() {
        let snapshot = pages(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)]);
        let mut ids = Vec::new();
        let mut snapshot = snapshot;
        for page in 1..=4 {
            let (next, id) = with_element(snapshot, page);
            snapshot = next;
            ids.push(id);
        }

        // page 1 -> page 3
        let next = apply_structure_edit(
            &snapshot,
            StructureEdit::ReorderPage {
                source_index: 0,
                dest_index: 2,
            },
        )
        .expect("reorder");

        let pages: Vec<Option<u32>> = ids.iter().map(|id| page_of(&next, *id)).collect();
        assert_eq!(pages, vec![Some(3), Some(1), Some(2), Some(4)]);
        assert_eq!(next.geometry(3).map(|g| g.screen_width), Some(1.0));
        assert_eq!(next.geometry(1).map(|g| g.screen_width), Some(2.0));
        assert_eq!(next.geometry(4).map(|g| g.screen_width), Some(4.0));
    }

    #[test]
    fn reorder_backward_opens_gap_from_below() {
        let mut snapshot = pages(&[(1.0, 1.0), (2.0, 2.0), (3.0, 3.0), (4.0, 4.0)]);
        let mut ids = Vec::new();
        for page in 1..=4 {
            let (next, id) = with_element(snapshot, page);
            snapshot = next;
            ids.push(id);
        }

        // page 4 -> page 2
        let next = apply_structure_edit(
            &snapshot,
            StructureEdit::ReorderPage {
                source_index: 3,
                dest_index: 1,
            },
        )
        .expect("reorder");

        let pages: Vec<Option<u32>> = ids.iter().map(|id| page_of(&next, *id)).collect();
        assert_eq!(pages, vec![Some(1), Some(3), Some(4), Some(2)]);
        assert_eq!(next.geometry(2).map(|g| g.screen_width), Some(4.0));
        assert_eq!(next.geometry(3).map(|g| g.screen_width), Some(2.0));
    }

    #[test]
    fn reorder_rejects_out_of_range_index() {
        let snapshot = pages(&[(1.0, 1.0), (2.0, 2.0)]);
        assert_eq!(
            apply_structure_edit(
                &snapshot,
                StructureEdit::ReorderPage {
                    source_index: 0,
                    dest_index: 2,
                },
            ),
            Err(StructureEditError::InvalidIndex {
                index: 2,
                total_pages: 2,
            })
        );
    }

    #[test]
    fn reordered_page_is_a_permutation() {
        for total in 1..=6u32 {
            for source in 1..=total {
                for dest in 1..=total {
                    let mut mapped: Vec<u32> =
                        (1..=total).map(|page| reordered_page(page, source, dest)).collect();
                    assert_eq!(mapped[(source - 1) as usize], dest);
                    mapped.sort_unstable();
                    assert_eq!(mapped, (1..=total).collect::<Vec<_>>());
                }
            }
        }
    }

    #[test]
    fn block_orders_survive_page_moves() {
        let snapshot = pages(&[(600.0, 800.0), (600.0, 800.0)]);
        let (snapshot, heading) = snapshot
            .add_element(ElementType::Heading, 1, ScreenPoint::new(0.0, 0.0))
            .expect("add");
        let (snapshot, table) =
            snapshot.add_element(ElementType::Table, 1, ScreenPoint::new(0.0, 0.0)).expect("add");
        let (snapshot, _) =
            snapshot.add_element(ElementType::Video, 2, ScreenPoint::new(0.0, 0.0)).expect("add");

        let next = apply_structure_edit(
            &snapshot,
            StructureEdit::ReorderPage {
                source_index: 0,
                dest_index: 1,
            },
        )
        .expect("reorder");

        assert_eq!(next.validate(), Ok(()));
        assert_eq!(next.element(heading).and_then(|e| e.kind.block_order()), Some(0));
        assert_eq!(next.element(table).and_then(|e| e.kind.block_order()), Some(1));

        let deleted =
            apply_structure_edit(&next, StructureEdit::DeletePage { page: 1 }).expect("delete");
        assert_eq!(deleted.validate(), Ok(()));
        assert_eq!(deleted.elements().len(), 2);
    }

    #[test]
    fn recording_geometry_rescales_elements_on_that_page() {
        let snapshot = pages(&[(600.0, 800.0), (600.0, 800.0)]);
        let (snapshot, text) = snapshot
            .add_element_kind(
                ElementKind::Text(TextProps {
                    font_size: 20.0,
                    ..TextProps::default()
                }),
                1,
                ScreenPoint::new(60.0, 80.0),
            )
            .expect("add");
        let (snapshot, other) = with_element(snapshot, 2);

        let next = apply_structure_edit(
            &snapshot,
            StructureEdit::RecordPageGeometry {
                page: 1,
                size: ScreenSize::new(1200.0, 1600.0),
            },
        )
        .expect("record");

        let element = next.element(text).expect("element");
        assert_eq!((element.x, element.y), (120.0, 160.0));
        assert_eq!((element.width, element.height), (400.0, 80.0));
        let ElementKind::Text(props) = &element.kind else {
            panic!("expected text");
        };
        assert_eq!(props.font_size, 40.0);
        assert_eq!(next.element(other), snapshot.element(other));
        assert_eq!(next.geometry(1).map(|g| g.size()), Some(ScreenSize::new(1200.0, 1600.0)));
    }
}
