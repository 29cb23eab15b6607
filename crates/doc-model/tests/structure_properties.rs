//! Property tests for structural edits.
//!
//! 1. Every successful edit yields a snapshot that passes `validate`.
//! 2. Inserting a page and deleting it again restores the snapshot.
//! 3. Reordering a page onto itself changes nothing.
//! 4. Deleting a page removes exactly the elements on it.
//! 5. Failed edits leave the editor state untouched.

use doc_model::{
    apply_structure_edit, EditorState, ElementType, ScreenPoint, ScreenSize, Snapshot,
    StructureEdit,
};
use proptest::prelude::*;
use std::sync::Arc;

// ── Helpers ─────────────────────────────────────────────────────────────

fn size_strategy() -> impl Strategy<Value = ScreenSize> {
    (100u32..=1600, 100u32..=1600).prop_map(|(w, h)| ScreenSize::new(w as f64, h as f64))
}

fn type_strategy() -> impl Strategy<Value = ElementType> {
    proptest::sample::select(ElementType::ALL.to_vec())
}

/// Page sizes plus a list of `(type, page seed, x, y)` placements.
fn snapshot_strategy() -> impl Strategy<Value = Snapshot> {
    (
        proptest::collection::vec(size_strategy(), 1..=6),
        proptest::collection::vec((type_strategy(), any::<u32>(), 0u32..1600, 0u32..1600), 0..12),
    )
        .prop_map(|(sizes, placements)| {
            let mut snapshot = Snapshot::new(&sizes).expect("at least one page");
            for (element_type, seed, x, y) in placements {
                let page = seed % snapshot.total_pages() + 1;
                let anchor = ScreenPoint::new(x as f64, y as f64);
                let (next, _) =
                    snapshot.add_element(element_type, page, anchor).expect("page exists");
                snapshot = next;
            }
            snapshot
        })
}

fn edit_strategy() -> impl Strategy<Value = StructureEdit> {
    prop_oneof![
        (0u32..8, size_strategy())
            .prop_map(|(after_page, size)| StructureEdit::InsertBlankPage { after_page, size }),
        (0u32..8, proptest::collection::vec(size_strategy(), 0..3))
            .prop_map(|(after_page, sizes)| StructureEdit::InsertCopiedPages { after_page, sizes }),
        (0u32..8).prop_map(|page| StructureEdit::DeletePage { page }),
        (0u32..8, 0u32..8).prop_map(|(source_index, dest_index)| StructureEdit::ReorderPage {
            source_index,
            dest_index
        }),
        (0u32..8, size_strategy())
            .prop_map(|(page, size)| StructureEdit::RecordPageGeometry { page, size }),
    ]
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Edits preserve snapshot invariants
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn edits_preserve_invariants(
        snapshot in snapshot_strategy(),
        edits in proptest::collection::vec(edit_strategy(), 1..10),
    ) {
        prop_assert_eq!(snapshot.validate(), Ok(()));
        let mut current = snapshot;
        for edit in edits {
            if let Ok(next) = apply_structure_edit(&current, edit.clone()) {
                prop_assert_eq!(next.validate(), Ok(()), "after {:?}", edit);
                current = next;
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Insert then delete is the identity
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn insert_then_delete_is_identity(
        snapshot in snapshot_strategy(),
        seed in any::<u32>(),
        size in size_strategy(),
    ) {
        let after_page = seed % (snapshot.total_pages() + 1);
        let inserted = apply_structure_edit(
            &snapshot,
            StructureEdit::InsertBlankPage { after_page, size },
        )
        .expect("insert within range");
        let delete = StructureEdit::DeletePage {
            page: after_page + 1,
        };
        let restored = apply_structure_edit(&inserted, delete).expect("delete inserted page");

        prop_assert_eq!(restored, snapshot);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Reorder onto itself is a no-op
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn reorder_onto_self_is_noop(snapshot in snapshot_strategy(), seed in any::<u32>()) {
        let index = seed % snapshot.total_pages();
        let next = apply_structure_edit(
            &snapshot,
            StructureEdit::ReorderPage {
                source_index: index,
                dest_index: index,
            },
        )
        .expect("valid index");

        prop_assert_eq!(next, snapshot);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Delete removes exactly the elements of that page
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn delete_drops_only_that_page(snapshot in snapshot_strategy(), seed in any::<u32>()) {
        prop_assume!(snapshot.total_pages() > 1);
        let page = seed % snapshot.total_pages() + 1;

        let next = apply_structure_edit(&snapshot, StructureEdit::DeletePage { page })
            .expect("delete");

        for element in snapshot.elements().iter() {
            match next.element(element.id) {
                None => prop_assert_eq!(element.page, page),
                Some(moved) => {
                    let expected = if element.page > page {
                        element.page - 1
                    } else {
                        element.page
                    };
                    prop_assert_eq!(moved.page, expected);
                    prop_assert_eq!(moved.rect(), element.rect());
                }
            }
        }
        prop_assert_eq!(
            next.elements().len(),
            snapshot.elements().iter().filter(|element| element.page != page).count()
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Failed edits commit nothing
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn failed_edit_keeps_state(snapshot in snapshot_strategy(), edit in edit_strategy()) {
        let mut state = EditorState::new(snapshot);
        let before = state.snapshot();

        if state.apply(edit).is_err() {
            prop_assert!(Arc::ptr_eq(&before, &state.snapshot()));
        } else {
            prop_assert!(!Arc::ptr_eq(&before, &state.snapshot()));
        }
    }
}
