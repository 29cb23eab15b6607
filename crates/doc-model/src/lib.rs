//! Editor document model: overlay elements, page geometry and the structural
//! edits that keep them consistent.

pub mod element;
pub mod geometry;
pub mod registry;
pub mod snapshot;
pub mod structure;

pub use element::{
    parse_hex_color, CheckboxField, DateField, ElementId, ElementKind, ElementPatch, ElementType,
    FontStyle, FontWeight, HeadingBlock, ImageBlock, ImageProps, InitialsField, OverlayElement,
    TableBlock, TextAlign, TextDecoration, TextFieldProps, TextPatch, TextProps, VideoBlock,
};
pub use geometry::{
    to_screen_space, to_target_space, PageGeometry, PageTransform, ScreenPoint, ScreenRect,
    ScreenSize, TargetBox, TargetSize,
};
pub use registry::{clamp_to_page, ElementRegistry, RegistryError};
pub use snapshot::{EditorState, InvariantViolation, Snapshot, StagedEdit};
pub use structure::{apply_structure_edit, reordered_page, StructureEdit, StructureEditError};
