//! Stampwork core: export flattening and the editing session.
//!
//! [`ExportFlattener`] burns a [`Snapshot`](doc_model::Snapshot) into a
//! document. [`EditorSession`] keeps a loaded document and its snapshot in
//! step across structural edits. [`spawn_preview_worker`] renders page
//! previews off the editing thread.

pub mod flatten;
pub mod image_data;
pub mod preview;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use flatten::{
    clamp_to_target, fit_centered, flatten, ExportError, ExportFlattener, FlattenOptions,
    FlattenReport,
};
pub use image_data::{decode_data_url, encode_data_url, DecodedImage, ImageDataError};
pub use preview::spawn_preview_worker;
pub use session::{EditorSession, SessionError};
pub use stampwork_scheduler::{
    CancellationToken, PageRenderTracker, RenderOutcome, RenderRequest, RenderWorker,
};
