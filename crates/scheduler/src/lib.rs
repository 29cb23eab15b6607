//! Cancellable background rendering for page previews.
//!
//! Each page has at most one render in flight. Starting a new render for a
//! page cancels the previous one through its [`CancellationToken`], and
//! renders that were cancelled never produce an outcome.
//!
//! # Example
//!
//! ```
//! use stampwork_scheduler::PageRenderTracker;
//!
//! let tracker = PageRenderTracker::new();
//!
//! // User zooms: the first render is superseded by the second.
//! let stale = tracker.begin(1);
//! let fresh = tracker.begin(1);
//! assert!(stale.token.is_cancelled());
//!
//! // Only the newest render clears the page entry.
//! assert!(!tracker.finish(&stale));
//! assert!(tracker.finish(&fresh));
//! ```

mod cancel;
mod tracker;
mod worker;

pub use cancel::{CancellationToken, Interrupted};
pub use tracker::{PageRenderTracker, RenderTicket};
pub use worker::{RenderOutcome, RenderRequest, RenderWorker};
