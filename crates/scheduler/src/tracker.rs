//! One in-flight render per page.

use crate::CancellationToken;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Identifies one started render.
#[derive(Debug, Clone)]
pub struct RenderTicket {
    pub page_number: u32,
    pub id: u64,
    pub token: CancellationToken,
}

/// Tracks the latest render started for each page.
///
/// Starting a render for a page cancels the one already running for it.
/// Clones share the same table.
///
/// # Example
///
/// ```
/// use stampwork_scheduler::PageRenderTracker;
///
/// let tracker = PageRenderTracker::new();
/// let first = tracker.begin(3);
/// let second = tracker.begin(3);
///
/// assert!(first.token.is_cancelled());
/// assert!(!tracker.finish(&first));
/// assert!(tracker.finish(&second));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PageRenderTracker {
    next_id: Arc<AtomicU64>,
    in_flight: Arc<Mutex<HashMap<u32, RenderTicket>>>,
}

impl PageRenderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new render for `page_number`, cancelling the previous one.
    pub fn begin(&self, page_number: u32) -> RenderTicket {
        let ticket = RenderTicket {
            page_number,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };

        if let Some(previous) = self.table().insert(page_number, ticket.clone()) {
            log::debug!("page {page_number}: superseding render {}", previous.id);
            previous.token.cancel();
        }
        ticket
    }

    /// Clears the page entry if it still belongs to `ticket`. Returns whether
    /// it did; a newer render for the page is left alone.
    pub fn finish(&self, ticket: &RenderTicket) -> bool {
        let mut table = self.table();
        match table.get(&ticket.page_number) {
            Some(current) if current.id == ticket.id => {
                table.remove(&ticket.page_number);
                true
            }
            _ => false,
        }
    }

    pub fn is_current(&self, ticket: &RenderTicket) -> bool {
        self.table().get(&ticket.page_number).is_some_and(|current| current.id == ticket.id)
    }

    pub fn cancel_page(&self, page_number: u32) -> bool {
        match self.table().remove(&page_number) {
            Some(ticket) => {
                ticket.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every in-flight render. Returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let mut table = self.table();
        let count = table.len();
        for (_, ticket) in table.drain() {
            ticket.token.cancel();
        }
        count
    }

    pub fn in_flight(&self) -> usize {
        self.table().len()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u32, RenderTicket>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
