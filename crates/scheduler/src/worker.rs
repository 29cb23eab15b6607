//! Background render worker.
//!
//! Requests are queued to a dedicated thread and results come back over a
//! channel. Every request goes through a [`PageRenderTracker`], so a newer
//! request for a page cancels the older one; cancelled renders produce no
//! outcome at all.

use crate::cancel::Interrupted;
use crate::tracker::{PageRenderTracker, RenderTicket};
use crate::CancellationToken;
use std::fmt::Display;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// 1-based.
    pub page_number: u32,
    pub scale: f32,
}

impl RenderRequest {
    pub fn new(page_number: u32, scale: f32) -> Self {
        Self { page_number, scale }
    }
}

#[derive(Debug)]
pub enum RenderOutcome<T> {
    Rendered {
        page_number: u32,
        scale: f32,
        output: T,
    },
    Failed { page_number: u32, error: String },
}

/// Render thread plus the tracker that decides which results still matter.
///
/// # Example
///
/// ```
/// use stampwork_scheduler::{
///     CancellationToken, Interrupted, RenderOutcome, RenderRequest, RenderWorker,
/// };
///
/// #[derive(Debug)]
/// struct Never;
/// impl std::fmt::Display for Never {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("never")
///     }
/// }
/// impl Interrupted for Never {
///     fn is_interrupted(&self) -> bool {
///         false
///     }
/// }
///
/// let (worker, outcomes) =
///     RenderWorker::spawn(|request: &RenderRequest, _token: &CancellationToken| {
///         Ok::<_, Never>(request.page_number * 10)
///     })
///     .unwrap();
///
/// worker.submit(RenderRequest::new(2, 1.0));
/// match outcomes.recv().unwrap() {
///     RenderOutcome::Rendered { output, .. } => assert_eq!(output, 20),
///     RenderOutcome::Failed { error, .. } => panic!("{error}"),
/// }
/// worker.shutdown();
/// ```
pub struct RenderWorker {
    requests: Option<Sender<(RenderRequest, RenderTicket)>>,
    tracker: PageRenderTracker,
    thread: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Starts the render thread. `executor` runs on it for every request
    /// that has not been cancelled by the time it is picked up.
    pub fn spawn<T, E, F>(executor: F) -> io::Result<(Self, Receiver<RenderOutcome<T>>)>
    where
        T: Send + 'static,
        E: Interrupted + Display,
        F: Fn(&RenderRequest, &CancellationToken) -> Result<T, E> + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::channel::<(RenderRequest, RenderTicket)>();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let tracker = PageRenderTracker::new();
        let worker_tracker = tracker.clone();

        let thread = thread::Builder::new().name("stampwork-render".to_owned()).spawn(move || {
            Self::run(request_rx, outcome_tx, worker_tracker, executor);
        })?;

        let worker = Self {
            requests: Some(request_tx),
            tracker,
            thread: Some(thread),
        };
        Ok((worker, outcome_rx))
    }

    /// Queues a render, cancelling any earlier one for the same page.
    /// Returns `None` once the worker has stopped.
    pub fn submit(&self, request: RenderRequest) -> Option<CancellationToken> {
        let requests = self.requests.as_ref()?;
        let ticket = self.tracker.begin(request.page_number);
        let token = ticket.token.clone();

        if requests.send((request, ticket.clone())).is_err() {
            self.tracker.finish(&ticket);
            return None;
        }
        Some(token)
    }

    pub fn tracker(&self) -> &PageRenderTracker {
        &self.tracker
    }

    /// Cancels everything in flight, then waits for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.tracker.cancel_all();
        self.requests.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("render thread panicked");
            }
        }
    }

    fn run<T, E, F>(
        requests: Receiver<(RenderRequest, RenderTicket)>,
        outcomes: Sender<RenderOutcome<T>>,
        tracker: PageRenderTracker,
        executor: F,
    ) where
        E: Interrupted + Display,
        F: Fn(&RenderRequest, &CancellationToken) -> Result<T, E>,
    {
        for (request, ticket) in requests {
            let page_number = request.page_number;
            if ticket.token.is_cancelled() {
                log::debug!("page {page_number}: dropping cancelled render before start");
                tracker.finish(&ticket);
                continue;
            }

            let result = executor(&request, &ticket.token);
            tracker.finish(&ticket);

            let outcome = match result {
                Ok(_) if ticket.token.is_cancelled() => {
                    log::debug!("page {page_number}: discarding superseded render");
                    continue;
                }
                Ok(output) => RenderOutcome::Rendered {
                    page_number,
                    scale: request.scale,
                    output,
                },
                Err(error) if error.is_interrupted() => {
                    log::debug!("page {page_number}: render cancelled");
                    continue;
                }
                Err(error) => RenderOutcome::Failed {
                    page_number,
                    error: error.to_string(),
                },
            };

            if outcomes.send(outcome).is_err() {
                break;
            }
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
