//! Background page previews.

use pdf_engine::{PageDocument, PageRasterizer, RgbaImage};
use stampwork_scheduler::{RenderOutcome, RenderWorker};
use std::io;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Starts a render thread that rasterizes pages of `document` with
/// `rasterizer`. A newer request for a page cancels the older one.
pub fn spawn_preview_worker<D, R>(
    document: Arc<D>,
    rasterizer: R,
) -> io::Result<(RenderWorker, Receiver<RenderOutcome<RgbaImage>>)>
where
    D: PageDocument + Send + Sync + 'static,
    R: PageRasterizer<D> + Send + 'static,
{
    RenderWorker::spawn(move |request, token| {
        rasterizer.render_page(&document, request.page_number, request.scale, token)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::{LopdfDocument, PageSize, PreviewRasterizer};
    use stampwork_scheduler::RenderRequest;
    use std::time::Duration;

    fn document() -> Arc<LopdfDocument> {
        Arc::new(
            LopdfDocument::with_blank_pages(&[PageSize::new(200.0, 100.0), PageSize::LETTER])
                .expect("build"),
        )
    }

    #[test]
    fn renders_requested_page_at_scale() {
        let (worker, outcomes) =
            spawn_preview_worker(document(), PreviewRasterizer::default()).expect("spawn");

        worker.submit(RenderRequest::new(1, 0.5)).expect("queued");

        match outcomes.recv_timeout(Duration::from_secs(5)).expect("outcome") {
            RenderOutcome::Rendered {
                page_number,
                output,
                ..
            } => {
                assert_eq!(page_number, 1);
                assert_eq!(output.dimensions(), (100, 50));
            }
            RenderOutcome::Failed { error, .. } => panic!("render failed: {error}"),
        }
        worker.shutdown();
    }

    #[test]
    fn missing_page_is_reported_as_failure() {
        let (worker, outcomes) =
            spawn_preview_worker(document(), PreviewRasterizer::default()).expect("spawn");

        worker.submit(RenderRequest::new(9, 1.0)).expect("queued");

        assert!(matches!(
            outcomes.recv_timeout(Duration::from_secs(5)).expect("outcome"),
            RenderOutcome::Failed { page_number: 9, .. }
        ));
        worker.shutdown();
    }
}
