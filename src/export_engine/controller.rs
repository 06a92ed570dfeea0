//! Change-driven re-extraction controller
//!
//! The host page redraws its order tables at unpredictable times; this
//! controller watches mutation notifications and re-runs the extraction
//! pipeline once per burst. Two rules keep it stable: notifications that
//! only touch our own generated widgets are ignored entirely (otherwise
//! re-rendering the status display would trigger extraction, which
//! re-renders the status display), and genuine host-page changes are
//! debounced so a redraw burst of dozens of mutations costs one
//! extraction run, after the page has gone quiet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::infrastructure::config::ControllerConfig;

/// Where a single observed mutation landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationScope {
    /// Inside the watched order container; host-page content changed.
    Container,
    /// Inside a subtree this tool generated (status badges, injected
    /// buttons). Self-writes, never a reason to re-extract.
    GeneratedSubtree,
    /// Elsewhere on the page.
    Unrelated,
}

/// One observer callback's worth of mutations.
#[derive(Debug, Clone)]
pub struct MutationBatch {
    pub records: Vec<MutationScope>,
}

impl MutationBatch {
    #[must_use]
    pub fn new(records: Vec<MutationScope>) -> Self {
        Self { records }
    }

    /// True if any record is a genuine host-page change. A batch made
    /// entirely of generated-subtree or unrelated records is filtered.
    #[must_use]
    pub fn touches_container(&self) -> bool {
        self.records
            .iter()
            .any(|scope| *scope == MutationScope::Container)
    }
}

/// The work to re-run when the watched container changed: re-extract,
/// re-map, refresh whatever projection consumes the result.
#[async_trait]
pub trait ExtractionPipeline: Send + Sync {
    async fn run(&self);
}

/// Debouncing bridge between mutation notifications and the extraction
/// pipeline. Owns a background loop; dropping the controller without
/// [`shutdown`](Self::shutdown) leaves the loop running until the
/// runtime stops.
pub struct ReextractionController {
    batches: mpsc::UnboundedSender<MutationBatch>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

impl ReextractionController {
    #[must_use]
    pub fn new(config: &ControllerConfig, pipeline: Arc<dyn ExtractionPipeline>) -> Self {
        let (batches, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_loop(
            rx,
            cancel.clone(),
            config.debounce_delay(),
            pipeline,
        ));
        Self {
            batches,
            cancel,
            worker,
        }
    }

    /// Feeds one mutation batch into the debounce window. Never blocks;
    /// a closed loop (after shutdown) swallows the notification.
    pub fn notify(&self, batch: MutationBatch) {
        if self.batches.send(batch).is_err() {
            warn!("mutation batch dropped, controller loop already stopped");
        }
    }

    /// Stops the loop. A pending (not yet fired) debounce window is
    /// discarded, not flushed.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.worker.await;
    }
}

async fn run_loop(
    mut batches: mpsc::UnboundedReceiver<MutationBatch>,
    cancel: CancellationToken,
    debounce: Duration,
    pipeline: Arc<dyn ExtractionPipeline>,
) {
    let timer = sleep(debounce);
    tokio::pin!(timer);
    let mut armed = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            batch = batches.recv() => match batch {
                None => break,
                Some(batch) if batch.touches_container() => {
                    trace!(records = batch.records.len(), "container mutation, debounce reset");
                    timer.as_mut().reset(Instant::now() + debounce);
                    armed = true;
                }
                Some(batch) => {
                    trace!(records = batch.records.len(), "self-write or unrelated, ignored");
                }
            },

            () = timer.as_mut(), if armed => {
                armed = false;
                debug!("page went quiet, re-running extraction");
                pipeline.run().await;
            }
        }
    }
}
