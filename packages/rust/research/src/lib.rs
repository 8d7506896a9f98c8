//! Background research scheduling.
//!
//! [`ResearchScheduler`] owns a bounded, drainable worker pool. The
//! request path hands it an [`IngestionTrigger`] and returns immediately;
//! everything effectful (search, reservation, ingestion) happens on the
//! pool. Per-source failures are isolated: one failing URL never cancels
//! its siblings or the batch.

pub mod search;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};
use url::Url;

use rivet_shared::{IngestionTrigger, ResearchConfig, Result, SourceKind};
use rivet_storage::FingerprintStore;

pub use search::{SearchClient, classify_source};

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// A candidate research source resolved from a search term.
#[derive(Debug, Clone)]
pub struct CandidateSource {
    /// The source URL.
    pub url: Url,
    /// What kind of source the URL points at.
    pub kind: SourceKind,
}

/// Resolves search terms into candidate source URLs.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Run the search terms and return deduplicated candidate sources.
    async fn search(&self, terms: &[String]) -> Result<Vec<CandidateSource>>;
}

/// Outcome of ingesting one source.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Number of knowledge atoms the pipeline created.
    pub atoms_created: usize,
}

/// The external ingestion pipeline: fetches, chunks, and stores a source.
#[async_trait]
pub trait IngestionPipeline: Send + Sync {
    /// Ingest one source URL into the knowledge base.
    async fn ingest(&self, url: &Url) -> Result<IngestReport>;
}

// ---------------------------------------------------------------------------
// ResearchScheduler
// ---------------------------------------------------------------------------

/// Fire-and-forget scheduler for ingestion triggers.
///
/// Triggers queue onto a bounded channel; a dispatcher task fans each one
/// out to per-source jobs capped by a shared semaphore. `shutdown` drains
/// everything in flight. Abandoned work on process kill is safe: the
/// fingerprint TTL rule makes incomplete reservations reclaimable.
pub struct ResearchScheduler {
    tx: mpsc::Sender<IngestionTrigger>,
    dispatcher: JoinHandle<()>,
}

impl ResearchScheduler {
    /// Start the scheduler and its dispatcher task.
    pub fn new(
        scraper: Arc<dyn Scraper>,
        store: Arc<dyn FingerprintStore>,
        pipeline: Arc<dyn IngestionPipeline>,
        config: &ResearchConfig,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<IngestionTrigger>(config.queue_capacity.max(1));
        let semaphore = Arc::new(Semaphore::new(config.worker_concurrency.max(1)));

        let max_triggers = config.worker_concurrency.max(1);
        let dispatcher = tokio::spawn(async move {
            let mut tasks = JoinSet::new();

            while let Some(trigger) = rx.recv().await {
                // Backpressure: never resolve more triggers than workers.
                // New triggers queue on the channel and drop when it fills.
                while tasks.len() >= max_triggers {
                    tasks.join_next().await;
                }

                let scraper = scraper.clone();
                let store = store.clone();
                let pipeline = pipeline.clone();
                let semaphore = semaphore.clone();

                tasks.spawn(async move {
                    run_trigger(trigger, scraper, store, pipeline, semaphore).await;
                });

                // Reap whatever already finished so the set stays small.
                while tasks.try_join_next().is_some() {}
            }

            // Channel closed: drain remaining research tasks.
            while tasks.join_next().await.is_some() {}
        });

        Self { tx, dispatcher }
    }

    /// Queue a trigger without blocking.
    ///
    /// Returns `true` when the trigger was accepted. A full queue drops
    /// the trigger with a warning — research is best-effort and must
    /// never stall the request path.
    pub fn trigger(&self, trigger: IngestionTrigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "research queue full, dropping trigger");
                false
            }
        }
    }

    /// Close the queue and wait for all in-flight research to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.dispatcher.await {
            warn!(error = %e, "research dispatcher panicked during shutdown");
        }
    }
}

/// Execute one trigger: resolve sources, then reserve + ingest each one.
async fn run_trigger(
    trigger: IngestionTrigger,
    scraper: Arc<dyn Scraper>,
    store: Arc<dyn FingerprintStore>,
    pipeline: Arc<dyn IngestionPipeline>,
    semaphore: Arc<Semaphore>,
) {
    let sources = match scraper.search(&trigger.search_terms).await {
        Ok(sources) => sources,
        Err(e) => {
            warn!(error = %e, terms = trigger.search_terms.len(), "source search failed");
            return;
        }
    };

    info!(
        sources = sources.len(),
        priority = ?trigger.priority,
        "research trigger resolved"
    );

    let mut jobs = JoinSet::new();
    for source in sources {
        // Reserve before taking a permit so duplicates cost nothing.
        match store.reserve(&source.url, source.kind).await {
            Ok(true) => {}
            Ok(false) => {
                // Expected under concurrent triggers, not an error.
                debug!(url = %source.url, "source already reserved, skipping");
                continue;
            }
            Err(e) => {
                warn!(url = %source.url, error = %e, "fingerprint reservation failed");
                continue;
            }
        }

        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("semaphore closed");
        let store = store.clone();
        let pipeline = pipeline.clone();

        jobs.spawn(async move {
            let _permit = permit;
            match pipeline.ingest(&source.url).await {
                Ok(report) => {
                    if let Err(e) = store.complete(&source.url).await {
                        warn!(url = %source.url, error = %e, "failed to mark source complete");
                    }
                    info!(
                        url = %source.url,
                        atoms = report.atoms_created,
                        "source ingested"
                    );
                }
                Err(e) => {
                    // Fingerprint stays incomplete; the TTL rule makes it
                    // eligible for retry on a later trigger.
                    warn!(url = %source.url, error = %e, "ingestion failed");
                }
            }
        });
    }

    while jobs.join_next().await.is_some() {}
}
