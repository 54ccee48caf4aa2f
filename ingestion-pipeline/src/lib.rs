#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod pipeline;
pub mod utils;

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use common::{
    error::AppError,
    storage::{
        entity_store::{sanitize_filename, EntityStore},
        types::{EntityId, IngestionJob},
    },
    utils::llm::ModelGateway,
};
pub use pipeline::{IngestionConfig, IngestionPipeline, IngestionSummary, IngestionTuning};
use serde::Serialize;
use tokio::{
    sync::{mpsc, Mutex, Semaphore},
    task::JoinSet,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use utils::{
    document::open_pdf,
    identify::{resolve_entity_id, IdentificationLimits},
};

/// Sending half of the bounded ingestion channel.
#[derive(Clone)]
pub struct IngestionQueue {
    sender: mpsc::Sender<IngestionJob>,
}

impl IngestionQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<IngestionJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Waits for room in the queue when it is full.
    pub async fn enqueue(&self, job: IngestionJob) -> Result<(), AppError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| AppError::InternalError("ingestion worker is not running".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionReceipt {
    pub entity_id: EntityId,
    pub job_id: Uuid,
    pub location: String,
}

/// Accepts uploaded filings: names the company, stores the file and queues it.
#[derive(Clone)]
pub struct DocumentIntake {
    gateway: Arc<ModelGateway>,
    store: EntityStore,
    queue: IngestionQueue,
    limits: IdentificationLimits,
}

impl DocumentIntake {
    pub fn new(gateway: Arc<ModelGateway>, store: EntityStore, queue: IngestionQueue) -> Self {
        Self {
            gateway,
            store,
            queue,
            limits: IdentificationLimits::default(),
        }
    }

    /// Returns once the job is queued; ingestion itself runs on the worker.
    #[tracing::instrument(skip_all, fields(filename = %filename, bytes = bytes.len()))]
    pub async fn submit(
        &self,
        bytes: Bytes,
        filename: &str,
        hint: Option<&str>,
    ) -> Result<SubmissionReceipt, AppError> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".into()));
        }

        let entity_id = resolve_entity_id(
            &self.gateway,
            hint,
            || open_pdf(bytes.clone()),
            &self.limits,
        )
        .await?;

        let filename = sanitize_filename(filename);
        let location = self.store.put_upload(&entity_id, &filename, bytes).await?;

        let job = IngestionJob::new(entity_id.clone(), location.clone(), filename);
        let job_id = job.id;
        self.queue.enqueue(job).await?;

        info!(%entity_id, %job_id, %location, "document queued for ingestion");

        Ok(SubmissionReceipt {
            entity_id,
            job_id,
            location,
        })
    }
}

type EntityLocks = Mutex<HashMap<EntityId, Arc<Mutex<()>>>>;

async fn entity_lock(locks: &EntityLocks, entity_id: &EntityId) -> Arc<Mutex<()>> {
    let mut locks = locks.lock().await;
    locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    Arc::clone(locks.entry(entity_id.clone()).or_default())
}

/// Consumes queued jobs until every [`IngestionQueue`] handle is dropped.
///
/// At most `concurrency` jobs run at once and jobs for the same entity run
/// one after another in arrival order.
pub async fn run_worker_loop(
    mut jobs: mpsc::Receiver<IngestionJob>,
    ingestion_pipeline: Arc<IngestionPipeline>,
) {
    let worker_id = format!("ingestion-worker-{}", Uuid::new_v4());
    let concurrency = ingestion_pipeline.config().concurrency.max(1);
    let permits = Arc::new(Semaphore::new(concurrency));
    let locks: Arc<EntityLocks> = Arc::new(Mutex::new(HashMap::new()));
    let mut running = JoinSet::new();

    info!(%worker_id, concurrency, "ingestion worker started");

    while let Some(job) = jobs.recv().await {
        while let Some(finished) = running.try_join_next() {
            if let Err(err) = finished {
                error!(%worker_id, error = %err, "ingestion task panicked");
            }
        }

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            warn!(%worker_id, "ingestion permits closed");
            break;
        };
        let entity_lock = entity_lock(&locks, &job.entity_id).await;
        let pipeline = Arc::clone(&ingestion_pipeline);
        let worker_id = worker_id.clone();

        running.spawn(async move {
            let _permit = permit;
            let _guard = entity_lock.lock().await;
            info!(
                %worker_id,
                job_id = %job.id,
                entity_id = %job.entity_id,
                "claimed ingestion job"
            );
            pipeline.ingest(&job).await;
        });
    }

    while let Some(finished) = running.join_next().await {
        if let Err(err) = finished {
            error!(%worker_id, error = %err, "ingestion task panicked");
        }
    }

    info!(%worker_id, "ingestion queue closed, worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        storage::{entity_store::ProcessingStatus, store::StorageManager},
        utils::llm::{
            testing::{ScriptedBackend, ScriptedReply},
            ModelCatalog, RetryPolicy,
        },
    };
    use utils::document::testing::build_pdf;

    fn gateway(backend: Arc<ScriptedBackend>) -> Arc<ModelGateway> {
        Arc::new(ModelGateway::new(
            backend,
            ModelCatalog {
                primary: "primary".into(),
                fast: "fast".into(),
            },
            RetryPolicy::default(),
        ))
    }

    fn annual_report() -> Bytes {
        Bytes::from(build_pdf(&[
            &[
                "Globex Corporation Limited",
                "Integrated Annual Report for the financial year 2023-24",
                "Registered office and corporate information",
            ],
            &["Revenue from operations 5,400 4,900", "Profit before tax 700 610"],
        ]))
    }

    #[tokio::test]
    async fn submit_identifies_company_and_worker_makes_it_ready() {
        let backend = Arc::new(ScriptedBackend::new([
            ScriptedReply::text(r#"{"ticker": "GLOBEX.NS"}"#),
            ScriptedReply::text(
                r#"{"revenue": {"data": [{"year": "FY24", "value": 5400}], "citation": "Page 2"}}"#,
            ),
            ScriptedReply::text(
                r#"{"revenue": {"data": [{"year": "FY24", "value": 5400}], "citation": "Page 2"}}"#,
            ),
        ]));
        let gateway = gateway(Arc::clone(&backend));
        let store = EntityStore::new(StorageManager::in_memory());
        let (queue, jobs) = IngestionQueue::bounded(4);
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&gateway),
            store.clone(),
            IngestionConfig::default(),
        ));
        let worker = tokio::spawn(run_worker_loop(jobs, pipeline));

        let intake = DocumentIntake::new(gateway, store.clone(), queue);
        let receipt = intake
            .submit(annual_report(), "../globex AR.pdf", None)
            .await
            .expect("submitted");

        assert_eq!(receipt.entity_id.as_str(), "GLOBEX");
        assert_eq!(receipt.location, "GLOBEX/uploads/globex_AR.pdf");

        drop(intake);
        worker.await.expect("worker finished");

        assert_eq!(
            store.status(&receipt.entity_id).await.expect("status"),
            ProcessingStatus::Ready
        );
        let metrics = store
            .get_metrics(&receipt.entity_id)
            .await
            .expect("read")
            .expect("metrics stored");
        assert!(metrics.verified);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn usable_hint_skips_identification() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = EntityStore::new(StorageManager::in_memory());
        let (queue, mut jobs) = IngestionQueue::bounded(1);
        let intake = DocumentIntake::new(gateway(Arc::clone(&backend)), store.clone(), queue);

        let receipt = intake
            .submit(annual_report(), "report.pdf", Some(" initech "))
            .await
            .expect("submitted");

        assert_eq!(receipt.entity_id.as_str(), "INITECH");
        assert_eq!(backend.call_count(), 0);
        let job = jobs.recv().await.expect("job queued");
        assert_eq!(job.id, receipt.job_id);
        assert_eq!(job.document_location, "INITECH/uploads/report.pdf");
        assert!(store
            .storage()
            .exists(&job.document_location)
            .await
            .expect("exists"));
    }

    #[tokio::test]
    async fn unidentifiable_upload_is_rejected_before_storing() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = EntityStore::new(StorageManager::in_memory());
        let (queue, mut jobs) = IngestionQueue::bounded(1);
        let intake = DocumentIntake::new(gateway(backend), store.clone(), queue);

        let err = intake
            .submit(Bytes::from_static(b"plain text, not a pdf"), "notes.txt", Some("undefined"))
            .await
            .expect_err("rejected");

        assert!(matches!(err, AppError::Validation(_)));
        drop(intake);
        assert!(jobs.recv().await.is_none());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let (queue, _jobs) = IngestionQueue::bounded(1);
        let intake = DocumentIntake::new(
            gateway(Arc::new(ScriptedBackend::default())),
            EntityStore::new(StorageManager::in_memory()),
            queue,
        );

        let err = intake
            .submit(Bytes::new(), "empty.pdf", Some("ACME"))
            .await
            .expect_err("rejected");

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn enqueue_fails_once_worker_is_gone() {
        let (queue, jobs) = IngestionQueue::bounded(1);
        drop(jobs);

        let job = IngestionJob::new(
            EntityId::parse("ACME").expect("id"),
            "ACME/uploads/a.pdf".into(),
            "a.pdf".into(),
        );

        assert!(matches!(
            queue.enqueue(job).await,
            Err(AppError::InternalError(_))
        ));
    }
}
