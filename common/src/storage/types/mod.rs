pub mod entity_id;
pub mod ingestion_job;
pub mod metrics_record;

pub use entity_id::EntityId;
pub use ingestion_job::IngestionJob;
pub use metrics_record::{DataPoint, MetricSeries, MetricsMeta, MetricsRecord, METRIC_KEYS};
