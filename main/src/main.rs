use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use axum::Router;
use common::{
    storage::{entity_store::EntityStore, store::StorageManager},
    utils::{
        config::{get_config, AppConfig},
        embedding::EmbeddingProvider,
        llm::{ModelCatalog, ModelGateway, OpenAiBackend, RetryPolicy},
    },
};
use ingestion_pipeline::{
    pipeline::{IngestionConfig, IngestionPipeline},
    run_worker_loop, IngestionQueue,
};
use tokio::task::JoinHandle;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;

    let backend = OpenAiBackend::from_config(&config);
    let embedding_provider = Arc::new(EmbeddingProvider::from_config(&config, backend.client())?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    let gateway = Arc::new(
        ModelGateway::new(
            Arc::new(backend),
            ModelCatalog::from_config(&config),
            RetryPolicy::from_config(&config),
        )
        .with_embedder(embedding_provider),
    );

    let storage = StorageManager::new(&config).await?;
    let (app, worker) = build_app(&config, gateway, EntityStore::new(storage));

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    // Serving stopped, so the router and its queue handle are gone.
    if let Err(e) = worker.await {
        error!("Worker task failed: {}", e);
    }

    Ok(())
}

/// Wires the ingestion worker and the HTTP router around one gateway and one store.
fn build_app(
    config: &AppConfig,
    gateway: Arc<ModelGateway>,
    store: EntityStore,
) -> (Router, JoinHandle<()>) {
    let (queue, jobs) = IngestionQueue::bounded(config.ingestion_queue_capacity);

    let ingestion_pipeline = Arc::new(IngestionPipeline::new(
        Arc::clone(&gateway),
        store.clone(),
        IngestionConfig::from_app_config(config),
    ));
    info!("Starting worker process");
    let worker = tokio::spawn(run_worker_loop(jobs, ingestion_pipeline));

    let api_state = ApiState::new(config, gateway, store, queue);
    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(api_state);

    (app, worker)
}
