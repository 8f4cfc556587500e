//! camflow - main entry point

use camflow::{
    camera_catalog::CameraCatalog,
    event_publisher::{EventPublisher, HttpEventPublisher, TracingEventPublisher},
    pipeline::DetectorRegistry,
    realtime_hub::RealtimeHub,
    state::{AppConfig, AppState},
    stream_session::{SessionDeps, SessionManager},
    video_source::SourceOpener,
    web_api,
    worker_pool::WorkerPool,
    workflow::WorkflowEngine,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "camflow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting camflow v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        host = %config.host,
        port = config.port,
        max_active_sessions = config.max_active_sessions,
        frame_queue_capacity = config.frame_queue_capacity,
        inference_url = ?config.inference_url,
        event_broker_url = ?config.event_broker_url,
        "Configuration loaded"
    );

    let catalog = Arc::new(CameraCatalog::new());
    if let Some(path) = &config.cameras_file {
        let count = catalog.load_json(path).await?;
        tracing::info!(path = %path.display(), count = count, "Camera catalog loaded");
    } else {
        tracing::info!("CAMERAS_FILE not set, starting with an empty catalog");
    }

    let detectors = match &config.inference_url {
        Some(url) => DetectorRegistry::with_remote_inference(url.clone()),
        None => DetectorRegistry::new(),
    };
    let available = detectors.validate()?;
    tracing::info!(models = ?available, "Detector registry validated");
    let detectors = Arc::new(detectors);

    let publisher: Arc<dyn EventPublisher> = match &config.event_broker_url {
        Some(url) => Arc::new(HttpEventPublisher::new(url.clone())?),
        None => Arc::new(TracingEventPublisher),
    };

    let pool = WorkerPool::new(config.max_active_sessions);
    let realtime = Arc::new(RealtimeHub::new());

    let sessions = Arc::new(SessionManager::new(
        SessionDeps {
            catalog: catalog.clone(),
            pool: pool.clone(),
            opener: SourceOpener::new(config.ffmpeg_path.clone()),
            detectors: detectors.clone(),
            hub: realtime.clone(),
            publisher,
        },
        config.session_config(),
    ));
    let workflows = Arc::new(WorkflowEngine::new(realtime.clone()));

    let state = AppState {
        config,
        catalog,
        pool,
        detectors,
        realtime,
        sessions: sessions.clone(),
        workflows,
        started_at: std::time::Instant::now(),
    };

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.shutdown_all().await;
    tracing::info!("camflow stopped");

    Ok(())
}
