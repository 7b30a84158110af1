use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_inspection_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use inspection_service::config::{AppConfig, EventsConfig};
use inspection_service::error::AppError;
use inspection_service::telemetry;
use inspection_service::workflows::inspection::peers::http::http_peers;
use inspection_service::workflows::inspection::{
    DocxTemplateRenderer, EventPublisher, EventSystemConfig, InMemoryInspectionRepository,
    InspectionEventSystem, InspectionRepository, InspectionService, InspectionServiceError,
    LogEventPublisher,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    #[cfg(feature = "postgres")]
    if let Some(url) = config.database.url.clone() {
        use inspection_service::postgres::PgInspectionRepository;

        let repository = PgInspectionRepository::connect(&url, &config.database).await?;
        repository.migrate().await?;
        info!("storing inspections in postgres");
        return serve(config, Arc::new(repository)).await;
    }
    #[cfg(not(feature = "postgres"))]
    if config.database.is_configured() {
        warn!("DATABASE_URL is set but this build has no postgres support");
    }

    warn!("inspections are kept in memory and lost on restart");
    serve(config, Arc::new(InMemoryInspectionRepository::new())).await
}

async fn serve<R>(config: AppConfig, repository: Arc<R>) -> Result<(), AppError>
where
    R: InspectionRepository + 'static,
{
    let peers = http_peers(&config.peers).map_err(|source| InspectionServiceError::Peer {
        context: "build peer clients",
        source,
    })?;

    let (event_system, events) =
        InspectionEventSystem::new(event_publisher(&config)?, event_system_config(&config.events));
    let event_loop = tokio::spawn(event_system.run());

    let service = Arc::new(InspectionService::new(
        repository,
        peers,
        Arc::new(DocxTemplateRenderer::from_config(&config.templates)),
        events.clone(),
    ));

    #[cfg(feature = "kafka")]
    let consumer = consumer::spawn(service.clone(), &config.kafka);
    #[cfg(not(feature = "kafka"))]
    if config.kafka.is_configured() {
        warn!("KAFKA_BROKERS is set but this build has no kafka support; task events are not consumed");
    }

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        events: events.clone(),
    };

    let app = with_inspection_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "field inspection service ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    readiness_flag.store(false, Ordering::Release);

    #[cfg(feature = "kafka")]
    if let Some(consumer) = consumer {
        consumer.stop().await;
    }

    let report = events.shutdown().await;
    if report.success {
        info!(
            drained = report.drained,
            duration_ms = report.duration_ms,
            "inspection events flushed"
        );
    } else {
        warn!(
            drained = report.drained,
            duration_ms = report.duration_ms,
            "inspection event queue did not drain cleanly"
        );
    }
    if let Err(err) = event_loop.await {
        warn!(error = %err, "inspection event loop ended abnormally");
    }

    Ok(())
}

fn event_system_config(config: &EventsConfig) -> EventSystemConfig {
    EventSystemConfig {
        channel_capacity: config.channel_capacity,
        drain_timeout: Duration::from_millis(config.drain_timeout_ms),
    }
}

#[cfg(feature = "kafka")]
fn event_publisher(config: &AppConfig) -> Result<Arc<dyn EventPublisher>, AppError> {
    use inspection_service::broker::KafkaEventPublisher;

    if config.kafka.is_configured() {
        info!(topic = %config.kafka.inspections_topic, "publishing inspection events to kafka");
        return Ok(Arc::new(KafkaEventPublisher::new(&config.kafka)?));
    }
    Ok(Arc::new(LogEventPublisher))
}

#[cfg(not(feature = "kafka"))]
fn event_publisher(_config: &AppConfig) -> Result<Arc<dyn EventPublisher>, AppError> {
    Ok(Arc::new(LogEventPublisher))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[cfg(feature = "kafka")]
mod consumer {
    use inspection_service::broker::run_task_consumer;
    use inspection_service::config::KafkaConfig;
    use inspection_service::workflows::inspection::{InspectionRepository, InspectionService};
    use std::sync::Arc;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tracing::{error, info};

    pub(crate) struct ConsumerTask {
        stop: watch::Sender<bool>,
        handle: JoinHandle<()>,
    }

    impl ConsumerTask {
        pub(crate) async fn stop(self) {
            let _ = self.stop.send(true);
            if let Err(err) = self.handle.await {
                error!(error = %err, "task consumer ended abnormally");
            }
        }
    }

    pub(crate) fn spawn<R>(
        service: Arc<InspectionService<R>>,
        config: &KafkaConfig,
    ) -> Option<ConsumerTask>
    where
        R: InspectionRepository + 'static,
    {
        if !config.is_configured() {
            info!("no kafka brokers configured; task consumer disabled");
            return None;
        }

        let config = config.clone();
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let shutdown = async move {
                let _ = stopped.changed().await;
            };
            if let Err(err) = run_task_consumer(service, &config, shutdown).await {
                error!(error = %err, "task consumer failed");
            }
        });

        Some(ConsumerTask { stop, handle })
    }
}
