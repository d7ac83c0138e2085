use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use connector_slack::ConnectorService;
use connector_slack::router::initiate_router;
use shared::error::{CommonError, DynError};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel, errors::GracefulShutdownError};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::cli::ServeParams;

/// Runs the connector until a shutdown signal arrives
pub async fn run_server(params: ServeParams) -> Result<(), anyhow::Error> {
    Toplevel::new(async move |subsys: SubsystemHandle| {
        subsys.start(SubsystemBuilder::new(
            "axum-server",
            move |subsys: SubsystemHandle| async move { start_axum_server(subsys, params).await },
        ));
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(30_000))
    .await
    .map_err(|err: GracefulShutdownError<DynError>| {
        for sub_err in err.get_subsystem_errors() {
            error!("error: {:?}", sub_err);
        }
        anyhow::anyhow!(err)
    })
}

async fn start_axum_server(subsys: SubsystemHandle, params: ServeParams) -> Result<(), CommonError> {
    let addr: SocketAddr = format!("{}:{}", params.host, params.port).parse()?;
    let config = params.connector_config();
    info!(config = ?config, "Starting Slack connector");

    let service = ConnectorService::builder(config).build();
    let router = initiate_router(Arc::new(service)).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server bound on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            subsys.on_shutdown_requested().await;
            info!("Shutting down axum server, waiting for in-flight requests to complete...");
        })
        .await?;

    info!("Axum server shut down gracefully");
    Ok(())
}
