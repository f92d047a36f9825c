//! Drone simulator - one simulated drone flying queued trajectories.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drone_core::Pipeline;
use drone_server::api;
use drone_server::config::Config;
use drone_server::publisher::BusPublisher;
use drone_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("drone_server=debug".parse()?)
            .add_directive("drone_core=info".parse()?))
        .init();

    tracing::info!("Starting drone simulator...");

    let config = Config::from_env();
    config.validate()?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let publisher = BusPublisher::from_config(&config);
    let pipeline = Pipeline::spawn(
        config.agent(),
        publisher,
        config.pipeline_config(),
        &shutdown_tx,
    );

    let state = Arc::new(AppState::new(
        pipeline.commands.clone(),
        pipeline.sink.clone(),
        config.submit_timeout(),
        shutdown_tx.clone(),
    ));

    let command_app = api::command_routes()
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let stream_app = api::stream_routes().with_state(state);

    let command_addr = SocketAddr::from(([0, 0, 0, 0], config.command_port));
    let stream_addr = SocketAddr::from(([0, 0, 0, 0], config.stream_port));
    let command_listener = tokio::net::TcpListener::bind(command_addr).await?;
    let stream_listener = tokio::net::TcpListener::bind(stream_addr).await?;
    tracing::info!("Listening for commands on {}", command_addr);
    tracing::info!("Streaming telemetry on {}", stream_addr);

    let mut command_shutdown = shutdown_tx.subscribe();
    let command_server = tokio::spawn(async move {
        axum::serve(command_listener, command_app)
            .with_graceful_shutdown(async move {
                let _ = command_shutdown.recv().await;
            })
            .await
    });
    let mut stream_shutdown = shutdown_tx.subscribe();
    let stream_server = tokio::spawn(async move {
        axum::serve(stream_listener, stream_app)
            .with_graceful_shutdown(async move {
                let _ = stream_shutdown.recv().await;
            })
            .await
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(());

    command_server.await??;
    stream_server.await??;
    pipeline.join().await;

    tracing::info!("Drone simulator stopped");
    Ok(())
}
