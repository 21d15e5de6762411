use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use transita_api::app_config::Config;
use transita_api::{app, AppState};
use transita_order::payment::SandboxGateway;
use transita_shared::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "transita_api=debug,tower_http=debug,axum::rejection=trace".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    let state = AppState::build(
        Arc::new(SystemClock),
        Arc::new(SandboxGateway::new(&config.business_rules.payment_base_url)),
        config.business_rules.clone(),
    );

    tokio::spawn(transita_api::worker::start_expiry_sweeper(
        state.reservations.clone(),
        state.finalizer.clone(),
        Duration::from_secs(config.business_rules.sweep_interval_seconds),
    ));

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app(state)).await?;
    Ok(())
}
