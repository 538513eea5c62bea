use agent_manager::api::{create_router, ApiState};
use agent_manager::manager::AgentManager;
use agent_manager::registry::build_agent;
use agent_manager::runners::scheduler::SchedulerSettings;
use agent_manager::sinks::ActiveSink;
use anyhow::{bail, Context, Result};
use pulse::clock::{Clock, SystemClock};
use pulse::config::{self, runtime};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agent_manager=info,pulse=info".into()),
        )
        .init();

    info!("Agent Manager starting...");

    // Load configuration: file first, then environment overrides
    let config_path =
        std::env::var("PULSE_CONFIG").unwrap_or_else(|_| "pulse.toml".to_string());
    let mut config = config::load_or_default(&config_path)?;
    runtime::apply_env_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    if config.agents.is_empty() {
        bail!("No agents configured in {}", config_path);
    }

    info!(
        config_path = %config_path,
        agent_count = config.agents.len(),
        poll_interval_secs = config.scheduler.poll_interval_secs,
        api_port = config.api.port,
        "Configuration loaded"
    );

    // Sink first so agents can announce themselves
    let sink = ActiveSink::start(&config.sink)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let manager = AgentManager::new(
        SchedulerSettings::from_config(&config.scheduler),
        sink.sink(),
    );

    for definition in &config.agents {
        let agent = build_agent(definition, &config.fetch, sink.sink(), Arc::clone(&clock))
            .with_context(|| format!("Failed to build agent '{}'", definition.name))?;
        let interval = definition.poll_interval_secs.map(Duration::from_secs);
        manager.register(agent, interval).await?;
    }
    info!(agents_started = config.agents.len(), "Agent manager started");

    // Start HTTP API server
    let server_handle = if config.api.enabled {
        let router = create_router(ApiState {
            status_map: manager.status_map(),
        });
        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.api.port))
            .await
            .context("Failed to bind status API port")?;
        info!(port = config.api.port, "Status API listening");

        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!(error = %e, "Status API server error");
            }
        }))
    } else {
        None
    };

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Graceful shutdown
    if let Some(handle) = server_handle {
        handle.abort();
    }
    manager.shutdown().await;
    sink.shutdown().await;
    info!("Agent manager stopped");

    Ok(())
}
