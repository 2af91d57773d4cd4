//! # verdantd — greenhouse controller daemon
//!
//! Composition root that wires the adapters together and runs the
//! closed control loop.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file + environment overrides)
//! - Build and validate the device registry and rule set
//! - Construct the virtual relay bank, sensor rig, event bus, and
//!   event sink
//! - Spawn the control actor and the sensor poll loop
//! - Build the axum router and serve it
//! - Handle graceful shutdown (ctrl-c), forcing all outputs OFF
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use verdant_adapter_http_axum::state::AppState;
use verdant_adapter_virtual::{MemoryEventSink, VirtualRelayBank, VirtualSensorRig};
use verdant_app::control::ControlActor;
use verdant_app::event_bus::InProcessEventBus;
use verdant_domain::device::DeviceRegistry;
use verdant_domain::rule::validate_rules;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::load()?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .unwrap_or_else(|_| EnvFilter::new("verdantd=info,verdant=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Fail fast on a bad registry or rule set, before touching outputs.
    let registry = DeviceRegistry::new(config.devices())?;
    validate_rules(&config.rules, &registry)?;
    tracing::info!(
        devices = registry.len(),
        rules = config.rules.len(),
        "configuration loaded"
    );

    // Adapters
    let relay = Arc::new(VirtualRelayBank::new());
    let sensors = Arc::new(VirtualSensorRig::default());
    let event_bus = Arc::new(InProcessEventBus::new(256));
    let sink = Arc::new(MemoryEventSink::default());

    // Sensor poll loop
    let rig = Arc::clone(&sensors);
    let rig_bus = Arc::clone(&event_bus);
    let poll_interval = config.sensor_poll_interval();
    tokio::spawn(async move {
        rig.run(rig_bus, poll_interval).await;
    });

    // Control actor
    let actor = ControlActor::new(
        config.control_config(),
        registry,
        config.rules.clone(),
        relay,
        sensors,
        Arc::clone(&event_bus),
        sink,
    )?;
    let control = actor.spawn();

    // HTTP
    let state = AppState::new(
        control.clone(),
        event_bus,
        config.default_override_ttl(),
    );
    let app = verdant_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "verdantd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Teardown: force every output OFF before exiting.
    control.shutdown().await?;
    tracing::info!("verdantd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("failed to listen for the shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
