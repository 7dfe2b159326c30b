use anyhow::{Context, Result};
use badge_device::config::{BadgeConfig, LinkConfig, SignalConfig};
use badge_device::controller::BadgeController;
use badge_device::expresslink::{CommandEngine, ConfigKey, DebouncedSignal, EventSignal, SysfsGpio};
use badge_device::peripherals::SimulatedBadge;
use badge_device::transport::{SerialConnector, TcpConnector, TransportConnector, TransportStream};

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = BadgeConfig::from_env().context("Failed to load configuration")?;
    info!("Badge device starting");

    match config.link.clone() {
        LinkConfig::Serial { port, baud } => {
            info!("  Module UART: {} @ {} baud", port, baud);
            run(SerialConnector::new(port, baud), config).await
        }
        LinkConfig::Tcp { address } => {
            info!("  Module bridge: {}", address);
            run(TcpConnector::new(address), config).await
        }
    }
}

async fn run<C: TransportConnector>(connector: C, config: BadgeConfig) -> Result<()> {
    let stream = connector
        .connect()
        .await
        .with_context(|| format!("Failed to open {} link", connector.name()))?;
    info!("{} link open", connector.name());

    let mut engine = CommandEngine::new(stream, &config.timing);
    engine.set_echo(config.echo.enabled);
    if !engine.self_test().await {
        warn!("ExpressLink self-test failed; continuing without a verified link");
    }
    log_module_info(&mut engine).await;

    let signal = event_signal(&config.signal);
    let mut badge = BadgeController::new(engine, SimulatedBadge::new(), signal, &config);
    if let Err(e) = badge.startup().await {
        error!("Startup failed: {:#}", e);
        badge.shutdown().await?;
        return Err(e);
    }

    tokio::select! {
        _ = badge.run() => {}
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    badge.shutdown().await
}

fn event_signal(config: &SignalConfig) -> Option<Box<dyn EventSignal>> {
    let path = config.gpio.as_ref()?;
    info!("  Event signal: {} (debounce {:?})", path.display(), config.debounce());
    Some(Box::new(DebouncedSignal::new(
        SysfsGpio::new(path.clone()),
        config.debounce(),
    )))
}

async fn log_module_info<S: TransportStream>(engine: &mut CommandEngine<S>) {
    for key in [ConfigKey::About, ConfigKey::Version, ConfigKey::TechSpec] {
        match engine.conf_get(key).await {
            Ok(value) => info!("  {}: {}", key, value),
            Err(e) => warn!("  {}", e),
        }
    }
    if let Some(time) = engine.time().await {
        info!("  Module time: {} ({})", time.timestamp, time.source);
    }
}
