pub mod config;
pub mod link;
pub mod mqtt;
pub mod node;
pub mod sensor;
pub mod telemetry;

#[cfg(test)]
mod testing;

use crate::config::NodeConfig;
use crate::link::{
    CredentialStore, GpioResetInput, LinkManager, NmcliProvisioner, NoResetInput, ResetInput,
};
use crate::mqtt::{BrokerSession, LoggingHandler, MqttHandler};
use crate::node::Node;
use crate::sensor::climate::IioHumidityTemperature;
use crate::sensor::light::{GpioChipSelect, LightReader, LightSensor, RppalSpiBus};
use crate::sensor::{Channel, SensorSource};
use crate::telemetry::TelemetryPublisher;
use color_eyre::Result;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    setup()?;

    let config_path = NodeConfig::default_path()?;
    let config = NodeConfig::load(&config_path).await?;
    info!(
        "Node starting: broker {}:{}, topic {}, period {:?}",
        config.broker.address,
        config.broker.port,
        config.broker.publish_topic,
        config.telemetry.period()
    );

    let mut node = build_node(&config, &config_path);

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let mut interval = tokio::time::interval(config.scheduler.tick());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                node.shutdown().await;
                break;
            }
            _ = interval.tick() => {
                if let Err(reason) = node.tick(Instant::now()).await {
                    error!("Restart required: {}", reason);
                    node.shutdown().await;
                    std::process::exit(reason.exit_code());
                }
            }
        }
    }

    info!("Node stopped");
    Ok(())
}

fn build_node(
    config: &NodeConfig,
    config_path: &std::path::Path,
) -> Node<NmcliProvisioner, MqttHandler, SensorSource> {
    let mut reset_input: Box<dyn ResetInput> = match config.link.reset_pin {
        Some(pin) => match GpioResetInput::open(pin) {
            Ok(input) => Box::new(input),
            Err(e) => {
                warn!("Reset input on GPIO {} unavailable: {}", pin, e);
                Box::new(NoResetInput)
            }
        },
        None => Box::new(NoResetInput),
    };

    let store = CredentialStore::new(config.credentials_path(config_path));
    let provisioner = NmcliProvisioner::new(&config.link, store);
    let link = LinkManager::new(provisioner, config.link.ap_name.clone(), &mut reset_input)
        .with_check_interval(config.link.check_interval());

    let session = BrokerSession::new(
        MqttHandler::new(&config.broker),
        config.broker.clone(),
        config.backoff.clone(),
        Box::new(LoggingHandler),
    );

    let channels = config.telemetry.channel_set();
    let climate = Box::new(IioHumidityTemperature::new(&config.hardware.iio_device));
    let light = if channels.contains(Channel::Light) {
        open_light_sensor(config)
    } else {
        None
    };
    let sensors = SensorSource::new(climate, light, channels);

    let publisher = TelemetryPublisher::new(
        config.telemetry.period(),
        channels,
        config.broker.publish_topic.clone(),
        Instant::now(),
    );

    Node::new(link, session, publisher, sensors)
}

fn open_light_sensor(config: &NodeConfig) -> Option<Box<dyn LightReader>> {
    let hardware = &config.hardware;
    let bus = match RppalSpiBus::open(hardware.spi_bus, hardware.spi_clock_hz) {
        Ok(bus) => bus,
        Err(e) => {
            error!("Light sensor SPI bus unavailable: {}", e);
            return None;
        }
    };
    let cs = match GpioChipSelect::open(hardware.light_cs_pin) {
        Ok(cs) => cs,
        Err(e) => {
            error!("Light sensor chip-select unavailable: {}", e);
            return None;
        }
    };
    Some(Box::new(LightSensor::new(bus, cs, hardware.lux_factor)))
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(terminate) => terminate,
                Err(e) => {
                    warn!("SIGTERM handler not installed: {}", e);
                    let _ = tokio::signal::ctrl_c().await;
                    shutdown.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
