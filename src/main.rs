use clap::Parser;
use log::{error, info, warn};
use nostmack_hub::audio::LoggingAudio;
use nostmack_hub::config::{Config, load_dotenv};
use nostmack_hub::diagnostics::SensorDiagnostics;
use nostmack_hub::effect::{Colour, EffectKind, EffectPipeline, GEAR_COLOURS};
use nostmack_hub::error::Result;
use nostmack_hub::gear::Gear;
use nostmack_hub::machine::{Machine, MachineConfig, MachineTimings};
use nostmack_hub::restart::CommandRestart;
use nostmack_hub::sensor_link::{SensorEvent, SensorLink};
use nostmack_hub::watchdog::{ConnectionWatchdog, WatchdogConfig};
use nostmack_hub::wled::Wled;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;

/// Buffered sensor events between the socket and the machine.
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Light effect shown while charging.
    #[arg(long, env = "EFFECT")]
    effect: Option<EffectKind>,

    /// Never restart when sensors go silent.
    #[arg(long)]
    no_watchdog: bool,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    load_dotenv();
    init_logger();
    let cli = Cli::parse();

    info!("Starting Nostmack hub");
    match run(cli).await {
        Ok(()) => {
            info!("Nostmack hub stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(effect) = cli.effect {
        config.effect = effect;
    }
    info!("Configuration loaded:");
    info!("  WLED: {}", config.wled.address);
    info!("  LEDs: {}", config.led_count);
    info!("  Gears: {:?}", config.gears);
    info!("  Effect: {}", config.effect);

    let link = SensorLink::bind(&config.sensor_bind).await?;

    let colours: Vec<Colour> = GEAR_COLOURS.iter().copied().cycle().take(config.gears.len()).collect();
    let pipeline = EffectPipeline::new(config.effect.build(&colours, config.led_count), config.led_count);
    let gears: Vec<Arc<Gear>> = config
        .gears
        .iter()
        .map(|g| Arc::new(Gear::new(g.sensor_id, g.sensitivity)))
        .collect();

    let machine = Machine::new(
        gears,
        pipeline,
        Arc::new(Wled::new(&config.wled)?),
        Arc::new(LoggingAudio::new(config.gears.len())),
        MachineConfig {
            idle_preset: config.presets.idle,
            charged_preset: config.presets.charged,
            timings: MachineTimings::default(),
        },
    );

    let watchdog = match config.watchdog.timeout {
        Some(timeout) if !cli.no_watchdog => {
            info!("  Watchdog: {:?}", timeout);
            Some(ConnectionWatchdog::new(
                config.sensor_ids(),
                WatchdogConfig {
                    timeout,
                    ..WatchdogConfig::default()
                },
            ))
        }
        _ => {
            info!("  Watchdog: disabled");
            None
        }
    };
    let restart = CommandRestart::new(config.watchdog.restart_command.clone());
    let diagnostics = SensorDiagnostics::new(config.sensor_ids());

    let (link_tx, mut link_rx) = mpsc::channel::<SensorEvent>(EVENT_BUFFER);
    let (machine_tx, machine_rx) = mpsc::channel::<SensorEvent>(EVENT_BUFFER);

    // Every datagram counts as a sign of life, whatever the machine does with it.
    let tap = async {
        while let Some(event) = link_rx.recv().await {
            if let Some(watchdog) = &watchdog {
                watchdog.seen(event.sensor_id);
            }
            diagnostics.seen(event.sensor_id);
            if machine_tx.send(event).await.is_err() {
                break;
            }
        }
    };

    let watch = async {
        match &watchdog {
            Some(watchdog) => watchdog.run(&restart).await,
            None => std::future::pending().await,
        }
    };

    let report = async {
        match config.diagnostics_interval {
            Some(period) => diagnostics.run(period).await,
            None => std::future::pending().await,
        }
    };

    info!("Nostmack hub is running, press Ctrl+C to exit");

    tokio::select! {
        _ = link.run(link_tx) => warn!("Sensor link stopped"),
        _ = tap => warn!("Sensor event forwarding stopped"),
        _ = machine.run(machine_rx) => warn!("Machine stopped"),
        _ = watch => {}
        _ = report => {}
        _ = shutdown_signal() => info!("Received shutdown signal"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
