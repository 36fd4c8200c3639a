use av_automation::config::{self, Config, Mode};
use av_automation::{
    Amplifier, DeviceOrchestrator, Monitor, Projector, Result, Screen, SerialProjector,
    SerialScreen, SonyAmplifier,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const MANUAL_HELP: &str =
    "Commands: status | screen lower | screen raise | projector on | projector off | quit";

#[tokio::main]
async fn main() -> ExitCode {
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);

    let config = match config::discover(explicit).and_then(|path| {
        println!("Configuration file loaded from path: '{}'", path.display());
        Config::load(&path)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(2);
        }
    };

    init_logging(&config.log_level);

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Exiting on error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(config: Config) -> Result<()> {
    let orchestrator = DeviceOrchestrator::new(
        SerialProjector::open(&config.serial_ports.projector)?,
        SerialScreen::open(&config.serial_ports.screen)?,
        SonyAmplifier::new(config.amplifier_host())?,
        config.orchestrator_settings(),
    );

    tracing::info!("Starting in {:?} mode", config.mode);
    let result = match config.mode {
        Mode::Monitor => monitor_mode(&orchestrator).await,
        Mode::Manual => manual_mode(&orchestrator).await,
    };

    orchestrator.shutdown().await;
    result
}

async fn monitor_mode<P: Projector, S: Screen, A: Amplifier>(
    orchestrator: &DeviceOrchestrator<P, S, A>,
) -> Result<()> {
    let mut monitor = Monitor::new(orchestrator.clone());
    monitor.start();

    tokio::select! {
        result = monitor.join() => return result,
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    monitor.stop().await
}

async fn manual_mode<P: Projector, S: Screen, A: Amplifier>(
    orchestrator: &DeviceOrchestrator<P, S, A>,
) -> Result<()> {
    orchestrator.home_screen().await?;

    println!("{}", MANUAL_HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(line) = line else {
            break;
        };

        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => continue,
            ["status"] => print_json(&orchestrator.status().await)?,
            ["screen", "lower"] => print_json(&orchestrator.lower_screen().await)?,
            ["screen", "raise"] => print_json(&orchestrator.raise_screen().await)?,
            ["projector", "on"] => print_json(&orchestrator.projector_on().await)?,
            ["projector", "off"] => print_json(&orchestrator.projector_off().await)?,
            ["quit"] | ["exit"] => break,
            _ => println!("Unknown command '{}'. {}", line.trim(), MANUAL_HELP),
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
