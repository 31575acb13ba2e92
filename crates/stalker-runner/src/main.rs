//! `stalker` — drive a serial BLE radio and log the events it reports.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use stalker_hci::DeviceDiscovery;
use stalker_runner::{DeviceSession, LogSink, RunnerConfig, SerialTransport};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Drive a serial BLE radio and log its events.
#[derive(Parser, Debug)]
#[command(name = "stalker", version, about)]
struct Args {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port (overrides config).
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate (overrides config).
    #[arg(short, long)]
    baud: Option<u32>,

    /// I/O timeout in milliseconds (overrides config).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Skip GAP_DeviceInit at start.
    #[arg(long)]
    no_init: bool,

    /// Send a device discovery request after start.
    #[arg(long)]
    discover: bool,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    duration: Option<u64>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run(Args::parse()) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.session.io_timeout_ms = timeout_ms;
    }
    if args.no_init {
        config.session.init_device = false;
    }
    config.discover |= args.discover;
    config.validate()?;

    if config.serial.port.is_empty() {
        return Err("no serial port given (use --port or the config file)".into());
    }

    let transport = SerialTransport::open(
        &config.serial.port,
        config.serial.baud_rate,
        config.session.io_timeout(),
    )?;
    info!(port = %config.serial.port, baud = config.serial.baud_rate, "opened serial port");

    let mut session = DeviceSession::new(transport, config.session.clone());
    let stop = session.stop_handle();
    ctrlc::set_handler(move || {
        info!("interrupted, stopping");
        stop.stop();
    })?;

    session.start(LogSink)?;
    if config.discover {
        session.enqueue(DeviceDiscovery::default().build()?);
    }

    if let Some(secs) = args.duration {
        let deadline = Instant::now() + Duration::from_secs(secs);
        while session.is_alive() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(100));
        }
        session.stop();
    }

    session.join(false)?;
    info!("session stopped");
    Ok(())
}
