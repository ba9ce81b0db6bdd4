// src/main.rs
//! gps-timesync - set the system clock from a serial GPS receiver

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use gps_timesync::{
    device::{self, DeviceSession},
    gps::simulator::{Simulator, SimulatorConfig},
    logging, system, CancelToken, ClockSetter, DryRunClock, GpsError, SessionConfig, SystemClock,
    TerminalDisplay, TimesyncConfig,
};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "gps-timesync",
    version,
    about = "Synchronize the system clock with a GPS receiver"
)]
struct Cli {
    /// Serial device (e.g. /dev/ttyUSB0 or COM3); scanned for when omitted
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Baud rate [default: 9600]
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Log every skipped line
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Set the system clock from the first valid RMC sentence
    Sync {
        /// Seconds to wait for a valid fix
        #[arg(long)]
        timeout: Option<u64>,
        /// Report the time without setting the clock
        #[arg(long)]
        dry_run: bool,
        /// Skip the root check and let the clock command fail on its own
        #[arg(long, visible_alias = "nr")]
        no_root: bool,
    },
    /// Show live GPS data until Ctrl+C
    Monitor,
    /// Check whether a device is sending NMEA data
    Probe,
    /// List candidate serial devices
    Scan,
    /// Report GPS devices as they are plugged in and removed
    Watch {
        /// Seconds between scans
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Write simulated NMEA sentences
    Simulate(SimulateArgs),
}

#[derive(Debug, Args)]
struct SimulateArgs {
    /// Talker ID (GP, GN, GL or GA)
    #[arg(long, default_value = "GP")]
    talker: String,
    /// Satellites in use reported by GGA
    #[arg(long, default_value_t = 7, allow_negative_numbers = true)]
    sats: i32,
    /// Move along a bearing instead of standing still
    #[arg(long = "move")]
    moving: bool,
    /// Degrees per second when moving
    #[arg(long, default_value_t = 0.0001)]
    speed: f64,
    /// Bearing in degrees when moving
    #[arg(long, default_value_t = 45.0)]
    bearing: f64,
    /// Serial device to write to instead of stdout
    #[arg(long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => TimesyncConfig::load_from(path)?,
        None => TimesyncConfig::load().unwrap_or_default(),
    };
    apply_overrides(&mut config, &cli);
    config.validate()?;

    logging::init(config.debug);

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            on_interrupt.cancel();
        }
    });

    match run(cli.command, &config, &cancel).await {
        Err(GpsError::Cancelled) => {
            info!("cancelled");
            Ok(())
        }
        result => result.context("gps-timesync failed"),
    }
}

fn apply_overrides(config: &mut TimesyncConfig, cli: &Cli) {
    if let Some(device) = &cli.device {
        config.device = Some(device.clone());
    }
    if let Some(baud) = cli.baud {
        config.baud_rate = baud;
    }
    config.debug |= cli.debug;

    match &cli.command {
        Command::Sync { timeout: Some(secs), .. } => config.sync_timeout_secs = *secs,
        Command::Watch { interval: Some(secs) } => config.watch_interval_secs = *secs,
        _ => {}
    }
}

async fn run(
    command: Command,
    config: &TimesyncConfig,
    cancel: &CancelToken,
) -> gps_timesync::Result<()> {
    let session_config = config.session_config();

    match command {
        Command::Sync {
            dry_run, no_root, ..
        } => {
            let mut clock: Box<dyn ClockSetter> = if dry_run {
                Box::new(DryRunClock::default())
            } else {
                system::ensure_supported_platform()?;
                if no_root {
                    warn!("root check skipped");
                } else {
                    system::ensure_root()?;
                }
                Box::new(SystemClock::new())
            };
            let path = resolve_device(config, &session_config, cancel).await?;
            let session = DeviceSession::open(&path, session_config, cancel.clone())?;
            let outcome = session.sync_once(clock.as_mut()).await?;
            let verb = if dry_run { "GPS time is" } else { "System time set to" };
            println!(
                "{} {} ({} lines read)",
                verb,
                outcome.time.format("%Y-%m-%d %H:%M:%S UTC"),
                outcome.lines_read
            );
            Ok(())
        }
        Command::Monitor => {
            let path = resolve_device(config, &session_config, cancel).await?;
            println!("Monitoring {} (Ctrl+C to exit)", path);
            let session = DeviceSession::open(&path, session_config, cancel.clone())?;
            session.monitor(&mut TerminalDisplay::new()).await
        }
        Command::Probe => {
            let paths = match &config.device {
                Some(path) => vec![path.clone()],
                None => device::enumerate_candidate_devices()?,
            };
            let mut found = false;
            for path in paths {
                let opened = DeviceSession::open(&path, session_config.clone(), cancel.clone());
                let session = match opened {
                    Ok(session) => session,
                    Err(e) => {
                        println!("{}: {}", path, e);
                        continue;
                    }
                };
                if session.probe().await? {
                    println!("{}: GPS data detected", path);
                    found = true;
                } else {
                    println!("{}: no GPS data", path);
                }
            }
            if found {
                Ok(())
            } else {
                Err(GpsError::NoGpsDevices)
            }
        }
        Command::Scan => {
            for path in device::enumerate_candidate_devices()? {
                println!("{}", path);
            }
            Ok(())
        }
        Command::Watch { .. } => {
            println!("Watching for GPS devices (Ctrl+C to exit)");
            device::watch_devices(config.watch_interval(), &session_config, cancel, |event| {
                println!("{}", event)
            })
            .await
        }
        Command::Simulate(args) => simulate(args, config, cancel).await,
    }
}

async fn resolve_device(
    config: &TimesyncConfig,
    session_config: &SessionConfig,
    cancel: &CancelToken,
) -> gps_timesync::Result<String> {
    match &config.device {
        Some(path) => Ok(path.clone()),
        None => device::find_gps_device(session_config, cancel).await,
    }
}

async fn simulate(
    args: SimulateArgs,
    config: &TimesyncConfig,
    cancel: &CancelToken,
) -> gps_timesync::Result<()> {
    if args.sats < 0 {
        warn!(requested = args.sats, "negative satellite count, using 0");
    }
    let satellites_in_use = u8::try_from(args.sats.max(0)).unwrap_or(u8::MAX);

    let mut simulator = Simulator::new(SimulatorConfig {
        talker: args.talker,
        satellites_in_use,
        speed_deg_per_sec: if args.moving { args.speed } else { 0.0 },
        bearing_deg: args.bearing,
        ..SimulatorConfig::default()
    })?;

    match args.output {
        Some(path) => {
            let mut port = device::open_device(&path, config.baud_rate)?;
            info!(path = %path, "simulating on serial device");
            simulator.run(&mut port, cancel).await
        }
        None => simulator.run(&mut tokio::io::stdout(), cancel).await,
    }
}
