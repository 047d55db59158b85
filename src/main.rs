use anyhow::{Context, Result};
use clap::Parser;
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use wipe_sentinel::selection::{DeviceSource, InventorySource, SessionOutcome};
use wipe_sentinel::ui::table::render_device_table;
use wipe_sentinel::*;

#[derive(Parser)]
#[command(name = "wipe-sentinel")]
#[command(about = "Classify block devices by risk and DoD-wipe a confirmed selection concurrently")]
#[command(version = "1.0.0")]
struct Cli {
    /// Delay between consecutive wipe task launches (0-30s, e.g. "5" or "10s")
    #[arg(long, value_name = "DURATION", value_parser = parse_secs)]
    stagger: Option<u64>,

    /// Progress refresh interval (2-5s, e.g. "3" or "3s")
    #[arg(long, value_name = "DURATION", value_parser = parse_secs)]
    poll_interval: Option<u64>,

    /// Directory for per-device wipe reports
    #[arg(long, value_name = "DIR")]
    report_dir: Option<PathBuf>,

    /// Directory for the log file
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Print the classified device list and exit
    #[arg(long)]
    list: bool,
}

const REQUIRED_TOOLS: [&str; 3] = ["lsblk", "umount", "swapoff"];
const EXIT_SETUP_ERROR: u8 = 1;
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_SETUP_ERROR)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = load_settings(&cli)?;
    let _log_guard = logging::init(&settings.log_dir, cli.debug)
        .with_context(|| format!("cannot open log directory {}", settings.log_dir.display()))?;
    info!(?settings, "wipe-sentinel starting");

    check_tools()?;
    setup_signal_handlers()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let inventory = DeviceInventory::system(&settings);
    let mut source = InventorySource::new(&inventory, runtime.handle().clone());

    let mut devices = source.scan().context("initial device scan failed")?;
    if devices.is_empty() {
        return Err(WipeError::NoDevices.into());
    }

    if cli.list {
        print!("{}", render_device_table(&devices));
        return Ok(ExitCode::SUCCESS);
    }

    if !is_root() {
        eprintln!("Error: This program requires root privileges.");
        eprintln!("Please run with sudo or as root user.");
        return Ok(ExitCode::from(EXIT_SETUP_ERROR));
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    let selection = loop {
        let mut session = SelectionSession::new(&mut source, devices);
        let outcome = session.run(&mut input, &mut out)?;
        devices = session.devices().to_vec();

        let mut selection = match outcome {
            SessionOutcome::Quit => {
                println!("No devices were wiped.");
                return Ok(ExitCode::SUCCESS);
            }
            SessionOutcome::Accepted(selection) => selection,
        };

        match ConfirmationGate::prompt(&selection, &mut input, &mut out) {
            Ok(()) => {}
            Err(WipeError::ConfirmationMismatch) => {
                println!("Confirmation did not match. Nothing was wiped; back to device selection.");
                continue;
            }
            Err(e) => return Err(e.into()),
        }

        // Devices may have been unplugged or swapped while the operator typed
        let current = source
            .current_devices()
            .context("device re-scan before wipe failed")?;
        for path in selection.retain_present(&current) {
            warn!(device = %path, "Selected device vanished or changed, skipping");
            println!("Skipping {}: device disappeared or changed since selection", path);
        }
        if selection.is_empty() {
            return Err(WipeError::NoDevices.into());
        }

        break selection;
    };

    let orchestrator = WipeOrchestrator::system(&settings);
    let monitor = ProgressMonitor::new(settings.poll_interval());
    info!(run_id = %orchestrator.run_id(), devices = ?selection.paths(), "Wipe run starting");

    set_wipe_active(true);
    let summary = runtime.block_on(async {
        let handles = orchestrator.launch(&selection);
        monitor.run(handles, &mut io::stdout()).await
    });
    set_wipe_active(false);
    let summary = summary?;

    print!("{}", summary.render());
    runtime.shutdown_timeout(Duration::from_secs(1));

    if summary.interrupted {
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}

/// Config file and environment first, CLI flags on top, then clamped
fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref())?;

    if let Some(stagger) = cli.stagger {
        settings.stagger_delay_secs = stagger;
    }
    if let Some(poll) = cli.poll_interval {
        settings.poll_interval_secs = poll;
    }
    if let Some(dir) = &cli.report_dir {
        settings.report_dir = dir.clone();
    }
    if let Some(dir) = &cli.log_dir {
        settings.log_dir = dir.clone();
    }

    Ok(settings.normalized())
}

/// Whole seconds from a bare number or a humantime duration such as "1m 30s"
fn parse_secs(value: &str) -> std::result::Result<u64, String> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Ok(secs);
    }
    humantime::parse_duration(value.trim())
        .map(|d| d.as_secs())
        .map_err(|e| format!("invalid duration '{}': {}", value, e))
}

fn check_tools() -> Result<()> {
    match missing_tool(std::env::var_os("PATH")) {
        Some(tool) => Err(WipeError::MissingTool(tool.to_string()).into()),
        None => Ok(()),
    }
}

/// First required tool not found in any directory of `path_var`
fn missing_tool(path_var: Option<OsString>) -> Option<&'static str> {
    let dirs: Vec<PathBuf> = path_var
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default();

    REQUIRED_TOOLS
        .into_iter()
        .find(|tool| !dirs.iter().any(|dir| dir.join(tool).is_file()))
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

// Signal handler: defer to the progress monitor while wiping, exit otherwise
fn setup_signal_handlers() -> Result<()> {
    use signal_hook::{
        consts::{SIGINT, SIGTERM},
        iterator::Signals,
    };

    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    std::thread::spawn(move || {
        for _ in signals.forever() {
            wipe_sentinel::set_interrupted();

            if wipe_sentinel::is_wipe_active() {
                eprintln!("\n\nInterrupt received! Cancelling running wipe tasks...");
            } else {
                eprintln!("\nInterrupted.");
                std::process::exit(i32::from(EXIT_INTERRUPTED));
            }
        }
    });

    Ok(())
}
