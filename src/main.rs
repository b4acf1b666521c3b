//! bisque-devices: turn device specs into vfkit arguments.
//!
//! Reads device specs from the launcher config and from repeated `--device`
//! flags, validates them, and prints the encoded argument vector one token per
//! line for the process launcher to consume.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::debug;

use bisque_devices::config::{LauncherConfig, default_config_path};
use bisque_devices::{Device, DeviceError, logging};

/// Validate and encode vfkit device specs
#[derive(Parser, Debug)]
#[command(name = "bisque-devices", version, about = "Validate and encode vfkit device specs")]
struct Args {
    /// Launcher config file (default: ~/.config/bisque-devices/devices.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Device spec, e.g. virtio-blk,path=/vm/disk.img (repeatable)
    #[arg(short, long = "device", value_name = "SPEC")]
    devices: Vec<String>,

    /// Print the decoded devices as JSON instead of arguments
    #[arg(long, conflicts_with = "check")]
    json: bool,

    /// Only validate; print nothing on success
    #[arg(long)]
    check: bool,

    /// Log every decoded and encoded device
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = logging::init(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e
                .downcast_ref::<DeviceError>()
                .map_or(1, DeviceError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => LauncherConfig::load(path)?,
        None => LauncherConfig::load_default()?,
    };

    // Config devices first, then command-line devices in the order given.
    let mut devices = config.parse_devices()?;
    for spec in &args.devices {
        devices.push(Device::from_cmdline(spec)?);
    }
    if devices.is_empty() {
        bail!(
            "no devices given; pass --device or list them in {}",
            default_config_path().display()
        );
    }

    let tokens = Device::encode_all(&devices)?;
    debug!(devices = devices.len(), tokens = tokens.len(), "encoded devices");
    if args.check {
        return Ok(());
    }

    let mut stdout = std::io::stdout().lock();
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &devices)?;
        writeln!(stdout)?;
        return Ok(());
    }

    if let Some(vfkit) = &config.vfkit {
        writeln!(stdout, "{}", vfkit.display())?;
    }
    for token in &tokens {
        writeln!(stdout, "{token}")?;
    }
    Ok(())
}
