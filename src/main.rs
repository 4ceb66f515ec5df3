use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use servo_serial::serial::{DeviceLock, FileLock, SerialLink};
use servo_serial::util::hex::{format_hex_compact, parse_hex_lenient, pretty_hex};
use servo_serial::{
    init_logger, log_info, BaudRequest, DeviceScanner, LinkConfig, SerialAdapter, ServoFamily,
};

#[derive(Parser)]
#[command(name = "servo-serial")]
#[command(about = "CLI tool for smart servo serial links")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List USB-serial and ACM adapters
    Scan {
        /// Keep nodes the current user cannot open
        #[arg(long)]
        no_probe: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show how a baud rate or baud index would be applied
    Resolve {
        /// Bit rate, or a baud index when below 255
        baud: u32,
        #[arg(short, long, default_value = "unknown")]
        family: ServoFamily,
        #[arg(short, long, default_value = "unknown")]
        adapter: SerialAdapter,
        #[arg(long)]
        json: bool,
    },
    /// Tell whether another instance holds a device
    LockStatus {
        path: String,
        #[arg(long)]
        lock_dir: Option<PathBuf>,
    },
    /// Remove the lock file of a device nobody holds
    Unlock {
        path: String,
        #[arg(long)]
        lock_dir: Option<PathBuf>,
    },
    /// Send a hex frame and print the answer
    Send {
        /// Device path, or "auto"
        device: String,
        /// Frame to transmit, e.g. "FF FF 01 02 01 FB"
        frame: String,
        /// Bit rate, or a baud index when below 255
        #[arg(short, long, default_value = "57600")]
        baud: u32,
        #[arg(short, long, default_value = "unknown")]
        family: ServoFamily,
        #[arg(short, long, default_value = "unknown")]
        adapter: SerialAdapter,
        /// Number of bytes to wait for
        #[arg(short, long, default_value = "0")]
        expect: usize,
        /// Fixed receive budget instead of the computed one
        #[arg(long)]
        timeout_ms: Option<f64>,
        /// Try to enable the driver's low latency mode
        #[arg(long)]
        high_speed: bool,
        #[arg(long)]
        lock_dir: Option<PathBuf>,
    },
}

fn file_lock(lock_dir: Option<PathBuf>) -> FileLock {
    lock_dir.map(FileLock::new).unwrap_or_default()
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { no_probe, json } => {
            let report = DeviceScanner::default().with_probe(!no_probe).scan_report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{} serial port(s) found", report.count());
                for port in &report.ports {
                    println!("  {port}");
                }
                for port in &report.rejected {
                    println!("  {port} (no access)");
                }
            }
        }
        Commands::Resolve {
            baud,
            family,
            adapter,
            json,
        } => {
            let request = BaudRequest::from_raw(baud);
            let resolution = LinkConfig::new(servo_serial::constants::AUTO_DEVICE, request)
                .with_family(family)
                .with_adapter(adapter)
                .resolver()
                .resolve(request);
            let report = resolution.report(request);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                match resolution.standard_id() {
                    Some(id) => println!("{request:?} -> standard {id} bps"),
                    None => println!("{request:?} -> custom speed {} bps", resolution.rate()),
                }
            }
        }
        Commands::LockStatus { path, lock_dir } => {
            let lock = file_lock(lock_dir);
            let state = if lock.is_locked(&path) { "locked" } else { "free" };
            println!("{path}: {state} ({})", lock.lock_path_for(&path).display());
        }
        Commands::Unlock { path, lock_dir } => {
            let lock = file_lock(lock_dir);
            let removed = lock
                .clear_stale(&path)
                .with_context(|| format!("cannot unlock {path}"))?;
            if removed {
                log_info(&format!("Removed lock for {path}"));
            } else {
                println!("{path}: no lock file");
            }
        }
        Commands::Send {
            device,
            frame,
            baud,
            family,
            adapter,
            expect,
            timeout_ms,
            high_speed,
            lock_dir,
        } => {
            let data = parse_hex_lenient(&frame).context("invalid frame")?;
            let config = LinkConfig::new(device, BaudRequest::from_raw(baud))
                .with_family(family)
                .with_adapter(adapter);

            let mut link = SerialLink::with_parts(
                config,
                servo_serial::serial::NativeBackend,
                file_lock(lock_dir),
            );
            link.open().context("cannot open serial link")?;
            if high_speed && !link.switch_high_speed() {
                println!("low latency mode unavailable");
            }

            let mut buf = vec![0u8; expect];
            let n = link.exchange(&data, &mut buf, timeout_ms)?;
            println!("tx {}", format_hex_compact(&data));

            if expect > 0 {
                println!("rx {n}/{expect} bytes");
                if n > 0 {
                    println!("{}", pretty_hex(&buf[..n], 16));
                }
                if n < expect {
                    link.close();
                    bail!("short read: {n} of {expect} bytes");
                }
            }
            link.close();
        }
    }

    Ok(())
}
