//! Streams an AD7616 sequence to a CSV file from a Linux host.
//!
//! Log verbosity follows `RUST_LOG`, defaulting to `info`.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use ad7616::config::Config;
use ad7616::linux;
use ad7616::params::Range;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};

#[derive(Clone, Copy, ValueEnum)]
enum InputRange {
    /// ±2.5 V
    #[value(name = "2.5")]
    PlusMinus2_5V,
    /// ±5 V
    #[value(name = "5")]
    PlusMinus5V,
    /// ±10 V
    #[value(name = "10")]
    PlusMinus10V,
}

impl From<InputRange> for Range {
    fn from(range: InputRange) -> Self {
        match range {
            InputRange::PlusMinus2_5V => Range::PlusMinus2_5V,
            InputRange::PlusMinus5V => Range::PlusMinus5V,
            InputRange::PlusMinus10V => Range::PlusMinus10V,
        }
    }
}

#[derive(Parser)]
#[command(name = "ad7616-logger")]
#[command(about = "Stream AD7616 conversion sweeps to a CSV file", long_about = None)]
struct Args {
    /// SPI bus number
    #[arg(long, default_value_t = 1)]
    bus: u8,

    /// Chip-select on the bus
    #[arg(long, default_value_t = 0)]
    device: u8,

    /// Log every register transfer and raw conversion word
    #[arg(long)]
    diagnostics: bool,

    /// GPIO character device holding CONVST and BUSY
    #[arg(long, default_value = "/dev/gpiochip0")]
    chip: String,

    /// CONVST line offset
    #[arg(long, default_value_t = 17)]
    convst: u32,

    /// BUSY line offset
    #[arg(long, default_value_t = 27)]
    busy: u32,

    /// Sweep period in microseconds
    #[arg(long, default_value_t = 1000)]
    period_us: u64,

    /// How long to stream, in seconds
    #[arg(long, default_value_t = 1)]
    seconds: u64,

    /// Directory of the CSV log
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// CSV log file name
    #[arg(long, default_value = "ad7616.csv")]
    file: String,

    /// Input range of all sixteen channels, in volts
    #[arg(long, value_enum, default_value = "10")]
    range: InputRange,

    /// A-side channels of the sequence
    #[arg(long, value_delimiter = ',', default_values_t = [0u8, 1],
          value_parser = clap::value_parser!(u8).range(0..8))]
    a: Vec<u8>,

    /// B-side channels of the sequence
    #[arg(long, value_delimiter = ',', default_values_t = [0u8, 1],
          value_parser = clap::value_parser!(u8).range(0..8))]
    b: Vec<u8>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_micros()
        .init();

    let args = Args::parse();
    if args.a.len() != args.b.len() {
        bail!(
            "--a lists {} channels but --b lists {}",
            args.a.len(),
            args.b.len()
        );
    }
    if args.period_us == 0 {
        bail!("--period-us must be non-zero");
    }

    let config = Config::new()
        .bus(args.bus, args.device)
        .diagnostics(args.diagnostics)
        .range_all(args.range.into())
        .build();

    let convst = linux::request_line(&args.chip, args.convst, true)
        .with_context(|| format!("requesting CONVST line {} on {}", args.convst, args.chip))?;
    let busy = linux::request_line(&args.chip, args.busy, false)
        .with_context(|| format!("requesting BUSY line {} on {}", args.busy, args.chip))?;
    let mut session = linux::open(config, convst, busy)
        .with_context(|| format!("opening /dev/spidev{}.{}", args.bus, args.device))?;

    session
        .define_sequence(&args.a, &args.b)
        .context("defining the conversion sequence")?;
    session
        .start(Duration::from_micros(args.period_us), &args.dir, &args.file)
        .with_context(|| format!("starting stream to {}", args.dir.join(&args.file).display()))?;
    thread::sleep(Duration::from_secs(args.seconds));
    let report = session.stop().context("stopping the stream")?;

    log::info!(
        "{} sweeps written to {} ({} overruns)",
        report.sweeps,
        report.path.display(),
        report.overruns
    );
    session.close().context("closing the device")?;
    Ok(())
}
