//! Free-running acquisition writing one CSV record per sweep.
//!
//! The acquisition thread owns the driver for as long as it runs, so nothing
//! else can touch the bus. [`Acquisition::stop`] hands it back once the log has
//! been flushed and closed.
//!
//! Log format, appended to `directory/file_name`:
//!
//! ```text
//! index,elapsed_us,A0,A1,B0,B1
//! 0,12,2561,2562,2816,2817
//! ```
//!
//! The header is written only when the file is empty; appending to a log whose
//! header names other channels fails with [`Error::Log`]. `elapsed_us` counts
//! from the start of this acquisition; codes are raw unsigned 16-bit values.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::device::Ad7616;
use crate::error::{ConfigError, Error, Result};
use crate::interface::Ad7616Interface;
use crate::sequence::Sequence;

/// Summary returned once an acquisition has stopped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamReport {
    /// Number of sweeps written to the log.
    pub sweeps: u64,
    /// Number of periods skipped because a sweep ran past its deadline.
    pub overruns: u64,
    /// Log file the records were appended to.
    pub path: PathBuf,
}

struct SampleLog {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl SampleLog {
    /// Opens the log for appending. An existing log must carry the same columns.
    fn open(directory: &Path, file_name: &str, sequence: &Sequence) -> io::Result<Self> {
        fs::create_dir_all(directory)?;
        let path = directory.join(file_name);
        let header = Self::header(sequence);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let empty = file.metadata()?.len() == 0;
        if !empty {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(&path)?;
            let mut existing = csv::StringRecord::new();
            reader.read_record(&mut existing)?;
            if !existing.iter().eq(header.iter()) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "existing log has different columns",
                ));
            }
        }

        let mut writer = csv::Writer::from_writer(file);
        if empty {
            writer.write_record(&header)?;
        }
        Ok(Self { writer, path })
    }

    fn header(sequence: &Sequence) -> csv::StringRecord {
        let mut header = csv::StringRecord::from(vec!["index", "elapsed_us"]);
        for pair in sequence.pairs() {
            header.push_field(&format!("A{}", pair.a));
        }
        for pair in sequence.pairs() {
            header.push_field(&format!("B{}", pair.b));
        }
        header
    }

    fn append(&mut self, index: u64, elapsed: Duration, values: &[u16]) -> io::Result<()> {
        let fields = [index.to_string(), elapsed.as_micros().to_string()]
            .into_iter()
            .chain(values.iter().map(u16::to_string));
        self.writer.write_record(fields)?;
        Ok(())
    }

    fn finish(mut self) -> io::Result<()> {
        self.writer.flush()?;
        let file = self.writer.into_inner().map_err(|err| err.into_error())?;
        file.sync_all()
    }
}

fn log_error<E>(path: &Path, err: io::Error) -> Error<E> {
    error!("sample log {}: {}", path.display(), err);
    Error::Log(err.kind())
}

type Outcome<IFACE, E> = (Ad7616<IFACE>, Result<StreamReport, E>);

/// A running acquisition.
pub struct Acquisition<IFACE>
where
    IFACE: Ad7616Interface,
{
    stop: Sender<()>,
    handle: JoinHandle<Outcome<IFACE, IFACE::Error>>,
    path: PathBuf,
}

impl<IFACE> Acquisition<IFACE>
where
    IFACE: Ad7616Interface + Send + 'static,
    IFACE::Error: Send + 'static,
{
    /// Starts sweeping the driver's sequence every `period`, appending to
    /// `directory/file_name`.
    ///
    /// The first sweep is taken immediately. On failure the driver is handed
    /// back together with the error.
    pub fn start(
        driver: Ad7616<IFACE>,
        period: Duration,
        directory: &Path,
        file_name: &str,
    ) -> core::result::Result<Self, (Ad7616<IFACE>, Error<IFACE::Error>)> {
        if period.is_zero() {
            return Err((driver, Error::Configuration(ConfigError::ZeroPeriod)));
        }
        let sequence = match driver.sequence() {
            Some(sequence) => *sequence,
            None => return Err((driver, Error::SequenceNotDefined)),
        };

        let log = match SampleLog::open(directory, file_name, &sequence) {
            Ok(log) => log,
            Err(err) => {
                let err = log_error(&directory.join(file_name), err);
                return Err((driver, err));
            }
        };
        let path = log.path.clone();

        info!(
            "streaming {} pairs every {} us to {}",
            sequence.len(),
            period.as_micros(),
            path.display()
        );

        let (stop, stop_rx) = mpsc::channel();
        let handle = thread::spawn(move || run(driver, log, period, stop_rx));
        Ok(Self { stop, handle, path })
    }

    /// Log file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Signals the loop, waits until it has flushed and closed the log, and
    /// returns the driver with the outcome of the run.
    pub fn stop(self) -> Outcome<IFACE, IFACE::Error> {
        // A send error means the loop already ended on its own.
        let _ = self.stop.send(());
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(payload) => std::panic::resume_unwind(payload),
        }
    }
}

fn run<IFACE>(
    mut driver: Ad7616<IFACE>,
    mut log: SampleLog,
    period: Duration,
    stop: Receiver<()>,
) -> Outcome<IFACE, IFACE::Error>
where
    IFACE: Ad7616Interface,
{
    let sweep_len = driver.sequence().map_or(0, Sequence::sweep_len);
    let mut values = vec![0u16; sweep_len];
    let mut report = StreamReport {
        path: log.path.clone(),
        ..StreamReport::default()
    };

    let start = Instant::now();
    let mut deadline = start;
    let result = loop {
        if let Err(err) = driver.read_conversions(&mut values) {
            error!("sweep {} failed, stopping acquisition", report.sweeps);
            break Err(err);
        }
        if let Err(err) = log.append(report.sweeps, start.elapsed(), &values) {
            break Err(log_error(&log.path, err));
        }
        report.sweeps += 1;

        deadline += period;
        let now = Instant::now();
        while deadline < now {
            deadline += period;
            report.overruns += 1;
        }

        match stop.recv_timeout(deadline - now) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break Ok(()),
            Err(RecvTimeoutError::Timeout) => {}
        }
    };

    let path = log.path.clone();
    let flushed = log.finish().map_err(|err| log_error(&path, err));
    debug!(
        "acquisition ended after {} sweeps ({} overruns)",
        report.sweeps, report.overruns
    );

    let result = result.and(flushed).map(|()| report);
    (driver, result)
}
