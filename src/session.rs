//! Owned AD7616 session: one open device from `open` to `close`.
//!
//! Dropping a [`Session`] stops any running acquisition and releases the
//! interface, so every exit path closes the device.

use std::mem;
use std::path::Path;
use std::time::Duration;

use crate::config::Config;
use crate::device::Ad7616;
use crate::error::{Error, Result};
use crate::interface::Ad7616Interface;
use crate::params::{Range, Side};
use crate::registers::Register;
use crate::sequence::Conversion;
use crate::stream::{Acquisition, StreamReport};

enum State<IFACE: Ad7616Interface> {
    Idle(Ad7616<IFACE>),
    Streaming(Acquisition<IFACE>),
    Closed,
}

/// An open AD7616 with exclusive use of its bus.
pub struct Session<IFACE>
where
    IFACE: Ad7616Interface + Send + 'static,
    IFACE::Error: Send + 'static,
{
    state: State<IFACE>,
}

impl<IFACE, CommE> Session<IFACE>
where
    IFACE: Ad7616Interface<Error = CommE> + Send + 'static,
    CommE: Send + 'static,
{
    /// Initializes the device behind `interface` with `config`.
    ///
    /// Transport failures during initialization are reported as
    /// [`Error::DeviceOpen`].
    pub fn open(interface: IFACE, config: Config) -> Result<Self, CommE> {
        let mut driver = Ad7616::new(interface, config);
        driver.init().map_err(|err| match err {
            Error::Transfer(err) => Error::DeviceOpen(err),
            other => other,
        })?;

        if config.diagnostics {
            info!(
                "session open on bus {} device {} with diagnostics",
                config.bus, config.device
            );
        }
        Ok(Self {
            state: State::Idle(driver),
        })
    }

    /// Opens a session, runs `f` with it, and closes it on every exit path.
    pub fn with<T, F>(interface: IFACE, config: Config, f: F) -> Result<T, CommE>
    where
        F: FnOnce(&mut Self) -> Result<T, CommE>,
    {
        let mut session = Self::open(interface, config)?;
        let value = f(&mut session);
        let closed = session.close().map(|_| ());
        let value = value?;
        closed?;
        Ok(value)
    }

    fn driver(&mut self) -> Result<&mut Ad7616<IFACE>, CommE> {
        match &mut self.state {
            State::Idle(driver) => Ok(driver),
            State::Streaming(_) => Err(Error::StreamActive),
            State::Closed => Err(Error::Closed),
        }
    }

    /// Returns whether an acquisition currently owns the bus.
    pub fn is_streaming(&self) -> bool {
        matches!(self.state, State::Streaming(_))
    }

    /// Writes a 9-bit value to a register.
    pub fn write_register(&mut self, register: Register, value: u16) -> Result<(), CommE> {
        self.driver()?.write_register(register, value)
    }

    /// Reads a register.
    pub fn read_register(&mut self, register: Register) -> Result<u16, CommE> {
        self.driver()?.read_register(register)
    }

    /// Reads several registers; the result is positionally aligned with `registers`.
    pub fn read_registers(&mut self, registers: &[Register]) -> Result<Vec<u16>, CommE> {
        let mut values = vec![0u16; registers.len()];
        self.driver()?.read_registers(registers, &mut values)?;
        Ok(values)
    }

    /// Sets the input range of one channel.
    pub fn set_range(&mut self, side: Side, channel: u8, range: Range) -> Result<(), CommE> {
        self.driver()?.set_range(side, channel, range)
    }

    /// Reads the input range of one channel.
    pub fn range(&mut self, side: Side, channel: u8) -> Result<Range, CommE> {
        self.driver()?.range(side, channel)
    }

    /// Converts one channel pair simultaneously.
    pub fn convert_pair(&mut self, a: u8, b: u8) -> Result<Conversion, CommE> {
        self.driver()?.convert_pair(a, b)
    }

    /// Replaces the conversion sequence.
    pub fn define_sequence(&mut self, a_channels: &[u8], b_channels: &[u8]) -> Result<(), CommE> {
        self.driver()?.define_sequence(a_channels, b_channels)
    }

    /// Converts one sweep: all A-side codes in sequence order, then all B-side codes.
    pub fn read_conversions(&mut self) -> Result<Vec<u16>, CommE> {
        let driver = self.driver()?;
        let len = match driver.sequence() {
            Some(sequence) => sequence.sweep_len(),
            None => return Err(Error::SequenceNotDefined),
        };

        let mut values = vec![0u16; len];
        driver.read_conversions(&mut values)?;
        Ok(values)
    }

    /// Starts streaming the defined sequence every `period` to `directory/file_name`.
    pub fn start(
        &mut self,
        period: Duration,
        directory: impl AsRef<Path>,
        file_name: &str,
    ) -> Result<(), CommE> {
        match mem::replace(&mut self.state, State::Closed) {
            State::Idle(driver) => {
                match Acquisition::start(driver, period, directory.as_ref(), file_name) {
                    Ok(acquisition) => {
                        self.state = State::Streaming(acquisition);
                        Ok(())
                    }
                    Err((driver, err)) => {
                        self.state = State::Idle(driver);
                        Err(err)
                    }
                }
            }
            State::Streaming(acquisition) => {
                self.state = State::Streaming(acquisition);
                Err(Error::StreamActive)
            }
            State::Closed => Err(Error::Closed),
        }
    }

    /// Stops streaming and waits for the log to be flushed and closed.
    ///
    /// Does nothing when no acquisition is running.
    pub fn stop(&mut self) -> Result<StreamReport, CommE> {
        match mem::replace(&mut self.state, State::Closed) {
            State::Streaming(acquisition) => {
                let (driver, result) = acquisition.stop();
                self.state = State::Idle(driver);
                let report = result?;
                info!("stream stopped after {} sweeps", report.sweeps);
                Ok(report)
            }
            State::Idle(driver) => {
                self.state = State::Idle(driver);
                Ok(StreamReport::default())
            }
            State::Closed => Err(Error::Closed),
        }
    }

    /// Stops any acquisition and returns the interface.
    pub fn close(mut self) -> Result<IFACE, CommE> {
        let driver = match mem::replace(&mut self.state, State::Closed) {
            State::Idle(driver) => driver,
            State::Streaming(acquisition) => {
                let (driver, result) = acquisition.stop();
                result?;
                driver
            }
            State::Closed => return Err(Error::Closed),
        };

        let (interface, config) = driver.release();
        debug!("session on bus {} device {} closed", config.bus, config.device);
        Ok(interface)
    }
}

impl<IFACE> Drop for Session<IFACE>
where
    IFACE: Ad7616Interface + Send + 'static,
    IFACE::Error: Send + 'static,
{
    fn drop(&mut self) {
        if let State::Streaming(acquisition) = mem::replace(&mut self.state, State::Closed) {
            let (_, result) = acquisition.stop();
            if result.is_err() {
                warn!("acquisition failed before the session was dropped");
            }
        }
    }
}
