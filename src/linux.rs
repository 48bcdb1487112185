//! Linux userspace transport: spidev for the bus, GPIO character devices for
//! CONVST and BUSY.

use linux_embedded_hal::gpio_cdev::{Chip, LineRequestFlags};
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{CdevPin, CdevPinError, Delay, SPIError, SpidevDevice};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::interface::spi::{BusError, SpiInterface};
use crate::session::Session;

/// Transport used on Linux hosts.
pub type LinuxInterface = SpiInterface<SpidevDevice, CdevPin, CdevPin, Delay>;
/// Transport error on Linux hosts.
pub type LinuxError = BusError<SPIError, CdevPinError>;

/// Opens `/dev/spidev<bus>.<device>` in SPI mode 2 at the configured clock rate.
pub fn open_spidev(config: &Config) -> Result<SpidevDevice, LinuxError> {
    config.validate().map_err(Error::Configuration)?;

    let path = format!("/dev/spidev{}.{}", config.bus, config.device);
    let open_error = |err: SPIError| {
        error!("cannot open {}: {:?}", path, err);
        Error::DeviceOpen(BusError::Spi(err))
    };

    let mut spi = SpidevDevice::open(&path).map_err(open_error)?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(config.max_speed_hz)
        .mode(SpiModeFlags::SPI_MODE_2)
        .build();
    spi.configure(&options)
        .map_err(|err| open_error(SPIError::from(err)))?;

    debug!("{} configured at {} Hz", path, config.max_speed_hz);
    Ok(spi)
}

/// Requests one line of a GPIO chip as CONVST (`output`) or BUSY (input).
pub fn request_line(chip: &str, line: u32, output: bool) -> Result<CdevPin, LinuxError> {
    let (flags, label) = if output {
        (LineRequestFlags::OUTPUT, "ad7616-convst")
    } else {
        (LineRequestFlags::INPUT, "ad7616-busy")
    };

    let pin = Chip::new(chip)
        .and_then(|mut chip| chip.get_line(line))
        .and_then(|line| line.request(flags, 0, label))
        .map_err(CdevPinError::from)
        .and_then(|handle| CdevPin::new(handle).map_err(CdevPinError::from));

    pin.map_err(|err| {
        error!("cannot request {} line {}: {:?}", chip, line, err);
        Error::DeviceOpen(BusError::Pin(err))
    })
}

/// Opens a session on `config.bus` / `config.device` with the given CONVST and BUSY lines.
pub fn open(config: Config, convst: CdevPin, busy: CdevPin) -> Result<Session<LinuxInterface>, LinuxError> {
    let spi = open_spidev(&config)?;
    Session::open(SpiInterface::new(spi, convst, busy, Delay), config)
}
