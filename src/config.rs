//! Configuration primitives for the AD7616 driver.

use crate::error::ConfigError;
use crate::params::{check_channel, Oversampling, Range, Side, CHANNELS_PER_SIDE};

/// Default SPI clock rate (the part accepts up to 50 MHz).
pub const DEFAULT_MAX_SPEED_HZ: u32 = 10_000_000;

/// User-facing configuration for one AD7616 session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// SPI bus number (`/dev/spidev<bus>.<device>` on Linux).
    pub bus: u8,
    /// Chip-select / device number on the bus.
    pub device: u8,
    /// SPI clock rate in hertz.
    pub max_speed_hz: u32,
    /// Logs every register transfer and raw conversion word at debug level.
    pub diagnostics: bool,
    /// Oversampling ratio programmed at initialization.
    pub oversampling: Oversampling,
    /// Input range of `VA0..VA7`.
    pub ranges_a: [Range; CHANNELS_PER_SIDE as usize],
    /// Input range of `VB0..VB7`.
    pub ranges_b: [Range; CHANNELS_PER_SIDE as usize],
}

impl Config {
    /// Begins building a [`Config`] using the builder pattern.
    pub fn new() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Checks whether this configuration can be applied.
    pub fn validate(&self) -> core::result::Result<(), ConfigError> {
        if self.max_speed_hz == 0 {
            return Err(ConfigError::ZeroClock);
        }

        Ok(())
    }

    /// Returns the configured range of `channel` on `side`.
    pub fn range(&self, side: Side, channel: u8) -> core::result::Result<Range, ConfigError> {
        let channel = check_channel(channel)? as usize;
        Ok(match side {
            Side::A => self.ranges_a[channel],
            Side::B => self.ranges_b[channel],
        })
    }
}

/// Builder for [`Config`] allowing piecemeal construction.
#[derive(Debug, Clone, Copy)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Creates a new builder seeded with [`Config::default()`].
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Selects the SPI bus and chip-select.
    pub fn bus(mut self, bus: u8, device: u8) -> Self {
        self.config.bus = bus;
        self.config.device = device;
        self
    }

    /// Overrides the SPI clock rate.
    pub fn max_speed_hz(mut self, hz: u32) -> Self {
        self.config.max_speed_hz = hz;
        self
    }

    /// Enables or disables diagnostic logging.
    pub fn diagnostics(mut self, enabled: bool) -> Self {
        self.config.diagnostics = enabled;
        self
    }

    /// Sets the oversampling ratio.
    pub fn oversampling(mut self, oversampling: Oversampling) -> Self {
        self.config.oversampling = oversampling;
        self
    }

    /// Sets the same range on all sixteen inputs.
    pub fn range_all(mut self, range: Range) -> Self {
        self.config.ranges_a = [range; CHANNELS_PER_SIDE as usize];
        self.config.ranges_b = [range; CHANNELS_PER_SIDE as usize];
        self
    }

    /// Sets the range of a single input.
    pub fn range(
        mut self,
        side: Side,
        channel: u8,
        range: Range,
    ) -> core::result::Result<Self, ConfigError> {
        let channel = check_channel(channel)? as usize;
        match side {
            Side::A => self.config.ranges_a[channel] = range,
            Side::B => self.config.ranges_b[channel] = range,
        }
        Ok(self)
    }

    /// Finalizes the builder and returns the [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: 1,
            device: 0,
            max_speed_hz: DEFAULT_MAX_SPEED_HZ,
            diagnostics: false,
            oversampling: Oversampling::None,
            ranges_a: [Range::PlusMinus10V; CHANNELS_PER_SIDE as usize],
            ranges_b: [Range::PlusMinus10V; CHANNELS_PER_SIDE as usize],
        }
    }
}
