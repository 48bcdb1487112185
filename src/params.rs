//! Strongly typed parameter enumerations for the AD7616 driver.
//!
//! These enums map directly to datasheet field encodings and are used across
//! [`Config`](crate::config::Config) and the high-level driver APIs. Prefer these
//! types over raw integers to keep configuration values valid and explicit.
//!
//! # Examples
//!
//! ```rust
//! use ad7616::params::{Oversampling, Range, Side};
//!
//! let range = Range::PlusMinus5V;
//! let os = Oversampling::Os16;
//! let _ = (range, os, Side::A);
//! ```

use modular_bitfield::prelude::Specifier;

use crate::error::ConfigError;

/// Number of analog inputs on each side (`VA0..VA7`, `VB0..VB7`).
pub const CHANNELS_PER_SIDE: u8 = 8;

/// Input range selection, two bits per channel in the range registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Range {
    /// ±10 V span (power-on default).
    #[default]
    PlusMinus10V = 0b00,
    /// ±2.5 V span.
    PlusMinus2_5V = 0b01,
    /// ±5 V span.
    PlusMinus5V = 0b10,
}

impl Range {
    /// Returns the two-bit field encoding.
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Decodes a two-bit field. `0b11` also selects ±10 V on the part.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => Self::PlusMinus2_5V,
            0b10 => Self::PlusMinus5V,
            _ => Self::PlusMinus10V,
        }
    }
}

/// Oversampling ratio encoded in `CONFIGURATION.OS[2:0]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Specifier)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[bits = 3]
pub enum Oversampling {
    /// No oversampling.
    None = 0b000,
    /// 2x.
    Os2 = 0b001,
    /// 4x.
    Os4 = 0b010,
    /// 8x.
    Os8 = 0b011,
    /// 16x.
    Os16 = 0b100,
    /// 32x.
    Os32 = 0b101,
    /// 64x.
    Os64 = 0b110,
    /// 128x.
    Os128 = 0b111,
}

impl Oversampling {
    /// Returns the number of samples averaged per conversion result.
    pub const fn ratio(self) -> u32 {
        1 << (self as u32)
    }
}

/// Selects one of the two simultaneously sampled ADC sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Side {
    /// Channels `VA0..VA7`.
    A,
    /// Channels `VB0..VB7`.
    B,
}

/// Checks that `channel` names one of the eight analog inputs of a side.
pub const fn check_channel(channel: u8) -> core::result::Result<u8, ConfigError> {
    if channel < CHANNELS_PER_SIDE {
        Ok(channel)
    } else {
        Err(ConfigError::ChannelOutOfRange(channel))
    }
}
