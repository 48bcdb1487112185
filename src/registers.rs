//! Register map definitions for the AD7616 ADC (software mode).
#![allow(unused_parens)]

use modular_bitfield::prelude::*;

use crate::error::ConfigError;
use crate::params::{Oversampling, Range, Side};

/// Register address of `CONFIGURATION`.
pub const REG_CONFIGURATION: u8 = 0x02;
/// Register address of `CHANNEL`.
pub const REG_CHANNEL: u8 = 0x03;
/// Register address of `INPUT_RANGE_A1` (`VA0..VA3`).
pub const REG_RANGE_A0_3: u8 = 0x04;
/// Register address of `INPUT_RANGE_A2` (`VA4..VA7`).
pub const REG_RANGE_A4_7: u8 = 0x05;
/// Register address of `INPUT_RANGE_B1` (`VB0..VB3`).
pub const REG_RANGE_B0_3: u8 = 0x06;
/// Register address of `INPUT_RANGE_B2` (`VB4..VB7`).
pub const REG_RANGE_B4_7: u8 = 0x07;
/// Address of the first sequencer stack register.
pub const REG_SEQUENCER_STACK: u8 = 0x20;

/// Depth of the sequencer stack.
pub const SEQUENCER_DEPTH: usize = 32;
/// Mask of the register data field carried in a 16-bit frame.
pub const DATA_MASK: u16 = 0x01FF;

/// User-accessible AD7616 registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// `CONFIGURATION` (0x02).
    Configuration,
    /// `CHANNEL` (0x03).
    ChannelSelect,
    /// Range of `VA0..VA3` (0x04).
    RangeA0_3,
    /// Range of `VA4..VA7` (0x05).
    RangeA4_7,
    /// Range of `VB0..VB3` (0x06).
    RangeB0_3,
    /// Range of `VB4..VB7` (0x07).
    RangeB4_7,
    /// Sequencer stack entry `0..=31` (0x20..=0x3F).
    SequencerStack(u8),
}

impl Register {
    /// Returns the 6-bit register address.
    pub fn address(self) -> core::result::Result<u8, ConfigError> {
        match self {
            Self::Configuration => Ok(REG_CONFIGURATION),
            Self::ChannelSelect => Ok(REG_CHANNEL),
            Self::RangeA0_3 => Ok(REG_RANGE_A0_3),
            Self::RangeA4_7 => Ok(REG_RANGE_A4_7),
            Self::RangeB0_3 => Ok(REG_RANGE_B0_3),
            Self::RangeB4_7 => Ok(REG_RANGE_B4_7),
            Self::SequencerStack(index) if (index as usize) < SEQUENCER_DEPTH => {
                Ok(REG_SEQUENCER_STACK + index)
            }
            Self::SequencerStack(index) => {
                Err(ConfigError::InvalidRegister(REG_SEQUENCER_STACK.wrapping_add(index)))
            }
        }
    }

    /// Returns the range register holding `channel` of `side`, and the slot within it.
    pub fn range_for(side: Side, channel: u8) -> (Self, u8) {
        let register = match (side, channel < 4) {
            (Side::A, true) => Self::RangeA0_3,
            (Side::A, false) => Self::RangeA4_7,
            (Side::B, true) => Self::RangeB0_3,
            (Side::B, false) => Self::RangeB4_7,
        };
        (register, channel & 0b11)
    }
}

impl TryFrom<u8> for Register {
    type Error = ConfigError;

    fn try_from(address: u8) -> core::result::Result<Self, Self::Error> {
        match address {
            REG_CONFIGURATION => Ok(Self::Configuration),
            REG_CHANNEL => Ok(Self::ChannelSelect),
            REG_RANGE_A0_3 => Ok(Self::RangeA0_3),
            REG_RANGE_A4_7 => Ok(Self::RangeA4_7),
            REG_RANGE_B0_3 => Ok(Self::RangeB0_3),
            REG_RANGE_B4_7 => Ok(Self::RangeB4_7),
            0x20..=0x3F => Ok(Self::SequencerStack(address - REG_SEQUENCER_STACK)),
            _ => Err(ConfigError::InvalidRegister(address)),
        }
    }
}

/// Bitfield representation of the `CONFIGURATION` register (address `0x02`).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    // CRC word appended to conversion results (bit 0).
    pub crc_enable: bool,
    // Status header appended to conversion results (bit 1).
    pub status_enable: bool,
    // Oversampling ratio (bits 4:2).
    pub oversampling: Oversampling,
    // Channel sequencer enable (bit 5).
    pub sequencer_enable: bool,
    // Burst mode: one CONVST converts the whole sequence (bit 6).
    pub burst_enable: bool,
    #[skip]
    __: B9,
}

/// Bitfield representation of the `CHANNEL` register (address `0x03`).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSelect {
    // A-side input (bits 3:0).
    pub a: B4,
    // B-side input (bits 7:4).
    pub b: B4,
    #[skip]
    __: B8,
}

/// Bitfield representation of one input range register (addresses `0x04..=0x07`).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRange {
    // Range of the first channel of the group (bits 1:0).
    pub slot0: B2,
    // Bits 3:2.
    pub slot1: B2,
    // Bits 5:4.
    pub slot2: B2,
    // Bits 7:6.
    pub slot3: B2,
    #[skip]
    __: B8,
}

impl InputRange {
    /// Builds a register value giving every slot the same range.
    pub fn uniform(range: Range) -> Self {
        Self::from_ranges([range; 4])
    }

    /// Builds a register value from four per-channel ranges.
    pub fn from_ranges(ranges: [Range; 4]) -> Self {
        Self::new()
            .with_slot0(ranges[0].bits())
            .with_slot1(ranges[1].bits())
            .with_slot2(ranges[2].bits())
            .with_slot3(ranges[3].bits())
    }

    /// Returns the range programmed for `slot` (`0..=3`).
    pub fn range(&self, slot: u8) -> Range {
        let bits = match slot & 0b11 {
            0 => self.slot0(),
            1 => self.slot1(),
            2 => self.slot2(),
            _ => self.slot3(),
        };
        Range::from_bits(bits)
    }

    /// Replaces the range programmed for `slot` (`0..=3`).
    pub fn set_range(&mut self, slot: u8, range: Range) {
        match slot & 0b11 {
            0 => self.set_slot0(range.bits()),
            1 => self.set_slot1(range.bits()),
            2 => self.set_slot2(range.bits()),
            _ => self.set_slot3(range.bits()),
        }
    }
}

/// Bitfield representation of a sequencer stack register (addresses `0x20..=0x3F`).
#[allow(unused_parens)]
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencerEntry {
    // A-side input (bits 3:0).
    pub a: B4,
    // B-side input (bits 7:4).
    pub b: B4,
    // Last entry of the sequence (bit 8).
    pub end: bool,
    #[skip]
    __: B7,
}

macro_rules! impl_u16_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<u16> for $ty {
                fn from(value: u16) -> Self {
                    Self::from_bytes(value.to_le_bytes())
                }
            }

            impl From<$ty> for u16 {
                fn from(value: $ty) -> Self {
                    u16::from_le_bytes(value.into_bytes())
                }
            }
        )*
    };
}

impl_u16_conversions!(Configuration, ChannelSelect, InputRange, SequencerEntry);
