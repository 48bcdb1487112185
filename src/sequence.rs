//! Channel sequences and conversion result decoding.

use crate::error::ConfigError;
use crate::params::check_channel;
use crate::registers::{SequencerEntry, SEQUENCER_DEPTH};

/// One simultaneous sample point: an A-side and a B-side input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelPair {
    /// A-side channel index (`0..=7`).
    pub a: u8,
    /// B-side channel index (`0..=7`).
    pub b: u8,
}

impl ChannelPair {
    /// Validates both indices.
    pub fn new(a: u8, b: u8) -> core::result::Result<Self, ConfigError> {
        Ok(Self {
            a: check_channel(a)?,
            b: check_channel(b)?,
        })
    }
}

/// Raw 16-bit codes of one simultaneous conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Conversion {
    /// A-side code.
    pub a: u16,
    /// B-side code.
    pub b: u16,
}

impl Conversion {
    /// Splits a packed result word: A in bits 31:16, B in bits 15:0.
    pub const fn from_word(word: u32) -> Self {
        Self {
            a: (word >> 16) as u16,
            b: word as u16,
        }
    }

    /// Reinterprets both codes as two's complement.
    pub const fn signed(self) -> (i16, i16) {
        (self.a as i16, self.b as i16)
    }
}

/// Ordered list of channel pairs converted on every sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pairs: [ChannelPair; SEQUENCER_DEPTH],
    len: usize,
}

impl Sequence {
    /// Builds a sequence from positionally matched A-side and B-side channel lists.
    pub fn new(a_channels: &[u8], b_channels: &[u8]) -> core::result::Result<Self, ConfigError> {
        if a_channels.len() != b_channels.len() {
            return Err(ConfigError::LengthMismatch {
                a: a_channels.len(),
                b: b_channels.len(),
            });
        }
        if a_channels.is_empty() {
            return Err(ConfigError::EmptySequence);
        }
        if a_channels.len() > SEQUENCER_DEPTH {
            return Err(ConfigError::SequenceTooLong(a_channels.len()));
        }

        let mut pairs = [ChannelPair::default(); SEQUENCER_DEPTH];
        for (slot, (&a, &b)) in pairs.iter_mut().zip(a_channels.iter().zip(b_channels)) {
            *slot = ChannelPair::new(a, b)?;
        }

        Ok(Self {
            pairs,
            len: a_channels.len(),
        })
    }

    /// Number of channel pairs.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; an empty sequence cannot be built.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Channel pairs in conversion order.
    pub fn pairs(&self) -> &[ChannelPair] {
        &self.pairs[..self.len]
    }

    /// Number of values produced by one sweep (A side then B side).
    pub fn sweep_len(&self) -> usize {
        2 * self.len
    }

    /// Sequencer stack register values, the last one flagged as end of sequence.
    pub fn stack_entries(&self) -> impl Iterator<Item = SequencerEntry> + '_ {
        let last = self.len - 1;
        self.pairs().iter().enumerate().map(move |(index, pair)| {
            SequencerEntry::new()
                .with_a(pair.a)
                .with_b(pair.b)
                .with_end(index == last)
        })
    }
}

/// Splits packed result words into `out`: all A-side codes, then all B-side codes.
///
/// `out` must hold exactly `2 * words.len()` entries.
pub fn unpack_sweep(words: &[u32], out: &mut [u16]) -> core::result::Result<(), ConfigError> {
    if out.len() != 2 * words.len() {
        return Err(ConfigError::BufferLength {
            expected: 2 * words.len(),
            actual: out.len(),
        });
    }

    let (a_side, b_side) = out.split_at_mut(words.len());
    for ((&word, a), b) in words.iter().zip(a_side).zip(b_side) {
        let conversion = Conversion::from_word(word);
        *a = conversion.a;
        *b = conversion.b;
    }
    Ok(())
}

/// Re-pairs a sweep laid out as `[A0..An, B0..Bn]`.
pub fn pairs(values: &[u16]) -> impl Iterator<Item = Conversion> + '_ {
    let (a_side, b_side) = values.split_at(values.len() / 2);
    a_side
        .iter()
        .zip(b_side)
        .map(|(&a, &b)| Conversion { a, b })
}
