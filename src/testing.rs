//! In-memory AD7616 model used by the driver, session and stream tests.

use crate::interface::Ad7616Interface;
use crate::registers::{
    ChannelSelect, Configuration, SequencerEntry, DATA_MASK, REG_CHANNEL, REG_CONFIGURATION,
    REG_SEQUENCER_STACK, SEQUENCER_DEPTH,
};

/// Failure injected by [`FakeAd7616`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeBusError;

/// Bus operation recorded by [`FakeAd7616`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Write(u8, u16),
    Read(u8),
    Convert(usize),
}

/// Register file plus a deterministic converter.
///
/// A-side inputs read back as `0x0A00 | channel`, B-side inputs as `0x0B00 | channel`.
#[derive(Debug, Clone)]
pub struct FakeAd7616 {
    pub registers: [u16; 64],
    pub ops: Vec<Op>,
    pub fail_after: Option<usize>,
    pub stuck_configuration: Option<u16>,
}

impl FakeAd7616 {
    pub fn new() -> Self {
        Self {
            registers: [0; 64],
            ops: Vec::new(),
            fail_after: None,
            stuck_configuration: None,
        }
    }

    pub fn code_a(channel: u8) -> u16 {
        0x0A00 | channel as u16
    }

    pub fn code_b(channel: u8) -> u16 {
        0x0B00 | channel as u16
    }

    pub fn transfers(&self) -> usize {
        self.ops.len()
    }

    fn record(&mut self, op: Op) -> Result<(), FakeBusError> {
        if let Some(limit) = self.fail_after {
            if self.ops.len() >= limit {
                return Err(FakeBusError);
            }
        }
        self.ops.push(op);
        Ok(())
    }

    fn word(a: u8, b: u8) -> u32 {
        ((Self::code_a(a) as u32) << 16) | Self::code_b(b) as u32
    }
}

impl Ad7616Interface for FakeAd7616 {
    type Error = FakeBusError;

    fn write_register(&mut self, address: u8, value: u16) -> Result<(), Self::Error> {
        self.record(Op::Write(address, value))?;
        self.registers[(address & 0x3F) as usize] = value & DATA_MASK;
        Ok(())
    }

    fn read_register(&mut self, address: u8) -> Result<u16, Self::Error> {
        self.record(Op::Read(address))?;
        if address == REG_CONFIGURATION {
            if let Some(value) = self.stuck_configuration {
                return Ok(value);
            }
        }
        Ok(self.registers[(address & 0x3F) as usize])
    }

    fn convert(&mut self, words: &mut [u32]) -> Result<(), Self::Error> {
        self.record(Op::Convert(words.len()))?;
        let configuration = Configuration::from(self.registers[REG_CONFIGURATION as usize]);

        if configuration.sequencer_enable() && configuration.burst_enable() {
            let mut index = 0;
            for word in words.iter_mut() {
                let entry = SequencerEntry::from(
                    self.registers[REG_SEQUENCER_STACK as usize + index],
                );
                *word = Self::word(entry.a(), entry.b());
                if !entry.end() && index + 1 < SEQUENCER_DEPTH {
                    index += 1;
                }
            }
        } else {
            let channel = ChannelSelect::from(self.registers[REG_CHANNEL as usize]);
            for word in words.iter_mut() {
                *word = Self::word(channel.a(), channel.b());
            }
        }
        Ok(())
    }
}
