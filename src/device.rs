//! High-level AD7616 device driver implementation.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use crate::config::Config;
use crate::error::{ConfigError, Error, Result};
use crate::interface::spi::SpiInterface;
use crate::interface::Ad7616Interface;
use crate::params::{check_channel, Oversampling, Range, Side};
use crate::registers::{
    ChannelSelect, Configuration, InputRange, Register, DATA_MASK, REG_CONFIGURATION,
    REG_SEQUENCER_STACK, SEQUENCER_DEPTH,
};
use crate::sequence::{unpack_sweep, Conversion, Sequence};

const RANGE_REGISTERS: [(Register, Side, usize); 4] = [
    (Register::RangeA0_3, Side::A, 0),
    (Register::RangeA4_7, Side::A, 4),
    (Register::RangeB0_3, Side::B, 0),
    (Register::RangeB4_7, Side::B, 4),
];

/// High-level synchronous driver for the AD7616 ADC.
///
/// Owning the driver means owning the bus: every operation takes `&mut self`.
pub struct Ad7616<IFACE> {
    interface: IFACE,
    config: Config,
    // Shadow of CONFIGURATION; every write to it goes through the driver.
    configuration: Configuration,
    sequence: Option<Sequence>,
}

impl<IFACE> Ad7616<IFACE> {
    // ==================================================================
    // == Driver Construction & Ownership ===============================
    // ==================================================================
    /// Creates a new driver instance from the provided bus interface.
    pub fn new(interface: IFACE, config: Config) -> Self {
        Self {
            interface,
            config,
            configuration: Configuration::new(),
            sequence: None,
        }
    }

    /// Consumes the driver and returns the owned interface.
    pub fn release(self) -> (IFACE, Config) {
        (self.interface, self.config)
    }

    /// Provides mutable access to the underlying interface.
    pub fn interface_mut(&mut self) -> &mut IFACE {
        &mut self.interface
    }

    /// Returns a shared reference to the active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the active conversion sequence, if one was defined.
    pub fn sequence(&self) -> Option<&Sequence> {
        self.sequence.as_ref()
    }
}

impl<SPI, CONVST, BUSY, DELAY> Ad7616<SpiInterface<SPI, CONVST, BUSY, DELAY>>
where
    SPI: SpiDevice,
    CONVST: OutputPin,
    BUSY: InputPin<Error = CONVST::Error>,
    DELAY: DelayNs,
{
    // ==================================================================
    // == SPI Convenience Constructors ==================================
    // ==================================================================
    /// Convenience constructor for SPI transports.
    pub fn new_spi(spi: SPI, convst: CONVST, busy: BUSY, delay: DELAY, config: Config) -> Self {
        Self::new(SpiInterface::new(spi, convst, busy, delay), config)
    }

    /// Releases the driver, returning the SPI device, pins, delay and configuration.
    pub fn release_spi(self) -> ((SPI, CONVST, BUSY, DELAY), Config) {
        let (iface, config) = self.release();
        (iface.release(), config)
    }
}

impl<IFACE, CommE> Ad7616<IFACE>
where
    IFACE: Ad7616Interface<Error = CommE>,
{
    // ==================================================================
    // == Initialization ================================================
    // ==================================================================
    /// Programs oversampling and input ranges from the configuration, then
    /// verifies the link by reading CONFIGURATION back.
    pub fn init(&mut self) -> Result<(), CommE> {
        self.config.validate().map_err(Error::Configuration)?;
        self.sequence = None;

        let configuration = Configuration::new().with_oversampling(self.config.oversampling);
        self.write_configuration(configuration)?;

        for (register, side, first) in RANGE_REGISTERS {
            let ranges = match side {
                Side::A => &self.config.ranges_a,
                Side::B => &self.config.ranges_b,
            };
            let value = InputRange::from_ranges([
                ranges[first],
                ranges[first + 1],
                ranges[first + 2],
                ranges[first + 3],
            ]);
            self.write_register(register, u16::from(value))?;
        }

        let expected = u16::from(configuration);
        let read = self
            .interface
            .read_register(REG_CONFIGURATION)
            .map_err(Error::from)?;
        if read != expected {
            warn!("CONFIGURATION readback {} does not match {}", read, expected);
            return Err(Error::DeviceNotResponding { expected, read });
        }

        info!(
            "AD7616 ready on bus {} device {}",
            self.config.bus, self.config.device
        );
        Ok(())
    }

    // ==================================================================
    // == Register Access ===============================================
    // ==================================================================
    /// Writes a 9-bit value to a register.
    pub fn write_register(&mut self, register: Register, value: u16) -> Result<(), CommE> {
        let address = register.address().map_err(Error::Configuration)?;
        if value > DATA_MASK {
            return Err(Error::Configuration(ConfigError::ValueOutOfRange(value)));
        }

        if self.config.diagnostics {
            debug!("write register {} <- {}", address, value);
        }
        self.interface
            .write_register(address, value)
            .map_err(Error::from)?;

        if address == REG_CONFIGURATION {
            self.configuration = Configuration::from(value);
        } else if address >= REG_SEQUENCER_STACK {
            // The stack no longer matches the stored sequence.
            self.sequence = None;
        }
        Ok(())
    }

    /// Reads a register.
    pub fn read_register(&mut self, register: Register) -> Result<u16, CommE> {
        let address = register.address().map_err(Error::Configuration)?;
        let value = self
            .interface
            .read_register(address)
            .map_err(Error::from)?;

        if self.config.diagnostics {
            debug!("read register {} -> {}", address, value);
        }
        Ok(value)
    }

    /// Reads several registers; `values[i]` receives the contents of `registers[i]`.
    ///
    /// Nothing is transferred unless both slices have the same length and every
    /// register is valid.
    pub fn read_registers(&mut self, registers: &[Register], values: &mut [u16]) -> Result<(), CommE> {
        if registers.len() != values.len() {
            return Err(Error::Configuration(ConfigError::BufferLength {
                expected: registers.len(),
                actual: values.len(),
            }));
        }
        for register in registers {
            register.address().map_err(Error::Configuration)?;
        }

        for (register, value) in registers.iter().zip(values.iter_mut()) {
            *value = self.read_register(*register)?;
        }
        Ok(())
    }

    /// Reads the input range of one channel from its range register.
    pub fn range(&mut self, side: Side, channel: u8) -> Result<Range, CommE> {
        let channel = check_channel(channel).map_err(Error::Configuration)?;
        let (register, slot) = Register::range_for(side, channel);
        let raw = self.read_register(register)?;
        Ok(InputRange::from(raw).range(slot))
    }

    /// Updates the input range of one channel.
    pub fn set_range(&mut self, side: Side, channel: u8, range: Range) -> Result<(), CommE> {
        let channel = check_channel(channel).map_err(Error::Configuration)?;
        let (register, slot) = Register::range_for(side, channel);

        let current = self.read_register(register)?;
        let mut value = InputRange::from(current);
        value.set_range(slot, range);

        let updated = u16::from(value);
        if updated != current {
            self.write_register(register, updated)?;
        }

        match side {
            Side::A => self.config.ranges_a[channel as usize] = range,
            Side::B => self.config.ranges_b[channel as usize] = range,
        }
        Ok(())
    }

    /// Changes the oversampling ratio.
    pub fn set_oversampling(&mut self, oversampling: Oversampling) -> Result<(), CommE> {
        self.update_configuration(|configuration| configuration.set_oversampling(oversampling))?;
        self.config.oversampling = oversampling;
        Ok(())
    }

    // ==================================================================
    // == Conversions ===================================================
    // ==================================================================
    /// Converts one channel pair simultaneously.
    pub fn convert_pair(&mut self, a: u8, b: u8) -> Result<Conversion, CommE> {
        let a = check_channel(a).map_err(Error::Configuration)?;
        let b = check_channel(b).map_err(Error::Configuration)?;

        self.update_configuration(|configuration| {
            configuration.set_sequencer_enable(false);
            configuration.set_burst_enable(false);
        })?;

        let select = ChannelSelect::new().with_a(a).with_b(b);
        self.write_register(Register::ChannelSelect, u16::from(select))?;

        let mut word = [0u32; 1];
        self.interface.convert(&mut word).map_err(Error::from)?;
        if self.config.diagnostics {
            debug!("conversion A{} B{}: {}", a, b, word[0]);
        }

        Ok(Conversion::from_word(word[0]))
    }

    /// Programs the sequencer with positionally matched A-side and B-side channels.
    ///
    /// Replaces any previous sequence. Invalid lists are rejected before any transfer.
    pub fn define_sequence(&mut self, a_channels: &[u8], b_channels: &[u8]) -> Result<(), CommE> {
        let sequence = Sequence::new(a_channels, b_channels).map_err(Error::Configuration)?;
        self.sequence = None;

        for (index, entry) in sequence.stack_entries().enumerate() {
            self.write_register(Register::SequencerStack(index as u8), u16::from(entry))?;
        }
        self.arm_sequencer()?;

        debug!("sequence of {} pairs defined", sequence.len());
        self.sequence = Some(sequence);
        Ok(())
    }

    /// Converts one full sweep of the defined sequence.
    ///
    /// `values` must hold exactly twice the sequence length and receives all A-side
    /// codes in sequence order followed by all B-side codes. Returns the number of
    /// values written.
    pub fn read_conversions(&mut self, values: &mut [u16]) -> Result<usize, CommE> {
        let len = match &self.sequence {
            Some(sequence) => sequence.len(),
            None => return Err(Error::SequenceNotDefined),
        };
        if values.len() != 2 * len {
            return Err(Error::Configuration(ConfigError::BufferLength {
                expected: 2 * len,
                actual: values.len(),
            }));
        }

        self.arm_sequencer()?;

        let mut words = [0u32; SEQUENCER_DEPTH];
        let words = &mut words[..len];
        self.interface.convert(words).map_err(Error::from)?;
        if self.config.diagnostics {
            for (index, word) in words.iter().enumerate() {
                debug!("sweep word {}: {}", index, word);
            }
        }

        unpack_sweep(words, values).map_err(Error::Configuration)?;
        Ok(values.len())
    }

    // ==================================================================
    // == Internal Configuration Helpers ================================
    // ==================================================================
    fn arm_sequencer(&mut self) -> Result<(), CommE> {
        self.update_configuration(|configuration| {
            configuration.set_sequencer_enable(true);
            configuration.set_burst_enable(true);
        })
    }

    fn write_configuration(&mut self, configuration: Configuration) -> Result<(), CommE> {
        self.write_register(Register::Configuration, u16::from(configuration))
    }

    fn update_configuration<F>(&mut self, mut mutate: F) -> Result<(), CommE>
    where
        F: FnMut(&mut Configuration),
    {
        let mut configuration = self.configuration;
        mutate(&mut configuration);

        if configuration != self.configuration {
            self.write_configuration(configuration)?;
        }
        Ok(())
    }
}

impl<IFACE> core::fmt::Debug for Ad7616<IFACE> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ad7616")
            .field("config", &self.config)
            .field("configuration", &self.configuration)
            .field("sequence", &self.sequence.as_ref().map(Sequence::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Ad7616;
    use crate::config::Config;
    use crate::error::{ConfigError, Error};
    use crate::params::{Oversampling, Range, Side};
    use crate::registers::{Register, REG_CHANNEL, REG_CONFIGURATION, REG_RANGE_A0_3};
    use crate::sequence::Conversion;
    use crate::testing::{FakeAd7616, FakeBusError, Op};
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    fn driver() -> Ad7616<FakeAd7616> {
        let mut driver = Ad7616::new(FakeAd7616::new(), Config::default());
        driver.init().unwrap();
        driver.interface_mut().ops.clear();
        driver
    }

    #[test]
    fn init_programs_configuration_and_all_ranges() {
        let config = Config::new()
            .oversampling(Oversampling::Os4)
            .range(Side::B, 5, Range::PlusMinus5V)
            .unwrap()
            .build();
        let mut driver = Ad7616::new(FakeAd7616::new(), config);
        driver.init().unwrap();

        let fake = driver.interface_mut();
        assert_eq!(
            fake.ops,
            vec![
                Op::Write(0x02, 0x0008),
                Op::Write(0x04, 0x0000),
                Op::Write(0x05, 0x0000),
                Op::Write(0x06, 0x0000),
                Op::Write(0x07, 0x0008),
                Op::Read(0x02),
            ]
        );
    }

    #[test]
    fn init_reports_unresponsive_device() {
        let mut fake = FakeAd7616::new();
        fake.stuck_configuration = Some(0x1FF);
        let mut driver = Ad7616::new(fake, Config::default());

        assert_eq!(
            driver.init(),
            Err(Error::DeviceNotResponding {
                expected: 0,
                read: 0x1FF
            })
        );
    }

    #[test]
    fn write_then_read_returns_value() {
        let mut driver = driver();
        for register in [Register::RangeA0_3, Register::ChannelSelect, Register::SequencerStack(9)] {
            for value in [0x000, 0x0AA, 0x1FF] {
                driver.write_register(register, value).unwrap();
                assert_eq!(driver.read_register(register), Ok(value));
            }
        }
    }

    #[test]
    fn read_registers_matches_individual_reads() {
        let mut driver = driver();
        driver.write_register(Register::RangeA0_3, 0x0AA).unwrap();
        driver.write_register(Register::RangeB0_3, 0x055).unwrap();

        let registers = [Register::RangeA0_3, Register::Configuration, Register::RangeB0_3];
        let mut values = [0u16; 3];
        driver.read_registers(&registers, &mut values).unwrap();

        let individual: Vec<u16> = registers
            .iter()
            .map(|register| driver.read_register(*register).unwrap())
            .collect();
        assert_eq!(values.to_vec(), individual);
        assert_eq!(values, [0x0AA, 0x000, 0x055]);
    }

    #[test]
    fn read_registers_rejects_mismatched_buffer_without_transfer() {
        let mut driver = driver();
        let mut values = [0u16; 2];
        assert_eq!(
            driver.read_registers(&[Register::Configuration], &mut values),
            Err(Error::Configuration(ConfigError::BufferLength {
                expected: 1,
                actual: 2
            }))
        );
        assert_eq!(driver.interface_mut().transfers(), 0);
    }

    #[test]
    fn invalid_register_and_value_are_rejected() {
        let mut driver = driver();
        assert_eq!(
            driver.write_register(Register::SequencerStack(40), 0),
            Err(Error::Configuration(ConfigError::InvalidRegister(0x48)))
        );
        assert_eq!(
            driver.write_register(Register::Configuration, 0x200),
            Err(Error::Configuration(ConfigError::ValueOutOfRange(0x200)))
        );
        assert_eq!(driver.interface_mut().transfers(), 0);
    }

    #[test]
    fn set_range_updates_one_slot() {
        let mut driver = driver();
        driver.set_range(Side::A, 1, Range::PlusMinus5V).unwrap();
        driver.set_range(Side::A, 2, Range::PlusMinus2_5V).unwrap();

        assert_eq!(driver.read_register(Register::RangeA0_3), Ok(0b01_10_00));
        assert_eq!(driver.range(Side::A, 1), Ok(Range::PlusMinus5V));
        assert_eq!(driver.range(Side::A, 0), Ok(Range::PlusMinus10V));
        assert_eq!(driver.config().ranges_a[2], Range::PlusMinus2_5V);
    }

    #[test]
    fn range_register_roundtrip_scenario() {
        let mut driver = driver();
        driver
            .write_register(Register::RangeA0_3, Range::PlusMinus5V.bits() as u16)
            .unwrap();
        let raw = driver.read_register(Register::RangeA0_3).unwrap();
        assert_eq!(Range::from_bits(raw as u8), Range::PlusMinus5V);
        assert_eq!(driver.interface_mut().registers[REG_RANGE_A0_3 as usize], 0b10);
    }

    #[test]
    fn convert_pair_selects_channels_and_splits_word() {
        let mut driver = driver();
        let conversion = driver.convert_pair(3, 6).unwrap();

        assert_eq!(
            conversion,
            Conversion {
                a: FakeAd7616::code_a(3),
                b: FakeAd7616::code_b(6)
            }
        );
        assert_eq!(
            driver.interface_mut().ops,
            vec![Op::Write(REG_CHANNEL, 0x63), Op::Convert(1)]
        );
    }

    #[test]
    fn convert_pair_rejects_bad_channel() {
        let mut driver = driver();
        assert_eq!(
            driver.convert_pair(0, 8),
            Err(Error::Configuration(ConfigError::ChannelOutOfRange(8)))
        );
        assert_eq!(driver.interface_mut().transfers(), 0);
    }

    #[test]
    fn read_conversions_requires_sequence() {
        let mut driver = driver();
        let mut values = [0u16; 0];
        assert_eq!(
            driver.read_conversions(&mut values),
            Err(Error::SequenceNotDefined)
        );
    }

    #[test]
    fn define_sequence_rejects_mismatch_without_transfer() {
        let mut driver = driver();
        assert_eq!(
            driver.define_sequence(&[0, 1, 2], &[0, 1]),
            Err(Error::Configuration(ConfigError::LengthMismatch { a: 3, b: 2 }))
        );
        assert_eq!(driver.interface_mut().transfers(), 0);
        assert!(driver.sequence().is_none());
    }

    #[test]
    fn sequence_sweep_returns_a_side_then_b_side() {
        let mut driver = driver();
        driver.define_sequence(&[0, 1], &[0, 1]).unwrap();

        let mut values = [0u16; 4];
        assert_eq!(driver.read_conversions(&mut values), Ok(4));
        assert_eq!(
            values,
            [
                FakeAd7616::code_a(0),
                FakeAd7616::code_a(1),
                FakeAd7616::code_b(0),
                FakeAd7616::code_b(1),
            ]
        );
    }

    #[test]
    fn sweep_length_is_twice_the_sequence_for_any_length() {
        let mut driver = driver();
        for len in 1..=8u8 {
            let a: Vec<u8> = (0..len).collect();
            let b: Vec<u8> = (0..len).rev().collect();
            driver.define_sequence(&a, &b).unwrap();

            let mut values = vec![0u16; 2 * len as usize];
            driver.read_conversions(&mut values).unwrap();

            let expected_a: Vec<u16> = a.iter().map(|&ch| FakeAd7616::code_a(ch)).collect();
            let expected_b: Vec<u16> = b.iter().map(|&ch| FakeAd7616::code_b(ch)).collect();
            assert_eq!(&values[..len as usize], expected_a.as_slice());
            assert_eq!(&values[len as usize..], expected_b.as_slice());
        }
    }

    #[test]
    fn read_conversions_checks_buffer_length() {
        let mut driver = driver();
        driver.define_sequence(&[0, 1], &[2, 3]).unwrap();
        let mut values = [0u16; 3];
        assert_eq!(
            driver.read_conversions(&mut values),
            Err(Error::Configuration(ConfigError::BufferLength {
                expected: 4,
                actual: 3
            }))
        );
    }

    #[test]
    fn single_conversion_disarms_and_sweep_rearms_sequencer() {
        let mut driver = driver();
        driver.define_sequence(&[4], &[5]).unwrap();
        driver.convert_pair(1, 2).unwrap();

        driver.interface_mut().ops.clear();
        let mut values = [0u16; 2];
        driver.read_conversions(&mut values).unwrap();

        assert_eq!(
            driver.interface_mut().ops,
            vec![Op::Write(REG_CONFIGURATION, 0x0060), Op::Convert(1)]
        );
        assert_eq!(values, [FakeAd7616::code_a(4), FakeAd7616::code_b(5)]);
    }

    #[test]
    fn set_oversampling_keeps_sequencer_bits() {
        let mut driver = driver();
        driver.define_sequence(&[0], &[0]).unwrap();
        driver.interface_mut().ops.clear();

        driver.set_oversampling(Oversampling::Os16).unwrap();
        driver.set_oversampling(Oversampling::Os16).unwrap();

        assert_eq!(
            driver.interface_mut().ops,
            vec![Op::Write(REG_CONFIGURATION, 0x0070)]
        );
        assert_eq!(driver.config().oversampling, Oversampling::Os16);
    }

    #[test]
    fn diagnostics_do_not_change_transfers_or_results() {
        let run = |diagnostics: bool| {
            let config = Config::new().diagnostics(diagnostics).build();
            let mut driver = Ad7616::new(FakeAd7616::new(), config);
            driver.init().unwrap();
            driver.write_register(Register::RangeB0_3, 0x055).unwrap();
            let range = driver.read_register(Register::RangeB0_3).unwrap();
            let pair = driver.convert_pair(6, 1).unwrap();
            driver.define_sequence(&[2, 3], &[4, 5]).unwrap();
            let mut values = [0u16; 4];
            driver.read_conversions(&mut values).unwrap();
            (range, pair, values, driver.interface_mut().ops.clone())
        };

        let quiet = run(false);
        let verbose = run(true);
        assert_eq!(verbose, quiet);
        assert_eq!(verbose.0, 0x055);
        assert_eq!(
            verbose.1,
            Conversion {
                a: FakeAd7616::code_a(6),
                b: FakeAd7616::code_b(1)
            }
        );
    }

    #[test]
    fn failed_define_leaves_no_sequence() {
        let mut driver = driver();
        driver.define_sequence(&[0], &[0]).unwrap();
        let transfers = driver.interface_mut().transfers();
        driver.interface_mut().fail_after = Some(transfers + 1);

        assert_eq!(
            driver.define_sequence(&[1, 2], &[1, 2]),
            Err(Error::Transfer(FakeBusError))
        );
        assert!(driver.sequence().is_none());
    }

    #[test]
    fn raw_stack_write_invalidates_sequence() {
        let mut driver = driver();
        driver.define_sequence(&[0], &[0]).unwrap();
        driver.write_register(Register::SequencerStack(0), 0x011).unwrap();
        assert!(driver.sequence().is_none());
    }

    #[test]
    fn spi_transport_converts_pair_end_to_end() {
        // CONFIGURATION is still at its reset value, so only CHANNEL is written.
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x86, 0x21]),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::read_vec(vec![0x80, 0x00, 0x7F, 0xFF]),
            SpiTransaction::transaction_end(),
        ];
        let mut spi = SpiMock::new(&expectations);
        let mut convst = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let mut busy = PinMock::new(&[PinTransaction::get(PinState::Low)]);

        let mut driver = Ad7616::new_spi(
            spi.clone(),
            convst.clone(),
            busy.clone(),
            NoopDelay::new(),
            Config::default(),
        );
        let conversion = driver.convert_pair(1, 2).unwrap();
        assert_eq!(conversion.signed(), (i16::MIN, i16::MAX));

        spi.done();
        convst.done();
        busy.done();
    }
}
