//! SPI interface implementation built on top of `embedded-hal` `SpiDevice`.
//!
//! Register access uses 16-bit frames, MSB first:
//!
//! ```text
//!  15   14..9     8..0
//! W/R  ADDRESS    DATA
//! ```
//!
//! A read frame carries the address only; the register contents arrive in the
//! data field of the following frame. Conversions are started by a CONVST pulse
//! and results are clocked out on SDOA once BUSY falls, 32 bits per conversion
//! (A side first).

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{Operation, SpiDevice};

use super::Ad7616Interface;
use crate::registers::DATA_MASK;

// Minimum CONVST high time is 50 ns; round up generously.
const CONVST_PULSE_NS: u32 = 100;
// Longest burst (32 pairs at 128x oversampling) stays well below this.
const BUSY_POLL_LIMIT: u32 = 100_000;
const BUSY_POLL_INTERVAL_US: u32 = 1;
const RESULT_BYTES: usize = 4;

/// Errors raised by [`SpiInterface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError<S, P> {
    /// The SPI transfer failed.
    Spi(S),
    /// Driving CONVST or sampling BUSY failed.
    Pin(P),
    /// BUSY did not fall after a conversion was started.
    BusyTimeout,
}

/// SPI-based interface implementation for the AD7616 driver.
pub struct SpiInterface<SPI, CONVST, BUSY, DELAY> {
    spi: SPI,
    convst: CONVST,
    busy: BUSY,
    delay: DELAY,
}

impl<SPI, CONVST, BUSY, DELAY> SpiInterface<SPI, CONVST, BUSY, DELAY> {
    /// Creates a new interface from the SPI device, CONVST output, BUSY input and a delay source.
    pub const fn new(spi: SPI, convst: CONVST, busy: BUSY, delay: DELAY) -> Self {
        Self {
            spi,
            convst,
            busy,
            delay,
        }
    }

    /// Builds the frame writing `value` to `address`.
    pub fn write_frame(address: u8, value: u16) -> u16 {
        0x8000 | (((address & 0x3F) as u16) << 9) | (value & DATA_MASK)
    }

    /// Builds the frame requesting the contents of `address`.
    pub fn read_frame(address: u8) -> u16 {
        ((address & 0x3F) as u16) << 9
    }

    /// Provides mutable access to the wrapped SPI device.
    pub fn spi_mut(&mut self) -> &mut SPI {
        &mut self.spi
    }

    /// Consumes the interface and returns the owned parts.
    pub fn release(self) -> (SPI, CONVST, BUSY, DELAY) {
        (self.spi, self.convst, self.busy, self.delay)
    }
}

impl<SPI, CONVST, BUSY, DELAY> SpiInterface<SPI, CONVST, BUSY, DELAY>
where
    SPI: SpiDevice,
    CONVST: OutputPin,
    BUSY: InputPin<Error = CONVST::Error>,
    DELAY: DelayNs,
{
    fn pulse_convst(&mut self) -> Result<(), BusError<SPI::Error, CONVST::Error>> {
        self.convst.set_high().map_err(BusError::Pin)?;
        self.delay.delay_ns(CONVST_PULSE_NS);
        self.convst.set_low().map_err(BusError::Pin)
    }

    fn wait_not_busy(&mut self) -> Result<(), BusError<SPI::Error, CONVST::Error>> {
        let mut polls = 0;
        while self.busy.is_high().map_err(BusError::Pin)? {
            if polls == BUSY_POLL_LIMIT {
                return Err(BusError::BusyTimeout);
            }
            polls += 1;
            self.delay.delay_us(BUSY_POLL_INTERVAL_US);
        }
        Ok(())
    }
}

impl<SPI, CONVST, BUSY, DELAY> Ad7616Interface for SpiInterface<SPI, CONVST, BUSY, DELAY>
where
    SPI: SpiDevice,
    CONVST: OutputPin,
    BUSY: InputPin<Error = CONVST::Error>,
    DELAY: DelayNs,
{
    type Error = BusError<SPI::Error, CONVST::Error>;

    fn write_register(&mut self, address: u8, value: u16) -> core::result::Result<(), Self::Error> {
        let frame = Self::write_frame(address, value).to_be_bytes();
        self.spi
            .transaction(&mut [Operation::Write(&frame)])
            .map_err(BusError::Spi)
    }

    fn read_register(&mut self, address: u8) -> core::result::Result<u16, Self::Error> {
        let command = Self::read_frame(address).to_be_bytes();
        self.spi
            .transaction(&mut [Operation::Write(&command)])
            .map_err(BusError::Spi)?;

        let mut response = [0u8; 2];
        self.spi
            .transaction(&mut [Operation::Read(&mut response)])
            .map_err(BusError::Spi)?;
        Ok(u16::from_be_bytes(response) & DATA_MASK)
    }

    fn convert(&mut self, words: &mut [u32]) -> core::result::Result<(), Self::Error> {
        if words.is_empty() {
            return Ok(());
        }

        self.pulse_convst()?;
        self.wait_not_busy()?;

        for word in words.iter_mut() {
            let mut raw = [0u8; RESULT_BYTES];
            self.spi
                .transaction(&mut [Operation::Read(&mut raw)])
                .map_err(BusError::Spi)?;
            *word = u32::from_be_bytes(raw);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BusError, SpiInterface};
    use crate::interface::Ad7616Interface;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTransaction,
    };
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    fn write(bytes: [u8; 2]) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(bytes.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    fn read(bytes: &[u8]) -> [SpiTransaction<u8>; 3] {
        [
            SpiTransaction::transaction_start(),
            SpiTransaction::read_vec(bytes.to_vec()),
            SpiTransaction::transaction_end(),
        ]
    }

    #[test]
    fn frames_place_address_and_data_fields() {
        type Iface = SpiInterface<(), (), (), ()>;
        assert_eq!(Iface::write_frame(0x04, 0x0AA), 0x88AA);
        assert_eq!(Iface::read_frame(0x02), 0x0400);
        assert_eq!(Iface::write_frame(0x3F, 0x1FF), 0xFFFF);
    }

    #[test]
    fn write_register_sends_single_frame() {
        let mut spi = SpiMock::new(&write([0x88, 0xAA]));
        let mut convst = PinMock::new(&[]);
        let mut busy = PinMock::new(&[]);
        let mut interface =
            SpiInterface::new(spi.clone(), convst.clone(), busy.clone(), NoopDelay::new());

        interface.write_register(0x04, 0x0AA).unwrap();

        spi.done();
        convst.done();
        busy.done();
    }

    #[test]
    fn read_register_uses_command_then_response_frame() {
        let mut expectations = write([0x06, 0x00]).to_vec();
        expectations.extend(read(&[0x06, 0x72]));
        let mut spi = SpiMock::new(&expectations);
        let mut convst = PinMock::new(&[]);
        let mut busy = PinMock::new(&[]);
        let mut interface =
            SpiInterface::new(spi.clone(), convst.clone(), busy.clone(), NoopDelay::new());

        // Bits 14:9 echo the address and are masked off.
        assert_eq!(interface.read_register(0x03).unwrap(), 0x072);

        spi.done();
        convst.done();
        busy.done();
    }

    #[test]
    fn convert_pulses_convst_waits_for_busy_and_reads_words() {
        let mut expectations = read(&[0x12, 0x34, 0xAB, 0xCD]).to_vec();
        expectations.extend(read(&[0x00, 0x01, 0xFF, 0xFF]));
        let mut spi = SpiMock::new(&expectations);
        let mut convst = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let mut busy = PinMock::new(&[
            PinTransaction::get(PinState::High),
            PinTransaction::get(PinState::High),
            PinTransaction::get(PinState::Low),
        ]);
        let mut interface =
            SpiInterface::new(spi.clone(), convst.clone(), busy.clone(), NoopDelay::new());

        let mut words = [0u32; 2];
        interface.convert(&mut words).unwrap();
        assert_eq!(words, [0x1234_ABCD, 0x0001_FFFF]);

        spi.done();
        convst.done();
        busy.done();
    }

    #[test]
    fn convert_ignores_empty_buffer() {
        let mut spi = SpiMock::<u8>::new(&[]);
        let mut convst = PinMock::new(&[]);
        let mut busy = PinMock::new(&[]);
        let mut interface =
            SpiInterface::new(spi.clone(), convst.clone(), busy.clone(), NoopDelay::new());

        interface.convert(&mut []).unwrap();

        spi.done();
        convst.done();
        busy.done();
    }

    #[test]
    fn convert_times_out_when_busy_stays_high() {
        let mut spi = SpiMock::<u8>::new(&[]);
        let mut convst = PinMock::new(&[
            PinTransaction::set(PinState::High),
            PinTransaction::set(PinState::Low),
        ]);
        let busy_high = vec![PinTransaction::get(PinState::High); super::BUSY_POLL_LIMIT as usize + 1];
        let mut busy = PinMock::new(&busy_high);
        let mut interface =
            SpiInterface::new(spi.clone(), convst.clone(), busy.clone(), NoopDelay::new());

        let mut words = [0u32; 1];
        assert!(matches!(interface.convert(&mut words), Err(BusError::BusyTimeout)));

        spi.done();
        convst.done();
        busy.done();
    }
}
