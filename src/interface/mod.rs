//! Bus interface abstraction for the AD7616 driver.

pub mod spi;

/// Abstraction over the low-level bus access required by the driver.
///
/// Register addresses are 6-bit and register data is 9-bit; the driver validates
/// both before calling in here.
pub trait Ad7616Interface {
    /// Error type produced by the concrete bus implementation.
    type Error;

    /// Writes a single register.
    fn write_register(&mut self, address: u8, value: u16) -> core::result::Result<(), Self::Error>;

    /// Reads a single register.
    fn read_register(&mut self, address: u8) -> core::result::Result<u16, Self::Error>;

    /// Triggers a conversion and reads one packed result word per entry of `words`.
    ///
    /// Each word carries the A-side code in bits 31:16 and the B-side code in
    /// bits 15:0.
    fn convert(&mut self, words: &mut [u32]) -> core::result::Result<(), Self::Error>;
}

impl<T: Ad7616Interface + ?Sized> Ad7616Interface for &mut T {
    type Error = T::Error;

    fn write_register(&mut self, address: u8, value: u16) -> core::result::Result<(), Self::Error> {
        (**self).write_register(address, value)
    }

    fn read_register(&mut self, address: u8) -> core::result::Result<u16, Self::Error> {
        (**self).read_register(address)
    }

    fn convert(&mut self, words: &mut [u32]) -> core::result::Result<(), Self::Error> {
        (**self).convert(words)
    }
}
