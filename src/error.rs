//! Error handling primitives for the AD7616 driver.

/// Crate-wide result type alias.
pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Error variants produced by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Opening or initializing the bus and device failed.
    DeviceOpen(E),
    /// The configuration register read back after initialization did not match.
    DeviceNotResponding {
        /// Value written during initialization.
        expected: u16,
        /// Value read back from the device.
        read: u16,
    },
    /// A register or conversion transfer failed on the bus.
    Transfer(E),
    /// A sequence read was requested before any sequence was defined.
    SequenceNotDefined,
    /// Invalid arguments; nothing was sent to the device.
    Configuration(ConfigError),
    /// The operation needs the bus while a stream owns it.
    StreamActive,
    /// The session lost its device when a stream panicked while stopping.
    Closed,
    /// Writing the sample log failed.
    #[cfg(feature = "std")]
    Log(std::io::ErrorKind),
}

/// Reasons for rejecting caller-supplied arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Channel index outside `0..=7`.
    ChannelOutOfRange(u8),
    /// A-side and B-side channel lists differ in length.
    LengthMismatch {
        /// Number of A-side channels.
        a: usize,
        /// Number of B-side channels.
        b: usize,
    },
    /// A sequence needs at least one channel pair.
    EmptySequence,
    /// More channel pairs than the sequencer stack holds.
    SequenceTooLong(usize),
    /// Address that does not name a user register.
    InvalidRegister(u8),
    /// Value wider than the 9-bit register data field.
    ValueOutOfRange(u16),
    /// Output buffer length does not match the request.
    BufferLength {
        /// Required length.
        expected: usize,
        /// Supplied length.
        actual: usize,
    },
    /// Streaming period must be non-zero.
    ZeroPeriod,
    /// SPI clock rate of zero.
    ZeroClock,
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Self::Transfer(err)
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ChannelOutOfRange(channel) => write!(f, "channel {} out of range 0..=7", channel),
            Self::LengthMismatch { a, b } => {
                write!(f, "A-side has {} channels but B-side has {}", a, b)
            }
            Self::EmptySequence => write!(f, "sequence is empty"),
            Self::SequenceTooLong(len) => write!(f, "sequence of {} pairs exceeds the stack depth", len),
            Self::InvalidRegister(address) => write!(f, "no user register at address {:#04x}", address),
            Self::ValueOutOfRange(value) => write!(f, "value {:#x} does not fit in 9 bits", value),
            Self::BufferLength { expected, actual } => {
                write!(f, "buffer holds {} entries, {} required", actual, expected)
            }
            Self::ZeroPeriod => write!(f, "streaming period is zero"),
            Self::ZeroClock => write!(f, "SPI clock rate is zero"),
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::DeviceOpen(err) => write!(f, "cannot open device: {:?}", err),
            Self::DeviceNotResponding { expected, read } => write!(
                f,
                "device not responding: wrote {:#05x}, read back {:#05x}",
                expected, read
            ),
            Self::Transfer(err) => write!(f, "transfer failed: {:?}", err),
            Self::SequenceNotDefined => write!(f, "no conversion sequence defined"),
            Self::Configuration(err) => write!(f, "invalid configuration: {}", err),
            Self::StreamActive => write!(f, "bus is owned by an active stream"),
            Self::Closed => write!(f, "session no longer holds a device"),
            #[cfg(feature = "std")]
            Self::Log(kind) => write!(f, "sample log I/O error: {}", kind),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug> std::error::Error for Error<E> {}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::DeviceOpen(err) => defmt::write!(f, "DeviceOpen({})", err),
            Self::DeviceNotResponding { expected, read } => {
                defmt::write!(f, "DeviceNotResponding {{ expected: {}, read: {} }}", expected, read)
            }
            Self::Transfer(err) => defmt::write!(f, "Transfer({})", err),
            Self::SequenceNotDefined => defmt::write!(f, "SequenceNotDefined"),
            Self::Configuration(err) => defmt::write!(f, "Configuration({})", err),
            Self::StreamActive => defmt::write!(f, "StreamActive"),
            Self::Closed => defmt::write!(f, "Closed"),
            #[cfg(feature = "std")]
            Self::Log(kind) => defmt::write!(f, "Log({})", defmt::Debug2Format(kind)),
        }
    }
}
