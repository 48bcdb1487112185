//! Logging shims forwarding to `defmt` or the `log` facade.
//!
//! The `log` facade wins when both features are enabled, so host builds with
//! `std` keep formatting through `log`. With neither, the arguments are still
//! type-checked but nothing is emitted.

macro_rules! emit {
    ($level:ident, $($arg:tt)*) => {{
        #[cfg(feature = "log")]
        ::log::$level!($($arg)*);
        #[cfg(all(feature = "defmt", not(feature = "log")))]
        defmt::$level!($($arg)*);
        #[cfg(not(any(feature = "log", feature = "defmt")))]
        {
            let _ = core::format_args!($($arg)*);
        }
    }};
}

#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => { emit!(trace, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => { emit!(debug, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => { emit!(info, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => { emit!(warn, $($arg)*) };
}

#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => { emit!(error, $($arg)*) };
}
