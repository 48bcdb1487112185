#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod log;
mod error;

pub mod config;
pub mod device;
pub mod interface;
#[cfg(feature = "linux")]
pub mod linux;
pub mod params;
pub mod registers;
pub mod sequence;
#[cfg(feature = "std")]
pub mod session;
#[cfg(feature = "std")]
pub mod stream;

#[cfg(test)]
mod testing;

pub use crate::device::Ad7616;
pub use crate::error::{ConfigError, Error, Result};
#[cfg(feature = "std")]
pub use crate::session::Session;
