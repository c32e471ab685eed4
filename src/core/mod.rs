//! The core module holds the device interface and the error type shared by all other modules.

pub mod device;
pub mod error;
