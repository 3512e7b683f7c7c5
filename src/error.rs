//! Crate-wide error type. Every fallible operation in the USB, MPSSE, JTAG, and
//! loader layers returns `Result<_, Error>`; the SPI layer is the sole exception
//! (see `spi::Spi`, which terminates the process directly on I/O failure).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no FTDI device at index {0}")]
    DeviceNotFound(usize),

    #[error("no {0} board attached")]
    BoardNotFound(crate::enumerate::BoardKind),

    #[error("failed to open bridge device: {0}")]
    BridgeOpen(String),

    #[error("failed to configure bridge device: {0}")]
    BridgeConfig(String),

    #[error("MPSSE sync probe failed: bad-command echo not observed")]
    MpsseSync,

    #[error("USB I/O failure: {0}")]
    Usb(String),

    #[error("JTAG shift length mismatch: need {need} bytes for {bits} bits, got {got}")]
    LengthMismatch {
        bits: usize,
        need: usize,
        got: usize,
    },

    #[error("JTAG compare mismatch: got {got:02x?} expected {expected:02x?} mask {mask:02x?}")]
    CompareMismatch {
        got: Vec<u8>,
        expected: Vec<u8>,
        mask: Vec<u8>,
    },

    #[error("{0}")]
    Argument(String),

    #[error("I/O error for {path}: {source}")]
    File {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Wrap any vendor transport error (libftd2xx status, timeout, device-type
    /// mismatch) observed while the bridge is already open and configured.
    pub(crate) fn usb(e: impl std::fmt::Display) -> Self {
        Error::Usb(e.to_string())
    }

    /// Wrap a vendor error observed during `open`/`initialize`, before the
    /// session is usable.
    pub(crate) fn bridge_open(e: impl std::fmt::Display) -> Self {
        Error::BridgeOpen(e.to_string())
    }

    pub(crate) fn bridge_config(e: impl std::fmt::Display) -> Self {
        Error::BridgeConfig(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
