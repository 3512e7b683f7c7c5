//! A command-line programmer for the Alchitry Au (Xilinx Artix-7) and Cu
//! (Lattice iCE40) FPGA boards, driven through an FT2232H MPSSE USB bridge.
//!
//! The crate is layered the way the hardware path is layered: `transport`
//! opens and configures the bridge chip, `mpsse` frames the MPSSE opcode
//! protocol on top of it, `jtag` drives the IEEE-1149.1 TAP state machine,
//! and `loader`/`spi` implement the two boards' programming sequences on
//! top of that. `enumerate` and `eeprom` cover attaching to a specific
//! device and re-personalizing its vendor EEPROM.

pub mod bits;
pub mod cli;
pub mod eeprom;
pub mod enumerate;
pub mod error;
pub mod jtag;
pub mod loader;
pub mod mpsse;
pub mod spi;
pub mod transport;

pub use error::{Error, Result};
