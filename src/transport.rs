//! Component A: the USB bulk channel. Owns the FT2232H handle and performs
//! the fixed bring-up sequence the MPSSE framer depends on. Nothing here
//! knows about JTAG, SPI, or MPSSE opcodes — it is a thin, ordered wrapper
//! around `libftd2xx`'s device-level operations.

use std::time::Duration;

use libftd2xx::{BitMode, Eeprom2232h, Ft2232h, Ftdi, FtdiCommon, FtdiEeprom};

use crate::eeprom::BridgeEeprom;
use crate::error::{Error, Result};

/// Which protocol the bridge is about to be configured for. Only the latency
/// timer differs between the two profiles (§4.A step 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Jtag,
    Spi,
}

impl Profile {
    fn latency_ms(self) -> u64 {
        match self {
            Profile::Jtag => 16,
            Profile::Spi => 1,
        }
    }
}

/// An opened, bring-up-complete bridge session. All MPSSE operations in
/// `crate::mpsse` are built on top of `write`/`read`/`queued_input_bytes`.
pub struct Session {
    ft: Ft2232h,
}

impl Session {
    /// Open the bridge at `index` and run the full §4.A initialization
    /// sequence. The device is left in MPSSE mode with loopback disabled by
    /// the time this returns; the caller still owes it a post-sync
    /// configuration (`crate::mpsse::Mpsse::new`) before any shifts happen.
    pub fn open(index: i32, profile: Profile) -> Result<Self> {
        let ftdi = Ftdi::with_index(index).map_err(Error::bridge_open)?;
        let mut ft = Ft2232h::try_from(ftdi).map_err(Error::bridge_open)?;

        ft.reset().map_err(Error::bridge_config)?;
        ft.purge_rx().map_err(Error::bridge_config)?;
        ft.set_usb_parameters(65536).map_err(Error::bridge_config)?;
        ft.set_chars(0, false, 0, false)
            .map_err(Error::bridge_config)?;
        ft.set_timeouts(Duration::from_millis(0), Duration::from_millis(5000))
            .map_err(Error::bridge_config)?;
        ft.set_latency_timer(Duration::from_millis(profile.latency_ms()))
            .map_err(Error::bridge_config)?;
        ft.set_bit_mode(0x00, BitMode::Reset)
            .map_err(Error::bridge_config)?;
        ft.set_bit_mode(0x00, BitMode::Mpsse)
            .map_err(Error::bridge_config)?;
        std::thread::sleep(Duration::from_millis(100));

        log::debug!("bridge {index} reset and in MPSSE mode ({profile:?} profile)");
        Ok(Session { ft })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.ft.write(data).map_err(Error::usb)
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.ft.read(buf).map_err(Error::usb)
    }

    /// Number of bytes currently queued in the device's receive buffer.
    pub fn queued_input_bytes(&mut self) -> Result<usize> {
        self.ft.queue_status().map_err(Error::usb)
    }

    pub fn purge_input(&mut self) -> Result<()> {
        self.ft.purge_rx().map_err(Error::usb)
    }

    /// Program the device's vendor EEPROM from a byte-exact record (§10.4's
    /// `-u` flag). `libftd2xx` exposes EEPROM access through a per-chip typed
    /// struct rather than a raw blob, so the record's fields are copied
    /// across rather than written as a byte transfer.
    pub fn program_eeprom(&mut self, record: &BridgeEeprom) -> Result<()> {
        let mut eeprom = Eeprom2232h::default();
        eeprom.header.vendor_id = record.config.vendor_id;
        eeprom.header.product_id = record.config.product_id;
        eeprom.header.max_power = record.config.max_power_ma;
        eeprom.header.self_powered = record.config.self_powered;
        eeprom.header.remote_wakeup = record.config.remote_wakeup;
        self.ft
            .eeprom_program(
                eeprom,
                &record.manufacturer,
                &record.manufacturer_id,
                &record.description,
                &record.serial_number,
            )
            .map_err(Error::usb)?;
        log::info!("programmed bridge EEPROM: {}", record.description);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // `Ft2232h`'s own `Drop` impl closes the underlying handle; this is
        // just a breadcrumb so a partial programming run is visible in logs.
        log::debug!("closing bridge session");
    }
}
