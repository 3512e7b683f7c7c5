//! Component E: the iCE40 SPI programmer. Plain SPI master over MPSSE plus
//! chip-select/CRESET GPIO choreography, driving a Winbond-compatible
//! serial-NOR command set.
//!
//! Unlike every other layer, a fatal I/O error here terminates the process
//! directly (§7 "SPI abort") instead of propagating a `Result`: flash state
//! is undefined mid-transaction, so there is no meaningful way for a caller
//! to recover once a write has started.

use std::path::Path;
use std::time::Duration;

use crate::mpsse::{Mpsse, MpsseTransport};

const CS_BIT: u8 = 0x10;
const CRESET_BIT: u8 = 0x80;
const CDONE_BIT: u8 = 0x40;
const GPIO_DIRECTION: u8 = 0x93;

/// Winbond-compatible serial-NOR opcodes this crate issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlashCmd {
    WriteStatus1 = 0x01,
    PageProgram = 0x02,
    Read = 0x03,
    WriteEnable = 0x06,
    ReadStatus1 = 0x05,
    ReleasePowerDown = 0xAB,
    PowerDown = 0xB9,
    BulkErase = 0xC7,
    SectorErase64k = 0xD8,
    /// Some parts also answer to 0x9E; this crate only ever issues 0x9F.
    ReadJedecId = 0x9F,
}

pub struct Spi<T> {
    mpsse: Mpsse<T>,
}

impl<T: MpsseTransport> Spi<T> {
    pub fn new(mpsse: Mpsse<T>) -> Self {
        Spi { mpsse }
    }

    /// Abort the process: flash state is undefined once an SPI write has
    /// failed partway. Mirrors the original program's hard-stop behavior.
    fn abort(context: &str) -> ! {
        log::error!("ABORT: {context}");
        std::process::exit(2)
    }

    fn check<R>(result: crate::error::Result<R>, context: &str) -> R {
        match result {
            Ok(v) => v,
            Err(e) => Self::abort(&format!("{context}: {e}")),
        }
    }

    fn set_gpio(&mut self, slave_select: bool, creset: bool) {
        let mut value = 0u8;
        if slave_select {
            value |= CS_BIT;
        }
        if creset {
            value |= CRESET_BIT;
        }
        let r = self.mpsse.set_gpio_low(value, GPIO_DIRECTION);
        Self::check(r, "set_gpio");
    }

    fn get_cdone(&mut self) -> bool {
        let v = Self::check(self.mpsse.read_gpio_low(), "get_cdone");
        v & CDONE_BIT != 0
    }

    fn select(&mut self) {
        self.set_gpio(false, true);
    }

    fn deselect(&mut self) {
        self.set_gpio(true, true);
    }

    /// SPI is MSB-first; these go through `Mpsse::spi_shift_bytes`/
    /// `spi_shift_bits` (opcodes 0x11/0x31/0x33), not the JTAG
    /// LSB-first-per-byte `shift_bytes`/`shift_bits`.
    fn send_spi(&mut self, data: &[u8]) {
        let r = self.mpsse.spi_shift_bytes(data, false);
        Self::check(r.map(|_| ()), "send_spi");
    }

    fn xfer_spi(&mut self, data: &[u8]) -> Vec<u8> {
        Self::check(self.mpsse.spi_shift_bytes(data, true), "xfer_spi")
    }

    fn xfer_spi_bits(&mut self, byte: u8, bits: u8) -> u8 {
        Self::check(self.mpsse.spi_shift_bits(byte, bits), "xfer_spi_bits")
    }

    fn flash_reset(&mut self) {
        for bits in [8u8, 2] {
            self.select();
            self.xfer_spi_bits(0xff, bits);
            self.deselect();
        }
    }

    fn flash_power_up(&mut self) {
        self.select();
        self.send_spi(&[FlashCmd::ReleasePowerDown as u8]);
        self.deselect();
    }

    fn flash_power_down(&mut self) {
        self.select();
        self.send_spi(&[FlashCmd::PowerDown as u8]);
        self.deselect();
    }

    fn flash_read_id(&mut self) -> Vec<u8> {
        self.select();
        let mut resp = self.xfer_spi(&[FlashCmd::ReadJedecId as u8, 0, 0, 0, 0]);
        let ext_len = resp[4];
        if ext_len != 0xFF && ext_len != 0 {
            let more = self.xfer_spi(&vec![0u8; ext_len as usize]);
            resp.extend(more);
        }
        self.deselect();
        resp
    }

    fn flash_write_enable(&mut self) {
        self.select();
        self.send_spi(&[FlashCmd::WriteEnable as u8]);
        self.deselect();
    }

    fn flash_read_status1(&mut self) -> u8 {
        self.select();
        let resp = self.xfer_spi(&[FlashCmd::ReadStatus1 as u8, 0]);
        self.deselect();
        resp[1]
    }

    /// Poll SR1 until BUSY (bit 0) reads clear on two consecutive samples.
    fn flash_wait(&mut self) {
        let mut consecutive_idle = 0;
        while consecutive_idle < 2 {
            let sr1 = self.flash_read_status1();
            if sr1 & 1 == 0 {
                consecutive_idle += 1;
            } else {
                consecutive_idle = 0;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn flash_bulk_erase(&mut self) {
        self.select();
        self.send_spi(&[FlashCmd::BulkErase as u8]);
        self.deselect();
    }

    fn flash_64k_sector_erase(&mut self, addr: u32) {
        self.select();
        self.send_spi(&[
            FlashCmd::SectorErase64k as u8,
            (addr >> 16) as u8,
            (addr >> 8) as u8,
            addr as u8,
        ]);
        self.deselect();
    }

    fn flash_prog(&mut self, addr: u32, data: &[u8]) {
        self.select();
        self.send_spi(&[
            FlashCmd::PageProgram as u8,
            (addr >> 16) as u8,
            (addr >> 8) as u8,
            addr as u8,
        ]);
        self.send_spi(data);
        self.deselect();
    }

    /// Internal read-back used by tests to verify a write actually landed;
    /// not wired to a CLI flag.
    pub(crate) fn flash_read(&mut self, addr: u32, len: usize) -> Vec<u8> {
        self.select();
        self.send_spi(&[
            FlashCmd::Read as u8,
            (addr >> 16) as u8,
            (addr >> 8) as u8,
            addr as u8,
        ]);
        let data = self.xfer_spi(&vec![0u8; len]);
        self.deselect();
        data
    }

    fn preamble(&mut self) {
        self.deselect();
        std::thread::sleep(Duration::from_millis(250));
        let cdone = self.get_cdone();
        log::debug!("CDONE before programming: {cdone}");
        self.flash_reset();
        self.flash_power_up();
        let id = self.flash_read_id();
        log::info!("flash JEDEC ID: {id:02x?}");
    }

    fn postamble(&mut self) {
        self.flash_power_down();
        self.deselect();
        std::thread::sleep(Duration::from_millis(250));
    }

    pub fn erase(&mut self) {
        self.preamble();
        self.flash_write_enable();
        self.flash_bulk_erase();
        self.flash_wait();
        self.postamble();
    }

    pub fn write_image(&mut self, path: &Path, rw_offset: u32) {
        let data = match std::fs::read(path) {
            Ok(d) => d,
            Err(e) => Self::abort(&format!("reading {}: {e}", path.display())),
        };
        self.preamble();

        let begin = rw_offset & !0xFFFF;
        let end = (rw_offset + data.len() as u32 + 0xFFFF) & !0xFFFF;

        let mut addr = begin;
        while addr < end {
            self.flash_write_enable();
            self.flash_64k_sector_erase(addr);
            self.flash_wait();
            addr += 0x10000;
        }

        let mut offset = 0usize;
        while offset < data.len() {
            let addr = rw_offset + offset as u32;
            let page_size = 256 - (addr as usize % 256);
            let chunk_len = page_size.min(data.len() - offset);
            self.flash_write_enable();
            self.flash_prog(addr, &data[offset..offset + chunk_len]);
            self.flash_wait();
            offset += chunk_len;
        }

        self.postamble();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mpsse::test_support::FakeTransport;

    fn spi_over_fake() -> Spi<FakeTransport> {
        let mut fake = FakeTransport::default();
        fake.to_recv.push_back(0xFA);
        fake.to_recv.push_back(0xAA);
        let mpsse = Mpsse::new(fake, crate::transport::Profile::Spi).unwrap();
        Spi::new(mpsse)
    }

    #[test]
    fn sector_erase_encodes_big_endian_address() {
        let mut spi = spi_over_fake();
        spi.flash_64k_sector_erase(0x01_0000);
        let sent = spi.mpsse.sent_for_test();
        // The erase command is the last spi_shift_bytes frame emitted:
        // opcode, length-1 (lsb, msb), then the 4-byte command+address
        // payload, MSB-first (0x11), not the JTAG LSB-first 0x19.
        let frame = &sent[sent.len() - 7..];
        assert_eq!(frame, [0x11, 0x03, 0x00, 0xD8, 0x01, 0x00, 0x00]);
    }
}
