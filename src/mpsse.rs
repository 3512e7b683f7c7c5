//! Component B: the MPSSE framer. Assembles the literal opcode frames the
//! FT2232H's Multi-Protocol Synchronous Serial Engine understands and parses
//! the bytes it sends back. This module knows nothing about JTAG states or
//! SPI flash commands; it is the shared primitive layer both `jtag` and
//! `spi` build on, mirroring the `Cable` abstraction the wider JTAG-cable
//! ecosystem uses, generalized here to the one bridge chip this crate talks
//! to.

use crate::error::{Error, Result};
use crate::transport::{Profile, Session};

mod opcode {
    pub const CLOCK_BYTES_OUT_NEG: u8 = 0x19;
    pub const CLOCK_BITS_OUT_NEG: u8 = 0x1B;
    pub const CLOCK_BYTES_IO_NEG: u8 = 0x39;
    pub const CLOCK_BITS_IO_NEG: u8 = 0x3B;
    pub const CLOCK_TMS_OUT: u8 = 0x4B;
    /// The TMS-exit frame that ships the final TDI bit while leaving
    /// Shift-DR/IR (§4.C), distinct from `CLOCK_TMS_OUT`'s plain navigation
    /// use in `TapDriver::navigate`.
    pub const CLOCK_TMS_IO_OUT: u8 = 0x4E;
    pub const CLOCK_TMS_IO: u8 = 0x6E;
    /// MSB-first SPI shift opcodes (Component E), distinct from the
    /// LSB-first-per-byte JTAG framing above.
    pub const SPI_CLOCK_BYTES_OUT: u8 = 0x11;
    pub const SPI_CLOCK_BYTES_IO: u8 = 0x31;
    pub const SPI_CLOCK_BITS_IO: u8 = 0x33;
    pub const SET_GPIO_LOW: u8 = 0x80;
    pub const SET_GPIO_HIGH: u8 = 0x82;
    pub const READ_GPIO_LOW: u8 = 0x81;
    pub const READ_GPIO_HIGH: u8 = 0x83;
    pub const LOOPBACK_OFF: u8 = 0x85;
    pub const SET_CLOCK_DIVISOR: u8 = 0x86;
    pub const DISABLE_DIV5: u8 = 0x8A;
    pub const DISABLE_3PHASE: u8 = 0x8D;
    pub const CLOCK_BYTES_ONLY: u8 = 0x8F;
    pub const DISABLE_ADAPTIVE: u8 = 0x97;
    pub const BOGUS: u8 = 0xAA;
}

/// A maximum single shift frame can move (the opcode's 16-bit length field,
/// `N-1` encoded, caps the true count at 65536).
const MAX_BYTES_PER_FRAME: usize = 65536;

/// Abstraction `Mpsse` is built over: a byte-stream device that can send,
/// receive, and report how many bytes are presently queued to be read. The
/// real implementation is `transport::Session`; tests use an in-memory fake
/// that records the emitted byte stream instead of talking to hardware.
pub trait MpsseTransport {
    fn send(&mut self, bytes: &[u8]) -> Result<()>;
    fn recv(&mut self, buf: &mut [u8]) -> Result<()>;
    fn queued_input_bytes(&mut self) -> Result<usize>;
}

impl MpsseTransport for Session {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let n = self.write(bytes)?;
        if n != bytes.len() {
            return Err(Error::usb(format!(
                "short write: sent {n} of {} bytes",
                bytes.len()
            )));
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            filled += self.read(&mut buf[filled..])?;
        }
        Ok(())
    }

    fn queued_input_bytes(&mut self) -> Result<usize> {
        Session::queued_input_bytes(self)
    }
}

pub struct Mpsse<T> {
    transport: T,
}

impl<T: MpsseTransport> Mpsse<T> {
    /// Run the sync probe and post-sync configuration for `profile`. The
    /// caller is responsible for having already run the §4.A bring-up
    /// sequence on the underlying transport (`Session::open`).
    pub fn new(transport: T, profile: Profile) -> Result<Self> {
        let mut mpsse = Mpsse { transport };
        mpsse.sync_probe()?;
        match profile {
            Profile::Jtag => mpsse.configure_jtag()?,
            Profile::Spi => mpsse.configure_spi()?,
        }
        Ok(mpsse)
    }

    fn flush_input(&mut self) -> Result<()> {
        let queued = self.transport.queued_input_bytes()?;
        if queued > 0 {
            let mut discard = vec![0u8; queued];
            self.transport.recv(&mut discard)?;
        }
        Ok(())
    }

    fn recv_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        loop {
            if self.transport.queued_input_bytes()? >= n {
                break;
            }
        }
        let mut buf = vec![0u8; n];
        self.transport.recv(&mut buf)?;
        Ok(buf)
    }

    fn sync_probe(&mut self) -> Result<()> {
        self.transport.send(&[opcode::BOGUS])?;
        loop {
            if self.transport.queued_input_bytes()? > 0 {
                break;
            }
        }
        // Bound the drain to the probe's own small reply; 8 bytes is ample
        // for the (0xFA, 0xAA) echo plus whatever else is in flight.
        let queued = self.transport.queued_input_bytes()?.min(8);
        let mut buf = vec![0u8; queued.max(1)];
        self.transport.recv(&mut buf)?;
        if buf.windows(2).any(|w| w == [0xFA, 0xAA]) {
            Ok(())
        } else {
            Err(Error::MpsseSync)
        }
    }

    fn configure_jtag(&mut self) -> Result<()> {
        self.transport.send(&[
            opcode::DISABLE_DIV5,
            opcode::DISABLE_ADAPTIVE,
            opcode::DISABLE_3PHASE,
        ])?;
        self.transport
            .send(&[opcode::SET_GPIO_LOW, 0x08, 0x0B])?;
        self.transport
            .send(&[opcode::SET_GPIO_HIGH, 0x00, 0x00])?;
        self.transport
            .send(&[opcode::SET_CLOCK_DIVISOR, 0xDB, 0x05])?;
        self.transport.send(&[opcode::LOOPBACK_OFF])
    }

    fn configure_spi(&mut self) -> Result<()> {
        self.transport.send(&[
            opcode::DISABLE_DIV5,
            opcode::DISABLE_ADAPTIVE,
            opcode::DISABLE_3PHASE,
        ])?;
        self.transport
            .send(&[opcode::SET_GPIO_LOW, 0x00, 0xBB])?;
        self.transport
            .send(&[opcode::SET_CLOCK_DIVISOR, 0x00, 0x00])?;
        self.transport.send(&[opcode::LOOPBACK_OFF])
    }

    /// `div = round(30_000_000 / hz - 1)`.
    pub fn set_freq(&mut self, hz: f64) -> Result<()> {
        let div = (30_000_000.0 / hz - 1.0).round() as u16;
        self.transport
            .send(&[opcode::SET_CLOCK_DIVISOR, (div & 0xff) as u8, (div >> 8) as u8])
    }

    pub fn set_gpio_low(&mut self, value: u8, direction: u8) -> Result<()> {
        self.transport.send(&[opcode::SET_GPIO_LOW, value, direction])
    }

    pub fn set_gpio_high(&mut self, value: u8, direction: u8) -> Result<()> {
        self.transport.send(&[opcode::SET_GPIO_HIGH, value, direction])
    }

    pub fn read_gpio_low(&mut self) -> Result<u8> {
        self.flush_input()?;
        self.transport.send(&[opcode::READ_GPIO_LOW])?;
        Ok(self.recv_exact(1)?[0])
    }

    /// Clock `n` bytes onto the wire with no data lines sampled (used for
    /// configuration guard clocks). Splits recursively above 65536 bytes.
    pub fn send_clocks(&mut self, cycles: u64) -> Result<()> {
        let bytes = (cycles + 7) / 8;
        if bytes as usize > MAX_BYTES_PER_FRAME {
            self.send_clocks(MAX_BYTES_PER_FRAME as u64 * 8)?;
            return self.send_clocks(cycles - MAX_BYTES_PER_FRAME as u64 * 8);
        }
        if bytes == 0 {
            return Ok(());
        }
        let len = (bytes - 1) as u16;
        self.transport
            .send(&[opcode::CLOCK_BYTES_ONLY, (len & 0xff) as u8, (len >> 8) as u8])
    }

    /// Emit one or more whole-byte shift frames for `data`, each capped at
    /// 65536 bytes. Returns the bytes read back when `do_read` is set.
    pub fn shift_bytes(&mut self, data: &[u8], do_read: bool) -> Result<Vec<u8>> {
        if do_read {
            self.flush_input()?;
        }
        let opc = if do_read {
            opcode::CLOCK_BYTES_IO_NEG
        } else {
            opcode::CLOCK_BYTES_OUT_NEG
        };
        let mut read_total = 0usize;
        for chunk in data.chunks(MAX_BYTES_PER_FRAME) {
            let len = (chunk.len() - 1) as u16;
            let mut frame = vec![opc, (len & 0xff) as u8, (len >> 8) as u8];
            frame.extend_from_slice(chunk);
            self.transport.send(&frame)?;
            read_total += chunk.len();
        }
        if do_read {
            self.recv_exact(read_total)
        } else {
            Ok(Vec::new())
        }
    }

    /// Shift `bits` (1..=8) of `byte` out (and optionally in). `bits` is the
    /// number of low bits of `byte` that are significant.
    pub fn shift_bits(&mut self, byte: u8, bits: u8, do_read: bool) -> Result<u8> {
        assert!((1..=8).contains(&bits));
        if do_read {
            self.flush_input()?;
        }
        let opc = if do_read {
            opcode::CLOCK_BITS_IO_NEG
        } else {
            opcode::CLOCK_BITS_OUT_NEG
        };
        self.transport.send(&[opc, bits - 1, byte])?;
        if do_read {
            // The chip captures into the top `bits` bits of the reply byte;
            // realign to the low bits so callers see bit i at position i.
            let raw = self.recv_exact(1)?[0];
            Ok(raw >> (8 - bits))
        } else {
            Ok(0)
        }
    }

    /// Emit a TMS-only frame of `count` bits (1..=7), with TDI held fixed at
    /// `tdi` for the duration. `tms_bits` is LSB-first. No read.
    pub fn shift_tms(&mut self, tms_bits: u8, count: u8, tdi: bool) -> Result<()> {
        assert!((1..=7).contains(&count));
        let data = (tms_bits & 0x7f) | if tdi { 0x80 } else { 0x00 };
        self.transport
            .send(&[opcode::CLOCK_TMS_OUT, count - 1, data])
    }

    /// Emit the final TMS bit of a DR/IR shift, carrying the last TDI bit in
    /// bit 7 of the data byte per the MPSSE TMS-frame convention (§4.C). Uses
    /// the shift-exit opcodes (0x4E/0x6E), not `CLOCK_TMS_OUT`'s plain
    /// navigation opcode. Reads one byte back when `do_read` is set.
    pub fn shift_tms_final(&mut self, tms_bit: bool, tdi_bit: bool, do_read: bool) -> Result<u8> {
        if do_read {
            self.flush_input()?;
        }
        let data = (if tms_bit { 0x03 } else { 0x00 }) | if tdi_bit { 0x80 } else { 0x00 };
        let opc = if do_read {
            opcode::CLOCK_TMS_IO
        } else {
            opcode::CLOCK_TMS_IO_OUT
        };
        self.transport.send(&[opc, 0x00, data])?;
        if do_read {
            // Only one bit is clocked, so it lands in bit 7 of the reply.
            Ok(self.recv_exact(1)?[0] >> 7)
        } else {
            Ok(0)
        }
    }

    /// MSB-first byte shift frame for a plain SPI bus (Component E): opcodes
    /// 0x11 (out-only) / 0x31 (in+out), distinct from `shift_bytes`'s
    /// LSB-first-per-byte JTAG framing.
    pub fn spi_shift_bytes(&mut self, data: &[u8], do_read: bool) -> Result<Vec<u8>> {
        if do_read {
            self.flush_input()?;
        }
        let opc = if do_read {
            opcode::SPI_CLOCK_BYTES_IO
        } else {
            opcode::SPI_CLOCK_BYTES_OUT
        };
        let mut read_total = 0usize;
        for chunk in data.chunks(MAX_BYTES_PER_FRAME) {
            let len = (chunk.len() - 1) as u16;
            let mut frame = vec![opc, (len & 0xff) as u8, (len >> 8) as u8];
            frame.extend_from_slice(chunk);
            self.transport.send(&frame)?;
            read_total += chunk.len();
        }
        if do_read {
            self.recv_exact(read_total)
        } else {
            Ok(Vec::new())
        }
    }

    /// MSB-first partial-byte shift for a plain SPI bus (opcode 0x33), always
    /// full duplex since the flash protocol never needs a write-only partial
    /// byte.
    pub fn spi_shift_bits(&mut self, byte: u8, bits: u8) -> Result<u8> {
        assert!((1..=8).contains(&bits));
        self.flush_input()?;
        self.transport
            .send(&[opcode::SPI_CLOCK_BITS_IO, bits - 1, byte])?;
        let raw = self.recv_exact(1)?[0];
        Ok(raw >> (8 - bits))
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::collections::VecDeque;

    /// Records every byte sent and answers reads from a pre-seeded queue,
    /// enabling MPSSE-trace assertions (§8 scenario 6) without hardware.
    #[derive(Default)]
    pub struct FakeTransport {
        pub sent: Vec<u8>,
        pub to_recv: VecDeque<u8>,
    }

    impl MpsseTransport for FakeTransport {
        fn send(&mut self, bytes: &[u8]) -> Result<()> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> Result<()> {
            for b in buf.iter_mut() {
                *b = self.to_recv.pop_front().unwrap_or(0);
            }
            Ok(())
        }

        fn queued_input_bytes(&mut self) -> Result<usize> {
            Ok(self.to_recv.len())
        }
    }
}

#[cfg(test)]
impl Mpsse<test_support::FakeTransport> {
    pub(crate) fn sent_for_test(&self) -> &[u8] {
        &self.transport.sent
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeTransport;
    use super::*;

    #[test]
    fn send_clocks_splits_above_65536_bytes() {
        let mut fake = FakeTransport::default();
        fake.to_recv.push_back(0xFA);
        fake.to_recv.push_back(0xAA);
        let mut m = Mpsse::new(fake, Profile::Jtag).unwrap();
        m.send_clocks(8 * 70_000).unwrap();
        for frame in m.transport.sent[..].chunks(3) {
            if frame.len() == 3 && frame[0] == opcode::CLOCK_BYTES_ONLY {
                let len = frame[1] as u16 | (frame[2] as u16) << 8;
                assert!(len <= 65535);
            }
        }
    }

    #[test]
    fn shift_tms_final_carries_last_tdi_bit() {
        let mut fake = FakeTransport::default();
        fake.to_recv.push_back(0xFA);
        fake.to_recv.push_back(0xAA);
        let mut m = Mpsse::new(fake, Profile::Jtag).unwrap();
        m.shift_tms_final(true, true, false).unwrap();
        let last3 = &m.transport.sent[m.transport.sent.len() - 3..];
        assert_eq!(last3, [opcode::CLOCK_TMS_IO_OUT, 0x00, 0x83]);
    }
}
