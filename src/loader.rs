//! Component D: the Artix-7 loader. Sequences IR/DR shifts over the JTAG TAP
//! driver to configure the FPGA from RAM, and to erase/program its attached
//! SPI flash indirectly through a "user bridge" bitstream.

use std::path::Path;
use std::time::Duration;

use crate::bits::reverse_bytes;
use crate::error::Result;
use crate::jtag::{TapDriver, TapState};
use crate::mpsse::MpsseTransport;

/// Six-bit Series-7 boundary-scan instructions. The full instruction set is
/// carried here even though only a handful are used by any wired operation,
/// matching what a real BSDL file for this device family exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Instruction {
    Sample = 0x01,
    User1 = 0x02,
    User2 = 0x03,
    CfgOut = 0x04,
    CfgIn = 0x05,
    UserCode = 0x08,
    IdCode = 0x09,
    JProgram = 0x0B,
    JStart = 0x0C,
    JShutdown = 0x0D,
    IscEnable = 0x10,
    IscProgram = 0x11,
    XscProgramKey = 0x12,
    XscDna = 0x17,
    IscNoop = 0x14,
    IscDisable = 0x16,
    User3 = 0x22,
    User4 = 0x23,
    Extest = 0x26,
    FuseDna = 0x32,
    XadcDrp = 0x37,
    ExtestPulse = 0x3C,
    ExtestTrain = 0x3D,
    Bypass = 0x2F,
}

/// The literal bit pattern shifted through CFG_IN at the end of `load_bin` to
/// read back the DONE bit; reversed byte order as the wire expects (§4.D
/// step 8). Fixed by the Xilinx configuration protocol, not a magic number
/// this crate invented.
const STATUS_CHECK_PATTERN: &str = "0000000400000004800700140000000466aa9955";

pub struct Artix7Loader<T> {
    tap: TapDriver<T>,
}

impl<T: MpsseTransport> Artix7Loader<T> {
    pub fn new(tap: TapDriver<T>) -> Self {
        Artix7Loader { tap }
    }

    fn set_ir(&mut self, instr: Instruction) -> Result<()> {
        self.tap.navigate(TapState::ShiftIr)?;
        self.tap.shift(6, &[instr as u8], false)?;
        self.tap.navigate(TapState::Idle)?;
        Ok(())
    }

    fn shift_dr(
        &mut self,
        bits: usize,
        tdi: &[u8],
        expected: Option<&[u8]>,
        mask: Option<&[u8]>,
    ) -> Result<bool> {
        self.tap.navigate(TapState::ShiftDr)?;
        let ok = match expected {
            Some(exp) => self.tap.shift_checked(bits, tdi, exp, mask.unwrap_or(&[]))?,
            None => {
                self.tap.shift(bits, tdi, false)?;
                true
            }
        };
        self.tap.navigate(TapState::Idle)?;
        Ok(ok)
    }

    /// `check_idcode`: an internal pre-flight sanity probe, not wired to any
    /// CLI flag. Ignores the top four (silicon revision) bits of the IDCODE.
    pub fn check_idcode(&mut self) -> Result<bool> {
        self.set_ir(Instruction::IdCode)?;
        self.shift_dr(
            32,
            &[0, 0, 0, 0],
            Some(&0x0362d093u32.to_be_bytes()),
            Some(&0x0fffffffu32.to_be_bytes()),
        )
    }

    /// Configure the FPGA from RAM with the bitstream at `path`. The
    /// canonical Xilinx JTAG configuration sequence.
    pub fn load_bin(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read(path).map_err(|source| crate::error::Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        let reversed = reverse_bytes(&raw);

        self.tap.set_freq(10_000_000.0)?;
        self.tap.reset_state()?;
        self.tap.navigate(TapState::Idle)?;

        self.set_ir(Instruction::JProgram)?;
        self.set_ir(Instruction::IscNoop)?;
        std::thread::sleep(Duration::from_millis(100));

        self.tap.send_clocks(10_000)?;
        self.shift_dr(6, &[0x14], Some(&[0x11]), Some(&[0x31]))?;

        self.set_ir(Instruction::CfgIn)?;
        self.shift_dr(reversed.len() * 8, &reversed, None, None)?;

        self.tap.navigate(TapState::Idle)?;
        self.tap.send_clocks(100_000)?;
        self.set_ir(Instruction::JStart)?;
        self.tap.navigate(TapState::Idle)?;
        self.tap.send_clocks(100)?;
        self.shift_dr(6, &[0x09], Some(&[0x31]), Some(&[0x11]))?;

        self.tap.reset_state()?;
        self.tap.send_clocks(5)?;
        self.set_ir(Instruction::CfgIn)?;
        // Byte order reversed only, not bit-reversed: this literal already
        // carries the Xilinx sync word (0xAA995566) in wire order, and
        // bit-reversing it would corrupt that sync word.
        let status: Vec<u8> = hex_literal(STATUS_CHECK_PATTERN).into_iter().rev().collect();
        self.shift_dr(160, &status, None, None)?;
        self.set_ir(Instruction::CfgOut)?;
        self.shift_dr(
            32,
            &[0, 0, 0, 0],
            Some(&[0x3f, 0x5e, 0x0d, 0x40]),
            Some(&[0x08, 0x00, 0x00, 0x00]),
        )?;
        self.tap.reset_state()?;
        self.tap.send_clocks(5)?;
        Ok(())
    }

    /// Erase the Au's SPI flash, indirectly through `bridge_bin`'s JTAG↔SPI
    /// user bridge.
    pub fn erase_flash(&mut self, bridge_bin: &Path) -> Result<()> {
        self.load_bin(bridge_bin)?;
        self.tap.set_freq(1_500_000.0)?;
        self.set_ir(Instruction::User1)?;
        self.shift_dr(1, &[0], None, None)?;
        std::thread::sleep(Duration::from_secs(1));
        self.set_ir(Instruction::JProgram)?;
        self.tap.reset_state()
    }

    /// Write `file` either into the flash (through `bridge_bin`'s user
    /// bridge, USER2 DR path) or directly into configuration RAM.
    pub fn write_bin(&mut self, file: &Path, flash: bool, bridge_bin: &Path) -> Result<()> {
        if !flash {
            self.load_bin(file)?;
            return self.tap.reset_state();
        }

        self.load_bin(bridge_bin)?;
        self.tap.set_freq(1_500_000.0)?;
        self.set_ir(Instruction::User1)?;
        self.shift_dr(1, &[0], None, None)?;
        std::thread::sleep(Duration::from_millis(100));

        let raw = std::fs::read(file).map_err(|source| crate::error::Error::File {
            path: file.to_path_buf(),
            source,
        })?;
        // Same bit+byte reversal as load_bin's bitstream (§4.D "Byte-reversal"):
        // the USER2 DR path ships LSB-first per byte just like CFG_IN does.
        let reversed = reverse_bytes(&raw);
        self.set_ir(Instruction::User2)?;
        self.shift_dr(reversed.len() * 8, &reversed, None, None)?;

        self.tap.reset_state()?;
        std::thread::sleep(Duration::from_millis(100));
        self.set_ir(Instruction::JProgram)?;
        self.tap.reset_state()
    }
}

fn hex_literal(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).expect("valid hex literal"))
        .collect()
}
