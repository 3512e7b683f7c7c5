//! Component H: the CLI front end. A thin `clap`-derived mirror of the §6
//! flag table plus the two cross-field validation rules it implies.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::enumerate::BoardKind;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Board {
    Au,
    Cu,
}

impl From<Board> for BoardKind {
    fn from(b: Board) -> Self {
        match b {
            Board::Au => BoardKind::Au,
            Board::Cu => BoardKind::Cu,
        }
    }
}

/// Command-line programmer for the Alchitry Au and Cu FPGA boards.
#[derive(Debug, Parser)]
#[command(name = "alchitry-loader", version, about)]
pub struct Cli {
    /// Erase FPGA flash
    #[arg(short = 'e')]
    pub erase: bool,

    /// Write PATH to FPGA flash
    #[arg(short = 'f', value_name = "PATH")]
    pub write_flash: Option<PathBuf>,

    /// Write PATH to FPGA RAM (Au only)
    #[arg(short = 'r', value_name = "PATH")]
    pub write_ram: Option<PathBuf>,

    /// Program bridge EEPROM from PATH
    #[arg(short = 'u', value_name = "PATH")]
    pub program_eeprom: Option<PathBuf>,

    /// Au bridge bitstream (required for -e/-f on Au)
    #[arg(short = 'p', value_name = "PATH")]
    pub bridge_bin: Option<PathBuf>,

    /// Select device index (default: first of requested kind)
    #[arg(short = 'b', value_name = "N")]
    pub device_index: Option<i32>,

    /// Board kind
    #[arg(short = 't', value_enum, default_value = "au")]
    pub board: Board,

    /// List devices
    #[arg(short = 'l')]
    pub list: bool,
}

impl Cli {
    /// Cross-field validation the flag table implies but `clap` can't express
    /// declaratively (§10.3). Called once after parsing.
    pub fn validate(&self) -> Result<()> {
        if !self.erase
            && self.write_flash.is_none()
            && self.write_ram.is_none()
            && self.program_eeprom.is_none()
            && !self.list
        {
            return Err(Error::Argument("no action selected".into()));
        }
        if self.board == Board::Cu && self.write_ram.is_some() {
            return Err(Error::Argument(
                "-r (write to FPGA RAM) is not supported on the Cu board".into(),
            ));
        }
        if self.board == Board::Au
            && (self.erase || self.write_flash.is_some())
            && self.bridge_bin.is_none()
        {
            return Err(Error::Argument(
                "-p (bridge bitstream) is required for -e/-f on the Au board".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["alchitry-loader"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn erase_flag() {
        assert!(parse(&["-e"]).erase);
    }

    #[test]
    fn write_flash_flag() {
        assert_eq!(parse(&["-f", "top.bin"]).write_flash.unwrap(), PathBuf::from("top.bin"));
    }

    #[test]
    fn write_ram_flag() {
        assert_eq!(parse(&["-r", "top.bin"]).write_ram.unwrap(), PathBuf::from("top.bin"));
    }

    #[test]
    fn program_eeprom_flag() {
        assert_eq!(
            parse(&["-u", "eeprom.bin"]).program_eeprom.unwrap(),
            PathBuf::from("eeprom.bin")
        );
    }

    #[test]
    fn bridge_bin_flag() {
        assert_eq!(parse(&["-p", "bridge.bin"]).bridge_bin.unwrap(), PathBuf::from("bridge.bin"));
    }

    #[test]
    fn device_index_flag() {
        assert_eq!(parse(&["-b", "3"]).device_index, Some(3));
    }

    #[test]
    fn board_flag_defaults_to_au() {
        assert_eq!(parse(&["-l"]).board, Board::Au);
        assert_eq!(parse(&["-l", "-t", "cu"]).board, Board::Cu);
    }

    #[test]
    fn list_flag() {
        assert!(parse(&["-l"]).list);
    }

    #[test]
    fn no_action_is_rejected() {
        assert!(parse(&["-t", "au"]).validate().is_err());
    }

    #[test]
    fn cu_write_ram_is_rejected() {
        let cli = parse(&["-t", "cu", "-r", "top.bin"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn au_write_ram_is_accepted_without_bridge_bin() {
        let cli = parse(&["-t", "au", "-r", "top.bin"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn au_erase_requires_bridge_bin() {
        let cli = parse(&["-t", "au", "-e"]);
        assert!(cli.validate().is_err());
        let cli = parse(&["-t", "au", "-e", "-p", "bridge.bin"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn list_alone_is_accepted() {
        assert!(parse(&["-l"]).validate().is_ok());
    }
}
