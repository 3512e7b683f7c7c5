//! Binary entry point. Parses arguments, resolves a device index, dispatches
//! to the Au (JTAG) or Cu (SPI) path, and maps errors to the §6 exit codes.

use std::path::Path;

use clap::Parser;

use alchitry_loader::cli::{Board, Cli};
use alchitry_loader::eeprom::BridgeEeprom;
use alchitry_loader::enumerate::{self, BoardKind};
use alchitry_loader::error::{Error, Result};
use alchitry_loader::jtag::TapDriver;
use alchitry_loader::loader::Artix7Loader;
use alchitry_loader::mpsse::Mpsse;
use alchitry_loader::spi::Spi;
use alchitry_loader::transport::{Profile, Session};

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }

    match run(&cli) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            std::process::exit(match e {
                Error::Argument(_) => 1,
                _ => 2,
            });
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.list {
        for device in enumerate::list_devices()? {
            println!(
                "{}: {} ({}) serial={}",
                device.index, device.description, device.kind, device.serial_number
            );
        }
        if !cli.erase && cli.write_flash.is_none() && cli.write_ram.is_none() && cli.program_eeprom.is_none() {
            return Ok(());
        }
    }

    let board_kind: BoardKind = cli.board.into();
    let index = match cli.device_index {
        Some(n) => n,
        None => enumerate::first_of_kind(board_kind)? as i32,
    };
    log::info!("selected {board_kind} board at index {index}");

    if let Some(path) = &cli.program_eeprom {
        let record = BridgeEeprom::read_from_file(path)?;
        let mut session = Session::open(index, Profile::Jtag)?;
        session.program_eeprom(&record)?;
    }

    if cli.erase || cli.write_flash.is_some() {
        match cli.board {
            Board::Au => {
                let bridge_bin = cli.bridge_bin.as_ref().expect("validated by Cli::validate");
                run_au_flash(index, bridge_bin, cli.write_flash.as_deref())?;
            }
            Board::Cu => run_cu_flash(index, cli.erase, cli.write_flash.as_deref())?,
        }
    }

    if let Some(path) = &cli.write_ram {
        let mut loader = open_au_loader(index)?;
        loader.write_bin(path, false, Path::new(""))?;
    }

    Ok(())
}

fn open_au_loader(index: i32) -> Result<Artix7Loader<Session>> {
    let session = Session::open(index, Profile::Jtag)?;
    let mpsse = Mpsse::new(session, Profile::Jtag)?;
    let tap = TapDriver::new(mpsse)?;
    Ok(Artix7Loader::new(tap))
}

fn run_au_flash(index: i32, bridge_bin: &Path, write_flash: Option<&Path>) -> Result<()> {
    let mut loader = open_au_loader(index)?;
    if let Some(path) = write_flash {
        log::info!("writing {} to Au flash", path.display());
        loader.write_bin(path, true, bridge_bin)?;
    } else {
        log::info!("erasing Au flash");
        loader.erase_flash(bridge_bin)?;
    }
    Ok(())
}

fn run_cu_flash(index: i32, erase: bool, write_flash: Option<&Path>) -> Result<()> {
    let session = Session::open(index, Profile::Spi)?;
    let mpsse = Mpsse::new(session, Profile::Spi)?;
    let mut spi = Spi::new(mpsse);
    if let Some(path) = write_flash {
        log::info!("writing {} to Cu flash", path.display());
        spi.write_image(path, 0);
    } else if erase {
        log::info!("erasing Cu flash");
        spi.erase();
    }
    Ok(())
}
