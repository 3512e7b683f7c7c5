//! Integration-level CLI argument-parsing tests (§8 "Ambient-stack tests"),
//! exercised through the crate's public `clap::Parser` surface rather than
//! the `src/cli.rs` unit tests, which cover the same table from inside the
//! module.

use alchitry_loader::cli::{Board, Cli};
use clap::Parser;

fn parse(args: &[&str]) -> Cli {
    let mut full = vec!["alchitry-loader"];
    full.extend_from_slice(args);
    Cli::try_parse_from(full).unwrap()
}

#[test]
fn every_flag_parses() {
    let cli = parse(&[
        "-e", "-f", "a.bin", "-u", "b.bin", "-p", "c.bin", "-b", "2", "-t", "cu", "-l",
    ]);
    assert!(cli.erase);
    assert_eq!(cli.write_flash.unwrap().to_str().unwrap(), "a.bin");
    assert_eq!(cli.program_eeprom.unwrap().to_str().unwrap(), "b.bin");
    assert_eq!(cli.bridge_bin.unwrap().to_str().unwrap(), "c.bin");
    assert_eq!(cli.device_index, Some(2));
    assert_eq!(cli.board, Board::Cu);
    assert!(cli.list);
}

#[test]
fn cu_plus_write_ram_is_rejected_at_validation() {
    let cli = parse(&["-t", "cu", "-r", "top.bin"]);
    assert!(cli.validate().is_err());
}

#[test]
fn au_is_the_default_board() {
    assert_eq!(parse(&["-l"]).board, Board::Au);
}

#[test]
fn unknown_flag_fails_to_parse() {
    let mut full = vec!["alchitry-loader", "--not-a-real-flag"];
    assert!(Cli::try_parse_from(&mut full).is_err());
}
