//! Component F: the device enumerator. Lists attached bridge chips and maps
//! their vendor "Description" string to a board kind.

use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardKind {
    Au,
    Cu,
    Unknown,
}

impl fmt::Display for BoardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BoardKind::Au => "Alchitry Au",
            BoardKind::Cu => "Alchitry Cu",
            BoardKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl BoardKind {
    fn from_description(description: &str) -> BoardKind {
        match description {
            "Alchitry Au A" => BoardKind::Au,
            "Alchitry Cu A" => BoardKind::Cu,
            _ => BoardKind::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub description: String,
    pub serial_number: String,
    pub kind: BoardKind,
}

/// Lists every attached FTDI device with its description string.
pub fn list_devices() -> Result<Vec<DeviceInfo>> {
    let infos = libftd2xx::list_devices().map_err(Error::usb)?;
    Ok(infos
        .into_iter()
        .enumerate()
        .map(|(index, info)| {
            let description = info.description.to_string_lossy().into_owned();
            let serial_number = info.serial_number.to_string_lossy().into_owned();
            DeviceInfo {
                index,
                kind: BoardKind::from_description(&description),
                description,
                serial_number,
            }
        })
        .collect())
}

pub fn board_kind_at(index: usize) -> Result<BoardKind> {
    let devices = list_devices()?;
    devices
        .get(index)
        .map(|d| d.kind)
        .ok_or(Error::DeviceNotFound(index))
}

/// First device index matching `kind`.
pub fn first_of_kind(kind: BoardKind) -> Result<usize> {
    list_devices()?
        .into_iter()
        .find(|d| d.kind == kind)
        .map(|d| d.index)
        .ok_or(Error::BoardNotFound(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_mapping() {
        assert_eq!(BoardKind::from_description("Alchitry Au A"), BoardKind::Au);
        assert_eq!(BoardKind::from_description("Alchitry Cu A"), BoardKind::Cu);
        assert_eq!(
            BoardKind::from_description("Something Else"),
            BoardKind::Unknown
        );
    }
}
