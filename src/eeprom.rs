//! The bridge EEPROM record (§6): a byte-exact, 348-byte on-disk format used
//! to re-personalize a bridge chip's vendor configuration. Out of the core's
//! scope except as an external format, but implemented fully here since the
//! crate's `-u` flag depends on a byte-identical round trip (§8).
//!
//! The 220-byte configuration block mirrors the FTDI vendor EEPROM layout:
//! two signature words, a version, the common USB descriptor fields, and a
//! block of chip-revision extension fields reserved for whichever FT2232H
//! feature set is in use. Rather than relying on `#[repr(C)]` struct layout
//! (padding and field order are compiler details, not a wire contract), this
//! module writes and reads explicit byte offsets so the 220-byte size is a
//! fact about the code, not an assumption about how the compiler lays out a
//! struct.

use std::path::Path;

use crate::error::{Error, Result};

pub const CONFIG_LEN: usize = 220;
pub const MANUFACTURER_LEN: usize = 32;
pub const MANUFACTURER_ID_LEN: usize = 16;
pub const DESCRIPTION_LEN: usize = 64;
pub const SERIAL_NUMBER_LEN: usize = 16;
pub const RECORD_LEN: usize =
    CONFIG_LEN + MANUFACTURER_LEN + MANUFACTURER_ID_LEN + DESCRIPTION_LEN + SERIAL_NUMBER_LEN;

const SIGNATURE1: u32 = 0x0000_0000;
const SIGNATURE2: u32 = 0xFFFF_FFFF;
const VERSION: u32 = 5;

/// The 220-byte configuration block. Only the fields this crate's CLI
/// actually sets are named; everything else is carried as reserved bytes so
/// a round trip through `to_bytes`/`from_bytes` is always byte-identical,
/// even for fields this crate never interprets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigData {
    pub vendor_id: u16,
    pub product_id: u16,
    pub max_power_ma: u16,
    pub self_powered: bool,
    pub remote_wakeup: bool,
    /// Bytes 16..220: everything this struct doesn't name individually
    /// (per-revision extension fields for Rev4 through Rev9 parts).
    reserved: [u8; CONFIG_LEN - 16],
}

impl Default for ConfigData {
    fn default() -> Self {
        ConfigData {
            vendor_id: 0x0403,
            product_id: 0x6010,
            max_power_ma: 90,
            self_powered: false,
            remote_wakeup: false,
            reserved: [0u8; CONFIG_LEN - 16],
        }
    }
}

impl ConfigData {
    fn to_bytes(&self) -> [u8; CONFIG_LEN] {
        let mut buf = [0u8; CONFIG_LEN];
        buf[0..4].copy_from_slice(&SIGNATURE1.to_le_bytes());
        buf[4..8].copy_from_slice(&SIGNATURE2.to_le_bytes());
        buf[8..12].copy_from_slice(&VERSION.to_le_bytes());
        buf[12..14].copy_from_slice(&self.vendor_id.to_le_bytes());
        buf[14..16].copy_from_slice(&self.product_id.to_le_bytes());
        buf[16..220].copy_from_slice(&self.reserved);
        buf[16..18].copy_from_slice(&self.max_power_ma.to_le_bytes());
        buf[18] = self.self_powered as u8;
        buf[19] = self.remote_wakeup as u8;
        buf
    }

    fn from_bytes(buf: &[u8; CONFIG_LEN]) -> Result<Self> {
        let sig1 = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let sig2 = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let version = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        if sig1 != SIGNATURE1 || sig2 != SIGNATURE2 || version != VERSION {
            return Err(Error::Argument(format!(
                "not a recognized bridge EEPROM record (signatures {sig1:#010x}/{sig2:#010x}, version {version})"
            )));
        }
        let mut reserved = [0u8; CONFIG_LEN - 16];
        reserved.copy_from_slice(&buf[16..220]);
        Ok(ConfigData {
            vendor_id: u16::from_le_bytes(buf[12..14].try_into().unwrap()),
            product_id: u16::from_le_bytes(buf[14..16].try_into().unwrap()),
            max_power_ma: u16::from_le_bytes(buf[16..18].try_into().unwrap()),
            self_powered: buf[18] != 0,
            remote_wakeup: buf[19] != 0,
            reserved,
        })
    }
}

fn pack_string(s: &str, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    let bytes = s.as_bytes();
    let n = bytes.len().min(len - 1);
    buf[..n].copy_from_slice(&bytes[..n]);
    buf
}

fn unpack_string(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// The full 348-byte bridge EEPROM record: the configuration block followed
/// by the four NUL-padded ASCII string buffers, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeEeprom {
    pub config: ConfigData,
    pub manufacturer: String,
    pub manufacturer_id: String,
    pub description: String,
    pub serial_number: String,
}

impl BridgeEeprom {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_LEN);
        out.extend_from_slice(&self.config.to_bytes());
        out.extend(pack_string(&self.manufacturer, MANUFACTURER_LEN));
        out.extend(pack_string(&self.manufacturer_id, MANUFACTURER_ID_LEN));
        out.extend(pack_string(&self.description, DESCRIPTION_LEN));
        out.extend(pack_string(&self.serial_number, SERIAL_NUMBER_LEN));
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() != RECORD_LEN {
            return Err(Error::Argument(format!(
                "bridge EEPROM record must be {RECORD_LEN} bytes, got {}",
                buf.len()
            )));
        }
        let config = ConfigData::from_bytes(buf[0..CONFIG_LEN].try_into().unwrap())?;
        let mut offset = CONFIG_LEN;
        let manufacturer = unpack_string(&buf[offset..offset + MANUFACTURER_LEN]);
        offset += MANUFACTURER_LEN;
        let manufacturer_id = unpack_string(&buf[offset..offset + MANUFACTURER_ID_LEN]);
        offset += MANUFACTURER_ID_LEN;
        let description = unpack_string(&buf[offset..offset + DESCRIPTION_LEN]);
        offset += DESCRIPTION_LEN;
        let serial_number = unpack_string(&buf[offset..offset + SERIAL_NUMBER_LEN]);
        Ok(BridgeEeprom {
            config,
            manufacturer,
            manufacturer_id,
            description,
            serial_number,
        })
    }

    pub fn read_from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()).map_err(|source| Error::File {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BridgeEeprom {
        BridgeEeprom {
            config: ConfigData::default(),
            manufacturer: "Alchitry".into(),
            manufacturer_id: "AL".into(),
            description: "Alchitry Au A".into(),
            serial_number: "AU0001".into(),
        }
    }

    #[test]
    fn byte_round_trip_is_identical() {
        let record = sample();
        let bytes = record.to_bytes();
        assert_eq!(bytes.len(), RECORD_LEN);
        let parsed = BridgeEeprom::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn file_round_trip(
    ) {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("alchitry-loader-test-{}.bin", std::process::id()));
        let record = sample();
        record.write_to_file(&path).unwrap();
        let read_back = BridgeEeprom::read_from_file(&path).unwrap();
        assert_eq!(read_back, record);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(BridgeEeprom::from_bytes(&[0u8; 10]).is_err());
    }
}
