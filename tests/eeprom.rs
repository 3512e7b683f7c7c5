//! Integration-level EEPROM file round-trip test (§8 "Bridge-EEPROM file
//! round-trip").

use alchitry_loader::eeprom::{BridgeEeprom, ConfigData};

#[test]
fn writing_then_reading_a_record_is_byte_identical() {
    let record = BridgeEeprom {
        config: ConfigData::default(),
        manufacturer: "Alchitry".into(),
        manufacturer_id: "AL".into(),
        description: "Alchitry Cu A".into(),
        serial_number: "CU0042".into(),
    };

    let dir = std::env::temp_dir();
    let path = dir.join(format!(
        "alchitry-loader-integration-test-{}.bin",
        std::process::id()
    ));

    record.write_to_file(&path).unwrap();
    let read_back = BridgeEeprom::read_from_file(&path).unwrap();
    assert_eq!(read_back, record);
    assert_eq!(read_back.to_bytes(), record.to_bytes());

    std::fs::remove_file(&path).ok();
}
