//! Mainboard identification.

use std::fs;

/// Read the mainboard name from the system's DMI data.
///
/// Returns an empty string if the DMI data is not accessible.
pub fn board_name() -> String {
    dmi_property("board_name")
}

/// Read the given DMI property.
fn dmi_property(name: &str) -> String {
    let path = format!("/sys/devices/virtual/dmi/id/{name}");
    match fs::read_to_string(&path) {
        Ok(value) => value.replace('\n', ""),
        Err(err) => {
            log::debug!("Unable to read {}: {}", path, err);
            String::new()
        },
    }
}
