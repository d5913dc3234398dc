//! Device and capture metadata attached to the report header.
//!
//! Every lookup degrades to "Unknown" - a report from a development board
//! without the usual identity files is still a valid report.

use std::fs;
use std::path::Path;

use chrono::Local;

const DEVICE_PROPERTIES: &str = "/etc/device.properties";
const VERSION_FILE: &str = "/version.txt";
const MAC_FILE: &str = "/sys/class/net/eth0/address";

const UNKNOWN: &str = "Unknown";

/// Identity of the device under capture plus details of the run itself.
#[derive(Debug, Clone)]
pub struct Metadata {
    platform_name: String,
    image: String,
    mac: String,
    duration_secs: u64,
    swap_enabled: bool,
}

impl Metadata {
    /// Gather device identity from the standard locations.
    pub fn collect(swap_enabled: bool) -> Self {
        Self {
            platform_name: read_friendly_id(Path::new(DEVICE_PROPERTIES)),
            image: read_image_name(Path::new(VERSION_FILE)),
            mac: read_mac(Path::new(MAC_FILE)),
            duration_secs: 0,
            swap_enabled,
        }
    }

    pub fn set_duration(&mut self, seconds: u64) {
        self.duration_secs = seconds;
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn mac(&self) -> &str {
        &self.mac
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_secs
    }

    pub fn swap_enabled(&self) -> bool {
        self.swap_enabled
    }

    /// Local time the report was generated, ISO-8601 with offset.
    pub fn report_timestamp(&self) -> String {
        Local::now().format("%Y-%m-%dT%H:%M:%S%z").to_string()
    }
}

/// FRIENDLY_ID from the key=value device properties file, quotes stripped.
fn read_friendly_id(path: &Path) -> String {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return UNKNOWN.to_string(),
    };
    parse_friendly_id(&content).unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse_friendly_id(content: &str) -> Option<String> {
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            if key == "FRIENDLY_ID" {
                return Some(value.replace('"', ""));
            }
        }
    }
    None
}

/// Image name from the `imagename:` line of the version file.
fn read_image_name(path: &Path) -> String {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return UNKNOWN.to_string(),
    };
    parse_image_name(&content).unwrap_or_else(|| UNKNOWN.to_string())
}

fn parse_image_name(content: &str) -> Option<String> {
    for line in content.lines() {
        if let Some(value) = line.strip_prefix("imagename:") {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn read_mac(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(mac) => mac.trim().to_string(),
        Err(_) => UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_friendly_id() {
        let props = "DEVICE_NAME=xione\nFRIENDLY_ID=\"XiOne Sercomm\"\nMODEL_NUM=IP061\n";
        assert_eq!(parse_friendly_id(props), Some("XiOne Sercomm".to_string()));

        assert_eq!(parse_friendly_id("DEVICE_NAME=xione\n"), None);
        assert_eq!(parse_friendly_id(""), None);
    }

    #[test]
    fn test_parse_image_name() {
        let version = "imagename:XiOne-PROD_2023Q3_sprint_20230815\nBRANCH=release\n";
        assert_eq!(
            parse_image_name(version),
            Some("XiOne-PROD_2023Q3_sprint_20230815".to_string())
        );

        assert_eq!(parse_image_name("BRANCH=release\n"), None);
        assert_eq!(parse_image_name("imagename:\n"), None);
    }
}
