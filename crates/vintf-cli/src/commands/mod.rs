pub mod apex_dirs;
pub mod check;
pub mod completions;
pub mod fqname;
pub mod instance;
pub mod man_pages;

use vintf_schema::{HalFormat, ManifestHal, Version};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PARSE_ERROR: u8 = 2;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn colorize_format(format: HalFormat) -> String {
    use console::Style;
    match format {
        HalFormat::Hidl => Style::new().cyan().apply_to(format).to_string(),
        HalFormat::Aidl => Style::new().green().apply_to(format).to_string(),
        HalFormat::Native => Style::new().yellow().apply_to(format).to_string(),
    }
}

/// AIDL versions are shown as their single number.
pub fn display_version(hal: &ManifestHal, version: Version) -> String {
    match hal.format() {
        HalFormat::Aidl => version.minor().to_string(),
        HalFormat::Hidl | HalFormat::Native => version.to_string(),
    }
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
