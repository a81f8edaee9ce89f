//! GPU vendor detection and driver version decoding.
//!
//! Vulkan reports driver versions as a packed 32-bit integer whose layout
//! depends on the vendor. The bit widths below are fixed by the vendors'
//! drivers and must not change:
//!
//! | Vendor | major | minor | patch |
//! |--------|-------|-------|-------|
//! | AMD | 10 bits @22 | 10 bits @12 | 12 bits |
//! | NVIDIA / Intel / other | 10 bits @22 | 8 bits @14 | 14 bits |
//!
//! AMD versions decoded here are driver-internal numbers; mapping them to
//! marketing versions needs the lookup table in [`crate::amd`], so AMD
//! results come back as [`DriverVersion::AmdVulkan`] or
//! [`DriverVersion::AmdOpenGl`] for the caller to resolve.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::version::Version;

/// A decoded driver version, possibly still needing an AMD table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverVersion {
    Plain(String),
    AmdVulkan(String),
    AmdOpenGl(String),
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn is_amd(gpu: &str) -> bool {
    ["Radeon", "AMD", "ATI "]
        .iter()
        .any(|n| contains_ignore_case(gpu, n))
}

pub fn is_nvidia(gpu: &str) -> bool {
    ["GeForce", "nVidia", "Quadro", "GTX"]
        .iter()
        .any(|n| contains_ignore_case(gpu, n))
}

pub fn is_intel(gpu: &str) -> bool {
    contains_ignore_case(gpu, "Intel")
}

fn is_radv(gpu: &str) -> bool {
    contains_ignore_case(gpu, "RADV")
}

/// AMD packing: major(10) minor(10) patch(12).
pub fn decode_amd_raw(raw: u32) -> String {
    let major = (raw >> 22) & 0x3ff;
    let minor = (raw >> 12) & 0x3ff;
    let patch = raw & 0xfff;
    format!("{}.{}.{}", major, minor, patch)
}

/// Non-AMD packing: major(10) minor(8) patch(14).
pub fn decode_generic_raw(gpu: &str, raw: u32) -> String {
    let major = (raw >> 22) & 0x3ff;
    let minor = (raw >> 14) & 0xff;
    let patch = raw & 0x3fff;
    if major == 0 && is_intel(gpu) {
        return format!("{}.{}", minor, patch);
    }
    if is_nvidia(gpu) {
        if patch == 0 {
            return format!("{}.{}", major, minor);
        }
        return format!("{}.{:02}.{}.{}", major, minor, (patch >> 6) & 0xff, patch & 0x3f);
    }
    format!("{}.{}.{}", major, minor, patch)
}

/// Decodes the raw `driver=` value from the Vulkan physical device line.
///
/// The log prints the packed value as a signed 32-bit integer.
pub fn decode_vulkan_raw(gpu: &str, raw: &str) -> Option<DriverVersion> {
    let value: i64 = raw.trim().parse().ok()?;
    let packed = value as u32;
    if is_amd(gpu) {
        let decoded = decode_amd_raw(packed);
        if is_radv(gpu) {
            return Some(DriverVersion::Plain(decoded));
        }
        return Some(DriverVersion::AmdVulkan(decoded));
    }
    Some(DriverVersion::Plain(decode_generic_raw(gpu, packed)))
}

static VULKAN_DEVICE_INFO: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?is)'(?<device_name>.+)' running on driver (?<version>.+)\r?$")
        .map_err(|e| tracing::error!(error = %e, "vulkan device pattern failed to compile"))
        .ok()
});

/// Finds the driver version reported for `gpu` among the
/// `Found vulkan-compatible GPU:` lines.
pub fn vulkan_device_version(gpu: &str, found_devices: &[String]) -> Option<DriverVersion> {
    if gpu.is_empty() || found_devices.is_empty() {
        return None;
    }
    let re = VULKAN_DEVICE_INFO.as_ref()?;
    let version = found_devices
        .iter()
        .filter_map(|line| re.captures(line))
        .find(|caps| caps.name("device_name").map(|m| m.as_str()) == Some(gpu))
        .and_then(|caps| caps.name("version"))
        .map(|m| m.as_str().trim_end_matches('\r').to_string())
        .filter(|v| !v.is_empty())?;

    if is_amd(gpu) {
        if is_radv(gpu) {
            return Some(DriverVersion::Plain(version));
        }
        return Some(DriverVersion::AmdVulkan(version));
    }

    if is_intel(gpu) {
        if let Some(ver) = Version::parse(&version) {
            if let (true, Some(build)) = (ver.minor > 400, ver.build) {
                let build = ((ver.minor & 0b11) << 12) | build;
                let minor = ver.minor >> 2;
                return Some(DriverVersion::Plain(
                    Version::with_build(ver.major, minor, build).to_string(),
                ));
            }
        }
    }

    Some(DriverVersion::Plain(dotted_version(&version)))
}

/// Re-renders a dotted driver version: two-digit minor, build kept when non-zero.
///
/// Unparseable strings drop a trailing `.0.0` and zero-pad a single-digit tail.
pub fn dotted_version(version: &str) -> String {
    if let Some(ver) = Version::parse(version) {
        let mut out = format!("{}.{:02}", ver.major, ver.minor);
        if let Some(build) = ver.build.filter(|b| *b > 0) {
            out.push_str(&format!(".{}", build));
        }
        return out;
    }
    let mut out = version.strip_suffix(".0.0").unwrap_or(version).to_string();
    let chars: Vec<char> = out.chars().collect();
    if chars.len() > 3 && chars[chars.len() - 2] == '.' {
        let last = chars[chars.len() - 1];
        out = chars[..chars.len() - 1].iter().collect::<String>();
        out.push('0');
        out.push(last);
    }
    out
}

/// OpenGL driver version, routed through the AMD table for AMD GPUs.
pub fn opengl_version(gpu: &str, version: &str) -> Option<DriverVersion> {
    if version.is_empty() {
        return None;
    }
    if is_amd(gpu) {
        return Some(DriverVersion::AmdOpenGl(version.to_string()));
    }
    Some(DriverVersion::Plain(version.to_string()))
}

static TRADEMARK_MARKS: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)\(R\)|®|\(TM\)|™")
        .map_err(|e| tracing::error!(error = %e, "trademark pattern failed to compile"))
        .ok()
});

/// Removes trademark marks.
pub fn strip_marks(name: &str) -> String {
    match TRADEMARK_MARKS.as_ref() {
        Some(re) => re.replace_all(name, "").into_owned(),
        None => name.to_string(),
    }
}

/// Drops the `(vendor)` suffix some OpenGL renderer strings carry, and `/PCIe/SSE2`.
pub fn strip_opengl_maker(gpu: &str) -> String {
    let lower = gpu.to_lowercase();
    let mut out = gpu.to_string();
    let vendor_suffixes = [
        "(intel)",
        "(nvidia)",
        " corporation)",
        "(amd)",
        " inc.)",
        "(apple)",
        "(x.org)",
    ];
    if vendor_suffixes.iter().any(|s| lower.ends_with(s)) {
        if let Some(idx) = out.rfind('(') {
            if idx > 0 {
                out = out[..idx].trim_end().to_string();
            }
        }
    }
    if let Some(stripped) = out.strip_suffix("/PCIe/SSE2") {
        out = stripped.to_string();
    }
    out
}
