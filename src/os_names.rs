//! Marketing names for the operating systems reported in logs.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::version::Version;

/// Windows name from `major.minor.build` as printed on the OS line.
pub fn windows_name(version: &Version) -> Option<String> {
    let build = version.build_or_zero();
    let name = match (version.major, version.minor) {
        (5, 0) => "2000".to_string(),
        (5, 1) => "XP".to_string(),
        (5, 2) => "XP x64".to_string(),
        (6, 0) => "Vista".to_string(),
        (6, 1) => "7".to_string(),
        (6, 2) => "8".to_string(),
        (6, 3) => "8.1".to_string(),
        (10, _) => windows_10_name(build),
        _ => return None,
    };
    Some(name)
}

fn windows_10_name(build: u32) -> String {
    let named = |s: &str| s.to_string();
    let with_build = |prefix: &str| format!("{} Build {}", prefix, build);
    match build {
        0..=10239 => with_build("10 TH1"),
        10240 => named("10 1507"),
        10241..=10585 => with_build("10 TH2"),
        10586 => named("10 1511"),
        10587..=14392 => with_build("10 RS1"),
        14393 => named("10 1607"),
        14394..=15062 => with_build("10 RS2"),
        15063 => named("10 1703"),
        15064..=16298 => with_build("10 RS3"),
        16299 => named("10 1709"),
        16300..=17133 => with_build("10 RS4"),
        17134 => named("10 1803"),
        17135..=17762 => with_build("10 RS5"),
        17763 => named("10 1809"),
        17764..=18361 => with_build("10 19H1"),
        18362 => named("10 1903"),
        18363 => named("10 1909"),
        18364..=19040 => with_build("10 20H1"),
        19041 => named("10 2004"),
        19042 => named("10 20H2"),
        19043 => named("10 21H1"),
        19044 => named("10 21H2"),
        19045 => named("10 22H2"),
        19046..=21389 => with_build("10 Dev"),
        21390 => named("10 21H2 Insider"),
        21391..=21999 => with_build("11 Internal"),
        22000 => named("11 21H2"),
        22001..=22620 => with_build("11 22H2 Insider"),
        22621 => named("11 22H2"),
        22631 => named("11 23H2"),
        22622..=22999 => with_build("11 Beta"),
        23000..=23999 => with_build("11 Dev"),
        24000..=24999 => with_build("11 ???"),
        25000..=26051 => with_build("11 Canary"),
        26100 => named("11 24H2"),
        26052..=26119 => with_build("11 Dev/Canary"),
        26120 => with_build("11 24H2 Beta"),
        26200 => with_build("11 24H2 Dev"),
        26121..=26999 => with_build("11 Canary"),
        _ => with_build("11 ???"),
    }
}

/// Windows name implied by the WDDM version encoded in a display driver's major number.
pub fn wddm_windows_name(driver_version: &str) -> Option<&'static str> {
    let version = Version::parse(driver_version)?;
    let name = match version.major {
        6 => "XP",
        7 => "Vista",
        8 => "7",
        9 => "8",
        10 => "8.1",
        20 => "10",
        21 => "10 1607",
        22 => "10 1703",
        23 => "10 1709",
        24 => "10 1803",
        25 => "10 1809",
        26 => "10 1903",
        27 => "10 2004",
        28 => "10 20H1 Preview",
        29 => "10 21H1",
        30 => "11 21H2",
        31 => "11 22H2",
        32 => "11 24H2",
        _ => return None,
    };
    Some(name)
}

static KERNEL_VERSION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?<version>\d+\.\d+\.\d+)")
        .map_err(|e| tracing::error!(error = %e, "kernel version pattern failed to compile"))
        .ok()
});

/// Distribution guess from the POSIX `Release:` and `Version:` fields.
pub fn linux_name(os_type: &str, release: &str, version: &str) -> Option<String> {
    if release.is_empty() {
        return None;
    }
    let kernel = KERNEL_VERSION
        .as_ref()
        .and_then(|re| re.captures(release))
        .and_then(|caps| caps.name("version"))
        .map_or(release, |m| m.as_str());
    let version_lower = version.to_lowercase();
    let release_lower = release.to_lowercase();

    if version_lower.contains("ubuntu") {
        return Some(format!("Ubuntu {}", kernel));
    }
    if version_lower.contains("debian") {
        return Some(format!("Debian {}", kernel));
    }
    let by_release = [
        ("-manjaro", "Manjaro"),
        ("-arch", "Arch"),
        ("-gentoo", "Gentoo"),
        ("-valve", "SteamOS"),
        ("-artix", "Artix"),
    ];
    for (marker, distro) in by_release {
        if release_lower.contains(marker) {
            return Some(format!("{} {}", distro, kernel));
        }
    }
    if release.contains(".fc") {
        let fedora = release
            .split('.')
            .find(|p| p.starts_with("fc"))
            .map(|p| &p[2..])
            .unwrap_or("");
        return Some(format!("Fedora {}", fedora));
    }
    Some(format!("{} {}", os_type, kernel))
}

/// macOS codename from `major.minor`.
pub fn macos_name(version: &Version) -> &'static str {
    match (version.major, version.minor) {
        (10, 0) => "Mac OS X Cheetah",
        (10, 1) => "Mac OS X Puma",
        (10, 2) => "Mac OS X Jaguar",
        (10, 3) => "Mac OS X Panther",
        (10, 4) => "Mac OS X Tiger",
        (10, 5) => "Mac OS X Leopard",
        (10, 6) => "Mac OS X Snow Leopard",
        (10, 7) => "OS X Lion",
        (10, 8) => "OS X Mountain Lion",
        (10, 9) => "OS X Mavericks",
        (10, 10) => "OS X Yosemite",
        (10, 11) => "OS X El Capitan",
        (10, 12) => "macOS Sierra",
        (10, 13) => "macOS High Sierra",
        (10, 14) => "macOS Mojave",
        (10, 15) => "macOS Catalina",
        (11, _) => "macOS Big Sur",
        (12, _) => "macOS Monterey",
        (13, _) => "macOS Ventura",
        (14, _) => "macOS Sonoma",
        (15, _) => "macOS Sequoia",
        (26, _) => "macOS Tahoe",
        _ => "Unknown Apple OS",
    }
}
