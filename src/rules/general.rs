//! General notes: dump state, boot location, install location, hardware and
//! drivers, patches and a handful of one-line log markers.

use once_cell::sync::Lazy;
use regex::Regex;

use super::integrity::check_integrity;
use super::titles::DES_IDS;
use super::{parse_patches, Findings, RuleInput};
use crate::drivers;
use crate::models::ParseOutcome;
use crate::version::Version;

const PSN_DISC_FIX: Version = Version::full(0, 0, 18, 12783);
const NVIDIA_FULLSCREEN_BUG_FIXED: Version = Version::full(0, 0, 6, 8204);
const MINIMUM_FIRMWARE: Version = Version::new(4, 80);
const MINIMUM_OPENGL: Version = Version::new(4, 3);

const NVIDIA_MIN_WINDOWS: Version = Version::new(512, 16);
const NVIDIA_MIN_LINUX: Version = Version::new(515, 57);
const AMD_MIN_WINDOWS: Version = Version::with_build(24, 2, 1);
const INTEL_MIN_WINDOWS: Version = Version::with_build(0, 101, 1660);

const MAX_PATH: usize = 260;
const MAX_FOLDER_PATH: usize = MAX_PATH - 1 - 8 - 3;

/// Longest mod name shown in a note.
const MOD_NAME_LIMIT: usize = 40;

fn pattern(re: &str, what: &str) -> Option<Regex> {
    Regex::new(re)
        .map_err(|e| tracing::error!(error = %e, pattern = what, "general note pattern failed to compile"))
        .ok()
}

static PRODUCT_CODE: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(
        r"(?i)(?<letters>(?:[BPSUVX][CL]|P[ETU]|NP)[AEHJKPUIX][ABDJKLMOPQRSTX]|MRTC)[ \-]?(?<numbers>\d{5})",
        "product code",
    )
});

static INSTALL_PATH: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(
        r"[A-Z]:/(?<program_files>Program Files( \(x86\))?/)?(?<desktop>([^/]+/)+Desktop/)?(?<rpcs3_folder>[^/]+/)*GuiConfigs/",
        "install path",
    )
});

static XEON_MODEL: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(
        r"Xeon (([EXLW]C?|LV )?\d+|(E\d|AWS)-\d+\w?( (v[2-4]|0))?|D-1.+)( \(ES\))?$",
        "xeon model",
    )
});

static INTEL_GPU_MODEL: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(
        r"Intel\s?(®|\(R\))? (?<gpu_model>((?<gpu_family>(\w|®| )+) Graphics)( (?<gpu_model_number>P?\d+))?)(\s+\(|$)",
        "intel gpu model",
    )
});

fn matches(re: &Lazy<Option<Regex>>, text: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(text))
}

fn non_empty<'a>(input: &RuleInput<'a>, key: &str) -> bool {
    input.get_non_empty(key).is_some()
}

/// Directory part of a Windows or POSIX path, or the path itself at the root.
fn base_dir(path: &str) -> &str {
    path.rfind(['/', '\\']).map_or(path, |i| &path[..i])
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut short: String = text.chars().take(limit - 1).collect();
    short.push('…');
    short
}

// ═══════════════════════════════════════════════════════════════════════
// Game content
// ═══════════════════════════════════════════════════════════════════════

fn dump_state(input: &RuleInput<'_>, findings: &mut Findings) -> usize {
    let report = check_integrity(input.model, input.ctx.enrichment.manifest.as_deref());
    let broken = report.broken || !input.multi("edat_block_offset").is_empty();

    if input.get("failed_to_decrypt").is_some() {
        findings
            .notes
            .push("❌ Failed to decrypt game content, license file might be corrupted");
    }
    if input.get("failed_to_boot").is_some() {
        findings
            .notes
            .push("❌ Failed to boot the game, the dump might be encrypted or corrupted");
    }
    if input.multi("failed_to_verify_npdrm").iter().any(|v| v == "sce") {
        findings
            .notes
            .push("❌ Failed to decrypt executables, PPU recompiler may crash or fail");
    }
    let not_working = input
        .ctx
        .enrichment
        .title
        .as_ref()
        .and_then(|t| t.status)
        .is_some_and(|s| s.is_not_working());
    if non_empty(input, "disc_to_psn_serial") && input.build.map_or(true, |b| b < PSN_DISC_FIX) {
        findings
            .notes
            .push("❌ Please update the emulator to make this version of the game work");
    } else if not_working {
        findings
            .notes
            .push("❌ This game title does not work on the emulator at this time");
    }
    if broken {
        findings
            .notes
            .push("❌ Some game files are missing or corrupted, please re-dump and validate.");
    }

    if let Some(fw) = input.get_non_empty("fw_version_installed") {
        match Version::parse(fw) {
            Some(v) if v < MINIMUM_FIRMWARE => findings
                .notes
                .push("⚠️ Firmware version 4.80 or later is recommended"),
            Some(_) => {}
            None => findings
                .notes
                .push("⚠️ Custom firmware is not supported, please use the latest official one"),
        }
    }
    report.longest_path
}

fn path_lengths(input: &RuleInput<'_>, longest_path: usize, findings: &mut Findings) {
    if !input.is_windows() {
        return;
    }
    let paths = [
        "win_path",
        "ldr_game_full",
        "ldr_disc_full",
        "ldr_path_full",
        "ldr_boot_path_full",
        "elf_boot_path_full",
    ];
    for path in paths.iter().filter_map(|k| input.get_non_empty(k)) {
        let dir = base_dir(path);
        let line = if path.chars().count() > MAX_PATH {
            format!("⚠️ Some file paths are longer than {} characters", MAX_PATH)
        } else if dir.chars().count() > MAX_FOLDER_PATH {
            format!("⚠️ Some folder paths are longer than {} characters", MAX_FOLDER_PATH)
        } else if dir.chars().count() + longest_path > MAX_PATH {
            format!("⚠️ Some file paths are potentially longer than {} characters", MAX_PATH)
        } else {
            continue;
        };
        findings.notes.push(line);
        break;
    }
}

fn boot_location(input: &RuleInput<'_>, findings: &mut Findings) {
    let serial = input.serial;
    let elf_path = input.get("elf_boot_path").unwrap_or("");
    let is_eboot = !elf_path.is_empty() && elf_path.to_uppercase().ends_with("EBOOT.BIN");
    let is_elf = !elf_path.is_empty() && !is_eboot;

    if non_empty(input, "host_root_in_boot") && is_eboot {
        findings.notes.push(
            "❌ Retail game booted as an ELF through the `/root_host/`, probably due to passing path as an argument; please boot through the game library list for now",
        );
    }
    let path = ["ldr_game", "ldr_path", "ldr_boot_path", "elf_boot_path"]
        .iter()
        .find_map(|k| input.get(k));
    let booted_from_own_folder = [
        "ldr_game_serial",
        "ldr_path_serial",
        "ldr_boot_path_serial",
        "elf_boot_path_serial",
    ]
    .iter()
    .any(|k| input.get(k) == Some(serial));
    if path.is_some_and(|p| !p.is_empty()) && serial.starts_with("NP") && !booted_from_own_folder {
        findings
            .notes
            .push("❌ Digital version of the game outside of `/dev_hdd0/game/` directory");
    }
    // the loader path logged before settings is not reliable for disc titles
    if non_empty(input, "ldr_disc") && serial.starts_with("BL") && non_empty(input, "ldr_disc_serial") {
        findings
            .notes
            .push("❌ Disc version of the game inside the `/dev_hdd0/game/` directory");
    }
    if !serial.is_empty() && is_elf {
        findings.notes.push(format!(
            "⚠️ Retail game booted directly through `{}`, which is not recommended",
            file_name(elf_path)
        ));
    }
    if input.is_windows()
        && input
            .get_non_empty("mounted_dev_bdvd")
            .is_some_and(|m| m.trim_end_matches('/').ends_with(':'))
    {
        findings.notes.push(
            "⚠️ Booting directly from blu-ray disc is not supported, please make a proper game dump",
        );
    }
}

fn log_contents(input: &RuleInput<'_>, findings: &mut Findings) {
    const BOOT_AGAIN: &str = "ℹ️ Please boot the game and upload a new log";
    if input.get("log_from_ui").is_some() {
        findings
            .notes
            .push("ℹ️ The log is a copy from UI, please upload the full file created by RPCS3");
    } else if !non_empty(input, "ppu_decoder") || !non_empty(input, "renderer") {
        findings.notes.push("ℹ️ The log is empty");
        findings.notes.push(BOOT_AGAIN);
    } else if input.serial.is_empty()
        && matches!(input.get("game_title"), None | Some("") | Some("sys"))
        && non_empty(input, "fw_installed_message")
    {
        if let Some(fw) = input.get("fw_version_installed") {
            findings.notes.push(format!(
                "ℹ️ The log contains only installation of firmware {}",
                fw
            ));
            findings.notes.push(BOOT_AGAIN);
        }
    }
}

fn software_category(input: &RuleInput<'_>, findings: &mut Findings) {
    let category = input.get("game_category");
    if matches!(category, Some("PE" | "PP"))
        || (input.serial.starts_with('U') && matches(&PRODUCT_CODE, input.serial))
    {
        findings.notes.push("❌ PSP software is not supported");
    } else if category == Some("MN") {
        findings.notes.push("❌ Minis are not supported");
    }
    if matches!(category, Some("2G" | "2P" | "2D")) {
        findings.notes.push("❌ PS2 software is not supported");
    }
}

fn install_location(input: &RuleInput<'_>, findings: &mut Findings) {
    let Some(db_path) = input.get("compat_database_path") else {
        return;
    };
    let normalized = db_path.replace('\\', "/").replace("//", "/");
    let install = INSTALL_PATH
        .as_ref()
        .and_then(|re| re.captures(normalized.trim()));
    if let Some(caps) = install {
        let present = |name: &str| caps.name(name).is_some_and(|m| !m.as_str().is_empty());
        let program_files = present("program_files");
        if !present("rpcs3_folder") {
            let line = if present("desktop") {
                "ℹ️ RPCS3 installed directly on desktop, without folder"
            } else if program_files {
                "⚠️ RPCS3 installed directly inside Program Files, without folder"
            } else {
                "⚠️ RPCS3 installed in the drive root, please create a folder and move all files inside"
            };
            findings.notes.push(line);
        }
        if program_files {
            findings.notes.push(
                "⚠️ Program Files have special permissions, please move RPCS3 to another location",
            );
        }
    }

    let segments: Vec<&str> = db_path.split(['/', '\\']).filter(|s| !s.is_empty()).collect();
    let sync_folder = segments.iter().find(|s| {
        input.ctx.known.sync_folders.contains(&s.to_lowercase())
            || s.to_lowercase().ends_with("sync")
            || s.starts_with("OneDrive - ")
    });
    if let Some(folder) = sync_folder {
        findings.notes.push(format!(
            "⚠️ RPCS3 is installed in a file sync service folder `{}`; may result in data loss or inconsistent state",
            folder
        ));
    }
    if segments.iter().any(|s| s.starts_with("Rar$")) {
        findings
            .notes
            .push("❌ RPCS3 is launched from WinRAR; please extract all files instead");
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Hardware
// ═══════════════════════════════════════════════════════════════════════

fn cpu_and_memory(input: &RuleInput<'_>, findings: &mut Findings) {
    let threads = input.thread_count;
    if let Some(n) = threads.filter(|n| *n < 4) {
        findings.notes.push(format!(
            "⚠️ This CPU only has {} hardware thread{} enabled",
            n,
            if n == 1 { "" } else { "s" }
        ));
    }
    let threads = threads.unwrap_or(0);
    let extensions = input.get("cpu_extensions").unwrap_or("");

    if let Some(cpu) = input.get("cpu_model") {
        if cpu.starts_with("AMD") {
            if cpu.to_lowercase().contains("ryzen") || cpu.contains("Custom APU") {
                if threads < 12 {
                    findings
                        .notes
                        .push("⚠️ Six cores or more is recommended for Ryzen CPUs");
                }
                let mobile = cpu.ends_with('U')
                    || cpu.ends_with('H')
                    || cpu.ends_with("HS")
                    || cpu.contains("Custom APU");
                if mobile && !extensions.contains("AVX-512") {
                    findings
                        .notes
                        .push("⚠️ Mobile Ryzen CPUs are only recommended for lighter games.");
                }
            } else {
                findings
                    .notes
                    .push("⚠️ AMD CPUs before Ryzen are too weak for PS3 emulation");
            }
        }

        if (cpu.starts_with("Intel") || cpu.starts_with("Pentium"))
            && !extensions.contains("TSX")
            && !extensions.contains("AVX-512")
        {
            let second_last = cpu.chars().rev().nth(1);
            let weak = ["Core2", "Celeron", "Atom", "Pentium"]
                .iter()
                .any(|family| cpu.contains(family))
                || cpu.ends_with('U')
                || cpu.ends_with('M')
                || cpu.contains('Y')
                || second_last == Some('G')
                || matches(&XEON_MODEL, cpu)
                || threads < 6;
            if weak {
                findings
                    .notes
                    .push("⚠️ This CPU is too weak and/or too old for PS3 emulation");
            }
        }
    }

    if input
        .get("memory_amount")
        .and_then(|m| m.trim().parse::<f64>().ok())
        .is_some_and(|gib| gib < 6.0)
    {
        findings
            .notes
            .push("⚠️ 8 GiB RAM or more is recommended for PS3 emulation");
    }
}

fn opengl_level(input: &RuleInput<'_>, findings: &mut Findings) {
    let mut level = input.version("opengl_version");
    if let Some(glsl) = input.version("glsl_version") {
        let glsl = Version::new(glsl.major, glsl.minor / 10);
        if level.map_or(true, |gl| glsl > gl) {
            level = Some(glsl);
        }
    }
    if let Some(gl) = level.filter(|gl| *gl < MINIMUM_OPENGL) {
        findings.notes.push(format!(
            "❌ GPU only supports OpenGL {}.{}, which is below the minimum requirement of 4.3",
            gl.major, gl.minor
        ));
        findings.supported_gpu = false;
    }
}

fn operating_system(input: &RuleInput<'_>, findings: &mut Findings) {
    let Some(version) = input.version("os_version") else {
        return;
    };
    match input.get("os_type") {
        Some("Windows") => {
            if version.major < 10 || (version.major == 10 && version.build_or_zero() < 22631) {
                findings.notes.push(
                    "⚠️ Please [upgrade your Windows](https://www.microsoft.com/en-us/software-download/windows11) to currently supported version",
                );
            }
        }
        Some("MacOS") => {
            if version.major < 14 {
                findings.notes.push(
                    "⚠️ Please [upgrade your macOS](https://support.apple.com/en-us/109033#latest) to currently supported version",
                );
            } else if version.major == 14 && version.minor <= 2 {
                findings
                    .notes
                    .push("❌️ Please update your OS to version 14.3 or newer");
            }
        }
        _ => {}
    }
}

fn intel_gpu(gpu: &str, findings: &mut Findings) {
    let Some(caps) = INTEL_GPU_MODEL.as_ref().and_then(|re| re.captures(gpu)) else {
        return;
    };
    let mut family = caps
        .name("gpu_family")
        .map_or("", |m| m.as_str())
        .trim_end()
        .to_string();
    let mut model = caps
        .name("gpu_model_number")
        .map_or("", |m| m.as_str())
        .to_string();
    if model.is_empty() {
        if let Some((f, m)) = family.clone().split_once(' ') {
            family = f.trim().to_string();
            model = m.trim().to_string();
        }
    }
    let model_number = model
        .strip_prefix('P')
        .unwrap_or(&model)
        .parse::<u32>()
        .ok();
    if matches!(family.as_str(), "UHD" | "Iris Plus" | "Iris Xe")
        || model_number.is_some_and(|n| n > 500 && n < 1000)
    {
        findings
            .notes
            .push("⚠️ Intel iGPUs are not officially supported; visual glitches are to be expected");
    } else if family != "Arc" {
        findings
            .notes
            .push("⚠️ Intel iGPUs before Skylake do not fully comply with OpenGL 4.3");
        findings.supported_gpu = false;
    }
}

fn gpu_driver(input: &RuleInput<'_>, gpu: &str, findings: &mut Findings) {
    let Some(mut driver) = input.get("driver_version_info") else {
        return;
    };
    if driver.contains('-') {
        driver = driver
            .split([' ', '-'])
            .filter(|t| !t.is_empty())
            .last()
            .unwrap_or(driver);
    }
    let renderer_is_vulkan = input.get("renderer") == Some("Vulkan");
    match (Version::parse(driver), input.build) {
        (Some(version), Some(build)) => {
            if drivers::is_nvidia(gpu) {
                let windows = input.get("os_type").is_some_and(|os| os != "Linux");
                let (minimum, shown) = if windows {
                    (NVIDIA_MIN_WINDOWS, "512.16")
                } else {
                    (NVIDIA_MIN_LINUX, "515.57")
                };
                if version < minimum && !gpu.to_lowercase().contains("nouveau") {
                    findings.notes.push(format!(
                        "❗ Please update your nVidia GPU driver to at least version {}",
                        shown
                    ));
                }
                if version >= Version::new(526, 0)
                    && version < Version::new(526, 99)
                    && renderer_is_vulkan
                {
                    findings.notes.push(
                        "ℹ️ 526 series nVidia drivers can cause out of memory errors, please upgrade the drivers",
                    );
                }
                if windows
                    && build < NVIDIA_FULLSCREEN_BUG_FIXED
                    && version >= Version::new(400, 0)
                    && version < Version::new(499, 99)
                    && renderer_is_vulkan
                {
                    findings.notes.push(
                        "ℹ️ 400 series nVidia drivers can cause screen freezes, please update RPCS3",
                    );
                }
            } else if drivers::is_amd(gpu) && input.is_windows() {
                if version < AMD_MIN_WINDOWS {
                    findings
                        .notes
                        .push("❗ Please update your AMD GPU driver to at least version 24.2.1");
                }
            } else if drivers::is_intel(gpu) && input.is_windows() && version < INTEL_MIN_WINDOWS {
                findings
                    .notes
                    .push("❗ Please update your Intel GPU driver to at least version 101.1660");
            }
        }
        (Some(_), None) => {}
        (None, _) => {
            if driver.to_lowercase().contains("older than") && drivers::is_amd(gpu) {
                findings
                    .notes
                    .push("❗ Please update your AMD GPU driver to version 24.2.1 or newer");
            }
        }
    }
}

fn gpu(input: &RuleInput<'_>, findings: &mut Findings) {
    let gpu = input.get("gpu_info").or_else(|| input.get("discrete_gpu_info"));
    if let Some(gpu) = gpu.filter(|g| !g.is_empty() && findings.supported_gpu) {
        intel_gpu(gpu, findings);
        gpu_driver(input, gpu, findings);
    }

    if non_empty(input, "shader_compile_error") {
        if findings.supported_gpu {
            findings
                .notes
                .push("❌ Shader compilation error might indicate shader cache corruption");
        } else {
            findings
                .notes
                .push("❌ Shader compilation error on unsupported GPU");
        }
    }
    if non_empty(input, "rsx_fragmentation_error") {
        findings.notes.push(
            "⚠️ Descriptor pool fragmentation error. May indicate insufficient VRAM size or driver issues.",
        );
    }
    if non_empty(input, "enqueue_buffer_error") && input.model.model.hits("enqueue_buffer_error") > 100 {
        if input.is_windows() {
            findings.notes.push(
                "⚠️ Audio backend issues detected; it could be caused by a bad driver or 3rd party software",
            );
        } else {
            findings
                .notes
                .push("⚠️ Audio backend issues detected; check for high audio driver/sink latency");
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Patches and markers
// ═══════════════════════════════════════════════════════════════════════

fn patches(input: &RuleInput<'_>, findings: &mut Findings) {
    if non_empty(input, "patch_error_file") {
        findings.notes.push(format!(
            "⚠️ Failed to load `patch.yml`, check syntax around line {} column {}",
            input.get("patch_error_line").unwrap_or(""),
            input.get("patch_error_column").unwrap_or("")
        ));
    }

    let ppu = input.ppu.applied();
    let ovl = parse_patches(input.multi("ovl_patch")).applied();
    let all_spu = parse_patches(input.multi("spu_patch"));
    let spu = all_spu.applied();
    let prx = parse_patches(input.multi("prx_patch")).applied();
    let counts: Vec<String> = [("PPU", &ppu), ("OVL", &ovl), ("SPU", &spu), ("PRX", &prx)]
        .iter()
        .filter(|(_, p)| !p.is_empty())
        .map(|(name, p)| format!("{}: {}", name, p.joined_counts()))
        .collect();
    if !counts.is_empty() {
        findings.notes.push(format!(
            "ℹ️ Game-specific patches were applied ({})",
            counts.join(", ")
        ));
    }

    let mlaa: Vec<u32> = all_spu
        .iter()
        .filter(|(hash, _)| input.ctx.known.mlaa_spu_hashes.contains(&hash.to_lowercase()))
        .map(|(_, count)| count)
        .collect();
    if !mlaa.is_empty() {
        if mlaa.iter().any(|c| *c != 0) {
            findings.notes.push("ℹ️ MLAA patch was applied");
        } else {
            findings.notes.push("ℹ️ This game has MLAA disable patch");
        }
    }
}

fn disc_layout(input: &RuleInput<'_>, findings: &mut Findings) {
    let starts_np = |v: &str| v.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("NP"));
    let digital = starts_np(input.serial);
    let category = input.get("game_category");
    let mut disc_inside_game = false;
    let mut disc_as_pkg = false;
    // only disc games install game data
    if matches!(category, Some("DG" | "GD")) {
        disc_inside_game |= non_empty(input, "ldr_disc") && !digital;
        disc_as_pkg |= digital;
        disc_as_pkg |= input.get("ldr_game_serial").is_some_and(starts_np);
    }
    disc_as_pkg |= category == Some("HG") && !digital;
    if disc_inside_game {
        findings.notes.push(format!(
            "❌ Disc game inside `{}`",
            input.get("ldr_disc").unwrap_or("")
        ));
    }
    if disc_as_pkg {
        findings.notes.push("ℹ️ Disc game installed as a PKG");
    }
}

fn markers(input: &RuleInput<'_>, findings: &mut Findings) {
    if non_empty(input, "native_ui_input") {
        findings
            .notes
            .push("⚠️ Pad initialization problem detected; try disabling `Native UI`");
    }
    if non_empty(input, "xaudio_init_error") {
        findings.notes.push(
            "❌ XAudio initialization failed; make sure you have a working audio output device",
        );
    } else if let Some(backend) = input.get("audio_backend_init_error") {
        findings.notes.push(format!(
            "⚠️ {} initialization failed; make sure you have a working audio output device",
            backend
        ));
    }
    if non_empty(input, "fw_missing_msg") || non_empty(input, "fw_missing_something") {
        findings.notes.push("❌ PS3 firmware is missing or corrupted");
    }
    if input.on("booting_savestate") {
        findings.notes.push("⚠️ Game was booted from a save state");
    }
    if let Some(first) = input.multi("game_mod").first() {
        let name = if first.contains("CFBR_DLC") {
            "NCAA Football 14 Revamped"
        } else {
            first.as_str()
        };
        findings.notes.push(format!(
            "⚠️ Game files modification present: `{}`",
            truncate(name, MOD_NAME_LIMIT)
        ));
    }
}

pub(super) fn check(input: &RuleInput<'_>, findings: &mut Findings) {
    let longest_path = dump_state(input, findings);
    path_lengths(input, longest_path, findings);
    boot_location(input, findings);
    log_contents(input, findings);
    software_category(input, findings);
    install_location(input, findings);
    cpu_and_memory(input, findings);
    opengl_level(input, findings);
    operating_system(input, findings);
    gpu(input, findings);
    patches(input, findings);
    disc_layout(input, findings);
    markers(input, findings);
}

/// Title-level lines that follow the build freshness notes.
pub(super) fn check_title(input: &RuleInput<'_>, findings: &mut Findings) {
    if DES_IDS.contains(&input.serial) {
        findings.notes.push(
            "ℹ️ If you experience infinite load screen, clear game cache via `File` → `All games` → `Remove Disk Cache`",
        );
    }

    if let Some(game_version) = input.get_non_empty("game_version") {
        let update = input
            .ctx
            .enrichment
            .title
            .as_ref()
            .and_then(|t| t.update_version.as_deref())
            .or_else(|| input.get_non_empty("game_update_version"))
            .map(|u| u.strip_prefix('0').unwrap_or(u));
        let newer = match (Version::parse(game_version), update.and_then(Version::parse)) {
            (Some(current), Some(latest)) if latest > current => update,
            _ => None,
        };
        match newer {
            Some(latest) => findings.notes.push(format!(
                "ℹ️ Game version: v{} (update available: v{})",
                game_version, latest
            )),
            None => findings
                .notes
                .push(format!("ℹ️ Game version: v{}", game_version)),
        }
    }

    if let Some(hash) = input.ppu.first_hash() {
        let exe = file_name(input.get("elf_boot_path").unwrap_or(""));
        let exe = if exe.is_empty() || exe.eq_ignore_ascii_case("EBOOT.BIN") {
            "Main".to_string()
        } else {
            format!("`{}`", exe)
        };
        findings
            .notes
            .push(format!("ℹ️ {} hash: `PPU-{}`", exe, hash));
    }

    match input.model.model.outcome {
        ParseOutcome::SizeLimitReached => findings
            .notes
            .push("ℹ️ The log was too large, so only the last processed run is shown"),
        ParseOutcome::UnknownError => findings
            .notes
            .push("ℹ️ There was an error during log processing"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::*;
    use crate::rules::{evaluate, Enrichment, KnownIds, RuleContext, TitleInfo};

    fn booted(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("ppu_decoder".to_string(), "Recompiler (LLVM)".to_string()),
            ("renderer".to_string(), "Vulkan".to_string()),
        ];
        pairs.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        pairs
    }

    fn eval(extra: &[(&str, &str)]) -> crate::rules::Evaluation {
        let owned = booted(extra);
        let pairs: Vec<(&str, &str)> = owned.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        evaluate_plain(&model(&pairs))
    }

    #[test]
    fn paths_and_folders() {
        assert_eq!(base_dir(r"C:\Games\rpcs3\rpcs3.exe"), r"C:\Games\rpcs3");
        assert_eq!(base_dir("EBOOT.BIN"), "EBOOT.BIN");
        assert_eq!(file_name("/dev_hdd0/disc/USRDIR/game.self"), "game.self");
        assert_eq!(truncate("short", 40), "short");
        assert_eq!(truncate(&"x".repeat(50), 40).chars().count(), 40);
    }

    #[test]
    fn firmware_versions() {
        let old = eval(&[("fw_version_installed", "4.75")]);
        assert!(old.has_note("⚠️ Firmware version 4.80 or later is recommended"));
        let custom = eval(&[("fw_version_installed", "4.88-CFW")]);
        assert!(custom.has_note("⚠️ Custom firmware is not supported, please use the latest official one"));
        let current = eval(&[("fw_version_installed", "4.91")]);
        assert!(!current.notes.iter().any(|n| n.text.contains("irmware")));
    }

    #[test]
    fn install_location_in_program_files() {
        let e = eval(&[(
            "compat_database_path",
            r"C:\Program Files\GuiConfigs\compat_database.dat",
        )]);
        assert!(e.has_note("⚠️ RPCS3 installed directly inside Program Files, without folder"));
        assert!(e.has_note("⚠️ Program Files have special permissions, please move RPCS3 to another location"));
    }

    #[test]
    fn install_location_in_sync_folder_and_winrar() {
        let e = eval(&[(
            "compat_database_path",
            r"C:\Users\me\OneDrive\Rar$EXa1.234\rpcs3\GuiConfigs\compat_database.dat",
        )]);
        assert!(e.has_note(
            "⚠️ RPCS3 is installed in a file sync service folder `OneDrive`; may result in data loss or inconsistent state"
        ));
        assert!(e.has_note("❌ RPCS3 is launched from WinRAR; please extract all files instead"));
    }

    #[test]
    fn weak_cpus() {
        let e = eval(&[
            ("cpu_model", "AMD Ryzen 5 5600H"),
            ("thread_count", "8"),
            ("cpu_extensions", "AVX2"),
        ]);
        assert!(e.has_note("⚠️ Six cores or more is recommended for Ryzen CPUs"));
        assert!(e.has_note("⚠️ Mobile Ryzen CPUs are only recommended for lighter games."));

        let intel = eval(&[("cpu_model", "Intel Core i5-6200U"), ("thread_count", "4")]);
        assert!(intel.has_note("⚠️ This CPU is too weak and/or too old for PS3 emulation"));

        let xeon = eval(&[("cpu_model", "Intel Xeon E5-2670 v2"), ("thread_count", "20")]);
        assert!(xeon.has_note("⚠️ This CPU is too weak and/or too old for PS3 emulation"));

        let tiny = eval(&[("thread_count", "1"), ("memory_amount", "3.9")]);
        assert!(tiny.has_note("⚠️ This CPU only has 1 hardware thread enabled"));
        assert!(tiny.has_note("⚠️ 8 GiB RAM or more is recommended for PS3 emulation"));
    }

    #[test]
    fn old_opengl_makes_gpu_unsupported() {
        let e = eval(&[
            ("opengl_version", "3.3"),
            ("glsl_version", "3.30"),
            ("renderer", "Vulkan"),
        ]);
        assert!(e.has_note("❌ GPU only supports OpenGL 3.3, which is below the minimum requirement of 4.3"));
        assert!(settings_lines(&e)
            .contains(&"❌ Selected `Vulkan` device is not supported, please use `OpenGL` instead".to_string()));
    }

    #[test]
    fn intel_igpus() {
        let e = eval(&[("gpu_info", "Intel(R) UHD Graphics 620")]);
        assert!(e.has_note("⚠️ Intel iGPUs are not officially supported; visual glitches are to be expected"));
        let old = eval(&[("gpu_info", "Intel(R) HD Graphics 4000")]);
        assert!(old.has_note("⚠️ Intel iGPUs before Skylake do not fully comply with OpenGL 4.3"));
    }

    #[test]
    fn nvidia_driver_minimum() {
        let e = eval(&[
            ("gpu_info", "NVIDIA GeForce GTX 1060 6GB (456.71)"),
            ("driver_version_info", "456.71"),
            ("os_type", "Windows"),
            ("build_branch", "master"),
            ("build_full_version", "0.0.30.16000"),
        ]);
        assert!(e.has_note("❗ Please update your nVidia GPU driver to at least version 512.16"));
    }

    #[test]
    fn old_windows_and_macos() {
        let win = eval(&[("os_type", "Windows"), ("os_version", "10.0.19045")]);
        assert!(win.notes.iter().any(|n| n.text.starts_with("Please [upgrade your Windows]")));
        let mac = eval(&[("os_type", "MacOS"), ("os_version", "14.1")]);
        assert!(mac.has_note("❌️ Please update your OS to version 14.3 or newer"));
    }

    #[test]
    fn patch_summary_and_mlaa() {
        let m = with_multi(
            with_multi(
                model(&booted_refs()),
                "ppu_patch",
                &["a1b2c3d4e5f6 (<- 3)", "b2c3d4e5f6a1"],
            ),
            "spu_patch",
            &["1549476fe258150ff9f902229ffaed69a932a9c1 (<- 0)"],
        );
        let e = evaluate_plain(&m);
        assert!(e.has_note("ℹ️ Game-specific patches were applied (PPU: 3)"));
        assert!(e.has_note("ℹ️ This game has MLAA disable patch"));
        assert!(e.has_note("ℹ️ Main hash: `PPU-a1b2c3d4e5f6`"));
    }

    fn booted_refs() -> Vec<(&'static str, &'static str)> {
        vec![("ppu_decoder", "Recompiler (LLVM)"), ("renderer", "Vulkan")]
    }

    #[test]
    fn game_update_from_title_info() {
        let known = KnownIds::builtin();
        let enrichment = Enrichment {
            title: Some(TitleInfo {
                update_version: Some("01.05".to_string()),
                ..TitleInfo::default()
            }),
            ..Enrichment::default()
        };
        let freshness = crate::config::FreshnessConfig::default();
        let mut pairs = booted_refs();
        pairs.push(("game_version", "1.00"));
        let e = evaluate(&model(&pairs), &RuleContext::new(&known, &enrichment, &freshness));
        assert!(e.has_note("ℹ️ Game version: v1.00 (update available: v1.05)"));
    }

    #[test]
    fn truncated_log_is_mentioned() {
        let mut m = model(&booted_refs());
        m.model.outcome = ParseOutcome::SizeLimitReached;
        let e = evaluate_plain(&m);
        assert!(e.has_note("ℹ️ The log was too large, so only the last processed run is shown"));
    }

    #[test]
    fn digital_game_outside_hdd() {
        let e = eval(&[
            ("serial", "NPUB30162"),
            ("elf_boot_path", "/dev_hdd0/disc/USRDIR/EBOOT.BIN"),
            ("ldr_game_serial", "BLUS30443"),
        ]);
        assert!(e.has_note("❌ Digital version of the game outside of `/dev_hdd0/game/` directory"));
    }

    #[test]
    fn psp_and_ps2_software() {
        let psp = eval(&[("serial", "ULUS10041")]);
        assert!(psp.has_note("❌ PSP software is not supported"));
        let ps2 = eval(&[("game_category", "2P")]);
        assert!(ps2.has_note("❌ PS2 software is not supported"));
    }
}
