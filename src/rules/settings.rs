//! `Important Settings to Review`: emulator settings that deviate from what
//! the detected hardware or title needs.
//!
//! Lines go to [`Findings::settings`] and become one section at the end; a few
//! rules write to the general notes instead.

use once_cell::sync::Lazy;
use regex::Regex;

use super::titles::{self, DES_IDS, GOW_HD_IDS};
use super::{Findings, RuleInput, Section};
use crate::version::Version;

pub(super) const SECTION: &str = "Important Settings to Review";

const TSX_FA_FIXED: Version = Version::full(0, 0, 12, 10995);
const RDNA_MSAA_FIXED: Version = Version::full(0, 0, 13, 11300);
const INTEL_THREAD_SCHEDULER: Version = Version::full(0, 0, 15, 12008);
const CUBEB: Version = Version::full(0, 0, 19, 13050);

const SYSTEM_MENU: &str = "vsh.self";
const DEFAULT_DRIVER_RECOVERY_TIMEOUT: i64 = 1_000_000;

static RADEON_RX_5XX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)Radeon RX 5\d{3}")
        .map_err(|e| tracing::error!(error = %e, "radeon model pattern failed to compile"))
        .ok()
});

fn gcd(a: i64, b: i64) -> i64 {
    if b == 0 {
        a.abs()
    } else {
        gcd(b, a % b)
    }
}

/// Reduced ratio with 8:5 spelled as 16:10.
fn reduce(width: i64, height: i64) -> (i64, i64) {
    let d = gcd(width, height).max(1);
    match (width / d, height / d) {
        (8, 5) => (16, 10),
        ratio => ratio,
    }
}

fn parse_pair(value: &str, separator: char) -> Option<(i64, i64)> {
    let (a, b) = value.split_once(separator)?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}

/// Up to two decimals, trailing zeros dropped.
fn trimmed(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn time_format(microseconds: i64) -> String {
    match microseconds {
        m if m < 1000 => format!("{} µs", m),
        m if m < 1_000_000 => format!("{} ms", trimmed(m as f64 / 1000.0)),
        m => format!("{} s", trimmed(m as f64 / 1_000_000.0)),
    }
}

/// PARAM.SFO resolution codes as `(resolution, aspect ratio)`.
fn supported_resolution(code: &str) -> (String, &'static str) {
    match code.trim().to_uppercase().as_str() {
        "480SQ" => ("720x480".into(), "4:3"),
        "576SQ" => ("720x576".into(), "4:3"),
        "480" => ("720x480".into(), "16:9"),
        "576" => ("720x576".into(), "16:9"),
        "720" => ("1280x720".into(), "16:9"),
        "1080" => ("1920x1080".into(), "16:9"),
        other => (other.to_string(), "16:9"),
    }
}

fn has_extension(input: &RuleInput<'_>, ext: &str) -> bool {
    input.get("cpu_extensions").is_some_and(|e| e.contains(ext))
}

fn is_apple_gpu(input: &RuleInput<'_>) -> bool {
    input
        .get("gpu_info")
        .is_some_and(|g| g.to_lowercase().contains("apple"))
}

// ═══════════════════════════════════════════════════════════════════════
// CPU
// ═══════════════════════════════════════════════════════════════════════

fn logging(input: &RuleInput<'_>, findings: &mut Findings) {
    let blank = |key: &str| input.get(key).map_or(true, |v| v.trim().is_empty());
    if input.on("disable_logs") {
        findings
            .settings
            .push("❗ `Silence All Logs` is enabled, please disable and upload a new log");
    } else if !blank("log_disabled_channels") || !blank("log_disabled_channels_multiline") {
        findings
            .settings
            .push("❗ Some logging priorities were modified, please reset and upload a new log");
    }
}

fn tsx(input: &RuleInput<'_>, findings: &mut Findings) {
    let has_tsx = has_extension(input, "TSX");
    let has_tsx_fa = has_extension(input, "TSX-FA");
    let tsx_setting = input.get("enable_tsx");
    if input.build_before(TSX_FA_FIXED) {
        if tsx_setting == Some("Disabled") && has_tsx && !has_tsx_fa {
            findings.settings.push("ℹ️ TSX support is disabled");
        } else if tsx_setting == Some("Enabled") && has_tsx_fa {
            findings
                .settings
                .push("⚠️ Disable TSX support if you experience performance issues");
        }
    } else if tsx_setting == Some("Disabled") && has_tsx {
        findings.settings.push("ℹ️ TSX support is disabled");
    }
}

fn thread_scheduler(input: &RuleInput<'_>, findings: &mut Findings) {
    const MAY_HELP: &str = "ℹ️ Changing `Thread Scheduler` option may or may not increase performance";
    let Some(cpu) = input.get("cpu_model") else {
        return;
    };
    let scheduler_build = matches!(input.build, Some(v) if v >= INTEL_THREAD_SCHEDULER);
    if cpu.starts_with("AMD") && cpu.contains("Ryzen") && !input.is_linux() {
        // everything before Windows 10 1903
        let old_windows = input
            .version("os_version")
            .is_some_and(|v| v.major < 10 || (v.major == 10 && v.build_or_zero() < 18362));
        if old_windows && input.get("thread_scheduler") == Some("OS") {
            if scheduler_build {
                findings
                    .settings
                    .push("⚠️ Please enable RPCS3 `Thread Scheduler` option in the CPU Settings");
            } else {
                findings
                    .settings
                    .push("⚠️ Please enable `Thread Scheduler` in the CPU Settings");
            }
        } else {
            findings.settings.push(MAY_HELP);
        }
    } else if cpu.starts_with("Intel")
        && input.thread_count.is_some_and(|t| t > 11)
        && scheduler_build
    {
        findings.settings.push(MAY_HELP);
    }
}

fn decoders(input: &RuleInput<'_>, findings: &mut Findings) {
    if let Some(ppu) = input.get("ppu_decoder") {
        let ppu = ppu.to_lowercase();
        if input.ctx.known.require_interpreter.contains(input.serial) {
            if ppu.contains("recompiler") {
                findings
                    .settings
                    .push("⚠️ This game requires `PPU Decoder` to use `Interpreter (static)`");
            }
        } else if ppu.contains("interpreter") {
            findings
                .settings
                .push("⚠️ Please set `PPU Decoder` to use recompiler for better performance");
        }
    }
    if input
        .get("spu_decoder")
        .is_some_and(|s| s.to_lowercase().contains("interpreter"))
    {
        findings
            .settings
            .push("⚠️ Please set `SPU Decoder` to use recompiler for better performance");
    }

    for (key, name) in [
        ("accurate_getllar", "Accurate GETLLAR"),
        ("accurate_putlluc", "Accurate PUTLLUC"),
        ("accurate_rsx_reservation", "Accurate RSX Reservation Access"),
    ] {
        if input.on(key) {
            findings.settings.push(format!("ℹ️ `{}` is enabled", name));
        }
    }
}

fn xfloat(input: &RuleInput<'_>, findings: &mut Findings) {
    let known = input.ctx.known;
    let required = known.require_accurate_xfloat.contains(input.serial);
    let mode = input.get("xfloat_mode");
    let line = if required && mode != Some("Accurate") {
        "⚠️ `Accurate xfloat` is required for this game"
    } else if mode == Some("Accurate") && !required {
        "⚠️ `Accurate xfloat` is not required, and significantly impacts performance"
    } else if matches!(mode, Some("Relaxed" | "Inaccurate"))
        && !known.no_approximate_xfloat.contains(input.serial)
    {
        "⚠️ `Approximate xfloat` is disabled, please enable"
    } else if mode == Some("Inaccurate") && !known.no_relaxed_xfloat.contains(input.serial) {
        "⚠️ `Relaxed xfloat` is disabled, please enable"
    } else {
        return;
    };
    findings.settings.push(line);
}

// ═══════════════════════════════════════════════════════════════════════
// GPU
// ═══════════════════════════════════════════════════════════════════════

fn renderer(input: &RuleInput<'_>, findings: &mut Findings) {
    if let Some(arch) = input.get("llvm_arch") {
        findings.settings.push(format!(
            "❔ LLVM target CPU architecture override is set to `{}`",
            arch.replace('`', "'")
        ));
    }
    match input.get("renderer") {
        Some("D3D12") => findings.settings.push("💢 Do not use DX12 renderer"),
        Some("OpenGL") if findings.supported_gpu && !GOW_HD_IDS.contains(&input.serial) => {
            findings
                .settings
                .push("⚠️ `Vulkan` is the recommended `Renderer`")
        }
        Some("Vulkan") if !findings.supported_gpu => findings
            .settings
            .push("❌ Selected `Vulkan` device is not supported, please use `OpenGL` instead"),
        _ => {}
    }
}

fn resolution(input: &RuleInput<'_>, findings: &mut Findings) {
    let Some(selected) = input.get_non_empty("resolution") else {
        return;
    };
    let ratio_setting = input.get("aspect_ratio");
    let ps1 = input.get("game_category") == Some("1P");

    if selected == "1280x720" && ps1 {
        let region = input.serial.chars().nth(2);
        if input.serial.chars().count() > 3 {
            if region == Some('E') {
                findings
                    .settings
                    .push("⚠️ PAL PS1 Classics should use `Resolution` of `720x576`");
            } else {
                findings
                    .settings
                    .push("⚠️ NTSC PS1 Classics should use `Resolution` of `720x480`");
            }
        }
        return;
    }
    if selected == "1280x720" {
        return;
    }

    let mut known = false;
    let mut supported = false;
    if let Some(title) = input
        .ctx
        .enrichment
        .title
        .as_ref()
        .filter(|t| !t.supported_resolutions.is_empty())
    {
        known = true;
        supported = title.supported_resolutions.iter().any(|code| {
            let (res, ratio) = supported_resolution(code);
            res == selected && (ratio_setting == Some("Auto") || ratio_setting == Some(ratio))
        });
    }
    if selected == "1920x1080" && input.ctx.known.supports_1080p.contains(input.serial) {
        known = true;
        supported = true;
    }
    if known {
        if !supported {
            findings
                .settings
                .push("❌ Selected `Resolution` is not supported, please set to recommended `1280x720`");
        }
    } else if !ps1 {
        findings
            .settings
            .push("⚠️ `Resolution` was changed from the recommended `1280x720`");
    }

    let Some((width, height)) = parse_pair(selected, 'x') else {
        return;
    };
    let ratio = reduce(width, height);
    let wide_or_square = width == 720 && (height == 480 || height == 576);
    match ratio_setting {
        Some(setting) if setting != "Auto" => {
            if let Some((w, h)) = parse_pair(setting, ':') {
                if reduce(w, h) != ratio && !wide_or_square {
                    findings.settings.push(format!(
                        "⚠️ Selected `Resolution` has aspect ratio of {}:{}, but `Aspect Ratio` is set to {}",
                        ratio.0, ratio.1, setting
                    ));
                }
            }
        }
        _ => {
            if wide_or_square {
                findings.settings.push(
                    "ℹ️ Setting `Aspect Ratio` to `16:9` or `4:3` instead of `Auto` may improve compatibility",
                );
            } else {
                findings.settings.push(format!(
                    "ℹ️ Setting `Aspect Ratio` to `{}:{}` instead of `Auto` may improve compatibility",
                    ratio.0, ratio.1
                ));
            }
        }
    }
    if height < 720 && !ps1 {
        findings
            .settings
            .push("⚠️ `Resolution` below 720p will not improve performance");
    }
}

fn anti_aliasing(input: &RuleInput<'_>, findings: &mut Findings) {
    let apple = is_apple_gpu(input);
    let msaa = input.get("msaa");

    if input
        .multi("rsx_not_supported_feature")
        .iter()
        .any(|f| f == "alpha-to-one for multisampling")
        && msaa.is_some_and(|m| m != "Disabled")
    {
        findings.notes.push(
            "ℹ️ The driver or GPU does not support all required features for proper MSAA implementation, which may result in minor visual artifacts",
        );
    }
    let wireframe_bug = input.build_before(RDNA_MSAA_FIXED)
        && input.get("gpu_info").is_some_and(|gpu| {
            RADEON_RX_5XX.as_ref().is_some_and(|re| re.is_match(gpu)) && !gpu.contains("RADV")
        });
    match msaa {
        Some("Disabled") => {
            if !wireframe_bug && !apple {
                findings
                    .settings
                    .push("ℹ️ `Anti-aliasing` is disabled, which may result in visual artifacts");
            }
        }
        Some(_) => {
            if apple {
                findings
                    .settings
                    .push("⚠️ `Anti-aliasing` is not supported for Apple GPUs, please disable");
            } else if wireframe_bug {
                findings.settings.push(
                    "⚠️ Please disable `Anti-aliasing` if you experience wireframe-like visual artifacts",
                );
            }
        }
        None => {}
    }
}

fn vsync(input: &RuleInput<'_>, findings: &mut Findings) {
    let mut vsync = input.on("vsync");
    let present_mode = input.get("rsx_present_mode").and_then(|pm| match pm {
        "0" => Some("Immediate"),
        "1" => Some("Fast Sync"),
        "2" => Some("Double-buffered VSync"),
        "3" => Some("Adaptive VSync"),
        _ => None,
    });
    if input.on("force_fifo_present") {
        findings.settings.push("⚠️ Double-buffered VSync is forced");
        vsync = true;
    }
    if input.get("rsx_swapchain_mode") == Some("2") {
        vsync = true;
    }
    if vsync {
        match input.get("frame_limit") {
            Some("Auto") => findings
                .settings
                .push("ℹ️ Frame rate might be limited to 30 fps due to enabled VSync"),
            Some(limit) => {
                if let Ok(limit) = limit.parse::<f64>() {
                    let line = if limit > 30.0 && limit < 60.0 {
                        "ℹ️ Frame rate might be limited to 30 fps due to enabled VSync"
                    } else if limit < 30.0 {
                        "ℹ️ Frame rate might be limited to 15 fps due to enabled VSync"
                    } else {
                        "ℹ️ Frame pacing might be affected due to VSync and Frame Limiter enabled at the same time"
                    };
                    findings.settings.push(line);
                }
            }
            None => {}
        }
    } else if let Some(mode) = present_mode.filter(|m| *m != "Immediate") {
        findings.settings.push(format!(
            "ℹ️ `VSync` is disabled, but the drivers provided `{}`",
            mode
        ));
    }
}

fn texture_streaming(input: &RuleInput<'_>, findings: &mut Findings) {
    if !input.on("async_texture_streaming") {
        return;
    }
    if is_apple_gpu(input) {
        findings
            .settings
            .push("⚠️ `Async Texture Streaming` is not supported on Apple GPUs");
        return;
    }
    if input.get("async_queue_scheduler") == Some("Device") {
        findings.settings.push(
            "⚠️ If you experience visual artifacts, try setting `Async Queue Scheduler` to use `Host`",
        );
    }
    findings
        .settings
        .push("⚠️ If you experience visual artifacts, try disabling `Async Texture Streaming`");
}

fn resolution_scale(input: &RuleInput<'_>, findings: &mut Findings) {
    let Some(scale) = input.int("resolution_scale") else {
        return;
    };
    if scale < 100 {
        findings.settings.push(format!(
            "❔ `Resolution Scale` is `{}%`; this will not increase performance",
            scale
        ));
    }
    if scale != 100
        && input.int("texture_scale_threshold").is_some_and(|t| t < 16)
        && !input.ctx.known.res_scale_threshold.contains(input.serial)
    {
        findings.settings.push(
            "⚠️ `Resolution Scale Threshold` below `16x16` may result in corrupted visuals and game crash",
        );
    }
    if scale > 100 && input.get("msaa").is_some_and(|m| m != "Disabled") {
        let level = if scale > 200 { "⚠️" } else { "ℹ️" };
        findings.settings.push(format!(
            "{} If you have missing UI elements or experience performance issues, decrease `Resolution Scale` or disable `Anti-aliasing`",
            level
        ));
    }
    if scale > 300 {
        findings
            .settings
            .push("⚠️ Excessive `Resolution Scale` may impact performance");
    }
}

fn buffers(input: &RuleInput<'_>, findings: &mut Findings) {
    let known = input.ctx.known;
    let has_serial = !input.serial.is_empty();
    if input.off("write_color_buffers")
        && has_serial
        && known.write_color_buffers.contains(input.serial)
    {
        if DES_IDS.contains(&input.serial) && !input.ppu.applied().is_empty() {
            findings.settings.push("ℹ️ `Write Color Buffers` is disabled");
        } else {
            findings
                .settings
                .push("⚠️ `Write Color Buffers` is disabled, please enable");
        }
    }

    // `vertex_cache` holds the "disable vertex cache" flag
    let cache_disabled = input.on("vertex_cache") || input.on("mtrsx");
    if known.disable_vertex_cache.contains(input.serial) && !cache_disabled {
        findings
            .settings
            .push("⚠️ This game requires disabling `Vertex Cache` option");
    }
    if input.on("vertex_cache")
        && input.off("mtrsx")
        && has_serial
        && !known.disable_vertex_cache.contains(input.serial)
    {
        findings
            .settings
            .push("ℹ️ `Vertex Cache` is disabled, and may impact performance");
    }
    if input.on("frame_skip") {
        findings
            .settings
            .push("⚠️ `Frame Skip` is enabled, please disable");
    }
    if input.on("cpu_blit") && input.off("write_color_buffers") {
        findings
            .settings
            .push("❔ `Force CPU Blit` is enabled, but `Write Color Buffers` is disabled");
    }
}

fn zcull(input: &RuleInput<'_>, findings: &mut Findings) {
    let relaxed_possible = input.get("renderer") != Some("Vulkan")
        || input
            .multi("vk_ext")
            .iter()
            .any(|e| e == "VK_EXT_depth_range_unrestricted");
    let works_relaxed = input.ctx.known.relaxed_zcull.contains(input.serial);
    let status = input.get("zcull_status");
    if status.is_some_and(|s| s != "Full") && !relaxed_possible {
        findings.settings.push(
            "⚠️ This GPU does not support `VK_EXT_depth_range_unrestricted` extension, please disable `Relaxed ZCull Sync`",
        );
    } else if status == Some("Disabled") {
        findings.settings.push(
            "⚠️ `ZCull Occlusion Queries` is disabled, which can result in visual artifacts",
        );
    } else if input.on("relaxed_zcull") && !works_relaxed {
        findings.settings.push(
            "ℹ️ `Relaxed ZCull Sync` is enabled and can cause performance and visual issues",
        );
    } else if input.off("relaxed_zcull") && works_relaxed && relaxed_possible {
        findings
            .settings
            .push("ℹ️ Enabling `Relaxed ZCull Sync` for this game may improve performance");
    }
}

fn timing(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.ctx.known.fps_unlock_patch.contains(input.serial) && !input.ppu.applied().is_empty() {
        return;
    }
    if let Some(rate) = input.int("vblank_rate").filter(|r| *r != 60) {
        findings.settings.push(format!(
            "ℹ️ `VBlank Rate` is set to {} Hz ({:.0}%)",
            rate,
            rate as f64 / 60.0 * 100.0
        ));
    }
    if let Some(scale) = input.int("clock_scale").filter(|s| *s != 100) {
        findings
            .settings
            .push(format!("ℹ️ `Clock Scale` is set to {}%", scale));
    }
}

fn libraries(input: &RuleInput<'_>, findings: &mut Findings) {
    if let Some(loader) = input.get("lib_loader") {
        let lower = loader.to_lowercase();
        let no_list = matches!(input.get("library_list"), None | Some("") | Some("None"));
        let misconfigured =
            loader == "Auto" || ((lower.contains("manual") || lower.contains("strict")) && no_list);
        if misconfigured && input.get("game_title") != Some(SYSTEM_MENU) {
            findings
                .settings
                .push("⚠️ Please use `Load liblv2.sprx only` as a `Library loader`");
        }
    }

    let mut warn_overrides = input
        .get("library_list_hle")
        .is_some_and(|l| l != "None");
    if let Some(lle) = input.get("library_list_lle").filter(|l| *l != "None") {
        if lle.contains("sysutil") {
            findings
                .settings
                .push("❗ Never override `sysutil` firmware modules");
        }
        if lle.contains("libvdec") {
            let unexpected = lle
                .split(',')
                .map(str::trim)
                .any(|m| !m.is_empty() && m != "libvdec.sprx");
            if unexpected {
                findings
                    .settings
                    .push("⚠️ Please do not override Firmware Libraries that you weren't asked to");
                warn_overrides = false;
            }
        } else {
            warn_overrides = true;
        }
    }
    if warn_overrides {
        findings
            .settings
            .push("⚠️ Please disable any Firmware Libraries overrides");
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Everything else
// ═══════════════════════════════════════════════════════════════════════

fn debug_options(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.get("game_title") != Some(SYSTEM_MENU) && input.on("debug_console_mode") {
        findings
            .settings
            .push("⚠️ `Debug Console Mode` is enabled, and may cause game crashes");
    }
    if input.on("hook_static_functions") {
        findings
            .settings
            .push("⚠️ `Hook Static Functions` is enabled, please disable");
    }
    if input.on("host_root") {
        findings.settings.push("❔ `/host_root/` is enabled");
    }
}

fn threads(input: &RuleInput<'_>, findings: &mut Findings) {
    if let Some(ppu) = input.get("ppu_threads").filter(|t| *t != "2") {
        findings.settings.push(format!(
            "⚠️ `PPU Threads` is set to `{}`; please change it back to `2`",
            ppu.replace('`', "'")
        ));
    }
    if let Some(spurs) = input.int("spurs_threads").filter(|t| *t != 6) {
        if !(1..=6).contains(&spurs) {
            findings.settings.push(format!(
                "⚠️ `Max SPURS Threads` is set to `{}`; please change it back to `6`",
                spurs
            ));
        } else {
            findings.settings.push(format!(
                "ℹ️ `Max SPURS Threads` is set to `{}`; may result in game crash",
                spurs
            ));
        }
    }
}

fn textures_and_shaders(input: &RuleInput<'_>, findings: &mut Findings) {
    let apple = is_apple_gpu(input);
    if input.on("gpu_texture_scaling") {
        findings
            .settings
            .push("⚠️ `GPU Texture Scaling` is enabled, please disable");
    }
    if let Some(af) = input.get("af_override") {
        if apple && af == "Auto" {
            findings.settings.push(
                "⚠️ `Anisotropic Filter` override is not supported on Apple GPUs, please use `Auto`",
            );
        } else if af == "Disabled" {
            findings
                .settings
                .push("❌ `Anisotropic Filter` is `Disabled`, please use `Auto` instead");
        } else if af != "Auto" && af != "16" {
            findings.settings.push(format!(
                "❔ `Anisotropic Filter` is set to `{}x`, which makes little sense over `16x` or `Auto`",
                af
            ));
        }
    }

    let shader_mode = input.get("shader_mode");
    if shader_mode.is_some_and(|m| m.contains("Interpreter")) && apple {
        findings.settings.push(
            "⚠️ Interpreter `Shader Mode` is not supported on Apple GPUs, please use Async-only option",
        );
    } else if shader_mode == Some("Interpreter only") {
        findings
            .settings
            .push("⚠️ `Shader Interpreter Only` mode is not accurate and very demanding");
    } else if shader_mode.is_some_and(|m| !m.starts_with("Async")) && !apple {
        findings
            .settings
            .push("❔ Async shader compilation is disabled");
    }
}

fn driver_timing(input: &RuleInput<'_>, findings: &mut Findings) {
    if let Some(timeout) = input
        .int("driver_recovery_timeout")
        .filter(|t| *t != DEFAULT_DRIVER_RECOVERY_TIMEOUT)
    {
        if timeout == 0 {
            findings.settings.push(
                "⚠️ `Driver Recovery Timeout` is set to 0 (infinite), please use default value of 1000000",
            );
        } else if timeout < 10_000 {
            findings.settings.push(format!(
                "⚠️ `Driver Recovery Timeout` is set too low: {} (1 frame @ {} fps)",
                time_format(timeout),
                trimmed(1_000_000.0 / timeout as f64)
            ));
        } else if timeout > 10_000_000 {
            findings.settings.push(format!(
                "⚠️ `Driver Recovery Timeout` is set too high: {}",
                time_format(timeout)
            ));
        }
    }
    if let Some(delay) = input.int("driver_wakeup_delay").filter(|d| *d > 1) {
        if delay > 1000 {
            findings.settings.push(format!(
                "⚠️ `Driver Wake-up Delay` is set to {}, and will impact performance",
                time_format(delay)
            ));
        } else {
            findings.settings.push(format!(
                "ℹ️ `Driver Wake-up Delay` is set to {}",
                time_format(delay)
            ));
        }
    }
}

fn audio(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.on("audio_buffering") {
        if let Some(duration) = input.int("audio_buffer_duration").filter(|d| *d > 100) {
            findings.settings.push(format!(
                "ℹ️ `Audio Buffer Duration` is set to {}ms, which may cause audio lag",
                duration
            ));
        }
    }
    if input.on("audio_stretching") {
        findings
            .settings
            .push("ℹ️ `Audio Time Stretching` is `Enabled`");
    }

    if let Some(backend) = input.get_non_empty("audio_backend") {
        let is = |name: &str| backend.eq_ignore_ascii_case(name);
        if matches!(input.build, Some(v) if v < CUBEB) {
            if input.is_windows() && !is("XAudio2") {
                findings
                    .settings
                    .push("⚠️ Please use `XAudio2` as the audio backend for this build");
            } else if input.is_linux() && !is("OpenAL") && !is("FAudio") {
                findings.settings.push(
                    "ℹ️ `FAudio` and `OpenAL` are the recommended audio backends for this build",
                );
            }
        } else if (input.is_windows() || input.is_linux()) && !is("Cubeb") && !is("XAudio2") {
            findings
                .settings
                .push("⚠️ Please use `Cubeb` as the audio backend");
        }
        if is("null") {
            findings.settings.push("⚠️ `Audio backend` is set to `null`");
        }
    }

    if let Some(volume) = input.int("audio_volume") {
        if volume < 10 {
            findings
                .settings
                .push(format!("⚠️ Audio volume is set to {}%", volume));
        } else if volume > 100 {
            findings.settings.push(format!(
                "⚠️ Audio volume is set to {}%; audio clipping is to be expected",
                volume
            ));
        }
    }
}

fn multithreaded_rsx(input: &RuleInput<'_>, findings: &mut Findings) {
    if !input.on("mtrsx") {
        return;
    }
    let line = if is_apple_gpu(input) {
        "⚠️ `Multithreaded RSX` is not supported for Apple GPUs"
    } else if input
        .multi("fatal_error")
        .iter()
        .any(|f| f.contains("VK_ERROR_OUT_OF_POOL_MEMORY_KHR"))
    {
        "⚠️ `Multithreaded RSX` is enabled, please disable for this game"
    } else if input.thread_count.unwrap_or(0) < 6 {
        "⚠️ `Multithreaded RSX` is enabled on a CPU with few threads"
    } else {
        "ℹ️ `Multithreaded RSX` is enabled"
    };
    findings.settings.push(line);
}

fn input_devices(input: &RuleInput<'_>, findings: &mut Findings) {
    if let Some(pad) = input.get("failed_pad") {
        findings.settings.push(format!(
            "⚠️ Binding `{}` failed, check if device is connected.",
            pad.replace('`', "'")
        ));
    }
    if !input.serial.is_empty()
        && input.ctx.known.motion_controls.contains(input.serial)
        && !input.multi("pad_handler").iter().any(|h| h.starts_with("DualS"))
        && !input
            .multi("pad_has_gyro")
            .iter()
            .any(|g| g == "1" || g == "true")
    {
        findings.settings.push(
            "❗ This game requires motion controls, please use native handler for DualShock 3, 4, DualSense, or SDL handler with compatible controller",
        );
    }
}

fn misc(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.on("hle_lwmutex") {
        findings
            .settings
            .push("⚠️ `HLE lwmutex` is enabled, might affect compatibility");
    }
    if let Some(size) = input
        .get("spu_block_size")
        .filter(|s| *s != "Safe" && *s != "Mega")
    {
        findings.settings.push(format!(
            "⚠️ Please change `SPU Block Size` to `Safe/Mega`, currently `{}` is unstable.",
            size
        ));
    }
    if input.off("auto_start_on_boot") {
        findings
            .settings
            .push("❔ `Automatically start games after boot` is disabled");
    } else if input.off("always_start_on_boot") {
        findings
            .settings
            .push("❔ `Always start after boot` is disabled");
    }
}

pub(super) fn check(input: &RuleInput<'_>, findings: &mut Findings) {
    logging(input, findings);
    tsx(input, findings);
    thread_scheduler(input, findings);
    renderer(input, findings);
    resolution(input, findings);
    if input.on("stretch_to_display") {
        findings
            .settings
            .push("🤢 `Stretch to Display Area` is enabled");
    }
    anti_aliasing(input, findings);
    vsync(input, findings);
    texture_streaming(input, findings);
    decoders(input, findings);
    xfloat(input, findings);
    resolution_scale(input, findings);
    buffers(input, findings);
    zcull(input, findings);
    timing(input, findings);
    libraries(input, findings);

    if !input.serial.is_empty() {
        for group in input.ctx.known.titles.iter().filter(|g| g.matches(input.serial)) {
            (group.check)(input, findings);
        }
    } else if input.get("game_title") == Some(SYSTEM_MENU) {
        titles::system_menu(input, findings);
    }
    if input.get("game_category") == Some("1P") {
        titles::ps1_classics(input, findings);
    }

    debug_options(input, findings);
    threads(input, findings);
    textures_and_shaders(input, findings);
    driver_timing(input, findings);
    audio(input, findings);
    multithreaded_rsx(input, findings);
    input_devices(input, findings);
    misc(input, findings);

    if input.get("custom_config").is_some() && !findings.settings.is_empty() {
        findings.notes.push(
            "⚠️ To change custom configuration, **Right-click on the game**, then `Configure`",
        );
    }

    let lines: Vec<String> = std::mem::take(&mut findings.settings)
        .into_sorted()
        .iter()
        .map(|n| n.line())
        .collect();
    if !lines.is_empty() {
        findings.sections.push(Section::new(SECTION, lines));
    }
}
