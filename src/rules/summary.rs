//! Descriptive sections: build info, the settings columns, libraries, patches.

use super::{Findings, RuleInput, Section};

const NOT_AVAILABLE: &str = "N/A";

pub(super) fn build_info(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.get("build_and_specs").is_none() {
        return;
    }
    let field = |key: &str| input.get(key).unwrap_or("");

    let mut build = format!(
        "RPCS3 v{} {}",
        field("build_version_string"),
        field("build_stage")
    );
    if let Some(branch) = input.get_non_empty("build_branch") {
        build.push_str(" | ");
        build.push_str(branch);
    }
    if let Some(fw) = input.get_non_empty("fw_version_installed") {
        build.push_str(" | FW ");
        build.push_str(fw);
    }
    if let Some(os) = input.get_non_empty("os_type") {
        build.push_str(" | ");
        if let Some(windows) = input.get("os_windows_version") {
            build.push_str("Windows ");
            build.push_str(windows);
        } else if let Some(linux) = input.get("os_linux_version") {
            build.push_str(linux);
        } else {
            build.push_str(os);
            if let Some(version) = input.get_non_empty("os_version") {
                build.push(' ');
                build.push_str(version);
            }
        }
    }

    let mut cpu = format!(
        "{} | {} Threads | {} GiB RAM",
        field("cpu_model"),
        field("thread_count"),
        field("memory_amount")
    );
    if let Some(extensions) = input.get_non_empty("cpu_extensions") {
        cpu.push_str(" | ");
        cpu.push_str(extensions);
    }

    let mut lines = vec![build.trim_end().to_string(), cpu];
    if let Some(gpu) = input.get("gpu_info") {
        lines.push(format!("GPU: {}", gpu));
    } else if let Some(available) = input.get("gpu_available_info") {
        if available.contains('\n') {
            lines.push("GPUs:".to_string());
            lines.extend(available.lines().map(str::to_string));
        } else {
            lines.push(format!("GPU: {}", available));
        }
    }
    findings.sections.push(Section::new("Build Info", lines));
}

fn cpu_column(input: &RuleInput<'_>) -> Option<Vec<String>> {
    input.get_non_empty("ppu_decoder")?;
    let v = |key: &str| input.get(key).unwrap_or("");
    let na = |key: &str| input.get(key).unwrap_or(NOT_AVAILABLE);
    Some(vec![
        format!("PPU Decoder: {:>21}", v("ppu_decoder")),
        format!("SPU Decoder: {:>21}", v("spu_decoder")),
        format!("SPU Lower Thread Priority: {:>7}", v("spu_lower_thread_priority")),
        format!("SPU Loop Detection: {:>14}", v("spu_loop_detection")),
        format!("SPU Threads: {:>21}", v("spu_threads")),
        format!("SPU Block Size: {:>18}", na("spu_block_size")),
        format!("Accurate xfloat: {:>17}", na("accurate_xfloat")),
        format!("Force CPU Blit: {:>18}", na("cpu_blit")),
        format!("Lib Loader: {:>22}", v("lib_loader")),
    ])
}

fn gpu_column(input: &RuleInput<'_>) -> Option<Vec<String>> {
    input.get_non_empty("renderer")?;
    let v = |key: &str| input.get(key).unwrap_or("");
    let na = |key: &str| input.get(key).unwrap_or(NOT_AVAILABLE);
    Some(vec![
        format!("Renderer: {:>24}", v("renderer")),
        format!("Aspect ratio: {:>20}", v("aspect_ratio")),
        format!("Resolution: {:>22}", v("resolution")),
        format!("Resolution Scale: {:>16}", na("resolution_scale")),
        format!("Resolution Scale Threshold: {:>6}", na("texture_scale_threshold")),
        format!("Write Color Buffers: {:>13}", v("write_color_buffers")),
        format!("Anisotropic Filter: {:>14}", na("af_override")),
        format!("Frame Limit: {:>21}", v("frame_limit")),
        format!("VSync: {:>27}", na("vsync")),
    ])
}

/// Drops `count` of the `N/A` lines, keeping the earliest ones.
fn drop_unavailable(lines: Vec<String>, count: usize) -> Vec<String> {
    let total = lines.iter().filter(|l| l.ends_with(NOT_AVAILABLE)).count();
    let mut keep = total.saturating_sub(count);
    lines
        .into_iter()
        .filter(|line| {
            if !line.ends_with(NOT_AVAILABLE) {
                return true;
            }
            if keep > 0 {
                keep -= 1;
                true
            } else {
                false
            }
        })
        .collect()
}

/// CPU and GPU columns, shown only as a pair. Both lose the same number of
/// `N/A` lines so they stay level.
pub(super) fn settings_columns(input: &RuleInput<'_>, findings: &mut Findings) {
    let (Some(cpu), Some(gpu)) = (cpu_column(input), gpu_column(input)) else {
        return;
    };
    let unavailable = |lines: &[String]| lines.iter().filter(|l| l.ends_with(NOT_AVAILABLE)).count();
    let common = unavailable(&cpu).min(unavailable(&gpu));
    let prefix = if input.get("custom_config").is_some() {
        "Per-game "
    } else {
        ""
    };
    findings.sections.push(Section::new(
        format!("{}CPU Settings", prefix),
        drop_unavailable(cpu, common),
    ));
    findings.sections.push(Section::new(
        format!("{}GPU Settings", prefix),
        drop_unavailable(gpu, common),
    ));
}

pub(super) fn libraries(input: &RuleInput<'_>, findings: &mut Findings) {
    let manual = input
        .get("lib_loader")
        .is_some_and(|l| l.to_lowercase().contains("manual"));
    if !manual {
        return;
    }
    if let Some(list) = input.get("library_list") {
        findings
            .sections
            .push(Section::new("Selected Libraries", vec![list.to_string()]));
    }
}

pub(super) fn applied_patches(input: &RuleInput<'_>, findings: &mut Findings) {
    let names = input.patch_names;
    if names.is_empty() {
        return;
    }
    let name = if names.len() == 1 {
        "Applied Game Patch"
    } else {
        "Applied Game Patches"
    };
    findings
        .sections
        .push(Section::new(name, vec![names.join(", ")]));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::*;

    #[test]
    fn build_info_lines() {
        let eval = evaluate_plain(&model(&[
            ("build_and_specs", "RPCS3 v0.0.29-15470-2f5e4e1c Alpha | master"),
            ("build_version_string", "0.0.29-15470-2f5e4e1c"),
            ("build_stage", "Alpha"),
            ("build_branch", "master"),
            ("fw_version_installed", "4.90"),
            ("os_type", "Windows"),
            ("os_windows_version", "11 23H2"),
            ("cpu_model", "AMD Ryzen 7 5800X"),
            ("thread_count", "16"),
            ("memory_amount", "31.9"),
            ("cpu_extensions", "AVX2"),
            ("gpu_info", "NVIDIA GeForce RTX 3070 (531.79)"),
        ]));
        let section = eval.section("Build Info").unwrap();
        assert_eq!(
            section.lines,
            vec![
                "RPCS3 v0.0.29-15470-2f5e4e1c Alpha | master | FW 4.90 | Windows 11 23H2",
                "AMD Ryzen 7 5800X | 16 Threads | 31.9 GiB RAM | AVX2",
                "GPU: NVIDIA GeForce RTX 3070 (531.79)",
            ]
        );
    }

    #[test]
    fn columns_need_both_sides() {
        let eval = evaluate_plain(&model(&[("ppu_decoder", "Recompiler/LLVM")]));
        assert!(eval.section("CPU Settings").is_none());
    }

    #[test]
    fn columns_drop_matching_na_lines() {
        let eval = evaluate_plain(&model(&[
            ("ppu_decoder", "Recompiler/LLVM"),
            ("spu_block_size", "Safe"),
            ("renderer", "Vulkan"),
            ("resolution_scale", "100"),
            ("texture_scale_threshold", "16"),
            ("af_override", "Auto"),
            ("custom_config", "config_BLUS30443.yml"),
        ]));
        let cpu = eval.section("Per-game CPU Settings").unwrap();
        let gpu = eval.section("Per-game GPU Settings").unwrap();
        // cpu has two N/A lines, gpu has one, so one goes from each
        assert_eq!(cpu.lines.len(), 8);
        assert_eq!(gpu.lines.len(), 8);
        assert!(cpu.lines.contains(&format!("Accurate xfloat: {:>17}", "N/A")));
        assert!(!cpu.lines.contains(&format!("Force CPU Blit: {:>18}", "N/A")));
        assert!(gpu.lines.iter().all(|l| !l.ends_with("N/A")));
        assert_eq!(cpu.lines[0], format!("PPU Decoder: {}Recompiler/LLVM", " ".repeat(6)));
    }

    #[test]
    fn manual_libraries_and_patches() {
        let m = with_multi(
            model(&[
                ("lib_loader", "Liblv2.sprx & manual"),
                ("library_list", "libvdec.sprx, libadec.sprx"),
            ]),
            "patch_desc",
            &["60 FPS", "Disable MLAA"],
        );
        let eval = evaluate_plain(&m);
        assert_eq!(
            eval.section("Selected Libraries").unwrap().lines,
            vec!["libvdec.sprx, libadec.sprx"]
        );
        assert_eq!(
            eval.section("Applied Game Patches").unwrap().lines,
            vec!["60 FPS, Disable MLAA"]
        );
    }
}
