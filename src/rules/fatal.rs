//! Fatal errors, corrupted save paths and Windows error code links.
//!
//! Fatal error texts are clustered first. A cluster matching a known pattern
//! becomes a note instead of a section; the rest are rendered as
//! `Fatal Error` or `Fatal Error (xN)`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Findings, RuleInput, Section};
use crate::similarity::group_similar;
use crate::version::Version;

const DECOMPILER_ISSUE_START: Version = Version::full(0, 0, 9, 10307);
const DECOMPILER_ISSUE_END: Version = Version::full(0, 0, 10, 10346);

const ERROR_CODES_URL: &str = "https://learn.microsoft.com/en-us/windows/win32/debug/system-error-codes";

static VERIFICATION_ERROR: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"\(e(rror)?=(0x(?<verification_error_hex>[0-9a-f]+)|(?<verification_error>\d+))(\[\d+\])?\)")
        .map_err(|e| tracing::error!(error = %e, "error code pattern failed to compile"))
        .ok()
});

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Note for a fatal error with a known cause. Returns whether the raw text
/// should be hidden.
fn known_fatal(
    error: &str,
    contexts: &[String],
    input: &RuleInput<'_>,
    findings: &mut Findings,
) -> bool {
    let context_starts = |prefix: &str| contexts.iter().any(|c| c.starts_with(prefix));
    let mut known = false;

    if contains_ignore_case(error, "psf.cpp")
        || contains_ignore_case(error, "invalid map<K, T>")
        || contexts.iter().any(|c| contains_ignore_case(c, "SaveData"))
    {
        known = true;
        findings.notes.push("❌ Game save data is corrupted");
    } else if error.contains("Could not bind OpenGL context") {
        known = true;
        findings
            .notes
            .push("❌ GPU or installed GPU drivers do not support OpenGL 4.3");
    } else if error.contains("file is null") {
        for (prefix, cache) in [("RSX", "Shader"), ("SPU", "SPU"), ("PPU", "PPU")] {
            if context_starts(prefix) {
                known = true;
                findings.notes.push(format!(
                    "❌ {0} cache might be corrupted; right-click on the game, then `Remove` → `{0} Cache`",
                    cache
                ));
            }
        }
    } else if error.contains("Null function") && error.contains("JIT") {
        for prefix in ["PPU", "SPU"] {
            if context_starts(prefix) {
                known = true;
                findings.notes.push(format!(
                    "❌ {0} cache has issues; right-click on the game, then `Remove` → `{0} Cache`",
                    prefix
                ));
            }
        }
    } else if error.contains("no matching overloaded function found") {
        if error.contains("'mov'") {
            known = true;
            findings.supported_gpu = false;
        }
    } else if error.contains("RSX Decompiler Thread") {
        if matches!(input.build, Some(v) if v >= DECOMPILER_ISSUE_START && v < DECOMPILER_ISSUE_END) {
            known = true;
            findings
                .notes
                .push("❌ This RPCS3 build has a known regression, please update to the latest version");
        }
    } else if error.contains("graphics-hook64.dll") {
        known = true;
        findings
            .notes
            .push("❌ Please update or uninstall OBS to prevent crashes");
    } else if error.contains("bdcamvk64.dll") {
        known = true;
        findings
            .notes
            .push("❌ Please update or uninstall Bandicam to prevent crashes");
    } else if error.contains("(e=0x17): file::read") {
        findings
            .notes
            .push("❌ Storage device communication error; check your cables");
    } else if error.contains("Unknown primitive type") {
        findings
            .notes
            .push("⚠️ RSX desync detected, it's probably random");
    }
    known
}

fn error_code(error: &str) -> Option<u32> {
    let caps = VERIFICATION_ERROR.as_ref()?.captures(error)?;
    if let Some(dec) = caps.name("verification_error") {
        return dec.as_str().parse().ok();
    }
    caps.name("verification_error_hex")
        .and_then(|hex| u32::from_str_radix(hex.as_str(), 16).ok())
}

/// Error text without the trailing source location.
fn trim_location(error: &str) -> &str {
    let cut = error
        .find(" Called from")
        .or_else(|| error.find("(in file"));
    match cut {
        Some(idx) => error[..idx].trim_end(),
        None => error,
    }
}

/// Documentation link for a Windows system error code.
pub(super) fn error_code_link(code: u32) -> String {
    let range = match code {
        0..=499 => "0-499",
        500..=999 => "500-999",
        1000..=1299 => "1000-1299",
        1300..=1699 => "1300-1699",
        1700..=3999 => "1700-3999",
        4000..=5999 => "4000-5999",
        6000..=8199 => "6000-8199",
        8200..=8999 => "8200-8999",
        9000..=11999 => "9000-11999",
        12000..=15999 => "12000-15999",
        _ => return ERROR_CODES_URL.to_string(),
    };
    format!("{}--{}-", ERROR_CODES_URL, range)
}

fn corrupted_paths(label: &str, paths: &[String], findings: &mut Findings) {
    match paths {
        [] => {}
        [single] => findings
            .notes
            .push(format!("❌ Corrupted {} `{}`", label, single)),
        many => findings.sections.push(Section::new(
            format!("Corrupted {} (x{})", label, many.len()),
            many.to_vec(),
        )),
    }
}

pub(super) fn check(input: &RuleInput<'_>, findings: &mut Findings) {
    let mut codes: Vec<u32> = Vec::new();
    let errors = input.multi("fatal_error");
    if !errors.is_empty() {
        let contexts = input.multi("fatal_error_context");
        for cluster in group_similar(errors, input.ctx.similarity_threshold) {
            if known_fatal(&cluster.text, contexts, input, findings) {
                continue;
            }
            if let Some(code) = error_code(&cluster.text) {
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
            let name = if cluster.count == 1 {
                "Fatal Error".to_string()
            } else {
                format!("Fatal Error (x{})", cluster.count)
            };
            findings.sections.push(Section::new(
                name,
                vec![trim_location(&cluster.text).to_string()],
            ));
        }
    }

    corrupted_paths("save data", input.multi("bad_save_data_path"), findings);
    corrupted_paths("trophy data", input.multi("bad_trophy_data_path"), findings);
    if let Some(dir) = input.get_non_empty("save_dir_before_segfault") {
        findings
            .notes
            .push(format!("❌ Potential save data corruption in `{}`", dir));
    }

    if input.is_windows() {
        for code in codes {
            findings.notes.push(format!(
                "ℹ️ [Error 0x{:x}]({})",
                code,
                error_code_link(code)
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::*;

    #[test]
    fn similar_errors_become_one_counted_section() {
        let m = with_multi(
            model(&[]),
            "fatal_error",
            &[
                "SPU Worker 1 crashed",
                "SPU Worker 2 crashed",
                "totally unrelated error",
            ],
        );
        let eval = evaluate_plain(&m);
        let counted = eval.section("Fatal Error (x2)").unwrap();
        assert_eq!(counted.lines, vec!["SPU Worker 1 crashed"]);
        assert_eq!(
            eval.section("Fatal Error").unwrap().lines,
            vec!["totally unrelated error"]
        );
    }

    #[test]
    fn known_errors_become_notes() {
        let m = with_multi(
            model(&[]),
            "fatal_error",
            &["Failed to read graphics-hook64.dll (in file foo.cpp:12)"],
        );
        let eval = evaluate_plain(&m);
        assert!(eval.section("Fatal Error").is_none());
        assert!(eval.has_note("❌ Please update or uninstall OBS to prevent crashes"));
    }

    #[test]
    fn cache_errors_use_thread_context() {
        let m = with_multi(
            with_multi(model(&[]), "fatal_error", &["file is null"]),
            "fatal_error_context",
            &["SPU[0x01000]"],
        );
        let eval = evaluate_plain(&m);
        assert!(eval.has_note(
            "❌ SPU cache might be corrupted; right-click on the game, then `Remove` → `SPU Cache`"
        ));
    }

    #[test]
    fn windows_error_codes_get_links() {
        let m = with_multi(
            model(&[("os_type", "Windows")]),
            "fatal_error",
            &["Verification failed (e=0x5) Called from main.cpp"],
        );
        let eval = evaluate_plain(&m);
        assert_eq!(
            eval.section("Fatal Error").unwrap().lines,
            vec!["Verification failed (e=0x5)"]
        );
        assert!(eval.has_note(
            "ℹ️ [Error 0x5](https://learn.microsoft.com/en-us/windows/win32/debug/system-error-codes--0-499-)"
        ));
    }

    #[test]
    fn error_code_ranges() {
        assert!(error_code_link(1450).ends_with("--1300-1699-"));
        assert_eq!(error_code_link(70000), ERROR_CODES_URL);
        assert_eq!(error_code("failed (error=87)"), Some(87));
        assert_eq!(error_code("no code"), None);
    }

    #[test]
    fn corrupted_save_paths() {
        let one = with_multi(model(&[]), "bad_save_data_path", &["/dev_hdd0/home/00000001/savedata/BLUS1"]);
        assert!(evaluate_plain(&one)
            .has_note("❌ Corrupted save data `/dev_hdd0/home/00000001/savedata/BLUS1`"));
        let two = with_multi(model(&[]), "bad_save_data_path", &["/a", "/b"]);
        assert_eq!(
            evaluate_plain(&two).section("Corrupted save data (x2)").unwrap().lines,
            vec!["/a", "/b"]
        );
    }
}
