//! Build freshness: is the logged emulator build worth updating?

use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{Findings, ReleaseInfo, RuleInput};
use crate::config::FreshnessConfig;
use crate::version::Version;

static BUILD_IN_UPDATE: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"rpcs3-v(?<version>(\d|\.)+)(-(?<build>\d+))?-(?<commit>[0-9a-f]+)_")
        .map_err(|e| tracing::error!(error = %e, "update link pattern failed to compile"))
        .ok()
});

/// Severity tiers by age, oldest first.
const AGE_TIERS: [(i64, &str); 4] = [(365, "😱"), (180, "💢"), (60, "‼️"), (30, "❗")];

/// Commit hashes match when one is a prefix of the other.
pub fn same_commits(a: Option<&str>, b: Option<&str>) -> bool {
    let a = a.unwrap_or("");
    let b = b.unwrap_or("");
    match (a.is_empty(), b.is_empty()) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        _ => {
            let len = a.len().min(b.len());
            a.get(..len) == b.get(..len)
        }
    }
}

/// The latest build as encoded in its download link.
struct LatestBuild {
    version: Option<Version>,
    build: Option<u32>,
    commit: String,
}

fn parse_link(link: &str) -> Option<LatestBuild> {
    let lower = link.to_lowercase();
    let caps = BUILD_IN_UPDATE.as_ref()?.captures(&lower)?;
    Some(LatestBuild {
        version: caps.name("version").and_then(|m| Version::parse(m.as_str())),
        build: caps.name("build").and_then(|m| m.as_str().parse().ok()),
        commit: caps.name("commit").map_or("", |m| m.as_str()).to_string(),
    })
}

/// Whether the build described by `version`, `build_number` and `commit`
/// lags too far behind `release`.
pub fn is_too_old(
    version: Option<&str>,
    build_number: Option<&str>,
    commit: Option<&str>,
    release: &ReleaseInfo,
    config: &FreshnessConfig,
) -> bool {
    let Some(latest) = parse_link(&release.latest_download) else {
        return false;
    };
    if let Some(delta) = release.update_delta() {
        if delta < Duration::days(config.build_time_difference_days) {
            return false;
        }
    }
    if let (Some(logged), Some(newest)) = (version.and_then(Version::parse), latest.version) {
        if logged < newest {
            return true;
        }
        let logged_build = build_number.and_then(|b| b.parse::<u32>().ok());
        if let (Some(logged_build), Some(newest_build)) = (logged_build, latest.build) {
            return logged_build.saturating_add(config.build_number_difference) < newest_build;
        }
        return false;
    }
    !same_commits(commit, Some(&latest.commit))
}

fn plural(n: i64, unit: &str) -> String {
    format!("{} {}{}", n, unit, if n == 1 { "" } else { "s" })
}

/// `3 weeks`, `1 month`, `2 years`.
pub fn describe_delta(delta: Duration) -> String {
    let days = delta.num_days();
    if delta < Duration::minutes(1) {
        plural(delta.num_seconds(), "second")
    } else if delta < Duration::hours(1) {
        plural(delta.num_minutes(), "minute")
    } else if delta < Duration::days(1) {
        plural(delta.num_hours(), "hour")
    } else if days < 7 {
        plural(days, "day")
    } else if days < 30 {
        plural(days / 7, "week")
    } else if days < 365 {
        plural(days / 30, "month")
    } else {
        plural(days / 365, "year")
    }
}

fn local_build(input: &RuleInput<'_>, findings: &mut Findings) {
    if input.get("build_unknown") != Some("local_build") {
        return;
    }
    let note = if input
        .get_non_empty("build_commit")
        .is_some_and(|c| c.contains("AUR"))
    {
        "❗ Unofficial AUR builds are not supported"
    } else if input.is_linux() && input.get("build_number") == Some("1") {
        "❗ Flatpak builds are not supported"
    } else if input.is_linux() && input.ctx.enrichment.release.is_some() {
        "⚠️ Please try the official AppImage instead of AUR build if you experience issues"
    } else {
        "❗ Unofficial builds are not supported"
    };
    findings.notes.push(note);
}

pub(super) fn check(input: &RuleInput<'_>, findings: &mut Findings) {
    let outdated = input
        .ctx
        .enrichment
        .release
        .as_ref()
        .filter(|_| input.get_non_empty("build_and_specs").is_some())
        .filter(|release| {
            is_too_old(
                input.get("build_version"),
                input.get("build_number"),
                input.get_non_empty("build_commit"),
                release,
                input.ctx.freshness,
            )
        });

    if let Some(release) = outdated {
        let branch = input
            .get("build_branch")
            .unwrap_or("")
            .to_lowercase();
        let official = matches!(branch.as_str(), "master" | "head" | "spu_perf")
            || (branch.is_empty() && release.current_build_time.is_some());
        if official {
            let (prefix, age) = match release.update_delta() {
                Some(delta) => {
                    let prefix = AGE_TIERS
                        .iter()
                        .find(|(days, _)| delta > Duration::days(*days))
                        .map_or("⚠️", |(_, glyph)| glyph);
                    (prefix, format!("{} old", describe_delta(delta)))
                }
                None => ("⚠️", "outdated".to_string()),
            };
            if !input.is_windows() || input.build.is_none() {
                findings.notes.push(format!(
                    "{} This RPCS3 build is {}, please consider updating it",
                    prefix, age
                ));
            }
            if branch == "spu_perf" {
                findings.notes.push(
                    "😱 `spu_perf` build is obsolete, current master build offers at least the same level of performance and includes many additional improvements",
                );
            }
        }
    }

    local_build(input, findings);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FreshnessConfig;
    use crate::rules::test_support::model;
    use crate::rules::{evaluate, Enrichment, Evaluation, KnownIds, RuleContext};
    use chrono::{TimeZone, Utc};

    const LINK: &str = "https://github.com/RPCS3/rpcs3-binaries-win/releases/download/build-abc/rpcs3-v0.0.32-16500-abcdef12_win64.7z";

    fn release(age_days: Option<i64>) -> ReleaseInfo {
        let latest = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        ReleaseInfo {
            latest_download: LINK.to_string(),
            latest_build_time: Some(latest),
            current_build_time: age_days.map(|d| latest - Duration::days(d)),
        }
    }

    fn run(pairs: &[(&str, &str)], release: ReleaseInfo) -> Evaluation {
        let known = KnownIds::builtin();
        let enrichment = Enrichment {
            release: Some(release),
            ..Enrichment::default()
        };
        let freshness = FreshnessConfig::default();
        evaluate(&model(pairs), &RuleContext::new(&known, &enrichment, &freshness))
    }

    fn linux_build(branch: &'static str) -> Vec<(&'static str, &'static str)> {
        vec![
            ("build_and_specs", "RPCS3 v0.0.20-12000-deadbeef Alpha"),
            ("build_version", "0.0.20"),
            ("build_number", "12000"),
            ("build_commit", "deadbeef"),
            ("build_branch", branch),
            ("os_type", "Linux"),
        ]
    }

    #[test]
    fn commits_compare_by_prefix() {
        assert!(same_commits(Some("abcdef12"), Some("abcdef1234567")));
        assert!(!same_commits(Some("abcdef12"), Some("abcdee12")));
        assert!(same_commits(None, Some("")));
        assert!(!same_commits(None, Some("abc")));
    }

    #[test]
    fn version_and_build_window() {
        let config = FreshnessConfig::default();
        let info = release(Some(30));
        assert!(is_too_old(Some("0.0.31"), Some("16600"), None, &info, &config));
        assert!(!is_too_old(Some("0.0.32"), Some("16495"), None, &info, &config));
        assert!(is_too_old(Some("0.0.32"), Some("16400"), None, &info, &config));
        // unparseable versions fall back to commits
        assert!(!is_too_old(None, None, Some("abcdef12"), &info, &config));
        assert!(is_too_old(None, None, Some("12345678"), &info, &config));
        // recent builds are never flagged
        assert!(!is_too_old(Some("0.0.1"), None, None, &release(Some(1)), &config));
    }

    #[test]
    fn age_tiers() {
        let line = |days: i64| {
            run(&linux_build("master"), release(Some(days)))
                .notes
                .into_iter()
                .map(|n| n.line())
                .find(|l| l.contains("This RPCS3 build"))
        };
        assert_eq!(
            line(400).as_deref(),
            Some("😱 This RPCS3 build is 1 year old, please consider updating it")
        );
        assert!(line(200).unwrap().starts_with("💢 "));
        assert!(line(90).unwrap().starts_with("‼️ "));
        assert_eq!(
            line(45).as_deref(),
            Some("❗ This RPCS3 build is 1 month old, please consider updating it")
        );
        assert_eq!(
            line(14).as_deref(),
            Some("⚠️ This RPCS3 build is 2 weeks old, please consider updating it")
        );
    }

    #[test]
    fn unknown_age_reads_outdated() {
        let eval = run(&linux_build("HEAD"), release(None));
        assert!(eval.has_note("⚠️ This RPCS3 build is outdated, please consider updating it"));
    }

    #[test]
    fn spu_perf_branch() {
        let eval = run(&linux_build("spu_perf"), release(Some(10)));
        assert!(eval.notes.iter().any(|n| n.text.starts_with("`spu_perf` build is obsolete")));
    }

    #[test]
    fn custom_branches_are_not_nagged() {
        let eval = run(&linux_build("feature-x"), release(Some(400)));
        assert!(!eval.notes.iter().any(|n| n.text.contains("This RPCS3 build")));
    }

    #[test]
    fn local_builds() {
        let pairs = [
            ("build_and_specs", "RPCS3 v0.0.20-1-deadbeef Alpha"),
            ("build_number", "1"),
            ("build_unknown", "local_build"),
            ("os_type", "Linux"),
        ];
        let eval = run(&pairs, release(Some(1)));
        assert!(eval.has_note("❗ Flatpak builds are not supported"));
    }

    #[test]
    fn delta_descriptions() {
        assert_eq!(describe_delta(Duration::seconds(1)), "1 second");
        assert_eq!(describe_delta(Duration::minutes(5)), "5 minutes");
        assert_eq!(describe_delta(Duration::hours(23)), "23 hours");
        assert_eq!(describe_delta(Duration::days(6)), "6 days");
        assert_eq!(describe_delta(Duration::days(29)), "4 weeks");
        assert_eq!(describe_delta(Duration::days(364)), "12 months");
        assert_eq!(describe_delta(Duration::days(800)), "2 years");
    }
}
