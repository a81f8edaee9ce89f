//! Missing DLC licenses and undecryptable EDAT files.

use std::collections::BTreeSet;

use super::{Findings, RuleInput, Section};

const SHOWN: usize = 5;

/// Keeps list lines from being trimmed by chat renderers.
const INVISIBLE_SPACER: char = '\u{206a}';

/// Distinct, sorted file names with bogus licenses removed.
fn license_names(paths: &[String], input: &RuleInput<'_>) -> Vec<String> {
    let names: BTreeSet<String> = paths
        .iter()
        .filter_map(|p| p.rsplit(['/', '\\']).next())
        .filter(|n| !n.is_empty())
        .filter(|n| !input.ctx.known.bogus_licenses.contains(&n.to_lowercase()))
        .map(str::to_string)
        .collect();
    names.into_iter().collect()
}

/// At most [`SHOWN`] lines; a longer list ends in a count of the rest.
fn listing(names: &[String]) -> Vec<String> {
    let format = |n: &String| format!("{}`{}`", INVISIBLE_SPACER, n);
    if names.len() <= SHOWN {
        return names.iter().map(format).collect();
    }
    let mut lines: Vec<String> = names.iter().take(SHOWN - 1).map(format).collect();
    let other = names.len() - SHOWN + 1;
    lines.push(format!(
        "and {} other license{}",
        other,
        if other == 1 { "" } else { "s" }
    ));
    lines
}

pub(super) fn check(input: &RuleInput<'_>, findings: &mut Findings) {
    let raps = input.multi("rap_file");
    if !raps.is_empty() {
        let names = license_names(raps, input);
        if names.is_empty() {
            return;
        }
        findings
            .sections
            .push(Section::new("Missing Licenses", listing(&names)));

        let mut regions: BTreeSet<char> = names
            .iter()
            .filter_map(|n| n.chars().nth(9))
            .collect();
        if input.serial.chars().count() > 3 {
            regions.extend(input.serial.chars().nth(2));
        }
        if regions.len() > 1 {
            findings.notes.push(format!(
                "🤔 That is a very interesting DLC collection from {} different regions",
                regions.len()
            ));
        }
        let custom = &input.ctx.known.custom_licenses;
        if names.iter().any(|n| custom.contains(&n.to_lowercase())) {
            findings
                .notes
                .push("🤔 That is a very interesting license you're missing");
        }
        findings
            .notes
            .push("⚠️ DLC without a license is useless and may lead to game crash in some cases");
    }

    let edats = input.multi("failed_to_decrypt_edat");
    if !edats.is_empty() {
        let names = license_names(edats, input);
        if !names.is_empty() {
            findings
                .sections
                .push(Section::new("Unlock DLCs Without License", listing(&names)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::*;

    fn rap(content_id: &str) -> String {
        format!("/dev_hdd0/home/00000001/exdata/{}.rap", content_id)
    }

    #[test]
    fn short_list_is_shown_whole() {
        let raps = [rap("UP0001-BLUS30443_00-DLC0000000000002"), rap("UP0001-BLUS30443_00-DLC0000000000001")];
        let raps: Vec<&str> = raps.iter().map(String::as_str).collect();
        let m = with_multi(model(&[("serial", "BLUS30443")]), "rap_file", &raps);
        let eval = evaluate_plain(&m);
        assert_eq!(
            eval.section("Missing Licenses").unwrap().lines,
            vec![
                "\u{206a}`UP0001-BLUS30443_00-DLC0000000000001.rap`",
                "\u{206a}`UP0001-BLUS30443_00-DLC0000000000002.rap`",
            ]
        );
        assert!(eval.has_note("⚠️ DLC without a license is useless and may lead to game crash in some cases"));
        assert!(!eval.notes.iter().any(|n| n.text.contains("different regions")));
    }

    #[test]
    fn long_list_is_truncated_and_regions_counted() {
        let raps: Vec<String> = (0..7)
            .map(|i| rap(&format!("EP0001-BLES00001_00-DLC000000000000{}", i)))
            .collect();
        let raps: Vec<&str> = raps.iter().map(String::as_str).collect();
        let m = with_multi(model(&[("serial", "BLUS30443")]), "rap_file", &raps);
        let eval = evaluate_plain(&m);
        let lines = &eval.section("Missing Licenses").unwrap().lines;
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[4], "and 3 other licenses");
        assert!(eval.has_note("🤔 That is a very interesting DLC collection from 2 different regions"));
    }

    #[test]
    fn bogus_only_licenses_skip_everything() {
        let m = with_multi(
            with_multi(
                model(&[]),
                "rap_file",
                &["/dev_hdd0/home/00000001/exdata/UP0700-NPUB30932_00-NNKDLFULLGAMEPTB.rap"],
            ),
            "failed_to_decrypt_edat",
            &["/dev_hdd0/game/NPUB30932/USRDIR/dlc.edat"],
        );
        let eval = evaluate_plain(&m);
        assert!(eval.section("Missing Licenses").is_none());
        assert!(eval.section("Unlock DLCs Without License").is_none());
    }

    #[test]
    fn custom_license_and_edat_listing() {
        let m = with_multi(
            with_multi(
                model(&[("serial", "NPEB02436")]),
                "rap_file",
                &["exdata/EP4062-NPEB02436_00-PPERSONA5X000000.rap"],
            ),
            "failed_to_decrypt_edat",
            &["/dev_hdd0/game/NPEB02436/USRDIR/costume.edat"],
        );
        let eval = evaluate_plain(&m);
        assert!(eval.has_note("🤔 That is a very interesting license you're missing"));
        assert_eq!(
            eval.section("Unlock DLCs Without License").unwrap().lines,
            vec!["\u{206a}`costume.edat`"]
        );
    }
}
