//! Dump integrity: reported missing files confirmed against a reference manifest.
//!
//! The emulator logs every failed open, including files a game merely probes
//! for. Only paths that the title's reference dump actually contains count as
//! corruption.

use std::collections::HashSet;

use super::titles::P5_IDS;
use crate::normalize::NormalizedModel;

/// `/PS3_GAME/USRDIR/` plus two 8.3 name levels.
pub const DEFAULT_LONGEST_PATH: usize = "/PS3_GAME/USRDIR/".len() + (1 + 8 + 3) * 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityReport {
    /// A manifest was available and consulted.
    pub checked: bool,
    pub broken: bool,
    /// Longest file path in the dump, used for path length warnings.
    pub longest_path: usize,
}

impl IntegrityReport {
    fn unchecked(broken: bool) -> Self {
        Self {
            checked: false,
            broken,
            longest_path: DEFAULT_LONGEST_PATH,
        }
    }
}

/// Parent directory with `/` separators, or `None` at the root.
fn parent_dir(path: &str) -> Option<String> {
    let normalized = path.replace('\\', "/");
    let (parent, _) = normalized.rsplit_once('/')?;
    (!parent.is_empty()).then(|| parent.to_string())
}

pub fn check_integrity(model: &NormalizedModel, manifest: Option<&[String]>) -> IntegrityReport {
    let Some(serial) = model.get("serial") else {
        return IntegrityReport::unchecked(false);
    };

    if !serial.starts_with('B') && !serial.starts_with('M') {
        let digital = model.multi("broken_digital_filename");
        let broken = P5_IDS.contains(&serial)
            && digital
                .iter()
                .any(|f| f == "USRDIR/ps3.cpk" || f == "USRDIR/data.cpk");
        return IntegrityReport::unchecked(broken);
    }

    let Some(manifest) = manifest.filter(|m| !m.is_empty()) else {
        return IntegrityReport::unchecked(false);
    };
    let known_files: HashSet<String> = manifest.iter().map(|f| f.to_lowercase()).collect();
    let longest_path = manifest
        .iter()
        .map(|p| p.trim_end_matches('.').len())
        .max()
        .unwrap_or(DEFAULT_LONGEST_PATH);
    let report = |broken| IntegrityReport {
        checked: true,
        broken,
        longest_path,
    };

    let missing_files = model.multi("broken_filename");
    let missing_dirs = model.multi("broken_directory");
    if missing_files.is_empty() && missing_dirs.is_empty() {
        return IntegrityReport {
            checked: false,
            ..report(false)
        };
    }

    let broken_files: Vec<&String> = missing_files
        .iter()
        .filter(|f| known_files.contains(&f.to_lowercase()))
        .collect();
    if !broken_files.is_empty() {
        tracing::debug!(files = ?broken_files, serial, "broken files confirmed by manifest");
        return report(true);
    }

    let known_dirs: HashSet<String> = manifest
        .iter()
        .filter_map(|f| parent_dir(f))
        .map(|d| d.to_lowercase())
        .collect();
    let broken_dirs: Vec<&String> = missing_dirs
        .iter()
        .filter(|d| known_dirs.contains(&d.to_lowercase()))
        .collect();
    if !broken_dirs.is_empty() {
        tracing::debug!(dirs = ?broken_dirs, serial, "broken directories confirmed by manifest");
        return report(true);
    }
    report(false)
}
