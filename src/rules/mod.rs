//! Diagnostic rule engine.
//!
//! [`evaluate`] is a pure, synchronous function of a [`NormalizedModel`] and a
//! [`RuleContext`]. Everything that needs the network or storage (title file
//! manifests, release metadata, compatibility status) is gathered beforehand
//! into an [`Enrichment`] snapshot, so a failed lookup only means the rules
//! that read it stay silent.
//!
//! # Output
//!
//! ```text
//!   NormalizedModel ──┐
//!                     ├──► rule families ──► Findings ──► Evaluation
//!   RuleContext  ─────┘     (append notes,               ├─ sections (in render order)
//!                             push sections)             └─ notes (deduped, glyph-ranked)
//! ```
//!
//! Notes are ordered by the glyph that starts them, then by evaluation order:
//!
//! | Rank | Glyph |
//! |------|-------|
//! | 0 | 😱 |
//! | 1 | 💢 |
//! | 2 | ‼️ |
//! | 3 | ❗ |
//! | 4 | ❌ |
//! | 5 | ⁉️ |
//! | 6 | ⚠️ |
//! | 7 | ❔ |
//! | 8 | ✅ |
//! | 9 | ℹ️ |
//! | 69 | anything else |
//!
//! U+FE0F variation selectors are ignored when matching, so `⚠` and `⚠️`
//! rank the same.

pub mod context;
mod fatal;
mod freshness;
mod general;
mod integrity;
mod licenses;
mod patches;
mod settings;
mod summary;
mod titles;

use std::collections::HashSet;

use serde::Serialize;

use crate::normalize::NormalizedModel;
use crate::version::Version;

pub use context::{
    CompatStatus, Enrichment, EnrichmentSources, KnownIds, ReleaseInfo, ReleaseInfoSource,
    RuleContext, TitleInfo, TitleInfoSource, TitleManifestSource,
};
pub use freshness::{describe_delta, is_too_old, same_commits};
pub use integrity::{check_integrity, IntegrityReport};
pub use patches::{parse_patches, PatchCounts};
pub use titles::{builtin_groups, TitleGroup};

/// Severity glyphs, most severe first.
pub const GLYPH_PRIORITY: [&str; 10] = [
    "😱", "💢", "‼️", "❗", "❌", "⁉️", "⚠️", "❔", "✅", "ℹ️",
];

/// Rank given to a glyph that is not in [`GLYPH_PRIORITY`].
pub const UNRANKED: usize = 69;

const VARIATION_SELECTOR: char = '\u{fe0f}';

/// Position of `glyph` in [`GLYPH_PRIORITY`], or [`UNRANKED`].
pub fn glyph_rank(glyph: &str) -> usize {
    let glyph = glyph.trim_end_matches(VARIATION_SELECTOR);
    GLYPH_PRIORITY
        .iter()
        .position(|p| p.trim_end_matches(VARIATION_SELECTOR) == glyph)
        .unwrap_or(UNRANKED)
}

/// One diagnostic annotation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Note {
    pub glyph: String,
    pub text: String,
}

impl Note {
    /// Splits a rendered line into its leading glyph and the message.
    pub fn new(line: impl Into<String>) -> Self {
        let line = line.into();
        match line.split_once(' ') {
            Some((glyph, text)) => Self {
                glyph: glyph.to_string(),
                text: text.to_string(),
            },
            None => Self {
                glyph: String::new(),
                text: line,
            },
        }
    }

    pub fn rank(&self) -> usize {
        glyph_rank(&self.glyph)
    }

    /// The note as it is displayed: glyph, space, message.
    pub fn line(&self) -> String {
        if self.glyph.is_empty() {
            self.text.clone()
        } else {
            format!("{} {}", self.glyph, self.text)
        }
    }
}

impl std::fmt::Display for Note {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.line())
    }
}

/// Collects notes in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct Notes(Vec<Note>);

impl Notes {
    pub fn push(&mut self, line: impl Into<String>) {
        self.0.push(Note::new(line));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Drops repeated lines, keeping the first, then stable-sorts by rank.
    pub fn into_sorted(self) -> Vec<Note> {
        let mut seen = HashSet::new();
        let mut notes: Vec<Note> = self
            .0
            .into_iter()
            .filter(|note| seen.insert(note.line()))
            .collect();
        notes.sort_by_key(Note::rank);
        notes
    }
}

/// A named block of rendered lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub name: String,
    pub lines: Vec<String>,
}

impl Section {
    pub fn new(name: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            name: name.into(),
            lines,
        }
    }
}

/// Result of evaluating one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    /// Structured sections in render order. The notes are kept apart.
    pub sections: Vec<Section>,
    pub notes: Vec<Note>,
}

impl Evaluation {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn has_note(&self, line: &str) -> bool {
        self.notes.iter().any(|n| n.line() == line)
    }
}

/// Mutable accumulator shared by the rule families.
pub(crate) struct Findings {
    /// Lines for the `Notes` block.
    pub notes: Notes,
    /// Lines for `Important Settings to Review`.
    pub settings: Notes,
    pub sections: Vec<Section>,
    /// Cleared by rules that find the GPU or its driver unusable.
    pub supported_gpu: bool,
}

/// Read-only inputs shared by the rule families.
pub(crate) struct RuleInput<'a> {
    pub model: &'a NormalizedModel,
    pub ctx: &'a RuleContext<'a>,
    /// Empty when the log names no title.
    pub serial: &'a str,
    /// Emulator version of an official build.
    pub build: Option<Version>,
    pub thread_count: Option<u32>,
    pub ppu: PatchCounts,
    /// Patch descriptions from `Applied patch` lines.
    pub patch_names: &'a [String],
}

impl<'a> RuleInput<'a> {
    fn new(model: &'a NormalizedModel, ctx: &'a RuleContext<'a>) -> Self {
        Self {
            model,
            ctx,
            serial: model.get("serial").unwrap_or(""),
            build: model.rpcs3_version(),
            thread_count: model.get("thread_count").and_then(|t| t.parse().ok()),
            ppu: parse_patches(model.multi("ppu_patch")),
            patch_names: model.multi("patch_desc"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.model.get(key)
    }

    pub fn get_non_empty(&self, key: &str) -> Option<&'a str> {
        self.model.get_non_empty(key)
    }

    pub fn multi(&self, key: &str) -> &'a [String] {
        self.model.multi(key)
    }

    pub fn on(&self, key: &str) -> bool {
        self.model.is_enabled(key)
    }

    pub fn off(&self, key: &str) -> bool {
        self.model.is_disabled(key)
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn version(&self, key: &str) -> Option<Version> {
        self.get(key).and_then(Version::parse)
    }

    pub fn is_windows(&self) -> bool {
        self.get("os_type") == Some("Windows")
    }

    pub fn is_linux(&self) -> bool {
        self.get("os_type") == Some("Linux")
    }

    /// True when the official build is known and older than `fixed`.
    pub fn build_before(&self, fixed: Version) -> bool {
        matches!(self.build, Some(v) if v < fixed)
    }

    pub fn has_patch_name(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.patch_names
            .iter()
            .any(|n| n.to_lowercase().contains(&needle))
    }
}

/// Runs every rule family against `model`.
pub fn evaluate(model: &NormalizedModel, ctx: &RuleContext<'_>) -> Evaluation {
    let input = RuleInput::new(model, ctx);
    let mut findings = Findings {
        notes: Notes::default(),
        settings: Notes::default(),
        sections: Vec::new(),
        supported_gpu: model.get_non_empty("rsx_unsupported_gpu").is_none()
            && !model.is_disabled("supported_gpu"),
    };

    summary::build_info(&input, &mut findings);
    summary::settings_columns(&input, &mut findings);
    summary::libraries(&input, &mut findings);
    fatal::check(&input, &mut findings);
    general::check(&input, &mut findings);
    freshness::check(&input, &mut findings);
    general::check_title(&input, &mut findings);
    settings::check(&input, &mut findings);
    summary::applied_patches(&input, &mut findings);
    licenses::check(&input, &mut findings);

    tracing::debug!(
        serial = input.serial,
        notes = findings.notes.len(),
        settings = findings.settings.len(),
        sections = findings.sections.len(),
        "rules evaluated"
    );
    Evaluation {
        sections: findings.sections,
        notes: findings.notes.into_sorted(),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::ExtractionModel;

    /// A normalized model built straight from key/value pairs.
    pub fn model(pairs: &[(&str, &str)]) -> NormalizedModel {
        let mut raw = ExtractionModel::default();
        for (k, v) in pairs {
            raw.set(*k, *v);
        }
        NormalizedModel {
            model: raw,
            amd_lookup_missed: false,
        }
    }

    pub fn with_multi(mut model: NormalizedModel, key: &str, values: &[&str]) -> NormalizedModel {
        for v in values {
            model.model.push_multi(key, *v);
        }
        model
    }

    pub fn evaluate_plain(model: &NormalizedModel) -> Evaluation {
        let known = KnownIds::builtin();
        let enrichment = Enrichment::default();
        let freshness = crate::config::FreshnessConfig::default();
        let ctx = RuleContext::new(&known, &enrichment, &freshness);
        evaluate(model, &ctx)
    }

    pub fn settings_lines(eval: &Evaluation) -> Vec<String> {
        eval.section(settings::SECTION)
            .map(|s| s.lines.clone())
            .unwrap_or_default()
    }
}
