//! Plain-text and JSON rendering of a [`Diagnosis`].
//!
//! Text output mirrors what a chat front-end would show: one block per
//! section in evaluation order, then the ranked `Notes` block.

use serde::Serialize;

use crate::models::ParseOutcome;
use crate::pipeline::Diagnosis;

/// A file that could not be diagnosed, as it appears in JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub file_name: String,
    pub error: String,
}

/// One line of JSON output per input file.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ReportEntry<'a> {
    Diagnosed(&'a Diagnosis),
    Failed(&'a Failure),
}

pub fn render_text(diagnosis: &Diagnosis) -> String {
    let mut out = format!("== {} ==\n", diagnosis.file_name);

    if let Some(piracy) = &diagnosis.piracy {
        out.push_str("Log analysis stopped: piracy trigger found\n");
        out.push_str(&format!("  trigger: {}\n", piracy.trigger));
        out.push_str(&format!("  line:    {}\n", piracy.context.trim_end()));
        return out;
    }

    for section in &diagnosis.sections {
        out.push('\n');
        out.push_str(&section.name);
        out.push('\n');
        for line in &section.lines {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }

    if !diagnosis.notes.is_empty() {
        out.push_str("\nNotes\n");
        for note in &diagnosis.notes {
            out.push_str("  ");
            out.push_str(&note.line());
            out.push('\n');
        }
    }

    if diagnosis.sections.is_empty() && diagnosis.notes.is_empty() {
        out.push_str("No issues found\n");
    }
    if let ParseOutcome::UnknownError = diagnosis.outcome {
        out.push_str("\n(log could not be read to the end)\n");
    }
    out
}

pub fn render_failure(failure: &Failure) -> String {
    format!(
        "== {} ==\nLog analysis failed: {}\n",
        failure.file_name, failure.error
    )
}

pub fn render_json(entry: &ReportEntry<'_>) -> serde_json::Result<String> {
    serde_json::to_string(entry)
}
