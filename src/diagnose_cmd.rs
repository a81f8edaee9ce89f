//! `logdoc diagnose`: collect input files, run each through the pipeline,
//! print one report per file.
//!
//! Directories are walked recursively and their files diagnosed in path
//! order. A file that fails (unsupported format, corrupt archive, too
//! small) is reported and the run moves on; the command itself fails only
//! after every file has been reported.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::amd::AmdTableProvider;
use crate::config::Config;
use crate::models::RawAttachment;
use crate::pipeline::LogPipeline;
use crate::progress::{DiagnoseEvent, ProgressMode};
use crate::report::{self, Failure, ReportEntry};
use crate::rules::EnrichmentSources;

/// Options for one `diagnose` invocation.
#[derive(Debug, Clone)]
pub struct DiagnoseOptions {
    pub json: bool,
    pub progress: ProgressMode,
}

/// Expands `paths` into the list of files to diagnose.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.exists() {
            bail!("Input does not exist: {}", path.display());
        }
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(path) {
            let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
            if entry.file_type().is_file() {
                found.push(entry.into_path());
            }
        }
        found.sort();
        files.extend(found);
    }
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub async fn run_diagnose(config: &Config, paths: &[PathBuf], options: &DiagnoseOptions) -> Result<()> {
    let files = collect_inputs(paths)?;
    if files.is_empty() {
        bail!("No files to diagnose");
    }

    let amd = AmdTableProvider::from_config(&config.amd).context("Failed to set up the AMD driver table")?;
    let pipeline = LogPipeline::new(config, Arc::new(amd), EnrichmentSources::none());
    let reporter = options.progress.reporter();
    let total = files.len() as u64;
    reporter.report(DiagnoseEvent::Collected { total });

    let mut failed = 0usize;
    for (i, path) in files.iter().enumerate() {
        let file = display_name(path);
        reporter.report(DiagnoseEvent::Started {
            file: file.clone(),
            n: i as u64 + 1,
            total,
        });

        let result = match std::fs::read(path) {
            Ok(bytes) => pipeline
                .run(RawAttachment::new(file.clone(), bytes))
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(format!("failed to read {}: {}", path.display(), e)),
        };

        match result {
            Ok(diagnosis) => {
                reporter.report(DiagnoseEvent::Finished {
                    file,
                    notes: diagnosis.notes.len() as u64,
                });
                if options.json {
                    println!("{}", report::render_json(&ReportEntry::Diagnosed(&diagnosis))?);
                } else {
                    println!("{}", report::render_text(&diagnosis));
                }
            }
            Err(error) => {
                failed += 1;
                tracing::warn!(file = %file, %error, "log analysis failed");
                reporter.report(DiagnoseEvent::Failed {
                    file: file.clone(),
                    reason: error.clone(),
                });
                let failure = Failure { file_name: file, error };
                if options.json {
                    println!("{}", report::render_json(&ReportEntry::Failed(&failure))?);
                } else {
                    println!("{}", report::render_failure(&failure));
                }
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} file(s) could not be diagnosed", failed, total);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_walked_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("b.log"), "b").unwrap();
        std::fs::write(dir.path().join("a.log"), "a").unwrap();
        std::fs::write(dir.path().join("nested").join("c.log"), "c").unwrap();

        let files = collect_inputs(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["a.log", "b.log", "c.log"]);
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_inputs(&[dir.path().join("absent.log")]).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
