//! Diagnose progress reporting.
//!
//! `logdoc diagnose` can walk whole directories of uploads, so it reports
//! what it is working on while it goes. Progress is emitted on **stderr**
//! so the reports on stdout stay parseable for scripts.

use std::io::Write;

/// A single progress event for one diagnose run.
#[derive(Clone, Debug)]
pub enum DiagnoseEvent {
    /// Inputs collected; `total` files will be diagnosed.
    Collected { total: u64 },
    /// File `n` of `total` is being read and diagnosed.
    Started { file: String, n: u64, total: u64 },
    /// Diagnosis finished with this many notes.
    Finished { file: String, notes: u64 },
    /// The file could not be diagnosed.
    Failed { file: String, reason: String },
}

/// Reports diagnose progress. Implementations write to stderr (human or JSON).
pub trait DiagnoseProgressReporter: Send + Sync {
    fn report(&self, event: DiagnoseEvent);
}

/// Human-friendly progress on stderr: "diagnose  2 / 5  RPCS3.log.gz".
pub struct StderrProgress;

impl DiagnoseProgressReporter for StderrProgress {
    fn report(&self, event: DiagnoseEvent) {
        let line = match &event {
            DiagnoseEvent::Collected { total } => {
                format!("diagnose  {} file(s) queued\n", format_number(*total))
            }
            DiagnoseEvent::Started { file, n, total } => format!(
                "diagnose  {} / {}  {}\n",
                format_number(*n),
                format_number(*total),
                file
            ),
            DiagnoseEvent::Finished { file, notes } => {
                format!("diagnose  {}  done, {} note(s)\n", file, format_number(*notes))
            }
            DiagnoseEvent::Failed { file, reason } => {
                format!("diagnose  {}  failed: {}\n", file, reason)
            }
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl DiagnoseProgressReporter for JsonProgress {
    fn report(&self, event: DiagnoseEvent) {
        let obj = match &event {
            DiagnoseEvent::Collected { total } => serde_json::json!({
                "event": "collected",
                "total": total
            }),
            DiagnoseEvent::Started { file, n, total } => serde_json::json!({
                "event": "started",
                "file": file,
                "n": n,
                "total": total
            }),
            DiagnoseEvent::Finished { file, notes } => serde_json::json!({
                "event": "finished",
                "file": file,
                "notes": notes
            }),
            DiagnoseEvent::Failed { file, reason } => serde_json::json!({
                "event": "failed",
                "file": file,
                "reason": reason
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl DiagnoseProgressReporter for NoProgress {
    fn report(&self, _event: DiagnoseEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn DiagnoseProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl std::str::FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!("unknown progress mode '{}' (expected human, json or off)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn progress_mode_parses() {
        assert_eq!("JSON".parse::<ProgressMode>(), Ok(ProgressMode::Json));
        assert_eq!("off".parse::<ProgressMode>(), Ok(ProgressMode::Off));
        assert!("loud".parse::<ProgressMode>().is_err());
    }
}
