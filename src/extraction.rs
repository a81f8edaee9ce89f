//! Sliding-window field extraction over a decompressed log stream.
//!
//! The stream is split into lines and fed through the [`crate::sections`]
//! table one line at a time. Extraction is bounded by bytes and by a
//! deadline; hitting either bound is a normal outcome that still returns the
//! values gathered so far.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::Read;
use std::time::{Duration, Instant};

use crate::config::{LimitsConfig, PiracyConfig};
use crate::models::{ExtractionModel, ParseOutcome, UniqueList};
use crate::sections::{self, ExtractorKind, SectionEnd, SECTIONS};

/// Lines kept in the window before the oldest one is processed.
pub const WINDOW_LINES: usize = 50;

const READ_CHUNK: usize = 64 * 1024;
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Lines with these fragments are emulator housekeeping, never piracy evidence.
const PIRACY_EXEMPT: &[&str] = &["not valid, removing from", "Invalid disc path"];

/// Decides whether a log line carries a piracy indicator.
pub trait PiracyFilter: Send + Sync {
    /// Returns the trigger string that matched `line`, if any.
    fn find_trigger(&self, line: &str) -> Option<String>;
}

/// Case-insensitive substring triggers.
#[derive(Debug, Clone, Default)]
pub struct TriggerList {
    /// `(original, lowercased)` pairs.
    triggers: Vec<(String, String)>,
}

impl TriggerList {
    pub fn new<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let triggers = triggers
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.trim().is_empty())
            .map(|t| {
                let lower = t.to_lowercase();
                (t, lower)
            })
            .collect();
        Self { triggers }
    }

    pub fn from_config(config: &PiracyConfig) -> Self {
        Self::new(config.triggers.iter().cloned())
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }
}

impl PiracyFilter for TriggerList {
    fn find_trigger(&self, line: &str) -> Option<String> {
        if self.triggers.is_empty() {
            return None;
        }
        let lower = line.to_lowercase();
        self.triggers
            .iter()
            .find(|(_, needle)| lower.contains(needle.as_str()))
            .map(|(original, _)| original.clone())
    }
}

/// Byte and time limits for one extraction.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionBounds {
    pub log_size_limit: u64,
    pub deadline: Instant,
}

impl ExtractionBounds {
    pub fn new(log_size_limit: u64, timeout: Duration) -> Self {
        Self {
            log_size_limit,
            deadline: Instant::now() + timeout,
        }
    }

    pub fn from_limits(limits: &LimitsConfig) -> Self {
        Self::new(limits.log_size_limit, limits.parse_timeout())
    }
}

/// Runs the state machine over `reader` and returns the extracted model.
///
/// `total_bytes` is the uncompressed size when the container knows it.
pub fn extract(
    mut reader: impl Read,
    total_bytes: Option<u64>,
    filter: &dyn PiracyFilter,
    bounds: &ExtractionBounds,
) -> ExtractionModel {
    let mut machine = StateMachine::new(filter);
    let mut pending: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];
    // Bytes of `pending` already searched for a newline.
    let mut scanned = 0;
    let mut read_bytes: u64 = 0;
    let mut first_line = true;
    let mut outcome = ParseOutcome::Success;

    loop {
        if read_bytes >= bounds.log_size_limit {
            tracing::debug!(read_bytes, limit = bounds.log_size_limit, "log size limit reached");
            outcome = ParseOutcome::SizeLimitReached;
            break;
        }
        if Instant::now() >= bounds.deadline {
            tracing::debug!(read_bytes, "extraction deadline passed");
            outcome = ParseOutcome::SizeLimitReached;
            break;
        }

        let want = (bounds.log_size_limit - read_bytes).min(READ_CHUNK as u64) as usize;
        let n = match reader.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(read_bytes, error = %e, "log stream read failed");
                outcome = ParseOutcome::UnknownError;
                break;
            }
        };
        read_bytes += n as u64;
        pending.extend_from_slice(&chunk[..n]);

        let mut start = 0;
        while let Some(offset) = pending[scanned..].iter().position(|&b| b == b'\n') {
            let end = scanned + offset;
            let mut line = &pending[start..end];
            if first_line {
                line = line.strip_prefix(UTF8_BOM).unwrap_or(line);
                first_line = false;
            }
            machine.feed(&String::from_utf8_lossy(line));
            start = end + 1;
            scanned = start;
            if machine.piracy.is_some() {
                break;
            }
        }
        pending.drain(..start);
        scanned = pending.len();
        if machine.piracy.is_some() {
            break;
        }
    }

    if machine.piracy.is_none() && !pending.is_empty() {
        let mut line = &pending[..];
        if first_line {
            line = line.strip_prefix(UTF8_BOM).unwrap_or(line);
        }
        machine.feed(&String::from_utf8_lossy(line));
    }
    machine.flush();

    let piracy = machine.piracy.take();
    let mut model = machine.finish();
    model.outcome = piracy.unwrap_or(outcome);
    model.read_bytes = read_bytes;
    model.total_bytes = total_bytes.unwrap_or(read_bytes);
    tracing::debug!(
        read_bytes,
        keys = model.single.len(),
        outcome = ?model.outcome,
        "extraction finished"
    );
    model
}

struct StateMachine<'f> {
    filter: &'f dyn PiracyFilter,
    section: usize,
    window: VecDeque<String>,
    wip: Values,
    /// The work-in-progress values have been marked complete since the last reset.
    wip_complete: bool,
    /// Snapshot taken when the previous emulator run ended.
    previous_run: Option<Values>,
    hit_stats: BTreeMap<String, u64>,
    syscalls: BTreeMap<String, BTreeSet<String>>,
    piracy: Option<ParseOutcome>,
}

#[derive(Debug, Clone, Default)]
struct Values {
    single: BTreeMap<String, String>,
    multi: BTreeMap<String, UniqueList>,
}

impl<'f> StateMachine<'f> {
    fn new(filter: &'f dyn PiracyFilter) -> Self {
        Self {
            filter,
            section: 0,
            window: VecDeque::with_capacity(WINDOW_LINES + 1),
            wip: Values::default(),
            wip_complete: false,
            previous_run: None,
            hit_stats: BTreeMap::new(),
            syscalls: BTreeMap::new(),
            piracy: None,
        }
    }

    fn feed(&mut self, line: &str) {
        if self.piracy.is_some() {
            return;
        }
        let Some(section) = SECTIONS.get(self.section) else {
            return;
        };
        if section.is_end(line) {
            self.flush();
            self.end_section(section.on_end);
            return;
        }
        if self.window.len() >= WINDOW_LINES {
            self.process_first();
            self.window.pop_front();
        }
        self.window.push_back(line.to_string());
    }

    fn flush(&mut self) {
        while !self.window.is_empty() && self.piracy.is_none() {
            self.process_first();
            self.window.pop_front();
        }
        self.window.clear();
    }

    fn end_section(&mut self, on_end: SectionEnd) {
        tracing::trace!(section = self.section, ?on_end, "section end");
        match on_end {
            SectionEnd::Next => self.section += 1,
            SectionEnd::MarkComplete => {
                self.wip_complete = true;
                self.section += 1;
            }
            SectionEnd::MarkCompleteAndReset => {
                let finished = std::mem::take(&mut self.wip);
                self.wip = carry_over(&finished);
                self.previous_run = Some(finished);
                self.wip_complete = false;
                self.section = 0;
            }
        }
    }

    fn process_first(&mut self) {
        let Some(first) = self.window.front() else {
            return;
        };
        if !PIRACY_EXEMPT.iter().any(|p| first.contains(p)) {
            if let Some(trigger) = self.filter.find_trigger(first) {
                tracing::info!(%trigger, "piracy trigger matched");
                self.piracy = Some(ParseOutcome::PiracyDetected {
                    trigger,
                    context: first.clone(),
                });
                return;
            }
        }

        let Some(section) = SECTIONS.get(self.section) else {
            return;
        };
        let mut text: Option<String> = None;
        for extractor in section.extractors.iter() {
            let Some(first) = self.window.front() else {
                return;
            };
            if !first.contains(extractor.trigger) {
                continue;
            }
            let text = text.get_or_insert_with(|| {
                self.window
                    .iter()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join("\n")
            });
            match extractor.kind {
                ExtractorKind::Syscalls => {
                    let Some(serial) = self.wip.single.get("serial") else {
                        continue;
                    };
                    if let Some(name) = extractor
                        .regex
                        .captures(text)
                        .and_then(|caps| caps.name("syscall_name"))
                    {
                        self.syscalls
                            .entry(serial.clone())
                            .or_default()
                            .insert(name.as_str().to_string());
                    }
                }
                ExtractorKind::Values => {
                    for caps in extractor.regex.captures_iter(text) {
                        if !extractor.accepts(&caps) {
                            continue;
                        }
                        for group in extractor.regex.capture_names().flatten() {
                            let Some(m) = caps.name(group) else {
                                continue;
                            };
                            if m.as_str().trim().is_empty() {
                                continue;
                            }
                            let key = sections::storage_key(group);
                            store(&mut self.wip, &mut self.hit_stats, key, m.as_str());
                        }
                    }
                }
            }
        }
    }

    fn finish(self) -> ExtractionModel {
        let values = if self.wip_complete {
            self.wip
        } else if let Some(previous) = self.previous_run {
            previous
        } else {
            self.wip
        };
        ExtractionModel {
            single: values.single,
            multi: values.multi,
            hit_stats: self.hit_stats,
            syscalls: self.syscalls,
            ..ExtractionModel::default()
        }
    }
}

fn store(values: &mut Values, hit_stats: &mut BTreeMap<String, u64>, key: &str, value: &str) {
    tracing::trace!(key, value, "extracted");
    if sections::is_multi_value(key) {
        values.multi.entry(key.to_string()).or_default().push(value);
    } else {
        values.single.insert(key.to_string(), value.to_string());
    }
    if sections::is_counted(key) {
        *hit_stats.entry(key.to_string()).or_default() += 1;
    }
}

fn carry_over(finished: &Values) -> Values {
    let mut next = Values::default();
    for key in sections::PERSISTENT_KEYS {
        if let Some(value) = finished.single.get(*key) {
            next.single.insert(key.to_string(), value.clone());
        }
        if let Some(list) = finished.multi.get(*key) {
            next.multi.insert(key.to_string(), list.clone());
        }
    }
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(log: &str) -> ExtractionModel {
        let bounds = ExtractionBounds::new(u64::MAX, Duration::from_secs(30));
        extract(log.as_bytes(), None, &TriggerList::default(), &bounds)
    }

    const HEADER: &str = "·! 0:00:00.000000 RPCS3 v0.0.29-15470-abcdef12 Alpha | HEAD\n\
Intel(R) Core(TM) i7-8700K CPU @ 3.70GHz | 12 Threads | 15.92 GiB RAM | TSC: 3.696GHz | AVX+ | FMA3\n\
Operating system: Windows, Major: 10, Minor: 0, Build: 19045, Service Pack: none, Compatibility mode: 0\n\
·! 0:00:00.000100 SYS: Firmware version: 4.89\n\
·! 0:00:00.000200 SYS: Title: Demon's Souls\n\
·! 0:00:00.000300 SYS: Serial: BLUS30443\n\
· 0:00:00.100000 SYS: Used configuration:\n\
Core:\n  PPU Decoder: Recompiler (LLVM)\n  SPU Decoder: Recompiler (ASMJIT)\n\
VFS:\n  Enable /host_root/: false\n\
Video:\n  Renderer: Vulkan\n  Resolution: 1280x720\n\
Audio:\n  Renderer: Cubeb\n\
Log: {}\n\
·! 0:00:01.000000 SYS: Boot successful.\n";

    #[test]
    fn sections_fill_their_keys() {
        let model = run(HEADER);
        assert_eq!(model.get("ppu_decoder"), Some("Recompiler (LLVM)"));
        assert_eq!(model.get("spu_decoder"), Some("Recompiler (ASMJIT)"));
        assert_eq!(model.get("renderer"), Some("Vulkan"));
        assert_eq!(model.get("audio_backend"), Some("Cubeb"));
        assert_eq!(model.get("host_root"), Some("false"));
        assert_eq!(model.get("resolution"), Some("1280x720"));
        assert_eq!(model.get("os_version_build"), Some("19045"));
        assert_eq!(model.get("serial"), Some("BLUS30443"));
        assert!(model
            .get("build_and_specs")
            .is_some_and(|b| b.starts_with("RPCS3 v0.0.29-15470-abcdef12") && b.contains("12 Threads")));
        assert_eq!(model.outcome, ParseOutcome::Success);
    }

    #[test]
    fn bom_is_skipped() {
        let log = format!("\u{feff}{}", HEADER);
        let model = run(&log);
        assert!(model.get("build_and_specs").is_some());
    }

    #[test]
    fn fatal_errors_accumulate_uniquely() {
        let log = format!(
            "{}F 0:00:05.000000 {{PPU[0x1000000] Thread (main_thread) [0x0]}} SIG: Thread terminated due to fatal error: Verification failed\n\n\
F 0:00:06.000000 {{PPU[0x1000000] Thread (main_thread) [0x0]}} SIG: Thread terminated due to fatal error: Verification failed\n\n",
            HEADER
        );
        let model = run(&log);
        assert_eq!(model.multi("fatal_error"), ["Verification failed"]);
    }

    #[test]
    fn piracy_short_circuits_with_context() {
        let log = format!("{}·! 0:00:02.000000 SYS: Loading naughty release\n·! 0:00:03 LDR: Game: /dev_hdd0/game/X\n", HEADER);
        let bounds = ExtractionBounds::new(u64::MAX, Duration::from_secs(30));
        let filter = TriggerList::new(["NAUGHTY RELEASE"]);
        let model = extract(log.as_bytes(), None, &filter, &bounds);
        match &model.outcome {
            ParseOutcome::PiracyDetected { trigger, context } => {
                assert_eq!(trigger, "NAUGHTY RELEASE");
                assert!(context.contains("Loading naughty release"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn housekeeping_lines_never_trigger_piracy() {
        let log = format!("{}E 0:00:02 SYS: Invalid disc path naughty release\n", HEADER);
        let bounds = ExtractionBounds::new(u64::MAX, Duration::from_secs(30));
        let filter = TriggerList::new(["naughty release"]);
        let model = extract(log.as_bytes(), None, &filter, &bounds);
        assert_eq!(model.outcome, ParseOutcome::Success);
    }

    #[test]
    fn byte_bound_truncates_with_partial_model() {
        let mut log = HEADER.to_string();
        for i in 0..2000 {
            log.push_str(&format!("·! 0:00:10.{:06} SYS: filler line {}\n", i, i));
        }
        let bounds = ExtractionBounds::new(4096, Duration::from_secs(30));
        let model = extract(log.as_bytes(), Some(log.len() as u64), &TriggerList::default(), &bounds);
        assert_eq!(model.outcome, ParseOutcome::SizeLimitReached);
        assert_eq!(model.read_bytes, 4096);
        assert_eq!(model.total_bytes, log.len() as u64);
        assert_eq!(model.get("renderer"), Some("Vulkan"));
    }

    #[test]
    fn passed_deadline_reports_size_limit() {
        let bounds = ExtractionBounds {
            log_size_limit: u64::MAX,
            deadline: Instant::now(),
        };
        let model = extract(HEADER.as_bytes(), None, &TriggerList::default(), &bounds);
        assert_eq!(model.outcome, ParseOutcome::SizeLimitReached);
    }

    #[test]
    fn read_error_keeps_partial_values() {
        struct Failing<'a>(&'a [u8], bool);
        impl Read for Failing<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.1 {
                    return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "corrupt"));
                }
                self.1 = true;
                let n = self.0.len().min(buf.len());
                buf[..n].copy_from_slice(&self.0[..n]);
                Ok(n)
            }
        }
        let bounds = ExtractionBounds::new(u64::MAX, Duration::from_secs(30));
        let model = extract(Failing(HEADER.as_bytes(), false), None, &TriggerList::default(), &bounds);
        assert_eq!(model.outcome, ParseOutcome::UnknownError);
        assert_eq!(model.get("renderer"), Some("Vulkan"));
    }

    #[test]
    fn trickled_long_line_is_read_whole() {
        struct Trickle<'a>(&'a [u8]);
        impl Read for Trickle<'_> {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                let n = self.0.len().min(buf.len()).min(7);
                buf[..n].copy_from_slice(&self.0[..n]);
                self.0 = &self.0[n..];
                Ok(n)
            }
        }
        let title = "X".repeat(64 * 1024);
        let log = HEADER.replace("Demon's Souls", &title);
        let bounds = ExtractionBounds::new(u64::MAX, Duration::from_secs(30));
        let model = extract(Trickle(log.as_bytes()), None, &TriggerList::default(), &bounds);
        assert_eq!(model.outcome, ParseOutcome::Success);
        assert_eq!(model.get("game_title"), Some(title.as_str()));
        assert_eq!(model.get("renderer"), Some("Vulkan"));
        assert_eq!(model.read_bytes, log.len() as u64);
    }

    #[test]
    fn second_run_keeps_persistent_keys() {
        let log = format!(
            "{}·! 0:00:09 SYS: Stopping emulator...\n·! 0:00:10 SYS: Serial: BLES00932\n·! 0:00:10 SYS: Used configuration:\nCore:\n  PPU Decoder: Interpreter (static)\nVFS:\nVideo:\n  Renderer: OpenGL\nAudio:\nLog: {{}}\n·! 0:00:11 SYS: Boot successful.\n",
            HEADER
        );
        let model = run(&log);
        assert_eq!(model.get("renderer"), Some("OpenGL"));
        assert_eq!(model.get("serial"), Some("BLES00932"));
        assert_eq!(model.get("os_version_build"), Some("19045"));
        assert!(model.get("build_and_specs").is_some());
    }

    #[test]
    fn truncated_second_run_reports_the_finished_one() {
        let log = format!(
            "{}·! 0:00:09 SYS: Stopping emulator...\n·! 0:00:10 SYS: Serial: BLES00932\n",
            HEADER
        );
        let model = run(&log);
        assert_eq!(model.get("serial"), Some("BLUS30443"));
        assert_eq!(model.get("renderer"), Some("Vulkan"));
    }

    #[test]
    fn syscalls_are_recorded_per_serial() {
        let log = format!(
            "{}·! 0:00:02 {{PPU[0x1000000] Thread (main_thread) [0x00012345]}} sceNp TODO: sceNpManagerGetStatus(status=*0x1)\n",
            HEADER
        );
        let model = run(&log);
        let names = model.syscalls.get("BLUS30443").unwrap();
        assert!(names.contains("sceNpManagerGetStatus"));
    }
}
