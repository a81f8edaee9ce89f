//! Container detection and decompression for uploaded logs.
//!
//! Every supported container is an [`ArchiveHandler`]. Detection probes the
//! handlers in a fixed order with the attachment name and its leading bytes;
//! the first handler that accepts opens a [`LogStream`] over the decompressed
//! log text.
//!
//! | Handler | Detected by |
//! |---------|-------------|
//! | [`plain_text`] | `RPCS3 v` within the first 30 bytes |
//! | [`gzip`] | `1F 8B` magic or a `.log.gz` name |
//! | [`zip_archive`] | `PK\x03\x04` magic or a `.zip` name |
//! | [`rar`] | `Rar!` signature or a `.rar` name |
//! | [`seven_zip`] | `7z\xBC\xAF\x27\x1C` signature or a `.7z` name |
//!
//! Handlers never panic on hostile input: corrupt containers surface as
//! [`ArchiveError`] and the pipeline reports them as a failed analysis.

pub mod gzip;
pub mod plain_text;
pub mod rar;
pub mod seven_zip;
pub mod zip_archive;

use std::io::Read;

use crate::config::LimitsConfig;
use crate::models::RawAttachment;

/// Number of leading bytes handed to detection.
pub const HEADER_LEN: usize = 1024;

/// Result of probing one handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// The handler will open this attachment.
    Accepted,
    /// The container is recognised but unusable; probing stops with this reason.
    Rejected(String),
    /// Not this handler's format; try the next one.
    NotMine,
}

impl Detection {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Detection::Accepted)
    }
}

/// Archive-level failure.
#[derive(Debug)]
pub enum ArchiveError {
    /// No handler recognised the attachment.
    Unsupported,
    /// A handler recognised the container but refused it.
    Rejected(String),
    /// The container holds no usable `.log` entry.
    NoLogEntry(&'static str),
    TooLarge { size: u64, limit: u64 },
    /// The log entry would decompress past `limits.unpacked_size_limit`.
    EntryTooLarge { size: u64, limit: u64 },
    Corrupt { format: &'static str, reason: String },
    Io(std::io::Error),
}

impl std::fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArchiveError::Unsupported => write!(f, "unsupported attachment format"),
            ArchiveError::Rejected(reason) => write!(f, "{}", reason),
            ArchiveError::NoLogEntry(format) => {
                write!(f, "{} archive contains no matching log entry", format)
            }
            ArchiveError::TooLarge { size, limit } => write!(
                f,
                "attachment is too large ({} bytes, limit {} bytes)",
                size, limit
            ),
            ArchiveError::EntryTooLarge { size, limit } => write!(
                f,
                "log inside the archive is too large ({} bytes unpacked, limit {} bytes)",
                size, limit
            ),
            ArchiveError::Corrupt { format, reason } => {
                write!(f, "corrupt {} archive: {}", format, reason)
            }
            ArchiveError::Io(e) => write!(f, "archive read failed: {}", e),
        }
    }
}

impl std::error::Error for ArchiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArchiveError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ArchiveError {
    fn from(e: std::io::Error) -> Self {
        ArchiveError::Io(e)
    }
}

/// Decompressed log text, read lazily by the extractor.
pub struct LogStream<'a> {
    pub reader: Box<dyn Read + Send + 'a>,
    /// Uncompressed size when the container records it.
    pub log_size: Option<u64>,
}

impl<'a> LogStream<'a> {
    pub fn new(reader: impl Read + Send + 'a, log_size: Option<u64>) -> Self {
        Self {
            reader: Box::new(reader),
            log_size,
        }
    }
}

/// One supported container format.
pub trait ArchiveHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Probes the attachment name, declared size and leading bytes.
    fn can_handle(&self, attachment: &RawAttachment) -> Detection;

    /// Opens the decompressed log. One decoder per call.
    fn open<'a>(
        &self,
        attachment: &'a RawAttachment,
        limits: &LimitsConfig,
    ) -> Result<LogStream<'a>, ArchiveError>;
}

/// All handlers in probing order.
pub fn default_handlers() -> Vec<Box<dyn ArchiveHandler>> {
    vec![
        Box::new(plain_text::PlainTextHandler),
        Box::new(gzip::GzipHandler),
        Box::new(zip_archive::ZipHandler),
        Box::new(rar::RarHandler),
        Box::new(seven_zip::SevenZipHandler),
    ]
}

/// Finds the handler for `attachment`.
///
/// A `Rejected` answer ends probing: the format was identified, so no other
/// handler should claim it.
pub fn detect<'h>(
    handlers: &'h [Box<dyn ArchiveHandler>],
    attachment: &RawAttachment,
) -> Result<&'h dyn ArchiveHandler, ArchiveError> {
    for handler in handlers {
        match handler.can_handle(attachment) {
            Detection::Accepted => {
                tracing::debug!(file = %attachment.file_name, handler = handler.name(), "format detected");
                return Ok(handler.as_ref());
            }
            Detection::Rejected(reason) => {
                tracing::debug!(file = %attachment.file_name, handler = handler.name(), %reason, "format rejected");
                return Err(ArchiveError::Rejected(reason));
            }
            Detection::NotMine => {}
        }
    }
    Err(ArchiveError::Unsupported)
}

/// Whether an archive entry name is an emulator log worth opening.
pub(crate) fn is_log_entry(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".log") && !lower.contains("tty.log")
}

pub(crate) fn has_extension(file_name: &str, extension: &str) -> bool {
    file_name.to_ascii_lowercase().ends_with(extension)
}

/// Reads at most `max_bytes` from `reader`.
///
/// The extractor treats a log that reaches the bound as truncated, so the
/// cut is not an error here.
pub(crate) fn read_bounded(reader: impl Read, max_bytes: u64) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.take(max_bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Refuses entries that must be unpacked whole and would exceed the ceiling.
pub(crate) fn check_unpacked_size(size: u64, limits: &LimitsConfig) -> Result<(), ArchiveError> {
    if size > limits.unpacked_size_limit {
        return Err(ArchiveError::EntryTooLarge {
            size,
            limit: limits.unpacked_size_limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpacked_size_ceiling() {
        let limits = LimitsConfig {
            unpacked_size_limit: 1024,
            ..LimitsConfig::default()
        };
        assert!(check_unpacked_size(1024, &limits).is_ok());
        let err = check_unpacked_size(4 * 1024 * 1024 * 1024, &limits).unwrap_err();
        assert!(matches!(err, ArchiveError::EntryTooLarge { limit: 1024, .. }));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn log_entry_filter_skips_tty_logs() {
        assert!(is_log_entry("RPCS3.log"));
        assert!(is_log_entry("logs/RPCS3.LOG"));
        assert!(!is_log_entry("TTY.log"));
        assert!(!is_log_entry("RPCS3.log.gz"));
    }

    #[test]
    fn unknown_bytes_are_unsupported() {
        let handlers = default_handlers();
        let attachment = RawAttachment::new("notes.txt", b"hello there, nothing to see".to_vec());
        let err = detect(&handlers, &attachment).err().unwrap();
        assert!(matches!(err, ArchiveError::Unsupported));
    }

    #[test]
    fn plain_log_is_detected_first() {
        let handlers = default_handlers();
        let attachment = RawAttachment::new(
            "RPCS3.log",
            b"\xEF\xBB\xBF\xC2\xB7 RPCS3 v0.0.29-15470-abcdef12 Alpha | HEAD\n".to_vec(),
        );
        let handler = detect(&handlers, &attachment).unwrap();
        assert_eq!(handler.name(), "plain");
    }

    #[test]
    fn bounded_read_stops_at_limit() {
        let data = vec![b'a'; 100];
        let out = read_bounded(&data[..], 10).unwrap();
        assert_eq!(out.len(), 10);
    }
}
