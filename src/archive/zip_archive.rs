//! Zip archives holding a log (the emulator's "compress log" output and
//! manual uploads).

use std::io::Cursor;

use super::{
    has_extension, is_log_entry, read_bounded, ArchiveError, ArchiveHandler, Detection, LogStream,
};
use crate::config::LimitsConfig;
use crate::models::RawAttachment;

const MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

pub struct ZipHandler;

impl ArchiveHandler for ZipHandler {
    fn name(&self) -> &'static str {
        "zip"
    }

    fn can_handle(&self, attachment: &RawAttachment) -> Detection {
        let header = attachment.header(super::HEADER_LEN);
        let magic = header.len() >= MAGIC.len() && header[..MAGIC.len()] == MAGIC;
        if !(magic || (header.is_empty() && has_extension(&attachment.file_name, ".zip"))) {
            return Detection::NotMine;
        }
        // The first local file header carries the first entry name.
        let first_entry = String::from_utf8_lossy(header).to_ascii_lowercase();
        if !first_entry.contains(".log") {
            return Detection::Rejected("Archive doesn't contain any logs.".to_string());
        }
        Detection::Accepted
    }

    fn open<'a>(
        &self,
        attachment: &'a RawAttachment,
        limits: &LimitsConfig,
    ) -> Result<LogStream<'a>, ArchiveError> {
        let corrupt = |e: zip::result::ZipError| ArchiveError::Corrupt {
            format: "zip",
            reason: e.to_string(),
        };
        let mut archive = zip::ZipArchive::new(Cursor::new(&attachment.bytes[..])).map_err(corrupt)?;
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(corrupt)?;
            if entry.is_dir() || !is_log_entry(entry.name()) {
                continue;
            }
            let log_size = entry.size();
            tracing::debug!(entry = entry.name(), log_size, "opening zip entry");
            let data = read_bounded(entry, limits.log_size_limit)?;
            return Ok(LogStream::new(Cursor::new(data), Some(log_size)));
        }
        tracing::warn!(file = %attachment.file_name, "no zip entries match the log criteria");
        Err(ArchiveError::NoLogEntry("zip"))
    }
}
