//! RAR archives. The unrar library only reads from disk, so the attachment
//! is spooled into a temporary file first. The chosen entry is unpacked next
//! to it and read back through the log size limit.

use std::fs::File;
use std::io::{Cursor, Write};

use super::{
    check_unpacked_size, has_extension, is_log_entry, read_bounded, ArchiveError, ArchiveHandler,
    Detection, LogStream,
};
use crate::config::LimitsConfig;
use crate::models::RawAttachment;

const SIGNATURE: [u8; 6] = [0x52, 0x61, 0x72, 0x21, 0x1A, 0x07];

pub struct RarHandler;

impl ArchiveHandler for RarHandler {
    fn name(&self) -> &'static str {
        "rar"
    }

    fn can_handle(&self, attachment: &RawAttachment) -> Detection {
        let header = attachment.header(SIGNATURE.len());
        if header == SIGNATURE || (header.is_empty() && has_extension(&attachment.file_name, ".rar"))
        {
            Detection::Accepted
        } else {
            Detection::NotMine
        }
    }

    fn open<'a>(
        &self,
        attachment: &'a RawAttachment,
        limits: &LimitsConfig,
    ) -> Result<LogStream<'a>, ArchiveError> {
        if attachment.declared_size > limits.attachment_size_limit {
            return Err(ArchiveError::TooLarge {
                size: attachment.declared_size,
                limit: limits.attachment_size_limit,
            });
        }
        let corrupt = |e: unrar::error::UnrarError| ArchiveError::Corrupt {
            format: "rar",
            reason: e.to_string(),
        };

        let spool_dir = tempfile::tempdir()?;
        let spool_path = spool_dir.path().join("upload.rar");
        let mut spool = File::create(&spool_path)?;
        spool.write_all(&attachment.bytes)?;
        spool.flush()?;
        drop(spool);

        let mut archive = unrar::Archive::new(&spool_path)
            .open_for_processing()
            .map_err(corrupt)?;
        while let Some(header) = archive.read_header().map_err(corrupt)? {
            let entry = header.entry();
            let name = entry.filename.to_string_lossy().into_owned();
            if entry.is_file() && is_log_entry(&name) {
                let log_size = entry.unpacked_size;
                check_unpacked_size(log_size, limits)?;
                tracing::debug!(entry = %name, log_size, "opening rar entry");
                let entry_path = spool_dir.path().join("entry.log");
                header.extract_to(&entry_path).map_err(corrupt)?;
                let data = read_bounded(File::open(&entry_path)?, limits.log_size_limit)?;
                return Ok(LogStream::new(Cursor::new(data), Some(log_size)));
            }
            archive = header.skip().map_err(corrupt)?;
        }
        tracing::warn!(file = %attachment.file_name, "no rar entries match the log criteria");
        Err(ArchiveError::NoLogEntry("rar"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_signature_and_bare_extension() {
        let signed = RawAttachment::new("upload.bin", b"Rar!\x1A\x07\x01\x00rest".to_vec());
        assert!(RarHandler.can_handle(&signed).is_accepted());
        let named = RawAttachment::new("RPCS3.rar", Vec::new());
        assert!(RarHandler.can_handle(&named).is_accepted());
        let other = RawAttachment::new("RPCS3.log", b"RPCS3 v0.0.30".to_vec());
        assert_eq!(RarHandler.can_handle(&other), Detection::NotMine);
    }

    #[test]
    fn oversized_archive_is_refused_before_spooling() {
        let mut a = RawAttachment::new("RPCS3.rar", b"Rar!\x1A\x07\x01\x00".to_vec());
        a.declared_size = 10 * 1024 * 1024;
        let err = RarHandler.open(&a, &LimitsConfig::default()).err().unwrap();
        assert!(matches!(err, ArchiveError::TooLarge { .. }));
    }

    #[test]
    fn garbage_after_signature_is_corrupt() {
        let a = RawAttachment::new("RPCS3.rar", b"Rar!\x1A\x07\x01\x00garbage-bytes".to_vec());
        let err = RarHandler.open(&a, &LimitsConfig::default()).err().unwrap();
        assert!(matches!(err, ArchiveError::Corrupt { .. }));
    }
}
