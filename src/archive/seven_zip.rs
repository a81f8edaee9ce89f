//! 7-Zip archives.

use std::io::{Cursor, Read};

use sevenz_rust::{Password, SevenZReader};

use super::{has_extension, is_log_entry, ArchiveError, ArchiveHandler, Detection, LogStream};
use crate::config::LimitsConfig;
use crate::models::RawAttachment;

const SIGNATURE: [u8; 6] = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

pub struct SevenZipHandler;

impl ArchiveHandler for SevenZipHandler {
    fn name(&self) -> &'static str {
        "7z"
    }

    fn can_handle(&self, attachment: &RawAttachment) -> Detection {
        let header = attachment.header(SIGNATURE.len());
        if header == SIGNATURE || (header.is_empty() && has_extension(&attachment.file_name, ".7z"))
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
        let corrupt = |e: sevenz_rust::Error| ArchiveError::Corrupt {
            format: "7z",
            reason: e.to_string(),
        };

        let len = attachment.bytes.len() as u64;
        let mut reader = SevenZReader::new(Cursor::new(&attachment.bytes[..]), len, Password::empty())
            .map_err(corrupt)?;
        let max_bytes = limits.log_size_limit;
        let mut found: Option<(Vec<u8>, u64)> = None;
        reader
            .for_each_entries(|entry, entry_reader| {
                if entry.is_directory() || !is_log_entry(entry.name()) {
                    return Ok(true);
                }
                tracing::debug!(entry = entry.name(), log_size = entry.size(), "opening 7z entry");
                let mut data = Vec::new();
                entry_reader.take(max_bytes).read_to_end(&mut data)?;
                found = Some((data, entry.size()));
                Ok(false)
            })
            .map_err(corrupt)?;

        match found {
            Some((data, log_size)) => Ok(LogStream::new(Cursor::new(data), Some(log_size))),
            None => {
                tracing::warn!(file = %attachment.file_name, "no 7z entries match the log criteria");
                Err(ArchiveError::NoLogEntry("7z"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_signature() {
        let a = RawAttachment::new("upload", vec![0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0, 4]);
        assert!(SevenZipHandler.can_handle(&a).is_accepted());
        let b = RawAttachment::new("RPCS3.7z", Vec::new());
        assert!(SevenZipHandler.can_handle(&b).is_accepted());
    }

    #[test]
    fn truncated_archive_is_corrupt() {
        let a = RawAttachment::new("RPCS3.7z", vec![0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0, 4, 1]);
        let err = SevenZipHandler.open(&a, &LimitsConfig::default()).err().unwrap();
        assert!(matches!(err, ArchiveError::Corrupt { .. }));
    }
}
