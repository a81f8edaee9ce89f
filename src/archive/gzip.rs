//! Gzip-compressed logs (`RPCS3.log.gz`), decoded lazily.

use std::io::Cursor;

use flate2::read::GzDecoder;

use super::{has_extension, ArchiveError, ArchiveHandler, Detection, LogStream};
use crate::config::LimitsConfig;
use crate::models::RawAttachment;

const MAGIC: [u8; 2] = [0x1F, 0x8B];

pub struct GzipHandler;

impl ArchiveHandler for GzipHandler {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn can_handle(&self, attachment: &RawAttachment) -> Detection {
        let header = attachment.header(MAGIC.len());
        if header == MAGIC
            || (header.is_empty() && has_extension(&attachment.file_name, ".log.gz"))
        {
            Detection::Accepted
        } else {
            Detection::NotMine
        }
    }

    fn open<'a>(
        &self,
        attachment: &'a RawAttachment,
        _limits: &LimitsConfig,
    ) -> Result<LogStream<'a>, ArchiveError> {
        // The uncompressed size is only known after the trailer, so the
        // extractor tracks progress against the compressed size instead.
        Ok(LogStream::new(
            GzDecoder::new(Cursor::new(&attachment.bytes[..])),
            None,
        ))
    }
}
