//! Uncompressed log files.

use std::io::Cursor;

use super::{ArchiveError, ArchiveHandler, Detection, LogStream};
use crate::config::LimitsConfig;
use crate::models::RawAttachment;

const MARKER: &str = "RPCS3 v";
const MARKER_WINDOW: usize = 30;

pub struct PlainTextHandler;

impl ArchiveHandler for PlainTextHandler {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn can_handle(&self, attachment: &RawAttachment) -> Detection {
        if attachment
            .file_name
            .to_ascii_lowercase()
            .contains("tty.log")
        {
            return Detection::NotMine;
        }
        let header = attachment.header(MARKER_WINDOW);
        if header.len() > 10 && String::from_utf8_lossy(header).contains(MARKER) {
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
        Ok(LogStream::new(
            Cursor::new(&attachment.bytes[..]),
            Some(attachment.bytes.len() as u64),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn accepts_header_with_build_marker() {
        let a = RawAttachment::new("RPCS3.log", b"\xC2\xB7 0:00:00.000000 RPCS3 v0.0.30".to_vec());
        assert!(PlainTextHandler.can_handle(&a).is_accepted());
    }

    #[test]
    fn ignores_tty_logs_and_short_files() {
        let tty = RawAttachment::new("TTY.log", b"RPCS3 v0.0.30-1-abc Alpha".to_vec());
        assert_eq!(PlainTextHandler.can_handle(&tty), Detection::NotMine);
        let tiny = RawAttachment::new("a.log", b"RPCS3 v".to_vec());
        assert_eq!(PlainTextHandler.can_handle(&tiny), Detection::NotMine);
    }

    #[test]
    fn open_streams_the_original_bytes() {
        let a = RawAttachment::new("RPCS3.log", b"RPCS3 v0.0.30-1-abc Alpha\n".to_vec());
        let mut stream = PlainTextHandler.open(&a, &LimitsConfig::default()).unwrap();
        let mut text = String::new();
        stream.reader.read_to_string(&mut text).unwrap();
        assert!(text.starts_with("RPCS3 v0.0.30"));
    }
}
