use encoding_rs::{Encoding, BIG5, GB18030, GBK, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};

use crate::error::{CleanError, CleanResult};

/// Candidate encodings, tried strictly in this order. Institution exports in
/// this domain are most often UTF-8 or GB18030/GBK; UTF-16 shows up in older
/// bank tooling.
const ENCODING_CANDIDATES: &[&'static Encoding] =
    &[UTF_8, GB18030, GBK, UTF_16LE, UTF_16BE, BIG5];

/// Decode raw bytes with the first candidate encoding that succeeds without
/// replacement characters. Every attempt is logged so a failed file can be
/// diagnosed without re-deriving the chain.
pub fn decode_bytes(bytes: &[u8]) -> CleanResult<String> {
    for enc in ENCODING_CANDIDATES {
        let (text, used, had_errors) = enc.decode(bytes);
        if had_errors {
            log::debug!("decode: candidate {} rejected", enc.name());
            continue;
        }
        log::debug!("decode: candidate {} accepted (used {})", enc.name(), used.name());
        return Ok(text.into_owned());
    }
    Err(CleanError::EncodingUnresolved)
}

/// Explicit lossy fallback. Never chosen silently by `decode_bytes`; a
/// caller opting in accepts replacement characters in the output.
pub fn decode_bytes_lossy(bytes: &[u8]) -> String {
    log::warn!("decode: lossy windows-1252 fallback requested");
    WINDOWS_1252.decode_without_bom_handling(bytes).0.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_decodes_first() {
        let text = decode_bytes("姓名,金额\n张三,100".as_bytes()).unwrap();
        assert!(text.contains("张三"));
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("交易时间".as_bytes());
        let text = decode_bytes(&bytes).unwrap();
        assert_eq!(text, "交易时间");
    }

    #[test]
    fn gb18030_fallback_handles_legacy_exports() {
        let (encoded, _, _) = encoding_rs::GB18030.encode("交易对方：张三超市");
        let text = decode_bytes(&encoded).unwrap();
        assert!(text.contains("张三超市"));
    }

    #[test]
    fn lossy_fallback_is_explicit_and_total() {
        let bytes = [0xFF, 0xFE, 0xFD];
        let text = decode_bytes_lossy(&bytes);
        assert_eq!(text.chars().count(), 3);
    }
}
