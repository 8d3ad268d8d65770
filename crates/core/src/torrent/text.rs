//! Display decoding for torrent text fields.
//!
//! Names, comments and path components are byte strings in whatever encoding
//! the torrent declares, and legacy torrents often lie about it. Decoding here
//! never fails: declared encoding, then cp1251, then a statistical guess.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1251};

/// Decode a text field for display.
pub fn decode_text(bytes: &[u8], declared: Option<&str>) -> String {
    let declared = declared
        .and_then(|label| Encoding::for_label(label.trim().as_bytes()))
        .unwrap_or(UTF_8);

    if let Some(text) = strict_decode(declared, bytes) {
        return text.into_owned();
    }

    if declared != WINDOWS_1251 {
        if let Some(text) = strict_decode(WINDOWS_1251, bytes) {
            return text.into_owned();
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guessed = detector.guess(None, true);
    let (text, _, _) = guessed.decode(bytes);
    text.into_owned()
}

/// Decode without replacement, rejecting output that contains C1 control
/// characters (single-byte encodings map every byte, so an unmapped byte shows
/// up as U+0080..U+009F instead of an error).
fn strict_decode<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    let text = encoding.decode_without_bom_handling_and_without_replacement(bytes)?;
    if text.chars().any(|c| ('\u{80}'..='\u{9f}').contains(&c)) {
        return None;
    }
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        assert_eq!(decode_text("hello wörld".as_bytes(), None), "hello wörld");
    }

    #[test]
    fn test_cp1251_fallback() {
        // "Привет" in windows-1251
        let bytes = [0xcf, 0xf0, 0xe8, 0xe2, 0xe5, 0xf2];
        assert_eq!(decode_text(&bytes, Some("UTF-8")), "Привет");
    }

    #[test]
    fn test_declared_encoding_wins() {
        // "Привет" in KOI8-R
        let bytes = [0xf0, 0xd2, 0xc9, 0xd7, 0xc5, 0xd4];
        assert_eq!(decode_text(&bytes, Some("koi8-r")), "Привет");
    }

    #[test]
    fn test_unknown_label_falls_back_to_utf8() {
        assert_eq!(decode_text(b"plain", Some("no-such-encoding")), "plain");
    }

    #[test]
    fn test_never_fails_on_garbage() {
        let bytes = [0xff, 0xfe, 0x98, 0x00, 0x81];
        let text = decode_text(&bytes, None);
        assert!(!text.is_empty());
    }
}
