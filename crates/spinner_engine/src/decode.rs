use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMarkup {
    pub text: String,
    pub encoding_label: String,
    /// Malformed sequences were replaced with U+FFFD.
    pub had_errors: bool,
}

/// Decode raw bytes into UTF-8 using: BOM -> Content-Type charset -> chardetng fallback.
///
/// Used for whole documents, whose encoding may be declared or must be guessed.
/// Decoding never fails; malformed input is replaced and flagged through
/// `had_errors`.
pub fn decode_markup(bytes: &[u8], content_type: Option<&str>) -> DecodedMarkup {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

/// Decode raw bytes as UTF-8 whatever the headers claim, dropping a UTF-8 BOM.
///
/// This is how a browser's `Response.text()` reads a body.
pub fn decode_utf8(bytes: &[u8]) -> DecodedMarkup {
    let (text, had_errors) = UTF_8.decode_with_bom_removal(bytes);
    DecodedMarkup {
        text: text.into_owned(),
        encoding_label: UTF_8.name().to_string(),
        had_errors,
    }
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim_matches([' ', '"', '\''].as_ref()).to_string())
        })
        .next()
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> DecodedMarkup {
    let (text, _, had_errors) = enc.decode(bytes);
    DecodedMarkup {
        text: text.into_owned(),
        encoding_label: enc.name().to_string(),
        had_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_charset_wins_over_detection() {
        let latin1 = [0x63, 0x61, 0x66, 0xE9];
        let decoded = decode_markup(&latin1, Some("text/html; Charset=\"ISO-8859-1\""));
        assert_eq!(decoded.text, "café");
        assert_eq!(decoded.encoding_label, "windows-1252");
        assert!(!decoded.had_errors);
    }

    #[test]
    fn bom_overrides_header() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("⁉️".as_bytes());
        let decoded = decode_markup(&bytes, Some("text/html; charset=iso-8859-1"));
        assert_eq!(decoded.text, "⁉️");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn utf8_decoding_ignores_declared_charset() {
        let decoded = decode_utf8("\u{FEFF}<i>café</i>".as_bytes());
        assert_eq!(decoded.text, "<i>café</i>");
        assert_eq!(decoded.encoding_label, "UTF-8");
        assert!(!decoded.had_errors);

        let decoded = decode_utf8(&[0x63, 0x61, 0x66, 0xE9]);
        assert_eq!(decoded.text, "caf\u{FFFD}");
        assert!(decoded.had_errors);
    }

    #[test]
    fn malformed_utf8_is_replaced_not_rejected() {
        let decoded = decode_markup(b"<p>\xFF</p>", Some("text/html; charset=utf-8"));
        assert!(decoded.had_errors);
        assert_eq!(decoded.text, "<p>\u{FFFD}</p>");
    }
}
