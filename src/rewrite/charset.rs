//! Decoding buffered HTML into text.

use axum::http::HeaderValue;
use encoding_rs::{Encoding, UTF_8};

/// Decode `bytes` using the charset declared in `content_type`.
///
/// Labels are resolved the way browsers resolve them, so `iso-8859-1` and
/// `us-ascii` decode as windows-1252. A missing or unknown label means UTF-8.
/// Malformed sequences become U+FFFD.
pub fn decode_text(bytes: &[u8], content_type: Option<&HeaderValue>) -> String {
    let charset = content_type
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<mime::Mime>().ok())
        .and_then(|m| m.get_param(mime::CHARSET).map(|c| c.as_str().to_string()));

    let encoding = match charset.as_deref() {
        Some(label) => Encoding::for_label(label.as_bytes()).unwrap_or_else(|| {
            tracing::debug!(charset = label, "Unknown charset, decoding as UTF-8");
            UTF_8
        }),
        None => UTF_8,
    };

    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = encoding.name(), "Malformed bytes replaced while decoding HTML");
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8], content_type: &'static str) -> String {
        decode_text(bytes, Some(&HeaderValue::from_static(content_type)))
    }

    #[test]
    fn defaults_to_utf8() {
        assert_eq!(decode_text("héllo".as_bytes(), None), "héllo");
        assert_eq!(decode("héllo".as_bytes(), "text/html"), "héllo");
    }

    #[test]
    fn decodes_latin1() {
        assert_eq!(decode(&[0x68, 0xe9], "text/html; charset=ISO-8859-1"), "hé");
    }

    #[test]
    fn decodes_windows_1252() {
        let bytes = [0x93, b'h', b'i', 0x94, b' ', 0xe9];
        assert_eq!(decode(&bytes, "text/html; charset=windows-1252"), "\u{201c}hi\u{201d} é");
    }

    #[test]
    fn decodes_multibyte_legacy_charsets() {
        assert_eq!(decode(&[0x93, 0xfa, 0x96, 0x7b], "text/html; charset=Shift_JIS"), "日本");
        assert_eq!(decode(&[0xc7, 0xd1], "text/html; charset=euc-kr"), "한");
    }

    #[test]
    fn unknown_charset_falls_back_to_utf8() {
        assert_eq!(decode("héllo".as_bytes(), "text/html; charset=x-made-up"), "héllo");
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(decode(&[0x61, 0xff], "text/html; charset=utf-8"), "a\u{fffd}");
    }
}
