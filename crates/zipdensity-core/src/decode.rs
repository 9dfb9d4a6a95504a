//! Best-effort decoding of fetched page bytes.
//!
//! The reference host does not reliably declare its charset, so the decoder
//! walks an ordered chain of encodings and takes the first one that decodes
//! the whole payload without a malformed sequence. Decoding never fails: if
//! every candidate rejects the bytes, the payload is decoded as UTF-8 with
//! U+FFFD replacement.

use encoding_rs::Encoding;

/// Labels tried in order after any declared charset.
///
/// Per the WHATWG Encoding Standard, `latin1` and `iso-8859-1` resolve to
/// windows-1252, so the chain collapses to two distinct decoders.
pub const FALLBACK_LABELS: &[&str] = &["utf-8", "latin1", "windows-1252", "iso-8859-1"];

/// Text decoded from a page, with the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    /// Canonical name of the encoding used (e.g. `"UTF-8"`, `"windows-1252"`).
    pub encoding: &'static str,
    /// True if no candidate decoded cleanly and U+FFFD replacement was used.
    pub lossy: bool,
}

/// Decode `bytes`, preferring `declared` (a charset label such as the
/// `charset` parameter of a `Content-Type` header) when it is recognised.
pub fn decode_page(bytes: &[u8], declared: Option<&str>) -> DecodedText {
    let declared = declared.and_then(|label| Encoding::for_label(label.trim().as_bytes()));

    let mut tried: Vec<&'static Encoding> = Vec::with_capacity(FALLBACK_LABELS.len() + 1);
    let candidates = declared.into_iter().chain(
        FALLBACK_LABELS
            .iter()
            .filter_map(|label| Encoding::for_label(label.as_bytes())),
    );

    for encoding in candidates {
        if tried.contains(&encoding) {
            continue;
        }
        tried.push(encoding);

        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            if encoding != encoding_rs::UTF_8 {
                tracing::debug!(encoding = encoding.name(), "Decoded page with non-UTF-8 encoding");
            }
            return DecodedText {
                text: text.into_owned(),
                encoding: encoding.name(),
                lossy: false,
            };
        }
    }

    tracing::debug!(bytes = bytes.len(), "All encodings rejected payload, decoding lossily");
    DecodedText {
        text: String::from_utf8_lossy(bytes).into_owned(),
        encoding: encoding_rs::UTF_8.name(),
        lossy: true,
    }
}

/// Extract the `charset` parameter from a `Content-Type` header value.
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}
