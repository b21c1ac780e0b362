//! Value-level helpers shared by the request parsers: URL decoding, tag
//! splitting and date validation.

use std::borrow::Cow;

/// Characters that separate tags in a tag query.
const TAG_SEPARATORS: &[char] = &[' ', ',', '\n', '\r', '\t', '\u{000C}'];

/// Decode a form-encoded value: `+` becomes a space and `%XX` escapes are
/// decoded as UTF-8. Malformed UTF-8 is decoded lossily instead of failing.
pub fn decode(value: &str) -> String {
    let spaced: Cow<'_, str> = if value.contains('+') {
        Cow::Owned(value.replace('+', " "))
    } else {
        Cow::Borrowed(value)
    };

    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes()))
            .into_owned(),
    }
}

/// Split a tag query into individual tags.
///
/// Order is preserved and duplicates are kept.
pub fn split_tags(value: &str) -> Vec<String> {
    value
        .split(TAG_SEPARATORS)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
        .collect()
}

/// A weblog date selector is all digits and either `YYYYMM` or `YYYYMMDD`.
pub fn is_valid_date_string(value: Option<&str>) -> bool {
    match value {
        Some(value) => {
            (value.len() == 6 || value.len() == 8) && value.bytes().all(|b| b.is_ascii_digit())
        }
        None => false,
    }
}
