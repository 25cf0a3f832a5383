//! Response body decoding.

use encoding_rs::Encoding;
use encoding_rs::UTF_8;

/// How far into the body a `<meta charset>` declaration is looked for.
const META_PRESCAN_BYTES: usize = 1024;

/// Decodes `body` to text. A byte-order mark wins, then the header's
/// `charset` parameter, then a `<meta>` declaration; UTF-8 otherwise.
/// Malformed sequences become U+FFFD.
pub fn decode_text(body: &[u8], content_type: &str) -> String {
    let encoding = header_charset(content_type)
        .or_else(|| meta_charset(body))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn header_charset(content_type: &str) -> Option<&'static Encoding> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|parameter| parameter.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .and_then(|(_, value)| label_encoding(value.trim().trim_matches(['"', '\''])))
}

fn meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let prefix = &body[..body.len().min(META_PRESCAN_BYTES)];
    let lowered = prefix.to_ascii_lowercase();
    let needle = b"charset";

    let mut offset = 0;
    while let Some(found) = lowered[offset..]
        .windows(needle.len())
        .position(|window| window == needle)
    {
        let after = offset + found + needle.len();
        offset = after;

        let rest = skip_spaces(&prefix[after..]);
        let Some(rest) = rest.strip_prefix(b"=") else {
            continue;
        };
        let rest = skip_spaces(rest);
        let rest = rest
            .strip_prefix(b"\"")
            .or_else(|| rest.strip_prefix(b"'"))
            .unwrap_or(rest);
        let end = rest
            .iter()
            .position(|byte| {
                !(byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':' | b'.'))
            })
            .unwrap_or(rest.len());

        if let Some(encoding) = std::str::from_utf8(&rest[..end]).ok().and_then(label_encoding) {
            // A UTF-16 label in an ASCII-readable prescan means UTF-8.
            if encoding == encoding_rs::UTF_16LE || encoding == encoding_rs::UTF_16BE {
                return Some(UTF_8);
            }
            return Some(encoding);
        }
    }

    None
}

fn label_encoding(label: &str) -> Option<&'static Encoding> {
    if label.is_empty() {
        return None;
    }
    Encoding::for_label(label.as_bytes())
}

fn skip_spaces(input: &[u8]) -> &[u8] {
    let start = input
        .iter()
        .position(|byte| !byte.is_ascii_whitespace())
        .unwrap_or(input.len());
    &input[start..]
}
