//! Forgiving HTML tokenizer.
//!
//! Produces a flat stream of start tags, end tags, and text. Comments,
//! doctypes, and processing instructions are dropped. The contents of raw-text
//! elements are emitted as a single text token without tag scanning.

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Start {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
}

pub(crate) fn tokenize(source: &str) -> Vec<Token> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0_usize;

    while idx < bytes.len() {
        if bytes[idx] != b'<' {
            let next = find_byte(bytes, idx, b'<').unwrap_or(bytes.len());
            tokens.push(Token::Text(decode_entities(&source[idx..next])));
            idx = next;
            continue;
        }

        if starts_with(bytes, idx, b"<!--") {
            idx = find_subslice(bytes, idx.saturating_add(4), b"-->")
                .map(|end| end.saturating_add(3))
                .unwrap_or(bytes.len());
            continue;
        }

        if starts_with(bytes, idx, b"<!") || starts_with(bytes, idx, b"<?") {
            idx = skip_to_gt(bytes, idx.saturating_add(2));
            continue;
        }

        if starts_with(bytes, idx, b"</") {
            match parse_end_tag(bytes, idx) {
                Some((token, next)) => {
                    tokens.push(token);
                    idx = next;
                }
                None => {
                    tokens.push(Token::Text("<".to_owned()));
                    idx = idx.saturating_add(1);
                }
            }
            continue;
        }

        let Some((token, next)) = parse_start_tag(bytes, idx) else {
            tokens.push(Token::Text("<".to_owned()));
            idx = idx.saturating_add(1);
            continue;
        };

        let raw_text_tag = match &token {
            Token::Start {
                name, self_closing, ..
            } if !*self_closing && is_raw_text_tag(name) => Some(name.clone()),
            _ => None,
        };
        tokens.push(token);
        idx = next;

        if let Some(tag_name) = raw_text_tag {
            let (raw, after) = read_raw_text_until_end_tag(source, idx, &tag_name);
            if !raw.is_empty() {
                let text = if is_escapable_raw_text_tag(&tag_name) {
                    decode_entities(raw)
                } else {
                    raw.to_owned()
                };
                tokens.push(Token::Text(text));
            }
            tokens.push(Token::End { name: tag_name });
            idx = after;
        }
    }

    tokens
}

fn parse_end_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = skip_spaces(bytes, start.saturating_add(2));
    let name_start = idx;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    if idx == name_start {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let end = find_byte(bytes, idx, b'>')?;
    Some((Token::End { name }, end.saturating_add(1)))
}

fn parse_start_tag(bytes: &[u8], start: usize) -> Option<(Token, usize)> {
    let mut idx = start.saturating_add(1);
    let name_start = idx;
    while idx < bytes.len() && is_name_char(bytes[idx]) {
        idx = idx.saturating_add(1);
    }
    if idx == name_start {
        return None;
    }

    let name = String::from_utf8_lossy(&bytes[name_start..idx]).to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        idx = skip_spaces(bytes, idx);
        let byte = *bytes.get(idx)?;

        if byte == b'>' {
            idx = idx.saturating_add(1);
            break;
        }

        if byte == b'/' {
            self_closing = true;
            idx = idx.saturating_add(1);
            continue;
        }

        let attr_start = idx;
        while idx < bytes.len() && !is_attr_name_terminator(bytes[idx]) {
            idx = idx.saturating_add(1);
        }
        if idx == attr_start {
            // Stray quote or `=`; skip it rather than stall.
            idx = idx.saturating_add(1);
            continue;
        }

        let attr_name = String::from_utf8_lossy(&bytes[attr_start..idx]).to_ascii_lowercase();
        idx = skip_spaces(bytes, idx);

        let mut value = String::new();
        if bytes.get(idx) == Some(&b'=') {
            idx = skip_spaces(bytes, idx.saturating_add(1));
            match bytes.get(idx).copied() {
                Some(quote @ (b'"' | b'\'')) => {
                    let value_start = idx.saturating_add(1);
                    let value_end = find_byte(bytes, value_start, quote).unwrap_or(bytes.len());
                    value = String::from_utf8_lossy(&bytes[value_start..value_end]).into_owned();
                    idx = value_end.saturating_add(1);
                }
                Some(_) => {
                    let value_start = idx;
                    while idx < bytes.len()
                        && !bytes[idx].is_ascii_whitespace()
                        && bytes[idx] != b'>'
                    {
                        idx = idx.saturating_add(1);
                    }
                    value = String::from_utf8_lossy(&bytes[value_start..idx]).into_owned();
                }
                None => {}
            }
        }

        attrs.push((attr_name, decode_entities(&value)));
    }

    Some((
        Token::Start {
            name,
            attrs,
            self_closing,
        },
        idx,
    ))
}

fn read_raw_text_until_end_tag<'a>(
    source: &'a str,
    start: usize,
    tag_name: &str,
) -> (&'a str, usize) {
    let bytes = source.as_bytes();
    let tag_bytes = tag_name.as_bytes();
    let mut idx = start;

    while let Some(open) = find_byte(bytes, idx, b'<') {
        let name_start = open.saturating_add(2);
        if bytes.get(open.saturating_add(1)) == Some(&b'/')
            && starts_with_ignore_ascii_case(bytes, name_start, tag_bytes)
            && tag_name_boundary(bytes, name_start.saturating_add(tag_bytes.len()))
        {
            let after = find_byte(bytes, open, b'>')
                .map(|end| end.saturating_add(1))
                .unwrap_or(bytes.len());
            return (&source[start..open], after);
        }
        idx = open.saturating_add(1);
    }

    (&source[start..], bytes.len())
}

/// Decodes the named entities the page renderer cares about plus numeric references.
pub(crate) fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_owned();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp.saturating_add(1)..];

        let decoded = after
            .find(';')
            .filter(|semi| *semi <= 10)
            .and_then(|semi| decode_entity(&after[..semi]).map(|text| (text, semi)));

        match decoded {
            Some((text, semi)) => {
                out.push_str(&text);
                rest = &after[semi.saturating_add(1)..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<String> {
    let named = match entity {
        "nbsp" => Some(' '),
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        "hellip" => Some('\u{2026}'),
        "copy" => Some('\u{a9}'),
        "reg" => Some('\u{ae}'),
        "laquo" => Some('\u{ab}'),
        "raquo" => Some('\u{bb}'),
        "middot" => Some('\u{b7}'),
        _ => None,
    };
    if let Some(ch) = named {
        return Some(ch.to_string());
    }

    let value = if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else {
        entity.strip_prefix('#')?.parse::<u32>().ok()?
    };
    char::from_u32(value).map(|ch| ch.to_string())
}

fn skip_to_gt(bytes: &[u8], from: usize) -> usize {
    find_byte(bytes, from, b'>')
        .map(|end| end.saturating_add(1))
        .unwrap_or(bytes.len())
}

fn skip_spaces(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx = idx.saturating_add(1);
    }
    idx
}

fn is_name_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':')
}

fn is_attr_name_terminator(byte: u8) -> bool {
    byte.is_ascii_whitespace() || matches!(byte, b'=' | b'>' | b'/' | b'"' | b'\'')
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "textarea" | "title")
}

fn is_escapable_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "textarea" | "title")
}

fn tag_name_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx).copied() {
        None => true,
        Some(byte) => byte.is_ascii_whitespace() || byte == b'>' || byte == b'/',
    }
}

fn starts_with(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end] == *pattern
}

fn starts_with_ignore_ascii_case(bytes: &[u8], idx: usize, pattern: &[u8]) -> bool {
    let end = idx.saturating_add(pattern.len());
    end <= bytes.len() && bytes[idx..end].eq_ignore_ascii_case(pattern)
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    if from >= bytes.len() {
        return None;
    }

    bytes[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|offset| from + offset)
}

fn find_byte(bytes: &[u8], from: usize, byte: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|candidate| *candidate == byte)
        .map(|offset| from + offset)
}
