//! Escaping of the characters the term micro-format reserves.
//!
//! Reserved characters are written as HTML entities. `&` itself is escaped
//! too, so any text survives an escape/unescape pair unchanged. Unescaping
//! is tolerant: an `&` that does not start a known entity is kept as-is,
//! which lets plain text such as `AT&T` decode untouched.

/// Entities for every character reserved by the format.
const ENTITIES: &[(char, &str)] = &[
    ('&', "&amp;"),
    ('"', "&quot;"),
    ('|', "&#124;"),
    ('+', "&#43;"),
    (':', "&#58;"),
    (';', "&#59;"),
];

/// Characters escaped in names, disambiguators, descriptions and data keys.
pub const TEXT_RESERVED: &[char] = &['&', '"', '|', '+', ':', ';'];

/// Characters escaped in data values.
///
/// Values may keep `:` and `+` because a data entry splits on its first colon only.
pub const VALUE_RESERVED: &[char] = &['&', '"', '|', ';'];

/// Escapes every character of `reserved` found in `text`.
pub fn escape(text: &str, reserved: &[char]) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match entity_for(c) {
            Some(entity) if reserved.contains(&c) => out.push_str(entity),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes a name, disambiguator or description.
pub fn escape_text(text: &str) -> String {
    escape(text, TEXT_RESERVED)
}

/// Reverses [`escape`] for any reserved set.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ENTITIES
            .iter()
            .find(|(_, entity)| tail.starts_with(entity))
        {
            Some((c, entity)) => {
                out.push(*c);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Splits `text` on `sep`, treating escaped entities as opaque.
///
/// Every entity ends in `;`, so a plain `split(';')` would cut escaped values apart.
pub fn split_unescaped(text: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut idx = 0;
    while idx < text.len() {
        let tail = &text[idx..];
        if let Some((_, entity)) = ENTITIES.iter().find(|(_, entity)| tail.starts_with(entity)) {
            idx += entity.len();
            continue;
        }
        let Some(c) = tail.chars().next() else {
            break;
        };
        if c == sep {
            pieces.push(&text[start..idx]);
            start = idx + c.len_utf8();
        }
        idx += c.len_utf8();
    }
    pieces.push(&text[start..]);
    pieces
}

/// Splits `text` at the first `sep` outside an entity.
pub fn split_once_unescaped(text: &str, sep: char) -> Option<(&str, &str)> {
    let mut pieces = split_unescaped(text, sep);
    if pieces.len() < 2 {
        return None;
    }
    let key = pieces.remove(0);
    Some((key, &text[key.len() + sep.len_utf8()..]))
}

fn entity_for(c: char) -> Option<&'static str> {
    ENTITIES
        .iter()
        .find(|(reserved, _)| *reserved == c)
        .map(|(_, entity)| *entity)
}
