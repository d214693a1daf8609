use std::borrow::Cow;

/// Decodes numeric character references (`&#233;`, `&#x1F600;`).
///
/// Browsers submit characters the form's charset can't carry this way. Code points
/// that are not valid scalar values become U+FFFD; anything that is not a complete
/// numeric reference, including a lone `&`, is kept as it is.
pub fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains("&#") {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find("&#") {
        out.push_str(&rest[..pos]);
        let reference = &rest[pos + 2..];

        match parse_reference(reference) {
            Some((ch, used)) => {
                out.push(ch);
                rest = &reference[used..];
            }
            None => {
                out.push_str("&#");
                rest = reference;
            }
        }
    }

    out.push_str(rest);
    Cow::Owned(out)
}

/// Parses the part of a reference after `&#`, returning the character and the number
/// of bytes consumed including the closing `;`.
fn parse_reference(reference: &str) -> Option<(char, usize)> {
    let bytes = reference.as_bytes();
    let (radix, start) = match bytes.first() {
        Some(b'x' | b'X') => (16, 1),
        _ => (10, 0),
    };

    let digits = bytes[start..]
        .iter()
        .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
        .count();

    if digits == 0 || bytes.get(start + digits) != Some(&b';') {
        return None;
    }

    let ch = u32::from_str_radix(&reference[start..start + digits], radix)
        .ok()
        .and_then(char::from_u32)
        .unwrap_or(char::REPLACEMENT_CHARACTER);

    Some((ch, start + digits + 1))
}
