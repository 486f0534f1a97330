// Percent-encoding profiles and header quoting helpers shared by the
// template engine and the header grammars

use std::fmt::Write;

const RESERVED: &str = ":/?#[]@!$&'()*+,;=";

fn is_unreserved(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')
}

/// Characters an IRI may carry unencoded beyond the ASCII set (RFC 3987 ucschar)
fn is_ucschar(c: char) -> bool {
    !c.is_ascii() && !c.is_control() && !matches!(c as u32, 0xE000..=0xF8FF | 0xFFF0..=0xFFFF)
}

fn push_encoded(c: char, out: &mut String) {
    let mut buf = [0u8; 4];
    for byte in c.encode_utf8(&mut buf).bytes() {
        let _ = write!(out, "%{:02X}", byte);
    }
}

fn is_pct_triplet(chars: &[char], i: usize) -> bool {
    chars[i] == '%'
        && chars.get(i + 1).is_some_and(|c| c.is_ascii_hexdigit())
        && chars.get(i + 2).is_some_and(|c| c.is_ascii_hexdigit())
}

/// Encode everything outside the unreserved set
///
/// In IRI mode non-ASCII characters are passed through as-is.
pub fn encode_unreserved(value: &str, iri: bool) -> String {
    if !iri {
        return urlencoding::encode(value).into_owned();
    }
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if is_unreserved(c) || is_ucschar(c) {
            out.push(c);
        } else {
            push_encoded(c, &mut out);
        }
    }
    out
}

/// Encode everything outside the unreserved and reserved sets, leaving
/// existing percent-encoded triplets intact
pub fn encode_reserved(value: &str, iri: bool) -> String {
    let chars: Vec<char> = value.chars().collect();
    let mut out = String::with_capacity(value.len());
    for (i, &c) in chars.iter().enumerate() {
        if is_unreserved(c) || RESERVED.contains(c) || is_pct_triplet(&chars, i) {
            out.push(c);
        } else if iri && is_ucschar(c) {
            out.push(c);
        } else {
            push_encoded(c, &mut out);
        }
    }
    out
}

/// RFC 7230 tchar
pub fn is_tchar(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}

pub fn is_token(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_tchar)
}

/// RFC 7235 token68: base64-ish characters followed by optional `=` padding
pub fn is_token68(value: &str) -> bool {
    let body = value.trim_end_matches('=');
    !body.is_empty()
        && body
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-._~+/".contains(c))
}

/// Wrap a value in a quoted-string, escaping quotes and backslashes
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Whether a value can travel inside a quoted-string without RFC 5987 encoding
pub fn is_quotable(value: &str) -> bool {
    value.chars().all(|c| c == '\t' || (' '..='~').contains(&c))
}

fn is_attr_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$&+-.^_`|~".contains(c)
}

/// RFC 5987 ext-value with the UTF-8 charset and no language tag
pub fn encode_ext_value(value: &str) -> String {
    let mut out = String::from("UTF-8''");
    for c in value.chars() {
        if is_attr_char(c) {
            out.push(c);
        } else {
            push_encoded(c, &mut out);
        }
    }
    out
}

/// Decode an RFC 5987 ext-value (`charset'language'pct-encoded`)
///
/// Supports the UTF-8 and ISO-8859-1 charsets; returns None for anything else.
pub fn decode_ext_value(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;
    if !encoded.chars().all(|c| is_attr_char(c) || c == '%') {
        return None;
    }
    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    if charset.eq_ignore_ascii_case("UTF-8") {
        String::from_utf8(bytes.into_owned()).ok()
    } else if charset.eq_ignore_ascii_case("ISO-8859-1") {
        Some(bytes.iter().map(|&b| b as char).collect())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token68() {
        assert!(is_token68("QWxhZGRpbjpvcGVuIHNlc2FtZQ=="));
        assert!(is_token68("mF_9.B5f-4.1JqM"));
        assert!(!is_token68("=="));
        assert!(!is_token68("a b"));
        assert!(!is_token68("a=b"));
    }

    #[test]
    fn test_encode_unreserved() {
        assert_eq!(encode_unreserved("Hello World!", false), "Hello%20World%21");
        assert_eq!(encode_unreserved("50%", false), "50%25");
        assert_eq!(encode_unreserved("a~b-c_d.e", false), "a~b-c_d.e");
    }

    #[test]
    fn test_encode_unreserved_iri_keeps_non_ascii() {
        assert_eq!(encode_unreserved("caf\u{e9} bar", true), "caf\u{e9}%20bar");
        assert_eq!(encode_unreserved("caf\u{e9}", false), "caf%C3%A9");
    }

    #[test]
    fn test_encode_reserved() {
        assert_eq!(encode_reserved("Hello World!", false), "Hello%20World!");
        assert_eq!(encode_reserved("/foo/bar", false), "/foo/bar");
        assert_eq!(encode_reserved("50%", false), "50%25");
        assert_eq!(encode_reserved("a%20b", false), "a%20b");
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn test_token() {
        assert!(is_token("max-age"));
        assert!(!is_token("a b"));
        assert!(!is_token(""));
        assert!(!is_token("a=b"));
    }

    #[test]
    fn test_ext_value() {
        assert_eq!(encode_ext_value("\u{a3} rates"), "UTF-8''%C2%A3%20rates");
        assert_eq!(
            decode_ext_value("UTF-8'en'%c2%a3%20and%20%e2%82%ac%20rates").as_deref(),
            Some("\u{a3} and \u{20ac} rates")
        );
        assert_eq!(decode_ext_value("iso-8859-1'en'%A3%20rates").as_deref(), Some("\u{a3} rates"));
        assert_eq!(decode_ext_value("no-quotes"), None);
        assert_eq!(decode_ext_value("KOI8-R''abc"), None);
    }
}
