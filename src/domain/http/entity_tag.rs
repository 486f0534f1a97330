// Entity tags (RFC 7232): ETag, If-Match and If-None-Match values

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::strip_field_name;
use crate::error::{Error, Result};

const FIELD_NAMES: &[&str] = &["ETag", "If-Match", "If-None-Match"];

/// A wildcard, weak or strong entity tag
///
/// `==` is exact: the opaque tag and both flags must agree. Use
/// [`EntityTag::weak_eq`] and [`EntityTag::strong_eq`] for the RFC 7232
/// comparison functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityTag {
    tag: String,
    #[serde(default)]
    weak: bool,
    #[serde(default)]
    wild: bool,
}

/// RFC 7232 etagc: any visible character but `"`, or obs-text
fn is_etagc(c: char) -> bool {
    c == '!' || ('#'..='~').contains(&c) || (c as u32) >= 0x80
}

impl EntityTag {
    /// `*`
    pub const WILD: EntityTag = EntityTag {
        tag: String::new(),
        weak: false,
        wild: true,
    };

    pub fn new(tag: impl Into<String>, weak: bool) -> Result<Self> {
        let tag = tag.into();
        if let Some(bad) = tag.chars().find(|c| !is_etagc(*c)) {
            return Err(Error::EntityTag(format!("invalid character {:?} in tag '{}'", bad, tag)));
        }
        Ok(Self {
            tag,
            weak,
            wild: false,
        })
    }

    pub fn strong(tag: impl Into<String>) -> Result<Self> {
        Self::new(tag, false)
    }

    pub fn weak(tag: impl Into<String>) -> Result<Self> {
        Self::new(tag, true)
    }

    /// A strong tag derived from arbitrary material: hex SHA-256 of the concatenated parts
    pub fn generate(material: &[&[u8]]) -> Self {
        Self {
            tag: digest(material),
            weak: false,
            wild: false,
        }
    }

    pub fn generate_weak(material: &[&[u8]]) -> Self {
        Self {
            weak: true,
            ..Self::generate(material)
        }
    }

    /// Parse a single entity tag, with or without a field-name prefix
    pub fn parse(value: &str) -> Result<Self> {
        let input = strip_field_name(value, FIELD_NAMES);
        let (tag, rest) = scan(input)?;
        if !rest.trim().is_empty() {
            return Err(Error::EntityTag(format!("unexpected trailing text '{}'", rest.trim())));
        }
        Ok(tag)
    }

    /// Parse an If-Match / If-None-Match list
    pub fn parse_list(value: &str) -> Result<Vec<EntityTag>> {
        let mut rest = strip_field_name(value, FIELD_NAMES);
        let mut tags = Vec::new();
        loop {
            rest = rest.trim_start_matches([' ', '\t', ',']);
            if rest.is_empty() {
                break;
            }
            let (tag, remaining) = scan(rest)?;
            tags.push(tag);
            let remaining = remaining.trim_start_matches([' ', '\t']);
            if !remaining.is_empty() && !remaining.starts_with(',') {
                return Err(Error::EntityTag(format!("expected ',' before '{}'", remaining)));
            }
            rest = remaining;
        }
        if tags.is_empty() {
            return Err(Error::EntityTag("empty entity tag list".into()));
        }
        Ok(tags)
    }

    pub fn to_header(tags: &[EntityTag]) -> String {
        tags.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    pub fn is_wild(&self) -> bool {
        self.wild
    }

    /// Weak comparison: opaque tags match, weakness ignored
    pub fn weak_eq(&self, other: &EntityTag) -> bool {
        !self.wild && !other.wild && self.tag == other.tag
    }

    /// Strong comparison: opaque tags match and neither is weak
    pub fn strong_eq(&self, other: &EntityTag) -> bool {
        self.weak_eq(other) && !self.weak && !other.weak
    }

    /// Compare with another tag; a wildcard on either side always matches
    pub fn matches(&self, other: &EntityTag, weak: bool) -> bool {
        if self.wild || other.wild {
            return true;
        }
        if weak {
            self.weak_eq(other)
        } else {
            self.strong_eq(other)
        }
    }

    /// Whether this tag matches any member of a list
    ///
    /// The wildcard matches any non-empty list.
    pub fn matches_any(&self, tags: &[EntityTag], weak: bool) -> bool {
        if self.wild {
            return !tags.is_empty();
        }
        tags.iter().any(|t| t.matches(self, weak))
    }
}

fn digest(material: &[&[u8]]) -> String {
    let mut hasher = Sha256::new();
    for part in material {
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Read one entity tag off the front of `input`, returning the remainder
fn scan(input: &str) -> Result<(EntityTag, &str)> {
    let input = input.trim_start();
    if let Some(rest) = input.strip_prefix('*') {
        return Ok((EntityTag::WILD, rest));
    }
    let (weak, quoted) = match input.strip_prefix("W/") {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let body = quoted
        .strip_prefix('"')
        .ok_or_else(|| Error::EntityTag(format!("expected opening quote in '{}'", input)))?;
    let end = body
        .find('"')
        .ok_or_else(|| Error::EntityTag(format!("unterminated tag in '{}'", input)))?;
    Ok((EntityTag::new(&body[..end], weak)?, &body[end + 1..]))
}

impl fmt::Display for EntityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wild {
            return f.write_str("*");
        }
        if self.weak {
            f.write_str("W/")?;
        }
        write!(f, "\"{}\"", self.tag)
    }
}

impl FromStr for EntityTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EntityTag::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strong_and_weak() {
        let strong = EntityTag::parse("\"abc\"").unwrap();
        assert!(!strong.is_weak());
        assert!(!strong.is_wild());
        assert_eq!(strong.tag(), "abc");

        let weak = EntityTag::parse("W/\"abc\"").unwrap();
        assert!(weak.is_weak());
        assert_eq!(weak.tag(), "abc");

        assert_ne!(strong, weak);
        assert!(strong.weak_eq(&weak));
        assert!(!strong.strong_eq(&weak));
        assert!(strong.matches(&weak, true));
        assert!(!strong.matches(&weak, false));
    }

    #[test]
    fn test_parse_wild() {
        let wild = EntityTag::parse("If-Match: *").unwrap();
        assert!(wild.is_wild());
        assert_eq!(wild, EntityTag::WILD);
        assert_eq!(wild.to_string(), "*");
    }

    #[test]
    fn test_parse_list_with_commas_inside_tags() {
        let tags = EntityTag::parse_list("If-None-Match: \"a,b\", W/\"c\" ,\"\"").unwrap();
        assert_eq!(tags.len(), 3);
        assert_eq!(tags[0].tag(), "a,b");
        assert!(tags[1].is_weak());
        assert_eq!(tags[2].tag(), "");
    }

    #[test]
    fn test_matches_any() {
        let list = EntityTag::parse_list("\"x\", W/\"y\"").unwrap();
        assert!(EntityTag::WILD.matches_any(&list, false));
        assert!(!EntityTag::WILD.matches_any(&[], false));

        let y = EntityTag::strong("y").unwrap();
        assert!(y.matches_any(&list, true));
        assert!(!y.matches_any(&list, false));
        assert!(y.matches_any(&[EntityTag::WILD], false));
    }

    #[test]
    fn test_malformed_tags_rejected() {
        assert!(EntityTag::parse("abc").is_err());
        assert!(EntityTag::parse("\"abc").is_err());
        assert!(EntityTag::parse("w/\"abc\"").is_err());
        assert!(EntityTag::parse("\"a b\"").is_err());
        assert!(EntityTag::parse("\"abc\" junk").is_err());
        assert!(EntityTag::parse_list("").is_err());
        assert!(EntityTag::parse_list("\"a\" \"b\"").is_err());
        assert!(EntityTag::strong("quo\"te").is_err());
    }

    #[test]
    fn test_generate_is_sha256_hex() {
        let tag = EntityTag::generate(&[b"hello", b" ", b"world"]);
        assert_eq!(tag.tag(), "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9");
        assert!(!tag.is_weak());
        let weak = EntityTag::generate_weak(&[b"hello world"]);
        assert!(weak.is_weak());
        assert!(weak.weak_eq(&tag));
    }

    #[test]
    fn test_display_round_trip() {
        for text in ["\"abc\"", "W/\"xyz\"", "*", "\"\""] {
            assert_eq!(EntityTag::parse(text).unwrap().to_string(), text);
        }
    }
}
