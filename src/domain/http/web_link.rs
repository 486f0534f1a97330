// Link header (RFC 5988 web linking)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::strip_field_name;
use super::tokenizer::Tokenizer;
use crate::encoding::{decode_ext_value, encode_ext_value, is_quotable, is_token, quote};
use crate::error::{Error, Result};

const HEADER: &str = "Link";

/// Link parameters with dedicated handling; everything else is an extension
const RESERVED_PARAMS: &[&str] = &[
    "rel", "anchor", "rev", "hreflang", "media", "title", "title*", "type",
];

/// An extension parameter of a link-value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkParam {
    pub name: String,
    pub value: String,
}

/// A single link-value: target IRI plus parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebLink {
    iri: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rel: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    anchor: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    rev: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hreflang: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    media_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    params: Vec<LinkParam>,
}

impl WebLink {
    pub fn new(iri: impl Into<String>) -> Self {
        Self {
            iri: iri.into(),
            ..Self::default()
        }
    }

    /// Add relation types; a space-separated list adds each one
    pub fn with_rel(mut self, rel: impl Into<String>) -> Self {
        self.rel.extend(rel.into().split_ascii_whitespace().map(str::to_string));
        self
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn with_rev(mut self, rev: impl Into<String>) -> Self {
        self.rev.extend(rev.into().split_ascii_whitespace().map(str::to_string));
        self
    }

    pub fn with_hreflang(mut self, lang: impl Into<String>) -> Self {
        self.hreflang.push(lang.into());
        self
    }

    pub fn with_media(mut self, media: impl Into<String>) -> Self {
        self.media = Some(media.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Add an extension parameter
    ///
    /// Names are case-insensitive and stored lower-cased. Reserved names and
    /// names that are not plain tokens are rejected; `name*` encoding is
    /// chosen when the value is written.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into().to_ascii_lowercase();
        if is_reserved(&name) {
            return Err(Error::header(HEADER, format!("'{}' is a reserved link parameter", name)));
        }
        if !is_token(&name) || name.ends_with('*') {
            return Err(Error::header(HEADER, format!("'{}' is not a valid parameter name", name)));
        }
        self.params.push(LinkParam {
            name,
            value: value.into(),
        });
        Ok(self)
    }

    /// Parse every link-value of a field
    ///
    /// Relative target and anchor references are resolved against `base` when one is given.
    pub fn parse_all(value: &str, base: Option<&Url>) -> Result<Vec<WebLink>> {
        let input = strip_field_name(value, &[HEADER]);
        let mut tokens = Tokenizer::new(HEADER, input);
        let mut links = Vec::new();

        tokens.skip_list_separators();
        while !tokens.is_eof() {
            links.push(parse_link(&mut tokens, base)?);
            tokens.skip_ows();
            if !tokens.is_eof() && !tokens.eat(',') {
                return Err(tokens.error(format!("expected ',' at position {}", tokens.position())));
            }
            tokens.skip_list_separators();
        }

        if links.is_empty() {
            return Err(Error::header(HEADER, "no link-value present"));
        }
        Ok(links)
    }

    /// Parse a field holding exactly one link-value
    pub fn parse(value: &str, base: Option<&Url>) -> Result<Self> {
        let mut links = Self::parse_all(value, base)?;
        if links.len() != 1 {
            return Err(Error::header(HEADER, format!("expected one link-value, found {}", links.len())));
        }
        links
            .pop()
            .ok_or_else(|| Error::header(HEADER, "no link-value present"))
    }

    pub fn to_header(links: &[WebLink]) -> String {
        links
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn iri(&self) -> &str {
        &self.iri
    }

    pub fn rel(&self) -> &[String] {
        &self.rel
    }

    /// Case-insensitive relation type check
    pub fn has_rel(&self, rel: &str) -> bool {
        self.rel.iter().any(|r| r.eq_ignore_ascii_case(rel))
    }

    pub fn anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn rev(&self) -> &[String] {
        &self.rev
    }

    pub fn hreflang(&self) -> &[String] {
        &self.hreflang
    }

    pub fn media(&self) -> Option<&str> {
        self.media.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn params(&self) -> &[LinkParam] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }
}

fn is_reserved(name: &str) -> bool {
    RESERVED_PARAMS.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn resolve(reference: &str, base: Option<&Url>) -> Result<String> {
    match base {
        Some(base) => Ok(base.join(reference)?.to_string()),
        None => Ok(reference.to_string()),
    }
}

fn parse_link(tokens: &mut Tokenizer<'_>, base: Option<&Url>) -> Result<WebLink> {
    tokens.expect_char('<')?;
    let target = tokens.until('>').trim();
    tokens.expect_char('>')?;

    let mut link = WebLink::new(resolve(target, base)?);
    let mut title_star: Option<String> = None;
    let mut seen: Vec<String> = Vec::new();

    loop {
        tokens.skip_ows();
        if !tokens.eat(';') {
            break;
        }
        tokens.skip_ows();
        let raw_name = tokens.token()?.to_ascii_lowercase();
        tokens.skip_ows();
        let raw_value = if tokens.eat('=') {
            tokens.skip_ows();
            param_value(tokens)?
        } else {
            String::new()
        };

        let (name, value, extended) = match raw_name.strip_suffix('*') {
            Some(base_name) => {
                let decoded = decode_ext_value(&raw_value)
                    .ok_or_else(|| tokens.error(format!("malformed {} value '{}'", raw_name, raw_value)))?;
                (base_name.to_string(), decoded, true)
            }
            None => (raw_name.clone(), raw_value, false),
        };

        // Only the first occurrence of a single-valued parameter counts
        let repeated = seen.contains(&raw_name);
        seen.push(raw_name);

        match name.as_str() {
            "rel" | "rev" if !repeated => {
                let target = if name == "rel" { &mut link.rel } else { &mut link.rev };
                target.extend(value.split_ascii_whitespace().map(str::to_string));
            }
            "anchor" if !repeated => link.anchor = Some(resolve(&value, base)?),
            "hreflang" => link.hreflang.push(value),
            "media" if !repeated => link.media = Some(value),
            "title" if extended && !repeated => title_star = Some(value),
            "title" if !repeated => link.title = Some(value),
            "type" if !repeated => link.media_type = Some(value),
            _ if is_reserved(&name) => {
                debug!(param = %name, "ignoring repeated link parameter");
            }
            _ => link.params.push(LinkParam { name, value }),
        }
    }

    if title_star.is_some() {
        link.title = title_star;
    }
    Ok(link)
}

/// A quoted-string, or a bare value running to the next `;` or `,`
fn param_value(tokens: &mut Tokenizer<'_>) -> Result<String> {
    if tokens.peek_char() == Some('"') {
        return tokens.quoted_string();
    }
    let mut value = String::new();
    while let Some(ch) = tokens.peek_char() {
        if ch == ';' || ch == ',' || ch == ' ' || ch == '\t' {
            break;
        }
        value.push(tokens.consume_char()?);
    }
    Ok(value)
}

/// Always a quoted-string unless the value needs `name*` encoding
fn write_quoted(f: &mut fmt::Formatter<'_>, name: &str, value: &str) -> fmt::Result {
    if is_quotable(value) {
        write!(f, "; {}={}", name, quote(value))
    } else {
        write!(f, "; {}*={}", name, encode_ext_value(value))
    }
}

/// A bare token where possible
fn write_text(f: &mut fmt::Formatter<'_>, name: &str, value: &str) -> fmt::Result {
    if !is_quotable(value) {
        write!(f, "; {}*={}", name, encode_ext_value(value))
    } else if is_token(value) {
        write!(f, "; {}={}", name, value)
    } else {
        write!(f, "; {}={}", name, quote(value))
    }
}

impl fmt::Display for WebLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.iri)?;
        if !self.rel.is_empty() {
            write_quoted(f, "rel", &self.rel.join(" "))?;
        }
        if let Some(anchor) = &self.anchor {
            write_quoted(f, "anchor", anchor)?;
        }
        if !self.rev.is_empty() {
            write_quoted(f, "rev", &self.rev.join(" "))?;
        }
        for lang in &self.hreflang {
            write_text(f, "hreflang", lang)?;
        }
        if let Some(media) = &self.media {
            write_quoted(f, "media", media)?;
        }
        if let Some(title) = &self.title {
            write_quoted(f, "title", title)?;
        }
        if let Some(media_type) = &self.media_type {
            write_quoted(f, "type", media_type)?;
        }
        for param in &self.params {
            write_text(f, &param.name, &param.value)?;
        }
        Ok(())
    }
}

impl FromStr for WebLink {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        WebLink::parse(s, None)
    }
}
