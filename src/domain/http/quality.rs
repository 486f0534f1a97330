// Accept-family quality lists (RFC 7231 section 5.3)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::strip_field_name;
use super::tokenizer::Tokenizer;
use crate::encoding::{is_token, quote};
use crate::error::{Error, Result};

const HEADER: &str = "Accept";
const FIELD_NAMES: &[&str] = &["Accept", "Accept-Charset", "Accept-Encoding", "Accept-Language"];

/// Highest weight, in thousandths
const MAX_QUALITY: u16 = 1000;

/// One `value;params;q=x` list member
///
/// The weight is kept in thousandths so comparisons are exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityItem {
    value: String,
    quality: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    params: Vec<(String, String)>,
}

impl QualityItem {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            quality: MAX_QUALITY,
            params: Vec::new(),
        }
    }

    /// Set the weight in thousandths, clamped to 1000
    pub fn with_quality(mut self, thousandths: u16) -> Self {
        self.quality = thousandths.min(MAX_QUALITY);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Parse a list, sorted by descending weight; equal weights keep their order
    pub fn parse_list(value: &str) -> Result<Vec<QualityItem>> {
        let input = strip_field_name(value, FIELD_NAMES);
        let mut tokens = Tokenizer::new(HEADER, input);
        let mut items = Vec::new();

        tokens.skip_list_separators();
        while !tokens.is_eof() {
            items.push(parse_item(&mut tokens)?);
            tokens.skip_ows();
            if !tokens.is_eof() && !tokens.eat(',') {
                return Err(tokens.error(format!("expected ',' at position {}", tokens.position())));
            }
            tokens.skip_list_separators();
        }

        items.sort_by(|a, b| b.quality.cmp(&a.quality));
        Ok(items)
    }

    pub fn to_header(items: &[QualityItem]) -> String {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Weight in thousandths (0..=1000)
    pub fn quality(&self) -> u16 {
        self.quality
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// A weight of zero means "not acceptable"
    pub fn is_acceptable(&self) -> bool {
        self.quality > 0
    }
}

fn parse_item(tokens: &mut Tokenizer<'_>) -> Result<QualityItem> {
    let mut value = String::new();
    while let Some(ch) = tokens.peek_char() {
        if matches!(ch, ';' | ',' | ' ' | '\t') {
            break;
        }
        value.push(tokens.consume_char()?);
    }
    if value.is_empty() {
        return Err(tokens.error(format!("missing value at position {}", tokens.position())));
    }

    let mut item = QualityItem::new(value);
    let mut seen_quality = false;
    loop {
        tokens.skip_ows();
        if !tokens.eat(';') {
            break;
        }
        tokens.skip_ows();
        let name = tokens.token()?;
        tokens.skip_ows();
        tokens.expect_char('=')?;
        tokens.skip_ows();
        let (param, _) = tokens.value()?;

        if name.eq_ignore_ascii_case("q") && !seen_quality {
            item.quality = parse_qvalue(&param).ok_or_else(|| tokens.error(format!("invalid qvalue '{}'", param)))?;
            seen_quality = true;
        } else {
            item.params.push((name.to_string(), param));
        }
    }
    Ok(item)
}

/// `0[.ddd]` or `1[.000]`, converted to thousandths
fn parse_qvalue(text: &str) -> Option<u16> {
    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if fraction.len() > 3 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: u16 = match whole {
        "0" => 0,
        "1" => 1,
        _ => return None,
    };
    let padded = format!("{:0<3}", fraction);
    let thousandths = whole * 1000 + padded.parse::<u16>().ok()?;
    (thousandths <= MAX_QUALITY).then_some(thousandths)
}

fn format_qvalue(thousandths: u16) -> String {
    if thousandths >= MAX_QUALITY {
        return "1".to_string();
    }
    let digits = format!("{:03}", thousandths);
    let trimmed = digits.trim_end_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        format!("0.{}", trimmed)
    }
}

impl fmt::Display for QualityItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)?;
        for (name, value) in &self.params {
            if is_token(value) {
                write!(f, ";{}={}", name, value)?;
            } else {
                write!(f, ";{}={}", name, quote(value))?;
            }
        }
        if self.quality != MAX_QUALITY {
            write!(f, ";q={}", format_qvalue(self.quality))?;
        }
        Ok(())
    }
}

impl FromStr for QualityItem {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut items = QualityItem::parse_list(s)?;
        if items.len() != 1 {
            return Err(Error::header(HEADER, format!("expected one item, found {}", items.len())));
        }
        items
            .pop()
            .ok_or_else(|| Error::header(HEADER, "no item present"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_sort() {
        let items = QualityItem::parse_list("Accept: text/*;q=0.3, text/html;q=0.7, text/html;level=1, */*;q=0.5").unwrap();
        let values: Vec<(&str, u16)> = items.iter().map(|i| (i.value(), i.quality())).collect();
        assert_eq!(
            values,
            vec![("text/html", 1000), ("text/html", 700), ("*/*", 500), ("text/*", 300)]
        );
        assert_eq!(items[0].param("level"), Some("1"));
    }

    #[test]
    fn test_sort_is_stable() {
        let items = QualityItem::parse_list("da, en-gb;q=0.8, en;q=0.8, fr").unwrap();
        let values: Vec<&str> = items.iter().map(QualityItem::value).collect();
        assert_eq!(values, vec!["da", "fr", "en-gb", "en"]);
    }

    #[test]
    fn test_qvalue_grammar() {
        assert_eq!(parse_qvalue("0"), Some(0));
        assert_eq!(parse_qvalue("0.5"), Some(500));
        assert_eq!(parse_qvalue("0.125"), Some(125));
        assert_eq!(parse_qvalue("1.000"), Some(1000));
        assert_eq!(parse_qvalue("1."), Some(1000));
        assert_eq!(parse_qvalue("1.001"), None);
        assert_eq!(parse_qvalue("0.1234"), None);
        assert_eq!(parse_qvalue("2"), None);
        assert_eq!(parse_qvalue("-0"), None);
        assert_eq!(parse_qvalue(".5"), None);
    }

    #[test]
    fn test_invalid_lists_rejected() {
        assert!(QualityItem::parse_list("text/html;q=1.5").is_err());
        assert!(QualityItem::parse_list("text/html;q").is_err());
        assert!(QualityItem::parse_list(";q=0.5").is_err());
    }

    #[test]
    fn test_zero_quality_not_acceptable() {
        let items = QualityItem::parse_list("gzip;q=0, identity").unwrap();
        assert!(items[0].is_acceptable());
        assert!(!items[1].is_acceptable());
    }

    #[test]
    fn test_display() {
        let item = QualityItem::new("text/html").with_param("charset", "utf-8").with_quality(250);
        assert_eq!(item.to_string(), "text/html;charset=utf-8;q=0.25");
        assert_eq!(QualityItem::new("gzip").with_quality(0).to_string(), "gzip;q=0");
        assert_eq!("en;q=0.9".parse::<QualityItem>().unwrap().quality(), 900);
    }
}
