// Prefer header (RFC 7240 and its draft predecessors)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::strip_field_name;
use super::tokenizer::Tokenizer;
use crate::encoding::{decode_ext_value, encode_ext_value, is_quotable, is_token, quote};
use crate::error::{Error, Result};

const HEADER: &str = "Prefer";

pub const RETURN_NO_CONTENT: &str = "return-no-content";
pub const RETURN_ACCEPTED: &str = "return-accepted";
pub const RETURN_CONTENT: &str = "return-content";
pub const RETURN_STATUS: &str = "return-status";
pub const WAIT: &str = "wait";
pub const RESPOND_ASYNC: &str = "respond-async";

/// One preference: a token, an optional value and optional parameters
///
/// Tokens and parameter names are case-insensitive and stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    params: Vec<(String, Option<String>)>,
}

impl Preference {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into().to_ascii_lowercase(),
            value: None,
            params: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.params.push((name.into().to_ascii_lowercase(), value));
        self
    }

    pub fn return_no_content() -> Self {
        Self::new(RETURN_NO_CONTENT)
    }

    pub fn return_accepted() -> Self {
        Self::new(RETURN_ACCEPTED)
    }

    pub fn return_content() -> Self {
        Self::new(RETURN_CONTENT)
    }

    pub fn return_status() -> Self {
        Self::new(RETURN_STATUS)
    }

    pub fn respond_async() -> Self {
        Self::new(RESPOND_ASYNC)
    }

    pub fn wait(seconds: u64) -> Self {
        Self::new(WAIT).with_value(seconds.to_string())
    }

    pub fn parse_all(value: &str) -> Result<Vec<Preference>> {
        let input = strip_field_name(value, &[HEADER, "Preference-Applied"]);
        let mut tokens = Tokenizer::new(HEADER, input);
        let mut preferences = Vec::new();

        tokens.skip_list_separators();
        while !tokens.is_eof() {
            preferences.push(parse_preference(&mut tokens)?);
            tokens.skip_ows();
            if !tokens.is_eof() && !tokens.eat(',') {
                return Err(tokens.error(format!("expected ',' at position {}", tokens.position())));
            }
            tokens.skip_list_separators();
        }

        if preferences.is_empty() {
            return Err(Error::header(HEADER, "no preference present"));
        }
        Ok(preferences)
    }

    /// Parse a field holding exactly one preference
    pub fn parse(value: &str) -> Result<Self> {
        let mut preferences = Self::parse_all(value)?;
        if preferences.len() != 1 {
            return Err(Error::header(
                HEADER,
                format!("expected one preference, found {}", preferences.len()),
            ));
        }
        preferences
            .pop()
            .ok_or_else(|| Error::header(HEADER, "no preference present"))
    }

    pub fn to_header(preferences: &[Preference]) -> String {
        preferences
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// First preference with the given token
    pub fn find<'a>(preferences: &'a [Preference], token: &str) -> Option<&'a Preference> {
        preferences.iter().find(|p| p.is(token))
    }

    pub fn contains(preferences: &[Preference], token: &str) -> bool {
        Self::find(preferences, token).is_some()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is(&self, token: &str) -> bool {
        self.token.eq_ignore_ascii_case(token)
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn params(&self) -> &[(String, Option<String>)] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.as_deref())
    }

    /// Seconds requested by a `wait` preference
    pub fn wait_seconds(&self) -> Option<u64> {
        if !self.is(WAIT) {
            return None;
        }
        self.value.as_deref()?.parse().ok()
    }
}

/// `token [= word]`, decoding an RFC 5987 `token*=` value
fn parse_pair(tokens: &mut Tokenizer<'_>) -> Result<(String, Option<String>)> {
    let name = tokens.token()?.to_ascii_lowercase();
    tokens.skip_ows();
    if !tokens.eat('=') {
        return Ok((name, None));
    }
    tokens.skip_ows();
    let (value, _) = tokens.value()?;
    match name.strip_suffix('*') {
        Some(base) => {
            let decoded = decode_ext_value(&value)
                .ok_or_else(|| tokens.error(format!("malformed ext-value for '{}'", name)))?;
            Ok((base.to_string(), Some(decoded)))
        }
        None => Ok((name, Some(value))),
    }
}

fn parse_preference(tokens: &mut Tokenizer<'_>) -> Result<Preference> {
    let (token, value) = parse_pair(tokens)?;
    let mut preference = Preference {
        token,
        value,
        params: Vec::new(),
    };

    loop {
        tokens.skip_ows();
        if !tokens.eat(';') {
            break;
        }
        tokens.skip_ows();
        // empty parameters are allowed: `a;;b`
        if matches!(tokens.peek_char(), None | Some(';' | ',')) {
            continue;
        }
        preference.params.push(parse_pair(tokens)?);
    }
    Ok(preference)
}

fn write_pair(f: &mut fmt::Formatter<'_>, name: &str, value: Option<&str>) -> fmt::Result {
    match value {
        None => f.write_str(name),
        Some(v) if is_token(v) => write!(f, "{}={}", name, v),
        Some(v) if is_quotable(v) => write!(f, "{}={}", name, quote(v)),
        Some(v) => write!(f, "{}*={}", name, encode_ext_value(v)),
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_pair(f, &self.token, self.value.as_deref())?;
        for (name, value) in &self.params {
            f.write_str("; ")?;
            write_pair(f, name, value.as_deref())?;
        }
        Ok(())
    }
}

impl FromStr for Preference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Preference::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_well_known_tokens() {
        let prefs = Preference::parse_all("Prefer: return-no-content, wait=10, Respond-Async").unwrap();
        assert_eq!(prefs.len(), 3);
        assert!(Preference::contains(&prefs, RETURN_NO_CONTENT));
        assert_eq!(Preference::find(&prefs, "wait").and_then(Preference::wait_seconds), Some(10));
        assert!(Preference::contains(&prefs, "respond-async"));
        assert!(!Preference::contains(&prefs, RETURN_STATUS));
    }

    #[test]
    fn test_parse_params() {
        let pref = Preference::parse("foo; bar=\"a b\"; baz;;").unwrap();
        assert_eq!(pref.token(), "foo");
        assert_eq!(pref.value(), None);
        assert_eq!(pref.param("bar"), Some("a b"));
        assert_eq!(pref.params().len(), 2);
        assert_eq!(pref.params()[1], ("baz".to_string(), None));
    }

    #[test]
    fn test_ext_value_fallback() {
        let pref = Preference::new("title").with_value("\u{20ac} rates");
        assert_eq!(pref.to_string(), "title*=UTF-8''%E2%82%AC%20rates");
        assert_eq!(Preference::parse(&pref.to_string()).unwrap(), pref);
    }

    #[test]
    fn test_display_quotes_non_tokens() {
        let pref = Preference::new("handling").with_value("strict mode").with_param("x", Some("1".into()));
        assert_eq!(pref.to_string(), "handling=\"strict mode\"; x=1");
    }

    #[test]
    fn test_wait_helpers() {
        assert_eq!(Preference::wait(5).wait_seconds(), Some(5));
        assert_eq!(Preference::return_content().wait_seconds(), None);
        assert_eq!(Preference::new("wait").with_value("soon").wait_seconds(), None);
    }

    #[test]
    fn test_malformed_preferences_rejected() {
        assert!(Preference::parse("").is_err());
        assert!(Preference::parse("wait=").is_err());
        assert!(Preference::parse("a b").is_err());
        assert!(Preference::parse("a=\"open").is_err());
    }
}
