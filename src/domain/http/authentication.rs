// WWW-Authenticate / Authorization challenge syntax (RFC 7235, RFC 5987)

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::strip_field_name;
use super::tokenizer::Tokenizer;
use crate::encoding::{decode_ext_value, encode_ext_value, is_quotable, is_token, is_token68, quote};
use crate::error::{Error, Result};

const HEADER: &str = "Authentication";
const FIELD_NAMES: &[&str] = &[
    "WWW-Authenticate",
    "Authorization",
    "Proxy-Authenticate",
    "Proxy-Authorization",
];

/// One `name=value` pair of a challenge or credentials
///
/// `quoted` and `extended` only steer serialization; they are ignored by
/// equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthParam {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub quoted: bool,
    /// Written as an RFC 5987 `name*=` ext-value
    #[serde(default, skip_serializing_if = "is_false")]
    pub extended: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl AuthParam {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            quoted: false,
            extended: false,
        }
    }

    pub fn quoted(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            quoted: true,
            ..Self::new(name, value)
        }
    }
}

impl PartialEq for AuthParam {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.value == other.value
    }
}

impl Eq for AuthParam {}

impl fmt::Display for AuthParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extended || !is_quotable(&self.value) {
            write!(f, "{}*={}", self.name, encode_ext_value(&self.value))
        } else if self.quoted || !is_token(&self.value) {
            write!(f, "{}={}", self.name, quote(&self.value))
        } else {
            write!(f, "{}={}", self.name, self.value)
        }
    }
}

/// A single challenge (`WWW-Authenticate`) or credentials (`Authorization`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authentication {
    scheme: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token68: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    params: Vec<AuthParam>,
}

impl Authentication {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            token68: None,
            params: Vec::new(),
        }
    }

    /// Set the token68 form; clears any parameters
    pub fn with_token68(mut self, token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if !is_token68(&token) {
            return Err(Error::header(HEADER, format!("'{}' is not a valid token68", token)));
        }
        self.token68 = Some(token);
        self.params.clear();
        Ok(self)
    }

    /// Add a parameter; clears any token68
    pub fn with_param(mut self, param: AuthParam) -> Self {
        self.token68 = None;
        self.params.push(param);
        self
    }

    /// `Basic` credentials (RFC 7617)
    pub fn basic(user: &str, password: &str) -> Self {
        Self {
            token68: Some(STANDARD.encode(format!("{}:{}", user, password))),
            ..Self::new("Basic")
        }
    }

    /// `Bearer` credentials (RFC 6750)
    pub fn bearer(token: impl Into<String>) -> Result<Self> {
        Self::new("Bearer").with_token68(token)
    }

    /// Parse every challenge in a header value
    pub fn parse_all(value: &str) -> Result<Vec<Authentication>> {
        let input = strip_field_name(value, FIELD_NAMES);
        let mut tokens = Tokenizer::new(HEADER, input);
        let mut challenges = Vec::new();

        tokens.skip_list_separators();
        while !tokens.is_eof() {
            challenges.push(parse_challenge(&mut tokens)?);
            tokens.skip_list_separators();
        }

        if challenges.is_empty() {
            return Err(Error::header(HEADER, "no challenge present"));
        }
        Ok(challenges)
    }

    /// Parse a value holding exactly one challenge
    pub fn parse(value: &str) -> Result<Self> {
        let mut challenges = Self::parse_all(value)?;
        if challenges.len() > 1 {
            return Err(Error::header(
                HEADER,
                format!("expected one challenge, found {}", challenges.len()),
            ));
        }
        challenges
            .pop()
            .ok_or_else(|| Error::header(HEADER, "no challenge present"))
    }

    /// Serialize several challenges into one field value
    pub fn to_header(challenges: &[Authentication]) -> String {
        challenges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn is_scheme(&self, scheme: &str) -> bool {
        self.scheme.eq_ignore_ascii_case(scheme)
    }

    pub fn token68(&self) -> Option<&str> {
        self.token68.as_deref()
    }

    pub fn params(&self) -> &[AuthParam] {
        &self.params
    }

    /// Case-insensitive parameter lookup
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .map(|p| p.value.as_str())
    }

    pub fn realm(&self) -> Option<&str> {
        self.param("realm")
    }

    /// Decode `Basic` credentials into user and password
    pub fn decode_basic(&self) -> Option<(String, String)> {
        if !self.is_scheme("Basic") {
            return None;
        }
        let decoded = STANDARD.decode(self.token68.as_deref()?).ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (user, password) = decoded.split_once(':')?;
        Some((user.to_string(), password.to_string()))
    }
}

fn parse_challenge(tokens: &mut Tokenizer<'_>) -> Result<Authentication> {
    let scheme = tokens.token()?;
    let mut auth = Authentication::new(scheme);

    let had_space = matches!(tokens.peek_char(), Some(' ' | '\t'));
    tokens.skip_ows();
    if tokens.is_eof() || tokens.peek_char() == Some(',') {
        return Ok(auth);
    }
    if !had_space {
        return Err(tokens.error(format!(
            "expected whitespace after scheme '{}' at position {}",
            scheme,
            tokens.position()
        )));
    }

    // token68 only when nothing but a list comma or the end follows it
    let start = tokens.position();
    if let Some(token) = tokens.token68() {
        tokens.skip_ows();
        if tokens.is_eof() || tokens.peek_char() == Some(',') {
            auth.token68 = Some(token.to_string());
            return Ok(auth);
        }
    }
    tokens.reset(start);

    loop {
        auth.params.push(parse_param(tokens)?);
        tokens.skip_ows();
        if tokens.is_eof() {
            break;
        }
        tokens.expect_char(',')?;
        tokens.skip_list_separators();
        if tokens.is_eof() || !starts_param(tokens) {
            break;
        }
    }

    debug!(scheme = %auth.scheme, params = auth.params.len(), "parsed challenge");
    Ok(auth)
}

/// Whether the upcoming list element is `name=` rather than a new scheme
fn starts_param(tokens: &mut Tokenizer<'_>) -> bool {
    let start = tokens.position();
    let is_param = tokens.token().is_ok() && {
        tokens.skip_ows();
        tokens.peek_char() == Some('=')
    };
    tokens.reset(start);
    is_param
}

fn parse_param(tokens: &mut Tokenizer<'_>) -> Result<AuthParam> {
    let name = tokens.token()?;
    tokens.skip_ows();
    tokens.expect_char('=')?;
    tokens.skip_ows();
    let (value, quoted) = tokens.value()?;

    if let Some(base) = name.strip_suffix('*') {
        let decoded = decode_ext_value(&value)
            .ok_or_else(|| tokens.error(format!("malformed ext-value for '{}'", name)))?;
        return Ok(AuthParam {
            name: base.to_string(),
            value: decoded,
            quoted: false,
            extended: true,
        });
    }

    Ok(AuthParam {
        name: name.to_string(),
        value,
        quoted,
        extended: false,
    })
}

impl PartialEq for Authentication {
    fn eq(&self, other: &Self) -> bool {
        self.scheme.eq_ignore_ascii_case(&other.scheme)
            && self.token68 == other.token68
            && self.params == other.params
    }
}

impl Eq for Authentication {}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.scheme)?;
        if let Some(token) = &self.token68 {
            write!(f, " {}", token)?;
        } else if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
            write!(f, " {}", params.join(", "))?;
        }
        Ok(())
    }
}

impl FromStr for Authentication {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Authentication::parse(s)
    }
}
