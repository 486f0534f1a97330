// Cache-Control header (RFC 7234 section 5.2, RFC 5861)

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::strip_field_name;
use super::tokenizer::Tokenizer;
use crate::encoding::quote;
use crate::error::{Error, Result};

const HEADER: &str = "Cache-Control";

/// Value of a directive this crate has no dedicated field for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheExtension {
    Flag,
    Numeric(u64),
    Quoted(String),
}

/// A parsed or built Cache-Control value
///
/// Only directives that are set are serialized, in a fixed order; extension
/// directives follow in the order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheControl {
    #[serde(skip_serializing_if = "is_false")]
    no_cache: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    no_cache_headers: Vec<String>,
    #[serde(skip_serializing_if = "is_false")]
    no_store: bool,
    #[serde(skip_serializing_if = "is_false")]
    no_transform: bool,
    #[serde(skip_serializing_if = "is_false")]
    only_if_cached: bool,
    #[serde(skip_serializing_if = "is_false")]
    must_revalidate: bool,
    #[serde(skip_serializing_if = "is_false")]
    proxy_revalidate: bool,
    #[serde(skip_serializing_if = "is_false")]
    public: bool,
    #[serde(skip_serializing_if = "is_false")]
    private: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    private_headers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_age: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    s_maxage: Option<u64>,
    #[serde(skip_serializing_if = "is_false")]
    max_stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_stale_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_fresh: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stale_while_revalidate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stale_if_error: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    extensions: Vec<(String, CacheExtension)>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl CacheControl {
    pub fn builder() -> CacheControlBuilder {
        CacheControlBuilder::default()
    }

    /// Parse a field value, with or without the `Cache-Control:` prefix
    pub fn parse(value: &str) -> Result<Self> {
        let input = strip_field_name(value, &[HEADER]);
        let mut tokens = Tokenizer::new(HEADER, input);
        let mut builder = CacheControlBuilder::default();

        tokens.skip_list_separators();
        while !tokens.is_eof() {
            let name = tokens.token()?.to_ascii_lowercase();
            tokens.skip_ows();
            let argument = if tokens.eat('=') {
                tokens.skip_ows();
                Some(tokens.value()?)
            } else {
                None
            };

            match DIRECTIVES.iter().find(|(directive, _)| *directive == name) {
                Some((_, apply)) => {
                    apply(&mut builder, argument.as_ref().map(|(v, _)| v.as_str())).map_err(|reason| {
                        debug!(directive = %name, %reason, "rejected cache directive");
                        tokens.error(format!("{}: {}", name, reason))
                    })?;
                }
                None => {
                    let extension = match argument {
                        None => CacheExtension::Flag,
                        Some((v, false)) if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) => {
                            CacheExtension::Numeric(v.parse().unwrap_or(u64::MAX))
                        }
                        Some((v, _)) => CacheExtension::Quoted(v),
                    };
                    builder = builder.extension(name, extension);
                }
            }

            tokens.skip_ows();
            if !tokens.is_eof() && !tokens.eat(',') {
                return Err(tokens.error(format!("expected ',' at position {}", tokens.position())));
            }
            tokens.skip_list_separators();
        }

        Ok(builder.build())
    }

    pub fn is_no_cache(&self) -> bool {
        self.no_cache
    }

    pub fn no_cache_headers(&self) -> &[String] {
        &self.no_cache_headers
    }

    pub fn is_no_store(&self) -> bool {
        self.no_store
    }

    pub fn is_no_transform(&self) -> bool {
        self.no_transform
    }

    pub fn is_only_if_cached(&self) -> bool {
        self.only_if_cached
    }

    pub fn is_must_revalidate(&self) -> bool {
        self.must_revalidate
    }

    pub fn is_proxy_revalidate(&self) -> bool {
        self.proxy_revalidate
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn is_private(&self) -> bool {
        self.private
    }

    pub fn private_headers(&self) -> &[String] {
        &self.private_headers
    }

    pub fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    pub fn s_maxage(&self) -> Option<u64> {
        self.s_maxage
    }

    /// Whether `max-stale` was given, with or without a limit
    pub fn is_max_stale(&self) -> bool {
        self.max_stale
    }

    pub fn max_stale_limit(&self) -> Option<u64> {
        self.max_stale_limit
    }

    pub fn min_fresh(&self) -> Option<u64> {
        self.min_fresh
    }

    pub fn stale_while_revalidate(&self) -> Option<u64> {
        self.stale_while_revalidate
    }

    pub fn stale_if_error(&self) -> Option<u64> {
        self.stale_if_error
    }

    pub fn extensions(&self) -> &[(String, CacheExtension)] {
        &self.extensions
    }

    /// Case-insensitive extension lookup
    pub fn extension(&self, name: &str) -> Option<&CacheExtension> {
        self.extensions
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Back to a builder, for deriving a modified copy
    pub fn to_builder(&self) -> CacheControlBuilder {
        CacheControlBuilder { inner: self.clone() }
    }
}

type DirectiveSetter = fn(&mut CacheControlBuilder, Option<&str>) -> std::result::Result<(), String>;

/// Directive name to setter dispatch table
static DIRECTIVES: &[(&str, DirectiveSetter)] = &[
    ("no-cache", |b, arg| {
        b.inner.no_cache = true;
        b.inner.no_cache_headers.extend(header_list(arg));
        Ok(())
    }),
    ("no-store", |b, arg| flag(&mut b.inner.no_store, arg)),
    ("no-transform", |b, arg| flag(&mut b.inner.no_transform, arg)),
    ("only-if-cached", |b, arg| flag(&mut b.inner.only_if_cached, arg)),
    ("must-revalidate", |b, arg| flag(&mut b.inner.must_revalidate, arg)),
    ("proxy-revalidate", |b, arg| flag(&mut b.inner.proxy_revalidate, arg)),
    ("public", |b, arg| flag(&mut b.inner.public, arg)),
    ("private", |b, arg| {
        b.inner.private = true;
        b.inner.private_headers.extend(header_list(arg));
        Ok(())
    }),
    ("max-age", |b, arg| seconds(&mut b.inner.max_age, arg)),
    ("s-maxage", |b, arg| seconds(&mut b.inner.s_maxage, arg)),
    ("max-stale", |b, arg| {
        b.inner.max_stale = true;
        match arg {
            Some(_) => seconds(&mut b.inner.max_stale_limit, arg),
            None => Ok(()),
        }
    }),
    ("min-fresh", |b, arg| seconds(&mut b.inner.min_fresh, arg)),
    ("stale-while-revalidate", |b, arg| seconds(&mut b.inner.stale_while_revalidate, arg)),
    ("stale-if-error", |b, arg| seconds(&mut b.inner.stale_if_error, arg)),
];

fn flag(field: &mut bool, arg: Option<&str>) -> std::result::Result<(), String> {
    if arg.is_some() {
        return Err("directive takes no argument".into());
    }
    *field = true;
    Ok(())
}

fn seconds(field: &mut Option<u64>, arg: Option<&str>) -> std::result::Result<(), String> {
    let arg = arg.ok_or("missing delta-seconds")?;
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("'{}' is not a delta-seconds value", arg));
    }
    // Overflowing values saturate (RFC 7234 1.2.1)
    *field = Some(arg.parse().unwrap_or(u64::MAX));
    Ok(())
}

fn header_list(arg: Option<&str>) -> impl Iterator<Item = String> + '_ {
    arg.into_iter()
        .flat_map(|list| list.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

impl fmt::Display for CacheControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let with_headers = |name: &str, headers: &[String]| {
            if headers.is_empty() {
                name.to_string()
            } else {
                format!("{}={}", name, quote(&headers.join(", ")))
            }
        };

        if self.no_cache {
            parts.push(with_headers("no-cache", &self.no_cache_headers));
        }
        for (set, name) in [
            (self.no_store, "no-store"),
            (self.no_transform, "no-transform"),
            (self.only_if_cached, "only-if-cached"),
            (self.must_revalidate, "must-revalidate"),
            (self.proxy_revalidate, "proxy-revalidate"),
            (self.public, "public"),
        ] {
            if set {
                parts.push(name.to_string());
            }
        }
        if self.private {
            parts.push(with_headers("private", &self.private_headers));
        }
        if let Some(v) = self.max_age {
            parts.push(format!("max-age={}", v));
        }
        if let Some(v) = self.s_maxage {
            parts.push(format!("s-maxage={}", v));
        }
        if self.max_stale {
            parts.push(match self.max_stale_limit {
                Some(v) => format!("max-stale={}", v),
                None => "max-stale".to_string(),
            });
        }
        if let Some(v) = self.min_fresh {
            parts.push(format!("min-fresh={}", v));
        }
        if let Some(v) = self.stale_while_revalidate {
            parts.push(format!("stale-while-revalidate={}", v));
        }
        if let Some(v) = self.stale_if_error {
            parts.push(format!("stale-if-error={}", v));
        }
        for (name, value) in &self.extensions {
            parts.push(match value {
                CacheExtension::Flag => name.clone(),
                CacheExtension::Numeric(n) => format!("{}={}", name, n),
                CacheExtension::Quoted(s) => format!("{}={}", name, quote(s)),
            });
        }

        f.write_str(&parts.join(", "))
    }
}

impl FromStr for CacheControl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CacheControl::parse(s)
    }
}

/// Mutable builder frozen into a [`CacheControl`] by `build`
#[derive(Debug, Clone, Default)]
pub struct CacheControlBuilder {
    inner: CacheControl,
}

impl CacheControlBuilder {
    pub fn no_cache(mut self) -> Self {
        self.inner.no_cache = true;
        self
    }

    /// `no-cache` restricted to the named header fields
    pub fn no_cache_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.no_cache = true;
        self.inner.no_cache_headers.extend(headers.into_iter().map(Into::into));
        self
    }

    pub fn no_store(mut self) -> Self {
        self.inner.no_store = true;
        self
    }

    pub fn no_transform(mut self) -> Self {
        self.inner.no_transform = true;
        self
    }

    pub fn only_if_cached(mut self) -> Self {
        self.inner.only_if_cached = true;
        self
    }

    pub fn must_revalidate(mut self) -> Self {
        self.inner.must_revalidate = true;
        self
    }

    pub fn proxy_revalidate(mut self) -> Self {
        self.inner.proxy_revalidate = true;
        self
    }

    pub fn public(mut self) -> Self {
        self.inner.public = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.inner.private = true;
        self
    }

    pub fn private_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.private = true;
        self.inner.private_headers.extend(headers.into_iter().map(Into::into));
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.inner.max_age = Some(seconds);
        self
    }

    pub fn s_maxage(mut self, seconds: u64) -> Self {
        self.inner.s_maxage = Some(seconds);
        self
    }

    /// `max-stale`, optionally bounded
    pub fn max_stale(mut self, limit: Option<u64>) -> Self {
        self.inner.max_stale = true;
        self.inner.max_stale_limit = limit;
        self
    }

    pub fn min_fresh(mut self, seconds: u64) -> Self {
        self.inner.min_fresh = Some(seconds);
        self
    }

    pub fn stale_while_revalidate(mut self, seconds: u64) -> Self {
        self.inner.stale_while_revalidate = Some(seconds);
        self
    }

    pub fn stale_if_error(mut self, seconds: u64) -> Self {
        self.inner.stale_if_error = Some(seconds);
        self
    }

    /// Add or replace an extension directive; names are stored lowercased
    pub fn extension(mut self, name: impl Into<String>, value: CacheExtension) -> Self {
        let name = name.into().to_ascii_lowercase();
        match self.inner.extensions.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.inner.extensions.push((name, value)),
        }
        self
    }

    pub fn build(self) -> CacheControl {
        self.inner
    }
}
