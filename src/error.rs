// Error handling for hrefkit

use std::time::Duration;

/// Library error type
///
/// Every failure is fatal to the operation that raised it: a template that
/// fails to expand or a header that fails to parse produces no partial output.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid expression '{{{expression}}}': {reason}")]
    Expression { expression: String, reason: String },

    #[error("Invalid template '{template}': {reason}")]
    Template { template: String, reason: String },

    #[error("Unsupported operator '{0}'")]
    UnsupportedOperator(char),

    #[error("Failed to resolve variable '{name}': {reason}")]
    Resolution { name: String, reason: String },

    #[error("Timed out after {timeout:?} waiting for variable '{name}'")]
    Timeout { name: String, timeout: Duration },

    #[error("Invalid {header} header: {reason}")]
    Header {
        header: &'static str,
        reason: String,
    },

    #[error("Invalid entity tag: {0}")]
    EntityTag(String),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn expression(expression: &str, reason: impl Into<String>) -> Self {
        Error::Expression {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn header(header: &'static str, reason: impl Into<String>) -> Self {
        Error::Header {
            header,
            reason: reason.into(),
        }
    }

    pub(crate) fn resolution(name: &str, reason: impl Into<String>) -> Self {
        Error::Resolution {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
