// Parser for a single `{...}` expression using recursive descent

use std::fmt;
use std::str::FromStr;

use super::context::Context;
use super::operation::{self, Operator};
use super::value::ExpandOptions;
use crate::error::{Error, Result};

/// Largest prefix modifier accepted (`:9999`)
const MAX_PREFIX: usize = 9999;

/// Characters reserved for future operators
const RESERVED_OPERATORS: &str = "=,!@|";

/// One variable reference inside an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarSpec {
    pub name: String,
    /// Maximum number of characters of a scalar value to render
    pub prefix: Option<usize>,
    pub explode: bool,
    /// Render a bare name when the bound value is undefined
    pub novalue: bool,
}

impl VarSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            explode: false,
            novalue: false,
        }
    }

    pub fn with_prefix(mut self, prefix: usize) -> Self {
        self.prefix = Some(prefix);
        self
    }

    pub fn with_explode(mut self, explode: bool) -> Self {
        self.explode = explode;
        self
    }

    pub fn with_novalue(mut self, novalue: bool) -> Self {
        self.novalue = novalue;
        self
    }
}

impl fmt::Display for VarSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(prefix) = self.prefix {
            write!(f, ":{}", prefix)?;
        }
        if self.explode {
            write!(f, "*")?;
        }
        if self.novalue {
            write!(f, "^")?;
        }
        Ok(())
    }
}

/// A parsed template expression: an operator plus its variable list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    operator: Operator,
    varspecs: Vec<VarSpec>,
}

impl Expression {
    /// Parse the text between the braces, e.g. `+path,x:3,y*`
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parser = ExpressionParser {
            raw,
            input: raw,
            pos: 0,
        };
        parser.parse_expression()
    }

    pub fn new(operator: Operator, varspecs: Vec<VarSpec>) -> Result<Self> {
        let expression = Self { operator, varspecs };
        if expression.varspecs.is_empty() {
            return Err(Error::expression(&expression.body(), "empty variable list"));
        }
        Ok(expression)
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn varspecs(&self) -> &[VarSpec] {
        &self.varspecs
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.varspecs.iter().map(|v| v.name.as_str())
    }

    /// Render this expression against a context
    pub fn evaluate(&self, context: &dyn Context, options: &ExpandOptions) -> Result<String> {
        operation::for_operator(self.operator).evaluate(self, context, options)
    }

    fn body(&self) -> String {
        let specs: Vec<String> = self.varspecs.iter().map(ToString::to_string).collect();
        let op = self.operator.as_char().map(String::from).unwrap_or_default();
        format!("{}{}", op, specs.join(","))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.body())
    }
}

impl FromStr for Expression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let inner = s
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(s);
        Expression::parse(inner)
    }
}

struct ExpressionParser<'a> {
    raw: &'a str,
    input: &'a str,
    pos: usize,
}

impl ExpressionParser<'_> {
    fn parse_expression(&mut self) -> Result<Expression> {
        let first = self
            .peek_char()
            .ok_or_else(|| Error::expression(self.raw, "empty expression"))?;

        let operator = match Operator::from_char(first) {
            Some(op) => {
                self.pos += first.len_utf8();
                op
            }
            None if RESERVED_OPERATORS.contains(first) => {
                return Err(Error::UnsupportedOperator(first));
            }
            None => Operator::Simple,
        };

        if self.peek_char().is_none() {
            return Err(Error::expression(self.raw, "empty variable list"));
        }

        let mut varspecs = vec![self.parse_varspec()?];
        while self.peek_char() == Some(',') {
            self.consume_char()?;
            varspecs.push(self.parse_varspec()?);
        }

        if let Some(ch) = self.peek_char() {
            return Err(self.error(format!("unexpected '{}' at position {}", ch, self.pos)));
        }

        Expression::new(operator, varspecs)
    }

    fn parse_varspec(&mut self) -> Result<VarSpec> {
        let name = self.parse_varname()?;
        let mut spec = VarSpec::new(name);

        match self.peek_char() {
            Some(':') => {
                self.consume_char()?;
                spec.prefix = Some(self.parse_prefix()?);
            }
            Some('*') => {
                self.consume_char()?;
                spec.explode = true;
            }
            Some('^') => {
                self.consume_char()?;
                spec.novalue = true;
            }
            _ => {}
        }

        match self.peek_char() {
            None | Some(',') => Ok(spec),
            Some(ch) => Err(self.error(format!(
                "invalid modifier '{}' after variable '{}'",
                ch, spec.name
            ))),
        }
    }

    fn parse_varname(&mut self) -> Result<String> {
        let start = self.pos;
        let mut last_was_dot = true;

        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.consume_char()?;
                last_was_dot = false;
            } else if ch == '%' {
                self.consume_char()?;
                for _ in 0..2 {
                    match self.peek_char() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            self.consume_char()?;
                        }
                        _ => return Err(self.error("incomplete percent-encoding in variable name")),
                    }
                }
                last_was_dot = false;
            } else if ch == '.' {
                if last_was_dot {
                    return Err(self.error(format!("misplaced '.' at position {}", self.pos)));
                }
                self.consume_char()?;
                last_was_dot = true;
            } else {
                break;
            }
        }

        let name = &self.input[start..self.pos];
        if name.is_empty() {
            return match self.peek_char() {
                Some(ch) => Err(self.error(format!(
                    "invalid character '{}' in variable name at position {}",
                    ch, self.pos
                ))),
                None => Err(self.error("empty variable name")),
            };
        }
        if last_was_dot {
            return Err(self.error(format!("variable name '{}' ends with '.'", name)));
        }
        Ok(name.to_string())
    }

    fn parse_prefix(&mut self) -> Result<usize> {
        let start = self.pos;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.consume_char()?;
        }
        let digits = &self.input[start..self.pos];
        if digits.is_empty() || digits.starts_with('0') {
            return Err(self.error("prefix length must be a positive integer"));
        }
        let prefix: usize = digits
            .parse()
            .map_err(|_| self.error("prefix length out of range"))?;
        if prefix > MAX_PREFIX {
            return Err(self.error(format!("prefix length must not exceed {}", MAX_PREFIX)));
        }
        Ok(prefix)
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn consume_char(&mut self) -> Result<char> {
        let ch = self
            .peek_char()
            .ok_or_else(|| self.error(format!("unexpected end of input at position {}", self.pos)))?;
        self.pos += ch.len_utf8();
        Ok(ch)
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::expression(self.raw, reason)
    }
}
