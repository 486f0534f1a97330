// Template parser using recursive descent

use tracing::debug;

use super::ast::TemplatePart;
use super::expression::Expression;
use crate::error::{Error, Result};

pub struct TemplateParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TemplateParser<'a> {
    /// Split a pattern into literal runs and parsed expressions
    pub fn parse(template: &'a str) -> Result<Vec<TemplatePart>> {
        let mut parser = Self {
            input: template,
            pos: 0,
        };
        let parts = parser.parse_template()?;
        debug!(
            template,
            expressions = parts
                .iter()
                .filter(|p| matches!(p, TemplatePart::Expression(_)))
                .count(),
            "compiled template"
        );
        Ok(parts)
    }

    fn parse_template(&mut self) -> Result<Vec<TemplatePart>> {
        let mut parts = Vec::new();
        let mut literal_buf = String::new();

        while let Some(ch) = self.peek_char() {
            match ch {
                '{' => {
                    // Flush literal buffer before the expression
                    if !literal_buf.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal_buf)));
                    }
                    let expr = self.parse_expression()?;
                    parts.push(TemplatePart::Expression(expr));
                }
                '}' => {
                    return Err(self.error(format!("unexpected closing brace at position {}", self.pos)));
                }
                _ => literal_buf.push(self.consume_char()?),
            }
        }

        if !literal_buf.is_empty() {
            parts.push(TemplatePart::Literal(literal_buf));
        }

        Ok(parts)
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        let open = self.pos;
        self.expect_char('{')?;
        let start = self.pos;

        loop {
            match self.peek_char() {
                Some('}') => break,
                Some('{') => {
                    return Err(self.error(format!("nested opening brace at position {}", self.pos)));
                }
                Some(_) => {
                    self.consume_char()?;
                }
                None => {
                    return Err(self.error(format!("unclosed expression starting at position {}", open)));
                }
            }
        }

        let body = &self.input[start..self.pos];
        self.expect_char('}')?;
        Expression::parse(body)
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

    fn expect_char(&mut self, expected: char) -> Result<()> {
        match self.peek_char() {
            Some(ch) if ch == expected => {
                self.consume_char()?;
                Ok(())
            }
            Some(ch) => Err(self.error(format!(
                "expected '{}' but found '{}' at position {}",
                expected, ch, self.pos
            ))),
            None => Err(self.error(format!("expected '{}' but found end of input", expected))),
        }
    }

    fn error(&self, reason: String) -> Error {
        Error::Template {
            template: self.input.to_string(),
            reason,
        }
    }
}
