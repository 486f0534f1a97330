// Compiled template types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::expression::Expression;
use super::parser::TemplateParser;
use crate::error::{Error, Result};

/// An immutable, reusable URI template
///
/// Parsing happens once; expanding never mutates the template, so a single
/// instance can be shared across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pattern: String,
    parts: Vec<TemplatePart>,
    variables: Vec<String>,
}

/// A template consists of literal strings and expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Expression(Expression),
}

impl Template {
    pub fn parse(pattern: &str) -> Result<Self> {
        let parts = TemplateParser::parse(pattern)?;
        Ok(Self::new(pattern.to_string(), parts))
    }

    pub(crate) fn new(pattern: String, parts: Vec<TemplatePart>) -> Self {
        let mut variables: Vec<String> = Vec::new();
        for part in &parts {
            if let TemplatePart::Expression(expr) = part {
                for name in expr.names() {
                    if !variables.iter().any(|v| v == name) {
                        variables.push(name.to_string());
                    }
                }
            }
        }
        Self {
            pattern,
            parts,
            variables,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Every expression, in textual order
    pub fn expressions(&self) -> impl Iterator<Item = &Expression> {
        self.parts.iter().filter_map(|part| match part {
            TemplatePart::Expression(expr) => Some(expr),
            TemplatePart::Literal(_) => None,
        })
    }

    /// All variable names referenced anywhere in the template, without duplicates
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// A new template whose pattern is this one followed by `other`
    pub fn extend(&self, other: impl AsRef<str>) -> Result<Template> {
        Template::parse(&format!("{}{}", self.pattern, other.as_ref()))
    }

    pub fn metadata(&self) -> TemplateMetadata {
        TemplateMetadata::from_template(self)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pattern)
    }
}

impl FromStr for Template {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Template::parse(s)
    }
}

impl AsRef<str> for Template {
    fn as_ref(&self) -> &str {
        &self.pattern
    }
}

/// Serializable summary of a template's variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    pub pattern: String,
    pub variables: Vec<VariableMetadata>,
}

impl TemplateMetadata {
    pub fn from_template(template: &Template) -> Self {
        let variables = template
            .expressions()
            .flat_map(|expr| {
                let operator = expr.operator();
                expr.varspecs().iter().map(move |spec| VariableMetadata {
                    name: spec.name.clone(),
                    operator,
                    prefix: spec.prefix,
                    explode: spec.explode,
                    novalue: spec.novalue,
                })
            })
            .collect();

        Self {
            pattern: template.pattern().to_string(),
            variables,
        }
    }
}

/// Per-occurrence variable details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMetadata {
    pub name: String,
    pub operator: super::operation::Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<usize>,
    pub explode: bool,
    pub novalue: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variables_are_unique_and_ordered() {
        let template = Template::parse("{a}{+b,a}{?c,b}").unwrap();
        assert_eq!(template.variables(), &["a", "b", "c"]);
        assert_eq!(template.expressions().count(), 3);
    }

    #[test]
    fn test_extend_concatenates_patterns() {
        let base = Template::parse("/users/{id}").unwrap();
        let extended = base.extend("{?page}").unwrap();
        assert_eq!(extended.pattern(), "/users/{id}{?page}");
        assert_eq!(extended.variables(), &["id", "page"]);
        // the original is untouched
        assert_eq!(base.pattern(), "/users/{id}");
    }

    #[test]
    fn test_extend_with_template() {
        let base = Template::parse("/a").unwrap();
        let query = Template::parse("{?q}").unwrap();
        assert_eq!(base.extend(&query).unwrap().to_string(), "/a{?q}");
    }

    #[test]
    fn test_metadata_serializes() {
        let template = Template::parse("{/p*}{?q:3}").unwrap();
        let json = serde_json::to_value(template.metadata()).unwrap();
        assert_eq!(json["variables"][0]["operator"], "path");
        assert_eq!(json["variables"][0]["explode"], true);
        assert_eq!(json["variables"][1]["prefix"], 3);
        assert!(json["variables"][0].get("prefix").is_none());
    }
}
