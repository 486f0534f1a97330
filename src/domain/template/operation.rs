// Expansion strategies, one per expression operator

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::context::Context;
use super::expression::{Expression, VarSpec};
use super::value::{ExpandOptions, Resolved};
use crate::encoding::{encode_reserved, encode_unreserved};
use crate::error::{Error, Result};

/// The operator selecting an expression's expansion style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    Simple,
    Reserved,
    Fragment,
    Label,
    Path,
    PathParam,
    Query,
    Continuation,
}

impl Operator {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Operator::Reserved),
            '#' => Some(Operator::Fragment),
            '.' => Some(Operator::Label),
            '/' => Some(Operator::Path),
            ';' => Some(Operator::PathParam),
            '?' => Some(Operator::Query),
            '&' => Some(Operator::Continuation),
            _ => None,
        }
    }

    pub fn as_char(self) -> Option<char> {
        match self {
            Operator::Simple => None,
            Operator::Reserved => Some('+'),
            Operator::Fragment => Some('#'),
            Operator::Label => Some('.'),
            Operator::Path => Some('/'),
            Operator::PathParam => Some(';'),
            Operator::Query => Some('?'),
            Operator::Continuation => Some('&'),
        }
    }
}

/// Rendering parameters of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    /// Emitted once before the first defined variable
    pub first: &'static str,
    /// Joins variables, and exploded members
    pub separator: &'static str,
    /// Joins the members of a non-exploded list
    pub list_joiner: &'static str,
    /// Whether values are written as `name=value`
    pub named: bool,
    /// Written after the name when the value is empty
    pub if_empty: &'static str,
    pub allow_reserved: bool,
}

/// Strategy for expanding one expression
pub trait Operation: Send + Sync {
    fn operator(&self) -> Operator;

    fn style(&self) -> &Style;

    /// Render one variable; None omits it from the output
    fn render(&self, spec: &VarSpec, binding: Binding, iri: bool) -> Option<String>;

    fn evaluate(
        &self,
        expression: &Expression,
        context: &dyn Context,
        options: &ExpandOptions,
    ) -> Result<String> {
        let style = self.style();
        let mut parts = Vec::with_capacity(expression.varspecs().len());
        for spec in expression.varspecs() {
            let binding = bind(spec, context, options)?;
            trace!(variable = %spec.name, ?binding, "bound variable");
            if let Some(part) = self.render(spec, binding, context.is_iri()) {
                parts.push(part);
            }
        }
        if parts.is_empty() {
            return Ok(String::new());
        }
        Ok(format!("{}{}", style.first, parts.join(style.separator)))
    }
}

/// What a variable resolved to for a single expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The context does not know the variable
    Absent,
    /// Known, but null or an empty composite
    Undefined,
    Defined(Resolved),
}

fn bind(spec: &VarSpec, context: &dyn Context, options: &ExpandOptions) -> Result<Binding> {
    if !context.contains(&spec.name) {
        return Ok(Binding::Absent);
    }
    let Some(value) = context.resolve(&spec.name)? else {
        return Ok(Binding::Absent);
    };
    Ok(match value.settle(&spec.name, spec.prefix, options)? {
        Some(resolved) => Binding::Defined(resolved),
        None => Binding::Undefined,
    })
}

fn encode(style: &Style, value: &str, iri: bool) -> String {
    if style.allow_reserved {
        encode_reserved(value, iri)
    } else {
        encode_unreserved(value, iri)
    }
}

/// Truncate to the first `prefix` characters of the unencoded value
fn truncate(value: &str, prefix: Option<usize>) -> &str {
    match prefix.and_then(|n| value.char_indices().nth(n)) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

fn render_unnamed(style: &Style, spec: &VarSpec, binding: Binding, iri: bool) -> Option<String> {
    let Binding::Defined(value) = binding else {
        return None;
    };
    Some(match value {
        Resolved::Scalar(s) => encode(style, truncate(&s, spec.prefix), iri),
        Resolved::List(items) => {
            let joiner = if spec.explode { style.separator } else { style.list_joiner };
            items
                .iter()
                .map(|item| encode(style, item, iri))
                .collect::<Vec<_>>()
                .join(joiner)
        }
        Resolved::Pairs(pairs) if spec.explode => pairs
            .iter()
            .map(|(k, v)| format!("{}={}", encode(style, k, iri), encode(style, v, iri)))
            .collect::<Vec<_>>()
            .join(style.separator),
        Resolved::Pairs(pairs) => pairs
            .iter()
            .flat_map(|(k, v)| [encode(style, k, iri), encode(style, v, iri)])
            .collect::<Vec<_>>()
            .join(","),
    })
}

fn render_named(style: &Style, spec: &VarSpec, binding: Binding, iri: bool) -> Option<String> {
    let name = spec.name.as_str();
    let named_value = |key: &str, value: &str| {
        if value.is_empty() {
            format!("{}{}", key, style.if_empty)
        } else {
            format!("{}={}", key, value)
        }
    };

    match binding {
        Binding::Absent => None,
        Binding::Undefined => spec.novalue.then(|| name.to_string()),
        Binding::Defined(Resolved::Scalar(s)) => {
            Some(named_value(name, &encode(style, truncate(&s, spec.prefix), iri)))
        }
        Binding::Defined(Resolved::List(items)) if spec.explode => Some(
            items
                .iter()
                .map(|item| named_value(name, &encode(style, item, iri)))
                .collect::<Vec<_>>()
                .join(style.separator),
        ),
        Binding::Defined(Resolved::List(items)) => {
            let joined = items
                .iter()
                .map(|item| encode(style, item, iri))
                .collect::<Vec<_>>()
                .join(style.list_joiner);
            Some(named_value(name, &joined))
        }
        Binding::Defined(Resolved::Pairs(pairs)) if spec.explode => Some(
            pairs
                .iter()
                .map(|(k, v)| named_value(&encode(style, k, iri), &encode(style, v, iri)))
                .collect::<Vec<_>>()
                .join(style.separator),
        ),
        Binding::Defined(Resolved::Pairs(pairs)) => {
            let joined = pairs
                .iter()
                .flat_map(|(k, v)| [encode(style, k, iri), encode(style, v, iri)])
                .collect::<Vec<_>>()
                .join(",");
            Some(named_value(name, &joined))
        }
    }
}

/// The built-in strategy: an operator plus its row of the style table
///
/// Named styles (`;`, `?`, `&`) write `name=value` pairs; the rest write bare
/// values. Label (`.`) and path (`/`) join list members with their own
/// delimiter whether or not they are exploded.
pub struct TableOperation {
    operator: Operator,
    style: Style,
}

impl Operation for TableOperation {
    fn operator(&self) -> Operator {
        self.operator
    }

    fn style(&self) -> &Style {
        &self.style
    }

    fn render(&self, spec: &VarSpec, binding: Binding, iri: bool) -> Option<String> {
        if self.style.named {
            render_named(&self.style, spec, binding, iri)
        } else {
            render_unnamed(&self.style, spec, binding, iri)
        }
    }
}

const fn unnamed(first: &'static str, separator: &'static str, list_joiner: &'static str, allow_reserved: bool) -> Style {
    Style {
        first,
        separator,
        list_joiner,
        named: false,
        if_empty: "",
        allow_reserved,
    }
}

const fn named(first: &'static str, separator: &'static str, if_empty: &'static str) -> Style {
    Style {
        first,
        separator,
        list_joiner: ",",
        named: true,
        if_empty,
        allow_reserved: false,
    }
}

static SIMPLE: TableOperation = TableOperation {
    operator: Operator::Simple,
    style: unnamed("", ",", ",", false),
};

static RESERVED: TableOperation = TableOperation {
    operator: Operator::Reserved,
    style: unnamed("", ",", ",", true),
};

static FRAGMENT: TableOperation = TableOperation {
    operator: Operator::Fragment,
    style: unnamed("#", ",", ",", true),
};

static LABEL: TableOperation = TableOperation {
    operator: Operator::Label,
    style: unnamed(".", ".", ".", false),
};

static PATH: TableOperation = TableOperation {
    operator: Operator::Path,
    style: unnamed("/", "/", "/", false),
};

static PATH_PARAM: TableOperation = TableOperation {
    operator: Operator::PathParam,
    style: named(";", ";", ""),
};

static QUERY: TableOperation = TableOperation {
    operator: Operator::Query,
    style: named("?", "&", "="),
};

static CONTINUATION: TableOperation = TableOperation {
    operator: Operator::Continuation,
    style: named("&", "&", "="),
};

/// The strategy for an operator
pub fn for_operator(operator: Operator) -> &'static dyn Operation {
    match operator {
        Operator::Simple => &SIMPLE,
        Operator::Reserved => &RESERVED,
        Operator::Fragment => &FRAGMENT,
        Operator::Label => &LABEL,
        Operator::Path => &PATH,
        Operator::PathParam => &PATH_PARAM,
        Operator::Query => &QUERY,
        Operator::Continuation => &CONTINUATION,
    }
}

/// Look up the strategy for an operator character
pub fn get(c: char) -> Result<&'static dyn Operation> {
    Operator::from_char(c)
        .map(for_operator)
        .ok_or(Error::UnsupportedOperator(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: &str) -> Binding {
        Binding::Defined(Resolved::Scalar(s.to_string()))
    }

    fn list(items: &[&str]) -> Binding {
        Binding::Defined(Resolved::List(items.iter().map(|s| s.to_string()).collect()))
    }

    #[test]
    fn test_get_known_operators() {
        for c in ['+', '#', '.', '/', ';', '?', '&'] {
            let op = get(c).unwrap();
            assert_eq!(op.operator().as_char(), Some(c));
        }
    }

    #[test]
    fn test_get_unknown_operator_fails() {
        assert!(matches!(get('!'), Err(Error::UnsupportedOperator('!'))));
        assert!(matches!(get('x'), Err(Error::UnsupportedOperator('x'))));
    }

    #[test]
    fn test_named_flag_selects_rendering() {
        for c in ['+', '#', '.', '/', ';', '?', '&'] {
            let op = get(c).unwrap();
            assert_eq!(op.style().named, matches!(c, ';' | '?' | '&'), "operator {}", c);
            let rendered = op.render(&VarSpec::new("v"), scalar("x"), false).unwrap();
            assert_eq!(rendered.starts_with("v="), op.style().named, "operator {}", c);
        }
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("value", Some(3)), "val");
        assert_eq!(truncate("value", Some(30)), "value");
        assert_eq!(truncate("\u{e9}t\u{e9}", Some(2)), "\u{e9}t");
        assert_eq!(truncate("value", None), "value");
    }

    #[test]
    fn test_query_renders_empty_with_equals() {
        let op = for_operator(Operator::Query);
        assert_eq!(op.render(&VarSpec::new("e"), scalar(""), false), Some("e=".into()));
    }

    #[test]
    fn test_path_param_drops_equals_when_empty() {
        let op = for_operator(Operator::PathParam);
        assert_eq!(op.render(&VarSpec::new("e"), scalar(""), false), Some("e".into()));
    }

    #[test]
    fn test_novalue_renders_bare_name() {
        let op = for_operator(Operator::Query);
        let spec = VarSpec::new("flag").with_novalue(true);
        assert_eq!(op.render(&spec, Binding::Undefined, false), Some("flag".into()));
        assert_eq!(op.render(&spec, Binding::Absent, false), None);
        assert_eq!(op.render(&VarSpec::new("flag"), Binding::Undefined, false), None);
    }

    #[test]
    fn test_explode_under_continuation() {
        let op = for_operator(Operator::Continuation);
        let exploded = VarSpec::new("list").with_explode(true);
        assert_eq!(
            op.render(&exploded, list(&["a", "b"]), false),
            Some("list=a&list=b".into())
        );
        assert_eq!(
            op.render(&VarSpec::new("list"), list(&["a", "b"]), false),
            Some("list=a,b".into())
        );
    }

    #[test]
    fn test_path_joins_lists_with_slash() {
        let op = for_operator(Operator::Path);
        assert_eq!(
            op.render(&VarSpec::new("p"), list(&["x", "y"]), false),
            Some("x/y".into())
        );
    }
}
