// Template module for RFC 6570 URI templates
//
// This module provides parsing and expansion of URI templates against
// pluggable variable contexts.

mod ast;
pub mod context;
pub mod expression;
pub mod operation;
mod parser;
mod resolver;
pub mod value;

pub use ast::{Template, TemplateMetadata, TemplatePart, VariableMetadata};
pub use context::{
    CachingContext, Context, DefaultingContext, FieldRegistry, MapContext, MultiContext,
    NamedFieldSource, ObjectContext,
};
pub use expression::{Expression, VarSpec};
pub use operation::{Binding, Operation, Operator, Style};
pub use parser::TemplateParser;
pub use resolver::expand_str;
pub use value::{Completer, Deferred, ExpandOptions, Resolved, Value};
