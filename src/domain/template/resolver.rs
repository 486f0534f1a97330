// Template expansion against a variable context

use tracing::{debug, trace};

use super::ast::{Template, TemplatePart};
use super::context::{Context, MapContext, NamedFieldSource, ObjectContext};
use super::value::{ExpandOptions, Value};
use crate::error::Result;

impl Template {
    /// Expand with default options
    pub fn expand(&self, context: &dyn Context) -> Result<String> {
        self.expand_with(context, &ExpandOptions::default())
    }

    /// Expand every expression and splice the results between the literals
    ///
    /// Any failing expression aborts the whole expansion.
    pub fn expand_with(&self, context: &dyn Context, options: &ExpandOptions) -> Result<String> {
        let mut result = String::with_capacity(self.pattern().len());

        for part in self.parts() {
            match part {
                TemplatePart::Literal(s) => result.push_str(s),
                TemplatePart::Expression(expr) => {
                    let expanded = expr.evaluate(context, options)?;
                    trace!(expression = %expr, %expanded, "evaluated expression");
                    result.push_str(&expanded);
                }
            }
        }

        debug!(template = %self.pattern(), iri = context.is_iri(), "expanded template");
        Ok(result)
    }

    /// Expand against an ad-hoc set of name/value pairs
    pub fn expand_map<I, K, V>(&self, variables: I) -> Result<String>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let context: MapContext = variables.into_iter().collect();
        self.expand(&context)
    }

    /// Expand against the registered fields of an object
    pub fn expand_object<T: NamedFieldSource>(&self, target: &T) -> Result<String> {
        self.expand(&ObjectContext::new(target))
    }
}

/// Parse and expand in one step
pub fn expand_str(pattern: &str, context: &dyn Context) -> Result<String> {
    Template::parse(pattern)?.expand(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::template::context::FieldRegistry;
    use crate::error::Error;

    #[test]
    fn test_expand_simple_variable() {
        let template = Template::parse("https://example.com/{query}").unwrap();
        let result = template.expand_map([("query", "rust templates")]).unwrap();
        assert_eq!(result, "https://example.com/rust%20templates");
    }

    #[test]
    fn test_expand_full_url() {
        let template = Template::parse("http://{user}.example.org{/path}{?a,b}{#c}").unwrap();
        let context = MapContext::new()
            .with("user", "john")
            .with("path", vec!["x", "y", "z"])
            .with("a", 1)
            .with("b", 2)
            .with("c", "abc");
        assert_eq!(
            template.expand(&context).unwrap(),
            "http://john.example.org/x/y/z?a=1&b=2#abc"
        );
    }

    #[test]
    fn test_missing_variables_collapse() {
        let template = Template::parse("/search{?q,page}").unwrap();
        assert_eq!(template.expand(&MapContext::new()).unwrap(), "/search");
        assert_eq!(
            template.expand_map([("page", 2)]).unwrap(),
            "/search?page=2"
        );
    }

    #[test]
    fn test_identical_expressions_expand_identically() {
        let template = Template::parse("{x}-{x}").unwrap();
        assert_eq!(template.expand_map([("x", "a b")]).unwrap(), "a%20b-a%20b");
    }

    #[test]
    fn test_literals_are_copied_verbatim() {
        let template = Template::parse("/a b/%zz/{x}").unwrap();
        assert_eq!(template.expand_map([("x", "y")]).unwrap(), "/a b/%zz/y");
    }

    #[test]
    fn test_expand_str() {
        let context = MapContext::new().with("id", 42);
        assert_eq!(expand_str("/users/{id}", &context).unwrap(), "/users/42");
        assert!(expand_str("/users/{id", &context).is_err());
    }

    struct Article {
        slug: String,
        tags: Vec<String>,
    }

    impl NamedFieldSource for Article {
        fn fields() -> FieldRegistry<Self> {
            FieldRegistry::new()
                .field("slug", |a: &Article| a.slug.clone())
                .field("tags", |a: &Article| a.tags.clone())
        }
    }

    #[test]
    fn test_expand_object() {
        let article = Article {
            slug: "hello-world".into(),
            tags: vec!["rust".into(), "uri".into()],
        };
        let template = Template::parse("/posts/{slug}{?tags*}").unwrap();
        assert_eq!(
            template.expand_object(&article).unwrap(),
            "/posts/hello-world?tags=rust&tags=uri"
        );
    }

    #[test]
    fn test_resolution_failure_aborts_expansion() {
        let registry: FieldRegistry<()> =
            FieldRegistry::new().try_field("boom", |_: &()| Err::<String, _>("accessor failed"));
        let context = ObjectContext::with_fields(&(), registry);
        let template = Template::parse("/x/{boom}").unwrap();
        match template.expand(&context) {
            Err(Error::Resolution { name, reason }) => {
                assert_eq!(name, "boom");
                assert!(reason.contains("accessor failed"));
            }
            other => panic!("Expected resolution error, got {:?}", other),
        }
    }
}
