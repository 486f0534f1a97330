// Fixtures shared across integration tests

use hrefkit::template::{MapContext, Value};

/// The variable set used throughout RFC 6570's examples
#[allow(dead_code)]
pub fn rfc6570_context() -> MapContext {
    MapContext::new()
        .with("count", vec!["one", "two", "three"])
        .with("dom", vec!["example", "com"])
        .with("dub", "me/too")
        .with("hello", "Hello World!")
        .with("half", "50%")
        .with("var", "value")
        .with("who", "fred")
        .with("base", "http://example.com/home/")
        .with("path", "/foo/bar")
        .with("list", vec!["red", "green", "blue"])
        .with("keys", Value::map([("semi", ";"), ("dot", "."), ("comma", ",")]))
        .with("v", 6)
        .with("x", 1024)
        .with("y", 768)
        .with("empty", "")
        .with("empty_keys", Value::Map(Vec::new()))
        .with("undef", Value::Null)
}

/// Assert that every `(template, expected)` pair expands as expected
#[allow(dead_code)]
pub fn assert_expansions(context: &MapContext, cases: &[(&str, &str)]) {
    for (pattern, expected) in cases {
        let actual = hrefkit::template::expand_str(pattern, context)
            .unwrap_or_else(|e| panic!("expanding {} failed: {}", pattern, e));
        assert_eq!(actual, *expected, "template {}", pattern);
    }
}
