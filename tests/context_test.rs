// Integration tests for the context family used during expansion

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hrefkit::template::{
    Context, DefaultingContext, FieldRegistry, MapContext, MultiContext, NamedFieldSource, ObjectContext, Template,
    Value,
};
use hrefkit::Error;

mod common;

struct Repository {
    owner: String,
    name: String,
    topics: Vec<String>,
    archived: Option<bool>,
}

impl NamedFieldSource for Repository {
    fn fields() -> FieldRegistry<Self> {
        FieldRegistry::new()
            .field("owner", |r: &Repository| r.owner.clone())
            .field("repo", |r: &Repository| r.name.clone())
            .field("topics", |r: &Repository| r.topics.clone())
            .field("archived", |r: &Repository| r.archived)
    }
}

fn sample_repository() -> Repository {
    Repository {
        owner: "rust-lang".into(),
        name: "rust".into(),
        topics: vec!["compiler".into(), "language".into()],
        archived: None,
    }
}

#[test]
fn test_object_fields_as_variables() {
    let template = Template::parse("https://example.com/repos/{owner}/{repo}{?topics*,archived}").unwrap();
    let expanded = template.expand_object(&sample_repository()).unwrap();
    assert_eq!(
        expanded,
        "https://example.com/repos/rust-lang/rust?topics=compiler&topics=language"
    );
}

#[test]
fn test_object_none_field_renders_with_novalue() {
    let template = Template::parse("{?archived^}").unwrap();
    assert_eq!(template.expand_object(&sample_repository()).unwrap(), "?archived");
}

#[test]
fn test_object_accessor_failure_is_tagged() {
    let registry = FieldRegistry::new().try_field("stars", |_: &Repository| -> Result<u32, String> {
        Err("rate limited".to_string())
    });
    let repository = sample_repository();
    let context = ObjectContext::with_fields(&repository, registry);
    let err = Template::parse("{stars}").unwrap().expand(&context).unwrap_err();
    match err {
        Error::Resolution { name, reason } => {
            assert_eq!(name, "stars");
            assert_eq!(reason, "rate limited");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_object_fields_memoized_per_instance() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let registry = FieldRegistry::new().field("owner", move |r: &Repository| {
        counter.fetch_add(1, Ordering::SeqCst);
        r.owner.clone()
    });
    let repository = sample_repository();
    let context = ObjectContext::with_fields(&repository, registry);

    let template = Template::parse("{owner}/{owner}{?owner}").unwrap();
    assert_eq!(template.expand(&context).unwrap(), "rust-lang/rust-lang?owner=rust-lang");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_multi_context_layers() {
    let repository = sample_repository();
    let overrides = MapContext::new().with("repo", "cargo");
    let multi = MultiContext::new()
        .with(overrides)
        .with(ObjectContext::new(&repository))
        .with(common::rfc6570_context());

    let template = Template::parse("/{owner}/{repo}{?var}").unwrap();
    assert_eq!(template.expand(&multi).unwrap(), "/rust-lang/cargo?var=value");
    assert!(multi.names().contains(&"topics".to_string()));
}

#[test]
fn test_defaulting_context_fills_nulls() {
    let request = MapContext::new().with("page", Value::Null).with("q", "rust");
    let defaults = MapContext::new().with("page", 1).with("per_page", 30);
    let context = DefaultingContext::new(request, defaults);

    let template = Template::parse("/search{?q,page,per_page}").unwrap();
    assert_eq!(template.expand(&context).unwrap(), "/search?q=rust&page=1&per_page=30");
}

#[test]
fn test_nested_context_renders_as_pairs() {
    let filters = MapContext::new().with("lang", "en").with("sort", "stars");
    let context = MapContext::new().with("filters", Value::context(filters));

    common::assert_expansions(
        &context,
        &[
            ("{?filters*}", "?lang=en&sort=stars"),
            ("{;filters}", ";filters=lang,en,sort,stars"),
        ],
    );
}

#[test]
fn test_cached_context_forces_lazy_supplier_per_expansion_only() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let context = MapContext::new()
        .with(
            "token",
            Value::lazy(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "abc"
            }),
        )
        .cached();

    let template = Template::parse("{?token}").unwrap();
    assert_eq!(template.expand(&context).unwrap(), "?token=abc");
    assert!(calls.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_custom_context_implementation() {
    struct Env;

    impl Context for Env {
        fn contains(&self, name: &str) -> bool {
            name.starts_with("env_")
        }

        fn resolve(&self, name: &str) -> hrefkit::Result<Option<Value>> {
            Ok(self.contains(name).then(|| Value::from(name.trim_start_matches("env_").to_uppercase())))
        }

        fn names(&self) -> Vec<String> {
            Vec::new()
        }

        fn is_iri(&self) -> bool {
            true
        }
    }

    let template = Template::parse("{/env_home,other}").unwrap();
    assert_eq!(template.expand(&Env).unwrap(), "/HOME");
}
