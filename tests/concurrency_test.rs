// A compiled template and its context shared across threads

use std::sync::Arc;
use std::thread;

use hrefkit::template::{MapContext, Template, Value};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn test_public_types_are_thread_safe() {
    assert_send_sync::<Template>();
    assert_send_sync::<MapContext>();
    assert_send_sync::<Value>();
}

#[test]
fn test_shared_template_expands_concurrently() {
    let template = Arc::new(Template::parse("https://api.example.com/users/{id}{/tabs*}{?page}").unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let template = Arc::clone(&template);
            thread::spawn(move || {
                let context = MapContext::new()
                    .with("id", i)
                    .with("tabs", vec!["repos", "stars"])
                    .with("page", i * 10);
                template.expand(&context).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(
            handle.join().unwrap(),
            format!("https://api.example.com/users/{}/repos/stars?page={}", i, i * 10)
        );
    }
}

#[test]
fn test_shared_context_with_lazy_value() {
    let context = Arc::new(
        MapContext::new()
            .with("host", "example.com")
            .with("token", Value::lazy(|| "t0k3n")),
    );
    let template = Arc::new(Template::parse("https://{host}/feed{?token}").unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let context = Arc::clone(&context);
            let template = Arc::clone(&template);
            thread::spawn(move || template.expand(context.as_ref()).unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), "https://example.com/feed?token=t0k3n");
    }
}
