// Values bound to template variables and the settle step that turns them
// into something an operation can render

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::Read;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use tokio::runtime::RuntimeFlavor;
use tokio::sync::watch;

use super::context::Context;
use crate::error::{Error, Result};

const DEFAULT_DEFERRED_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-expansion knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpandOptions {
    /// Upper bound on how long a pending value may be waited on
    pub deferred_timeout: Duration,
}

impl Default for ExpandOptions {
    fn default() -> Self {
        Self {
            deferred_timeout: DEFAULT_DEFERRED_TIMEOUT,
        }
    }
}

type Outcome = std::result::Result<Value, String>;
type Supplier = Arc<dyn Fn() -> Outcome + Send + Sync>;

/// A value bound to a template variable
#[derive(Clone)]
pub enum Value {
    Null,
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    /// Ordered name/value pairs
    Map(Vec<(String, Value)>),
    /// A nested context, rendered as its name/value pairs
    Context(Arc<dyn Context + Send + Sync>),
    Deferred(Deferred),
}

/// Values that only become concrete when an expansion asks for them
#[derive(Clone)]
pub enum Deferred {
    /// A supplier invoked on every settle; failures are reported against the variable
    Lazy(Supplier),
    /// A value completed elsewhere through a [`Completer`]
    Pending(watch::Receiver<Option<Outcome>>),
    /// A weak reference; a dropped referent is treated as null
    Weak(Weak<Value>),
    /// A stream read on demand; bytes already pulled are kept for later uses
    Reader(Arc<Mutex<ReaderState>>),
}

/// Bytes read so far, plus the rest of the stream until it hits EOF
pub struct ReaderState {
    source: Option<Box<dyn Read + Send>>,
    buffered: Vec<u8>,
}

impl ReaderState {
    /// Text of the stream, reading only as far as `limit` characters need
    fn text(&mut self, limit: Option<usize>) -> std::io::Result<String> {
        if let Some(source) = self.source.as_mut() {
            match limit {
                None => {
                    source.read_to_end(&mut self.buffered)?;
                    self.source = None;
                }
                Some(limit) => {
                    let mut chunk = [0u8; 256];
                    while String::from_utf8_lossy(&self.buffered).chars().count() <= limit {
                        let read = source.read(&mut chunk)?;
                        if read == 0 {
                            self.source = None;
                            break;
                        }
                        self.buffered.extend_from_slice(&chunk[..read]);
                    }
                }
            }
        }
        let text = String::from_utf8_lossy(&self.buffered);
        Ok(match limit {
            Some(limit) => text.chars().take(limit).collect(),
            None => text.into_owned(),
        })
    }
}

/// Completes the value handed out by [`Value::pending`]
pub struct Completer {
    tx: watch::Sender<Option<Outcome>>,
}

impl Completer {
    pub fn complete(self, value: impl Into<Value>) {
        self.tx.send_replace(Some(Ok(value.into())));
    }

    pub fn fail(self, reason: impl Into<String>) {
        self.tx.send_replace(Some(Err(reason.into())));
    }

    /// Cancel the pending value; any expansion waiting on it fails immediately
    pub fn cancel(self) {
        self.fail("cancelled");
    }
}

impl Value {
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(bytes.into())
    }

    pub fn chars(chars: &[char]) -> Self {
        Value::String(chars.iter().collect())
    }

    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn context(context: impl Context + Send + Sync + 'static) -> Self {
        Value::Context(Arc::new(context))
    }

    pub fn lazy<F, V>(supplier: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Value::Deferred(Deferred::Lazy(Arc::new(move || Ok(supplier().into()))))
    }

    pub fn try_lazy<F, V, E>(supplier: F) -> Self
    where
        F: Fn() -> std::result::Result<V, E> + Send + Sync + 'static,
        V: Into<Value>,
        E: fmt::Display,
    {
        Value::Deferred(Deferred::Lazy(Arc::new(move || {
            supplier().map(Into::into).map_err(|e| e.to_string())
        })))
    }

    /// A value that will be supplied later through the returned [`Completer`]
    pub fn pending() -> (Completer, Self) {
        let (tx, rx) = watch::channel(None);
        (Completer { tx }, Value::Deferred(Deferred::Pending(rx)))
    }

    pub fn weak(target: &Arc<Value>) -> Self {
        Value::Deferred(Deferred::Weak(Arc::downgrade(target)))
    }

    pub fn reader(reader: impl Read + Send + 'static) -> Self {
        Value::Deferred(Deferred::Reader(Arc::new(Mutex::new(ReaderState {
            source: Some(Box::new(reader)),
            buffered: Vec::new(),
        }))))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Resolve this value into its render-ready form
    ///
    /// Returns None for undefined values: null, empty lists and empty maps.
    /// `limit` bounds how many characters are drained from a reader.
    pub(crate) fn settle(
        &self,
        name: &str,
        limit: Option<usize>,
        options: &ExpandOptions,
    ) -> Result<Option<Resolved>> {
        match self {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(Resolved::Scalar(s.clone()))),
            Value::Bytes(bytes) => Ok(Some(Resolved::Scalar(URL_SAFE_NO_PAD.encode(bytes)))),
            Value::List(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(text) = item.flatten(name, options)? {
                        rendered.push(text);
                    }
                }
                Ok((!rendered.is_empty()).then_some(Resolved::List(rendered)))
            }
            Value::Map(pairs) => settle_pairs(name, pairs.iter().cloned(), options),
            Value::Context(context) => {
                let mut pairs = Vec::new();
                for key in context.names() {
                    if let Some(value) = context.resolve(&key)? {
                        pairs.push((key, value));
                    }
                }
                settle_pairs(name, pairs.into_iter(), options)
            }
            Value::Deferred(deferred) => deferred.force(name, limit, options)?.settle(name, limit, options),
        }
    }

    /// Render a nested value as a single string
    fn flatten(&self, name: &str, options: &ExpandOptions) -> Result<Option<String>> {
        Ok(self.settle(name, None, options)?.map(|resolved| match resolved {
            Resolved::Scalar(s) => s,
            Resolved::List(items) => items.join(","),
            Resolved::Pairs(pairs) => pairs
                .into_iter()
                .flat_map(|(k, v)| [k, v])
                .collect::<Vec<_>>()
                .join(","),
        }))
    }
}

fn settle_pairs(
    name: &str,
    pairs: impl Iterator<Item = (String, Value)>,
    options: &ExpandOptions,
) -> Result<Option<Resolved>> {
    let mut rendered = Vec::new();
    for (key, value) in pairs {
        if let Some(text) = value.flatten(name, options)? {
            rendered.push((key, text));
        }
    }
    Ok((!rendered.is_empty()).then_some(Resolved::Pairs(rendered)))
}

impl Deferred {
    fn force(&self, name: &str, limit: Option<usize>, options: &ExpandOptions) -> Result<Value> {
        match self {
            Deferred::Lazy(supplier) => supplier().map_err(|reason| Error::resolution(name, reason)),
            Deferred::Pending(rx) => wait_pending(rx, name, options.deferred_timeout),
            Deferred::Weak(weak) => Ok(weak.upgrade().map(|v| (*v).clone()).unwrap_or(Value::Null)),
            Deferred::Reader(state) => {
                let mut state = state
                    .lock()
                    .map_err(|_| Error::resolution(name, "reader lock poisoned"))?;
                let text = state
                    .text(limit)
                    .map_err(|e| Error::resolution(name, e.to_string()))?;
                Ok(Value::String(text))
            }
        }
    }
}

fn finish(name: &str, outcome: Outcome) -> Result<Value> {
    outcome.map_err(|reason| Error::resolution(name, reason))
}

fn wait_pending(
    rx: &watch::Receiver<Option<Outcome>>,
    name: &str,
    timeout: Duration,
) -> Result<Value> {
    let ready = rx.borrow().clone();
    if let Some(outcome) = ready {
        return finish(name, outcome);
    }

    let mut rx = rx.clone();
    let mut wait = move || -> Result<Value> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| Error::resolution(name, e.to_string()))?;
        let outcome = runtime.block_on(async {
            match tokio::time::timeout(timeout, rx.wait_for(Option::is_some)).await {
                Ok(Ok(slot)) => Ok((*slot).clone()),
                Ok(Err(_)) => Err(Error::resolution(name, "completer dropped without a value")),
                Err(_) => Err(Error::Timeout {
                    name: name.to_string(),
                    timeout,
                }),
            }
        })?;
        match outcome {
            Some(outcome) => finish(name, outcome),
            None => Err(Error::resolution(name, "completer dropped without a value")),
        }
    };

    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        return wait();
    };
    match handle.runtime_flavor() {
        // Blocking the only worker would starve whatever task holds the completer
        RuntimeFlavor::CurrentThread => Err(Error::resolution(
            name,
            "pending value is not complete and cannot be awaited on a current-thread runtime",
        )),
        // A runtime cannot be driven from inside another one, so park a helper thread instead
        _ => tokio::task::block_in_place(|| {
            std::thread::scope(|scope| {
                scope
                    .spawn(wait)
                    .join()
                    .unwrap_or_else(|_| Err(Error::resolution(name, "deferred wait panicked")))
            })
        }),
    }
}

/// A settled value, ready for an operation to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Scalar(String),
    List(Vec<String>),
    Pairs(Vec<(String, String)>),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Map(pairs) => f.debug_tuple("Map").field(pairs).finish(),
            Value::Context(context) => f.debug_tuple("Context").field(&context.names()).finish(),
            Value::Deferred(deferred) => f.debug_tuple("Deferred").field(deferred).finish(),
        }
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deferred::Lazy(_) => write!(f, "Lazy"),
            Deferred::Pending(rx) => write!(f, "Pending(ready: {})", rx.borrow().is_some()),
            Deferred::Weak(weak) => write!(f, "Weak(alive: {})", weak.strong_count() > 0),
            Deferred::Reader(_) => write!(f, "Reader"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

macro_rules! value_from_display {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::String(value.to_string())
            }
        })*
    };
}

value_from_display!(char, bool, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::list(items)
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Value {
    fn from(items: &[T]) -> Self {
        Value::list(items.iter().cloned())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Value {
    fn from(items: [T; N]) -> Self {
        Value::list(items)
    }
}

impl<K: Into<String>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(map: BTreeMap<K, V>) -> Self {
        Value::map(map)
    }
}

/// Keys are sorted so the rendering does not depend on hash order
impl<K: Into<String>, V: Into<Value>> From<HashMap<K, V>> for Value {
    fn from(map: HashMap<K, V>) -> Self {
        let mut pairs: Vec<(String, Value)> =
            map.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Value::Map(pairs)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => b.into(),
            serde_json::Value::Number(n) => Value::String(n.to_string()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::list(items),
            serde_json::Value::Object(map) => Value::map(map),
        }
    }
}
