// Variable sources consulted during template expansion

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::value::Value;
use crate::error::{Error, Result};

/// A named-variable resolver
///
/// `resolve` must return `Ok(None)` whenever `contains` is false.
pub trait Context {
    fn contains(&self, name: &str) -> bool;

    fn resolve(&self, name: &str) -> Result<Option<Value>>;

    /// Known variable names, in the context's own iteration order
    fn names(&self) -> Vec<String>;

    /// Selects the IRI encoding profile (non-ASCII passes through unencoded)
    fn is_iri(&self) -> bool {
        false
    }

    /// Memoize this context's resolutions for the lifetime of the wrapper
    fn cached(self) -> CachingContext<Self>
    where
        Self: Sized,
    {
        CachingContext::new(self)
    }
}

impl<C: Context + ?Sized> Context for &C {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>> {
        (**self).resolve(name)
    }

    fn names(&self) -> Vec<String> {
        (**self).names()
    }

    fn is_iri(&self) -> bool {
        (**self).is_iri()
    }
}

impl<C: Context + ?Sized> Context for Box<C> {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>> {
        (**self).resolve(name)
    }

    fn names(&self) -> Vec<String> {
        (**self).names()
    }

    fn is_iri(&self) -> bool {
        (**self).is_iri()
    }
}

impl<C: Context + ?Sized> Context for Arc<C> {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>> {
        (**self).resolve(name)
    }

    fn names(&self) -> Vec<String> {
        (**self).names()
    }

    fn is_iri(&self) -> bool {
        (**self).is_iri()
    }
}

/// Per-instance memo of resolved values; not meant to be shared across threads
#[derive(Default)]
struct ResolveCache {
    entries: RefCell<HashMap<String, Option<Value>>>,
}

impl ResolveCache {
    fn get_or_resolve(
        &self,
        name: &str,
        resolve: impl FnOnce() -> Result<Option<Value>>,
    ) -> Result<Option<Value>> {
        let hit = self.entries.borrow().get(name).cloned();
        if let Some(value) = hit {
            trace!(variable = name, "cache hit");
            return Ok(value);
        }
        let value = resolve()?;
        self.entries
            .borrow_mut()
            .insert(name.to_string(), value.clone());
        Ok(value)
    }
}

fn union_names<'c>(contexts: impl Iterator<Item = &'c dyn Context>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for context in contexts {
        for name in context.names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Insertion-ordered name to value mapping
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    entries: Vec<(String, Value)>,
    iri: bool,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_iri(mut self, iri: bool) -> Self {
        self.iri = iri;
        self
    }

    /// Bind a variable, keeping its original position if it was already bound
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MapContext {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut context = MapContext::new();
        for (name, value) in iter {
            context.insert(name, value);
        }
        context
    }
}

impl Context for MapContext {
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.get(name).cloned())
    }

    fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    fn is_iri(&self) -> bool {
        self.iri
    }
}

type Accessor<T> = Arc<dyn Fn(&T) -> std::result::Result<Value, String> + Send + Sync>;

/// Explicitly registered accessors exposing a type's fields as variables
pub struct FieldRegistry<T> {
    fields: Vec<(String, Accessor<T>)>,
}

impl<T> FieldRegistry<T> {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Register an accessor under `name`, replacing any earlier registration
    pub fn field<F, V>(self, name: &str, accessor: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.register(name, Arc::new(move |target| Ok(accessor(target).into())))
    }

    /// Register an accessor that may fail; failures surface as resolution errors
    pub fn try_field<F, V, E>(self, name: &str, accessor: F) -> Self
    where
        F: Fn(&T) -> std::result::Result<V, E> + Send + Sync + 'static,
        V: Into<Value>,
        E: fmt::Display,
    {
        self.register(
            name,
            Arc::new(move |target| accessor(target).map(Into::into).map_err(|e| e.to_string())),
        )
    }

    fn register(mut self, name: &str, accessor: Accessor<T>) -> Self {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = accessor,
            None => self.fields.push((name.to_string(), accessor)),
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    fn accessor(&self, name: &str) -> Option<&Accessor<T>> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }
}

impl<T> Default for FieldRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FieldRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
        }
    }
}

/// Types that declare which of their fields are template variables
pub trait NamedFieldSource: Sized {
    fn fields() -> FieldRegistry<Self>;
}

/// Exposes an object's registered fields as variables
///
/// Each field is read at most once per context instance.
pub struct ObjectContext<'a, T> {
    target: &'a T,
    registry: FieldRegistry<T>,
    iri: bool,
    cache: ResolveCache,
}

impl<'a, T: NamedFieldSource> ObjectContext<'a, T> {
    pub fn new(target: &'a T) -> Self {
        Self::with_fields(target, T::fields())
    }
}

impl<'a, T> ObjectContext<'a, T> {
    pub fn with_fields(target: &'a T, registry: FieldRegistry<T>) -> Self {
        Self {
            target,
            registry,
            iri: false,
            cache: ResolveCache::default(),
        }
    }

    pub fn with_iri(mut self, iri: bool) -> Self {
        self.iri = iri;
        self
    }
}

impl<T> Context for ObjectContext<'_, T> {
    fn contains(&self, name: &str) -> bool {
        self.registry.accessor(name).is_some()
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>> {
        let Some(accessor) = self.registry.accessor(name) else {
            return Ok(None);
        };
        self.cache.get_or_resolve(name, || {
            accessor(self.target)
                .map(Some)
                .map_err(|reason| Error::resolution(name, reason))
        })
    }

    fn names(&self) -> Vec<String> {
        self.registry.names().map(str::to_string).collect()
    }

    fn is_iri(&self) -> bool {
        self.iri
    }
}

/// Consults several contexts in order; the first one holding a name wins
#[derive(Default)]
pub struct MultiContext<'a> {
    contexts: Vec<Box<dyn Context + 'a>>,
    iri: bool,
    cache: ResolveCache,
}

impl<'a> MultiContext<'a> {
    pub fn new() -> Self {
        Self {
            contexts: Vec::new(),
            iri: false,
            cache: ResolveCache::default(),
        }
    }

    pub fn with(mut self, context: impl Context + 'a) -> Self {
        self.push(context);
        self
    }

    pub fn with_iri(mut self, iri: bool) -> Self {
        self.iri = iri;
        self
    }

    pub fn push(&mut self, context: impl Context + 'a) {
        self.contexts.push(Box::new(context));
    }
}

impl Context for MultiContext<'_> {
    fn contains(&self, name: &str) -> bool {
        self.contexts.iter().any(|c| c.contains(name))
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>> {
        let Some(context) = self.contexts.iter().find(|c| c.contains(name)) else {
            return Ok(None);
        };
        self.cache.get_or_resolve(name, || context.resolve(name))
    }

    fn names(&self) -> Vec<String> {
        union_names(self.contexts.iter().map(|c| c.as_ref() as &dyn Context))
    }

    fn is_iri(&self) -> bool {
        self.iri
    }
}

/// Prefers the primary context's non-null values, falling back otherwise
pub struct DefaultingContext<P, F> {
    primary: P,
    fallback: F,
}

impl<P: Context, F: Context> DefaultingContext<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: Context, F: Context> Context for DefaultingContext<P, F> {
    fn contains(&self, name: &str) -> bool {
        self.primary.contains(name) || self.fallback.contains(name)
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>> {
        let primary = self.primary.resolve(name)?;
        if primary.as_ref().is_some_and(|v| !v.is_null()) {
            return Ok(primary);
        }
        match self.fallback.resolve(name)? {
            Some(value) => Ok(Some(value)),
            None => Ok(primary),
        }
    }

    fn names(&self) -> Vec<String> {
        union_names([&self.primary as &dyn Context, &self.fallback as &dyn Context].into_iter())
    }

    fn is_iri(&self) -> bool {
        self.primary.is_iri()
    }
}

/// Memoizing wrapper around any context
pub struct CachingContext<C> {
    inner: C,
    cache: ResolveCache,
}

impl<C: Context> CachingContext<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            cache: ResolveCache::default(),
        }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: Context> Context for CachingContext<C> {
    fn contains(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    fn resolve(&self, name: &str) -> Result<Option<Value>> {
        if !self.inner.contains(name) {
            return Ok(None);
        }
        self.cache.get_or_resolve(name, || self.inner.resolve(name))
    }

    fn names(&self) -> Vec<String> {
        self.inner.names()
    }

    fn is_iri(&self) -> bool {
        self.inner.is_iri()
    }
}
