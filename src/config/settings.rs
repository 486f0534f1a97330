// YAML settings: variable bindings and expansion knobs for the CLI

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::domain::template::{ExpandOptions, MapContext, Value};

const DEFAULT_DEFERRED_TIMEOUT_MS: u64 = 30_000;

fn default_deferred_timeout_ms() -> u64 {
    DEFAULT_DEFERRED_TIMEOUT_MS
}

fn is_default_timeout(ms: &u64) -> bool {
    *ms == DEFAULT_DEFERRED_TIMEOUT_MS
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "is_false")]
    pub iri: bool,
    #[serde(
        default = "default_deferred_timeout_ms",
        skip_serializing_if = "is_default_timeout"
    )]
    pub deferred_timeout_ms: u64,
    /// Variable bindings in file order
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub variables: Mapping,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            iri: false,
            deferred_timeout_ms: DEFAULT_DEFERRED_TIMEOUT_MS,
            variables: Mapping::new(),
        }
    }
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// JSON documents are accepted too, being valid YAML
    pub fn from_yaml(text: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(text)?;
        for key in settings.variables.keys() {
            scalar_key(key)?;
        }
        Ok(settings)
    }

    pub fn context(&self) -> Result<MapContext> {
        let mut context = MapContext::new().with_iri(self.iri);
        for (key, value) in &self.variables {
            let name = scalar_key(key)?;
            // null means "present but undefined"
            context.insert(name, to_value(value)?);
        }
        Ok(context)
    }

    pub fn expand_options(&self) -> ExpandOptions {
        ExpandOptions {
            deferred_timeout: Duration::from_millis(self.deferred_timeout_ms),
        }
    }
}

fn scalar_key(key: &YamlValue) -> Result<String> {
    Ok(match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Bool(b) => b.to_string(),
        other => bail!("Variable names must be scalars, found {:?}", other),
    })
}

/// Mappings keep their file order, unlike a round trip through serde_json
fn to_value(value: &YamlValue) -> Result<Value> {
    Ok(match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => (*b).into(),
        YamlValue::Number(n) => Value::String(n.to_string()),
        YamlValue::String(s) => Value::String(s.clone()),
        YamlValue::Sequence(items) => Value::List(items.iter().map(to_value).collect::<Result<_>>()?),
        YamlValue::Mapping(map) => Value::Map(
            map.iter()
                .map(|(k, v)| Ok((scalar_key(k)?, to_value(v)?)))
                .collect::<Result<_>>()?,
        ),
        YamlValue::Tagged(tagged) => to_value(&tagged.value)?,
    })
}
