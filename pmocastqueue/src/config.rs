//! Configuration of the queue synchronizer.
//!
//! Loading follows the same layering as the rest of PMOMusic:
//! 1. the embedded default document (`pmocastqueue.yaml`),
//! 2. keys lower-cased, then merged with an optional external YAML file,
//! 3. environment overrides `PMOCASTQUEUE__SECTION__KEY=value`,
//! 4. deserialized into typed sections.

use std::env;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::model::RepeatMode;

const DEFAULT_CONFIG: &str = include_str!("pmocastqueue.yaml");

pub const ENV_PREFIX: &str = "PMOCASTQUEUE__";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSection {
    pub repeat_mode: RepeatMode,
    pub coalesce_while_loading: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSection {
    pub command_capacity: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSection {
    pub filter: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub queue: QueueSection,
    pub runtime: RuntimeSection,
    pub logging: LoggingSection,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue: QueueSection {
                repeat_mode: RepeatMode::Off,
                coalesce_while_loading: true,
            },
            runtime: RuntimeSection {
                command_capacity: 64,
            },
            logging: LoggingSection {
                filter: "pmocastqueue=info".to_string(),
            },
        }
    }
}

impl SyncConfig {
    /// Loads the configuration, reading `path` when given and present and
    /// applying process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, env::vars())
    }

    /// Same as [`SyncConfig::load`] with an explicit set of variables.
    pub fn load_with_env(
        path: Option<&Path>,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let mut value = lower_keys_value(serde_yaml::from_str(DEFAULT_CONFIG)?);

        if let Some(path) = path {
            match fs::read(path) {
                Ok(data) => {
                    info!(config_file = %path.display(), "Loaded config file");
                    let external: Value = serde_yaml::from_slice(&data)
                        .with_context(|| format!("Invalid YAML in {}", path.display()))?;
                    merge_yaml(&mut value, &lower_keys_value(external));
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    info!(
                        config_file = %path.display(),
                        "Config file not found, using default embedded config"
                    );
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("Failed to read config file {}", path.display()));
                }
            }
        }

        apply_env_overrides(&mut value, vars);

        let config: SyncConfig =
            serde_yaml::from_value(value).context("Invalid pmocastqueue configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.runtime.command_capacity == 0 {
            return Err(anyhow!("runtime.command_capacity must be at least 1"));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn apply_env_overrides(config: &mut Value, vars: impl IntoIterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(path) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path = path.split("__").collect::<Vec<_>>();
        let yaml_value = convert_env_value(&value);
        let _ = set_value_internal(config, &key_path, yaml_value);
    }
}

fn convert_env_value(value: &str) -> Value {
    if let Ok(parsed) = serde_yaml::from_str::<Value>(value) {
        return parsed;
    }
    Value::String(value.to_string())
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    if path.is_empty() {
        *data = value;
        return Ok(());
    }
    if let Value::Mapping(map) = data {
        let key_value = Value::String(path[0].to_lowercase());
        if path.len() == 1 {
            map.insert(key_value, value);
        } else {
            let entry = map
                .entry(key_value)
                .or_insert(Value::Mapping(Mapping::new()));
            set_value_internal(entry, &path[1..], value)?;
        }
        Ok(())
    } else {
        Err(anyhow!("Current node is not a map"))
    }
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let key = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(key, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        // scalars and sequences are replaced
        (d, e) => *d = e.clone(),
    }
}
