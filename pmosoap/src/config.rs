//! # Configuration du moteur de dispatch
//!
//! La configuration est construite en trois couches :
//! 1. la configuration par défaut intégrée (`pmosoap.yaml`)
//! 2. le fichier `pmosoap.yaml` du répertoire de configuration, s'il existe
//! 3. les variables d'environnement `PMOSOAP_CONFIG__SECTION__CLE`
//!
//! Les clés sont insensibles à la casse.
//!
//! ```no_run
//! use pmosoap::DispatchConfig;
//!
//! let config = DispatchConfig::load(None)?;
//! println!("{} dispatch workers", config.executor.workers);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::info;

// Configuration par défaut intégrée
const DEFAULT_CONFIG: &str = include_str!("pmosoap.yaml");

const CONFIG_FILE: &str = "pmosoap.yaml";
const LOCAL_CONFIG_DIR: &str = ".pmosoap";
const ENV_CONFIG_DIR: &str = "PMOSOAP_CONFIG";
const ENV_PREFIX: &str = "PMOSOAP_CONFIG__";

/// Pool partagé des invocations différées
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub workers: usize,
    pub thread_name: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            thread_name: "pmosoap-dispatch".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Exécuter les invocations différées sur le thread appelant
    pub disable_thread_switch: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration complète
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub executor: ExecutorConfig,
    pub dispatch: DispatchSettings,
    pub logging: LoggingConfig,
}

impl DispatchConfig {
    /// Charge la configuration.
    ///
    /// Le répertoire est cherché dans l'ordre :
    /// 1. `directory` s'il est fourni
    /// 2. la variable d'environnement `PMOSOAP_CONFIG`
    /// 3. `.pmosoap` dans le répertoire courant
    /// 4. `.pmosoap` dans le répertoire personnel
    ///
    /// Aucun fichier n'est requis : sans `pmosoap.yaml`, seules la
    /// configuration intégrée et l'environnement sont utilisés.
    pub fn load(directory: Option<&Path>) -> Result<Self> {
        let external = match find_config_dir(directory) {
            Some(dir) => {
                let path = dir.join(CONFIG_FILE);
                match fs::read_to_string(&path) {
                    Ok(data) => {
                        info!(config_file=%path.display(), "Loaded config file");
                        Some(data)
                    }
                    Err(_) => {
                        info!(config_file=%path.display(), "Config file not found, using default embedded config");
                        None
                    }
                }
            }
            None => None,
        };

        Self::from_sources(external.as_deref(), env::vars())
    }

    /// Construit la configuration à partir d'un YAML externe et d'un jeu de
    /// variables d'environnement
    pub fn from_sources<I>(external: Option<&str>, vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;

        if let Some(external) = external {
            let external: Value = serde_yaml::from_str(external)?;
            // Un fichier vide se lit comme Null : rien à fusionner
            if !external.is_null() {
                merge_yaml(&mut value, &lower_keys_value(external));
            }
        }

        let mut value = lower_keys_value(value);
        apply_env_overrides(&mut value, vars);

        Ok(serde_yaml::from_value(value)?)
    }
}

fn find_config_dir(directory: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = directory {
        return Some(dir.to_path_buf());
    }

    if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
        info!(env_var = ENV_CONFIG_DIR, path=%env_path, "Trying to load config from env");
        return Some(PathBuf::from(env_path));
    }

    let local = Path::new(LOCAL_CONFIG_DIR);
    if local.exists() {
        return Some(local.to_path_buf());
    }

    home_dir()
        .map(|home| home.join(LOCAL_CONFIG_DIR))
        .filter(|dir| dir.exists())
}

fn apply_env_overrides<I>(config: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        if let Some(path) = key.strip_prefix(ENV_PREFIX) {
            let key_path = path.split("__").collect::<Vec<_>>();
            let _ = set_value(config, &key_path, convert_env_value(&value));
        }
    }
}

fn set_value(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };

    let Value::Mapping(map) = data else {
        return Err(anyhow!("Current node is not a map"));
    };

    let key = Value::String(first.to_lowercase());
    if rest.is_empty() {
        map.insert(key, value);
        Ok(())
    } else {
        let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
        set_value(entry, rest, value)
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut new_map = Mapping::new();
            for (k, v) in map {
                let k = match k {
                    Value::String(s) => Value::String(s.to_lowercase()),
                    other => other,
                };
                new_map.insert(k, lower_keys_value(v));
            }
            Value::Mapping(new_map)
        }
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Fusionne `external` dans `default` : les mappings sont fusionnés clé par
/// clé, les scalaires et séquences sont remplacés
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
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn test_embedded_defaults() {
        let config = DispatchConfig::from_sources(None, no_env()).unwrap();
        assert_eq!(config, DispatchConfig::default());
    }

    #[test]
    fn test_external_file_is_merged() {
        let yaml = "Executor:\n  Workers: 8\n";
        let config = DispatchConfig::from_sources(Some(yaml), no_env()).unwrap();
        assert_eq!(config.executor.workers, 8);
        assert_eq!(config.executor.thread_name, "pmosoap-dispatch");
        assert!(!config.dispatch.disable_thread_switch);
    }

    #[test]
    fn test_empty_external_file() {
        let config = DispatchConfig::from_sources(Some(""), no_env()).unwrap();
        assert_eq!(config, DispatchConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let vars = vec![
            ("PMOSOAP_CONFIG__EXECUTOR__WORKERS".to_string(), "2".to_string()),
            (
                "PMOSOAP_CONFIG__DISPATCH__DISABLE_THREAD_SWITCH".to_string(),
                "true".to_string(),
            ),
            ("PMOSOAP_CONFIG__LOGGING__LEVEL".to_string(), "debug".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ];
        let config = DispatchConfig::from_sources(Some("executor:\n  workers: 8\n"), vars).unwrap();
        assert_eq!(config.executor.workers, 2);
        assert!(config.dispatch.disable_thread_switch);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_external_yaml() {
        assert!(DispatchConfig::from_sources(Some("executor: [unclosed"), no_env()).is_err());
    }

    #[test]
    fn test_merge_replaces_scalars() {
        let mut default: Value = serde_yaml::from_str("a: 1\nb:\n  c: 2\n").unwrap();
        let external: Value = serde_yaml::from_str("b:\n  c: 3\n  d: 4\n").unwrap();
        merge_yaml(&mut default, &external);
        let expected: Value = serde_yaml::from_str("a: 1\nb:\n  c: 3\n  d: 4\n").unwrap();
        assert_eq!(default, expected);
    }
}
