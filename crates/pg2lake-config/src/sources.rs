// Configuration source loading.
//
// Priority order:
// 1. Environment variables (PG2LAKE_* prefix)
// 2. Explicit path (--config), else config file path from PG2LAKE_CONFIG
// 3. Inline config content from PG2LAKE_CONFIG_CONTENT
// 4. Default config files (./pg2lake.toml, ./.pg2lake.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_FILES: [&str; 2] = ["./pg2lake.toml", "./.pg2lake.toml"];

/// Layer defaults, file config and env overrides. Does not validate.
pub fn load_config<E: EnvSource>(config_path: Option<&Path>, env: &E) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::default();

    let file_config = match config_path {
        Some(path) => Some(read_file(path)?),
        None => load_from_file(env)?,
    };
    if let Some(file_config) = file_config {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, env)?;
    Ok(config)
}

fn load_from_file<E: EnvSource>(env: &E) -> Result<Option<RuntimeConfig>> {
    if let Some(path) = env.get("CONFIG") {
        return read_file(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config = parse_toml(
            &content,
            &format!("inline config from {}CONFIG_CONTENT", ENV_PREFIX),
        )?;
        return Ok(Some(config));
    }

    for path in DEFAULT_CONFIG_FILES {
        let path = Path::new(path);
        if path.exists() {
            return read_file(path).map(Some);
        }
    }

    Ok(None)
}

fn read_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_toml(&content, &format!("config file: {}", path.display()))
}

pub(crate) fn parse_toml(content: &str, origin: &str) -> Result<RuntimeConfig> {
    toml::from_str(content).with_context(|| format!("Failed to parse {}", origin))
}

pub(crate) struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    struct MapEnv(HashMap<String, String>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
    }

    fn env(pairs: &[(&str, &str)]) -> MapEnv {
        MapEnv(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn explicit_path_then_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[export]\nsource_table = \"public.mockrecord\"\noutput_prefix = \"/tmp/lake\"\nwrite_concurrency = 2"
        )
        .unwrap();

        let env = env(&[("PG2LAKE_WRITE_CONCURRENCY", "4")]);
        let config = load_config(Some(file.path()), &env).unwrap();

        assert_eq!(config.export.source_table.as_deref(), Some("public.mockrecord"));
        assert_eq!(config.export.output_prefix, "/tmp/lake");
        assert_eq!(config.export.write_concurrency, 4);
    }

    #[test]
    fn inline_content_from_env() {
        let env = env(&[(
            "PG2LAKE_CONFIG_CONTENT",
            "[export]\nquery = \"select 1\"\n[logging]\nformat = \"json\"",
        )]);
        let config = load_config(None, &env).unwrap();

        assert_eq!(config.export.query.as_deref(), Some("select 1"));
        assert_eq!(config.logging.format, crate::LogFormat::Json);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/pg2lake.toml")), &env(&[])).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let env = env(&[("PG2LAKE_CONFIG_CONTENT", "[export\nsource_table = 1")]);
        assert!(load_config(None, &env).is_err());
    }
}
