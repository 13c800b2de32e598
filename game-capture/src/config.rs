use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{bail, Context};
use envconfig::Envconfig;

const DEFAULT_CONFIG_FILE: &str = "config.toml";
const DEFAULT_DOTENV_FILE: &str = ".env";

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum SinkKind {
    Postgres,
    File,
    Print,
}

impl std::str::FromStr for SinkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_ref() {
            "postgres" => Ok(SinkKind::Postgres),
            "file" => Ok(SinkKind::File),
            "print" => Ok(SinkKind::Print),
            _ => Err(format!("Unknown sink: {s}")),
        }
    }
}

/// A string that stays out of logs.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for SecretString {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SecretString(s.to_string()))
    }
}

impl Debug for SecretString {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString(**********)")
    }
}

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    #[envconfig(default = "postgres")]
    pub sink: SinkKind,

    #[envconfig(default = "./analytics")]
    pub file_sink_dir: String,

    #[envconfig(default = "10")]
    pub max_db_connections: u32,

    #[envconfig(default = "2097152")]
    pub max_body_bytes: usize,

    // Used for integration tests
    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    pub otel_url: Option<String>,

    #[envconfig(default = "1.0")]
    pub otel_sampling_rate: f64,

    #[envconfig(default = "game-capture")]
    pub otel_service_name: String,

    #[envconfig(nested = true)]
    pub main: MainConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct MainConfig {
    /// Disables the API description endpoint
    #[envconfig(from = "MAIN_PRODUCTION", default = "false")]
    pub production: bool,

    #[envconfig(
        from = "MAIN_DBURL",
        default = "postgres://localhost:5432/analytics"
    )]
    pub dburl: SecretString,

    /// Collection (table) the events are stored in
    #[envconfig(from = "MAIN_DBNAME", default = "analytics")]
    pub dbname: String,

    #[envconfig(from = "MAIN_SECRETKEY", default = "Incremental Game")]
    pub secretkey: SecretString,

    /// Session token lifetime, in seconds
    #[envconfig(from = "MAIN_EXPIRY", default = "3600")]
    pub expiry: u32,
}

impl Config {
    /// Load the configuration from, by order of precedence: the process environment,
    /// a dotenv file (`DOTENV_FILE`, default `.env`) and a TOML file (`CONFIG_FILE`,
    /// default `config.toml`). Missing files are skipped.
    pub fn load() -> anyhow::Result<Config> {
        let env: HashMap<String, String> = std::env::vars().collect();

        let toml_path = env
            .get("CONFIG_FILE")
            .map_or(DEFAULT_CONFIG_FILE, String::as_str);
        let toml_source = if Path::new(toml_path).exists() {
            Some(
                std::fs::read_to_string(toml_path)
                    .with_context(|| format!("failed to read {toml_path}"))?,
            )
        } else {
            None
        };

        let dotenv_path = env
            .get("DOTENV_FILE")
            .map_or(DEFAULT_DOTENV_FILE, String::as_str);
        let mut dotenv = Vec::new();
        if Path::new(dotenv_path).exists() {
            for item in dotenvy::from_path_iter(dotenv_path)
                .with_context(|| format!("failed to open {dotenv_path}"))?
            {
                dotenv.push(item.with_context(|| format!("failed to parse {dotenv_path}"))?);
            }
        }

        let values = merge_sources(toml_source.as_deref(), dotenv, env)?;
        Ok(Config::init_from_hashmap(&values)?)
    }
}

/// Layer the configuration sources, later ones winning.
pub fn merge_sources(
    toml_source: Option<&str>,
    dotenv: Vec<(String, String)>,
    env: HashMap<String, String>,
) -> anyhow::Result<HashMap<String, String>> {
    let mut values = HashMap::new();

    if let Some(source) = toml_source {
        let table: toml::Table = source.parse().context("invalid TOML configuration")?;
        flatten_toml("", &table, &mut values)?;
    }
    values.extend(dotenv);
    values.extend(env);

    Ok(values)
}

/// `[main] secretkey = "x"` becomes `MAIN_SECRETKEY=x`, matching the environment names.
fn flatten_toml(
    prefix: &str,
    table: &toml::Table,
    values: &mut HashMap<String, String>,
) -> anyhow::Result<()> {
    for (key, value) in table {
        let name = if prefix.is_empty() {
            key.to_uppercase()
        } else {
            format!("{prefix}_{}", key.to_uppercase())
        };

        match value {
            toml::Value::Table(nested) => flatten_toml(&name, nested, values)?,
            toml::Value::String(s) => {
                values.insert(name, s.clone());
            }
            toml::Value::Integer(i) => {
                values.insert(name, i.to_string());
            }
            toml::Value::Float(f) => {
                values.insert(name, f.to_string());
            }
            toml::Value::Boolean(b) => {
                values.insert(name, b.to_string());
            }
            toml::Value::Datetime(d) => {
                values.insert(name, d.to_string());
            }
            toml::Value::Array(_) => {
                bail!("configuration key {name} cannot be an array");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_deployments() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();

        assert_eq!(config.sink, SinkKind::Postgres);
        assert!(!config.main.production);
        assert_eq!(config.main.dbname, "analytics");
        assert_eq!(config.main.secretkey.expose(), "Incremental Game");
        assert_eq!(config.main.expiry, 3600);
    }

    #[test]
    fn environment_beats_dotenv_beats_toml() {
        let toml = r#"
            sink = "file"

            [main]
            expiry = 60
            dbname = "from_toml"
            secretkey = "from toml"
            production = true
        "#;
        let dotenv = pairs(&[("MAIN_DBNAME", "from_dotenv"), ("MAIN_EXPIRY", "120")]);
        let env: HashMap<String, String> = pairs(&[("MAIN_EXPIRY", "240")]).into_iter().collect();

        let values = merge_sources(Some(toml), dotenv, env).unwrap();
        let config = Config::init_from_hashmap(&values).unwrap();

        assert_eq!(config.sink, SinkKind::File);
        assert!(config.main.production);
        assert_eq!(config.main.secretkey.expose(), "from toml");
        assert_eq!(config.main.dbname, "from_dotenv");
        assert_eq!(config.main.expiry, 240);
    }

    #[test]
    fn rejects_broken_toml() {
        assert!(merge_sources(Some("main = ["), vec![], HashMap::new()).is_err());
    }

    #[test]
    fn rejects_array_values() {
        let toml = r#"
            [main]
            dbname = ["a", "b"]
        "#;

        let err = merge_sources(Some(toml), vec![], HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("MAIN_DBNAME"), "{err}");
    }

    #[test]
    fn rejects_unknown_sinks() {
        let env: HashMap<String, String> = pairs(&[("SINK", "kafka")]).into_iter().collect();

        assert!(Config::init_from_hashmap(&env).is_err());
    }

    #[test]
    fn secrets_stay_out_of_debug_output() {
        let env: HashMap<String, String> = pairs(&[
            ("MAIN_SECRETKEY", "hunter2"),
            ("MAIN_DBURL", "postgres://user:hunter3@db/analytics"),
        ])
        .into_iter()
        .collect();
        let config = Config::init_from_hashmap(&env).unwrap();

        let printed = format!("{config:?}");
        assert!(!printed.contains("hunter2"));
        assert!(!printed.contains("hunter3"));
    }
}
