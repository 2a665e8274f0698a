//! Configuration layering: CLI flags, then config file, then environment.
//!
//! The config file is TOML. Keys may sit at the top level or under a
//! `[DEFAULT]` table:
//!
//! ```toml
//! [DEFAULT]
//! wsUrl = "https://saas.example.com"
//! userKey = "..."
//! orgToken = "..."
//! projectParallelismLevel = 9
//! ```

use std::path::Path;

use policy_report_core::{Parallelism, PolicyReportError, Result, Settings};
use serde::Deserialize;
use tracing::info;

/// Config file picked up from the working directory when `-c` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "params.config";

const CONFIG_SECTION: &str = "DEFAULT";

pub const ENV_WS_URL: &str = "WSPR_WS_URL";
pub const ENV_USER_KEY: &str = "WSPR_USER_KEY";
pub const ENV_ORG_TOKEN: &str = "WSPR_ORG_TOKEN";
pub const ENV_PARALLELISM: &str = "WSPR_PROJECT_PARALLELISM_LEVEL";

/// One configuration source; unset values fall through to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLayer {
    pub ws_url: Option<String>,
    pub user_key: Option<String>,
    pub org_token: Option<String>,
    pub project_parallelism_level: Option<i64>,
}

impl ConfigLayer {
    /// Fill values unset in `self` from `lower`.
    pub fn or(self, lower: ConfigLayer) -> ConfigLayer {
        ConfigLayer {
            ws_url: self.ws_url.or(lower.ws_url),
            user_key: self.user_key.or(lower.user_key),
            org_token: self.org_token.or(lower.org_token),
            project_parallelism_level: self
                .project_parallelism_level
                .or(lower.project_parallelism_level),
        }
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PolicyReportError::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| PolicyReportError::Config(format!("{} in {}", e, path.display())))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, String> {
        let mut doc: toml::Table = toml::from_str(content).map_err(|e| e.to_string())?;
        let table = match doc.remove(CONFIG_SECTION) {
            Some(toml::Value::Table(section)) => section,
            Some(_) => return Err(format!("[{CONFIG_SECTION}] must be a table")),
            None => doc,
        };
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| e.to_string())
    }

    /// Read the `WSPR_*` variables through `lookup`.
    pub fn from_env<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            let value = lookup(name);
            if value.is_some() {
                info!("found {} environment variable - will use its value", name);
            }
            value
        };

        let project_parallelism_level = match read(ENV_PARALLELISM) {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                PolicyReportError::Config(format!(
                    "{ENV_PARALLELISM} <{raw}> is not a whole number"
                ))
            })?),
            None => None,
        };

        Ok(ConfigLayer {
            ws_url: read(ENV_WS_URL),
            user_key: read(ENV_USER_KEY),
            org_token: read(ENV_ORG_TOKEN),
            project_parallelism_level,
        })
    }

    /// Validate the merged layer into run settings.
    pub fn into_settings(self) -> Result<Settings> {
        let parallelism = match self.project_parallelism_level {
            Some(level) => Parallelism::new(level)?,
            None => Parallelism::default(),
        };
        Settings::new(
            required(self.ws_url, "wsUrl")?,
            required(self.user_key, "userKey")?,
            required(self.org_token, "orgToken")?,
            parallelism,
        )
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    value.ok_or_else(|| {
        PolicyReportError::Config(format!(
            "please check your {key} parameter - it is missing from the CLI, config file and environment"
        ))
    })
}

/// Pick the config file layer: an explicit path must exist; otherwise the
/// default file is used when present.
pub fn file_layer(explicit: Option<&Path>, default_path: &Path) -> Result<ConfigLayer> {
    match explicit {
        Some(path) if !path.exists() => Err(PolicyReportError::Config(format!(
            "config file {} doesn't exist",
            path.display()
        ))),
        Some(path) => {
            info!("Using config file {}", path.display());
            ConfigLayer::from_file(path)
        }
        None if default_path.is_file() => {
            info!("Using default config file {}", default_path.display());
            ConfigLayer::from_file(default_path)
        }
        None => Ok(ConfigLayer::default()),
    }
}

/// Merge all layers with CLI > file > environment precedence.
pub fn resolve<F>(
    cli: ConfigLayer,
    explicit_file: Option<&Path>,
    default_file: &Path,
    env: F,
) -> Result<Settings>
where
    F: Fn(&str) -> Option<String>,
{
    let file = file_layer(explicit_file, default_file)?;
    let env = ConfigLayer::from_env(env)?;
    cli.or(file).or(env).into_settings()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn no_env() -> impl Fn(&str) -> Option<String> {
        |_: &str| None
    }

    #[test]
    fn test_toml_default_section() {
        let layer = ConfigLayer::from_toml(
            r#"
[DEFAULT]
wsUrl = "https://saas.example.com"
userKey = "uk"
orgToken = "org"
projectParallelismLevel = 4
"#,
        )
        .unwrap();
        assert_eq!(layer.ws_url.as_deref(), Some("https://saas.example.com"));
        assert_eq!(layer.project_parallelism_level, Some(4));
    }

    #[test]
    fn test_toml_top_level_keys() {
        let layer = ConfigLayer::from_toml("orgToken = \"org\"\n").unwrap();
        assert_eq!(layer.org_token.as_deref(), Some("org"));
        assert_eq!(layer.ws_url, None);
    }

    #[test]
    fn test_cli_beats_file_beats_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.config");
        std::fs::write(
            &path,
            "[DEFAULT]\nwsUrl = \"https://file\"\nuserKey = \"file-key\"\n",
        )
        .unwrap();

        let cli = ConfigLayer {
            ws_url: Some("https://cli".to_string()),
            ..Default::default()
        };
        let env = env_of(&[
            (ENV_WS_URL, "https://env"),
            (ENV_USER_KEY, "env-key"),
            (ENV_ORG_TOKEN, "env-org"),
            (ENV_PARALLELISM, "12"),
        ]);

        let settings = resolve(cli, Some(&path), Path::new("/nonexistent"), env).unwrap();
        assert_eq!(settings.ws_url, "https://cli");
        assert_eq!(settings.user_key, "file-key");
        assert_eq!(settings.org_token.as_str(), "env-org");
        assert_eq!(settings.parallelism.get(), 12);
    }

    #[test]
    fn test_default_file_is_used_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        std::fs::write(
            &path,
            "wsUrl = \"https://file\"\nuserKey = \"k\"\norgToken = \"o\"\n",
        )
        .unwrap();

        let settings = resolve(ConfigLayer::default(), None, &path, no_env()).unwrap();
        assert_eq!(settings.ws_url, "https://file");
        assert_eq!(settings.parallelism.get(), Parallelism::DEFAULT);
    }

    #[test]
    fn test_missing_explicit_file_is_config_error() {
        let res = resolve(
            ConfigLayer::default(),
            Some(Path::new("/definitely/not/here.config")),
            Path::new("/nonexistent"),
            no_env(),
        );
        match res {
            Err(PolicyReportError::Config(msg)) => assert!(msg.contains("doesn't exist")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_value_names_key() {
        let env = env_of(&[(ENV_WS_URL, "https://env"), (ENV_USER_KEY, "k")]);
        let res = resolve(ConfigLayer::default(), None, Path::new("/nonexistent"), env);
        match res {
            Err(PolicyReportError::Config(msg)) => assert!(msg.contains("orgToken")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_parallelism_is_rejected() {
        let cli = ConfigLayer {
            ws_url: Some("https://cli".to_string()),
            user_key: Some("k".to_string()),
            org_token: Some("o".to_string()),
            project_parallelism_level: Some(21),
        };
        let res = resolve(cli, None, Path::new("/nonexistent"), no_env());
        assert!(matches!(res, Err(PolicyReportError::InvalidParallelism(21))));
    }

    #[test]
    fn test_non_numeric_env_parallelism_is_rejected() {
        let res = ConfigLayer::from_env(env_of(&[(ENV_PARALLELISM, "many")]));
        assert!(matches!(res, Err(PolicyReportError::Config(_))));
    }
}
