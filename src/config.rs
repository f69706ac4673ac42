//! Runtime configuration loaded from environment variables.

use std::path::PathBuf;

use anyhow::Result;

/// Agent executable used when `BACKLOG_FORGE_AGENT` is unset.
pub const DEFAULT_AGENT: &str = "opencode";

/// Credentials forwarded into every sandbox when `BACKLOG_FORGE_SANDBOX_ENV` is unset.
pub const DEFAULT_SANDBOX_ENV: &[&str] = &[
    "CLOUDFLARE_ACCOUNT_ID",
    "CLOUDFLARE_GATEWAY_ID",
    "CLOUDFLARE_API_TOKEN",
];

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the database (from BACKLOG_FORGE_DATA_DIR)
    pub data_dir: PathBuf,
    /// Root directory for local sandboxes (from BACKLOG_FORGE_SANDBOX_ROOT)
    pub sandbox_root: PathBuf,
    /// Agent executable run inside sandboxes (from BACKLOG_FORGE_AGENT)
    pub agent: String,
    /// Names of environment variables forwarded into sandboxes
    /// (from BACKLOG_FORGE_SANDBOX_ENV, comma-separated)
    pub sandbox_env: Vec<String>,
    /// Default HTTP port (from BACKLOG_FORGE_PORT)
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_dir = match std::env::var("BACKLOG_FORGE_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => directories::ProjectDirs::from("", "", "backlog-forge")
                .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
                .data_dir()
                .to_path_buf(),
        };

        let mut config = Self::for_data_dir(data_dir);

        if let Ok(root) = std::env::var("BACKLOG_FORGE_SANDBOX_ROOT") {
            config.sandbox_root = PathBuf::from(root);
        }
        if let Ok(agent) = std::env::var("BACKLOG_FORGE_AGENT") {
            config.agent = agent;
        }
        if let Ok(names) = std::env::var("BACKLOG_FORGE_SANDBOX_ENV") {
            config.sandbox_env = parse_env_list(&names);
        }
        config.port = std::env::var("BACKLOG_FORGE_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Ok(config)
    }

    /// Defaults rooted at `data_dir`, ignoring the environment.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            sandbox_root: data_dir.join("sandboxes"),
            data_dir,
            agent: DEFAULT_AGENT.to_string(),
            sandbox_env: DEFAULT_SANDBOX_ENV.iter().map(|s| s.to_string()).collect(),
            port: DEFAULT_PORT,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("backlog-forge.db")
    }

    /// Values of the forwarded credential variables that are currently set.
    pub fn sandbox_credentials(&self) -> Vec<(String, String)> {
        self.sandbox_env
            .iter()
            .filter_map(|name| std::env::var(name).ok().map(|value| (name.clone(), value)))
            .collect()
    }
}

fn parse_env_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(|name| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_defaults_derive_paths() {
        let config = Config::for_data_dir("/tmp/forge");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/forge/backlog-forge.db"));
        assert_eq!(config.sandbox_root, PathBuf::from("/tmp/forge/sandboxes"));
        assert_eq!(config.agent, "opencode");
        assert_eq!(config.sandbox_env.len(), 3);
    }

    #[test]
    fn env_list_ignores_blanks() {
        assert_eq!(parse_env_list(" A, ,B ,"), vec!["A", "B"]);
    }

    #[test]
    fn missing_credentials_are_skipped() {
        let mut config = Config::for_data_dir("/tmp/forge");
        config.sandbox_env = vec!["BACKLOG_FORGE_TEST_SURELY_UNSET_VAR".to_string()];
        assert!(config.sandbox_credentials().is_empty());
    }
}
