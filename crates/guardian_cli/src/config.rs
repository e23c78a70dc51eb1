//! Configuration file support for guardian.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (`GUARDIAN_GITHUB_TOKEN`, then `GUARDIAN_<SECTION>__<KEY>`,
//!    e.g. `GUARDIAN_SCAN__WORKERS`)
//! 3. Local config file (./guardian.toml)
//! 4. User config file (~/.config/guardian/config.toml)
//! 5. Built-in defaults
//!
//! `GITHUB_TOKEN` is accepted when no other token is configured.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."  # or use GUARDIAN_GITHUB_TOKEN
//! graphql_url = "https://api.github.com/graphql"
//!
//! [scan]
//! organizations = ["acme", "acme-labs"]
//! workers = 10
//! connection_multiplier = 2.0
//! results_dir = "scan_results"
//! scan_targets = true
//!
//! [logging]
//! json = false
//! file = "/var/log/guardian/guardian.log"
//! ```

use std::env;
use std::path::PathBuf;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use guardian::github::DEFAULT_GRAPHQL_URL;
use guardian::sync::DEFAULT_WORKERS;

const ENV_PREFIX: &str = "GUARDIAN";
const TOKEN_ENV: &str = "GUARDIAN_GITHUB_TOKEN";
const FALLBACK_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub scan: ScanConfig,
    pub logging: LoggingConfig,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API token. Also read from GUARDIAN_GITHUB_TOKEN or GITHUB_TOKEN.
    pub token: Option<String>,
    /// GraphQL endpoint, for GitHub Enterprise or a proxy.
    pub graphql_url: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
        }
    }
}

/// Default scan options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Organizations whose members are scanned when none are given on the command line.
    pub organizations: Vec<String>,
    /// Members fetched concurrently.
    pub workers: usize,
    /// HTTP connections per worker.
    pub connection_multiplier: f64,
    /// Root of the per-run result directories.
    pub results_dir: PathBuf,
    /// Also write scan_targets.json into each run directory.
    pub scan_targets: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            organizations: Vec::new(),
            workers: DEFAULT_WORKERS,
            connection_multiplier: 2.0,
            results_dir: PathBuf::from("scan_results"),
            scan_targets: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
    /// Also write JSON logs to this file, rotated daily.
    pub file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from every layer.
    ///
    /// A config file that exists but does not parse is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = Self::default_config_path()
            && path.exists()
        {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let local_config = PathBuf::from("guardian.toml");
        if local_config.exists() {
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("scan.organizations")
                .try_parsing(true),
        );

        let mut config: Config = builder.build()?.try_deserialize()?;
        config.github.token = resolve_token(
            env::var(TOKEN_ENV).ok(),
            config.github.token.take(),
            env::var(FALLBACK_TOKEN_ENV).ok(),
        );
        Ok(config)
    }

    /// The GitHub token, or an error telling the user how to set one.
    pub fn github_token(&self) -> Result<&str, String> {
        self.github.token.as_deref().ok_or_else(|| {
            format!(
                "No GitHub token configured. Set {TOKEN_ENV} (or {FALLBACK_TOKEN_ENV}), \
                 or add `token` under [github] in guardian.toml"
            )
        })
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "guardian").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// First non-blank token among the explicit variable, the config files and
/// the generic fallback variable.
fn resolve_token(
    explicit: Option<String>,
    configured: Option<String>,
    fallback: Option<String>,
) -> Option<String> {
    [explicit, configured, fallback]
        .into_iter()
        .flatten()
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
}
