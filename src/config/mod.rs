//! Configuration management.
//!
//! Provider credentials and endpoints load from a TOML file with
//! `ARTICLE_DISCOVERY_*` environment overrides. Exactly one provider is
//! active per deployment; the others may stay unconfigured.
//!
//! ```toml
//! provider = "summon"
//!
//! [http]
//! read_timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [ebsco]
//! profile = "edsapi"
//! guest = true
//!
//! [primo]
//! base_url = "http://primo.example.edu/PrimoWebServices"
//! institution = "EXAMPLE"
//!
//! [summon]
//! access_id = "example"
//! secret_key = "..."
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::Provider;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// The provider to use for this deployment
    #[serde(default)]
    pub provider: Option<Provider>,

    /// HTTP transport settings shared by all adapters
    #[serde(default)]
    pub http: HttpConfig,

    /// EBSCO EDS credentials
    #[serde(default)]
    pub ebsco: Option<EbscoConfig>,

    /// Primo Central endpoint settings
    #[serde(default)]
    pub primo: Option<PrimoConfig>,

    /// Summon API credentials
    #[serde(default)]
    pub summon: Option<SummonConfig>,
}

/// HTTP transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Read timeout applied to every vendor call
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: default_read_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

fn default_read_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// EBSCO EDS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbscoConfig {
    /// REST endpoint root
    #[serde(default = "default_ebsco_base_url")]
    pub base_url: String,

    /// EDS profile identifier sent on session creation
    pub profile: String,

    /// Open sessions as guest by default
    #[serde(default = "default_true")]
    pub guest: bool,
}

fn default_ebsco_base_url() -> String {
    "https://eds-api.ebscohost.com/edsapi/rest".to_string()
}

fn default_true() -> bool {
    true
}

/// Primo Central settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimoConfig {
    /// X-Services endpoint root
    pub base_url: String,

    /// Institution code added to every request
    pub institution: String,
}

/// Summon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummonConfig {
    /// API endpoint root
    #[serde(default = "default_summon_base_url")]
    pub base_url: String,

    /// Access id (public half of the credential pair)
    pub access_id: String,

    /// Secret key used to sign every request
    pub secret_key: String,
}

fn default_summon_base_url() -> String {
    "https://api.summon.serialssolutions.com/2.0.0".to_string()
}

/// Load configuration from a file, with environment overrides
/// (`ARTICLE_DISCOVERY_PROVIDER`, `ARTICLE_DISCOVERY_SUMMON__ACCESS_ID`, ...)
pub fn load_config(path: &PathBuf) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.as_path()))
        .add_source(
            config::Environment::with_prefix("ARTICLE_DISCOVERY")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize()
}

/// Default config file location (`~/.config/article-discovery/config.toml`)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("article-discovery")
        .join("config.toml")
}
