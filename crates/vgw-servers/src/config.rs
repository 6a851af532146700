//! Updater Configuration
//!
//! Loaded from TOML or JSON (picked by file extension). Every field has a
//! default, so an empty file is a valid configuration:
//!
//! ```toml
//! period_secs = 86400
//! cycle_timeout_secs = 300
//! providers = ["privado", "purevpn"]
//! catalog_path = "/var/lib/vgw/servers.json"
//!
//! [http]
//! timeout_secs = 60
//!
//! [sources.privado]
//! url = "https://mirror.example.com/privado.zip"
//! ```

use crate::archive::ArchiveFormat;
use crate::provider::{Provider, ProviderDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use vgw_network::{DnsConfig, HttpClientConfig};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub max_body_bytes: usize,
    pub max_redirects: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let defaults = HttpClientConfig::default();
        Self {
            timeout_secs: defaults.timeout.as_secs(),
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
            user_agent: defaults.user_agent,
            max_body_bytes: defaults.max_body_size,
            max_redirects: defaults.max_redirects,
        }
    }
}

/// DNS settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsSettings {
    /// Use the system resolver configuration instead of Cloudflare
    pub use_system_dns: bool,
    pub timeout_secs: u64,
}

impl Default for DnsSettings {
    fn default() -> Self {
        let defaults = DnsConfig::default();
        Self {
            use_system_dns: defaults.use_system_dns,
            timeout_secs: defaults.timeout.as_secs(),
        }
    }
}

/// Replacement bundle location for one provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceOverride {
    pub url: String,
    #[serde(default)]
    pub format: Option<ArchiveFormat>,
}

/// Updater configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    /// Seconds between update cycles; 0 disables periodic updates
    pub period_secs: u64,
    /// Deadline of each provider update
    pub cycle_timeout_secs: Option<u64>,
    /// Providers to update
    pub providers: Vec<Provider>,
    /// DNS repetitions for every provider, instead of each provider's own
    pub repetitions: Option<usize>,
    /// Catalog snapshot file
    pub catalog_path: Option<PathBuf>,
    /// Keep the previous catalog when an update would leave none
    pub refuse_empty_catalog: bool,
    pub print_warnings: bool,
    pub print_listing: bool,
    pub http: HttpSettings,
    pub dns: DnsSettings,
    /// Bundle locations keyed by provider name
    pub sources: BTreeMap<String, SourceOverride>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            period_secs: 24 * 60 * 60,
            cycle_timeout_secs: Some(300),
            providers: Provider::all().to_vec(),
            repetitions: None,
            catalog_path: None,
            refuse_empty_catalog: false,
            print_warnings: false,
            print_listing: false,
            http: HttpSettings::default(),
            dns: DnsSettings::default(),
            sources: BTreeMap::new(),
        }
    }
}

impl UpdaterConfig {
    /// Load from a file; `.json` files are read as JSON, anything else as TOML
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content)?,
            _ => Self::from_toml(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reject settings the updater cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid("no provider selected".to_string()));
        }
        if self.repetitions == Some(0) {
            return Err(ConfigError::Invalid("repetitions must be at least 1".to_string()));
        }
        if self.cycle_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid("cycle_timeout_secs must be positive".to_string()));
        }
        if self.http.timeout_secs == 0 || self.http.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid("HTTP timeouts must be positive".to_string()));
        }
        if self.dns.timeout_secs == 0 {
            return Err(ConfigError::Invalid("DNS timeout must be positive".to_string()));
        }
        for name in self.sources.keys() {
            name.parse::<Provider>()
                .map_err(|e| ConfigError::Invalid(format!("sources: {}", e)))?;
        }
        Ok(())
    }

    /// Pipeline descriptors of the selected providers, in provider order
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        let mut providers = self.providers.clone();
        providers.sort();
        providers.dedup();

        providers
            .into_iter()
            .map(|provider| {
                let mut descriptor = provider.descriptor();
                if let Some(repetitions) = self.repetitions {
                    descriptor.repetitions = repetitions;
                }
                if let Some(source) = self.sources.get(provider.name()) {
                    descriptor.url = source.url.clone();
                    if let Some(format) = source.format {
                        descriptor.format = format;
                    }
                }
                descriptor
            })
            .collect()
    }

    pub fn period(&self) -> Option<Duration> {
        (self.period_secs > 0).then(|| Duration::from_secs(self.period_secs))
    }

    pub fn cycle_timeout(&self) -> Option<Duration> {
        self.cycle_timeout_secs.map(Duration::from_secs)
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: Duration::from_secs(self.http.timeout_secs),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            user_agent: self.http.user_agent.clone(),
            max_body_size: self.http.max_body_bytes,
            max_redirects: self.http.max_redirects,
        }
    }

    pub fn dns_config(&self) -> DnsConfig {
        DnsConfig {
            use_system_dns: self.dns.use_system_dns,
            timeout: Duration::from_secs(self.dns.timeout_secs),
            ..DnsConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = UpdaterConfig::from_toml("").unwrap();
        assert_eq!(config, UpdaterConfig::default());
        assert!(config.validate().is_ok());
        assert!(!config.refuse_empty_catalog);
        assert_eq!(config.descriptors().len(), Provider::all().len());
    }

    #[test]
    fn test_toml_overrides() {
        let config = UpdaterConfig::from_toml(
            r#"
            period_secs = 0
            providers = ["purevpn", "privado", "purevpn"]
            repetitions = 5
            refuse_empty_catalog = true

            [http]
            timeout_secs = 12

            [sources.privado]
            url = "https://mirror.example.com/privado.tar.gz"
            format = "tar.gz"
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.period(), None);
        assert!(config.refuse_empty_catalog);
        assert_eq!(config.http_client_config().timeout, Duration::from_secs(12));

        let descriptors = config.descriptors();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].provider, Provider::Privado);
        assert_eq!(descriptors[0].url, "https://mirror.example.com/privado.tar.gz");
        assert_eq!(descriptors[0].format, ArchiveFormat::TarGz);
        assert!(descriptors.iter().all(|d| d.repetitions == 5));
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = UpdaterConfig::default();
        config.providers.clear();
        assert!(config.validate().is_err());

        let mut config = UpdaterConfig::default();
        config.repetitions = Some(0);
        assert!(config.validate().is_err());

        let mut config = UpdaterConfig::default();
        config.http.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = UpdaterConfig::default();
        config.sources.insert(
            "acme".to_string(),
            SourceOverride {
                url: "https://acme.example.com".to_string(),
                format: None,
            },
        );
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_provider_is_parse_error() {
        let result = UpdaterConfig::from_toml(r#"providers = ["acme"]"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("vgw.toml");
        std::fs::write(&toml_path, "period_secs = 60\n").unwrap();
        let config = UpdaterConfig::from_file(&toml_path).unwrap();
        assert_eq!(config.period(), Some(Duration::from_secs(60)));

        let json_path = dir.path().join("vgw.json");
        std::fs::write(&json_path, r#"{"providers": ["surfshark"], "print_listing": true}"#).unwrap();
        let config = UpdaterConfig::from_file(&json_path).unwrap();
        assert_eq!(config.providers, vec![Provider::Surfshark]);
        assert!(config.print_listing);

        let invalid_path = dir.path().join("invalid.toml");
        std::fs::write(&invalid_path, "repetitions = 0\n").unwrap();
        assert!(matches!(
            UpdaterConfig::from_file(&invalid_path),
            Err(ConfigError::Invalid(_))
        ));
    }
}
