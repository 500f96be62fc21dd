//! Construction-time configuration: deployment environment, endpoints,
//! certificate material and timeouts.
//!
//! Environment selection is fixed when the client is built, never per
//! call; the two deployments differ in their base URL pair and in the
//! certificate the service signs results with.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::attributes::AssuranceLevel;
use crate::error::{Error, Result};
use crate::transport::ClientIdentity;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// The two remote deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrejaEnvironment {
    Test,
    Production,
}

impl FrejaEnvironment {
    /// Base URL of the operation endpoints.
    pub fn service_url(&self) -> &'static str {
        match self {
            FrejaEnvironment::Test => "https://services.test.frejaeid.com",
            FrejaEnvironment::Production => "https://services.prod.frejaeid.com",
        }
    }

    /// Base URL of the resource endpoints (QR-code generation).
    pub fn resource_url(&self) -> &'static str {
        match self {
            FrejaEnvironment::Test => "https://resources.test.frejaeid.com",
            FrejaEnvironment::Production => "https://resources.prod.frejaeid.com",
        }
    }

    /// Conventional location of the environment's JWS certificate when no
    /// explicit path is configured.
    pub fn default_jws_certificate(&self) -> &'static Path {
        match self {
            FrejaEnvironment::Test => Path::new("certs/frejaeid_cert_test.pem"),
            FrejaEnvironment::Production => Path::new("certs/frejaeid_cert_prod.pem"),
        }
    }
}

/// Declarative settings as loaded from file and environment sources.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub environment: FrejaEnvironment,
    /// Path to the PKCS#12 bundle issued to the relying party.
    pub identity_bundle: PathBuf,
    pub identity_passphrase: String,
    /// Overrides the environment's conventional JWS certificate location.
    #[serde(default)]
    pub jws_certificate: Option<PathBuf>,
    pub timeout_seconds: u64,
    /// Default assurance level for requests built by callers that take it
    /// from configuration.
    pub assurance_level: AssuranceLevel,
}

impl Settings {
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    /// Loads settings from `config/freja.*` and `FREJA_`-prefixed
    /// environment variables (e.g. `FREJA_IDENTITY_PASSPHRASE`).
    ///
    /// When `env_vars` is provided it replaces the system environment,
    /// keeping tests free of ambient variable pollution.
    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("environment", "test")?
            .set_default("identity_bundle", "certs/client.pfx")?
            .set_default("identity_passphrase", "")?
            .set_default("timeout_seconds", DEFAULT_TIMEOUT_SECONDS)?
            .set_default("assurance_level", "BASIC")?
            .add_source(File::with_name("config/freja").required(false));

        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            builder = builder.add_source(
                Environment::with_prefix("FREJA")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

/// Resolved construction-time configuration: certificate material loaded
/// into memory, endpoints fixed. Shared read-only across concurrent calls.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub environment: FrejaEnvironment,
    pub identity: ClientIdentity,
    /// PEM certificate the service signs results with.
    pub trust_anchor_pem: Vec<u8>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(
        environment: FrejaEnvironment,
        identity: ClientIdentity,
        trust_anchor_pem: Vec<u8>,
    ) -> Self {
        Self {
            environment,
            identity,
            trust_anchor_pem,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reads the certificate material the settings point at.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let pkcs12_der = std::fs::read(&settings.identity_bundle).map_err(|e| {
            Error::CertificateMaterial(format!(
                "client certificate bundle could not be read at {}: {e}",
                settings.identity_bundle.display()
            ))
        })?;

        let anchor_path = settings
            .jws_certificate
            .clone()
            .unwrap_or_else(|| settings.environment.default_jws_certificate().to_path_buf());
        let trust_anchor_pem = std::fs::read(&anchor_path).map_err(|e| {
            Error::CertificateMaterial(format!(
                "JWS certificate file could not be found ({}): {e}",
                anchor_path.display()
            ))
        })?;

        Ok(Self {
            environment: settings.environment,
            identity: ClientIdentity {
                pkcs12_der,
                passphrase: settings.identity_passphrase.clone(),
            },
            trust_anchor_pem,
            timeout: Duration::from_secs(settings.timeout_seconds),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_test_environment() {
        let settings = Settings::load_with_sources(Some(HashMap::new())).unwrap();

        assert_eq!(settings.environment, FrejaEnvironment::Test);
        assert_eq!(settings.timeout_seconds, 30);
        assert_eq!(settings.assurance_level, AssuranceLevel::Basic);
        assert!(settings.jws_certificate.is_none());
    }

    #[test]
    fn overrides_replace_defaults() {
        let mut env_vars = HashMap::new();
        env_vars.insert("environment".to_string(), "production".to_string());
        env_vars.insert("identity_passphrase".to_string(), "hunter2".to_string());
        env_vars.insert("timeout_seconds".to_string(), "10".to_string());
        env_vars.insert("assurance_level".to_string(), "PLUS".to_string());

        let settings = Settings::load_with_sources(Some(env_vars)).unwrap();

        assert_eq!(settings.environment, FrejaEnvironment::Production);
        assert_eq!(settings.identity_passphrase, "hunter2");
        assert_eq!(settings.timeout_seconds, 10);
        assert_eq!(settings.assurance_level, AssuranceLevel::Plus);
    }

    #[test]
    fn endpoints_differ_per_environment() {
        assert_eq!(
            FrejaEnvironment::Test.service_url(),
            "https://services.test.frejaeid.com"
        );
        assert_eq!(
            FrejaEnvironment::Production.resource_url(),
            "https://resources.prod.frejaeid.com"
        );
        assert_ne!(
            FrejaEnvironment::Test.default_jws_certificate(),
            FrejaEnvironment::Production.default_jws_certificate()
        );
    }

    #[test]
    fn from_settings_resolves_fixture_material() {
        let mut env_vars = HashMap::new();
        env_vars.insert(
            "identity_bundle".to_string(),
            "test_data/client_identity.p12".to_string(),
        );
        env_vars.insert(
            "identity_passphrase".to_string(),
            "test-passphrase".to_string(),
        );
        env_vars.insert(
            "jws_certificate".to_string(),
            "test_data/jws_anchor.pem".to_string(),
        );
        let settings = Settings::load_with_sources(Some(env_vars)).unwrap();

        let config = ClientConfig::from_settings(&settings).unwrap();
        assert_eq!(config.environment, FrejaEnvironment::Test);
        assert!(!config.identity.pkcs12_der.is_empty());
        assert!(
            config
                .trust_anchor_pem
                .starts_with(b"-----BEGIN CERTIFICATE-----")
        );
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_certificate_material_is_reported_with_its_path() {
        let mut env_vars = HashMap::new();
        env_vars.insert(
            "identity_bundle".to_string(),
            "does/not/exist.pfx".to_string(),
        );
        let settings = Settings::load_with_sources(Some(env_vars)).unwrap();

        let err = ClientConfig::from_settings(&settings).unwrap_err();
        match err {
            Error::CertificateMaterial(message) => assert!(message.contains("does/not/exist.pfx")),
            other => panic!("expected CertificateMaterial, got {other:?}"),
        }
    }
}
