use miette::{IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub keys: Keys,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
    /// Public base URL, e.g. https://jobs.example.com. An https URL marks the session cookie Secure.
    pub public_base_url: Option<String>,
    /// Whether `POST /register` creates accounts.
    #[serde(default = "default_allow_public_registration")]
    pub allow_public_registration: bool,
    /// Lifetime of a login session in seconds
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
}

fn default_allow_public_registration() -> bool {
    true
}

fn default_session_ttl_secs() -> i64 {
    3600
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Database {
    /// SeaORM/SQLx connection string. The month tables (Jan..Dec) live in the same database.
    /// Example: sqlite://job_logs.db?mode=rwc
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keys {
    /// Hex-encoded AES-256 key used for users.secret_data. Generated on first start.
    pub secret_key_path: PathBuf,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_base_url: None,
            allow_public_registration: default_allow_public_registration(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl Default for Database {
    fn default() -> Self {
        Self {
            url: "sqlite://job_logs.db?mode=rwc".to_string(),
        }
    }
}

impl Default for Keys {
    fn default() -> Self {
        Self {
            secret_key_path: PathBuf::from("data/encryption.key"),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("server.host", Server::default().host)
            .into_diagnostic()?
            .set_default("server.port", Server::default().port)
            .into_diagnostic()?
            .set_default("database.url", Database::default().url)
            .into_diagnostic()?
            .set_default(
                "keys.secret_key_path",
                Keys::default()
                    .secret_key_path
                    .to_string_lossy()
                    .to_string(),
            )
            .into_diagnostic()?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: JOBDASH__SERVER__PORT=9090, etc.
        builder = builder.add_source(config::Environment::with_prefix("JOBDASH").separator("__"));

        let cfg = builder.build().into_diagnostic()?;
        let mut s: Settings = cfg.try_deserialize().into_diagnostic()?;

        if s.keys.secret_key_path.is_relative() {
            s.keys.secret_key_path = std::env::current_dir()
                .into_diagnostic()?
                .join(&s.keys.secret_key_path);
        }

        Ok(s)
    }

    pub fn base_url(&self) -> String {
        if let Some(base) = &self.server.public_base_url {
            base.trim_end_matches('/').to_string()
        } else {
            format!("http://{}:{}", self.server.host, self.server.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_settings_load_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nonexistent.toml");

        let settings = Settings::load(config_path.to_str().unwrap())
            .expect("Failed to load settings");

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert!(settings.server.allow_public_registration);
        assert_eq!(settings.database.url, "sqlite://job_logs.db?mode=rwc");
        assert!(settings.keys.secret_key_path.ends_with("data/encryption.key"));
    }

    #[test]
    fn test_settings_load_from_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let config_content = r#"
[server]
host = "127.0.0.1"
port = 9090
public_base_url = "https://jobs.example.com"
allow_public_registration = false

[database]
url = "sqlite:///var/lib/jobdash/job_logs.db?mode=rwc"

[keys]
secret_key_path = "/etc/jobdash/encryption.key"
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        let settings = Settings::load(config_path.to_str().unwrap())
            .expect("Failed to load settings");

        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(
            settings.server.public_base_url,
            Some("https://jobs.example.com".to_string())
        );
        assert!(!settings.server.allow_public_registration);
        assert_eq!(
            settings.database.url,
            "sqlite:///var/lib/jobdash/job_logs.db?mode=rwc"
        );
        assert_eq!(
            settings.keys.secret_key_path,
            PathBuf::from("/etc/jobdash/encryption.key")
        );
    }

    #[test]
    fn test_settings_env_override() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let config_content = r#"
[server]
host = "127.0.0.1"
port = 8080
session_ttl_secs = 600
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        // Only touch a key no other test asserts on; tests share the process env
        env::set_var("JOBDASH__SERVER__SESSION_TTL_SECS", "120");

        let settings = Settings::load(config_path.to_str().unwrap())
            .expect("Failed to load settings");

        assert_eq!(settings.server.session_ttl_secs, 120);
        assert_eq!(settings.server.host, "127.0.0.1");

        env::remove_var("JOBDASH__SERVER__SESSION_TTL_SECS");
    }

    #[test]
    fn test_settings_base_url_with_public_base_url() {
        let mut settings = Settings::default();
        settings.server.public_base_url = Some("https://jobs.example.com/".to_string());

        assert_eq!(settings.base_url(), "https://jobs.example.com");
    }

    #[test]
    fn test_settings_base_url_fallback() {
        let mut settings = Settings::default();
        settings.server.host = "localhost".to_string();
        settings.server.port = 3000;
        settings.server.public_base_url = None;

        assert_eq!(settings.base_url(), "http://localhost:3000");
    }

    #[test]
    fn test_settings_key_path_normalization() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let config_content = r#"
[keys]
secret_key_path = "relative/encryption.key"
"#;
        fs::write(&config_path, config_content).expect("Failed to write config");

        let settings = Settings::load(config_path.to_str().unwrap())
            .expect("Failed to load settings");

        assert!(settings.keys.secret_key_path.is_absolute());
        assert!(settings.keys.secret_key_path.ends_with("relative/encryption.key"));
    }
}
