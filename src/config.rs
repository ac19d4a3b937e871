use std::net::SocketAddr;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database_url: String,
    pub token_secret: String,
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
}

fn default_token_ttl_secs() -> u64 {
    60 * 60
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn default_store_timeout_ms() -> u64 {
    5000
}

pub fn load_settings() -> Result<Settings> {
    Figment::new()
        .merge(Toml::file("studentbase.toml"))
        .merge(Env::prefixed("STUDENTBASE_"))
        .extract()
        .context("Failed to load server settings")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn optional_settings_fall_back_to_defaults() {
        let settings: Settings = Figment::new()
            .merge(Toml::string(
                r#"
                database_url = "postgres://localhost/students"
                token_secret = "secret"
                "#,
            ))
            .extract()
            .unwrap();
        assert_eq!(settings.token_ttl_secs, 3600);
        assert_eq!(settings.bind_addr.to_string(), "127.0.0.1:3000");
        assert_eq!(settings.store_timeout_ms, 5000);
    }

    #[test]
    fn required_settings_cannot_be_omitted() {
        let result: std::result::Result<Settings, _> = Figment::new()
            .merge(Toml::string(r#"token_secret = "secret""#))
            .extract();
        assert!(result.is_err());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let settings: Settings = Figment::new()
            .merge(Toml::string(
                r#"
                database_url = "postgres://localhost/students"
                token_secret = "secret"
                token_ttl_secs = 120
                bind_addr = "0.0.0.0:8080"
                store_timeout_ms = 250
                "#,
            ))
            .extract()
            .unwrap();
        assert_eq!(settings.token_ttl_secs, 120);
        assert_eq!(settings.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(settings.store_timeout_ms, 250);
    }
}
