use anyhow::{Result, anyhow};
use config::{Config, File};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub auth: Auth,
    pub store: Store,
    pub cache: Cache,
    pub hot_cache: HotCacheSettings,
    pub rotation: Rotation,
    pub tenancy: Tenancy,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub cert_path: String,
    pub key_path: String,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Deserialize)]
pub struct Auth {
    /// Name of the session cookie on both request and response.
    pub cookie_name: String,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: String, // "memory" or "mysql"
    pub mysql_dsn: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub backend: String, // "memory" or "redis"
    pub redis_url: Option<String>,
    pub prefix: String,
    pub ttl_secs: u64,
    pub io_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct HotCacheSettings {
    pub capacity: usize,
    pub ttl_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Rotation {
    pub interval_secs: u64,
    pub max_per_minute: u32,
    pub grace_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Tenancy {
    pub default_tenant: Option<String>,
    pub base_domain: Option<String>,
    #[serde(default)]
    pub hosts: HashMap<String, String>,
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    Ok(settings)
}
