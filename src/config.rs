use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    /// Listener for the real-time event feed
    pub ws_addr: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Office geofence
    pub office_latitude: f64,
    pub office_longitude: f64,
    pub office_radius_meters: f64,

    // Evidence
    pub upload_dir: PathBuf,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub evidence_store_timeout: Duration,
    pub overlay_enabled: bool,
    pub overlay_font_path: Option<PathBuf>,

    // Event hub
    pub subscriber_queue_capacity: usize,
    pub hub_inbox_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            ws_addr: env::var("WS_ADDR").unwrap_or_else(|_| "0.0.0.0:8002".to_string()),

            rate_protected_per_min: parse_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            office_latitude: parse_or("OFFICE_LATITUDE", 20.962448)?,
            office_longitude: parse_or("OFFICE_LONGITUDE", 105.790762)?,
            office_radius_meters: parse_or("OFFICE_RADIUS_METERS", 100.0)?,

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string())
                .trim_end_matches('/')
                .to_string(),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?, // 10 MiB
            evidence_store_timeout: Duration::from_secs(parse_or(
                "EVIDENCE_STORE_TIMEOUT_SECS",
                15,
            )?),
            overlay_enabled: parse_or("OVERLAY_ENABLED", true)?,
            overlay_font_path: env::var("OVERLAY_FONT_PATH").ok().map(PathBuf::from),

            subscriber_queue_capacity: capacity_or("SUBSCRIBER_QUEUE_CAPACITY", 256)?,
            hub_inbox_capacity: capacity_or("HUB_INBOX_CAPACITY", 1024)?,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: "mysql://localhost/test".to_string(),
            jwt_secret: jwt_secret.to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            ws_addr: "127.0.0.1:0".to_string(),
            rate_protected_per_min: 1000,
            api_prefix: "/api/v1".to_string(),
            office_latitude: 20.962448,
            office_longitude: 105.790762,
            office_radius_meters: 100.0,
            upload_dir: PathBuf::from("./uploads"),
            public_base_url: "http://localhost:8001".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            evidence_store_timeout: Duration::from_secs(15),
            overlay_enabled: false,
            overlay_font_path: None,
            subscriber_queue_capacity: 256,
            hub_inbox_capacity: 1024,
        }
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

/// Channel capacities; tokio channels cannot be created with zero slots.
fn capacity_or(key: &str, default: usize) -> Result<usize> {
    match parse_or(key, default)? {
        0 => Err(anyhow!("{key} must be at least 1")),
        capacity => Ok(capacity),
    }
}
