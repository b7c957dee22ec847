use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::services::profiler::DEFAULT_TOP_N;

const DEFAULT_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub max_file_size: usize,
    pub top_n: usize,
    pub preview_rows: usize,
    pub firebase_api_key: String,
    pub firebase_auth_url: String,
    pub warehouse_path: String,
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let firebase_api_key = lookup("FIREBASE_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .context("Failed to load FIREBASE_API_KEY")?;

        Ok(Config {
            bind_addr: parse_or(&lookup, "BIND_ADDR", SocketAddr::from(([127, 0, 0, 1], 3000)))?,
            max_file_size: parse_or(&lookup, "MAX_FILE_SIZE", default_max_file_size())?,
            top_n: parse_or(&lookup, "PROFILE_TOP_N", DEFAULT_TOP_N)?,
            preview_rows: parse_or(&lookup, "PREVIEW_ROWS", 100)?,
            firebase_api_key,
            firebase_auth_url: lookup("FIREBASE_AUTH_URL").unwrap_or_else(|| DEFAULT_AUTH_URL.to_string()),
            warehouse_path: lookup("WAREHOUSE_PATH").unwrap_or_else(|| ":memory:".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

pub fn load_config() -> Result<Config> {
    Config::new()
}
