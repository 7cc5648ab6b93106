use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use tracing::info;

use crate::models::CgpaMethod;

pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub cgpa_method: CgpaMethod,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set to a Postgres instance")?,
            max_connections: load_or("DATABASE_MAX_CONNECTIONS", "5")?,
            cgpa_method: load_or("CGPA_METHOD", CgpaMethod::default().as_str())?,
        })
    }
}

fn load_or<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    parse_setting(key, &raw)
}

fn parse_setting<T: FromStr>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}
