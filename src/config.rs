use std::env;
use std::str::FromStr;

use auxcord_queue::MemoryCache;
use auxcord_server::DEFAULT_PORT;
use thiserror::Error;

const DATABASE_URL: &str = "AUXCORD_DATABASE_URL";
const SERVER_PORT: &str = "AUXCORD_SERVER_PORT";
const BUS_TOPIC: &str = "AUXCORD_BUS_TOPIC";
const BUS_GROUP: &str = "AUXCORD_BUS_GROUP";
const CACHE_TTL_HOURS: &str = "AUXCORD_CACHE_TTL_HOURS";

const DEFAULT_BUS_TOPIC: &str = "music-queue-events";
const DEFAULT_BUS_GROUP: &str = "auxcord-server";

/// Runtime settings, gathered from the environment once at startup
#[derive(Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub bus_topic: String,
    pub bus_group: String,
    pub cache_ttl_hours: i64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an unusable value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: require(DATABASE_URL)?,
            port: parsed_or(SERVER_PORT, DEFAULT_PORT)?,
            bus_topic: string_or(BUS_TOPIC, DEFAULT_BUS_TOPIC),
            bus_group: string_or(BUS_GROUP, DEFAULT_BUS_GROUP),
            cache_ttl_hours: parsed_or(CACHE_TTL_HOURS, MemoryCache::DEFAULT_TTL_HOURS)?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn string_or(name: &'static str, fallback: &str) -> String {
    env::var(name).unwrap_or_else(|_| fallback.to_string())
}

fn parsed_or<T: FromStr>(name: &'static str, fallback: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(fallback),
    }
}
