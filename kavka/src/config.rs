//! YAML configuration, mirroring the broker's four sections: global
//! identity, topic tunables, storage driver selection, and logging.
//! Defaults are applied before the file is parsed over them, and a
//! handful of fields can be overridden by environment variables
//! afterwards.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unable to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("storage driver is not defined")]
    NoDriver,
    #[error("multiple storage drivers specified in configuration")]
    MultipleDrivers,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Global {
    pub address: String,
    pub logfile: String,
    pub hostname: String,
    pub group: String,
    pub port: u16,
}

impl Default for Global {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());
        Self {
            address: String::new(),
            logfile: "/var/log/kavka.log".to_string(),
            group: hostname.clone(),
            hostname,
            port: 9000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Topic {
    pub allow_topics_creation: bool,
    pub write_concern: usize,
    #[serde(with = "humantime_serde::option")]
    pub message_retention_period: Option<Duration>,
    pub max_partition_size: u64,
    pub max_message_size: u64,
    pub max_chunk_size: usize,
    #[serde(with = "humantime_serde")]
    pub cleanup_period: Duration,
}

impl Default for Topic {
    fn default() -> Self {
        Self {
            allow_topics_creation: false,
            write_concern: 1,
            message_retention_period: None,
            max_partition_size: 0,
            max_message_size: 0,
            max_chunk_size: 1024,
            cleanup_period: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Storage {
    pub sync_pool: usize,
    pub driver: HashMap<String, HashMap<String, String>>,
    #[serde(with = "humantime_serde")]
    pub cleanup_period: Duration,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            sync_pool: 10,
            driver: HashMap::new(),
            cleanup_period: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub global: Global,
    pub logging: Logging,
    pub topic: Topic,
    pub storage: Storage,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path_ref = path.as_ref();
        let data = std::fs::read_to_string(path_ref).map_err(|source| Error::Read {
            path: path_ref.display().to_string(),
            source,
        })?;
        let mut cfg: Config = serde_yaml::from_str(&data).map_err(|source| Error::Parse {
            path: path_ref.display().to_string(),
            source,
        })?;
        cfg.load_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn load_env(&mut self) {
        if let Ok(v) = std::env::var("KAVKA_HOSTNAME") {
            if !v.is_empty() {
                self.global.hostname = v;
            }
        }
        if let Ok(v) = std::env::var("KAVKA_GROUP") {
            if !v.is_empty() {
                self.global.group = v;
            }
        }
        if let Ok(v) = std::env::var("KAVKA_ADDRESS") {
            if !v.is_empty() {
                self.global.address = v;
            }
        }
        if let Ok(v) = std::env::var("KAVKA_LOGFILE") {
            if !v.is_empty() {
                self.global.logfile = v;
            }
        }
    }

    fn validate(&self) -> Result<(), Error> {
        match self.storage.driver.len() {
            0 => Err(Error::NoDriver),
            1 => Ok(()),
            _ => Err(Error::MultipleDrivers),
        }
    }

    /// The single configured storage driver's name and parameters.
    pub fn storage_driver(&self) -> (&str, &HashMap<String, String>) {
        self.storage
            .driver
            .iter()
            .next()
            .map(|(name, params)| (name.as_str(), params))
            .expect("validated at load time")
    }
}
