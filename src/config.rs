use std::{
    env, fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::eventid::MAX_WORKER_ID;

pub const DEFAULT_CACHE_CAPACITY: usize = 1_024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub data_dir: PathBuf,
    pub cache_capacity: usize,
    pub worker_id: u16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            data_dir: default_data_dir(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            worker_id: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepositoryConfigUpdate {
    pub data_dir: Option<PathBuf>,
    pub cache_capacity: Option<usize>,
    pub worker_id: Option<u16>,
}

pub fn default_config_path() -> Result<PathBuf> {
    let mut path = env::current_dir().map_err(|err| EngineError::Config(err.to_string()))?;
    path.push(".contentdbx");
    path.push("config.toml");
    Ok(path)
}

pub fn load_or_default(path: Option<PathBuf>) -> Result<(RepositoryConfig, PathBuf)> {
    let config_path = if let Some(path) = path {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        path
    } else {
        default_config_path()?
    };

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        let config: RepositoryConfig = toml::from_str(&contents)?;
        config.validate()?;
        config.ensure_data_dir()?;
        Ok((config, config_path))
    } else {
        let config = RepositoryConfig::default();
        config.ensure_data_dir()?;
        config.save(&config_path)?;
        Ok((config, config_path))
    }
}

impl RepositoryConfig {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn apply_update(&mut self, update: RepositoryConfigUpdate) {
        if let Some(dir) = update.data_dir {
            self.data_dir = dir;
        }
        if let Some(capacity) = update.cache_capacity {
            self.cache_capacity = capacity;
        }
        if let Some(worker_id) = update.worker_id {
            self.worker_id = worker_id;
        }
        self.updated_at = Utc::now();
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_id > MAX_WORKER_ID {
            return Err(EngineError::Config(format!(
                "worker_id {} exceeds maximum {MAX_WORKER_ID}",
                self.worker_id
            )));
        }
        Ok(())
    }

    pub fn ensure_data_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    pub fn event_store_path(&self) -> PathBuf {
        self.data_dir.join("event_store")
    }
}

fn default_data_dir() -> PathBuf {
    let Ok(current_dir) = env::current_dir() else {
        return PathBuf::from(".contentdbx");
    };
    current_dir.join(".contentdbx")
}
