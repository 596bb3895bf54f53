// src/db/config.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Логическое имя базы, как в старом приложении.
pub const DATABASE_NAME: &str = "Contacts";

pub const DEFAULT_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

const IN_MEMORY_PATH: &str = ":memory:";

/// Параметры открытия хранилища.
#[derive(Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// Ключ SQLCipher. Без фичи `encryption` открытие с ключом - ошибка.
    pub key: Option<String>,
    /// 0 выключает кэш.
    pub cache_capacity: usize,
    pub busy_timeout: Duration,
    pub event_capacity: usize,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key: None,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// `dir/Contacts.db`
    pub fn in_directory(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{DATABASE_NAME}.db")))
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_PATH)
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}

// Ключ в логи не попадает.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("path", &self.path)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("cache_capacity", &self.cache_capacity)
            .field("busy_timeout", &self.busy_timeout)
            .field("event_capacity", &self.event_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_directory_uses_logical_name() {
        let config = StoreConfig::in_directory("/data/app");
        assert_eq!(config.path, PathBuf::from("/data/app/Contacts.db"));
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(StoreConfig::in_memory().path, PathBuf::from(":memory:"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = StoreConfig::in_memory().with_key("my_secret");
        let printed = format!("{config:?}");
        assert!(!printed.contains("my_secret"));
        assert!(printed.contains("<redacted>"));
    }
}
