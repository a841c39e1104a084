//! Debug and user settings
//!
//! [`SettingsService`] is built once at startup and handed to consumers as an
//! `Arc`. It loads every value from its [`SettingsStore`] on construction and
//! writes through to the store on every change, keeping an in-memory
//! snapshot for cheap reads.

use crate::db::settings::{get_setting, set_setting};
use crate::error::{Error, Result};
use async_trait::async_trait;
use hitit_common::events::{EventBus, HitItEvent};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

pub const AUTO_FLIP_ENABLED: &str = "auto_flip_enabled";
pub const AUTO_FLIP_DELAY_MS: &str = "auto_flip_delay_ms";
pub const USE_DEEZER_DEEPLINK: &str = "use_deezer_deeplink";
pub const USE_FULL_VERSION: &str = "use_full_version";
pub const FLASH_ENABLED: &str = "flash_enabled";

pub const DEFAULT_AUTO_FLIP_DELAY_MS: u64 = 3000;
pub const MIN_AUTO_FLIP_DELAY_MS: u64 = 500;
pub const MAX_AUTO_FLIP_DELAY_MS: u64 = 30_000;

/// Default values seeded into a fresh database
pub fn default_settings() -> Vec<(&'static str, String)> {
    let defaults = DebugSettings::default();
    vec![
        (AUTO_FLIP_ENABLED, defaults.auto_flip_enabled.to_string()),
        (AUTO_FLIP_DELAY_MS, defaults.auto_flip_delay_ms.to_string()),
        (USE_DEEZER_DEEPLINK, defaults.use_deezer_deeplink.to_string()),
        (USE_FULL_VERSION, defaults.use_full_version.to_string()),
        (FLASH_ENABLED, defaults.flash_enabled.to_string()),
    ]
}

/// Typed key/value store for preferences
///
/// Reads never fail: a missing or unreadable value yields `default`.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_bool(&self, key: &str, default: bool) -> bool;
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;
    async fn get_i64(&self, key: &str, default: i64) -> i64;
    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;
}

/// Store backed by the SQLite `settings` table
pub struct SqliteSettingsStore {
    db: Pool<Sqlite>,
}

impl SqliteSettingsStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    async fn get_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        match get_setting::<T>(&self.db, key).await {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(e) => {
                warn!("Failed to read setting {}: {} - using default", key, e);
                default
            }
        }
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_or(key, default).await
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        set_setting(&self.db, key, value).await
    }

    async fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get_or(key, default).await
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        set_setting(&self.db, key, value).await
    }
}

/// Ephemeral store for tests and runs without a database
#[derive(Default)]
pub struct MemorySettingsStore {
    values: std::sync::RwLock<HashMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value, if any
    pub fn raw(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .ok()
            .and_then(|values| values.get(key).cloned())
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| Error::Settings("settings store lock poisoned".to_string()))?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_bool(&self, key: &str, default: bool) -> bool {
        self.raw(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.put(key, value.to_string())
    }

    async fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.raw(key).and_then(|v| v.parse().ok()).unwrap_or(default)
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.put(key, value.to_string())
    }
}

/// Snapshot of all preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSettings {
    /// Simulate the flip gesture after `auto_flip_delay_ms`
    pub auto_flip_enabled: bool,
    pub auto_flip_delay_ms: u64,
    /// Open tracks through the app's deep link rather than the web page
    pub use_deezer_deeplink: bool,
    /// Persisted playback mode: full track in the app vs in-app preview
    pub use_full_version: bool,
    pub flash_enabled: bool,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            auto_flip_enabled: true,
            auto_flip_delay_ms: DEFAULT_AUTO_FLIP_DELAY_MS,
            use_deezer_deeplink: true,
            use_full_version: false,
            flash_enabled: false,
        }
    }
}

/// Partial update, as accepted by `POST /settings`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsUpdate {
    pub auto_flip_enabled: Option<bool>,
    pub auto_flip_delay_ms: Option<u64>,
    pub use_deezer_deeplink: Option<bool>,
    pub use_full_version: Option<bool>,
    pub flash_enabled: Option<bool>,
}

/// Clamp an auto-flip delay into the supported range
pub fn clamp_auto_flip_delay(delay_ms: u64) -> u64 {
    delay_ms.clamp(MIN_AUTO_FLIP_DELAY_MS, MAX_AUTO_FLIP_DELAY_MS)
}

/// Settings owner: load-on-init, persist-on-write
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    current: RwLock<DebugSettings>,
    release_preview: bool,
    events: EventBus,
}

impl SettingsService {
    /// Read every preference from `store`
    ///
    /// With `release_preview` set, auto-flip reports disabled regardless of
    /// the stored value.
    pub async fn load(store: Arc<dyn SettingsStore>, release_preview: bool, events: EventBus) -> Self {
        let defaults = DebugSettings::default();

        let stored_delay = store
            .get_i64(AUTO_FLIP_DELAY_MS, defaults.auto_flip_delay_ms as i64)
            .await;

        let current = DebugSettings {
            auto_flip_enabled: store.get_bool(AUTO_FLIP_ENABLED, defaults.auto_flip_enabled).await,
            auto_flip_delay_ms: clamp_auto_flip_delay(stored_delay.max(0) as u64),
            use_deezer_deeplink: store
                .get_bool(USE_DEEZER_DEEPLINK, defaults.use_deezer_deeplink)
                .await,
            use_full_version: store.get_bool(USE_FULL_VERSION, defaults.use_full_version).await,
            flash_enabled: store.get_bool(FLASH_ENABLED, defaults.flash_enabled).await,
        };

        info!(
            auto_flip = current.auto_flip_enabled,
            delay_ms = current.auto_flip_delay_ms,
            full_version = current.use_full_version,
            release_preview,
            "Settings loaded"
        );

        Self {
            store,
            current: RwLock::new(current),
            release_preview,
            events,
        }
    }

    /// Current values as seen by consumers (release preview applied)
    pub async fn snapshot(&self) -> DebugSettings {
        let mut settings = self.current.read().await.clone();
        if self.release_preview {
            settings.auto_flip_enabled = false;
        }
        settings
    }

    pub fn is_release_preview(&self) -> bool {
        self.release_preview
    }

    pub async fn auto_flip_enabled(&self) -> bool {
        !self.release_preview && self.current.read().await.auto_flip_enabled
    }

    pub async fn auto_flip_delay(&self) -> Duration {
        Duration::from_millis(self.current.read().await.auto_flip_delay_ms)
    }

    pub async fn use_deezer_deeplink(&self) -> bool {
        self.current.read().await.use_deezer_deeplink
    }

    pub async fn use_full_version(&self) -> bool {
        self.current.read().await.use_full_version
    }

    pub async fn flash_enabled(&self) -> bool {
        self.current.read().await.flash_enabled
    }

    pub async fn set_auto_flip_enabled(&self, enabled: bool) -> Result<()> {
        self.store.set_bool(AUTO_FLIP_ENABLED, enabled).await?;
        self.current.write().await.auto_flip_enabled = enabled;
        self.announce(AUTO_FLIP_ENABLED, enabled);
        Ok(())
    }

    /// Store a new auto-flip delay, clamped to 500..=30000 ms
    pub async fn set_auto_flip_delay_ms(&self, delay_ms: u64) -> Result<()> {
        let delay_ms = clamp_auto_flip_delay(delay_ms);
        self.store.set_i64(AUTO_FLIP_DELAY_MS, delay_ms as i64).await?;
        self.current.write().await.auto_flip_delay_ms = delay_ms;
        self.announce(AUTO_FLIP_DELAY_MS, delay_ms);
        Ok(())
    }

    pub async fn set_use_deezer_deeplink(&self, enabled: bool) -> Result<()> {
        self.store.set_bool(USE_DEEZER_DEEPLINK, enabled).await?;
        self.current.write().await.use_deezer_deeplink = enabled;
        self.announce(USE_DEEZER_DEEPLINK, enabled);
        Ok(())
    }

    pub async fn set_use_full_version(&self, enabled: bool) -> Result<()> {
        self.store.set_bool(USE_FULL_VERSION, enabled).await?;
        self.current.write().await.use_full_version = enabled;
        self.announce(USE_FULL_VERSION, enabled);
        Ok(())
    }

    pub async fn set_flash_enabled(&self, enabled: bool) -> Result<()> {
        self.store.set_bool(FLASH_ENABLED, enabled).await?;
        self.current.write().await.flash_enabled = enabled;
        self.announce(FLASH_ENABLED, enabled);
        Ok(())
    }

    /// Apply every field present in `update`, stopping at the first failure
    pub async fn apply(&self, update: SettingsUpdate) -> Result<DebugSettings> {
        if let Some(enabled) = update.auto_flip_enabled {
            self.set_auto_flip_enabled(enabled).await?;
        }
        if let Some(delay_ms) = update.auto_flip_delay_ms {
            self.set_auto_flip_delay_ms(delay_ms).await?;
        }
        if let Some(enabled) = update.use_deezer_deeplink {
            self.set_use_deezer_deeplink(enabled).await?;
        }
        if let Some(enabled) = update.use_full_version {
            self.set_use_full_version(enabled).await?;
        }
        if let Some(enabled) = update.flash_enabled {
            self.set_flash_enabled(enabled).await?;
        }
        Ok(self.snapshot().await)
    }

    fn announce(&self, key: &str, value: impl ToString) {
        self.events.emit(HitItEvent::SettingsChanged {
            key: key.to_string(),
            value: value.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }
}
