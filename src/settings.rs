use crate::BoxError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

/// The persisted settings the site URL bootstrap reads and writes.
///
/// Implementations are shared across concurrent requests. Writes are expected
/// to be idempotent, last writer wins.
///
/// `is_initialized` and `has_site_url` run on every request, synchronously on
/// the executor thread, so they must be cheap and must not block.
pub trait SettingsStore: Send + Sync {
    /// Whether the backing data store is ready to accept settings.
    fn is_initialized(&self) -> bool;

    /// The current site URL, if any.
    fn site_url(&self) -> Option<String>;

    /// Persists a new site URL.
    fn set_site_url(&self, url: &str) -> Result<(), BoxError>;

    /// Whether a non-empty site URL is already stored.
    fn has_site_url(&self) -> bool {
        self.site_url().is_some_and(|url| !url.is_empty())
    }
}

/// A process-local [`SettingsStore`].
#[derive(Debug)]
pub struct InMemorySettings {
    initialized: AtomicBool,
    site_url: RwLock<Option<String>>,
}

impl InMemorySettings {
    /// Creates an initialized store with no site URL.
    pub fn new() -> Self {
        Self {
            initialized: AtomicBool::new(true),
            site_url: RwLock::new(None),
        }
    }

    /// Creates a store whose backing data store is not ready yet.
    pub fn uninitialized() -> Self {
        Self {
            initialized: AtomicBool::new(false),
            ..Self::new()
        }
    }

    /// Creates an initialized store with a site URL already set.
    pub fn with_site_url(url: impl Into<String>) -> Self {
        Self {
            site_url: RwLock::new(Some(url.into())),
            ..Self::new()
        }
    }

    /// Marks the backing data store as ready or not.
    pub fn set_initialized(&self, initialized: bool) {
        self.initialized.store(initialized, Ordering::Release);
    }
}

impl Default for InMemorySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for InMemorySettings {
    fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    fn site_url(&self) -> Option<String> {
        self.site_url
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_site_url(&self, url: &str) -> Result<(), BoxError> {
        *self
            .site_url
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(url.to_owned());
        Ok(())
    }
}
