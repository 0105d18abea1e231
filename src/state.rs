//! Shared context passed by `Arc` to every task.
//!
//! Each field has exactly one writer:
//!
//! | Field | Writer | Readers |
//! |---|---|---|
//! | `display_enabled` | bus intake (display on/off topic) | display writes |
//! | `showing_announcement` | orchestrator | ambient presenter, display |
//! | `ambient_failing` | refresh scheduler | orchestrator, ambient presenter |
//! | `ambient` cache | refresh scheduler | ambient presenter |
//!
//! The flags are plain atomics. Readers may see a slightly stale value, which
//! only ever affects ambient cosmetics; the display mutex is what keeps
//! physical writes exclusive.

use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug)]
pub struct SharedState {
    display_enabled: AtomicBool,
    showing_announcement: AtomicBool,
    ambient_failing: AtomicBool,
    ambient: AmbientCache,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            display_enabled: AtomicBool::new(true),
            showing_announcement: AtomicBool::new(false),
            ambient_failing: AtomicBool::new(false),
            ambient: AmbientCache::default(),
        }
    }

    pub fn display_enabled(&self) -> bool {
        self.display_enabled.load(Ordering::SeqCst)
    }

    pub fn set_display_enabled(&self, enabled: bool) {
        self.display_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn showing_announcement(&self) -> bool {
        self.showing_announcement.load(Ordering::SeqCst)
    }

    pub fn set_showing_announcement(&self, showing: bool) {
        self.showing_announcement.store(showing, Ordering::SeqCst);
    }

    pub fn ambient_failing(&self) -> bool {
        self.ambient_failing.load(Ordering::SeqCst)
    }

    pub fn set_ambient_failing(&self, failing: bool) {
        self.ambient_failing.store(failing, Ordering::SeqCst);
    }

    pub fn ambient(&self) -> &AmbientCache {
        &self.ambient
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// The most recent successfully fetched weather image.
///
/// Only `store` replaces the entry, and only with a complete image. There is
/// no way to clear it, so a failed fetch can never leave readers without the
/// last good image.
#[derive(Debug, Default)]
pub struct AmbientCache {
    latest: RwLock<Option<Arc<RgbImage>>>,
}

impl AmbientCache {
    pub fn store(&self, image: RgbImage) {
        let mut latest = self.latest.write().unwrap_or_else(PoisonError::into_inner);
        *latest = Some(Arc::new(image));
    }

    /// The cached image, or `None` if no fetch has succeeded yet.
    pub fn latest(&self) -> Option<Arc<RgbImage>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
