use crate::core::image::Asset;
use crate::core::library::{AuthorizationStatus, PhotoStore, StoreError};
use crate::core::thumbnail::render_thumbnail;
use image::DynamicImage;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct MemoryEntry {
    asset: Asset,
    image: Option<DynamicImage>,
}

struct Inner {
    entries: Vec<MemoryEntry>,
    access: AuthorizationStatus,
    list_failure: Option<String>,
    delete_failure: Option<String>,
    delete_delay: Option<Duration>,
    delete_batches: usize,
}

/// Photo store held entirely in memory.
///
/// Useful for embedding callers that already have decoded images, and for
/// exercising failure paths: entries can be made undecodable, access can be
/// denied and deletions can be forced to fail.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                access: AuthorizationStatus::Authorized,
                list_failure: None,
                delete_failure: None,
                delete_delay: None,
                delete_batches: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, asset: Asset, image: DynamicImage) {
        self.lock().entries.push(MemoryEntry {
            asset,
            image: Some(image),
        });
    }

    /// Add an asset whose image payload cannot be decoded.
    pub fn insert_undecodable(&self, asset: Asset) {
        self.lock().entries.push(MemoryEntry { asset, image: None });
    }

    pub fn deny_access(&self) {
        self.lock().access = AuthorizationStatus::Denied;
    }

    /// Make listing fail with an I/O error carrying `reason`.
    pub fn fail_listing_with(&self, reason: impl Into<String>) {
        self.lock().list_failure = Some(reason.into());
    }

    /// Make every following deletion batch fail with `reason`.
    pub fn fail_deletes_with(&self, reason: impl Into<String>) {
        self.lock().delete_failure = Some(reason.into());
    }

    pub fn allow_deletes(&self) {
        self.lock().delete_failure = None;
    }

    /// Hold each deletion batch for `delay` before committing it.
    pub fn set_delete_delay(&self, delay: Duration) {
        self.lock().delete_delay = Some(delay);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().entries.iter().any(|entry| entry.asset.id == id)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of deletion batches that reached the store.
    pub fn delete_batches(&self) -> usize {
        self.lock().delete_batches
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PhotoStore for MemoryStore {
    fn authorize(&self) -> AuthorizationStatus {
        self.lock().access
    }

    fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        let inner = self.lock();
        if let Some(reason) = &inner.list_failure {
            return Err(StoreError::Io(std::io::Error::other(reason.clone())));
        }

        let mut assets: Vec<Asset> = inner
            .entries
            .iter()
            .map(|entry| entry.asset.clone())
            .collect();
        drop(inner);
        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(assets)
    }

    fn decode_thumbnail(&self, asset: &Asset, max_size: u32) -> Result<DynamicImage, StoreError> {
        let image = {
            let inner = self.lock();
            let entry = inner
                .entries
                .iter()
                .find(|entry| entry.asset.id == asset.id)
                .ok_or_else(|| StoreError::NotFound {
                    id: asset.id.clone(),
                })?;
            entry.image.clone().ok_or_else(|| StoreError::Decode {
                id: asset.id.clone(),
                message: "image data is unreadable".to_string(),
            })?
        };

        Ok(render_thumbnail(image, max_size))
    }

    fn delete_assets(&self, ids: &BTreeSet<String>) -> Result<(), StoreError> {
        let delay = self.lock().delete_delay;
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let mut inner = self.lock();
        inner.delete_batches += 1;

        if let Some(reason) = &inner.delete_failure {
            return Err(StoreError::Rejected {
                reason: reason.clone(),
            });
        }

        if let Some(missing) = ids
            .iter()
            .find(|id| !inner.entries.iter().any(|entry| &entry.asset.id == *id))
        {
            return Err(StoreError::NotFound {
                id: missing.clone(),
            });
        }

        inner.entries.retain(|entry| !ids.contains(&entry.asset.id));
        Ok(())
    }
}
