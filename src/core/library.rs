use crate::core::image::Asset;
use image::DynamicImage;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Asset not found: {id}")]
    NotFound { id: String },

    #[error("Failed to decode {id}: {message}")]
    Decode { id: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Deletion rejected: {reason}")]
    Rejected { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    Authorized,
    Denied,
}

/// Access to the library of photos being cleaned.
///
/// Implementations are blocking; async callers run them on the blocking pool.
pub trait PhotoStore: Send + Sync {
    /// Whether the library may be read at all.
    fn authorize(&self) -> AuthorizationStatus;

    /// Every image asset, oldest first.
    fn list_assets(&self) -> Result<Vec<Asset>, StoreError>;

    /// Decode `asset` as an aspect-fit thumbnail no larger than `max_size`.
    fn decode_thumbnail(&self, asset: &Asset, max_size: u32) -> Result<DynamicImage, StoreError>;

    /// Remove all of `ids` as one batch. Either every asset is removed or none is.
    fn delete_assets(&self, ids: &BTreeSet<String>) -> Result<(), StoreError>;
}
