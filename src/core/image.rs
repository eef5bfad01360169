use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A stored image as the photo store knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

impl Asset {
    pub fn new(id: impl Into<String>, created_at: Option<DateTime<Utc>>, size_bytes: u64) -> Self {
        Self {
            id: id.into(),
            created_at,
            size_bytes,
        }
    }

    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size_bytes)
    }
}

/// Display view of an asset: its identifier plus the decoded thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Photo {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
    #[serde(skip)]
    pub thumbnail: Arc<DynamicImage>,
}

impl Photo {
    pub fn new(asset: &Asset, thumbnail: DynamicImage) -> Self {
        Self {
            id: asset.id.clone(),
            created_at: asset.created_at,
            size_bytes: asset.size_bytes,
            thumbnail: Arc::new(thumbnail),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.thumbnail.width(), self.thumbnail.height())
    }
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_in_megabytes() {
        let asset = Asset::new("a", None, 3 * 1024 * 1024);
        assert!((asset.size_mb() - 3.0).abs() < f64::EPSILON);
        assert_eq!(bytes_to_mb(0), 0.0);
    }

    #[test]
    fn test_photo_carries_asset_identity() {
        let asset = Asset::new("ast_1", None, 42);
        let photo = Photo::new(&asset, DynamicImage::new_rgb8(4, 3));

        assert_eq!(photo.id, "ast_1");
        assert_eq!(photo.size_bytes, 42);
        assert_eq!(photo.dimensions(), (4, 3));
    }
}
