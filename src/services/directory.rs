use crate::core::image::Asset;
use crate::core::library::{AuthorizationStatus, PhotoStore, StoreError};
use crate::core::thumbnail::render_thumbnail;
use chrono::{DateTime, Utc};
use image::{DynamicImage, ImageReader};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use walkdir::WalkDir;

/// Directory deletions are staged into before being removed for good.
pub const STAGING_DIR: &str = ".cleanrs-staging";

/// Photo store backed by a directory tree of image files.
pub struct DirectoryStore {
    root: PathBuf,
    extensions: HashSet<String>,
    index: Mutex<HashMap<String, PathBuf>>,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.iter().map(|ext| ext.to_lowercase()).collect(),
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stable identifier for a file, derived from its path under the root.
    pub fn asset_id(relative: &Path) -> String {
        let hash = blake3::hash(relative.to_string_lossy().as_bytes());
        hash.to_hex().as_str()[..32].to_string()
    }

    /// Path of a listed asset.
    pub fn path_of(&self, id: &str) -> Option<PathBuf> {
        self.index().get(id).cloned()
    }

    fn index(&self) -> MutexGuard<'_, HashMap<String, PathBuf>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    fn resolve(&self, id: &str) -> Result<PathBuf, StoreError> {
        self.path_of(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn created_at(metadata: &fs::Metadata) -> Option<DateTime<Utc>> {
        metadata
            .created()
            .or_else(|_| metadata.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    fn roll_back(staged: &[(PathBuf, PathBuf)]) {
        for (original, staged_path) in staged.iter().rev() {
            if let Err(e) = fs::rename(staged_path, original) {
                log::warn!(
                    "Failed to restore {} → {}: {}",
                    staged_path.display(),
                    original.display(),
                    e
                );
            }
        }
    }
}

impl PhotoStore for DirectoryStore {
    fn authorize(&self) -> AuthorizationStatus {
        match fs::read_dir(&self.root) {
            Err(e) if e.kind() == ErrorKind::PermissionDenied => AuthorizationStatus::Denied,
            _ => AuthorizationStatus::Authorized,
        }
    }

    fn list_assets(&self) -> Result<Vec<Asset>, StoreError> {
        if !self.root.is_dir() {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            )));
        }

        let mut found: Vec<(Asset, PathBuf, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != STAGING_DIR)
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || !self.is_supported(path) {
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    log::warn!("Could not read metadata for {}: {}", path.display(), e);
                    continue;
                }
            };

            let relative = path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();
            let asset = Asset::new(
                Self::asset_id(&relative),
                Self::created_at(&metadata),
                metadata.len(),
            );
            found.push((asset, relative, path.to_path_buf()));
        }

        found.sort_by(|(a, a_rel, _), (b, b_rel, _)| {
            a.created_at.cmp(&b.created_at).then_with(|| a_rel.cmp(b_rel))
        });

        let mut index = self.index();
        index.clear();
        let assets = found
            .into_iter()
            .map(|(asset, _, path)| {
                index.insert(asset.id.clone(), path);
                asset
            })
            .collect();

        Ok(assets)
    }

    fn decode_thumbnail(&self, asset: &Asset, max_size: u32) -> Result<DynamicImage, StoreError> {
        let path = self.resolve(&asset.id)?;
        let decode_error = |message: String| StoreError::Decode {
            id: asset.id.clone(),
            message,
        };

        let image = ImageReader::open(&path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| decode_error(format!("{}: {}", path.display(), e)))?;

        Ok(render_thumbnail(image, max_size))
    }

    /// Stage every file, then remove the staged copies. A failure while
    /// staging puts back what was already moved.
    fn delete_assets(&self, ids: &BTreeSet<String>) -> Result<(), StoreError> {
        let targets: Vec<(String, PathBuf)> = ids
            .iter()
            .map(|id| self.resolve(id).map(|path| (id.clone(), path)))
            .collect::<Result<_, _>>()?;

        let staging = self.root.join(STAGING_DIR);
        fs::create_dir_all(&staging)?;

        let mut staged: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(targets.len());
        for (id, path) in &targets {
            let staged_path = staging.join(id);
            if let Err(e) = fs::rename(path, &staged_path) {
                Self::roll_back(&staged);
                let _ = fs::remove_dir(&staging);
                return Err(StoreError::Rejected {
                    reason: format!("could not remove {}: {}", path.display(), e),
                });
            }
            staged.push((path.clone(), staged_path));
        }

        for (original, staged_path) in &staged {
            if let Err(e) = fs::remove_file(staged_path) {
                log::warn!(
                    "Removed {} from the library but could not discard {}: {}",
                    original.display(),
                    staged_path.display(),
                    e
                );
            }
        }
        let _ = fs::remove_dir(&staging);

        let mut index = self.index();
        for (id, _) in &targets {
            index.remove(id);
        }

        log::info!("Deleted {} photos from {}", targets.len(), self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn extensions() -> Vec<String> {
        crate::core::config::CleanerConfig::default().extensions
    }

    fn create_test_image(path: &Path, width: u32, height: u32, colour: [u8; 3]) {
        let img = ImageBuffer::from_pixel(width, height, Rgb(colour));
        img.save(path).unwrap();
    }

    fn list(store: &DirectoryStore) -> Vec<Asset> {
        store.list_assets().unwrap()
    }

    #[test]
    fn test_lists_supported_files_recursively() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("nested")).unwrap();
        create_test_image(&temp_dir.path().join("a.png"), 10, 10, [1, 2, 3]);
        create_test_image(&temp_dir.path().join("nested").join("b.PNG"), 10, 10, [1, 2, 3]);
        fs::write(temp_dir.path().join("notes.txt"), b"hello").unwrap();

        let store = DirectoryStore::new(temp_dir.path(), &extensions());
        let assets = list(&store);

        assert_eq!(assets.len(), 2);
        for asset in &assets {
            assert_eq!(asset.id.len(), 32);
            assert!(asset.size_bytes > 0);
            assert!(store.path_of(&asset.id).unwrap().exists());
        }
    }

    #[test]
    fn test_ids_are_stable_across_listings() {
        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("a.png"), 10, 10, [1, 2, 3]);

        let first = list(&DirectoryStore::new(temp_dir.path(), &extensions()));
        let second = list(&DirectoryStore::new(temp_dir.path(), &extensions()));
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].id, DirectoryStore::asset_id(Path::new("a.png")));
    }

    #[test]
    fn test_decode_bounds_thumbnail_and_reports_corrupt_files() {
        let temp_dir = TempDir::new().unwrap();
        create_test_image(&temp_dir.path().join("big.png"), 640, 320, [9, 9, 9]);
        fs::write(temp_dir.path().join("broken.jpg"), b"not really a jpeg").unwrap();

        let store = DirectoryStore::new(temp_dir.path(), &extensions());
        let assets = list(&store);
        assert_eq!(assets.len(), 2);

        let big = DirectoryStore::asset_id(Path::new("big.png"));
        let broken = DirectoryStore::asset_id(Path::new("broken.jpg"));
        let find = |id: &str| assets.iter().find(|a| a.id == id).unwrap().clone();

        let thumbnail = store.decode_thumbnail(&find(&big), 200).unwrap();
        assert_eq!((thumbnail.width(), thumbnail.height()), (200, 100));
        assert!(matches!(
            store.decode_thumbnail(&find(&broken), 200),
            Err(StoreError::Decode { ref id, .. }) if *id == broken
        ));
    }

    #[test]
    fn test_delete_removes_files() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.png");
        let b = temp_dir.path().join("b.png");
        create_test_image(&a, 10, 10, [1, 2, 3]);
        create_test_image(&b, 10, 10, [1, 2, 3]);

        let store = DirectoryStore::new(temp_dir.path(), &extensions());
        list(&store);

        let id = DirectoryStore::asset_id(Path::new("a.png"));
        store.delete_assets(&BTreeSet::from([id.clone()])).unwrap();

        assert!(!a.exists());
        assert!(b.exists());
        assert!(store.path_of(&id).is_none());
        assert!(!temp_dir.path().join(STAGING_DIR).exists());
        assert_eq!(list(&store).len(), 1);
    }

    #[test]
    fn test_failed_batch_leaves_library_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.png");
        let b = temp_dir.path().join("b.png");
        create_test_image(&a, 10, 10, [1, 2, 3]);
        create_test_image(&b, 10, 10, [1, 2, 3]);

        let store = DirectoryStore::new(temp_dir.path(), &extensions());
        list(&store);

        // b disappears behind the store's back, so staging it fails.
        fs::remove_file(&b).unwrap();
        let ids = BTreeSet::from([
            DirectoryStore::asset_id(Path::new("a.png")),
            DirectoryStore::asset_id(Path::new("b.png")),
        ]);

        let err = store.delete_assets(&ids).unwrap_err();
        assert!(matches!(err, StoreError::Rejected { .. }));
        assert!(a.exists());
        assert!(!temp_dir.path().join(STAGING_DIR).exists());
    }

    #[test]
    fn test_unknown_id_fails_before_anything_moves() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.png");
        create_test_image(&a, 10, 10, [1, 2, 3]);

        let store = DirectoryStore::new(temp_dir.path(), &extensions());
        list(&store);

        let ids = BTreeSet::from([
            DirectoryStore::asset_id(Path::new("a.png")),
            "unknown".to_string(),
        ]);
        assert!(matches!(
            store.delete_assets(&ids),
            Err(StoreError::NotFound { .. })
        ));
        assert!(a.exists());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = DirectoryStore::new(temp_dir.path().join("missing"), &extensions());
        assert_eq!(store.authorize(), AuthorizationStatus::Authorized);
        assert!(store.list_assets().is_err());
    }
}
