use crate::core::config::CleanerConfig;
use crate::core::duplicate::{DuplicateDetector, DuplicateGroup, FingerprintedPhoto};
use crate::core::features::extract_features;
use crate::core::image::{Asset, Photo};
use crate::core::library::{AuthorizationStatus, PhotoStore, StoreError};
use crate::core::similarity::SimilarityScorer;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Access to the photo library was denied")]
    AccessDenied,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Superseded by a newer scan")]
    Superseded,

    #[error("Photo store error: {0}")]
    Store(#[from] StoreError),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Scan task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
    pub current: String,
    pub phase: ScanPhase,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScanPhase {
    Listing,
    Fingerprinting,
    Grouping,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub groups: Vec<DuplicateGroup>,
    pub total: usize,
    pub fingerprinted: usize,
    pub skipped: usize,
}

pub struct ScannerService {
    config: CleanerConfig,
    progress_sender: Option<mpsc::UnboundedSender<ScanProgress>>,
    cancellation_token: Arc<AtomicBool>,
}

impl ScannerService {
    pub fn new(config: CleanerConfig) -> Self {
        Self {
            config,
            progress_sender: None,
            cancellation_token: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_progress_sender(mut self, sender: mpsc::UnboundedSender<ScanProgress>) -> Self {
        self.progress_sender = Some(sender);
        self
    }

    pub fn with_cancellation_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn get_cancellation_token(&self) -> Arc<AtomicBool> {
        self.cancellation_token.clone()
    }

    pub fn cancel_scan(&self) {
        self.cancellation_token.store(true, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token.load(Ordering::Relaxed)
    }

    /// Scan the whole library and group duplicates.
    ///
    /// Blocking: fingerprinting runs on a dedicated rayon pool.
    pub fn scan<S: PhotoStore + ?Sized>(&self, store: &S) -> Result<ScanReport, ScanError> {
        if self.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        if store.authorize() == AuthorizationStatus::Denied {
            log::warn!("Access to photos is denied");
            return Err(ScanError::AccessDenied);
        }

        self.send_progress(ScanProgress {
            processed: 0,
            total: 0,
            current: "Listing photos...".to_string(),
            phase: ScanPhase::Listing,
        });

        let mut assets = store.list_assets()?;
        assets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let total = assets.len();

        if self.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let entries = self.fingerprint_assets(store, &assets)?;
        let fingerprinted = entries.len();

        self.send_progress(ScanProgress {
            processed: fingerprinted,
            total,
            current: "Grouping duplicates...".to_string(),
            phase: ScanPhase::Grouping,
        });

        let groups = self.detector().group(entries);

        self.send_progress(ScanProgress {
            processed: total,
            total,
            current: "Scan complete".to_string(),
            phase: ScanPhase::Complete,
        });

        log::info!(
            "Scanned {} photos: {} fingerprinted, {} skipped, {} duplicate groups",
            total,
            fingerprinted,
            total - fingerprinted,
            groups.len()
        );

        Ok(ScanReport {
            groups,
            total,
            fingerprinted,
            skipped: total - fingerprinted,
        })
    }

    fn detector(&self) -> DuplicateDetector {
        let detector = DuplicateDetector::new(self.config.key_precision);
        if self.config.confirm_with_similarity {
            detector.with_confirmation(SimilarityScorer::new(self.config.similarity_threshold))
        } else {
            detector
        }
    }

    /// Fingerprint every asset in parallel. Results come back in input order;
    /// assets that fail to decode are left out.
    fn fingerprint_assets<S: PhotoStore + ?Sized>(
        &self,
        store: &S,
        assets: &[Asset],
    ) -> Result<Vec<FingerprintedPhoto>, ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.thread_count())
            .build()
            .map_err(|e| ScanError::ThreadPool(e.to_string()))?;

        let total = assets.len();
        let processed_count = AtomicUsize::new(0);

        let results: Vec<Option<FingerprintedPhoto>> = pool.install(|| {
            assets
                .par_iter()
                .map(|asset| {
                    if self.is_cancelled() {
                        return None;
                    }

                    let entry = self.fingerprint_asset(store, asset);

                    let current_count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                    self.send_progress(ScanProgress {
                        processed: current_count,
                        total,
                        current: asset.id.clone(),
                        phase: ScanPhase::Fingerprinting,
                    });

                    entry
                })
                .collect()
        });

        if self.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        Ok(results.into_iter().flatten().collect())
    }

    /// Decode and fingerprint one asset; `None` if it cannot be read.
    pub fn fingerprint_asset<S: PhotoStore + ?Sized>(
        &self,
        store: &S,
        asset: &Asset,
    ) -> Option<FingerprintedPhoto> {
        let thumbnail = match store.decode_thumbnail(asset, self.config.thumbnail_size) {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                log::debug!("Skipping {}: {}", asset.id, e);
                return None;
            }
        };

        let features = extract_features(&thumbnail);
        if features.is_empty() {
            log::debug!("Skipping {}: empty image", asset.id);
            return None;
        }

        Some(FingerprintedPhoto {
            photo: Photo::new(asset, thumbnail),
            features,
        })
    }

    fn send_progress(&self, progress: ScanProgress) {
        if let Some(sender) = &self.progress_sender {
            let _ = sender.send(progress);
        }
    }
}

impl Default for ScannerService {
    fn default() -> Self {
        Self::new(CleanerConfig::default())
    }
}
