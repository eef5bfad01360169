pub mod core;
pub mod services;

pub use crate::core::config::{CleanerConfig, ConfigError};
pub use crate::core::duplicate::{DepletionPolicy, DuplicateDetector, DuplicateGroup};
pub use crate::core::features::{Fingerprint, average_hash, average_hash_distance, extract_features};
pub use crate::core::image::{Asset, Photo};
pub use crate::core::key::FeatureKey;
pub use crate::core::library::{AuthorizationStatus, PhotoStore, StoreError};
pub use crate::core::planner::{DeletionMode, DeletionPlan};
pub use crate::core::scanner::{ScanError, ScanPhase, ScanProgress, ScanReport, ScannerService};
pub use crate::core::similarity::{SimilarityScorer, cosine_similarity};
pub use crate::core::state::{DuplicateSnapshot, DuplicateState, ScanStatus};
pub use crate::services::directory::DirectoryStore;
pub use crate::services::duplicates::{DeleteError, DeletionOutcome, DuplicateService};
pub use crate::services::memory::MemoryStore;
