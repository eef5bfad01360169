use crate::core::features::{Fingerprint, extract_features};
use image::DynamicImage;

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.9;

/// Cosine similarity of two fingerprints.
///
/// Fingerprints of different lengths are not comparable and score 0, as does
/// any pair where one side has zero magnitude.
pub fn cosine_similarity(a: &Fingerprint, b: &Fingerprint) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .values()
        .iter()
        .zip(b.values())
        .fold((0.0, 0.0, 0.0), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let magnitude = norm_a.sqrt() * norm_b.sqrt();
    if magnitude == 0.0 {
        return 0.0;
    }

    (dot / magnitude).clamp(-1.0, 1.0)
}

/// Threshold check on top of [`cosine_similarity`], used to confirm that two
/// images are visually the same independently of key bucketing.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityScorer {
    threshold: f64,
}

impl SimilarityScorer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn score(&self, a: &Fingerprint, b: &Fingerprint) -> f64 {
        cosine_similarity(a, b)
    }

    pub fn is_match(&self, a: &Fingerprint, b: &Fingerprint) -> bool {
        self.score(a, b) >= self.threshold
    }

    pub fn images_are_visually_identical(&self, a: &DynamicImage, b: &DynamicImage) -> bool {
        self.is_match(&extract_features(a), &extract_features(b))
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}
