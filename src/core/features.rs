use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};
use serde::{Deserialize, Serialize};

pub const HISTOGRAM_BINS: usize = 256;
pub const CHANNELS: usize = 3;
pub const FINGERPRINT_LEN: usize = HISTOGRAM_BINS * CHANNELS;

/// Normalized RGB colour histogram of an image, R bins then G then B.
///
/// An empty fingerprint stands for an image that could not be read; it never
/// produces a grouping key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint(Vec<f64>);

impl Fingerprint {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One channel's histogram (0 = R, 1 = G, 2 = B), if present.
    pub fn channel(&self, index: usize) -> Option<&[f64]> {
        if self.0.len() != FINGERPRINT_LEN || index >= CHANNELS {
            return None;
        }
        let start = index * HISTOGRAM_BINS;
        Some(&self.0[start..start + HISTOGRAM_BINS])
    }
}

/// Build the colour-histogram fingerprint of `image`.
///
/// Cost is linear in the pixel count, so callers should pass the thumbnail
/// rather than the full-resolution image.
pub fn extract_features(image: &DynamicImage) -> Fingerprint {
    let rgb = image.to_rgb8();
    let pixel_count = rgb.width() as u64 * rgb.height() as u64;
    if pixel_count == 0 {
        return Fingerprint::empty();
    }

    let mut counts = [[0u32; HISTOGRAM_BINS]; CHANNELS];
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        counts[0][r as usize] += 1;
        counts[1][g as usize] += 1;
        counts[2][b as usize] += 1;
    }

    let total = pixel_count as f64;
    let values = counts
        .iter()
        .flat_map(|channel| channel.iter().map(move |&count| count as f64 / total))
        .collect();

    Fingerprint(values)
}

fn mean_hasher() -> image_hasher::Hasher {
    HasherConfig::new()
        .hash_size(8, 8)
        .hash_alg(HashAlg::Mean)
        .to_hasher()
}

fn mean_hash(image: &DynamicImage) -> ImageHash {
    mean_hasher().hash_image(image)
}

/// 8x8 mean-brightness hash, base64 encoded.
pub fn average_hash(image: &DynamicImage) -> String {
    mean_hash(image).to_base64()
}

/// Hamming distance between the average hashes of two images.
pub fn average_hash_distance(a: &DynamicImage, b: &DynamicImage) -> u32 {
    let hasher = mean_hasher();
    hasher.hash_image(a).dist(&hasher.hash_image(b))
}
