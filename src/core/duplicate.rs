// Duplicate grouping:
// - bucket fingerprinted photos by quantized histogram key
// - optional cosine-similarity confirmation inside each bucket
// - pruning policy for groups depleted by deletions

use crate::core::features::Fingerprint;
use crate::core::image::{Photo, bytes_to_mb};
use crate::core::key::FeatureKey;
use crate::core::similarity::SimilarityScorer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

pub const GROUP_NAME_PREFIX: &str = "Duplicate Group";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub name: String,
    pub photos: Vec<Photo>,
    pub size_mb: f64,
}

impl DuplicateGroup {
    pub fn new(name: String, photos: Vec<Photo>) -> Self {
        let mut group = Self {
            name,
            photos,
            size_mb: 0.0,
        };
        group.refresh_size();
        group
    }

    pub fn photo_count(&self) -> usize {
        self.photos.len()
    }

    pub fn first(&self) -> Option<&Photo> {
        self.photos.first()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.photos.iter().any(|photo| photo.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.photos.iter().map(|photo| photo.id.as_str())
    }

    /// Drop members whose id is in `ids`, returning how many were removed.
    pub fn remove_photos(&mut self, ids: &BTreeSet<String>) -> usize {
        let before = self.photos.len();
        self.photos.retain(|photo| !ids.contains(&photo.id));
        let removed = before - self.photos.len();
        if removed > 0 {
            self.refresh_size();
        }
        removed
    }

    fn refresh_size(&mut self) {
        self.size_mb = bytes_to_mb(self.photos.iter().map(|photo| photo.size_bytes).sum());
    }
}

/// When a group that lost members stops being a duplicate group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepletionPolicy {
    /// Keep groups until their last member is gone.
    Empty,
    /// Drop groups with fewer than two members.
    #[default]
    BelowPair,
}

impl DepletionPolicy {
    pub fn is_depleted(&self, group: &DuplicateGroup) -> bool {
        match self {
            DepletionPolicy::Empty => group.photos.is_empty(),
            DepletionPolicy::BelowPair => group.photos.len() < 2,
        }
    }

    pub fn prune(&self, groups: &mut Vec<DuplicateGroup>) {
        groups.retain(|group| !self.is_depleted(group));
    }
}

/// "Duplicate Group - Sep 18, 2024", or the bare prefix without a date.
pub fn group_name(created_at: Option<DateTime<Utc>>) -> String {
    match created_at {
        Some(date) => format!("{} - {}", GROUP_NAME_PREFIX, date.format("%b %-d, %Y")),
        None => GROUP_NAME_PREFIX.to_string(),
    }
}

/// A photo together with the fingerprint computed from its thumbnail.
#[derive(Debug, Clone)]
pub struct FingerprintedPhoto {
    pub photo: Photo,
    pub features: Fingerprint,
}

pub struct DuplicateDetector {
    precision: u8,
    confirmation: Option<SimilarityScorer>,
}

impl DuplicateDetector {
    pub fn new(precision: u8) -> Self {
        Self {
            precision,
            confirmation: None,
        }
    }

    /// Additionally require every member to match the group's first photo.
    pub fn with_confirmation(mut self, scorer: SimilarityScorer) -> Self {
        self.confirmation = Some(scorer);
        self
    }

    /// Partition `entries` into duplicate groups.
    ///
    /// Input order is taken as scan order: groups appear in the order their
    /// first member was seen and members keep their relative order.
    pub fn group(&self, entries: Vec<FingerprintedPhoto>) -> Vec<DuplicateGroup> {
        let mut slots: HashMap<FeatureKey, usize> = HashMap::new();
        let mut buckets: Vec<Vec<FingerprintedPhoto>> = Vec::new();

        for entry in entries {
            let Some(key) = FeatureKey::from_fingerprint(&entry.features, self.precision) else {
                continue;
            };
            let slot = *slots.entry(key).or_insert_with(|| {
                buckets.push(Vec::new());
                buckets.len() - 1
            });
            buckets[slot].push(entry);
        }

        buckets
            .into_iter()
            .filter(|bucket| bucket.len() > 1)
            .filter_map(|bucket| self.build_group(bucket))
            .collect()
    }

    fn build_group(&self, bucket: Vec<FingerprintedPhoto>) -> Option<DuplicateGroup> {
        let members: Vec<Photo> = match &self.confirmation {
            Some(scorer) => {
                let anchor = bucket[0].features.clone();
                bucket
                    .into_iter()
                    .enumerate()
                    .filter(|(index, entry)| {
                        let keep = *index == 0 || scorer.is_match(&anchor, &entry.features);
                        if !keep {
                            log::debug!("{} failed similarity confirmation", entry.photo.id);
                        }
                        keep
                    })
                    .map(|(_, entry)| entry.photo)
                    .collect()
            }
            None => bucket.into_iter().map(|entry| entry.photo).collect(),
        };

        if members.len() < 2 {
            return None;
        }

        let name = group_name(members[0].created_at);
        Some(DuplicateGroup::new(name, members))
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new(crate::core::key::DEFAULT_KEY_PRECISION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image::Asset;
    use chrono::TimeZone;
    use image::DynamicImage;

    fn photo(id: &str, day: u32, size_bytes: u64) -> Photo {
        let created = Utc.with_ymd_and_hms(2024, 9, day, 12, 0, 0).single();
        Photo::new(&Asset::new(id, created, size_bytes), DynamicImage::new_rgb8(1, 1))
    }

    fn entry(id: &str, day: u32, values: Vec<f64>) -> FingerprintedPhoto {
        FingerprintedPhoto {
            photo: photo(id, day, 1024 * 1024),
            features: Fingerprint::from_values(values),
        }
    }

    fn member_ids(group: &DuplicateGroup) -> Vec<&str> {
        group.ids().collect()
    }

    #[test]
    fn test_groups_share_keys_and_have_two_members() {
        let detector = DuplicateDetector::default();
        let groups = detector.group(vec![
            entry("a", 1, vec![0.5, 0.5]),
            entry("b", 2, vec![1.0, 0.0]),
            entry("c", 3, vec![0.5001, 0.4999]),
            entry("d", 4, vec![0.0, 1.0]),
            entry("e", 5, vec![1.0, 0.0]),
        ]);

        assert_eq!(groups.len(), 2);
        assert_eq!(member_ids(&groups[0]), vec!["a", "c"]);
        assert_eq!(member_ids(&groups[1]), vec!["b", "e"]);
        assert!(groups.iter().all(|group| group.photo_count() >= 2));
    }

    #[test]
    fn test_group_name_and_size() {
        let groups = DuplicateDetector::default().group(vec![
            entry("a", 18, vec![1.0]),
            entry("b", 20, vec![1.0]),
        ]);

        assert_eq!(groups[0].name, "Duplicate Group - Sep 18, 2024");
        assert!((groups[0].size_mb - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_name_without_date() {
        assert_eq!(group_name(None), "Duplicate Group");
    }

    #[test]
    fn test_empty_fingerprints_never_group() {
        let groups = DuplicateDetector::default().group(vec![
            entry("a", 1, vec![]),
            entry("b", 2, vec![]),
        ]);
        assert!(groups.is_empty());
    }

    #[test]
    fn test_confirmation_drops_dissimilar_members() {
        // Same key at precision 1, but orthogonal histograms.
        let detector = DuplicateDetector::new(1).with_confirmation(SimilarityScorer::default());
        let groups = detector.group(vec![
            entry("a", 1, vec![0.04, 0.0, 0.0]),
            entry("b", 2, vec![0.04, 0.0, 0.0]),
            entry("c", 3, vec![0.0, 0.04, 0.0]),
        ]);

        assert_eq!(groups.len(), 1);
        assert_eq!(member_ids(&groups[0]), vec!["a", "b"]);
    }

    #[test]
    fn test_remove_photos_refreshes_size() {
        let mut group = DuplicateGroup::new(
            "g".to_string(),
            vec![photo("a", 1, 1024 * 1024), photo("b", 2, 3 * 1024 * 1024)],
        );
        let removed = group.remove_photos(&BTreeSet::from(["b".to_string(), "zz".to_string()]));

        assert_eq!(removed, 1);
        assert_eq!(member_ids(&group), vec!["a"]);
        assert!((group.size_mb - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_depletion_policies() {
        let single = DuplicateGroup::new("one".to_string(), vec![photo("a", 1, 1)]);
        let empty = DuplicateGroup::new("none".to_string(), vec![]);

        assert!(!DepletionPolicy::Empty.is_depleted(&single));
        assert!(DepletionPolicy::Empty.is_depleted(&empty));
        assert!(DepletionPolicy::BelowPair.is_depleted(&single));

        let mut groups = vec![single, empty];
        DepletionPolicy::Empty.prune(&mut groups);
        assert_eq!(groups.len(), 1);
        DepletionPolicy::BelowPair.prune(&mut groups);
        assert!(groups.is_empty());
    }
}
