use crate::core::duplicate::{DepletionPolicy, DuplicateGroup};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletionMode {
    /// The earliest member of every group.
    FirstOfEachGroup,
    /// Every group member the user selected.
    Selected,
}

/// The exact set of assets a deletion will remove, computed from the current
/// groups before the store is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionPlan {
    pub mode: DeletionMode,
    pub targets: BTreeSet<String>,
}

impl DeletionPlan {
    pub fn first_of_each_group(groups: &[DuplicateGroup]) -> Self {
        let targets = groups
            .iter()
            .filter_map(|group| group.first())
            .map(|photo| photo.id.clone())
            .collect();

        Self {
            mode: DeletionMode::FirstOfEachGroup,
            targets,
        }
    }

    /// Members of any group whose id is selected. Selected ids that belong to
    /// no group are ignored.
    pub fn from_selection(groups: &[DuplicateGroup], selected: &BTreeSet<String>) -> Self {
        let targets = groups
            .iter()
            .flat_map(|group| group.photos.iter())
            .filter(|photo| selected.contains(&photo.id))
            .map(|photo| photo.id.clone())
            .collect();

        Self {
            mode: DeletionMode::Selected,
            targets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Remove the planned members from `groups` and prune what `policy` deems
    /// depleted. Call only after the store confirmed the deletion.
    pub fn apply(&self, groups: &mut Vec<DuplicateGroup>, policy: DepletionPolicy) -> usize {
        let removed = groups
            .iter_mut()
            .map(|group| group.remove_photos(&self.targets))
            .sum();
        policy.prune(groups);
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::image::{Asset, Photo};
    use image::DynamicImage;

    fn group(name: &str, ids: &[&str]) -> DuplicateGroup {
        let photos = ids
            .iter()
            .map(|id| Photo::new(&Asset::new(*id, None, 10), DynamicImage::new_rgb8(1, 1)))
            .collect();
        DuplicateGroup::new(name.to_string(), photos)
    }

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_first_of_each_group_targets_earliest() {
        let groups = vec![group("g1", &["a", "b", "c"]), group("g2", &["d", "e"])];
        let plan = DeletionPlan::first_of_each_group(&groups);
        assert_eq!(plan.mode, DeletionMode::FirstOfEachGroup);
        assert_eq!(plan.targets, ids(&["a", "d"]));
    }

    #[test]
    fn test_first_of_each_group_until_exhausted() {
        let mut groups = vec![group("g1", &["a", "b", "c"]), group("g2", &["d", "e"])];

        let mut rounds = 0;
        while !groups.is_empty() {
            let plan = DeletionPlan::first_of_each_group(&groups);
            plan.apply(&mut groups, DepletionPolicy::Empty);
            assert!(groups.iter().all(|g| g.photo_count() >= 1));
            rounds += 1;
        }
        assert_eq!(rounds, 3);
    }

    #[test]
    fn test_below_pair_policy_drops_singletons() {
        let mut groups = vec![group("g1", &["a", "b", "c"]), group("g2", &["d", "e"])];
        let removed = DeletionPlan::first_of_each_group(&groups)
            .apply(&mut groups, DepletionPolicy::BelowPair);

        assert_eq!(removed, 2);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].ids().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_selection_is_intersected_with_groups() {
        let mut groups = vec![group("g1", &["a", "b", "c"]), group("g2", &["d", "e"])];
        let plan = DeletionPlan::from_selection(&groups, &ids(&["b", "e", "stray"]));
        assert_eq!(plan.targets, ids(&["b", "e"]));

        let removed = plan.apply(&mut groups, DepletionPolicy::Empty);
        assert_eq!(removed, 2);
        assert_eq!(groups[0].ids().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(groups[1].ids().collect::<Vec<_>>(), vec!["d"]);
    }

    #[test]
    fn test_selecting_whole_group_removes_it() {
        let mut groups = vec![group("g1", &["a", "b"]), group("g2", &["d", "e"])];
        DeletionPlan::from_selection(&groups, &ids(&["a", "b"]))
            .apply(&mut groups, DepletionPolicy::Empty);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "g2");
    }

    #[test]
    fn test_empty_selection_plans_nothing() {
        let groups = vec![group("g1", &["a", "b"])];
        let plan = DeletionPlan::from_selection(&groups, &BTreeSet::new());
        assert!(plan.is_empty());
        assert_eq!(plan.len(), 0);
    }
}
