use crate::core::duplicate::DuplicateGroup;
use serde::Serialize;
use std::collections::BTreeSet;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ScanStatus {
    #[default]
    Idle,
    Scanning,
    Ready,
    AccessDenied,
    Failed,
}

/// What subscribers see: the current groups, the user's selection and
/// whether a deletion is running.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DuplicateSnapshot {
    pub groups: Vec<DuplicateGroup>,
    pub selected: BTreeSet<String>,
    pub is_deleting: bool,
    pub status: ScanStatus,
}

impl DuplicateSnapshot {
    pub fn duplicate_count(&self) -> usize {
        self.groups.iter().map(DuplicateGroup::photo_count).sum()
    }
}

/// Observable holder of the published duplicate state.
pub struct DuplicateState {
    sender: watch::Sender<DuplicateSnapshot>,
}

impl DuplicateState {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(DuplicateSnapshot::default());
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<DuplicateSnapshot> {
        self.sender.subscribe()
    }

    pub fn snapshot(&self) -> DuplicateSnapshot {
        self.sender.borrow().clone()
    }

    pub fn is_deleting(&self) -> bool {
        self.sender.borrow().is_deleting
    }

    pub fn select(&self, id: &str) {
        self.sender.send_if_modified(|state| state.selected.insert(id.to_string()));
    }

    pub fn deselect(&self, id: &str) {
        self.sender.send_if_modified(|state| state.selected.remove(id));
    }

    pub fn toggle(&self, id: &str) {
        self.sender.send_modify(|state| {
            if !state.selected.remove(id) {
                state.selected.insert(id.to_string());
            }
        });
    }

    pub fn clear_selection(&self) {
        self.sender.send_if_modified(|state| {
            let changed = !state.selected.is_empty();
            state.selected.clear();
            changed
        });
    }

    /// Drop a whole group from view without deleting anything.
    pub fn dismiss_group(&self, name: &str) -> bool {
        self.sender.send_if_modified(|state| {
            match state.groups.iter().position(|group| group.name == name) {
                Some(index) => {
                    state.groups.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    pub(crate) fn update<F>(&self, modify: F)
    where
        F: FnOnce(&mut DuplicateSnapshot),
    {
        self.sender.send_modify(modify);
    }

    pub(crate) fn set_status(&self, status: ScanStatus) {
        self.sender.send_if_modified(|state| {
            let changed = state.status != status;
            state.status = status;
            changed
        });
    }

    pub(crate) fn set_deleting(&self, is_deleting: bool) {
        self.sender.send_if_modified(|state| {
            let changed = state.is_deleting != is_deleting;
            state.is_deleting = is_deleting;
            changed
        });
    }

    /// Replace the groups with a fresh scan result. The old selection refers to
    /// the old groups and is dropped.
    pub(crate) fn publish_groups(&self, groups: Vec<DuplicateGroup>) {
        self.sender.send_modify(|state| {
            state.groups = groups;
            state.selected.clear();
            state.status = ScanStatus::Ready;
        });
    }
}

impl Default for DuplicateState {
    fn default() -> Self {
        Self::new()
    }
}
