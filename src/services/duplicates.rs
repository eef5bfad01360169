use crate::core::config::CleanerConfig;
use crate::core::library::PhotoStore;
use crate::core::planner::{DeletionMode, DeletionPlan};
use crate::core::scanner::{ScanError, ScanProgress, ScanReport, ScannerService};
use crate::core::state::{DuplicateSnapshot, DuplicateState, ScanStatus};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Another deletion is already in progress")]
    Busy,

    #[error("Failed to delete photos: {reason}")]
    Store { reason: String },

    #[error("Deletion task failed: {0}")]
    Task(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletionOutcome {
    pub mode: DeletionMode,
    pub removed: Vec<String>,
    pub groups_remaining: usize,
}

#[derive(Default)]
struct ScanSlot {
    generation: u64,
    token: Option<Arc<AtomicBool>>,
}

/// Clears the busy flag however the deletion ends.
struct BusyGuard<'a> {
    state: &'a DuplicateState,
}

impl<'a> BusyGuard<'a> {
    fn engage(state: &'a DuplicateState) -> Self {
        state.set_deleting(true);
        Self { state }
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.state.set_deleting(false);
    }
}

/// Scans a photo store for duplicates, publishes the groups, and commits
/// deletions against the store.
pub struct DuplicateService<S: PhotoStore + 'static> {
    store: Arc<S>,
    config: CleanerConfig,
    state: DuplicateState,
    scan_slot: Mutex<ScanSlot>,
    deletion_lock: tokio::sync::Mutex<()>,
    progress_sender: Option<mpsc::UnboundedSender<ScanProgress>>,
}

impl<S: PhotoStore + 'static> DuplicateService<S> {
    pub fn new(store: Arc<S>, config: CleanerConfig) -> Self {
        Self {
            store,
            config,
            state: DuplicateState::new(),
            scan_slot: Mutex::new(ScanSlot::default()),
            deletion_lock: tokio::sync::Mutex::new(()),
            progress_sender: None,
        }
    }

    pub fn with_progress_sender(mut self, sender: mpsc::UnboundedSender<ScanProgress>) -> Self {
        self.progress_sender = Some(sender);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &CleanerConfig {
        &self.config
    }

    pub fn state(&self) -> &DuplicateState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<DuplicateSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> DuplicateSnapshot {
        self.state.snapshot()
    }

    fn scan_slot(&self) -> MutexGuard<'_, ScanSlot> {
        self.scan_slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Rescan the library and publish the result.
    ///
    /// A scan started while another is running cancels the older one; only
    /// the newest scan publishes, older ones return [`ScanError::Superseded`].
    pub async fn scan(&self) -> Result<ScanReport, ScanError> {
        let token = Arc::new(AtomicBool::new(false));
        let generation = {
            let mut slot = self.scan_slot();
            if let Some(previous) = slot.token.replace(token.clone()) {
                previous.store(true, Ordering::Relaxed);
            }
            slot.generation += 1;
            slot.generation
        };
        self.state.set_status(ScanStatus::Scanning);

        let mut scanner = ScannerService::new(self.config.clone()).with_cancellation_token(token);
        if let Some(sender) = &self.progress_sender {
            scanner = scanner.with_progress_sender(sender.clone());
        }

        let store = self.store.clone();
        let result = tokio::task::spawn_blocking(move || scanner.scan(store.as_ref())).await;

        let mut slot = self.scan_slot();
        if slot.generation != generation {
            log::debug!("Discarding result of superseded scan {}", generation);
            return Err(ScanError::Superseded);
        }
        slot.token = None;

        match result {
            Ok(Ok(report)) => {
                self.state.publish_groups(report.groups.clone());
                Ok(report)
            }
            Ok(Err(ScanError::AccessDenied)) => {
                self.state.update(|state| {
                    state.groups.clear();
                    state.selected.clear();
                    state.status = ScanStatus::AccessDenied;
                });
                Err(ScanError::AccessDenied)
            }
            Ok(Err(e)) => {
                log::warn!("Scan failed: {}", e);
                self.state.set_status(ScanStatus::Failed);
                Err(e)
            }
            Err(e) => {
                self.state.set_status(ScanStatus::Failed);
                Err(ScanError::Task(e.to_string()))
            }
        }
    }

    pub fn select(&self, id: &str) {
        self.state.select(id);
    }

    pub fn deselect(&self, id: &str) {
        self.state.deselect(id);
    }

    pub fn toggle(&self, id: &str) {
        self.state.toggle(id);
    }

    pub fn clear_selection(&self) {
        self.state.clear_selection();
    }

    pub fn dismiss_group(&self, name: &str) -> bool {
        self.state.dismiss_group(name)
    }

    /// Plan a deletion against the current groups without committing it.
    pub fn plan(&self, mode: DeletionMode) -> DeletionPlan {
        let snapshot = self.state.snapshot();
        match mode {
            DeletionMode::FirstOfEachGroup => DeletionPlan::first_of_each_group(&snapshot.groups),
            DeletionMode::Selected => {
                DeletionPlan::from_selection(&snapshot.groups, &snapshot.selected)
            }
        }
    }

    /// Delete the earliest photo of every group.
    pub async fn delete_first_of_each_group(&self) -> Result<DeletionOutcome, DeleteError> {
        self.commit(DeletionMode::FirstOfEachGroup).await
    }

    /// Delete every selected photo that belongs to a group, then clear the
    /// selection.
    pub async fn delete_selected(&self) -> Result<DeletionOutcome, DeleteError> {
        self.commit(DeletionMode::Selected).await
    }

    async fn commit(&self, mode: DeletionMode) -> Result<DeletionOutcome, DeleteError> {
        let _permit = self
            .deletion_lock
            .try_lock()
            .map_err(|_| DeleteError::Busy)?;
        let _busy = BusyGuard::engage(&self.state);

        let plan = self.plan(mode);
        if plan.is_empty() {
            if mode == DeletionMode::Selected {
                self.state.clear_selection();
            }
            return Ok(DeletionOutcome {
                mode,
                removed: Vec::new(),
                groups_remaining: self.state.snapshot().groups.len(),
            });
        }

        let store = self.store.clone();
        let targets = plan.targets.clone();
        let result = tokio::task::spawn_blocking(move || store.delete_assets(&targets))
            .await
            .map_err(|e| DeleteError::Task(e.to_string()))?;

        if let Err(e) = result {
            log::warn!("Failed to delete photos: {}", e);
            return Err(DeleteError::Store {
                reason: e.to_string(),
            });
        }

        let policy = self.config.depletion;
        let mut groups_remaining = 0;
        self.state.update(|state| {
            plan.apply(&mut state.groups, policy);
            if mode == DeletionMode::Selected {
                state.selected.clear();
            }
            groups_remaining = state.groups.len();
        });

        log::info!(
            "Deleted {} photos, {} duplicate groups remain",
            plan.len(),
            groups_remaining
        );

        Ok(DeletionOutcome {
            mode,
            removed: plan.targets.into_iter().collect(),
            groups_remaining,
        })
    }
}
