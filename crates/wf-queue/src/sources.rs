//! The engine's table of submitted sources.
//!
//! All status changes go through [`SourceTable::transition`], which enforces
//! the [`SourceStatus`] state machine.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use wf_core::{MediaInfo, SourceId, SourceItem, SourceStatus};

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<SourceId, SourceItem>,
    /// Submission order.
    order: Vec<SourceId>,
}

/// Sources known to one engine, keyed by id and kept in submission order.
#[derive(Debug, Default)]
pub struct SourceTable {
    inner: RwLock<Inner>,
}

impl SourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: SourceItem) -> SourceId {
        let id = item.id;
        let mut inner = self.inner.write();
        if inner.items.insert(id, item).is_none() {
            inner.order.push(id);
        }
        id
    }

    pub fn get(&self, id: SourceId) -> Option<SourceItem> {
        self.inner.read().items.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All items in submission order.
    pub fn snapshot(&self) -> Vec<SourceItem> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.items.get(id).cloned())
            .collect()
    }

    pub fn find_by_path(&self, path: &Path) -> Option<SourceItem> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.items.get(id))
            .find(|item| item.path == path)
            .cloned()
    }

    /// Move `id` to `next`. Illegal moves are refused and logged.
    pub fn transition(&self, id: SourceId, next: SourceStatus) -> bool {
        let mut inner = self.inner.write();
        let Some(item) = inner.items.get_mut(&id) else {
            return false;
        };
        if !item.status.can_transition_to(next) {
            tracing::warn!(
                source = %item.path.display(),
                "Refusing status change {} -> {}",
                item.status,
                next
            );
            return false;
        }
        tracing::debug!(source = %item.path.display(), "{} -> {}", item.status, next);
        item.status = next;
        true
    }

    pub fn set_info(&self, id: SourceId, info: MediaInfo) {
        if let Some(item) = self.inner.write().items.get_mut(&id) {
            item.info = Some(info);
        }
    }

    /// Record progress of the running preset. Only ever raises the value
    /// unless `reset` is set.
    pub fn set_progress(&self, id: SourceId, percent: u8, reset: bool) -> bool {
        let mut inner = self.inner.write();
        let Some(item) = inner.items.get_mut(&id) else {
            return false;
        };
        let percent = percent.min(100);
        if reset || percent > item.progress {
            item.progress = percent;
            true
        } else {
            false
        }
    }

    pub fn set_error(&self, id: SourceId, error: Option<String>) {
        if let Some(item) = self.inner.write().items.get_mut(&id) {
            item.error = error;
        }
    }

    pub fn push_output(&self, id: SourceId, output: PathBuf) {
        if let Some(item) = self.inner.write().items.get_mut(&id) {
            item.outputs.push(output);
        }
    }

    /// Re-enter a failed or cancelled item as a fresh submission.
    pub fn reset_for_resubmit(&self, id: SourceId) -> bool {
        let mut inner = self.inner.write();
        let Some(item) = inner.items.get_mut(&id) else {
            return false;
        };
        if !item.status.can_transition_to(SourceStatus::Discovered) {
            return false;
        }
        item.status = SourceStatus::Discovered;
        item.info = None;
        item.progress = 0;
        item.error = None;
        item.outputs.clear();
        true
    }

    /// Drop every item that reached an outcome. Returns how many were dropped.
    pub fn forget_finished(&self) -> usize {
        let mut inner = self.inner.write();
        let before = inner.items.len();
        inner.items.retain(|_, item| !item.status.is_finished());
        let Inner { items, order } = &mut *inner;
        order.retain(|id| items.contains_key(id));
        before - inner.items.len()
    }
}
