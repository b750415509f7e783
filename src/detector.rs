use std::collections::HashMap;

use crate::types::{Resource, Version};

/// Gates downstream reconciliation on the source's version stamp.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    last_applied: HashMap<Resource, i64>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unversioned snapshots always apply. Versioned ones apply when the stamp
    /// moved or the local view is still empty (first load always renders).
    pub fn should_apply(&self, resource: &Resource, version: Version, local_is_empty: bool) -> bool {
        let Some(version) = version else {
            return true;
        };
        local_is_empty || self.last_applied.get(resource) != Some(&version)
    }

    pub fn mark_applied(&mut self, resource: &Resource, version: Version) {
        match version {
            Some(v) => {
                self.last_applied.insert(resource.clone(), v);
            }
            None => {
                self.last_applied.remove(resource);
            }
        }
    }

    /// Check-and-record in one step.
    pub fn gate(&mut self, resource: &Resource, version: Version, local_is_empty: bool) -> bool {
        if !self.should_apply(resource, version, local_is_empty) {
            tracing::trace!(%resource, ?version, "version unchanged, skipping");
            return false;
        }
        self.mark_applied(resource, version);
        true
    }

    /// Forget the last applied stamp so the next snapshot applies regardless.
    pub fn invalidate(&mut self, resource: &Resource) {
        self.last_applied.remove(resource);
    }

    pub fn last_applied(&self, resource: &Resource) -> Version {
        self.last_applied.get(resource).copied()
    }
}
