use crate::{ConnectionState, JobId, PlaceholderId, PlaceholderState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaceholderCounts {
    pub unattached: usize,
    pub pending: usize,
    pub resolved: usize,
    pub failed: usize,
    pub detached: usize,
}

impl PlaceholderCounts {
    pub(crate) fn record(&mut self, state: PlaceholderState) {
        match state {
            PlaceholderState::Unattached => self.unattached += 1,
            PlaceholderState::Pending | PlaceholderState::Resolving => self.pending += 1,
            PlaceholderState::Resolved => self.resolved += 1,
            PlaceholderState::Failed => self.failed += 1,
            PlaceholderState::Detached => self.detached += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.unattached + self.pending + self.resolved + self.failed + self.detached
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncViewModel {
    pub connection: ConnectionState,
    pub placeholders: Vec<PlaceholderRow>,
    pub counts: PlaceholderCounts,
    pub ignored_notifications: usize,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderRow {
    pub id: PlaceholderId,
    pub job: JobId,
    pub state: PlaceholderState,
}
