use std::collections::BTreeMap;
use std::fmt;

use crate::view_model::{PlaceholderCounts, PlaceholderRow, SyncViewModel};

pub type PlaceholderId = u64;

/// Opaque name of a server-side unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closed,
}

/// Lifecycle of one placeholder element.
///
/// `Unattached` elements exist in the document but the element type is not
/// registered yet. `Pending` and `Resolving` both show the pending marker;
/// `Resolving` means a fetch is in flight. The last three states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderState {
    Unattached,
    Pending,
    Resolving,
    Resolved,
    Failed,
    Detached,
}

impl PlaceholderState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlaceholderState::Resolved | PlaceholderState::Failed | PlaceholderState::Detached
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder {
    pub(crate) job: JobId,
    pub(crate) href: Option<String>,
    pub(crate) state: PlaceholderState,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncState {
    connection: ConnectionState,
    placeholders: BTreeMap<PlaceholderId, Placeholder>,
    ignored_notifications: usize,
    dirty: bool,
}

impl SyncState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn placeholder_state(&self, id: PlaceholderId) -> Option<PlaceholderState> {
        self.placeholders.get(&id).map(|p| p.state)
    }

    /// True once no placeholder can change any more.
    pub fn is_settled(&self) -> bool {
        self.placeholders.values().all(|p| p.state.is_terminal())
    }

    /// Returns whether the document changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn view(&self) -> SyncViewModel {
        let mut counts = PlaceholderCounts::default();
        let placeholders = self
            .placeholders
            .iter()
            .map(|(id, p)| {
                counts.record(p.state);
                PlaceholderRow {
                    id: *id,
                    job: p.job.clone(),
                    state: p.state,
                }
            })
            .collect();

        SyncViewModel {
            connection: self.connection,
            placeholders,
            counts,
            ignored_notifications: self.ignored_notifications,
            dirty: self.dirty,
        }
    }

    pub(crate) fn contains(&self, id: PlaceholderId) -> bool {
        self.placeholders.contains_key(&id)
    }

    pub(crate) fn insert(&mut self, id: PlaceholderId, job: JobId, href: Option<String>) {
        self.placeholders.insert(
            id,
            Placeholder {
                job,
                href,
                state: PlaceholderState::Unattached,
            },
        );
    }

    pub(crate) fn get(&self, id: PlaceholderId) -> Option<&Placeholder> {
        self.placeholders.get(&id)
    }

    pub(crate) fn set_state(&mut self, id: PlaceholderId, state: PlaceholderState) {
        if let Some(placeholder) = self.placeholders.get_mut(&id) {
            placeholder.state = state;
        }
    }

    pub(crate) fn set_connection(&mut self, connection: ConnectionState) {
        self.connection = connection;
    }

    pub(crate) fn ids_in_state(&self, wanted: PlaceholderState) -> Vec<PlaceholderId> {
        self.placeholders
            .iter()
            .filter(|(_, p)| p.state == wanted)
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn non_terminal_ids(&self) -> Vec<PlaceholderId> {
        self.placeholders
            .iter()
            .filter(|(_, p)| !p.state.is_terminal())
            .map(|(id, _)| *id)
            .collect()
    }

    /// First placeholder, in discovery order, waiting for `job` with no fetch in flight.
    pub(crate) fn find_pending(&self, job: &JobId) -> Option<PlaceholderId> {
        self.placeholders
            .iter()
            .find(|(_, p)| p.state == PlaceholderState::Pending && &p.job == job)
            .map(|(id, _)| *id)
    }

    pub(crate) fn record_ignored_notification(&mut self) {
        self.ignored_notifications += 1;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
