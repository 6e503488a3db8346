use crate::{JobId, PlaceholderId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A placeholder element entered the document.
    ElementInserted {
        id: PlaceholderId,
        job: JobId,
        href: Option<String>,
    },
    /// A placeholder element left the document without being resolved by us.
    ElementRemoved { id: PlaceholderId },
    /// The notification connection opened; the element type is now registered.
    ConnectionOpened,
    /// The server reported a finished job.
    NotificationReceived(JobId),
    /// A fragment fetch finished, one way or the other.
    FetchCompleted {
        id: PlaceholderId,
        outcome: FetchOutcome,
    },
    /// The notification connection closed (or never opened).
    ConnectionClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Status 200; the body is the replacement markup.
    Fragment(String),
    /// Any other status, or the request failed.
    Failed,
}
