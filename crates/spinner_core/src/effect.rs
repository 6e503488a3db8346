use crate::{JobId, PlaceholderId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Add the pending marker to the placeholder element.
    MarkPending { id: PlaceholderId },
    /// Announce interest in a job over the notification connection.
    SendJob { job: JobId },
    /// GET the placeholder's link; completion comes back as `Msg::FetchCompleted`.
    FetchFragment {
        id: PlaceholderId,
        href: Option<String>,
    },
    /// Clear the pending marker and swap the element for `replacement`, as one step.
    Finalize {
        id: PlaceholderId,
        replacement: Replacement,
    },
    /// One-time diagnostic when the connection goes away.
    ReportConnectionLost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    Markup(String),
    FailureGlyph,
}
