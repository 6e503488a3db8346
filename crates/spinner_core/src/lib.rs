//! SpinnerSync core: pure placeholder state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Replacement};
pub use msg::{FetchOutcome, Msg};
pub use state::{ConnectionState, JobId, PlaceholderId, PlaceholderState, SyncState};
pub use update::update;
pub use view_model::{PlaceholderCounts, PlaceholderRow, SyncViewModel};
