//! SpinnerSync engine: page document, notification connection, fragment
//! fetching and effect execution.
mod channel;
mod config;
mod decode;
mod engine;
mod fetch;
mod page;
mod persist;
mod source;
mod types;

pub use channel::{
    ChannelError, ChannelEvent, ConnectionManager, Connector, NotificationChannel, WsChannel,
    WsConnector,
};
pub use config::{ConfigError, ElementSpec, FetchConfig, SyncConfig, DEFAULT_FAILURE_GLYPH};
pub use decode::{decode_markup, decode_utf8, DecodedMarkup};
pub use engine::{SpinnerSync, SyncError, SyncReport};
pub use fetch::{BodyDecoding, FetchSettings, Fetcher, ReqwestFetcher};
pub use page::{EndpointError, Page, Placeholder, ReplaceOutcome};
pub use persist::{ensure_output_dir, PersistError, SnapshotWriter};
pub use source::{LoadedPage, PageSource};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput};
