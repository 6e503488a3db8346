use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use futures_util::{FutureExt, StreamExt};
use spinner_core::{
    update, Effect, FetchOutcome, JobId, Msg, PlaceholderId, Replacement, SyncState,
    SyncViewModel,
};
use sync_logging::{sync_debug, sync_error, sync_info, sync_warn};

use crate::channel::{ChannelEvent, ConnectionManager, Connector};
use crate::config::SyncConfig;
use crate::fetch::Fetcher;
use crate::page::{EndpointError, Page, Placeholder};
use crate::persist::SnapshotWriter;
use crate::{FailureKind, FetchError, FetchOutput};

type FetchCompletion = (PlaceholderId, FetchOutcome);

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cannot derive notification endpoint: {0}")]
    Endpoint(#[from] EndpointError),
    #[error("cannot read page {path:?}: {source}")]
    ReadPage {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot fetch page: {0}")]
    FetchPage(#[from] FetchError),
}

/// Final state of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub view: SyncViewModel,
    pub html: String,
}

/// Drives one page: bridges the notification connection, the fetcher and
/// the document through the pure `spinner_core` state machine.
///
/// Everything runs on the caller's task. Fetches proceed concurrently with
/// each other and with connection events; nothing else suspends.
pub struct SpinnerSync {
    page: Page,
    connection: ConnectionManager,
    fetcher: Arc<dyn Fetcher>,
    state: SyncState,
    failure_glyph: String,
    in_flight: FuturesUnordered<BoxFuture<'static, FetchCompletion>>,
    snapshot: Option<SnapshotWriter>,
    /// The page changed outside the state machine since the last snapshot.
    swept: bool,
}

enum Step {
    Fetched(FetchCompletion),
    Channel(ChannelEvent),
}

impl SpinnerSync {
    /// Derives the endpoint from the page, makes the single connection
    /// attempt and, once open, attaches every placeholder already present.
    pub async fn start(
        mut page: Page,
        config: &SyncConfig,
        connector: &dyn Connector,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, SyncError> {
        let endpoint = page.endpoint_url(&config.endpoint_link_id)?;
        let existing = page.discover();
        sync_info!(
            "Found {} placeholder(s) <{}>",
            existing.len(),
            config.element.tag_name
        );

        let connection = ConnectionManager::open(endpoint, connector).await;
        let mut sync = Self {
            page,
            connection,
            fetcher,
            state: SyncState::new(),
            failure_glyph: config.failure_glyph.clone(),
            in_flight: FuturesUnordered::new(),
            snapshot: config.snapshot_path.clone().map(SnapshotWriter::new),
            swept: false,
        };

        let mut inbox: VecDeque<Msg> = existing.into_iter().map(inserted).collect();
        inbox.push_back(if sync.connection.is_open() {
            Msg::ConnectionOpened
        } else {
            Msg::ConnectionClosed
        });
        sync.dispatch_all(inbox).await;
        Ok(sync)
    }

    pub fn view(&self) -> SyncViewModel {
        self.state.view()
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Processes events until nothing can change any more: either every
    /// placeholder is settled (the connection is then closed), or the
    /// connection is gone and the last in-flight fetch has finished.
    pub async fn run(mut self) -> SyncReport {
        loop {
            if self.in_flight.is_empty() {
                if !self.connection.is_open() {
                    break;
                }
                if self.state.is_settled() {
                    sync_info!("All placeholders settled; closing connection");
                    self.connection.close().await;
                    break;
                }
            }

            let step = tokio::select! {
                Some(done) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    Step::Fetched(done)
                }
                event = self.connection.next_event(), if self.connection.is_open() => {
                    Step::Channel(event)
                }
                else => break,
            };

            let msg = match step {
                Step::Fetched((id, outcome)) => Msg::FetchCompleted { id, outcome },
                Step::Channel(ChannelEvent::Notification(text)) => {
                    sync_debug!("Notification for job {:?}", text);
                    Msg::NotificationReceived(JobId::from(text))
                }
                Step::Channel(ChannelEvent::Closed { reason }) => {
                    sync_debug!("Connection closed ({:?})", reason);
                    Msg::ConnectionClosed
                }
            };
            self.dispatch_all(VecDeque::from([msg])).await;
        }

        let view = self.state.view();
        sync_info!(
            "Finished: {} resolved, {} failed, {} detached, {} still pending",
            view.counts.resolved,
            view.counts.failed,
            view.counts.detached,
            view.counts.pending + view.counts.unattached
        );
        SyncReport {
            view,
            html: self.page.to_html(),
        }
    }

    async fn dispatch_all(&mut self, mut inbox: VecDeque<Msg>) {
        while let Some(msg) = inbox.pop_front() {
            let state = std::mem::take(&mut self.state);
            let (state, effects) = update(state, msg);
            self.state = state;
            for effect in effects {
                self.apply(effect, &mut inbox).await;
            }
        }
        if self.state.consume_dirty() | std::mem::take(&mut self.swept) {
            self.write_snapshot();
        }
    }

    async fn apply(&mut self, effect: Effect, inbox: &mut VecDeque<Msg>) {
        match effect {
            Effect::MarkPending { id } => self.page.mark_pending(id),
            Effect::SendJob { job } => self.connection.send(&job).await,
            Effect::FetchFragment { id, href } => self.spawn_fetch(id, href),
            Effect::Finalize { id, replacement } => {
                self.page.clear_pending(id);
                let markup = match &replacement {
                    Replacement::Markup(markup) => markup.as_str(),
                    Replacement::FailureGlyph => self.failure_glyph.as_str(),
                };
                let outcome = self.page.replace(id, markup);
                if !outcome.replaced {
                    sync_debug!("Placeholder {} already left the document", id);
                }
                inbox.extend(outcome.removed.into_iter().map(|id| Msg::ElementRemoved { id }));
                inbox.extend(outcome.inserted.into_iter().map(inserted));
            }
            Effect::ReportConnectionLost => {
                sync_warn!("connection lost");
                // Tag instances without a job were never tracked but still
                // show a spinner.
                let swept = self.page.replace_unregistered(&self.failure_glyph);
                if swept > 0 {
                    sync_debug!("Replaced {} untracked element(s)", swept);
                    self.swept = true;
                }
            }
        }
    }

    fn spawn_fetch(&mut self, id: PlaceholderId, href: Option<String>) {
        let target = match href.as_deref().map(|href| self.page.resolve(href)) {
            Some(Ok(url)) => Ok(url),
            Some(Err(err)) => Err(FetchError::new(FailureKind::InvalidUrl, err.to_string())),
            None => Err(FetchError::new(
                FailureKind::MissingLink,
                "placeholder has no link",
            )),
        };
        let fetcher = self.fetcher.clone();

        // Whatever happens inside, the placeholder gets a completion.
        self.in_flight.push(
            async move {
                let result = match target {
                    Ok(url) => AssertUnwindSafe(fetcher.fetch(url.as_str()))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|_| {
                            Err(FetchError::new(FailureKind::Panicked, "fetch panicked"))
                        }),
                    Err(err) => Err(err),
                };
                (id, settle(id, result))
            }
            .boxed(),
        );
    }

    fn write_snapshot(&self) {
        let Some(writer) = &self.snapshot else {
            return;
        };
        if let Err(err) = writer.write(&self.page.to_html()) {
            sync_error!("Failed to write snapshot {:?}: {}", writer.target(), err);
        }
    }
}

fn inserted(placeholder: Placeholder) -> Msg {
    Msg::ElementInserted {
        id: placeholder.id,
        job: placeholder.job,
        href: placeholder.href,
    }
}

fn settle(id: PlaceholderId, result: Result<FetchOutput, FetchError>) -> FetchOutcome {
    match result {
        Ok(output) => {
            sync_debug!(
                "Placeholder {} fetched {} ({} bytes)",
                id,
                output.metadata.final_url,
                output.metadata.byte_len
            );
            FetchOutcome::Fragment(output.markup)
        }
        Err(err) => {
            sync_debug!("Placeholder {} fetch failed: {}", id, err);
            FetchOutcome::Failed
        }
    }
}
