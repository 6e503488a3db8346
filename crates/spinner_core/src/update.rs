use crate::{
    ConnectionState, Effect, FetchOutcome, Msg, PlaceholderId, PlaceholderState, Replacement,
    SyncState,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SyncState, msg: Msg) -> (SyncState, Vec<Effect>) {
    let effects = match msg {
        Msg::ElementInserted { id, job, href } => {
            if state.contains(id) {
                return (state, Vec::new());
            }
            state.insert(id, job, href);
            match state.connection() {
                // Not upgraded until the element type is registered.
                ConnectionState::Connecting => Vec::new(),
                ConnectionState::Open => attach(&mut state, id),
                // Nothing can ever notify this one.
                ConnectionState::Closed => fail(&mut state, id),
            }
        }
        Msg::ElementRemoved { id } => {
            if state
                .placeholder_state(id)
                .is_some_and(|s| !s.is_terminal())
            {
                state.set_state(id, PlaceholderState::Detached);
            }
            Vec::new()
        }
        Msg::ConnectionOpened => {
            if state.connection() != ConnectionState::Connecting {
                return (state, Vec::new());
            }
            state.set_connection(ConnectionState::Open);
            let unattached = state.ids_in_state(PlaceholderState::Unattached);
            let mut effects = Vec::with_capacity(unattached.len() * 2);
            for id in unattached {
                effects.extend(attach(&mut state, id));
            }
            effects
        }
        Msg::NotificationReceived(job) => {
            if state.connection() != ConnectionState::Open {
                return (state, Vec::new());
            }
            match state.find_pending(&job) {
                Some(id) => {
                    let href = state.get(id).and_then(|p| p.href.clone());
                    state.set_state(id, PlaceholderState::Resolving);
                    vec![Effect::FetchFragment { id, href }]
                }
                None => {
                    state.record_ignored_notification();
                    Vec::new()
                }
            }
        }
        Msg::FetchCompleted { id, outcome } => {
            // Anything but `Resolving` means the element was already finalized
            // (typically by a connection close racing the fetch).
            if state.placeholder_state(id) != Some(PlaceholderState::Resolving) {
                return (state, Vec::new());
            }
            let (next, replacement) = match outcome {
                FetchOutcome::Fragment(markup) => {
                    (PlaceholderState::Resolved, Replacement::Markup(markup))
                }
                FetchOutcome::Failed => (PlaceholderState::Failed, Replacement::FailureGlyph),
            };
            state.set_state(id, next);
            state.mark_dirty();
            vec![Effect::Finalize { id, replacement }]
        }
        Msg::ConnectionClosed => {
            if state.connection() == ConnectionState::Closed {
                return (state, Vec::new());
            }
            state.set_connection(ConnectionState::Closed);
            let doomed = state.non_terminal_ids();
            let mut effects = Vec::with_capacity(doomed.len() + 1);
            effects.push(Effect::ReportConnectionLost);
            for id in doomed {
                effects.extend(fail(&mut state, id));
            }
            effects
        }
    };

    (state, effects)
}

fn attach(state: &mut SyncState, id: PlaceholderId) -> Vec<Effect> {
    let Some(job) = state.get(id).map(|p| p.job.clone()) else {
        return Vec::new();
    };
    state.set_state(id, PlaceholderState::Pending);
    state.mark_dirty();
    vec![Effect::MarkPending { id }, Effect::SendJob { job }]
}

fn fail(state: &mut SyncState, id: PlaceholderId) -> Vec<Effect> {
    state.set_state(id, PlaceholderState::Failed);
    state.mark_dirty();
    vec![Effect::Finalize {
        id,
        replacement: Replacement::FailureGlyph,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JobId;

    fn inserted(id: PlaceholderId, job: &str) -> Msg {
        Msg::ElementInserted {
            id,
            job: JobId::from(job),
            href: Some(format!("/result/{job}")),
        }
    }

    #[test]
    fn duplicate_insert_keeps_first_registration() {
        let (state, _) = update(SyncState::new(), Msg::ConnectionOpened);
        let (state, first) = update(state, inserted(1, "a"));
        let (state, second) = update(
            state,
            Msg::ElementInserted {
                id: 1,
                job: JobId::from("other"),
                href: None,
            },
        );

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
        assert_eq!(state.view().placeholders[0].job, JobId::from("a"));
    }

    #[test]
    fn notification_skips_placeholder_with_fetch_in_flight() {
        let (state, _) = update(SyncState::new(), inserted(1, "a"));
        let (state, _) = update(state, Msg::ConnectionOpened);
        let (state, first) = update(state, Msg::NotificationReceived("a".into()));
        let (state, second) = update(state, Msg::NotificationReceived("a".into()));

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(state.view().ignored_notifications, 1);
    }

    #[test]
    fn second_open_is_ignored() {
        let (state, _) = update(SyncState::new(), inserted(1, "a"));
        let (state, first) = update(state, Msg::ConnectionOpened);
        let (_state, second) = update(state, Msg::ConnectionOpened);

        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }
}
