//! Merge stage actor: a Tokio task that owns the merged user.
//!
//! The task waits on two inputs at once, session changes and profile
//! snapshots, and republishes the merged value whenever it changes.
//! It's the only writer of the merged watch channel.

use std::sync::Arc;

use authsync_protocol::{QuerySnapshot, SessionUser, UserId};
use authsync_provider::{ProfileQuery, ProfileStore};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{MergeOutput, MergeState, MergedUser, QueryCommand};

/// A profile query together with the identity it was issued for.
struct ActiveQuery {
    key: UserId,
    updates: ProfileQuery,
}

/// Waits for the next snapshot of the active query.
///
/// With no active query this pends forever, which keeps the `select!`
/// branch quiet until a session change opens one. `None` means the store
/// closed the query.
async fn next_snapshot(query: &mut Option<ActiveQuery>) -> Option<(UserId, QuerySnapshot)> {
    match query {
        Some(active) => {
            let snapshot = active.updates.recv().await?;
            Some((active.key.clone(), snapshot))
        }
        None => std::future::pending().await,
    }
}

/// The internal actor state. Runs inside a Tokio task.
struct MergeActor<S: ProfileStore> {
    store: Arc<S>,
    state: MergeState,
    session: watch::Receiver<SessionUser>,
    query: Option<ActiveQuery>,
    output: watch::Sender<MergeOutput>,
}

impl<S: ProfileStore> MergeActor<S> {
    /// Runs until the session machine goes away.
    async fn run(mut self) {
        tracing::info!("merge stage started");

        let initial = self.session.borrow_and_update().clone();
        self.handle_session(initial);

        loop {
            tokio::select! {
                changed = self.session.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = self.session.borrow_and_update().clone();
                    self.handle_session(next);
                }
                update = next_snapshot(&mut self.query) => match update {
                    Some((key, snapshot)) => self.handle_profile(&key, snapshot),
                    None => {
                        tracing::debug!("profile query closed by store");
                        self.query = None;
                    }
                },
            }
        }

        tracing::info!("merge stage stopped");
    }

    fn handle_session(&mut self, session: SessionUser) {
        match self.state.on_session(session) {
            QueryCommand::Open(key) => {
                // Replacing the old query drops its receiver, which
                // cancels interest in the previous identity.
                let updates = self.store.query(&key);
                tracing::debug!(user_id = %key, "profile query opened");
                self.query = Some(ActiveQuery { key, updates });
            }
            QueryCommand::Close => {
                if let Some(previous) = self.query.take() {
                    tracing::debug!(user_id = %previous.key, "profile query released");
                }
            }
            QueryCommand::Keep => {}
        }
        self.publish();
    }

    fn handle_profile(&mut self, key: &UserId, snapshot: QuerySnapshot) {
        if self.state.on_profile(key, snapshot.into()) {
            self.publish();
        }
    }

    /// Sends the merged value, notifying watchers only on a change.
    fn publish(&self) {
        let next = self.state.output();
        self.output.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            match &next {
                Ok(user) => tracing::info!(merged = %user, "merged user updated"),
                Err(e) => tracing::warn!(error = %e, "merged user failed"),
            }
            *current = next;
            true
        });
    }
}

/// Handle to a running merge stage.
///
/// Dropping the handle stops the task, releasing its profile query.
pub struct MergeHandle {
    output: watch::Receiver<MergeOutput>,
    task: JoinHandle<()>,
}

impl MergeHandle {
    /// The current merged value.
    pub fn current(&self) -> MergeOutput {
        self.output.borrow().clone()
    }

    /// A receiver that observes every change of the merged value.
    pub fn watch(&self) -> watch::Receiver<MergeOutput> {
        self.output.clone()
    }

    /// Stops the task and waits until its profile query is released.
    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for MergeHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the merge stage and returns a handle to its output.
///
/// `session` is the session machine's watch receiver. The task ends by
/// itself once the session machine is dropped.
pub fn spawn_merge_stage<S: ProfileStore>(
    store: Arc<S>,
    session: watch::Receiver<SessionUser>,
) -> MergeHandle {
    let (tx, rx) = watch::channel(Ok(MergedUser::Loading));

    let actor = MergeActor {
        store,
        state: MergeState::new(),
        session,
        query: None,
        output: tx,
    };

    MergeHandle {
        output: rx,
        task: tokio::spawn(actor.run()),
    }
}
