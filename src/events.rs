use std::time::Duration;

use sqlx::{postgres::PgListener, PgPool};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::students::repo_types::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Channel the student table triggers notify on.
pub const STUDENT_CHANNEL: &str = "student_changes";

/// One successful write against a student table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableChange {
    pub track: Track,
    pub kind: ChangeKind,
}

impl TableChange {
    /// Parses a trigger payload of the form `"<table>:<op>"`.
    pub fn from_notification(payload: &str) -> Option<Self> {
        let (table, op) = payload.split_once(':')?;
        let track = [Track::General, Track::Als]
            .into_iter()
            .find(|t| t.table() == table)?;
        let kind = match op {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" | "TRUNCATE" => ChangeKind::Delete,
            _ => return None,
        };
        Some(Self { track, kind })
    }
}

/// Fan-out of table changes to every open listing stream.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<TableChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, track: Track, kind: ChangeKind) {
        // No subscribers is the common case.
        let receivers = self.tx.send(TableChange { track, kind }).unwrap_or(0);
        debug!(?track, ?kind, receivers, "table change published");
    }

    pub fn subscribe(&self, track: Track) -> ChangeSubscription {
        ChangeSubscription {
            track,
            rx: self.tx.subscribe(),
        }
    }
}

/// Feeds `changes` from the database triggers, so writes from any connection reach open
/// listing streams. The spawned task lives as long as the process.
pub async fn listen_for_changes(
    db: &PgPool,
    changes: ChangeFeed,
) -> Result<tokio::task::JoinHandle<()>, sqlx::Error> {
    let mut listener = PgListener::connect_with(db).await?;
    listener.listen(STUDENT_CHANNEL).await?;
    info!(channel = STUDENT_CHANNEL, "listening for student table changes");

    Ok(tokio::spawn(async move {
        loop {
            match listener.recv().await {
                Ok(notification) => match TableChange::from_notification(notification.payload()) {
                    Some(change) => changes.publish(change.track, change.kind),
                    None => warn!(payload = notification.payload(), "unrecognized change notification"),
                },
                Err(e) => {
                    // recv reconnects on the next call; anything missed is covered by a re-fetch.
                    warn!(error = %e, "change listener error");
                    changes.publish(Track::General, ChangeKind::Update);
                    changes.publish(Track::Als, ChangeKind::Update);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }))
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(64)
    }
}

/// Changes for one table only.
pub struct ChangeSubscription {
    track: Track,
    rx: broadcast::Receiver<TableChange>,
}

impl ChangeSubscription {
    /// Waits for the next change to this table. `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<TableChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if change.track == self.track => return Some(change),
                Ok(_) => continue,
                // Missed some; any change means a full re-fetch anyway.
                Err(RecvError::Lagged(_)) => {
                    return Some(TableChange {
                        track: self.track,
                        kind: ChangeKind::Update,
                    })
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
