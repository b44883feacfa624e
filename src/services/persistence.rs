use std::{path::PathBuf, sync::Arc};

use time::OffsetDateTime;
use tokio::{
    sync::{RwLock, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dao::{
        models::MoveEntity,
        move_log::MoveLog,
        save_state::{PersistenceError, StateFile},
    },
    state::game::{Action, ParticipantId},
};

/// Durable engine state plus the best-effort analytics move log.
///
/// The gate starts in degraded mode: moves are dropped until a store is installed.
#[derive(Clone)]
pub struct PersistenceGate {
    inner: Arc<PersistenceInner>,
}

struct PersistenceInner {
    state_file: StateFile,
    move_log: RwLock<Option<Arc<dyn MoveLog>>>,
    degraded: watch::Sender<bool>,
}

impl PersistenceGate {
    /// Build a gate writing the engine state to `save_path`.
    pub fn new(save_path: impl Into<PathBuf>) -> Self {
        let (degraded, _rx) = watch::channel(true);
        Self {
            inner: Arc::new(PersistenceInner {
                state_file: StateFile::new(save_path),
                move_log: RwLock::new(None),
                degraded,
            }),
        }
    }

    /// File holding the engine snapshot.
    pub fn state_file(&self) -> &StateFile {
        &self.inner.state_file
    }

    /// Atomically overwrite the saved engine state.
    pub async fn save(&self, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.inner.state_file.save(bytes).await?;
        info!(path = %self.inner.state_file.path().display(), "game state saved");
        Ok(())
    }

    /// Read the saved engine state back.
    pub async fn restore(&self) -> Result<Vec<u8>, PersistenceError> {
        self.inner.state_file.restore().await
    }

    /// Remove an unusable save; failures are only logged.
    pub async fn discard_corrupt(&self) {
        if let Err(err) = self.inner.state_file.discard().await {
            warn!(error = %err, "failed to remove corrupt save file");
        }
    }

    /// Record a press in the analytics log without waiting for the store.
    ///
    /// Validation and storage failures are logged and swallowed.
    pub fn log_move(
        &self,
        participant: ParticipantId,
        action: Action,
        at: OffsetDateTime,
    ) -> JoinHandle<()> {
        let gate = self.clone();
        let entry = MoveEntity::new(participant, action, at.unix_timestamp());
        tokio::spawn(async move {
            if let Err(err) = entry.validate() {
                warn!(participant = %participant, error = %err, "dropping invalid move record");
                return;
            }

            let Some(store) = gate.move_log().await else {
                debug!(participant = %participant, action = %action, "no move log installed; dropping move");
                return;
            };

            if let Err(err) = store.append(entry).await {
                warn!(participant = %participant, action = %action, error = %err, "failed to log move");
            }
        })
    }

    /// Currently installed analytics store, if any.
    pub async fn move_log(&self) -> Option<Arc<dyn MoveLog>> {
        let guard = self.inner.move_log.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new analytics store and leave degraded mode.
    pub async fn set_move_log(&self, store: Arc<dyn MoveLog>) {
        {
            let mut guard = self.inner.move_log.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Drop the analytics store and enter degraded mode.
    pub async fn clear_move_log(&self) {
        {
            let mut guard = self.inner.move_log.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.inner.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.inner.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.inner.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryMoveLog, scratch_dir};

    #[tokio::test]
    async fn moves_reach_the_installed_store() {
        let gate = PersistenceGate::new(scratch_dir("gate").join("save.state"));
        let store = MemoryMoveLog::new();
        gate.set_move_log(Arc::new(store.clone())).await;
        assert!(!gate.is_degraded());

        let at = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        gate.log_move(ParticipantId(7), Action::Up, at).await.unwrap();

        let entries = store.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].participant_id, 7);
        assert_eq!(entries[0].action, "up");
        assert_eq!(entries[0].created_at, 1_700_000_000);
    }

    #[tokio::test]
    async fn failures_and_degraded_mode_are_swallowed() {
        let gate = PersistenceGate::new(scratch_dir("gate").join("save.state"));
        let now = OffsetDateTime::now_utc();

        // No store installed: dropped quietly.
        gate.log_move(ParticipantId(1), Action::A, now).await.unwrap();
        assert!(gate.is_degraded());

        let store = MemoryMoveLog::failing();
        gate.set_move_log(Arc::new(store.clone())).await;
        gate.log_move(ParticipantId(1), Action::A, now).await.unwrap();
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn invalid_records_never_reach_the_store() {
        let gate = PersistenceGate::new(scratch_dir("gate").join("save.state"));
        let store = MemoryMoveLog::new();
        gate.set_move_log(Arc::new(store.clone())).await;

        gate.log_move(ParticipantId(0), Action::B, OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(store.entries().is_empty());
    }

    #[tokio::test]
    async fn degraded_flag_only_notifies_on_change() {
        let gate = PersistenceGate::new(scratch_dir("gate").join("save.state"));
        let mut watcher = gate.degraded_watcher();

        gate.update_degraded(true);
        assert!(!watcher.has_changed().unwrap());

        gate.update_degraded(false);
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        gate.clear_move_log().await;
        assert!(gate.is_degraded());
    }
}
