use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{move_log::MoveLog, storage::StorageError},
    services::sse_service::broadcast_public_info,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

const DEGRADED_NOTICE: &str = "Move history is temporarily not being recorded";
const RECOVERED_NOTICE: &str = "Move history recording resumed";

fn enter_degraded(state: &SharedState) {
    if !state.is_degraded() {
        state.update_degraded(true);
        broadcast_public_info(state.public_sse(), DEGRADED_NOTICE);
    }
}

fn leave_degraded(state: &SharedState) {
    if state.is_degraded() {
        state.update_degraded(false);
        broadcast_public_info(state.public_sse(), RECOVERED_NOTICE);
    }
}

/// Connect to the analytics store and keep the shared state in degraded mode while it is unavailable.
///
/// Gameplay never waits on this task: moves submitted while degraded are dropped.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn MoveLog>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_move_log(store.clone()).await;
                info!("analytics store connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded() {
                                info!("analytics store healthy again; leaving degraded mode");
                            }
                            leave_degraded(&state);
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(err) => {
                            warn!(error = %err, "analytics store health check failed");
                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(
                                            "analytics store reconnection succeeded after health check failure"
                                        );
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "analytics store reconnect first attempt failed; entering degraded mode"
                                            );
                                            enter_degraded(&state);
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "analytics store reconnect attempt failed");
                                        };
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                leave_degraded(&state);
                                sleep(HEALTH_POLL_INTERVAL).await;
                                continue;
                            } else {
                                warn!(
                                    "exhausted analytics store reconnect attempts; staying in degraded mode"
                                );
                                break;
                            }
                        }
                    }
                }

                state.clear_move_log().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "analytics store connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryMoveLog, ScriptedFactory, test_state, wait_until};

    #[tokio::test(start_paused = true)]
    async fn toggles_degraded_mode_with_store_health() {
        let state = test_state(ScriptedFactory::new());
        let store = MemoryMoveLog::new();
        assert!(state.is_degraded());

        let connected = store.clone();
        let supervisor = tokio::spawn(run(state.clone(), move || {
            let store = connected.clone();
            async move { Ok(Arc::new(store) as Arc<dyn MoveLog>) }
        }));

        wait_until(|| !state.is_degraded()).await;
        assert!(state.move_log().await.is_some());

        store.set_healthy(false);
        tokio::time::sleep(HEALTH_POLL_INTERVAL + Duration::from_millis(100)).await;
        assert!(state.is_degraded());

        store.set_healthy(true);
        tokio::time::sleep(INITIAL_DELAY * 2).await;
        assert!(!state.is_degraded());

        supervisor.abort();
    }
}
