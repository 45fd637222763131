//! The background routine worker and the contract the coordinator holds it by.
//!
//! The coordinator only ever sees [`RoutineLauncher`] and [`RoutineHandle`]:
//! launch a worker, ask it to stop, wait a bounded time for it to finish.
//! The tokio-backed implementation spawns [`RoutineEngine`] and turns its
//! result into exactly one `Finished` event on the routine event channel.

mod engine;
mod surface;

pub(crate) use engine::{RoutineControl, RoutineEngine};

use crate::model::{RoutineConfig, RoutineEvent, RoutineOutcome};
use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::task::JoinHandle;

/// Worker collaborator contract consumed by the lifecycle coordinator.
pub(crate) trait RoutineLauncher {
    type Handle: RoutineHandle;

    fn launch(
        &self,
        cfg: RoutineConfig,
        events: UnboundedSender<RoutineEvent>,
    ) -> Result<Self::Handle>;
}

pub(crate) trait RoutineHandle {
    /// Advisory cancellation signal; the worker observes it at safe points.
    fn request_stop(&self);

    /// Bounded join: `true` if the worker finished within `timeout`.
    /// Exceeding the bound does not guarantee the worker has terminated.
    async fn await_finished(&mut self, timeout: Duration) -> bool;
}

/// Launches [`RoutineEngine`] workers on the tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TokioRoutineLauncher;

pub(crate) struct TokioRoutineHandle {
    ctrl_tx: UnboundedSender<RoutineControl>,
    join: JoinHandle<()>,
}

impl RoutineLauncher for TokioRoutineLauncher {
    type Handle = TokioRoutineHandle;

    fn launch(
        &self,
        cfg: RoutineConfig,
        events: UnboundedSender<RoutineEvent>,
    ) -> Result<TokioRoutineHandle> {
        let (ctrl_tx, ctrl_rx) = unbounded_channel::<RoutineControl>();
        let engine = RoutineEngine::new(cfg);
        let join = tokio::spawn(async move {
            let outcome = match engine.run(events.clone(), ctrl_rx).await {
                Ok(outcome) => outcome,
                Err(e) => RoutineOutcome::Failed {
                    message: format!("{e:#}"),
                },
            };
            let _ = events.send(RoutineEvent::Finished { outcome });
        });
        Ok(TokioRoutineHandle { ctrl_tx, join })
    }
}

impl RoutineHandle for TokioRoutineHandle {
    fn request_stop(&self) {
        // The engine may already be gone; that just means it finished.
        let _ = self.ctrl_tx.send(RoutineControl::Cancel);
    }

    async fn await_finished(&mut self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, &mut self.join).await.is_ok()
    }
}
