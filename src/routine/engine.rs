//! Phase sequencing for one routine run.

use super::surface;
use crate::model::{InfoEvent, RoutineConfig, RoutineEvent, RoutineOutcome, RoutinePhase};
use anyhow::Result;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub(crate) enum RoutineControl {
    /// Cancel the run at the next safe point.
    Cancel,
}

pub(crate) struct RoutineEngine {
    cfg: RoutineConfig,
}

impl RoutineEngine {
    pub fn new(cfg: RoutineConfig) -> Self {
        Self { cfg }
    }

    pub async fn run(
        self,
        event_tx: mpsc::UnboundedSender<RoutineEvent>,
        mut control_rx: mpsc::UnboundedReceiver<RoutineControl>,
    ) -> Result<RoutineOutcome> {
        let cancel = Arc::new(AtomicBool::new(false));

        // Control listener.
        let cancel2 = cancel.clone();
        let control_handle = tokio::spawn(async move {
            while let Some(msg) = control_rx.recv().await {
                match msg {
                    RoutineControl::Cancel => {
                        cancel2.store(true, Ordering::Relaxed);
                        break;
                    }
                }
            }
        });

        let outcome = self.run_phases(&event_tx, &cancel).await;

        // Abort the control listener task before returning; dropping a
        // JoinHandle does not cancel it, and it would otherwise sit on
        // control_rx.recv() forever.
        control_handle.abort();

        outcome
    }

    async fn run_phases(
        &self,
        event_tx: &mpsc::UnboundedSender<RoutineEvent>,
        cancel: &Arc<AtomicBool>,
    ) -> Result<RoutineOutcome> {
        let cancelled = || cancel.load(Ordering::Relaxed);

        if let Some(path) = &self.cfg.driver_path {
            let _ = event_tx.send(RoutineEvent::Info(InfoEvent::UsingDriver {
                browser: self.cfg.browser,
                path: path.clone(),
            }));
        }
        if let Some(path) = &self.cfg.binary_path {
            let _ = event_tx.send(RoutineEvent::Info(InfoEvent::UsingBinary {
                path: path.clone(),
            }));
        }

        let _ = event_tx.send(RoutineEvent::PhaseStarted {
            phase: RoutinePhase::Login,
        });
        surface::login(&self.cfg, cancel, event_tx).await?;

        if !cancelled() && self.cfg.use_protection_spell {
            let _ = event_tx.send(RoutineEvent::PhaseStarted {
                phase: RoutinePhase::ProtectionSpell,
            });
            surface::cast_protection_spell(&self.cfg, cancel, event_tx).await?;
        }

        if !cancelled() && self.cfg.use_special_skill {
            let _ = event_tx.send(RoutineEvent::PhaseStarted {
                phase: RoutinePhase::SpecialSkill,
            });
            surface::activate_special_skill(&self.cfg, cancel, event_tx).await?;
        }

        let _ = event_tx.send(RoutineEvent::Info(InfoEvent::MoveRestriction {
            options: self.cfg.move_options.iter().copied().collect(),
        }));

        let mut tasks_run = 0u32;
        for task in &self.cfg.tasks {
            if cancelled() {
                break;
            }
            let _ = event_tx.send(RoutineEvent::PhaseStarted {
                phase: RoutinePhase::Task(*task),
            });
            surface::run_task(*task, &self.cfg, cancel, event_tx).await?;
            if !cancelled() {
                tasks_run += 1;
            }
        }

        // Always try to leave the session cleanly, even after a cancel.
        let _ = event_tx.send(RoutineEvent::PhaseStarted {
            phase: RoutinePhase::Logout,
        });
        surface::logout(&self.cfg, event_tx).await?;

        if cancelled() {
            Ok(RoutineOutcome::Cancelled)
        } else {
            Ok(RoutineOutcome::Completed { tasks_run })
        }
    }
}
