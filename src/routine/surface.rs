//! Paced automation surface steps.
//!
//! The concrete browser protocol is a collaborator behind this boundary;
//! these functions pace the routine through its steps, report progress on
//! the event channel, and observe the cancellation flag between sub-steps
//! so a stop request is honored within one `step_pause`.

use crate::model::{InfoEvent, RoutineConfig, RoutineEvent, RoutineTask};
use anyhow::{bail, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

pub(crate) async fn login(
    cfg: &RoutineConfig,
    cancel: &AtomicBool,
    event_tx: &UnboundedSender<RoutineEvent>,
) -> Result<()> {
    if cfg.username.is_empty() {
        bail!("no username configured");
    }
    if cfg.password.is_empty() {
        bail!("no password configured");
    }
    info(
        event_tx,
        format!(
            "Logging in `{}` on {} with {}",
            cfg.username,
            cfg.world.label(),
            cfg.browser.label()
        ),
    );
    paced_steps(cfg.step_pause, 3, cancel).await;
    Ok(())
}

pub(crate) async fn cast_protection_spell(
    cfg: &RoutineConfig,
    cancel: &AtomicBool,
    event_tx: &UnboundedSender<RoutineEvent>,
) -> Result<()> {
    let Some(spell) = cfg.protection_spell.as_deref() else {
        bail!("protection spell enabled but no spell name configured");
    };
    info(event_tx, format!("Casting protection spell `{spell}`"));
    paced_steps(cfg.step_pause, 2, cancel).await;
    Ok(())
}

pub(crate) async fn activate_special_skill(
    cfg: &RoutineConfig,
    cancel: &AtomicBool,
    event_tx: &UnboundedSender<RoutineEvent>,
) -> Result<()> {
    info(event_tx, "Activating special skill".to_string());
    paced_steps(cfg.step_pause, 2, cancel).await;
    Ok(())
}

pub(crate) async fn run_task(
    task: RoutineTask,
    cfg: &RoutineConfig,
    cancel: &AtomicBool,
    event_tx: &UnboundedSender<RoutineEvent>,
) -> Result<()> {
    info(event_tx, format!("Task `{}`: travelling", task.label()));
    paced_steps(cfg.step_pause, 2, cancel).await;
    if cancel.load(Ordering::Relaxed) {
        return Ok(());
    }
    info(event_tx, format!("Task `{}`: working", task.label()));
    paced_steps(cfg.step_pause, 4, cancel).await;
    Ok(())
}

pub(crate) async fn logout(
    cfg: &RoutineConfig,
    event_tx: &UnboundedSender<RoutineEvent>,
) -> Result<()> {
    info(event_tx, format!("Logging out `{}`", cfg.username));
    // Logout is not cancellable; it is the cleanup step itself.
    tokio::time::sleep(cfg.step_pause).await;
    Ok(())
}

async fn paced_steps(pause: Duration, steps: u32, cancel: &AtomicBool) {
    for _ in 0..steps {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        tokio::time::sleep(pause).await;
    }
}

fn info(event_tx: &UnboundedSender<RoutineEvent>, message: String) {
    let _ = event_tx.send(RoutineEvent::Info(InfoEvent::Message(message)));
}
