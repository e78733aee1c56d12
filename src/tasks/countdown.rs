use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::services::attempt::{AttemptController, FinalizeOutcome, TickResult};

const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Owns the countdown task. Stopping or dropping the handle ends the loop
/// at its next wake-up; a finalize already under way is allowed to finish.
#[derive(Debug)]
pub struct CountdownHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl CountdownHandle {
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                tracing::error!(error = %err, "Countdown task join failed");
            }
        }
    }
}

impl Drop for CountdownHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Ticks the attempt once per second until it leaves `InProgress`.
pub fn spawn_countdown(controller: AttemptController) -> CountdownHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run(controller, shutdown_rx));
    CountdownHandle { shutdown, task: Some(task) }
}

async fn run(controller: AttemptController, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = interval(TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        match controller.tick().await {
            TickResult::Running(_) => {}
            TickResult::Finalized(outcome) => {
                match &outcome {
                    FinalizeOutcome::Submitted(report) => {
                        tracing::info!(attempt_id = %report.attempt_id, "Countdown finalized attempt");
                    }
                    FinalizeOutcome::RetryableFailure { attempt_id, error } => {
                        tracing::warn!(attempt_id = %attempt_id, error = %error, "Countdown finalize needs retry");
                    }
                    FinalizeOutcome::FatalFailure(report) => {
                        tracing::error!(attempt_id = %report.attempt_id, "Countdown finalize rejected");
                    }
                    FinalizeOutcome::Abandoned => {}
                }
                break;
            }
            TickResult::Untimed | TickResult::Inactive => break,
        }
    }

    tracing::debug!("Countdown stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::repositories::attempts::MemoryAttemptRepository;
    use crate::services::attempt::{AttemptOptions, AttemptPhase};
    use crate::test_support::{fixtures, RecordingBackend, TokioClock};

    fn controller() -> AttemptController {
        AttemptController::new(
            "student-1",
            Arc::new(RecordingBackend::default()),
            Arc::new(MemoryAttemptRepository::new()),
            Arc::new(TokioClock::new(fixtures::t0())),
            AttemptOptions::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn exits_immediately_for_untimed_attempts() {
        let controller = controller();
        controller.begin(fixtures::open_ended_assignment()).await.expect("begin");
        controller.agree().await.expect("agree");

        let handle = spawn_countdown(controller.clone());
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(handle.is_finished());
        assert_eq!(controller.phase().await, AttemptPhase::InProgress);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_attempt_is_abandoned() {
        let controller = controller();
        controller.begin(fixtures::multi_answer_cat(1)).await.expect("begin");
        controller.agree().await.expect("agree");

        let handle = spawn_countdown(controller.clone());
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert!(!handle.is_finished());

        controller.abandon().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_ends_the_task() {
        let controller = controller();
        controller.begin(fixtures::multi_answer_cat(1)).await.expect("begin");
        controller.agree().await.expect("agree");

        let handle = spawn_countdown(controller.clone());
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        drop(handle);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(controller.view().remaining_seconds, Some(59));
    }
}
