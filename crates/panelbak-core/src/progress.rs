//! Periodic progress readout for a running transfer

use crate::download::{DownloadTask, TransferOutcome};
use panelbak_types::TransferProgress;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Interval between progress lines in the CLI
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(5000);

/// Call `on_tick` every `period` until `task` finishes, then return its outcome
///
/// The first tick fires one full period after the call. Completion is
/// checked ahead of the timer, so no tick is reported once the transfer
/// has been seen to finish.
pub async fn watch_progress<F>(task: &DownloadTask, period: Duration, mut on_tick: F) -> TransferOutcome
where
    F: FnMut(TransferProgress),
{
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let done = task.wait();
    tokio::pin!(done);

    loop {
        tokio::select! {
            biased;
            _ = &mut done => break,
            _ = ticker.tick() => {
                if !task.is_finished() {
                    on_tick(task.progress());
                }
            }
        }
    }

    task.outcome()
}
