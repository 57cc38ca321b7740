//! Background interval tasks: named threads running a closure on a jittered period.
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use rand::{thread_rng, Rng};

use crate::{Error, Result};

/// Configuration for [`IntervalTask`].
// Not implementing `Copy` as we may add non-copyable fields in the future.
#[derive(Debug, Clone)]
pub struct IntervalTaskConfig {
    /// Interval to wait between runs of the task.
    pub interval: Duration,
    /// Jitter applies a randomized reduction to the wait between runs. This helps to avoid
    /// multiple clients synchronizing and producing spiky load.
    pub jitter: Duration,
}

impl IntervalTaskConfig {
    /// Create a config with the given interval and jitter.
    pub fn new(interval: Duration, jitter: Duration) -> IntervalTaskConfig {
        IntervalTaskConfig { interval, jitter }
    }
}

/// A background thread running a task periodically.
///
/// Drives the periodic event flush and display-log persist. The thread sleeps first and runs
/// the task after each (jittered) interval, until stopped.
pub struct IntervalTask {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the task thread.
    stop_sender: std::sync::mpsc::SyncSender<()>,
}

impl IntervalTask {
    /// Spawn a thread named `name` running `task` every `config.interval`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the thread failed to start.
    pub fn start(
        name: &str,
        config: IntervalTaskConfig,
        mut task: impl FnMut() + Send + 'static,
    ) -> std::io::Result<IntervalTask> {
        // Using `sync_channel` here as it makes `stop_sender` `Sync` (shareable between
        // threads). Buffer size of 1 is enough for our use case: if the buffer is full,
        // another thread has sent a stop command already and we can simply `try_send()` and
        // ignore the error.
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);

        let join_handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || loop {
                let timeout = jittered(config.interval, config.jitter);
                match stop_receiver.recv_timeout(timeout) {
                    Err(RecvTimeoutError::Timeout) => {
                        // Timed out. Run the task and loop back to wait again.
                        task();
                    }
                    Ok(()) => {
                        log::debug!(target: "metica", "interval task received stop command");
                        return;
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        // When the other end of the channel disconnects, calls to
                        // .recv_timeout() return immediately. Stop the thread.
                        log::debug!(target: "metica", "interval task channel disconnected");
                        return;
                    }
                }
            })?;

        Ok(IntervalTask {
            join_handle,
            stop_sender,
        })
    }

    /// Signal the task to stop.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        // Error means that the receiver was dropped (thread exited) or the channel buffer is
        // full (another thread already sent a stop command). Both can be ignored.
        let _ = self.stop_sender.try_send(());
    }

    /// Stop the task and block waiting for the thread to exit.
    ///
    /// If you don't need to wait for the thread to exit, use [`IntervalTask::stop`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackgroundTaskPanicked`] if the task panicked.
    pub fn shutdown(self) -> Result<()> {
        // Send stop signal in case it wasn't sent before.
        self.stop();

        self.join_handle
            .join()
            .map_err(|_| Error::BackgroundTaskPanicked)?;

        Ok(())
    }
}

/// Apply randomized `jitter` to `interval`.
fn jittered(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::{IntervalTask, IntervalTaskConfig};

    #[test]
    fn jitter_is_subtractive() {
        let interval = Duration::from_secs(30);
        let jitter = Duration::from_secs(30);

        let result = super::jittered(interval, jitter);

        assert!(result <= interval, "{result:?} must be <= {interval:?}");
    }

    #[test]
    fn jitter_truncates_to_zero() {
        let interval = Duration::ZERO;
        let jitter = Duration::from_secs(30);

        let result = super::jittered(interval, jitter);

        assert_eq!(result, Duration::ZERO);
    }

    #[test]
    fn jitter_works_with_zero_jitter() {
        let interval = Duration::from_secs(30);
        let jitter = Duration::ZERO;

        let result = super::jittered(interval, jitter);

        assert_eq!(result, Duration::from_secs(30));
    }

    #[test]
    fn task_runs_repeatedly_until_shutdown() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task_runs = Arc::clone(&runs);

        let task = IntervalTask::start(
            "test-interval",
            IntervalTaskConfig::new(Duration::from_millis(5), Duration::ZERO),
            move || {
                task_runs.fetch_add(1, Ordering::SeqCst);
            },
        )
        .unwrap();

        while runs.load(Ordering::SeqCst) < 2 {
            std::thread::sleep(Duration::from_millis(5));
        }
        task.shutdown().unwrap();
    }

    #[test]
    fn shutdown_does_not_wait_for_the_next_interval() {
        let task = IntervalTask::start(
            "test-idle",
            IntervalTaskConfig::new(Duration::from_secs(3600), Duration::ZERO),
            || {},
        )
        .unwrap();

        // Returns promptly even though the first run is an hour away.
        task.shutdown().unwrap();
    }
}
