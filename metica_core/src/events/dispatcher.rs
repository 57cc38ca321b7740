//! Trigger evaluation and batched delivery of pending events.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;

use super::batcher::EventBatcher;
use super::PendingEvent;
use crate::http::HttpClient;
use crate::session::SdkSession;
use crate::timesource::TimeSource;
use crate::Result;

#[derive(Serialize)]
struct IngestRequest<'a> {
    events: &'a [PendingEvent],
}

/// Tuning for [`EventDispatcher`].
#[derive(Debug, Clone)]
pub struct EventDispatcherConfig {
    /// Queue length at which a flush is started.
    pub count_trigger: usize,
    /// Time since the last dispatch attempt after which a flush is started.
    pub time_trigger: Duration,
}

/// Accumulates events and dispatches them in batches.
///
/// [`EventDispatcher::dispatch`] enqueues the event and, when a trigger condition is met,
/// starts a flush on a background thread so the caller is never blocked. At most one background
/// flush runs at a time.
///
/// Delivery is at-most-once: a batch is consumed by its flush attempt whether or not the
/// request succeeds, and failed batches are not re-queued.
pub struct EventDispatcher {
    session: Arc<SdkSession>,
    http: Arc<dyn HttpClient>,
    time_source: Arc<dyn TimeSource>,
    batcher: EventBatcher,
    config: EventDispatcherConfig,
    /// Epoch seconds of the last dispatch attempt, success or failure. Keeps the time trigger
    /// from firing continuously during an outage.
    last_attempt: Arc<Mutex<i64>>,
    flush_task_active: Arc<Mutex<bool>>,
}

impl EventDispatcher {
    /// Create a dispatcher draining `batcher`.
    pub fn new(
        session: Arc<SdkSession>,
        http: Arc<dyn HttpClient>,
        time_source: Arc<dyn TimeSource>,
        batcher: EventBatcher,
        config: EventDispatcherConfig,
    ) -> EventDispatcher {
        let now = time_source.epoch_seconds();
        EventDispatcher {
            session,
            http,
            time_source,
            batcher,
            config,
            last_attempt: Arc::new(Mutex::new(now)),
            flush_task_active: Arc::new(Mutex::new(false)),
        }
    }

    /// Enqueue `event` and start a background flush if a trigger condition is met.
    pub fn dispatch(&self, event: PendingEvent) {
        self.batcher.push(event);

        if self.triggers_met() {
            self.start_background_flush();
        }
    }

    /// Flush queued events in one request.
    ///
    /// An empty queue is a no-op and issues no request. Otherwise the whole queue is swapped
    /// out and posted as a single `{ events: [...] }` batch, newest event first.
    pub fn flush(&self) -> Result<()> {
        flush_batch(
            &self.session,
            &self.http,
            &self.time_source,
            &self.batcher,
            &self.last_attempt,
        )
    }

    fn triggers_met(&self) -> bool {
        if self.batcher.len() >= self.config.count_trigger {
            return true;
        }
        let now = self.time_source.epoch_seconds();
        let last_attempt = *self.last_attempt.lock().unwrap();
        now - last_attempt >= self.config.time_trigger.as_secs() as i64
    }

    fn start_background_flush(&self) {
        {
            let mut active = self.flush_task_active.lock().unwrap();
            if *active {
                // A flush is already in flight; whatever was enqueued meanwhile goes into the
                // next batch.
                return;
            }
            *active = true;
        }

        // Cloning the shared pieces for move into the flush thread.
        let session = Arc::clone(&self.session);
        let http = Arc::clone(&self.http);
        let time_source = Arc::clone(&self.time_source);
        let batcher = self.batcher.clone();
        let last_attempt = Arc::clone(&self.last_attempt);
        let active_flag = Arc::clone(&self.flush_task_active);

        let spawned = std::thread::Builder::new()
            .name("metica-event-flush".to_owned())
            .spawn(move || {
                let result = flush_batch(&session, &http, &time_source, &batcher, &last_attempt);
                if let Err(err) = result {
                    log::warn!(target: "metica", "background event flush failed: {}", err);
                }
                *active_flag.lock().unwrap() = false;
            });

        if let Err(err) = spawned {
            log::warn!(target: "metica", "failed to start event flush thread: {}", err);
            *self.flush_task_active.lock().unwrap() = false;
        }
    }
}

/// Flush the queue in one request. A free function so the background thread can run it without
/// holding the dispatcher itself.
fn flush_batch(
    session: &SdkSession,
    http: &Arc<dyn HttpClient>,
    time_source: &Arc<dyn TimeSource>,
    batcher: &EventBatcher,
    last_attempt: &Mutex<i64>,
) -> Result<()> {
    if batcher.is_empty() {
        return Ok(());
    }

    let batch = batcher.take_batch();
    let result = send_batch(session, http, &batch);
    // Success or failure, this was an attempt.
    *last_attempt.lock().unwrap() = time_source.epoch_seconds();

    if let Err(err) = &result {
        log::warn!(
            target: "metica",
            "dropping batch of {} events after failed dispatch: {}",
            batch.len(),
            err
        );
    }
    result
}

fn send_batch(session: &SdkSession, http: &Arc<dyn HttpClient>, batch: &[PendingEvent]) -> Result<()> {
    let headers = session.request_headers()?;
    let url = session.events_url()?;
    let body = serde_json::to_value(IngestRequest { events: batch })?;

    log::trace!(target: "metica", batch_size = batch.len(); "dispatching events");
    http.post(url, &body, &headers)?;
    Ok(())
}
