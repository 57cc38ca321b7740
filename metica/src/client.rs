use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use metica_core::background::{IntervalTask, IntervalTaskConfig};
use metica_core::disk_cache::DiskCache;
use metica_core::display_log::DisplayLog;
use metica_core::events::batcher::EventBatcher;
use metica_core::events::dispatcher::{EventDispatcher, EventDispatcherConfig};
use metica_core::events::PendingEvent;
use metica_core::http::{HttpClient, ReqwestHttpClient};
use metica_core::offers::{Offer, OffersCoordinator, OffersCoordinatorConfig};
use metica_core::remote_config::{RemoteConfigCoordinator, RemoteConfigCoordinatorConfig};
use metica_core::session::SdkSession;
use metica_core::{SystemTimeSource, TimeSource, Value};

use crate::{ClientConfig, Result, SDK_METADATA};

const EVENT_OFFER_IMPRESSION: &'static str = "offerImpression";
const EVENT_OFFER_PURCHASE: &'static str = "offerInAppPurchase";
const EVENT_OFFER_INTERACTION: &'static str = "offerInteraction";

const BACKGROUND_TASK_JITTER: Duration = Duration::from_secs(3);

const OFFERS_CACHE_FILE: &'static str = "offers.json";
const CONFIG_CACHE_FILE: &'static str = "remote_config.json";
const DISPLAY_LOG_FILE: &'static str = "display_log.json";

/// A client for the Metica API.
///
/// In order to create a client instance, first create [`ClientConfig`].
///
/// The client serves offers and remote-config values from disk-backed caches where possible and
/// fetches only what is missing or stale. Telemetry logged through the `log_*` methods is
/// batched in memory and shipped in the background; call [`Client::shutdown`] before exiting to
/// flush what is left.
///
/// # Examples
/// ```no_run
/// # use metica::{Client, ClientConfig};
/// let client = ClientConfig::from_api_key("api-key")
///     .app_id("my-game")
///     .user_id("user-1")
///     .to_client()
///     .unwrap();
/// let offers = client.get_offers(&["shop"]);
/// ```
pub struct Client {
    session: Arc<SdkSession>,
    time_source: Arc<dyn TimeSource>,
    offers: OffersCoordinator,
    remote_config: RemoteConfigCoordinator,
    dispatcher: Arc<EventDispatcher>,
    display_log: Arc<DisplayLog>,
    flush_task: IntervalTask,
    persist_task: IntervalTask,
}

impl Client {
    /// Create a new `Client` using the specified configuration.
    ///
    /// Loads the disk caches eagerly and starts the periodic event-flush and display-log
    /// persist tasks.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`][metica_core::Error::Io] if the cache directory cannot be created
    /// or a background thread fails to start.
    pub fn new(config: ClientConfig) -> Result<Client> {
        fs::create_dir_all(&config.cache_dir)?;

        let time_source: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new(config.http_timeout));
        let session = Arc::new(SdkSession::new(
            config.api_key,
            config.app_id,
            config.user_id,
            config.base_url,
            SDK_METADATA,
            config.device_info,
            config.user_data,
        ));

        let display_log = Arc::new(DisplayLog::prepare(
            config.cache_dir.join(DISPLAY_LOG_FILE),
            config.display_log_max_entries,
            Arc::clone(&time_source),
        ));

        let offers = OffersCoordinator::new(
            Arc::clone(&session),
            Arc::clone(&http),
            Arc::clone(&time_source),
            Arc::clone(&display_log),
            DiskCache::prepare(config.cache_dir.join(OFFERS_CACHE_FILE), Arc::clone(&time_source)),
            OffersCoordinatorConfig {
                cache_ttl: config.offers_cache_ttl,
                always_fetch: config.always_fetch_offers,
            },
        );

        let remote_config = RemoteConfigCoordinator::new(
            Arc::clone(&session),
            Arc::clone(&http),
            DiskCache::prepare(config.cache_dir.join(CONFIG_CACHE_FILE), Arc::clone(&time_source)),
            RemoteConfigCoordinatorConfig {
                default_ttl: config.config_default_ttl,
            },
        );

        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&session),
            Arc::clone(&http),
            Arc::clone(&time_source),
            EventBatcher::new(config.max_pending_events),
            EventDispatcherConfig {
                count_trigger: config.event_count_trigger,
                time_trigger: config.event_time_trigger,
            },
        ));

        let flush_task = {
            let dispatcher = Arc::clone(&dispatcher);
            IntervalTask::start(
                "metica-event-flush-interval",
                IntervalTaskConfig::new(config.event_flush_interval, BACKGROUND_TASK_JITTER),
                move || {
                    if let Err(err) = dispatcher.flush() {
                        log::warn!(target: "metica", "periodic event flush failed: {}", err);
                    }
                },
            )?
        };

        let persist_task = {
            let display_log = Arc::clone(&display_log);
            IntervalTask::start(
                "metica-display-log-persist",
                IntervalTaskConfig::new(config.display_log_persist_interval, BACKGROUND_TASK_JITTER),
                move || {
                    if let Err(err) = display_log.persist() {
                        log::warn!(target: "metica", "periodic display log persist failed: {}", err);
                    }
                },
            )?
        };

        Ok(Client {
            session,
            time_source,
            offers,
            remote_config,
            dispatcher,
            display_log,
            flush_task,
            persist_task,
        })
    }

    /// Get offers for the given placements. An empty slice requests all placements.
    ///
    /// Placements with a fresh cache entry are served without a network call; the rest are
    /// fetched in a single request and merged in. On network failure any cached snapshot (even
    /// a stale one) is returned instead of an error; the error surfaces only when nothing can
    /// be served at all.
    pub fn get_offers(&self, placement_ids: &[&str]) -> Result<HashMap<String, Vec<Offer>>> {
        self.offers.get_offers(placement_ids)
    }

    /// Get remote-config values for the given keys, or all keys when `None`.
    ///
    /// Keys with a fresh cache entry are served without a network call; the rest are fetched in
    /// a single request. On network failure whatever resolved from cache is still returned; the
    /// error surfaces only when nothing resolved at all.
    pub fn get_configs(&self, keys: Option<&[&str]>) -> Result<HashMap<String, Value>> {
        self.remote_config.get_configs(keys)
    }

    /// Log that `offer_id` was displayed to the user in `placement_id`.
    pub fn log_offer_display(&self, offer_id: &str, placement_id: &str) {
        self.log_offer_event(EVENT_OFFER_IMPRESSION, offer_id, placement_id, HashMap::new());
    }

    /// Log that the user purchased `offer_id`, paying `total_amount` in `currency_code`.
    pub fn log_offer_purchase(
        &self,
        offer_id: &str,
        placement_id: &str,
        total_amount: f64,
        currency_code: &str,
    ) {
        let fields = [
            ("totalAmount".to_owned(), total_amount.into()),
            ("currencyCode".to_owned(), currency_code.into()),
        ]
        .into_iter()
        .collect();
        self.log_offer_event(EVENT_OFFER_PURCHASE, offer_id, placement_id, fields);
    }

    /// Log a user interaction with `offer_id` (button tap, dismissal, and so on).
    pub fn log_offer_interaction(&self, offer_id: &str, placement_id: &str, interaction_type: &str) {
        let fields = [("interactionType".to_owned(), interaction_type.into())]
            .into_iter()
            .collect();
        self.log_offer_event(EVENT_OFFER_INTERACTION, offer_id, placement_id, fields);
    }

    /// Log an application-defined event carrying a custom payload.
    pub fn log_custom_event(&self, event_type: &str, custom_payload: HashMap<String, Value>) {
        let fields = [("customPayload".to_owned(), Value::Object(custom_payload))]
            .into_iter()
            .collect();
        self.dispatch(event_type, fields);
    }

    /// Flush any queued telemetry events now.
    ///
    /// Queued events are otherwise dispatched when a count or time trigger fires, or by the
    /// periodic flush. Delivery is best-effort: a failed batch is dropped, not retried.
    pub fn flush_events(&self) -> Result<()> {
        self.dispatcher.flush()
    }

    /// Shut the client down: stop the background tasks, flush remaining events, and persist
    /// the display log.
    ///
    /// All steps run regardless of individual failures; the first error is returned.
    pub fn shutdown(self) -> Result<()> {
        self.flush_task.stop();
        self.persist_task.stop();

        let mut result = Ok(());
        if let Err(err) = self.dispatcher.flush() {
            log::warn!(target: "metica", "final event flush failed: {}", err);
            result = result.and(Err(err));
        }
        if let Err(err) = self.display_log.persist() {
            log::warn!(target: "metica", "final display log persist failed: {}", err);
            result = result.and(Err(err));
        }
        result = result.and(self.flush_task.shutdown());
        result.and(self.persist_task.shutdown())
    }

    fn log_offer_event(
        &self,
        event_type: &str,
        offer_id: &str,
        placement_id: &str,
        mut fields: HashMap<String, Value>,
    ) {
        fields.insert("offerId".to_owned(), offer_id.into());
        fields.insert("placementId".to_owned(), placement_id.into());
        // Attach the variant recorded when the offer was displayed, so the event stays tied to
        // the attribution data the backend served.
        if let Some(entry) = self.display_log.entries_for_offer(offer_id).last() {
            fields.insert("variantId".to_owned(), entry.offer_variant_id.as_str().into());
        }
        self.dispatch(event_type, fields);
    }

    fn dispatch(&self, event_type: &str, fields: HashMap<String, Value>) {
        let event = PendingEvent::new(
            &self.session,
            event_type,
            self.time_source.epoch_seconds(),
            fields,
        );
        log::trace!(target: "metica", event:serde; "logging event");
        self.dispatcher.dispatch(event);
    }
}

#[cfg(test)]
mod tests {
    use crate::ClientConfig;

    #[test]
    fn construction_prepares_the_cache_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("metica");

        let client = ClientConfig::from_api_key("api-key")
            .app_id("app")
            .user_id("user")
            .cache_dir(&cache_dir)
            .to_client()
            .unwrap();

        assert!(cache_dir.is_dir());
        client.shutdown().unwrap();
    }

    #[test]
    fn shutdown_with_nothing_queued_issues_no_requests() {
        let dir = tempfile::tempdir().unwrap();

        let client = ClientConfig::from_api_key("api-key")
            .app_id("app")
            .user_id("user")
            .cache_dir(dir.path().join("metica"))
            .to_client()
            .unwrap();

        // An empty event queue makes the final flush a no-op, so shutdown never touches the
        // network and cannot fail on it.
        client.shutdown().unwrap();
    }
}
