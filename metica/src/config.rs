use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use metica_core::session::DeviceInfo;
use metica_core::Value;

use crate::{Client, Result};

/// Configuration for [`Client`].
///
/// # Examples
/// ```no_run
/// # use metica::ClientConfig;
/// let client = ClientConfig::from_api_key("api-key")
///     .app_id("my-game")
///     .user_id("user-1")
///     .to_client()
///     .unwrap();
/// ```
pub struct ClientConfig {
    pub(crate) api_key: String,
    pub(crate) app_id: String,
    pub(crate) user_id: String,
    pub(crate) base_url: String,
    pub(crate) cache_dir: PathBuf,
    pub(crate) device_info: DeviceInfo,
    pub(crate) user_data: HashMap<String, Value>,
    pub(crate) offers_cache_ttl: Duration,
    pub(crate) always_fetch_offers: bool,
    pub(crate) config_default_ttl: Duration,
    pub(crate) display_log_max_entries: usize,
    pub(crate) display_log_persist_interval: Duration,
    pub(crate) max_pending_events: usize,
    pub(crate) event_count_trigger: usize,
    pub(crate) event_time_trigger: Duration,
    pub(crate) event_flush_interval: Duration,
    pub(crate) http_timeout: Duration,
}

impl ClientConfig {
    /// Default base URL for API calls.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.prod.metica.com";

    /// Default freshness of a fetched placement in the offers cache.
    pub const DEFAULT_OFFERS_CACHE_TTL: Duration = Duration::from_secs(60);
    /// Default freshness of a config key when the server response carries no TTL.
    pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(60 * 60);
    /// Default number of display-log entries kept on disk.
    pub const DEFAULT_DISPLAY_LOG_MAX_ENTRIES: usize = 1000;
    /// Default interval between display-log persists.
    pub const DEFAULT_DISPLAY_LOG_PERSIST_INTERVAL: Duration = Duration::from_secs(60);
    /// Default upper bound on queued telemetry events.
    pub const DEFAULT_MAX_PENDING_EVENTS: usize = 256;
    /// Default queue length that triggers an event flush.
    pub const DEFAULT_EVENT_COUNT_TRIGGER: usize = 10;
    /// Default time since the last dispatch attempt that triggers an event flush.
    pub const DEFAULT_EVENT_TIME_TRIGGER: Duration = Duration::from_secs(60);
    /// Default interval of the periodic event flush.
    pub const DEFAULT_EVENT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
    /// Default timeout applied to every HTTP request.
    pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a default Metica configuration using the specified API key.
    ///
    /// ```
    /// # use metica::ClientConfig;
    /// ClientConfig::from_api_key("api-key");
    /// ```
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        ClientConfig {
            api_key: api_key.into(),
            app_id: String::new(),
            user_id: String::new(),
            base_url: ClientConfig::DEFAULT_BASE_URL.to_owned(),
            cache_dir: std::env::temp_dir().join("metica"),
            device_info: DeviceInfo::default(),
            user_data: HashMap::new(),
            offers_cache_ttl: ClientConfig::DEFAULT_OFFERS_CACHE_TTL,
            always_fetch_offers: false,
            config_default_ttl: ClientConfig::DEFAULT_CONFIG_TTL,
            display_log_max_entries: ClientConfig::DEFAULT_DISPLAY_LOG_MAX_ENTRIES,
            display_log_persist_interval: ClientConfig::DEFAULT_DISPLAY_LOG_PERSIST_INTERVAL,
            max_pending_events: ClientConfig::DEFAULT_MAX_PENDING_EVENTS,
            event_count_trigger: ClientConfig::DEFAULT_EVENT_COUNT_TRIGGER,
            event_time_trigger: ClientConfig::DEFAULT_EVENT_TIME_TRIGGER,
            event_flush_interval: ClientConfig::DEFAULT_EVENT_FLUSH_INTERVAL,
            http_timeout: ClientConfig::DEFAULT_HTTP_TIMEOUT,
        }
    }

    /// Set the application identifier offers and config are personalized for.
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Set the identifier of the current user.
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Override base URL for API calls. Clients should use the default setting in most cases.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the directory holding the offers cache, config cache, and display log files. The
    /// directory is created if it does not exist.
    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Describe the device, to be sent with personalization requests.
    pub fn device_info(mut self, device_info: DeviceInfo) -> Self {
        self.device_info = device_info;
        self
    }

    /// Attach application-defined user attributes to personalization requests.
    pub fn user_data(mut self, user_data: HashMap<String, Value>) -> Self {
        self.user_data = user_data;
        self
    }

    /// Override how long fetched offers stay fresh.
    pub fn offers_cache_ttl(mut self, ttl: Duration) -> Self {
        self.offers_cache_ttl = ttl;
        self
    }

    /// Always fetch offers, ignoring fresh cache entries. Meant for development, where stale
    /// offers are worse than extra requests.
    pub fn always_fetch_offers(mut self, always_fetch: bool) -> Self {
        self.always_fetch_offers = always_fetch;
        self
    }

    /// Override the freshness applied to config keys when the server response carries no TTL.
    pub fn config_default_ttl(mut self, ttl: Duration) -> Self {
        self.config_default_ttl = ttl;
        self
    }

    /// Override how many display-log entries are kept on disk.
    pub fn display_log_max_entries(mut self, max_entries: usize) -> Self {
        self.display_log_max_entries = max_entries;
        self
    }

    /// Override the interval between display-log persists.
    pub fn display_log_persist_interval(mut self, interval: Duration) -> Self {
        self.display_log_persist_interval = interval;
        self
    }

    /// Override the upper bound on queued telemetry events. When the queue is full the oldest
    /// event is dropped first.
    pub fn max_pending_events(mut self, max_pending_events: usize) -> Self {
        self.max_pending_events = max_pending_events;
        self
    }

    /// Override the queue length that triggers an event flush.
    pub fn event_count_trigger(mut self, count_trigger: usize) -> Self {
        self.event_count_trigger = count_trigger;
        self
    }

    /// Override the time since the last dispatch attempt that triggers an event flush.
    pub fn event_time_trigger(mut self, time_trigger: Duration) -> Self {
        self.event_time_trigger = time_trigger;
        self
    }

    /// Override the interval of the periodic event flush.
    pub fn event_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.event_flush_interval = flush_interval;
        self
    }

    /// Override the timeout applied to every HTTP request.
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Create a new [`Client`] using the specified configuration.
    ///
    /// ```no_run
    /// # use metica::{ClientConfig, Client};
    /// let client: Client = ClientConfig::from_api_key("api-key").to_client().unwrap();
    /// ```
    pub fn to_client(self) -> Result<Client> {
        Client::new(self)
    }
}
