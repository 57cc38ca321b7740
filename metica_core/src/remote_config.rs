//! Remote-config values with fine-grained per-key caching.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;

use crate::disk_cache::DiskCache;
use crate::http::HttpClient;
use crate::session::SdkSession;
use crate::{Result, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigResponse {
    #[serde(default)]
    configs: HashMap<String, Value>,
    /// Server-assigned freshness for every key in this response.
    ttl_seconds: Option<i64>,
}

/// Tuning for [`RemoteConfigCoordinator`].
#[derive(Debug, Clone)]
pub struct RemoteConfigCoordinatorConfig {
    /// Freshness applied when the server response carries no TTL.
    pub default_ttl: Duration,
}

/// Serves "get config for these keys" requests with per-key TTL caching.
///
/// Each key is cached independently under a `cfg-{appId}-{userId}-{key}` identifier, with the
/// TTL assigned by the server response that delivered it. A request for several keys fetches
/// only the missing or stale subset and merges the rest from cache.
pub struct RemoteConfigCoordinator {
    session: Arc<SdkSession>,
    http: Arc<dyn HttpClient>,
    cache: Mutex<DiskCache<Value>>,
    config: RemoteConfigCoordinatorConfig,
}

impl RemoteConfigCoordinator {
    /// Create a new coordinator around a prepared cache.
    pub fn new(
        session: Arc<SdkSession>,
        http: Arc<dyn HttpClient>,
        cache: DiskCache<Value>,
        config: RemoteConfigCoordinatorConfig,
    ) -> RemoteConfigCoordinator {
        RemoteConfigCoordinator {
            session,
            http,
            cache: Mutex::new(cache),
            config,
        }
    }

    /// Get config values for `keys`, or all keys when `None`.
    ///
    /// A get-all always fetches: a per-key cache cannot tell whether it holds every key the
    /// server knows. On fetch failure, whatever resolved from cache is still returned; the
    /// error is surfaced only if nothing at all could be resolved.
    pub fn get_configs(&self, keys: Option<&[&str]>) -> Result<HashMap<String, Value>> {
        let mut resolved: HashMap<String, Value> = HashMap::new();
        let mut pending: Vec<&str> = Vec::new();

        if let Some(keys) = keys {
            let cache = self.cache.lock().unwrap();
            for &key in keys {
                match cache.read(&self.session.config_cache_key(key)) {
                    Some(value) => {
                        resolved.insert(key.to_owned(), value);
                    }
                    None => pending.push(key),
                }
            }
            if pending.is_empty() {
                log::debug!(target: "metica", "all requested config keys served from cache");
                return Ok(resolved);
            }
        }

        match self.fetch(&pending) {
            Ok(fetched) => {
                resolved.extend(fetched);
                Ok(resolved)
            }
            Err(err) => {
                log::warn!(target: "metica", "config fetch failed: {}; serving cached subset", err);
                if resolved.is_empty() {
                    Err(err)
                } else {
                    Ok(resolved)
                }
            }
        }
    }

    /// Fetch `keys` (empty means all) and write them back with the server-supplied TTL.
    fn fetch(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let headers = self.session.request_headers()?;
        let url = self.session.configs_url(keys)?;
        let body = self.session.personalization_body()?;

        let response = self.http.post(url, &body, &headers)?;
        let response: ConfigResponse = serde_json::from_value(response)?;
        log::debug!(target: "metica", "successfully fetched {} config keys", response.configs.len());

        let ttl_seconds = response
            .ttl_seconds
            .unwrap_or(self.config.default_ttl.as_secs() as i64);
        let mut cache = self.cache.lock().unwrap();
        for (key, value) in &response.configs {
            cache.write(self.session.config_cache_key(key), value.clone(), ttl_seconds)?;
        }

        Ok(response.configs)
    }
}
