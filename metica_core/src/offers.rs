//! Offer models and the coordinator serving "get offers for these placements" requests.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::disk_cache::DiskCache;
use crate::display_log::{DisplayLog, DisplayLogEntry};
use crate::http::HttpClient;
use crate::session::SdkSession;
use crate::timesource::TimeSource;
use crate::{Result, Value};

/// A rule capping how many times an offer may be shown within a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayLimit {
    /// Length of the trailing window, in hours.
    pub time_window_hours: u64,
    /// Maximum number of displays allowed within the window.
    pub max_display_count: u64,
}

/// Attribution attributes describing the offer variant served to the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferAttributes {
    /// Offer identifier as known to the attribution pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,
    /// Identifier of the served offer variant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
    /// Identifier of the bundle the offer belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_id: Option<String>,
}

/// Attribution metadata attached to an offer's impression metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeticaAttributes {
    /// Attribution attributes of the offer itself.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer: Option<OfferAttributes>,
}

/// The impression metric of an offer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMetric {
    /// Attribution data tying impressions to the analytics events built later.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metica_attributes: Option<MeticaAttributes>,
}

/// Metrics block of an offer. Only the display metric is read by the SDK.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferMetrics {
    /// Impression metric.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<DisplayMetric>,
}

/// An item granted by an offer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferItem {
    /// Identifier of the granted item.
    pub item_id: String,
    /// Granted quantity.
    pub quantity: f64,
}

/// A priced bundle/promotion the backend may serve for a placement.
///
/// Offers are produced by the backend and treated as immutable by the SDK. The SDK acts on
/// `offer_id`, `display_limits`, and the attribution chain under `metrics`; the remaining
/// business fields are passed through to the application untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    /// Stable identity of the offer.
    pub offer_id: String,
    /// Display-frequency limits. Absent means unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_limits: Option<Vec<DisplayLimit>>,
    /// Metrics carrying impression attribution metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<OfferMetrics>,
    /// Price of the offer, in `currency_code` units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// ISO-4217 currency code for `price`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_code: Option<String>,
    /// Items granted on purchase.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<OfferItem>,
    /// Free-form payload forwarded to the application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_payload: Option<Value>,
}

impl Offer {
    /// Variant id from the impression attribution chain
    /// (`metrics.display.meticaAttributes.offer.variantId`).
    ///
    /// Display-log entries must carry this exact value so display bookkeeping stays tied to the
    /// attribution data used by the analytics events.
    pub fn variant_id(&self) -> Option<&str> {
        self.metrics
            .as_ref()?
            .display
            .as_ref()?
            .metica_attributes
            .as_ref()?
            .offer
            .as_ref()?
            .variant_id
            .as_deref()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OffersResponse {
    #[serde(default)]
    placements: HashMap<String, Vec<Offer>>,
}

/// Tuning for [`OffersCoordinator`].
#[derive(Debug, Clone)]
pub struct OffersCoordinatorConfig {
    /// How long a fetched placement stays fresh in the cache.
    pub cache_ttl: Duration,
    /// Skip the fresh-cache short circuit and always fetch. Meant for development contexts
    /// where stale offers are worse than extra requests.
    pub always_fetch: bool,
}

/// Serves offer requests, minimizing network calls through a per-placement cache, and feeds the
/// display log.
///
/// The cache is keyed by placement id, so a request for several placements fetches only the
/// missing or stale ones and merges the rest from cache. Fetched placement lists are stored
/// unfiltered; display-limit filtering is applied to the fetch result before it is returned,
/// and every offer surviving the filter is recorded as displayed.
pub struct OffersCoordinator {
    session: Arc<SdkSession>,
    http: Arc<dyn HttpClient>,
    time_source: Arc<dyn TimeSource>,
    display_log: Arc<DisplayLog>,
    cache: Mutex<DiskCache<Vec<Offer>>>,
    config: OffersCoordinatorConfig,
}

impl OffersCoordinator {
    /// Create a new coordinator around a prepared cache.
    pub fn new(
        session: Arc<SdkSession>,
        http: Arc<dyn HttpClient>,
        time_source: Arc<dyn TimeSource>,
        display_log: Arc<DisplayLog>,
        cache: DiskCache<Vec<Offer>>,
        config: OffersCoordinatorConfig,
    ) -> OffersCoordinator {
        OffersCoordinator {
            session,
            http,
            time_source,
            display_log,
            cache: Mutex::new(cache),
            config,
        }
    }

    /// Get offers for the requested placements. An empty slice means all placements, which
    /// always fetches since a per-placement cache cannot enumerate "all".
    ///
    /// On fetch failure, stale cache snapshots are served for the placements that have them;
    /// the error is surfaced only if nothing at all can be served.
    pub fn get_offers(&self, placement_ids: &[&str]) -> Result<HashMap<String, Vec<Offer>>> {
        let mut resolved: HashMap<String, Vec<Offer>> = HashMap::new();
        let mut pending: Vec<&str> = Vec::new();

        if placement_ids.is_empty() {
            log::debug!(target: "metica", "fetching offers for all placements");
        } else {
            let cache = self.cache.lock().unwrap();
            for &placement in placement_ids {
                let cached = if self.config.always_fetch {
                    None
                } else {
                    cache.read(placement)
                };
                match cached {
                    Some(offers) => {
                        resolved.insert(placement.to_owned(), offers);
                    }
                    None => pending.push(placement),
                }
            }
            if pending.is_empty() {
                log::debug!(target: "metica", "all requested placements served from cache");
                return Ok(resolved);
            }
        }

        match self.fetch(&pending) {
            Ok(fetched) => {
                resolved.extend(fetched);
                Ok(resolved)
            }
            Err(err) => {
                log::warn!(target: "metica", "offers fetch failed: {}; serving cached snapshots", err);
                let cache = self.cache.lock().unwrap();
                if placement_ids.is_empty() {
                    resolved.extend(cache.stale_snapshot());
                } else {
                    for &placement in &pending {
                        if let Some(offers) = cache.read_stale(placement) {
                            resolved.insert(placement.to_owned(), offers);
                        }
                    }
                }
                if resolved.is_empty() {
                    Err(err)
                } else {
                    Ok(resolved)
                }
            }
        }
    }

    /// Fetch `placements` (empty means all) and record surviving offers as displayed.
    fn fetch(&self, placements: &[&str]) -> Result<HashMap<String, Vec<Offer>>> {
        let headers = self.session.request_headers()?;
        let url = self.session.offers_url(placements)?;
        let body = self.session.personalization_body()?;

        let response = self.http.post(url, &body, &headers)?;
        let response: OffersResponse = serde_json::from_value(response)?;
        log::debug!(target: "metica", "successfully fetched offers for {} placements", response.placements.len());

        let ttl_seconds = self.config.cache_ttl.as_secs() as i64;
        let now = self.time_source.epoch_seconds();
        let mut result = HashMap::new();
        let mut new_entries = Vec::new();
        // De-duplicates display records within this response: an offer served in several
        // placements at once is recorded once.
        let mut recorded: HashSet<String> = HashSet::new();

        let mut cache = self.cache.lock().unwrap();
        for (placement, offers) in response.placements {
            // The cache stores the unfiltered server list.
            cache.write(placement.clone(), offers.clone(), ttl_seconds)?;

            let surviving = self.display_log.filter_offers(&offers);
            for offer in &surviving {
                if recorded.insert(offer.offer_id.clone()) {
                    new_entries.push(DisplayLogEntry {
                        displayed_on: now,
                        offer_id: offer.offer_id.clone(),
                        offer_variant_id: offer.variant_id().unwrap_or_default().to_owned(),
                        placement_id: placement.clone(),
                    });
                }
            }
            result.insert(placement, surviving);
        }
        self.display_log.append_entries(new_entries);

        Ok(result)
    }
}


#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use super::{Offer, OffersCoordinator, OffersCoordinatorConfig};
    use crate::disk_cache::DiskCache;
    use crate::display_log::DisplayLog;
    use crate::http::{HttpClient, MockHttpClient};
    use crate::session::{DeviceInfo, SdkSession};
    use crate::timesource::{FakeTimeSource, TimeSource};
    use crate::{Error, SdkMetadata};

    struct Fixture {
        clock: Arc<FakeTimeSource>,
        http: Arc<MockHttpClient>,
        display_log: Arc<DisplayLog>,
        coordinator: OffersCoordinator,
        _dir: tempfile::TempDir,
    }

    fn fixture(always_fetch: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let clock = Arc::new(FakeTimeSource::new(100_000));
        let time_source: Arc<dyn TimeSource> = clock.clone();
        let http = Arc::new(MockHttpClient::new());
        let session = Arc::new(SdkSession::new(
            "key",
            "app",
            "user",
            "https://api.example.com",
            SdkMetadata {
                name: "rust",
                version: "0.0.0",
            },
            DeviceInfo::default(),
            HashMap::new(),
        ));
        let display_log = Arc::new(DisplayLog::prepare(
            dir.path().join("display_log.json"),
            100,
            Arc::clone(&time_source),
        ));
        let cache = DiskCache::prepare(dir.path().join("offers.json"), Arc::clone(&time_source));
        let http_client: Arc<dyn HttpClient> = http.clone();
        let coordinator = OffersCoordinator::new(
            session,
            http_client,
            time_source,
            Arc::clone(&display_log),
            cache,
            OffersCoordinatorConfig {
                cache_ttl: Duration::from_secs(60),
                always_fetch,
            },
        );

        Fixture {
            clock,
            http,
            display_log,
            coordinator,
            _dir: dir,
        }
    }

    fn offer_json(id: &str, variant: &str) -> serde_json::Value {
        json!({
            "offerId": id,
            "price": 4.99,
            "currencyCode": "USD",
            "metrics": {
                "display": {
                    "meticaAttributes": { "offer": { "offerId": id, "variantId": variant } }
                }
            }
        })
    }

    fn offer_ids(offers: &[Offer]) -> Vec<&str> {
        offers.iter().map(|offer| offer.offer_id.as_str()).collect()
    }

    #[test]
    fn fresh_cache_hit_skips_network() {
        let fixture = fixture(false);
        fixture.http.enqueue(Ok(json!({
            "placements": { "shop": [offer_json("o1", "v1")] }
        })));

        let first = fixture.coordinator.get_offers(&["shop"]).unwrap();
        let second = fixture.coordinator.get_offers(&["shop"]).unwrap();

        assert_eq!(fixture.http.requests().len(), 1);
        assert_eq!(offer_ids(&first["shop"]), ["o1"]);
        assert_eq!(offer_ids(&second["shop"]), ["o1"]);
    }

    #[test]
    fn fetches_only_missing_placements() {
        let fixture = fixture(false);
        fixture.http.enqueue(Ok(json!({
            "placements": { "shop": [offer_json("o1", "v1")] }
        })));
        fixture.coordinator.get_offers(&["shop"]).unwrap();

        fixture.http.enqueue(Ok(json!({
            "placements": { "lobby": [offer_json("o2", "v1")] }
        })));
        let merged = fixture.coordinator.get_offers(&["shop", "lobby"]).unwrap();

        let requests = fixture.http.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].url.query(),
            Some("placements=lobby"),
            "only the missing placement should be fetched"
        );
        assert_eq!(offer_ids(&merged["shop"]), ["o1"]);
        assert_eq!(offer_ids(&merged["lobby"]), ["o2"]);
    }

    #[test]
    fn request_carries_personalization_body() {
        let fixture = fixture(false);
        fixture.http.enqueue(Ok(json!({ "placements": {} })));

        fixture.coordinator.get_offers(&["shop"]).unwrap();

        let requests = fixture.http.requests();
        let body = requests[0].body.as_ref().unwrap();
        assert_eq!(body["userId"], "user");
        assert!(body.get("deviceInfo").is_some());
        assert!(body.get("userData").is_some());
    }

    #[test]
    fn stale_cache_is_served_when_fetch_fails() {
        let fixture = fixture(false);
        fixture.http.enqueue(Ok(json!({
            "placements": { "shop": [offer_json("o1", "v1")] }
        })));
        fixture.coordinator.get_offers(&["shop"]).unwrap();

        // Expire the cache, then fail the next fetch (the mock script is exhausted).
        fixture.clock.advance(61);
        let result = fixture.coordinator.get_offers(&["shop"]).unwrap();

        assert_eq!(offer_ids(&result["shop"]), ["o1"]);
        assert_eq!(fixture.http.requests().len(), 2);
    }

    #[test]
    fn fetch_failure_with_empty_cache_is_an_error() {
        let fixture = fixture(false);

        let result = fixture.coordinator.get_offers(&["shop"]);

        assert!(matches!(result, Err(Error::NoConnection)));
    }

    #[test]
    fn fetch_all_serves_stale_snapshot_on_failure() {
        let fixture = fixture(false);
        fixture.http.enqueue(Ok(json!({
            "placements": { "shop": [offer_json("o1", "v1")] }
        })));
        fixture.coordinator.get_offers(&["shop"]).unwrap();

        let result = fixture.coordinator.get_offers(&[]).unwrap();

        let requests = fixture.http.requests();
        assert_eq!(requests[1].url.query(), None, "get-all carries no placements param");
        assert_eq!(offer_ids(&result["shop"]), ["o1"]);
    }

    #[test]
    fn always_fetch_bypasses_fresh_cache() {
        let fixture = fixture(true);
        fixture.http.enqueue(Ok(json!({
            "placements": { "shop": [offer_json("o1", "v1")] }
        })));
        fixture.http.enqueue(Ok(json!({
            "placements": { "shop": [offer_json("o2", "v1")] }
        })));

        fixture.coordinator.get_offers(&["shop"]).unwrap();
        let second = fixture.coordinator.get_offers(&["shop"]).unwrap();

        assert_eq!(fixture.http.requests().len(), 2);
        assert_eq!(offer_ids(&second["shop"]), ["o2"]);
    }

    #[test]
    fn surviving_offers_are_recorded_with_attribution_variant() {
        let fixture = fixture(false);
        fixture.http.enqueue(Ok(json!({
            "placements": { "shop": [offer_json("o1", "variant-7")] }
        })));

        fixture.coordinator.get_offers(&["shop"]).unwrap();

        let entries = fixture.display_log.entries_for_offer("o1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].offer_variant_id, "variant-7");
        assert_eq!(entries[0].placement_id, "shop");
        assert_eq!(entries[0].displayed_on, 100_000);
    }

    #[test]
    fn offer_in_several_placements_is_recorded_once_per_response() {
        let fixture = fixture(false);
        fixture.http.enqueue(Ok(json!({
            "placements": {
                "shop": [offer_json("o1", "v1")],
                "lobby": [offer_json("o1", "v1")]
            }
        })));

        fixture.coordinator.get_offers(&["shop", "lobby"]).unwrap();

        assert_eq!(fixture.display_log.entries_for_offer("o1").len(), 1);
    }

    #[test]
    fn exhausted_display_limit_filters_offer_out_of_fetch_result() {
        let fixture = fixture(true);
        let mut offer = offer_json("o1", "v1");
        offer["displayLimits"] = json!([{ "timeWindowHours": 1, "maxDisplayCount": 1 }]);

        for _ in 0..3 {
            fixture.http.enqueue(Ok(json!({ "placements": { "shop": [offer.clone()] } })));
        }

        // First two fetches stay within the limit; each records a display.
        let first = fixture.coordinator.get_offers(&["shop"]).unwrap();
        assert_eq!(offer_ids(&first["shop"]), ["o1"]);
        let second = fixture.coordinator.get_offers(&["shop"]).unwrap();
        assert_eq!(offer_ids(&second["shop"]), ["o1"]);

        // Third fetch sees two displays within the hour and filters the offer out.
        let third = fixture.coordinator.get_offers(&["shop"]).unwrap();
        assert!(third["shop"].is_empty());
        assert_eq!(fixture.display_log.entries_for_offer("o1").len(), 2);
    }
}
