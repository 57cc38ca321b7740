//! Per-session SDK context shared by all coordinators.
use std::collections::HashMap;

use reqwest::Url;
use serde::Serialize;

use crate::http::API_KEY_HEADER;
use crate::{Error, Result, SdkMetadata, Value};

const OFFERS_ENDPOINT: &'static str = "/offers/v1";
const CONFIGS_ENDPOINT: &'static str = "/config/v1";
const EVENTS_ENDPOINT: &'static str = "/ingest/v1/events";

/// Description of the device the SDK runs on, sent with personalization requests.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// App store the application was installed from (e.g. `AppStore`, `GooglePlayStore`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// IANA timezone identifier of the device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Locale of the device, as a BCP-47 tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Version of the host application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersonalizationRequest<'a> {
    user_id: &'a str,
    device_info: &'a DeviceInfo,
    user_data: &'a HashMap<String, Value>,
}

/// Explicit session context passed to each coordinator at construction.
///
/// Holds the current user/app identity, the API key, and endpoint addressing. Keeping this an
/// owned value (rather than process-global state) allows multiple concurrent sessions and makes
/// coordinators straightforward to construct in tests.
pub struct SdkSession {
    api_key: String,
    app_id: String,
    user_id: String,
    base_url: String,
    sdk_metadata: SdkMetadata,
    device_info: DeviceInfo,
    user_data: HashMap<String, Value>,
}

impl SdkSession {
    /// Create a new session context.
    pub fn new(
        api_key: impl Into<String>,
        app_id: impl Into<String>,
        user_id: impl Into<String>,
        base_url: impl Into<String>,
        sdk_metadata: SdkMetadata,
        device_info: DeviceInfo,
        user_data: HashMap<String, Value>,
    ) -> SdkSession {
        SdkSession {
            api_key: api_key.into(),
            app_id: app_id.into(),
            user_id: user_id.into(),
            base_url: base_url.into(),
            sdk_metadata,
            device_info,
            user_data,
        }
    }

    /// Application identifier this session is scoped to.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// User identifier this session is scoped to.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Metadata of the SDK owning this session.
    pub fn sdk_metadata(&self) -> SdkMetadata {
        self.sdk_metadata
    }

    /// Headers attached to every request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthorized`] if the API key is missing, so no request is issued at all.
    pub fn request_headers(&self) -> Result<Vec<(String, String)>> {
        if self.api_key.is_empty() {
            log::warn!(target: "metica", "api_key is missing; refusing to issue request");
            return Err(Error::Unauthorized);
        }
        Ok(vec![(API_KEY_HEADER.to_owned(), self.api_key.clone())])
    }

    /// Request body shared by offers and config fetches:
    /// `{ userId, deviceInfo, userData }`.
    pub fn personalization_body(&self) -> Result<serde_json::Value> {
        let body = serde_json::to_value(PersonalizationRequest {
            user_id: &self.user_id,
            device_info: &self.device_info,
            user_data: &self.user_data,
        })?;
        Ok(body)
    }

    /// Endpoint for offer fetches. `placements` narrows the request to the named placements;
    /// empty means all placements.
    pub fn offers_url(&self, placements: &[&str]) -> Result<Url> {
        self.endpoint_url(OFFERS_ENDPOINT, "placements", placements)
    }

    /// Endpoint for remote-config fetches. `keys` narrows the request to the named keys; empty
    /// means all keys.
    pub fn configs_url(&self, keys: &[&str]) -> Result<Url> {
        self.endpoint_url(CONFIGS_ENDPOINT, "keys", keys)
    }

    /// Endpoint for event ingestion.
    pub fn events_url(&self) -> Result<Url> {
        Url::parse(&format!("{}{}", self.base_url, EVENTS_ENDPOINT))
            .map_err(|err| Error::InvalidBaseUrl(err))
    }

    /// Cache identifier for a remote-config key. Scoped by app and user so switching either
    /// never serves another identity's values.
    pub fn config_cache_key(&self, key: &str) -> String {
        format!("cfg-{}-{}-{}", self.app_id, self.user_id, key)
    }

    fn endpoint_url(&self, endpoint: &str, param: &str, values: &[&str]) -> Result<Url> {
        let url = format!("{}{}/{}", self.base_url, endpoint, self.app_id);
        let result = if values.is_empty() {
            Url::parse(&url)
        } else {
            Url::parse_with_params(&url, &[(param, values.join(","))])
        };
        result.map_err(|err| Error::InvalidBaseUrl(err))
    }
}
