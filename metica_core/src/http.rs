//! A thin transport abstraction over HTTP so coordinators can be exercised without a network.
use std::time::Duration;

use reqwest::{StatusCode, Url};

use crate::{Error, Result};

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &'static str = "X-Api-Key";

/// Blocking JSON-over-HTTP transport consumed by the coordinators.
///
/// Implementations classify transport failures into the [`Error`] taxonomy: connection failures
/// map to [`Error::NoConnection`], timeouts to [`Error::Timeout`], and non-success statuses to
/// [`Error::HttpStatus`] (401 is reported as [`Error::Unauthorized`]).
pub trait HttpClient: Send + Sync {
    /// Issue a GET request and return the response body parsed as JSON.
    fn get(&self, url: Url, headers: &[(String, String)]) -> Result<serde_json::Value>;

    /// Issue a POST request with a JSON body and return the response body parsed as JSON.
    fn post(
        &self,
        url: Url,
        body: &serde_json::Value,
        headers: &[(String, String)],
    ) -> Result<serde_json::Value>;
}

/// [`HttpClient`] backed by [`reqwest::blocking`].
pub struct ReqwestHttpClient {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl ReqwestHttpClient {
    /// Create a new client. `timeout` bounds every request issued through it.
    pub fn new(timeout: Duration) -> ReqwestHttpClient {
        ReqwestHttpClient {
            client: reqwest::blocking::Client::new(),
            timeout,
        }
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get(&self, url: Url, headers: &[(String, String)]) -> Result<serde_json::Value> {
        let mut request = self.client.get(url).timeout(self.timeout);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        handle_response(request.send()?)
    }

    fn post(
        &self,
        url: Url,
        body: &serde_json::Value,
        headers: &[(String, String)],
    ) -> Result<serde_json::Value> {
        let mut request = self.client.post(url).timeout(self.timeout).json(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        handle_response(request.send()?)
    }
}

fn handle_response(response: reqwest::blocking::Response) -> Result<serde_json::Value> {
    let response = response.error_for_status().map_err(|err| {
        if err.status() == Some(StatusCode::UNAUTHORIZED) {
            log::warn!(target: "metica", "client is not authorized. Check your API key");
            Error::Unauthorized
        } else {
            log::warn!(target: "metica", "received non-success response: {:?}", err);
            Error::from(err)
        }
    })?;

    Ok(response.json()?)
}

#[cfg(test)]
pub(crate) use testing::{MockHttpClient, RecordedRequest};

#[cfg(test)]
mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use reqwest::Url;

    use super::HttpClient;
    use crate::{Error, Result};

    /// A request observed by [`MockHttpClient`], kept for assertions.
    #[derive(Debug, Clone)]
    pub(crate) struct RecordedRequest {
        pub(crate) method: &'static str,
        pub(crate) url: Url,
        pub(crate) body: Option<serde_json::Value>,
    }

    /// Scriptable [`HttpClient`] replaying canned responses in order.
    ///
    /// An exhausted script answers with [`Error::NoConnection`], which doubles as the network
    /// outage simulation in coordinator tests.
    pub(crate) struct MockHttpClient {
        responses: Mutex<VecDeque<Result<serde_json::Value>>>,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl MockHttpClient {
        pub(crate) fn new() -> MockHttpClient {
            MockHttpClient {
                responses: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn enqueue(&self, response: Result<serde_json::Value>) {
            self.responses.lock().unwrap().push_back(response);
        }

        pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        fn respond(&self, request: RecordedRequest) -> Result<serde_json::Value> {
            self.requests.lock().unwrap().push(request);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(Error::NoConnection))
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(&self, url: Url, _headers: &[(String, String)]) -> Result<serde_json::Value> {
            self.respond(RecordedRequest {
                method: "GET",
                url,
                body: None,
            })
        }

        fn post(
            &self,
            url: Url,
            body: &serde_json::Value,
            _headers: &[(String, String)],
        ) -> Result<serde_json::Value> {
            self.respond(RecordedRequest {
                method: "POST",
                url,
                body: Some(body.clone()),
            })
        }
    }
}
