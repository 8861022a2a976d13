//! Blocking HTTP client for the indicator backend.

use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::{ApiError, Result};
use super::query::QueryParams;
use super::validate::validate_query;
use crate::data::{CombinedData, CountriesResponse, HealthStatus, IndicatorsResponse};

/// Base URL used when nothing is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Matches the backend's own upstream timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the CO2/GDP backend endpoints
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http: Client,
}

impl ApiClient {
    /// Create a client rooted at `base_url` (trailing slashes are ignored)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(ApiClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query)
        }
    }

    /// Issue a GET and return the parsed JSON body.
    ///
    /// The body is parsed whatever the status; a failing status becomes
    /// `ApiError::Http` carrying the server's `message` when it has one.
    pub fn request_json(&self, endpoint: &str, query: &str) -> Result<Value> {
        let url = self.url(endpoint, query);
        debug!("GET {url}");

        let response = self
            .http
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let parsed = serde_json::from_str::<Value>(&text);

        if !status.is_success() {
            let body = parsed.unwrap_or(Value::String(text));
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| {
                    format!(
                        "HTTP {} - {}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or("Unknown")
                    )
                });
            warn!("{endpoint} failed with {status}: {message}");
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
                body,
            });
        }

        parsed.map_err(|e| ApiError::Network(format!("invalid JSON from {endpoint}: {e}")))
    }

    /// Issue a GET and deserialize the body into `T`
    pub fn request<T: DeserializeOwned>(&self, endpoint: &str, query: &str) -> Result<T> {
        let value = self.request_json(endpoint, query)?;
        serde_json::from_value(value).map_err(|e| ApiError::Malformed(format!("{endpoint}: {e}")))
    }

    pub fn health(&self) -> Result<HealthStatus> {
        self.request("/", "")
    }

    pub fn countries(&self) -> Result<CountriesResponse> {
        self.request("/api/countries", "")
    }

    pub fn combined_data(&self, params: &QueryParams) -> Result<CombinedData> {
        self.request("/api/data", &params.to_query_string())
    }

    #[allow(dead_code)] // Used in tests
    pub fn co2_data(&self, params: &QueryParams) -> Result<Value> {
        self.request_json("/api/data/co2", &params.to_query_string())
    }

    #[allow(dead_code)] // Used in tests
    pub fn gdp_data(&self, params: &QueryParams) -> Result<Value> {
        self.request_json("/api/data/gdp", &params.to_query_string())
    }

    #[allow(dead_code)] // Used in tests
    pub fn indicators(&self) -> Result<IndicatorsResponse> {
        self.request("/api/indicators", "")
    }

    /// Validate parameters, then fetch combined data.
    pub fn fetch_validated_data(&self, params: &QueryParams) -> Result<CombinedData> {
        validate_query(params)?;

        let value = self.request_json("/api/data", &params.to_query_string())?;
        if !value.is_object() {
            return Err(ApiError::Malformed("Invalid response format".to_string()));
        }
        serde_json::from_value(value).map_err(|e| ApiError::Malformed(format!("/api/data: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc::{self, Receiver};
    use std::thread;

    use super::*;

    /// Serve a single canned HTTP response on an ephemeral port
    fn serve_once(status_line: &'static str, body: &'static str) -> String {
        serve_recording(status_line, body).0
    }

    /// Like `serve_once`, also handing back the request head as received
    fn serve_recording(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let mut request = Vec::new();
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
                let response = format!(
                    "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (format!("http://{addr}"), rx)
    }

    #[test]
    fn test_health_success() {
        let base = serve_once(
            "200 OK",
            r#"{"status":"healthy","service":"CO2-GDP Visualization API","version":"1.0.0"}"#,
        );
        let client = ApiClient::new(base).unwrap();
        let health = client.health().unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, "1.0.0");
    }

    #[test]
    fn test_http_error_uses_server_message() {
        let base = serve_once(
            "400 Bad Request",
            r#"{"error":"Invalid start_year","message":"start_year must be between 1960 and current year"}"#,
        );
        let client = ApiClient::new(base).unwrap();
        let err = client.countries().unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(
            err.to_string(),
            "start_year must be between 1960 and current year"
        );
        assert_eq!(err.body().unwrap()["error"], "Invalid start_year");
    }

    #[test]
    fn test_http_error_without_message_synthesizes_one() {
        let base = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#);
        let client = ApiClient::new(base).unwrap();
        let err = client.indicators().unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.to_string(), "HTTP 500 - Internal Server Error");
    }

    #[test]
    fn test_connection_failure_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = ApiClient::new(format!("http://127.0.0.1:{port}")).unwrap();
        let err = client.health().unwrap_err();
        assert_eq!(err.status(), 0);
        assert!(err.to_string().starts_with("Network error: "));
    }

    #[test]
    fn test_missing_list_field_is_malformed() {
        let base = serve_once("200 OK", r#"{"count": 0}"#);
        let client = ApiClient::new(base).unwrap();
        let err = client.countries().unwrap_err();
        assert!(matches!(err, ApiError::Malformed(_)));
    }

    #[test]
    fn test_validated_fetch_rejects_before_network() {
        // Unroutable base: validation must fail first
        let client = ApiClient::new("http://127.0.0.1:1").unwrap();
        let err = client
            .fetch_validated_data(&QueryParams::new().countries("US"))
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        let err = client
            .fetch_validated_data(&QueryParams::new().start_year(1950))
            .unwrap_err();
        assert!(err.to_string().contains("Start year must be between"));
    }

    #[test]
    fn test_validated_fetch_rejects_non_object() {
        let base = serve_once("200 OK", "[1, 2, 3]");
        let client = ApiClient::new(base).unwrap();
        let err = client.fetch_validated_data(&QueryParams::new()).unwrap_err();
        assert_eq!(err.to_string(), "Malformed response: Invalid response format");
    }

    #[test]
    fn test_indicator_endpoints_return_raw_json() {
        let base = serve_once(
            "200 OK",
            r#"{"data": {"USA": {"2000": 20.2}}, "indicator": "EN.ATM.CO2E.PC"}"#,
        );
        let client = ApiClient::new(base).unwrap();
        let value = client
            .co2_data(&QueryParams::new().countries("USA").start_year(2000))
            .unwrap();
        assert_eq!(value["data"]["USA"]["2000"], 20.2);

        let base = serve_once("200 OK", r#"{"data": {}}"#);
        let client = ApiClient::new(base).unwrap();
        let value = client.gdp_data(&QueryParams::new()).unwrap();
        assert!(value["data"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_url_strips_trailing_slash() {
        let client = ApiClient::new("http://example.test/").unwrap();
        assert_eq!(client.base_url(), "http://example.test");
        assert_eq!(
            client.url("/api/data", "start_year=2000"),
            "http://example.test/api/data?start_year=2000"
        );
        assert_eq!(client.url("/", ""), "http://example.test/");
    }

    #[test]
    fn test_request_sends_json_header_and_query() {
        let (base, requests) = serve_recording(
            "200 OK",
            r#"{"data": {"co2_data": {}, "gdp_data": {}}, "metadata": {"countries": {}}}"#,
        );
        let client = ApiClient::new(base).unwrap();
        client
            .combined_data(&QueryParams::new().countries("USA,CHN").start_year(2000))
            .unwrap();

        let head = requests.recv().unwrap();
        let request_line = head.lines().next().unwrap();
        assert_eq!(
            request_line,
            "GET /api/data?countries=USA%2CCHN&start_year=2000 HTTP/1.1"
        );
        assert!(head
            .to_ascii_lowercase()
            .contains("content-type: application/json"));
    }
}
