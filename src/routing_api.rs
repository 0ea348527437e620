//! HTTP adapter for the point-to-point routing service.
//!
//! Speaks the OneMap-style `routingsvc/route` protocol: one GET per origin
//! and destination pair, answered with a route summary in meters and
//! seconds plus an encoded geometry. Responses are validated here so only
//! well-formed legs reach the planner.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use tracing::debug;

use crate::error::{ApiError, ConfigError};
use crate::polyline::Polyline;
use crate::traits::RoutingApi;

pub const DEFAULT_BASE_URL: &str = "https://www.onemap.gov.sg";

const ROUTE_PATH: &str = "/api/public/routingsvc/route";

pub const ENV_BASE_URL: &str = "ROUTING_API_BASE_URL";
pub const ENV_API_KEY: &str = "ROUTING_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "ROUTING_API_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingApiConfig {
    pub base_url: String,
    /// Sent verbatim in the `Authorization` header.
    pub api_key: Option<String>,
    pub route_type: String,
    /// Per-call timeout. Every request is bounded by it.
    pub timeout_secs: u64,
}

impl Default for RoutingApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            route_type: "drive".to_string(),
            timeout_secs: 10,
        }
    }
}

impl RoutingApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_route_type(mut self, route_type: impl Into<String>) -> Self {
        self.route_type = route_type.into();
        self
    }

    /// Reads `ROUTING_API_BASE_URL`, `ROUTING_API_KEY` and
    /// `ROUTING_API_TIMEOUT_SECS`, keeping defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(base_url) = lookup(ENV_BASE_URL).filter(|value| !value.trim().is_empty()) {
            config.base_url = base_url;
        }
        if let Some(api_key) = lookup(ENV_API_KEY).filter(|value| !value.trim().is_empty()) {
            config.api_key = Some(api_key);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            config.timeout_secs = match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_TIMEOUT_SECS,
                        value: raw,
                    });
                }
            };
        }
        Ok(config)
    }

    fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), ROUTE_PATH)
    }
}

/// One validated origin-to-destination route.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteLeg {
    pub distance_m: f64,
    pub duration_s: f64,
    pub geometry: Option<Polyline>,
}

#[derive(Debug, Clone)]
pub struct RoutingApiClient {
    config: RoutingApiConfig,
    client: reqwest::blocking::Client,
}

impl RoutingApiClient {
    pub fn new(config: RoutingApiConfig) -> Result<Self, ConfigError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RoutingApiConfig {
        &self.config
    }
}

impl RoutingApi for RoutingApiClient {
    fn route(&self, from: (f64, f64), to: (f64, f64)) -> Result<RouteLeg, ApiError> {
        let start = format_point(from);
        let end = format_point(to);

        let mut request = self.client.get(self.config.endpoint()).query(&[
            ("start", start.as_str()),
            ("end", end.as_str()),
            ("routeType", self.config.route_type.as_str()),
        ]);
        if let Some(api_key) = &self.config.api_key {
            request = request.header(AUTHORIZATION, api_key);
        }

        let response = request.send().map_err(transport_error)?;
        if let Some(err) = status_error(response.status().as_u16()) {
            return Err(err);
        }
        let body = response.text().map_err(transport_error)?;
        parse_route_body(&body)
    }
}

fn format_point((lat, lng): (f64, f64)) -> String {
    format!("{:.6},{:.6}", lat, lng)
}

fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_builder() {
        ApiError::InvalidRequest {
            message: err.to_string(),
        }
    } else if err.is_decode() {
        ApiError::Malformed {
            message: err.to_string(),
        }
    } else {
        ApiError::Network {
            message: err.to_string(),
        }
    }
}

/// Maps a non-success HTTP status to its error class.
pub fn status_error(status: u16) -> Option<ApiError> {
    match status {
        200..=299 => None,
        408 => Some(ApiError::Timeout),
        429 => Some(ApiError::RateLimited),
        500..=599 => Some(ApiError::ServerError { status }),
        _ => Some(ApiError::Rejected { status }),
    }
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    status: Option<i64>,
    status_message: Option<String>,
    route_summary: Option<RouteSummary>,
    route_geometry: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RouteSummary {
    total_distance: f64,
    total_time: f64,
}

/// Validates a response body and turns it into a [`RouteLeg`].
pub fn parse_route_body(body: &str) -> Result<RouteLeg, ApiError> {
    let response: RouteResponse = serde_json::from_str(body).map_err(|err| ApiError::Malformed {
        message: err.to_string(),
    })?;

    if response.status != Some(0) {
        return Err(ApiError::NoRoute {
            message: response
                .status_message
                .unwrap_or_else(|| format!("status {:?}", response.status)),
        });
    }

    let summary = response.route_summary.ok_or_else(|| ApiError::NoRoute {
        message: "response has no route_summary".to_string(),
    })?;

    for (field, value) in [
        ("total_distance", summary.total_distance),
        ("total_time", summary.total_time),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(ApiError::Malformed {
                message: format!("{field} is {value}"),
            });
        }
    }

    let geometry = response
        .route_geometry
        .filter(|encoded| !encoded.is_empty())
        .and_then(|encoded| match Polyline::decode(&encoded) {
            Ok(polyline) => Some(polyline),
            Err(err) => {
                debug!(error = %err, "dropping undecodable route geometry");
                None
            }
        });

    Ok(RouteLeg {
        distance_m: summary.total_distance,
        duration_s: summary.total_time,
        geometry,
    })
}
