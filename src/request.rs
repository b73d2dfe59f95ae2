use chrono::{DateTime, Utc};
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::error::{Error, Result};

/// Largest number of measurements the API returns per call.
pub const MAX_MEASURE_LIMIT: u32 = 1024;

// Anything at or below this is taken to be epoch seconds rather than milliseconds.
const SECONDS_THRESHOLD: i64 = 10_000_000_000;

/// Ordered request parameters, sent as a form body or a query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Params {
    pairs: Vec<(&'static str, String)>,
}

impl Params {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, key: &'static str, value: impl ToString) -> Self {
        self.pairs.push((key, value.to_string()));
        self
    }

    pub(crate) fn with_opt<T: ToString>(self, key: &'static str, value: Option<T>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    /// Like `with_opt`, but also skips empty strings.
    pub(crate) fn with_non_empty(self, key: &'static str, value: Option<&str>) -> Self {
        self.with_opt(key, value.filter(|v| !v.is_empty()))
    }

    pub(crate) fn authorized(mut self, access_token: &str) -> Self {
        self.pairs.insert(0, ("access_token", access_token.to_string()));
        self
    }

    #[cfg(test)]
    pub(crate) fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn pairs(&self) -> &[(&'static str, String)] {
        &self.pairs
    }
}

/// Fails with a configuration error when a required option is empty.
pub(crate) fn require(operation: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Config(format!("{} '{}' not set.", operation, field)));
    }
    Ok(())
}

/// Joins measurement types with commas, strips whitespace and lower-cases.
pub fn normalize_types<S: AsRef<str>>(types: &[S]) -> String {
    types
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(",")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

/// Converts epoch seconds or epoch milliseconds to UTC epoch seconds.
pub fn normalize_timestamp(value: i64) -> Result<i64> {
    let millis = if value <= SECONDS_THRESHOLD {
        value.saturating_mul(1000)
    } else {
        value
    };

    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.timestamp())
        .ok_or_else(|| Error::Config(format!("Timestamp out of range: {}", value)))
}

pub fn clamp_limit(limit: u32) -> u32 {
    limit.min(MAX_MEASURE_LIMIT)
}

/// Builds the human-readable reason for a failed call.
///
/// JSON error envelopes win, then the HTTP status, then "No response" when
/// the request never produced a response at all.
pub(crate) fn describe_failure(
    status: Option<StatusCode>,
    content_type: Option<&str>,
    body: &str,
) -> String {
    let is_json = content_type
        .map(|ct| ct.trim_start().starts_with("application/json"))
        .unwrap_or(false);

    if is_json && !body.is_empty() {
        if let Some(message) = envelope_message(body) {
            return message;
        }
    }

    match status {
        Some(status) => format!("Status code {}", status.as_u16()),
        None => "No response".to_string(),
    }
}

/// Sends a request once and hands back the response only when it is a 200.
///
/// Anything else is turned into a failure reason via `describe_failure`.
pub(crate) async fn send_once(builder: RequestBuilder) -> std::result::Result<Response, String> {
    match builder.send().await {
        Ok(response) if response.status() == StatusCode::OK => Ok(response),
        Ok(response) => Err(failure_reason(response).await),
        Err(err) => {
            debug!("Request failed before a response arrived: {}", err);
            Err(describe_failure(err.status(), None, ""))
        }
    }
}

async fn failure_reason(response: Response) -> String {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.unwrap_or_default();

    debug!("Request failed with status {}: {}", status, body);
    describe_failure(Some(status), content_type.as_deref(), &body)
}

fn envelope_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;

    match error {
        Value::String(message) => Some(message.clone()),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(message)) => Some(message.clone()),
            _ => Some(error.to_string()),
        },
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
