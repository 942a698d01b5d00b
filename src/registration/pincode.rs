//! Postal code lookup used to prefill city and state on the form.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;
use utoipa::ToSchema;

use crate::APP_USER_AGENT;

pub const DEFAULT_PINCODE_API_URL: &str = "https://api.postalpincode.in";
pub const PINCODE_PATTERN: &str = r"^[0-9]{6}$";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

static PINCODE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(PINCODE_PATTERN).ok());

pub fn is_valid_pincode(pin: &str) -> bool {
    PINCODE_RE.as_ref().is_some_and(|re| re.is_match(pin))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Locality {
    pub city: String,
    pub state: String,
}

/// Extract the locality of the first post office in a lookup response.
///
/// The upstream answers with a one-element array:
/// `[{"Status": "Success", "PostOffice": [{"District": "...", "State": "..."}]}]`.
/// Unknown codes come back with `"Status": "Error"` and a null office list.
#[must_use]
pub fn parse_lookup(body: &Value) -> Option<Locality> {
    let entry = body.get(0)?;
    if entry.get("Status").and_then(Value::as_str) != Some("Success") {
        return None;
    }

    let office = entry.get("PostOffice")?.get(0)?;
    let city = office.get("District")?.as_str()?.trim();
    let state = office.get("State")?.as_str()?.trim();
    if city.is_empty() || state.is_empty() {
        return None;
    }

    Some(Locality {
        city: city.to_string(),
        state: state.to_string(),
    })
}

#[derive(Clone, Debug)]
pub struct PincodeClient {
    client: Client,
    base_url: Url,
}

impl PincodeClient {
    /// # Errors
    /// Fails if `base_url` is not an absolute http(s) URL or the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Error parsing pincode API URL: {base_url}"))?;

        match base_url.scheme() {
            "http" | "https" => {}
            scheme => return Err(anyhow!("Unsupported pincode API scheme: {scheme}")),
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, pin: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("Error parsing pincode API URL: cannot be a base"))?
            .pop_if_empty()
            .extend(["pincode", pin]);
        Ok(url)
    }

    /// Look up a six digit postal code. `Ok(None)` means the code is unknown.
    ///
    /// # Errors
    /// Fails for a malformed pin, a transport error, or a non-success status.
    #[instrument(skip(self))]
    pub async fn lookup(&self, pin: &str) -> Result<Option<Locality>> {
        if !is_valid_pincode(pin) {
            return Err(anyhow!("Invalid pincode: {pin}"));
        }

        let url = self.endpoint(pin)?;
        let response = self.client.get(url.as_str()).send().await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow!("{url} - {status}"));
        }

        let body: Value = response.json().await?;
        let locality = parse_lookup(&body);
        debug!(found = locality.is_some(), "pincode lookup");

        Ok(locality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_first_post_office() {
        let body = json!([{
            "Message": "Number of pincode(s) found:2",
            "Status": "Success",
            "PostOffice": [
                { "Name": "Connaught Place", "District": "Central Delhi", "State": "Delhi" },
                { "Name": "Janpath", "District": "New Delhi", "State": "Delhi" }
            ]
        }]);

        assert_eq!(
            parse_lookup(&body),
            Some(Locality {
                city: "Central Delhi".to_string(),
                state: "Delhi".to_string(),
            })
        );
    }

    #[test]
    fn unknown_pins_yield_none() {
        let error = json!([{ "Message": "No records found", "Status": "Error", "PostOffice": null }]);
        assert_eq!(parse_lookup(&error), None);

        let empty = json!([{ "Status": "Success", "PostOffice": [] }]);
        assert_eq!(parse_lookup(&empty), None);

        assert_eq!(parse_lookup(&json!([])), None);
        assert_eq!(parse_lookup(&json!({ "Status": "Success" })), None);
    }

    #[test]
    fn pincode_format() {
        assert!(is_valid_pincode("110001"));
        assert!(!is_valid_pincode("11001"));
        assert!(!is_valid_pincode("11000a"));
    }

    #[test]
    fn endpoint_appends_pin() -> Result<()> {
        let client = PincodeClient::new("https://api.postalpincode.in")?;
        assert_eq!(
            client.endpoint("110001")?.as_str(),
            "https://api.postalpincode.in/pincode/110001"
        );

        let nested = PincodeClient::new("http://localhost:8080/proxy/")?;
        assert_eq!(
            nested.endpoint("560001")?.as_str(),
            "http://localhost:8080/proxy/pincode/560001"
        );
        Ok(())
    }

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(PincodeClient::new("ftp://example.com").is_err());
        assert!(PincodeClient::new("not a url").is_err());
    }

    #[tokio::test]
    async fn lookup_rejects_malformed_pin_without_network() -> Result<()> {
        let client = PincodeClient::new(DEFAULT_PINCODE_API_URL)?;
        assert!(client.lookup("12ab").await.is_err());
        Ok(())
    }
}
