//! SaneAPI client.
//!
//! The local SaneAPI service proxies the YouTube Data API. It returns raw
//! subscription and channel resources, which are fed to the JSON builder
//! unchanged.

use anyhow::{bail, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::RemoteConfig;

pub const SUBSCRIPTIONS_ROUTE: &str = "/api/v1/remote/subscriptions";
pub const CHANNEL_ROUTE: &str = "/api/v1/remote/channel";

/// How to look up a single channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelQuery {
    Id(String),
    Username(String),
}

impl ChannelQuery {
    fn param(&self) -> (&'static str, &str) {
        match self {
            ChannelQuery::Id(id) => ("id", id),
            ChannelQuery::Username(name) => ("username", name),
        }
    }
}

pub struct SaneClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl SaneClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    fn get_json(&self, route: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(route);
        debug!(url = %url, "requesting");
        let response = self.client.get(&url).query(query).send()?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            bail!("SaneAPI error {} from {}: {}", status, route, body_text);
        }
        Ok(response.json()?)
    }

    /// Every subscription of the authorized user.
    pub fn fetch_subscriptions(&self) -> Result<Vec<Value>> {
        let body = self.get_json(SUBSCRIPTIONS_ROUTE, &[])?;
        let items = subscription_items(body)?;
        info!(count = items.len(), "fetched subscriptions");
        Ok(items)
    }

    /// One channel resource.
    pub fn fetch_channel(&self, query: &ChannelQuery) -> Result<Value> {
        let (key, value) = query.param();
        let body = self.get_json(CHANNEL_ROUTE, &[(key, value)])?;
        match body {
            Value::Array(mut items) if items.len() == 1 => Ok(items.remove(0)),
            Value::Object(_) => Ok(body),
            other => bail!(
                "Unexpected channel response: expected an object, got {}",
                crate::coerce::json_kind(&other)
            ),
        }
    }
}

/// Accept either a bare array or a YouTube list response with `items`.
fn subscription_items(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => Ok(items),
            _ => bail!("Unexpected subscriptions response: object without an items array"),
        },
        other => bail!(
            "Unexpected subscriptions response: expected an array, got {}",
            crate::coerce::json_kind(&other)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_items_shapes() {
        assert_eq!(subscription_items(json!([{"id": 1}])).unwrap().len(), 1);
        assert_eq!(
            subscription_items(json!({"items": [{"id": 1}, {"id": 2}]}))
                .unwrap()
                .len(),
            2
        );
        assert!(subscription_items(json!({"error": "nope"})).is_err());
        assert!(subscription_items(json!("nope")).is_err());
    }

    #[test]
    fn test_channel_query_param() {
        assert_eq!(ChannelQuery::Id("UC1".into()).param(), ("id", "UC1"));
        assert_eq!(
            ChannelQuery::Username("someone".into()).param(),
            ("username", "someone")
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = RemoteConfig {
            base_url: "http://localhost:5002/".to_string(),
            timeout_secs: 1,
        };
        let client = SaneClient::new(&config).unwrap();
        assert_eq!(
            client.url(SUBSCRIPTIONS_ROUTE),
            "http://localhost:5002/api/v1/remote/subscriptions"
        );
    }

    #[test]
    fn test_unreachable_service_is_an_error() {
        let config = RemoteConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
        };
        let client = SaneClient::new(&config).unwrap();
        assert!(client.fetch_subscriptions().is_err());
    }
}
