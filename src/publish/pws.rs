/// Upload to a Weather Underground compatible personal weather station endpoint
use async_trait::async_trait;
use log::info;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::config::PwsConfig;
use crate::models::CurrentConditions;
use crate::publish::{PublishError, PublishResponse, Publisher};
use crate::utils::{format_param, kmh_to_mph};

pub const DEFAULT_PWS_URL: &str =
    "https://weatherstation.wunderground.com/weatherstation/updateweatherstation.php";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Project a snapshot onto the PWS upload parameter names
///
/// Readings from a measurement group that has never been received are left
/// out rather than uploaded as zeros.
pub fn measurement_params(conditions: &CurrentConditions) -> BTreeMap<&'static str, String> {
    let mut params = BTreeMap::new();

    if conditions.temp_humidity_at.is_some() {
        params.insert("tempf", format_param(conditions.temp_f));
        params.insert("humidity", format_param(conditions.humidity_pct));
    }

    if conditions.wind_rain_at.is_some() {
        params.insert(
            "windspeedmph",
            format_param(kmh_to_mph(conditions.wind_speed_kmh)),
        );
        params.insert("winddir", format_param(conditions.wind_dir_deg));
        params.insert("dailyrainin", format_param(conditions.rain_in_delta));
    }

    params
}

pub struct PwsPublisher {
    client: reqwest::Client,
    config: PwsConfig,
}

impl PwsPublisher {
    pub fn new(config: PwsConfig) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| PublishError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Full upload URL: credentials, action, and the measurement projection
    pub fn request_url(&self, conditions: &CurrentConditions) -> Result<Url, PublishError> {
        let mut url =
            Url::parse(&self.config.url).map_err(|e| PublishError::Request(e.to_string()))?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("ID", &self.config.id)
                .append_pair("PASSWORD", &self.config.key)
                .append_pair("action", "updateraw")
                .append_pair("dateutc", "now");
            for (name, value) in measurement_params(conditions) {
                query.append_pair(name, &value);
            }
        }

        Ok(url)
    }
}

/// Copy of `url` safe to log, with the station key masked
pub fn redacted(url: &Url) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "PASSWORD" {
                "***".to_string()
            } else {
                v.into_owned()
            };
            (k.into_owned(), v)
        })
        .collect();

    let mut clean = url.clone();
    clean.query_pairs_mut().clear().extend_pairs(pairs);
    clean
}

#[async_trait]
impl Publisher for PwsPublisher {
    fn name(&self) -> &str {
        "pws"
    }

    async fn publish(&self, conditions: &CurrentConditions) -> Result<PublishResponse, PublishError> {
        let url = self.request_url(conditions)?;
        info!("GET {}", redacted(&url));

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let response = PublishResponse {
            status: status.as_u16(),
            body,
        };

        if status.is_success() {
            Ok(response)
        } else {
            Err(PublishError::Status(response))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn pws_config() -> PwsConfig {
        PwsConfig {
            id: "KSTATION1".into(),
            key: "s3cret".into(),
            url: DEFAULT_PWS_URL.into(),
        }
    }

    fn full_conditions() -> CurrentConditions {
        let t = datetime!(2025-08-03 21:52:39 UTC);
        CurrentConditions {
            timestamp: Some(t),
            temp_f: 69.1,
            humidity_pct: 97.0,
            battery_ok: 1,
            wind_speed_kmh: 10.0,
            wind_dir_deg: 157.5,
            rain_in_delta: 0.0,
            temp_humidity_at: Some(t),
            wind_rain_at: Some(t),
        }
    }

    #[test]
    fn projects_all_groups_with_two_decimals() {
        let params = measurement_params(&full_conditions());
        assert_eq!(params["tempf"], "69.10");
        assert_eq!(params["humidity"], "97.00");
        assert_eq!(params["windspeedmph"], "6.21");
        assert_eq!(params["winddir"], "157.50");
        assert_eq!(params["dailyrainin"], "0.00");
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn leaves_out_groups_never_received() {
        let mut conditions = full_conditions();
        conditions.wind_rain_at = None;
        let params = measurement_params(&conditions);
        assert_eq!(params.len(), 2);
        assert!(params.contains_key("tempf"));
        assert!(!params.contains_key("dailyrainin"));
    }

    #[test]
    fn request_url_carries_credentials_and_action() {
        let publisher = PwsPublisher::new(pws_config()).unwrap();
        let url = publisher.request_url(&full_conditions()).unwrap();
        let pairs: BTreeMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("weatherstation.wunderground.com"));
        assert_eq!(pairs["ID"], "KSTATION1");
        assert_eq!(pairs["PASSWORD"], "s3cret");
        assert_eq!(pairs["action"], "updateraw");
        assert_eq!(pairs["dateutc"], "now");
        assert_eq!(pairs["tempf"], "69.10");
    }

    #[test]
    fn redacts_password_for_logging() {
        let publisher = PwsPublisher::new(pws_config()).unwrap();
        let url = publisher.request_url(&full_conditions()).unwrap();
        let logged = redacted(&url).to_string();
        assert!(!logged.contains("s3cret"));
        assert!(logged.contains("PASSWORD=***") || logged.contains("PASSWORD=%2A%2A%2A"));
        assert!(logged.contains("ID=KSTATION1"));
    }

    #[test]
    fn bad_url_is_a_request_error() {
        let mut config = pws_config();
        config.url = "not a url".into();
        let publisher = PwsPublisher::new(config).unwrap();
        assert!(matches!(
            publisher.request_url(&full_conditions()),
            Err(PublishError::Request(_))
        ));
    }
}
