use clap::Parser;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::aggregator::staleness::DEFAULT_MAX_AGE;
use crate::publish::pws::DEFAULT_PWS_URL;
use crate::scheduler::DEFAULT_PUBLISH_INTERVAL;

const DEFAULT_MQTT_PORT: u16 = 1883;

/// Command-line flags, each falling back to an environment variable
#[derive(Debug, Parser)]
#[command(name = "weather-metrics", about = "Publish rtl_433 weather station readings")]
pub struct Args {
    /// MQTT broker as host[:port]
    #[arg(long, env = "WEATHER_MQTT_SERVER", default_value = "mqtt:1883")]
    pub mqtt_server: String,

    #[arg(long, env = "WEATHER_MQTT_TOPIC", default_value = "rtl_433/+/events")]
    pub mqtt_topic: String,

    #[arg(long, env = "WEATHER_MQTT_USERNAME")]
    pub mqtt_username: Option<String>,

    #[arg(long, env = "WEATHER_MQTT_PASSWORD", hide_env_values = true)]
    pub mqtt_password: Option<String>,

    #[arg(long, env = "WEATHER_MQTT_CLIENTID", default_value = "weather-metrics")]
    pub mqtt_client_id: String,

    /// PWS station ID
    #[arg(long, env = "PWS_ID")]
    pub id: Option<String>,

    /// PWS station key
    #[arg(long, env = "PWS_KEY", hide_env_values = true)]
    pub key: Option<String>,

    #[arg(long, env = "PWS_URL", default_value = DEFAULT_PWS_URL)]
    pub pws_url: String,

    /// Seconds between uploads
    #[arg(long, env = "WEATHER_PUBLISH_INTERVAL", default_value_t = DEFAULT_PUBLISH_INTERVAL.as_secs())]
    pub publish_interval: u64,

    /// Seconds after the last reading before data counts as stale
    #[arg(long, env = "WEATHER_MAX_AGE", default_value_t = DEFAULT_MAX_AGE.whole_seconds() as u64)]
    pub max_age: u64,

    /// Address for the /metrics endpoint, disabled when unset
    #[arg(long, env = "WEATHER_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub topic: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
}

#[derive(Debug, Clone)]
pub struct PwsConfig {
    pub id: String,
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct WeatherConfig {
    pub mqtt: MqttConfig,
    pub pws: Option<PwsConfig>,
    pub metrics_addr: Option<SocketAddr>,
    pub publish_interval: Duration,
    pub max_age: time::Duration,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    MqttCredentials,
    PwsCredentials,
    NoSink,
    InvalidServer(String),
    ZeroInterval(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MqttCredentials => write!(f, "Must specify both MQTT username and password"),
            ConfigError::PwsCredentials => write!(f, "Must set both PWS_KEY and PWS_ID"),
            ConfigError::NoSink => write!(
                f,
                "Nothing to publish to: set PWS_ID/PWS_KEY and/or WEATHER_METRICS_ADDR"
            ),
            ConfigError::InvalidServer(s) => write!(f, "Invalid MQTT server '{}', expected host[:port]", s),
            ConfigError::ZeroInterval(name) => write!(f, "{} must be greater than zero", name),
        }
    }
}

impl std::error::Error for ConfigError {}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_server(server: &str) -> Result<(String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidServer(server.to_string());

    let (host, port) = match server.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (server, DEFAULT_MQTT_PORT),
    };

    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}

impl WeatherConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let args = Args::parse();
        Ok(Self::from_args(args)?)
    }

    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let (host, port) = parse_server(&args.mqtt_server)?;

        let username = non_empty(args.mqtt_username);
        let password = non_empty(args.mqtt_password);
        if username.is_some() != password.is_some() {
            return Err(ConfigError::MqttCredentials);
        }

        let pws = match (non_empty(args.id), non_empty(args.key)) {
            (Some(id), Some(key)) => Some(PwsConfig {
                id,
                key,
                url: args.pws_url,
            }),
            (None, None) => None,
            _ => return Err(ConfigError::PwsCredentials),
        };

        if pws.is_none() && args.metrics_addr.is_none() {
            return Err(ConfigError::NoSink);
        }

        if args.publish_interval == 0 {
            return Err(ConfigError::ZeroInterval("publish interval"));
        }
        if args.max_age == 0 {
            return Err(ConfigError::ZeroInterval("max age"));
        }

        Ok(WeatherConfig {
            mqtt: MqttConfig {
                host,
                port,
                topic: args.mqtt_topic,
                username,
                password,
                client_id: args.mqtt_client_id,
            },
            pws,
            metrics_addr: args.metrics_addr,
            publish_interval: Duration::from_secs(args.publish_interval),
            max_age: time::Duration::seconds(args.max_age as i64),
        })
    }
}
