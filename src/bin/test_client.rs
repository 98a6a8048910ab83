/// Publishes synthetic rtl_433 Acurite-5n1 events for exercising the service
use clap::Parser;
use log::{error, info};
use rumqttc::{AsyncClient, MqttOptions, QoS};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tokio::time::{sleep, Duration};

#[derive(Debug, Parser)]
#[command(name = "test-client", about = "Publish fake weather station readings")]
struct Args {
    #[arg(long, env = "TEST_CLIENT_MQTT_HOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "TEST_CLIENT_MQTT_PORT", default_value_t = 1883)]
    port: u16,

    #[arg(long, env = "TEST_CLIENT_MQTT_TOPIC", default_value = "rtl_433/test/events")]
    topic: String,

    /// Temperature in °F
    #[arg(long, default_value_t = 68.0)]
    temp: f64,

    /// Relative humidity in percent
    #[arg(long, default_value_t = 50.0)]
    humidity: f64,

    /// Starting cumulative rain counter, in inches
    #[arg(long, default_value_t = 0.0)]
    rain: f64,
}

// RFC 3339 carries the offset; the service accepts it alongside rtl_433 local time
fn now_string() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339).unwrap_or_else(|_| now.to_string())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    let opts = MqttOptions::new("test-client", &args.host, args.port);
    let (client, mut eventloop) = AsyncClient::new(opts, 16);
    tokio::spawn(async move {
        loop {
            if let Err(e) = eventloop.poll().await {
                error!("Connection error: {}", e);
                sleep(Duration::from_secs(2)).await;
            }
        }
    });

    info!("Publishing to {} on {}:{}", args.topic, args.host, args.port);

    let mut rain = args.rain;
    for seq in 0u64.. {
        let payload = if seq % 2 == 0 {
            json!({
                "time": now_string(),
                "model": "Acurite-5n1",
                "message_type": 56,
                "battery_ok": 1,
                "wind_avg_km_h": 0,
                "temperature_F": args.temp,
                "humidity": args.humidity,
            })
        } else {
            rain += 0.01;
            json!({
                "time": now_string(),
                "model": "Acurite-5n1",
                "message_type": 49,
                "battery_ok": 1,
                "wind_avg_km_h": 3.2,
                "wind_dir_deg": 157.5,
                "rain_in": (rain * 100.0).round() / 100.0,
            })
        };

        info!("Publishing {}", payload);
        if let Err(e) = client
            .publish(&args.topic, QoS::AtMostOnce, false, payload.to_string())
            .await
        {
            error!("Publish failed: {}", e);
        }
        sleep(Duration::from_secs(1)).await;
    }
}
