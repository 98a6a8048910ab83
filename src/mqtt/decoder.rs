/// Decoding of rtl_433 JSON events into typed measurements
///
/// rtl_433 publishes one JSON object per radio transmission. The Acurite 5-in-1
/// alternates between two message types:
///
/// ```text
/// {"time":"2025-08-03 21:51:44","model":"Acurite-5n1","message_type":56,
///  "battery_ok":1,"wind_avg_km_h":0,"temperature_F":69.1,"humidity":97}
/// {"time":"2025-08-03 21:52:39","model":"Acurite-5n1","message_type":49,
///  "battery_ok":1,"wind_avg_km_h":0,"wind_dir_deg":157.5,"rain_in":0.23}
/// ```
use serde::Deserialize;
use std::fmt;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::models::{MeasurementEvent, TempHumidity, WindRain};

// rtl_433 message type discriminants for the Acurite 5-in-1
pub const TEMP_HUMIDITY_MESSAGE: i64 = 56;
pub const WIND_RAIN_MESSAGE: i64 = 49;

/// Union of the fields either message type may carry
#[derive(Debug, Deserialize)]
struct RawMeasurement {
    time: Option<String>,
    message_type: Option<i64>,
    battery_ok: Option<u8>,
    #[serde(rename = "temperature_F")]
    temperature_f: Option<f64>,
    humidity: Option<f64>,
    wind_avg_km_h: Option<f64>,
    wind_dir_deg: Option<f64>,
    rain_in: Option<f64>,
}

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    MissingField(&'static str),
    UnknownMessageType(i64),
    Timestamp(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "invalid JSON: {}", e),
            DecodeError::MissingField(field) => write!(f, "missing field '{}'", field),
            DecodeError::UnknownMessageType(t) => write!(f, "unrecognized message type {}", t),
            DecodeError::Timestamp(raw) => write!(f, "unparseable timestamp '{}'", raw),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DecodeError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingField(field))
}

/// Turns MQTT payloads into measurement events
///
/// rtl_433 stamps events in the receiving host's local time without an
/// offset, so the decoder is told which offset that is.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementDecoder {
    local_offset: UtcOffset,
}

impl MeasurementDecoder {
    pub fn new(local_offset: UtcOffset) -> Self {
        Self { local_offset }
    }

    pub fn decode(&self, payload: &[u8]) -> Result<MeasurementEvent, DecodeError> {
        let raw: RawMeasurement = serde_json::from_slice(payload)?;
        let message_type = required(raw.message_type, "message_type")?;

        match message_type {
            TEMP_HUMIDITY_MESSAGE => Ok(MeasurementEvent::TempHumidity(TempHumidity {
                timestamp: self.parse_time(required(raw.time, "time")?)?,
                temp_f: required(raw.temperature_f, "temperature_F")?,
                humidity_pct: required(raw.humidity, "humidity")?,
                battery_ok: required(raw.battery_ok, "battery_ok")?,
            })),
            WIND_RAIN_MESSAGE => Ok(MeasurementEvent::WindRain(WindRain {
                timestamp: self.parse_time(required(raw.time, "time")?)?,
                wind_speed_kmh: required(raw.wind_avg_km_h, "wind_avg_km_h")?,
                wind_dir_deg: required(raw.wind_dir_deg, "wind_dir_deg")?,
                rain_in_cumulative: required(raw.rain_in, "rain_in")?,
                battery_ok: required(raw.battery_ok, "battery_ok")?,
            })),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }

    /// Accepts rtl_433's default "YYYY-MM-DD HH:MM:SS" (local) or RFC 3339
    fn parse_time(&self, raw: String) -> Result<OffsetDateTime, DecodeError> {
        let local = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        if let Ok(dt) = PrimitiveDateTime::parse(&raw, local) {
            return Ok(dt.assume_offset(self.local_offset));
        }

        OffsetDateTime::parse(&raw, &Rfc3339).map_err(|_| DecodeError::Timestamp(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    const TEMP_HUMIDITY_JSON: &str = r#"{"time":"2025-08-03 21:51:44","model":"Acurite-5n1","message_type":56,"id":1026,"channel":"C","sequence_num":0,"battery_ok":1,"wind_avg_km_h":0,"temperature_F":69.1,"humidity":97,"mic":"CHECKSUM"}"#;
    const WIND_RAIN_JSON: &str = r#"{"time":"2025-08-03 21:52:39","model":"Acurite-5n1","message_type":49,"id":1026,"channel":"C","sequence_num":0,"battery_ok":1,"wind_avg_km_h":0,"wind_dir_deg":157.5,"rain_in":0.23,"mic":"CHECKSUM"}"#;

    #[test]
    fn decodes_temp_humidity_message() {
        let decoder = MeasurementDecoder::new(offset!(-4));
        let event = decoder.decode(TEMP_HUMIDITY_JSON.as_bytes()).unwrap();
        assert_eq!(
            event,
            MeasurementEvent::TempHumidity(TempHumidity {
                timestamp: datetime!(2025-08-03 21:51:44 -4),
                temp_f: 69.1,
                humidity_pct: 97.0,
                battery_ok: 1,
            })
        );
    }

    #[test]
    fn decodes_wind_rain_message() {
        let decoder = MeasurementDecoder::new(offset!(UTC));
        match decoder.decode(WIND_RAIN_JSON.as_bytes()).unwrap() {
            MeasurementEvent::WindRain(m) => {
                assert_eq!(m.timestamp, datetime!(2025-08-03 21:52:39 UTC));
                assert_eq!(m.wind_speed_kmh, 0.0);
                assert_eq!(m.wind_dir_deg, 157.5);
                assert_eq!(m.rain_in_cumulative, 0.23);
                assert_eq!(m.battery_ok, 1);
            }
            other => panic!("expected wind/rain, got {:?}", other),
        }
    }

    #[test]
    fn accepts_rfc3339_timestamps() {
        let decoder = MeasurementDecoder::new(offset!(UTC));
        let payload = r#"{"time":"2025-08-03T21:51:44+02:00","message_type":56,"battery_ok":0,"temperature_F":50.0,"humidity":40}"#;
        let event = decoder.decode(payload.as_bytes()).unwrap();
        assert_eq!(event.timestamp(), datetime!(2025-08-03 21:51:44 +2));
    }

    #[test]
    fn rejects_unknown_message_type() {
        let decoder = MeasurementDecoder::new(offset!(UTC));
        let payload = r#"{"time":"2025-08-03 21:51:44","message_type":7,"battery_ok":1}"#;
        assert!(matches!(
            decoder.decode(payload.as_bytes()),
            Err(DecodeError::UnknownMessageType(7))
        ));
    }

    #[test]
    fn rejects_missing_fields() {
        let decoder = MeasurementDecoder::new(offset!(UTC));
        let payload = r#"{"time":"2025-08-03 21:52:39","message_type":49,"battery_ok":1,"wind_avg_km_h":3.1}"#;
        assert!(matches!(
            decoder.decode(payload.as_bytes()),
            Err(DecodeError::MissingField("wind_dir_deg"))
        ));

        let payload = r#"{"time":"2025-08-03 21:52:39","battery_ok":1}"#;
        assert!(matches!(
            decoder.decode(payload.as_bytes()),
            Err(DecodeError::MissingField("message_type"))
        ));
    }

    #[test]
    fn rejects_bad_json_and_timestamps() {
        let decoder = MeasurementDecoder::new(offset!(UTC));
        assert!(matches!(
            decoder.decode(b"{ \"temp\": 70, "),
            Err(DecodeError::Json(_))
        ));

        let payload = r#"{"time":"yesterday","message_type":56,"battery_ok":1,"temperature_F":50.0,"humidity":40}"#;
        let err = decoder.decode(payload.as_bytes()).unwrap_err();
        assert_eq!(err.to_string(), "unparseable timestamp 'yesterday'");
    }
}
