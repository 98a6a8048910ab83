use time::OffsetDateTime;

/// Temperature/humidity reading (rtl_433 message type 56)
#[derive(Debug, Clone, PartialEq)]
pub struct TempHumidity {
    pub timestamp: OffsetDateTime,
    pub temp_f: f64,
    pub humidity_pct: f64,
    pub battery_ok: u8,
}

/// Wind/rain reading (rtl_433 message type 49)
#[derive(Debug, Clone, PartialEq)]
pub struct WindRain {
    pub timestamp: OffsetDateTime,
    pub wind_speed_kmh: f64,
    pub wind_dir_deg: f64,
    /// Counter since the sensor's own epoch, not since midnight
    pub rain_in_cumulative: f64,
    pub battery_ok: u8,
}

/// A decoded sensor transmission, consumed exactly once by the aggregator
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementEvent {
    TempHumidity(TempHumidity),
    WindRain(WindRain),
}

impl MeasurementEvent {
    pub fn timestamp(&self) -> OffsetDateTime {
        match self {
            MeasurementEvent::TempHumidity(m) => m.timestamp,
            MeasurementEvent::WindRain(m) => m.timestamp,
        }
    }
}

/// Rolling "current conditions" record built from both measurement kinds
///
/// `timestamp` tracks the newest event of either kind. The per-group
/// timestamps record whether that group has been seen at all, so sinks can
/// leave out readings that are still at their zero defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentConditions {
    pub timestamp: Option<OffsetDateTime>,
    pub temp_f: f64,
    pub humidity_pct: f64,
    pub battery_ok: u8,
    pub wind_speed_kmh: f64,
    pub wind_dir_deg: f64,
    pub rain_in_delta: f64,
    pub temp_humidity_at: Option<OffsetDateTime>,
    pub wind_rain_at: Option<OffsetDateTime>,
}
