/// Current-conditions state shared between the scheduler and the sinks
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::aggregator::rain::RainAccumulator;
use crate::models::{CurrentConditions, MeasurementEvent};
use crate::utils::Clock;

struct AggregateState {
    conditions: CurrentConditions,
    rain: RainAccumulator,
}

/// Sole owner of the rolling current-conditions record
///
/// All access goes through `apply` and `snapshot`. Both hold the lock for
/// their whole body, so a snapshot never sees half of an update.
pub struct ConditionsAggregator {
    state: Mutex<AggregateState>,
    clock: Arc<dyn Clock>,
}

impl ConditionsAggregator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(AggregateState {
                conditions: CurrentConditions::default(),
                rain: RainAccumulator::new(),
            }),
            clock,
        }
    }

    /// Fold one event into the record
    ///
    /// Only the fields carried by the event's variant change, plus the
    /// overall timestamp. Rain is converted to a daily delta against the
    /// local wall clock at the time of the call.
    pub fn apply(&self, event: MeasurementEvent) {
        let now = self.clock.now();
        let mut state = self.lock();

        match event {
            MeasurementEvent::TempHumidity(m) => {
                let conditions = &mut state.conditions;
                conditions.timestamp = Some(m.timestamp);
                conditions.temp_f = m.temp_f;
                conditions.humidity_pct = m.humidity_pct;
                conditions.battery_ok = m.battery_ok;
                conditions.temp_humidity_at = Some(m.timestamp);
            }
            MeasurementEvent::WindRain(m) => {
                let rain_in_delta = state.rain.delta(m.rain_in_cumulative, now);
                let conditions = &mut state.conditions;
                conditions.timestamp = Some(m.timestamp);
                conditions.wind_speed_kmh = m.wind_speed_kmh;
                conditions.wind_dir_deg = m.wind_dir_deg;
                conditions.rain_in_delta = rain_in_delta;
                conditions.battery_ok = m.battery_ok;
                conditions.wind_rain_at = Some(m.timestamp);
            }
        }

        debug!("Current conditions: {:?}", state.conditions);
    }

    /// Point-in-time copy of the record
    pub fn snapshot(&self) -> CurrentConditions {
        self.lock().conditions.clone()
    }

    // Writers never panic mid-update, so a poisoned lock still holds a whole record
    fn lock(&self) -> MutexGuard<'_, AggregateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
