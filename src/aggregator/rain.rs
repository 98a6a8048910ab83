/// Daily rainfall from the sensor's ever-increasing rain counter
use log::{info, warn};
use time::OffsetDateTime;

/// Tracks the rain baseline and reports rainfall since local midnight
///
/// Any reading stamped inside the 00:00 local minute drops the baseline, so
/// the reading itself becomes the new zero. A day with no reading in that
/// minute keeps counting from the previous baseline.
#[derive(Debug, Clone, Default)]
pub struct RainAccumulator {
    baseline: Option<f64>,
}

impl RainAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rain since the current baseline, establishing one if needed
    ///
    /// `now` must be in local time; its hour and minute decide the reset.
    pub fn delta(&mut self, cumulative: f64, now: OffsetDateTime) -> f64 {
        if now.hour() == 0 && now.minute() == 0 && self.baseline.is_some() {
            info!("Local midnight, resetting rain baseline");
            self.baseline = None;
        }

        match self.baseline {
            None => {
                self.rebaseline(cumulative);
                0.0
            }
            Some(baseline) if cumulative < baseline => {
                // Counter went backwards: sensor was power cycled
                warn!(
                    "Rain counter dropped from {:.2} to {:.2}, re-baselining",
                    baseline, cumulative
                );
                self.rebaseline(cumulative);
                0.0
            }
            Some(baseline) => cumulative - baseline,
        }
    }

    fn rebaseline(&mut self, cumulative: f64) {
        info!("Rain baseline set to {:.2}", cumulative);
        self.baseline = Some(cumulative);
    }
}
