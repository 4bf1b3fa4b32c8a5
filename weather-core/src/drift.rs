//! Advisory comparison between consecutive observations of one location.

use crate::model::WeatherObservation;

pub const SIGNIFICANT_TEMP_DELTA: f64 = 8.0;
pub const SIGNIFICANT_HUMIDITY_DELTA: u32 = 30;
pub const SIGNIFICANT_PRESSURE_DELTA: u32 = 20;

/// Absolute differences between two observations that both carry temperature, humidity and pressure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftDeltas {
    pub temperature: f64,
    pub humidity: u32,
    pub pressure: u32,
}

impl DriftDeltas {
    pub fn between(previous: &WeatherObservation, current: &WeatherObservation) -> Option<Self> {
        let (prev_temp, prev_hum, prev_press) =
            (previous.temperature?, previous.humidity?, previous.pressure?);
        let (cur_temp, cur_hum, cur_press) =
            (current.temperature?, current.humidity?, current.pressure?);

        Some(Self {
            temperature: (prev_temp - cur_temp).abs(),
            humidity: u32::from(prev_hum).abs_diff(u32::from(cur_hum)),
            pressure: prev_press.abs_diff(cur_press),
        })
    }

    pub fn is_significant(&self) -> bool {
        self.temperature >= SIGNIFICANT_TEMP_DELTA
            || self.humidity >= SIGNIFICANT_HUMIDITY_DELTA
            || self.pressure >= SIGNIFICANT_PRESSURE_DELTA
    }
}

/// True when any of the tracked metrics jumped past its threshold.
/// Returns false when either side lacks a required field, since nothing can be assessed.
pub fn is_significant_drift(previous: &WeatherObservation, current: &WeatherObservation) -> bool {
    DriftDeltas::between(previous, current).is_some_and(|d| d.is_significant())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObservationPayload, Units, WeatherObservation};
    use chrono::Utc;

    fn obs(
        temperature: Option<f64>,
        humidity: Option<u8>,
        pressure: Option<u32>,
    ) -> WeatherObservation {
        let payload = ObservationPayload {
            temperature,
            humidity,
            pressure,
            ..Default::default()
        };
        WeatherObservation::from_payload(1, payload, Units::Metric, Utc::now())
    }

    #[test]
    fn temperature_jump_of_nine_is_drift() {
        let previous = obs(Some(20.0), Some(50), Some(1013));
        let current = obs(Some(29.0), Some(50), Some(1013));
        assert!(is_significant_drift(&previous, &current));
    }

    #[test]
    fn temperature_jump_of_seven_is_not_drift() {
        let previous = obs(Some(20.0), Some(50), Some(1013));
        let current = obs(Some(27.0), Some(50), Some(1013));
        assert!(!is_significant_drift(&previous, &current));
    }

    #[test]
    fn thresholds_are_inclusive() {
        let base = obs(Some(10.0), Some(40), Some(1000));
        assert!(is_significant_drift(&base, &obs(Some(18.0), Some(40), Some(1000))));
        assert!(is_significant_drift(&base, &obs(Some(10.0), Some(70), Some(1000))));
        assert!(is_significant_drift(&base, &obs(Some(10.0), Some(40), Some(1020))));
        assert!(!is_significant_drift(&base, &obs(Some(10.0), Some(69), Some(1019))));
    }

    #[test]
    fn drops_count_as_much_as_rises() {
        let high = obs(Some(10.0), Some(90), Some(1030));
        let low = obs(Some(10.0), Some(50), Some(1030));
        assert!(is_significant_drift(&high, &low));
        assert!(is_significant_drift(&low, &high));
    }

    #[test]
    fn drift_is_symmetric() {
        let samples = [
            obs(Some(-5.0), Some(10), Some(990)),
            obs(Some(3.0), Some(35), Some(1005)),
            obs(Some(2.5), Some(80), Some(1011)),
            obs(Some(30.0), Some(20), Some(1040)),
        ];
        for a in &samples {
            for b in &samples {
                assert_eq!(is_significant_drift(a, b), is_significant_drift(b, a));
            }
        }
    }

    #[test]
    fn missing_fields_never_flag() {
        let full = obs(Some(0.0), Some(0), Some(900));
        let extreme = obs(Some(40.0), Some(100), Some(1100));
        for partial in [
            obs(None, Some(100), Some(1100)),
            obs(Some(40.0), None, Some(1100)),
            obs(Some(40.0), Some(100), None),
        ] {
            assert!(!is_significant_drift(&full, &partial));
            assert!(!is_significant_drift(&partial, &full));
        }
        assert!(is_significant_drift(&full, &extreme));
    }
}
