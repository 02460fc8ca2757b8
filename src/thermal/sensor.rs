use std::fs;
use std::path::PathBuf;

use crate::error::{HeatshedError, Result};

/// One temperature reading in degrees Fahrenheit.
///
/// Implementations take exactly one reading per call, do not retry, and must
/// not block indefinitely. Sensor failures are recoverable: callers keep
/// their previous gate state and try again on the next poll.
pub trait TemperatureSensor: Send + Sync {
    fn sample(&mut self) -> Result<f64>;
}

/// Reads the SoC temperature from a sysfs thermal zone file.
///
/// The file holds a plain-text milli-degree Celsius value. The conversion
/// below is the one the fleet was calibrated against: it scales by 9/5 but
/// does not add the 32 degree offset, so readings sit well below true
/// Fahrenheit. Admission thresholds are expressed on this same scale.
/// Correcting the formula without recalibrating every deployed threshold
/// would silently change gating behavior.
#[derive(Debug, Clone)]
pub struct SysfsSensor {
    path: PathBuf,
}

impl SysfsSensor {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TemperatureSensor for SysfsSensor {
    fn sample(&mut self) -> Result<f64> {
        let contents = fs::read_to_string(&self.path).map_err(|source| {
            HeatshedError::SensorUnavailable {
                path: self.path.clone(),
                source,
            }
        })?;
        let raw: f64 = contents
            .trim()
            .parse()
            .map_err(|_| HeatshedError::SensorParseError {
                raw: contents.trim().to_string(),
            })?;
        Ok((raw / 1000.0) * 9.0 / 5.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RampPhase {
    Rising,
    Plateau(u32),
    Falling,
    Idle,
}

/// Deterministic synthetic sensor for machines without the sysfs file.
///
/// Produces a single thermal excursion: a ramp from `base_f` up to `peak_f`
/// in `step_f` increments, `plateau` extra samples at the peak, a symmetric
/// ramp back down, then `base_f` forever. With the default admission
/// threshold this drives exactly one throttle window, which makes demo runs
/// reproducible.
#[derive(Debug, Clone)]
pub struct RampSensor {
    base_f: f64,
    peak_f: f64,
    step_f: f64,
    plateau: u32,
    current: f64,
    phase: RampPhase,
}

impl RampSensor {
    pub fn new(base_f: f64, peak_f: f64, step_f: f64, plateau: u32) -> Self {
        debug_assert!(step_f > 0.0);
        debug_assert!(peak_f >= base_f);
        let phase = if peak_f > base_f {
            RampPhase::Rising
        } else {
            RampPhase::Plateau(plateau)
        };
        Self {
            base_f,
            peak_f,
            step_f,
            plateau,
            current: base_f,
            phase,
        }
    }

    fn advance(&mut self) {
        match self.phase {
            RampPhase::Rising => {
                self.current = (self.current + self.step_f).min(self.peak_f);
                if self.current >= self.peak_f {
                    self.phase = RampPhase::Plateau(self.plateau);
                }
            }
            RampPhase::Plateau(0) => {
                self.phase = RampPhase::Falling;
                self.current = (self.current - self.step_f).max(self.base_f);
            }
            RampPhase::Plateau(n) => {
                self.phase = RampPhase::Plateau(n - 1);
            }
            RampPhase::Falling => {
                self.current = (self.current - self.step_f).max(self.base_f);
                if self.current <= self.base_f {
                    self.phase = RampPhase::Idle;
                }
            }
            RampPhase::Idle => {}
        }
    }
}

impl Default for RampSensor {
    fn default() -> Self {
        Self::new(60.0, 75.0, 5.0, 2)
    }
}

impl TemperatureSensor for RampSensor {
    fn sample(&mut self) -> Result<f64> {
        let reading = self.current;
        self.advance();
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_produces_single_excursion() {
        let mut sensor = RampSensor::new(60.0, 75.0, 5.0, 2);
        let readings: Vec<f64> = (0..12)
            .map(|_| sensor.sample().unwrap())
            .collect();
        assert_eq!(
            readings,
            vec![60.0, 65.0, 70.0, 75.0, 75.0, 75.0, 70.0, 65.0, 60.0, 60.0, 60.0, 60.0]
        );
    }

    #[test]
    fn ramp_peak_exceeds_default_threshold_once() {
        let mut sensor = RampSensor::default();
        let mut above = 0;
        let mut was_above = false;
        for _ in 0..30 {
            let f = sensor.sample().unwrap();
            let hot = f > 70.0;
            if hot && !was_above {
                above += 1;
            }
            was_above = hot;
        }
        assert_eq!(above, 1);
    }

    #[test]
    fn flat_ramp_stays_at_base() {
        let mut sensor = RampSensor::new(55.0, 55.0, 5.0, 1);
        for _ in 0..5 {
            assert_eq!(sensor.sample().unwrap(), 55.0);
        }
    }
}
