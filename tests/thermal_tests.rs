//! Thermal pipeline tests.
//!
//! These verify behavior on the sensing side of the system:
//! - Sysfs millidegree files parse into Fahrenheit readings
//! - Sensor failures surface as typed errors, never panics
//! - The monitor archives, gates, and keeps going across failed reads
//! - A full archive stops recording without disturbing the gate


use std::io::Write;
use std::path::PathBuf;

use heatshed::config::ThermalConfig;
use heatshed::error::HeatshedError;
use heatshed::thermal::{
    NodeId, SysfsSensor, TemperatureSensor, ThermalMonitor, ThermalState, ThrottleKind,
};
use test_harness::{Reading, ScriptedSensor};

fn thermal_config(threshold_f: f64, max_recordings: usize) -> ThermalConfig {
    ThermalConfig {
        threshold_f,
        max_recordings,
        ..ThermalConfig::default()
    }
}

/// A sysfs thermal zone file holds millidegrees; 48850 reads as 87.93.
#[test]
fn test_sysfs_sensor_reads_millidegree_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "48850").unwrap();

    let mut sensor = SysfsSensor::new(file.path().to_path_buf());
    let fahrenheit = sensor.sample().unwrap();
    assert!((fahrenheit - 87.93).abs() < 1e-9);
}

/// Repeated samples re-read the file, so an updated zone file is picked up.
#[test]
fn test_sysfs_sensor_tracks_file_updates() {
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), "50000\n").unwrap();

    let mut sensor = SysfsSensor::new(file.path().to_path_buf());
    assert!((sensor.sample().unwrap() - 90.0).abs() < 1e-9);

    std::fs::write(file.path(), "40000\n").unwrap();
    assert!((sensor.sample().unwrap() - 72.0).abs() < 1e-9);
}

/// A missing zone file is a typed unavailability error carrying the path.
#[test]
fn test_sysfs_sensor_missing_file() {
    let mut sensor = SysfsSensor::new(PathBuf::from("/nonexistent/thermal_zone9/temp"));
    match sensor.sample() {
        Err(HeatshedError::SensorUnavailable { path, .. }) => {
            assert_eq!(path, PathBuf::from("/nonexistent/thermal_zone9/temp"));
        }
        other => panic!("expected SensorUnavailable, got {other:?}"),
    }
}

/// Garbage in the zone file is a parse error that keeps the offending text.
#[test]
fn test_sysfs_sensor_rejects_garbage() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "not a temperature").unwrap();

    let mut sensor = SysfsSensor::new(file.path().to_path_buf());
    match sensor.sample() {
        Err(HeatshedError::SensorParseError { raw }) => assert_eq!(raw, "not a temperature"),
        other => panic!("expected SensorParseError, got {other:?}"),
    }
}

/// Readings 68, 72, 69 against threshold 70 produce exactly one throttle
/// window: a start on the second reading and an end on the third.
#[test]
fn test_threshold_crossing_emits_one_window() {
    let sensor = ScriptedSensor::from_temps(&[68.0, 72.0, 69.0]);
    let mut monitor = ThermalMonitor::new(NodeId(0), Box::new(sensor), &thermal_config(70.0, 100));

    assert!(monitor.poll().is_none());
    assert_eq!(monitor.state(), ThermalState::Normal);

    let start = monitor.poll().unwrap();
    assert_eq!(start.kind, ThrottleKind::Start);
    assert_eq!(start.fahrenheit, 72.0);
    assert_eq!(monitor.state(), ThermalState::Throttled);
    assert!(!monitor.may_admit());

    let end = monitor.poll().unwrap();
    assert_eq!(end.kind, ThrottleKind::End);
    assert_eq!(monitor.state(), ThermalState::Normal);
    assert!(monitor.may_admit());

    assert_eq!(monitor.events().len(), 2);
    assert_eq!(monitor.samples().len(), 3);
}

/// A reading exactly at the threshold does not open a throttle window.
#[test]
fn test_reading_at_threshold_stays_normal() {
    let sensor = ScriptedSensor::from_temps(&[70.0, 70.0]);
    let mut monitor = ThermalMonitor::new(NodeId(0), Box::new(sensor), &thermal_config(70.0, 100));

    assert!(monitor.poll().is_none());
    assert!(monitor.poll().is_none());
    assert_eq!(monitor.state(), ThermalState::Normal);
    assert!(monitor.events().is_empty());
}

/// A sensor failure after three good samples leaves the archive at three and
/// the gate open, and the monitor accepts further readings afterwards.
#[test]
fn test_sensor_failure_preserves_archive_and_gate() {
    let sensor = ScriptedSensor::new(vec![
        Reading::Ok(66.0),
        Reading::Ok(67.0),
        Reading::Ok(68.0),
        Reading::Unavailable,
        Reading::Ok(69.0),
    ]);
    let mut monitor = ThermalMonitor::new(NodeId(0), Box::new(sensor), &thermal_config(70.0, 100));

    for _ in 0..3 {
        monitor.poll();
    }
    assert_eq!(monitor.samples().len(), 3);

    // The failed read changes nothing.
    assert!(monitor.poll().is_none());
    assert_eq!(monitor.samples().len(), 3);
    assert_eq!(monitor.samples_taken(), 3);
    assert_eq!(monitor.state(), ThermalState::Normal);

    // And the next good read resumes archiving with the next sequence number.
    monitor.poll();
    assert_eq!(monitor.samples().len(), 4);
    assert_eq!(monitor.latest_sample().unwrap().seq, 3);
}

/// If the sensor dies while the gate is closed, the gate stays closed until a
/// good reading says otherwise.
#[test]
fn test_failure_while_throttled_keeps_gate_closed() {
    let sensor = ScriptedSensor::new(vec![
        Reading::Ok(72.0),
        Reading::Malformed,
        Reading::Ok(69.0),
    ]);
    let mut monitor = ThermalMonitor::new(NodeId(0), Box::new(sensor), &thermal_config(70.0, 100));

    assert_eq!(monitor.poll().unwrap().kind, ThrottleKind::Start);
    assert!(monitor.poll().is_none());
    assert!(!monitor.may_admit());
    assert_eq!(monitor.poll().unwrap().kind, ThrottleKind::End);
    assert!(monitor.may_admit());
}

/// Once the archive is full, recording stops at capacity but the gate keeps
/// following fresh readings, with sequence numbers still advancing.
#[test]
fn test_full_archive_keeps_gating() {
    let sensor = ScriptedSensor::from_temps(&[60.0, 61.0, 62.0, 75.0, 69.0]);
    let mut monitor = ThermalMonitor::new(NodeId(0), Box::new(sensor), &thermal_config(70.0, 3));

    for _ in 0..3 {
        monitor.poll();
    }
    assert_eq!(monitor.samples().len(), 3);

    let start = monitor.poll().unwrap();
    assert_eq!(start.kind, ThrottleKind::Start);
    assert_eq!(start.seq, 3);
    assert_eq!(monitor.samples().len(), 3);
    assert!(!monitor.may_admit());

    let end = monitor.poll().unwrap();
    assert_eq!(end.kind, ThrottleKind::End);
    assert_eq!(end.seq, 4);
    assert_eq!(monitor.samples_taken(), 5);

    // The archive kept the earliest readings, not the latest.
    let archived: Vec<f64> = monitor.samples().iter().map(|s| s.fahrenheit).collect();
    assert_eq!(archived, vec![60.0, 61.0, 62.0]);
}

/// Asking for the latest sample before any poll is a typed error naming the
/// node, not a panic.
#[test]
fn test_latest_sample_before_first_poll() {
    let monitor = ThermalMonitor::new(
        NodeId(3),
        Box::new(ScriptedSensor::cool()),
        &thermal_config(70.0, 100),
    );
    assert!(matches!(
        monitor.latest_sample(),
        Err(HeatshedError::NoSamplesYet(NodeId(3)))
    ));
}
