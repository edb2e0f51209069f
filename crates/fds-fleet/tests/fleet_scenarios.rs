//! ---
//! fds_section: "04-fleet-orchestration"
//! fds_subsection: "tests"
//! fds_type: "source"
//! fds_scope: "test"
//! fds_description: "End-to-end fleet scenarios against the loopback transport."
//! fds_version: "v0.1.0"
//! fds_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use fds_device::{Location, LoopbackTransport, PumpDeviceSpec};
use fds_fleet::{FleetOrchestrator, FleetSpec};
use fds_telemetry::generate_pump_telemetry;
use tokio::time::{sleep, timeout};

const SAMPLE: usize = 60;
const TRANSITION: usize = 10;

/// Scaled-down version of the production scenario: one gradually failing
/// pump, one healthy pump, one abruptly failing pump.
fn scenario() -> FleetSpec {
    let devices = vec![
        PumpDeviceSpec {
            device_number: 1,
            device_key: "key-1".to_owned(),
            serial_number: "DEVICE001".to_owned(),
            ip_address: "192.168.1.1".to_owned(),
            location: Location::new(10.9145, 76.9486),
            telemetry: generate_pump_telemetry(SAMPLE, true, TRANSITION, 41).unwrap(),
        },
        PumpDeviceSpec {
            device_number: 2,
            device_key: "key-2".to_owned(),
            serial_number: "DEVICE002".to_owned(),
            ip_address: "192.168.1.2".to_owned(),
            location: Location::new(11.2321, 77.1067),
            telemetry: generate_pump_telemetry(SAMPLE + TRANSITION, false, 0, 42).unwrap(),
        },
        PumpDeviceSpec {
            device_number: 3,
            device_key: "key-3".to_owned(),
            serial_number: "DEVICE003".to_owned(),
            ip_address: "192.168.1.3".to_owned(),
            location: Location::new(10.5823, 76.9347),
            telemetry: generate_pump_telemetry(SAMPLE + TRANSITION, true, 0, 43).unwrap(),
        },
    ];
    FleetSpec {
        id_scope: "0ne000FDS00".to_owned(),
        dps_endpoint: "loopback".to_owned(),
        cycle_interval: Duration::from_millis(2),
        devices,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn three_pump_scenario_runs_to_completion() {
    let hub = LoopbackTransport::new();
    let fleet = FleetOrchestrator::start(scenario(), hub.clone()).await;

    timeout(Duration::from_secs(10), fleet.await_completion())
        .await
        .expect("fleet completes without outstanding tasks");
    assert!(fleet.tasks().is_empty());

    // gradual: normal + ramp + failed; healthy: normal only; abrupt: both
    // blocks back to back.
    let expected = [
        ("DEVICE001", SAMPLE + TRANSITION + SAMPLE),
        ("DEVICE002", SAMPLE + TRANSITION),
        ("DEVICE003", 2 * (SAMPLE + TRANSITION)),
    ];
    let mut telemetry_total = 0;
    for (device_id, records) in expected {
        let events = hub.connection(device_id).unwrap().events();
        let sent = events
            .iter()
            .filter(|event| event.get("MotorPowerKw").is_some())
            .count();
        assert_eq!(sent, records, "{device_id} sends its full sequence");
        telemetry_total += sent;
    }
    // every device also reports its initial power state
    assert_eq!(fleet.total_messages_sent(), telemetry_total as u64 + 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn operator_interrupt_stops_the_fleet_cleanly() {
    let hub = LoopbackTransport::new();
    let mut spec = scenario();
    spec.cycle_interval = Duration::from_millis(10);
    let fleet = Arc::new(FleetOrchestrator::start(spec, hub.clone()).await);

    let waiter = fleet.clone();
    let completion = tokio::spawn(async move { waiter.await_completion().await });
    sleep(Duration::from_millis(40)).await;

    fleet.cancel_all();
    timeout(Duration::from_millis(500), completion)
        .await
        .expect("every loop stops within one cycle interval")
        .unwrap();

    assert!(fleet.tasks().is_empty());
    for device in fleet.devices() {
        assert!((device.position() as u64) < (SAMPLE + TRANSITION) as u64);
    }
}
