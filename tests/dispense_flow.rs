//! End-to-end dispensing through the control loop with mock hardware

use rs_dispenser::hal::{
    MockBeam, MockBoard, MockControlLoop, MockFeedMotor, MockMqtt, MockNetwork, MockServo,
    MockThermometer,
};
use rs_dispenser::{Board, Config, ControlLoop, RefillConfig, RefillEvent};
use serde_json::Value;

const CMD: &str = "mediflow/Dispenser_A/command";
const STATUS: &str = "mediflow/Dispenser_A/status";
const HEALTH: &str = "mediflow/Dispenser_A/health";

fn board() -> MockBoard {
    Board::new(MockBeam::new(), MockFeedMotor::new(), MockServo::new())
}

fn setup() -> MockControlLoop {
    let mut control = ControlLoop::new(board(), MockNetwork::new(), MockMqtt::new(), &Config::default());
    control.init().unwrap();
    control
}

fn send(control: &mut MockControlLoop, payload: &str) {
    control
        .connectivity_mut()
        .client_mut()
        .queue_message(CMD, payload.as_bytes().to_vec());
}

fn status_json(control: &MockControlLoop) -> Vec<Value> {
    control
        .connectivity()
        .client()
        .payloads_to(STATUS)
        .iter()
        .map(|p| serde_json::from_str(p).expect("status payload is JSON"))
        .collect()
}

/// Tick through queued beam samples, 20 ms apart, starting at `t`.
fn run(control: &mut MockControlLoop, t: &mut u64, ticks: usize) {
    for _ in 0..ticks {
        control.tick(*t).unwrap();
        *t += 20;
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn single_pill_session_completes() {
    let mut control = setup();
    send(&mut control, r#"{"command":"dispense","quantity":1}"#);
    control.tick(0).unwrap();

    control.beam_mut().queue_samples(&[true, true, false]);
    let mut t = 20;
    run(&mut control, &mut t, 3);

    assert!(!control.session().is_active());
    assert!(!control.actuators().gate_open());
    assert_eq!(control.actuators().gate().angle, Some(0));

    let statuses = status_json(&control);
    let last = statuses.last().unwrap();
    assert_eq!(last["status"], "complete");
    assert_eq!(last["pillCount"], 1);
    assert_eq!(last["targetCount"], 1);
}

#[test]
fn dispense_with_quantity_opens_gate() {
    let mut control = setup();
    send(&mut control, r#"{"command":"dispense","quantity":5}"#);
    control.tick(0).unwrap();

    assert!(control.session().is_active());
    assert_eq!(control.session().target(), 5);
    assert_eq!(control.session().dispensed(), 0);
    assert!(control.actuators().gate_open());
    assert_eq!(control.actuators().gate().angle, Some(90));
}

#[test]
fn dispense_without_quantity_uses_default() {
    let mut control = setup();
    send(&mut control, r#"{"command":"dispense"}"#);
    control.tick(0).unwrap();

    assert_eq!(control.session().target(), 10);
    assert_eq!(status_json(&control)[0]["targetCount"], 10);
}

#[test]
fn unrecognized_payload_changes_nothing() {
    let mut control = setup();
    send(&mut control, r#"{"foo":"bar"}"#);
    let report = control.tick(0).unwrap();

    assert_eq!(report.ignored, 1);
    assert!(!control.session().is_active());
    assert!(status_json(&control).is_empty());
    assert_eq!(control.actuators().feed().level, 0);
}

#[test]
fn refill_runs_once_after_threshold_crossing() {
    let config = Config::default().with_refill(
        RefillConfig::default()
            .with_initial_reservoir(3)
            .with_threshold(3)
            .with_refill_amount(20)
            .with_hold_ms(2000),
    );
    let board = board().with_turntable(MockServo::new());
    let mut control = ControlLoop::new(board, MockNetwork::new(), MockMqtt::new(), &config);
    control.init().unwrap();

    send(&mut control, r#"{"command":"dispense","quantity":5}"#);
    control.tick(0).unwrap();
    control.beam_mut().queue_pill();
    control.tick(20).unwrap();
    let report = control.tick(40).unwrap();
    assert!(report.pill_passed);
    assert_eq!(report.refill, Some(RefillEvent::Started));

    let refill = control.refill().unwrap();
    assert_eq!(refill.state().reservoir, 2);
    assert!(refill.state().refilling);

    // No second trigger during the hold
    let mut started = 0;
    let mut completed = None;
    let mut t = 60;
    while t <= 2100 {
        let r = control.tick(t).unwrap();
        match r.refill {
            Some(RefillEvent::Started) => started += 1,
            Some(RefillEvent::Completed(n)) => completed = Some(n),
            None => {}
        }
        t += 20;
    }
    assert_eq!(started, 0);
    assert_eq!(completed, Some(22));
    let refill = control.refill().unwrap();
    assert!(!refill.state().refilling);
    assert_eq!(refill.turntable().history, vec![0, 180, 0]);
}

// ============================================================================
// Full sessions
// ============================================================================

#[test]
fn five_pill_session_publishes_every_step() {
    let mut control = setup();
    send(
        &mut control,
        r#"{"command":"dispense","medicine_name":"Aspirin","quantity":5,"prescription_id":"RX-19"}"#,
    );
    control.tick(0).unwrap();

    for _ in 0..5 {
        control.beam_mut().queue_pill();
    }
    let mut t = 20;
    run(&mut control, &mut t, 12);

    let statuses = status_json(&control);
    assert_eq!(statuses.len(), 7);
    assert_eq!(statuses[0]["status"], "dispensing_started");
    assert_eq!(statuses[0]["prescription_id"], "RX-19");
    for (i, s) in statuses[1..6].iter().enumerate() {
        assert_eq!(s["pillCount"], i as u64 + 1);
        assert_eq!(s["targetCount"], 5);
    }
    assert_eq!(statuses[6]["status"], "complete");
    assert_eq!(statuses[6]["pillCount"], 5);
}

#[test]
fn no_overshoot_after_completion() {
    let mut control = setup();
    send(&mut control, r#"{"command":"dispense","quantity":2}"#);
    control.tick(0).unwrap();

    // Three pills fall through before anything else happens
    for _ in 0..3 {
        control.beam_mut().queue_pill();
    }
    let mut t = 20;
    run(&mut control, &mut t, 8);

    assert_eq!(control.session().dispensed(), 2);
    let completes = status_json(&control)
        .iter()
        .filter(|s| s["status"] == "complete")
        .count();
    assert_eq!(completes, 1);
}

#[test]
fn long_blocked_run_counts_once() {
    let mut control = setup();
    send(&mut control, r#"{"command":"dispense","quantity":3}"#);
    control.tick(0).unwrap();

    let mut samples = vec![true; 50];
    samples.push(false);
    control.beam_mut().queue_samples(&samples);
    let mut t = 20;
    run(&mut control, &mut t, 60);

    assert_eq!(control.session().dispensed(), 1);
    assert!(control.session().is_active());
}

#[test]
fn counting_continues_while_broker_down() {
    let mut mqtt = MockMqtt::new();
    mqtt.queue_message(CMD, br#"{"command":"dispense","quantity":2}"#.to_vec());
    let mut control = ControlLoop::new(board(), MockNetwork::new(), mqtt, &Config::default());
    control.tick(0).unwrap();
    assert!(control.session().is_active());

    // Broker goes away and refuses reconnects
    control.connectivity_mut().client_mut().connected = false;
    control.connectivity_mut().client_mut().connect_failures = u32::MAX;

    control.beam_mut().queue_pill();
    control.beam_mut().queue_pill();
    let mut dropped = 0;
    for i in 1..=5 {
        dropped += control.tick(i * 20).unwrap().dropped;
    }

    assert!(!control.session().is_active());
    assert_eq!(control.session().dispensed(), 2);
    assert_eq!(dropped, 3);
    assert!(!control.connectivity().state().transport_up);
}

#[test]
fn every_payload_is_json() {
    let board = board().with_thermometer(MockThermometer::new(24.25));
    let mut control = ControlLoop::new(board, MockNetwork::new(), MockMqtt::new(), &Config::default());
    send(
        &mut control,
        r#"{"command":"dispense","quantity":1,"prescription_id":"quote\"back\\slash"}"#,
    );
    control.tick(0).unwrap();
    control.beam_mut().queue_pill();
    control.tick(20).unwrap();
    control.tick(40).unwrap();
    control.tick(30_000).unwrap();
    control.thermometer_mut().unwrap().fault();
    control.tick(60_000).unwrap();

    for (_, payload, _) in &control.connectivity().client().published {
        let text = std::str::from_utf8(payload).unwrap();
        serde_json::from_str::<Value>(text).unwrap_or_else(|e| panic!("{text}: {e}"));
    }

    let started = &status_json(&control)[0];
    assert_eq!(started["prescription_id"], "quote\"back\\slash");

    let health: Vec<Value> = control
        .connectivity()
        .client()
        .payloads_to(HEALTH)
        .iter()
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    assert_eq!(health[0]["status"], "online");
    assert_eq!(health[1]["temperature"], 24.25);
    assert!(health[2]["temperature"].is_null());
}
