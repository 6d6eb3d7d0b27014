//! Property tests for counting, parsing, telemetry and refill

use proptest::prelude::*;
use rs_dispenser::hal::{MockBeam, MockBoard, MockFeedMotor, MockMqtt, MockNetwork, MockServo};
use rs_dispenser::{
    Board, Command, Config, ControlLoop, EdgeDetector, EdgeEvent, RefillConfig, RefillEvent,
    RefillUnit, TelemetryTimer,
};

/// Number of maximal blocked runs that are followed by a clear sample.
fn closed_runs(samples: &[bool]) -> usize {
    samples.windows(2).filter(|w| w[0] && !w[1]).count()
}

proptest! {
    // ========================================================================
    // Edge counting
    // ========================================================================

    #[test]
    fn one_event_per_closed_blocked_run(samples in prop::collection::vec(any::<bool>(), 0..200)) {
        let mut edge = EdgeDetector::new();
        let events = samples
            .iter()
            .filter(|&&s| edge.sample(s) == EdgeEvent::PillPassed)
            .count();
        prop_assert_eq!(events, closed_runs(&samples));
    }

    #[test]
    fn session_never_overshoots(
        target in 1u32..20,
        samples in prop::collection::vec(any::<bool>(), 0..300),
    ) {
        let board: MockBoard = Board::new(MockBeam::new(), MockFeedMotor::new(), MockServo::new());
        let mut mqtt = MockMqtt::new();
        mqtt.queue_message(
            "mediflow/Dispenser_A/command",
            format!(r#"{{"command":"dispense","quantity":{target}}}"#).into_bytes(),
        );
        let mut control = ControlLoop::new(board, MockNetwork::new(), mqtt, &Config::default());
        control.tick(0).unwrap();

        control.beam_mut().queue_samples(&samples);
        let mut completions = 0;
        for i in 0..samples.len() as u64 {
            if control.tick(20 * (i + 1)).unwrap().completed {
                completions += 1;
                // Stopped in the same tick
                prop_assert_eq!(control.actuators().feed().level, 0);
                prop_assert_eq!(control.actuators().gate().angle, Some(0));
            }
        }

        // The first sample is compared against the clear state seen at tick 0
        let mut with_start = vec![false];
        with_start.extend_from_slice(&samples);
        let pills = closed_runs(&with_start) as u32;

        prop_assert_eq!(control.session().dispensed(), pills.min(target));
        prop_assert_eq!(control.session().is_active(), pills < target);
        prop_assert_eq!(completions, u32::from(pills >= target));
    }

    // ========================================================================
    // Parser
    // ========================================================================

    #[test]
    fn parse_is_total(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = Command::parse(&bytes);
    }

    #[test]
    fn parse_is_total_on_json_like_input(s in r#"[{}\[\]":,\\a-z0-9 \-.]{0,80}"#) {
        let _ = Command::parse(s.as_bytes());
    }

    #[test]
    fn truncated_commands_never_fault(cut in 0usize..80) {
        let payload = br#"{"command":"dispense","quantity":12,"prescription_id":"RX-A"}"#;
        let _ = Command::parse_delivery(payload, cut);
    }

    #[test]
    fn quantity_round_trips(q in any::<u32>()) {
        let payload = format!(r#"{{"command":"dispense","quantity":{q}}}"#);
        let cmd = Command::parse(payload.as_bytes());
        prop_assert_eq!(cmd.dispense().map(|r| r.target()), Some(q));
    }

    #[test]
    fn non_numeric_quantity_defaults(value in r#""[a-z]{0,8}"|true|false|null|\[\]|\{\}"#) {
        let payload = format!(r#"{{"command":"dispense","quantity":{value}}}"#);
        let cmd = Command::parse(payload.as_bytes());
        prop_assert_eq!(cmd.dispense().map(|r| r.target()), Some(10));
    }

    #[test]
    fn unknown_keys_are_unrecognized(key in "[a-z_]{1,12}", value in "[a-z]{0,12}") {
        prop_assume!(key != "command" && key != "action");
        let payload = format!(r#"{{"{key}":"{value}"}}"#);
        prop_assert_eq!(Command::parse(payload.as_bytes()), Command::Unrecognized);
    }

    // ========================================================================
    // Telemetry
    // ========================================================================

    #[test]
    fn telemetry_fires_once_per_interval(
        interval in 1u64..5000,
        step in 1u64..200,
        ticks in 1usize..500,
    ) {
        let mut timer = TelemetryTimer::new(interval);
        let mut fires = Vec::new();
        for i in 0..ticks as u64 {
            let now = i * step;
            if timer.poll(now) {
                fires.push(now);
            }
        }
        // Never closer than one interval apart, never more than one tick late
        for w in fires.windows(2) {
            prop_assert!(w[1] - w[0] >= interval);
            prop_assert!(w[1] - w[0] < interval + step);
        }
        let end = (ticks as u64 - 1) * step;
        if end >= interval + step {
            prop_assert!(!fires.is_empty());
        }
    }

    // ========================================================================
    // Refill
    // ========================================================================

    #[test]
    fn refill_single_trigger_per_crossing(
        initial in 0i32..40,
        threshold in 1i32..10,
        pills in 0usize..60,
        hold in 1u32..100,
    ) {
        let cfg = RefillConfig::default()
            .with_initial_reservoir(initial)
            .with_threshold(threshold)
            .with_refill_amount(20)
            .with_hold_ms(hold);
        let mut unit = RefillUnit::new(MockServo::new(), &cfg);

        let mut now = 0;
        let mut in_cycle = false;
        for _ in 0..pills {
            unit.on_pill_dispensed();
            for _ in 0..10 {
                now += 20;
                match unit.update(now).unwrap() {
                    Some(RefillEvent::Started) => {
                        prop_assert!(!in_cycle);
                        in_cycle = true;
                    }
                    Some(RefillEvent::Completed(_)) => {
                        prop_assert!(in_cycle);
                        in_cycle = false;
                    }
                    None => {}
                }
                prop_assert_eq!(unit.state().refilling, in_cycle);
            }
        }
        if pills > 0 && !in_cycle {
            prop_assert!(unit.state().reservoir >= threshold);
        }
    }
}
