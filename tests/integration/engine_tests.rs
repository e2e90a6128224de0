//! End-to-end tests: DisplayPad over mock transports with a live reader thread

use displaypad::hid::commands::build_image_frames;
use displaypad::hid::mock::MockTransport;
use displaypad::hid::protocol::{INIT_REPORT, KEY_INDEX_OFFSET};
use displaypad::{
    DisplayPad, EngineConfig, EngineState, EventKind, PadError, PadEvent, PixelBuffer,
    TransportError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(2);

const INIT_ACK: [u8; 3] = [0x11, 0x80, 0x00];
const READY_FOR_PIXELS: [u8; 3] = [0x21, 0x00, 0x00];
const TRANSFER_COMPLETE: [u8; 3] = [0x21, 0x00, 0xFF];

struct Rig {
    pad: DisplayPad,
    device: Arc<MockTransport>,
    display: Arc<MockTransport>,
}

fn rig(recovery_timeout_ms: u64) -> Rig {
    let device = Arc::new(MockTransport::new());
    let display = Arc::new(MockTransport::new());
    let config = EngineConfig {
        recovery_timeout_ms,
        read_timeout_ms: 10,
        ..EngineConfig::default()
    };
    let pad = DisplayPad::with_transports(device.clone(), display.clone(), &config).unwrap();
    Rig {
        pad,
        device,
        display,
    }
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn begin_transfer_keys(writes: &[Vec<u8>]) -> Vec<u8> {
    writes
        .iter()
        .filter(|w| w.len() > KEY_INDEX_OFFSET && w[1] == 0x21)
        .map(|w| w[KEY_INDEX_OFFSET])
        .collect()
}

fn button_report(byte42: u8, byte47: u8) -> Vec<u8> {
    let mut report = vec![0u8; 64];
    report[0] = 0x01;
    report[42] = byte42;
    report[47] = byte47;
    report
}

/// Record every event the pad raises
fn record_events(pad: &DisplayPad) -> Arc<Mutex<Vec<PadEvent>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for kind in EventKind::ALL {
        let log = Arc::clone(&log);
        pad.on(kind, move |event| log.lock().push(event.clone()));
    }
    log
}

#[test]
fn test_full_transfer_cycle() {
    let rig = rig(1000);
    assert_eq!(rig.device.take_writes(), vec![INIT_REPORT.to_vec()]);

    rig.pad.fill_color(3, 0, 255, 0).unwrap();
    assert_eq!(rig.pad.pending_transfers(), 1);
    assert!(rig.device.writes().is_empty());

    rig.device.push_report(&INIT_ACK);
    assert!(rig.device.wait_for_writes(1, WAIT));
    assert_eq!(begin_transfer_keys(&rig.device.writes()), vec![3]);

    rig.device.push_report(&READY_FOR_PIXELS);
    let expected = build_image_frames(&PixelBuffer::solid_color(0, 255, 0).unwrap());
    assert!(rig.display.wait_for_writes(expected.len(), WAIT));
    assert_eq!(rig.display.writes(), expected);

    rig.device.push_report(&TRANSFER_COMPLETE);
    assert!(rig.pad.wait_until_idle(WAIT));
    assert!(wait_for(|| rig.pad.state() == EngineState::Idle));
}

#[test]
fn test_queued_transfers_run_one_at_a_time() {
    let rig = rig(1000);
    rig.device.push_report(&INIT_ACK);
    assert!(wait_for(|| rig.pad.state() == EngineState::Idle));
    rig.device.take_writes();

    for key in [5, 1, 8] {
        rig.pad.clear_key(key).unwrap();
    }
    assert_eq!(begin_transfer_keys(&rig.device.writes()), vec![5]);

    rig.device.push_report(&TRANSFER_COMPLETE);
    assert!(rig.device.wait_for_writes(2, WAIT));
    assert_eq!(begin_transfer_keys(&rig.device.writes()), vec![5, 1]);

    rig.device.push_report(&TRANSFER_COMPLETE);
    rig.device.push_report(&TRANSFER_COMPLETE);
    assert!(rig.pad.wait_until_idle(WAIT));
    assert_eq!(begin_transfer_keys(&rig.device.writes()), vec![5, 1, 8]);
}

#[test]
fn test_clear_all_keys_transfers_every_key() {
    let rig = rig(1000);
    rig.device.push_report(&INIT_ACK);
    assert!(wait_for(|| rig.pad.state() == EngineState::Idle));
    rig.device.take_writes();

    rig.pad.clear_all_keys().unwrap();
    assert_eq!(rig.pad.pending_transfers(), 12);

    for sent in 1..=12 {
        assert!(rig.device.wait_for_writes(sent, WAIT));
        rig.device.push_report(&TRANSFER_COMPLETE);
    }
    assert!(rig.pad.wait_until_idle(WAIT));
    assert_eq!(
        begin_transfer_keys(&rig.device.writes()),
        (0..12).collect::<Vec<u8>>()
    );
}

#[test]
fn test_stalled_transfer_recovers_through_reinit() {
    let rig = rig(100);
    rig.device.push_report(&INIT_ACK);
    assert!(wait_for(|| rig.pad.state() == EngineState::Idle));
    rig.device.take_writes();

    rig.pad.clear_key(2).unwrap();
    assert_eq!(begin_transfer_keys(&rig.device.take_writes()), vec![2]);

    // Device never acknowledges: expect a re-init
    assert!(rig.device.wait_for_writes(1, WAIT));
    assert_eq!(rig.device.take_writes(), vec![INIT_REPORT.to_vec()]);
    assert_eq!(rig.pad.state(), EngineState::Initializing);
    assert_eq!(rig.pad.pending_transfers(), 1);

    // Next init ack retries the same head request
    rig.device.push_report(&INIT_ACK);
    assert!(rig.device.wait_for_writes(1, WAIT));
    assert_eq!(begin_transfer_keys(&rig.device.writes()), vec![2]);

    rig.device.push_report(&TRANSFER_COMPLETE);
    assert!(rig.pad.wait_until_idle(WAIT));
}

#[test]
fn test_key_events_from_button_reports() {
    let rig = rig(1000);
    let log = record_events(&rig.pad);

    rig.device.push_report(&button_report(0x04, 0x00));
    rig.device.push_report(&button_report(0x04, 0x00));
    rig.device.push_report(&button_report(0x04, 0x08));
    rig.device.push_report(&button_report(0x00, 0x08));

    assert!(wait_for(|| log.lock().len() >= 3));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(
        *log.lock(),
        vec![PadEvent::Down(1), PadEvent::Down(10), PadEvent::Up(1)]
    );
}

#[test]
fn test_unknown_reports_are_ignored() {
    let rig = rig(1000);
    let log = record_events(&rig.pad);
    rig.device.take_writes();

    rig.device.push_report(&[0x42, 0x00, 0x00]);
    rig.device.push_report(&[0x21, 0x07, 0x07]);
    rig.device.push_report(&INIT_ACK);

    assert!(wait_for(|| rig.pad.state() == EngineState::Idle));
    assert!(log.lock().is_empty());
    assert!(rig.device.writes().is_empty());
}

#[test]
fn test_read_failure_raises_error_and_stops_reader() {
    let rig = rig(1000);
    let log = record_events(&rig.pad);

    rig.device.push_error(TransportError::Disconnected);
    assert!(wait_for(|| !log.lock().is_empty()));
    assert_eq!(
        *log.lock(),
        vec![PadEvent::Error(PadError::Transport(TransportError::Disconnected))]
    );

    // Reader has stopped: later reports are never processed
    rig.device.push_report(&INIT_ACK);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(rig.pad.state(), EngineState::Initializing);
}

#[test]
fn test_subscribe_receives_events() {
    let rig = rig(1000);
    let mut events = rig.pad.subscribe();

    rig.device.push_report(&button_report(0x00, 0x10));
    rig.device.push_report(&button_report(0x00, 0x00));

    let received = tokio_test::block_on(async {
        let first = events.recv().await;
        let second = events.recv().await;
        (first, second)
    });
    assert_eq!(received, (Some(PadEvent::Down(11)), Some(PadEvent::Up(11))));
}

#[test]
fn test_close_stops_recovery_timer() {
    let rig = rig(50);
    rig.device.push_report(&INIT_ACK);
    assert!(wait_for(|| rig.pad.state() == EngineState::Idle));
    rig.pad.clear_key(0).unwrap();

    rig.pad.close();
    let writes_at_close = rig.device.write_count();
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(rig.device.write_count(), writes_at_close);
    assert!(rig.device.is_closed());
    assert!(rig.display.is_closed());
}
