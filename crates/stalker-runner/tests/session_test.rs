//! Integration tests for the device session over an in-memory transport.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use stalker_hci::{Command, DeviceInit, Notification, ProtocolError};
use stalker_runner::{memory_pair, DeviceSession, MemoryDevice, MemoryTransport, SessionConfig, SessionError, SessionState};

const IO_TIMEOUT_MS: u64 = 20;
const WAIT: Duration = Duration::from_secs(2);

/// Helper to start a session without the init command.
fn start_session() -> (DeviceSession<MemoryTransport>, MemoryDevice, Receiver<Notification>) {
    start_session_with(SessionConfig {
        io_timeout_ms: IO_TIMEOUT_MS,
        init_device: false,
    })
}

fn start_session_with(config: SessionConfig) -> (DeviceSession<MemoryTransport>, MemoryDevice, Receiver<Notification>) {
    let (transport, device) = memory_pair(config.io_timeout());
    let (tx, rx) = crossbeam_channel::unbounded::<Notification>();
    let mut session = DeviceSession::new(transport, config);
    session.start(tx).expect("session should start");
    (session, device, rx)
}

fn recv(rx: &Receiver<Notification>) -> Notification {
    rx.recv_timeout(WAIT).expect("should receive notification")
}

/// Log writer that keeps everything in memory.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Drop `session` and return what the drop logged at warn level.
fn drop_capturing_logs(session: DeviceSession<MemoryTransport>) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, || drop(session));
    let text = String::from_utf8_lossy(&captured.0.lock()).into_owned();
    text
}

fn shutdown(mut session: DeviceSession<MemoryTransport>) {
    session.stop();
    session.join(false).expect("clean shutdown");
}

// ============================================================================
// Outbound
// ============================================================================

#[test]
fn test_commands_transmitted_in_order() {
    let (session, device, _rx) = start_session();

    let commands: Vec<Command> = (1..=3u16)
        .map(|i| Command::with_format(0xfe00 + i, "BH", &[(i as u8).into(), (i * 100).into()]).unwrap())
        .collect();
    for command in &commands {
        session.enqueue(command.clone());
    }

    for command in &commands {
        let written = device.recv_written(WAIT).expect("command should be written");
        assert_eq!(written, command.encode(), "each command is one complete write");
    }
    assert!(device.try_written().is_none());

    shutdown(session);
}

#[test]
fn test_init_command_sent_on_start() {
    let (session, device, _rx) = start_session_with(SessionConfig {
        io_timeout_ms: IO_TIMEOUT_MS,
        init_device: true,
    });

    let written = device.recv_written(WAIT).expect("init should be written");
    assert_eq!(written, DeviceInit::default().build().unwrap().encode());
    assert_eq!(&written[..3], &[0x01, 0x00, 0xfe]);

    shutdown(session);
}

#[test]
fn test_enqueue_from_other_thread() {
    let (session, device, _rx) = start_session();
    let queue = session.queue();

    let producer = std::thread::spawn(move || {
        for i in 0..10u8 {
            queue.enqueue(Command::from_params(0x0100, vec![i]).unwrap());
        }
    });
    producer.join().unwrap();

    for i in 0..10u8 {
        let written = device.recv_written(WAIT).unwrap();
        assert_eq!(written, vec![0x01, 0x00, 0x01, 0x01, i]);
    }

    shutdown(session);
}

// ============================================================================
// Inbound
// ============================================================================

#[test]
fn test_core_and_le_events_named() {
    let (session, device, rx) = start_session();

    device.inject(&[0x04, 0x05, 0x04, 0x00, 0x40, 0x00, 0x13]);
    device.inject(&[0x04, 0x3e, 0x01, 0x01]);

    let core = recv(&rx);
    assert_eq!(core.kind(), "core");
    assert_eq!(core.name(), Some("Disconnection Complete"));
    assert_eq!(core.event().unwrap().params().len(), 4);

    let le = recv(&rx);
    assert_eq!(le.kind(), "le");
    assert_eq!(le.name(), Some("LE Connection Complete"));

    shutdown(session);
}

#[test]
fn test_unknown_sub_event_does_not_stop_reader() {
    let (session, device, rx) = start_session();

    device.inject(&[0x04, 0x3e, 0x02, 0x99, 0x00]);
    device.inject(&[0x04, 0x0f, 0x04, 0x00, 0x01, 0x04, 0xfe]);

    let unknown = recv(&rx);
    assert_eq!(unknown.anomaly(), Some(ProtocolError::UnknownSubEvent(Some(0x99))));

    let next = recv(&rx);
    assert_eq!(next.name(), Some("Command Status"));
    assert!(session.is_alive());

    shutdown(session);
}

#[test]
fn test_malformed_byte_resumes_at_next_byte() {
    let (session, device, rx) = start_session();

    // 0x02 is stray; the 0x04 right after it starts a valid frame.
    device.inject(&[0x02, 0x04, 0x0e, 0x01, 0x01]);

    assert_eq!(recv(&rx), Notification::MalformedFrame(0x02));
    assert_eq!(recv(&rx).name(), Some("Command Complete"));

    shutdown(session);
}

#[test]
fn test_vendor_and_unknown_events() {
    let (session, device, rx) = start_session();

    device.inject(&[0x04, 0xff, 0x03, 0x0d, 0x06, 0x00]);
    device.inject(&[0x04, 0x42, 0x00]);

    let vendor = recv(&rx);
    assert_eq!(vendor.kind(), "vendor");
    assert_eq!(vendor.name(), Some("GAP_DeviceInformation"));

    let unknown = recv(&rx);
    assert_eq!(unknown.anomaly(), Some(ProtocolError::UnknownEventCode(0x42)));

    shutdown(session);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_state_transitions() {
    let (transport, _device) = memory_pair(Duration::from_millis(IO_TIMEOUT_MS));
    let mut session = DeviceSession::new(
        transport,
        SessionConfig {
            io_timeout_ms: IO_TIMEOUT_MS,
            init_device: false,
        },
    );
    assert_eq!(session.state(), SessionState::Stopped);

    let (tx, _rx) = crossbeam_channel::unbounded::<Notification>();
    session.start(tx).unwrap();
    assert_eq!(session.state(), SessionState::Running);

    let (tx, _rx2) = crossbeam_channel::unbounded::<Notification>();
    assert!(matches!(session.start(tx), Err(SessionError::AlreadyRunning)));

    session.stop();
    assert_eq!(session.state(), SessionState::Stopping);

    session.join(false).unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
    assert!(!session.is_alive());
}

#[test]
fn test_shutdown_within_io_timeout() {
    let (mut session, _device, _rx) = start_session();

    let started = Instant::now();
    session.stop();
    session.join(false).unwrap();

    // One I/O timeout per loop plus generous scheduling slack.
    assert!(started.elapsed() < Duration::from_millis(IO_TIMEOUT_MS * 10 + 500));
    assert!(!session.is_alive());
}

#[test]
fn test_stop_reader_keeps_writer() {
    let (mut session, device, rx) = start_session();

    session.stop_reader();
    // Give the reader one poll to notice.
    std::thread::sleep(Duration::from_millis(IO_TIMEOUT_MS * 5));
    device.inject(&[0x04, 0x0e, 0x00]);
    assert!(rx.recv_timeout(Duration::from_millis(IO_TIMEOUT_MS * 5)).is_err());

    session.enqueue(Command::from_params(0xfe04, vec![3, 1, 0]).unwrap());
    assert_eq!(
        device.recv_written(WAIT),
        Some(vec![0x01, 0x04, 0xfe, 0x03, 0x03, 0x01, 0x00])
    );
    assert_eq!(session.pending(), 0);

    session.stop();
    session.join(true).unwrap();
    assert_eq!(session.state(), SessionState::Stopping);
    session.join(false).unwrap();
    assert_eq!(session.state(), SessionState::Stopped);
}

#[test]
fn test_transport_fault_reaches_owner() {
    let (mut session, device, _rx) = start_session();

    device.fail();

    let deadline = Instant::now() + WAIT;
    while session.is_alive() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!session.is_alive(), "fault should clear alive");

    let err = session.join(false).unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
}

#[test]
fn test_device_disconnect_is_fault() {
    let (mut session, device, _rx) = start_session();
    drop(device);

    let err = session.join(false).unwrap_err();
    assert!(matches!(err, SessionError::Transport(_)));
    assert!(!session.is_alive());
}

#[test]
fn test_restart_after_join() {
    let (mut session, device, _rx) = start_session();
    session.stop();
    session.join(false).unwrap();

    session.enqueue(Command::from_params(0x0001, Vec::<u8>::new()).unwrap());
    let (tx, _rx) = crossbeam_channel::unbounded::<Notification>();
    session.start(tx).unwrap();

    assert_eq!(device.recv_written(WAIT), Some(vec![0x01, 0x01, 0x00, 0x00]));
    shutdown(session);
}

// ============================================================================
// Drop
// ============================================================================

#[test]
fn test_drop_running_session_waits_for_workers() {
    let (session, device, _rx) = start_session();
    let flags_view = session.stop_handle();

    let started = Instant::now();
    let logs = drop_capturing_logs(session);
    assert!(started.elapsed() < WAIT);
    assert!(!flags_view.is_alive());
    assert!(logs.contains("session dropped without join"), "{}", logs);
    assert!(!logs.contains("detaching"), "{}", logs);
    assert!(!logs.contains("worker failed"), "{}", logs);
    drop(device);
}

#[test]
fn test_drop_logs_worker_fault() {
    let (session, device, _rx) = start_session();
    device.fail();

    let deadline = Instant::now() + WAIT;
    while session.is_alive() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(!session.is_alive(), "fault should clear alive");

    let logs = drop_capturing_logs(session);
    assert!(logs.contains("worker failed before drop"), "{}", logs);
    assert!(logs.contains("reader"), "{}", logs);
}

#[test]
fn test_drop_after_join_is_quiet() {
    let (mut session, _device, _rx) = start_session();
    session.stop();
    session.join(false).unwrap();

    assert_eq!(drop_capturing_logs(session), "");
}
