mod common;

use std::time::{Duration, Instant};

use common::{wait_for, FakeBackend, Feed, STALL};
use glimpse_core::CameraService;

#[test]
fn start_then_stop_releases_the_device() {
    let (backend, ledger) = FakeBackend::new(Feed::Nothing);
    let camera = CameraService::new(backend);

    assert!(camera.start(0, 640, 480));
    assert!(camera.is_running());
    camera.stop();

    assert!(!camera.is_running());
    assert_eq!(ledger.opens(), 1);
    assert_eq!(ledger.releases(), 1);
}

#[test]
fn restart_stops_the_previous_session() {
    let (backend, ledger) = FakeBackend::new(Feed::Frames);
    let camera = CameraService::new(backend);

    assert!(camera.start(0, 640, 480));
    assert!(camera.start(1, 1280, 720));

    assert!(camera.is_running());
    assert_eq!(ledger.opens(), 2);
    assert_eq!(ledger.open_handles(), 1);

    camera.stop();
    assert_eq!(ledger.open_handles(), 0);
}

#[test]
fn open_failure_leaves_nothing_running() {
    let (backend, ledger) = FakeBackend::new(Feed::Unavailable);
    let camera = CameraService::new(backend);

    assert!(!camera.start(3, 640, 480));
    assert!(!camera.is_running());
    assert!(camera.latest_frame().is_none());
    assert!(camera.last_error().unwrap().contains("video3"));
    assert_eq!(ledger.open_handles(), 0);
}

#[test]
fn no_frame_before_the_first_successful_read() {
    let (backend, _ledger) = FakeBackend::new(Feed::Nothing);
    let camera = CameraService::new(backend);
    assert!(camera.latest_frame().is_none());

    assert!(camera.start(0, 640, 480));
    std::thread::sleep(Duration::from_millis(30));
    assert!(camera.latest_frame().is_none());
    camera.stop();
}

#[test]
fn frames_flow_until_stopped() {
    let (backend, _ledger) = FakeBackend::new(Feed::Frames);
    let camera = CameraService::new(backend);
    assert!(camera.start(0, 640, 480));

    assert!(wait_for(Duration::from_secs(2), || camera.latest_frame().is_some()));
    let frame = camera.latest_frame().unwrap();
    assert_eq!((frame.width, frame.height, frame.channels), (8, 6, 3));

    camera.stop();
    assert!(camera.latest_frame().is_none());
}

#[test]
fn stop_when_idle_is_a_no_op() {
    let (backend, ledger) = FakeBackend::new(Feed::Frames);
    let camera = CameraService::new(backend);
    camera.stop();
    camera.stop();
    assert!(!camera.is_running());
    assert_eq!(ledger.opens(), 0);
}

#[test]
fn dropping_the_service_releases_the_device() {
    let (backend, ledger) = FakeBackend::new(Feed::Frames);
    {
        let camera = CameraService::new(backend);
        assert!(camera.start(0, 640, 480));
    }
    assert_eq!(ledger.open_handles(), 0);
}

#[test]
fn failed_reads_are_retried_silently() {
    let (backend, ledger) = FakeBackend::new(Feed::Flaky(20));
    let camera = CameraService::new(backend);
    assert!(camera.start(0, 640, 480));

    assert!(wait_for(Duration::from_secs(2), || camera.latest_frame().is_some()));
    assert!(camera.is_running());
    assert!(camera.last_error().is_none());
    assert!(ledger.reads.load(std::sync::atomic::Ordering::SeqCst) > 20);

    camera.stop();
    assert_eq!(ledger.open_handles(), 0);
}

#[test]
fn stop_does_not_wait_out_a_hung_read() {
    let (backend, ledger) = FakeBackend::new(Feed::Stalled);
    let camera = CameraService::new(backend);
    assert!(camera.start(0, 640, 480));
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    camera.stop();
    let took = started.elapsed();

    assert!(took < Duration::from_secs(1), "stop blocked for {:?}", took);
    assert!(!camera.is_running());
    assert!(camera.latest_frame().is_none());

    // The capture thread lets go of the device once its read returns.
    assert!(wait_for(STALL * 2, || ledger.open_handles() == 0));
    assert_eq!(ledger.releases(), 1);
}

#[test]
fn restart_after_a_hung_read_serves_only_new_frames() {
    let (backend, ledger) = FakeBackend::new(Feed::Stalled);
    let camera = CameraService::new(backend);
    assert!(camera.start(0, 640, 480));
    std::thread::sleep(Duration::from_millis(50));
    camera.stop();

    assert!(camera.start(0, 640, 480));
    // The first session's read returns during this wait; its frame must not
    // show up in the new session.
    std::thread::sleep(STALL - Duration::from_millis(500));
    assert!(wait_for(Duration::from_millis(700), || ledger.open_handles() == 1));
    assert!(camera.latest_frame().is_none());

    camera.stop();
}
