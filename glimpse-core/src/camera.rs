use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};

use crate::frame::{Frame, FrameStore};

/// How long `stop` waits for the capture thread before releasing the device.
pub const STOP_JOIN_TIMEOUT: Duration = Duration::from_millis(500);

/// An opened capture device.
pub trait FrameSource: Send {
    /// Block until the device delivers a frame. `Ok(None)` means the read
    /// produced nothing usable.
    fn read(&mut self) -> Result<Option<Frame>>;

    fn is_opened(&self) -> bool;

    fn release(&mut self);
}

/// Opens capture devices by index.
pub trait CameraBackend: Send + Sync {
    /// `width` and `height` are requests; the device may pick something else.
    fn open(&self, device_index: i32, width: u32, height: u32) -> Result<Box<dyn FrameSource>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OpencvBackend;

impl CameraBackend for OpencvBackend {
    fn open(&self, device_index: i32, width: u32, height: u32) -> Result<Box<dyn FrameSource>> {
        let camera = OpencvCamera::open(device_index, width, height)?;
        Ok(Box::new(camera))
    }
}

pub struct OpencvCamera {
    capture: VideoCapture,
    raw: Mat,
}

impl OpencvCamera {
    pub fn open(device_index: i32, width: u32, height: u32) -> Result<Self> {
        let mut capture = VideoCapture::new(device_index, videoio::CAP_ANY)
            .with_context(|| format!("Failed to open camera {}", device_index))?;

        if !capture.is_opened().unwrap_or(false) {
            anyhow::bail!("Camera {} not opened", device_index);
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width)).ok();
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height)).ok();

        let actual_width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).unwrap_or(0.0);
        let actual_height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0);
        info!(
            "Opened camera {} ({}) at {}x{} (requested {}x{})",
            device_index,
            device_name(device_index),
            actual_width,
            actual_height,
            width,
            height
        );

        Ok(Self {
            capture,
            raw: Mat::default(),
        })
    }
}

impl FrameSource for OpencvCamera {
    fn read(&mut self) -> Result<Option<Frame>> {
        if !self.capture.read(&mut self.raw)? || self.raw.empty() {
            return Ok(None);
        }

        let code = match self.raw.channels() {
            1 => imgproc::COLOR_GRAY2RGB,
            4 => imgproc::COLOR_BGRA2RGB,
            _ => imgproc::COLOR_BGR2RGB,
        };
        let mut rgb = Mat::default();
        imgproc::cvt_color(&self.raw, &mut rgb, code, 0).context("Color conversion failed")?;

        let width = rgb.cols() as u32;
        let height = rgb.rows() as u32;
        let pixels = rgb.data_bytes().context("Failed to get frame data")?.to_vec();

        Ok(Some(Frame {
            pixels,
            width,
            height,
            channels: 3,
        }))
    }

    fn is_opened(&self) -> bool {
        self.capture.is_opened().unwrap_or(false)
    }

    fn release(&mut self) {
        let _ = self.capture.release();
    }
}

impl Drop for OpencvCamera {
    fn drop(&mut self) {
        let _ = self.capture.release();
    }
}

/// V4L2 device name from sysfs, or `video<N>` when unavailable.
pub fn device_name(device_index: i32) -> String {
    let path = format!("/sys/class/video4linux/video{}/name", device_index);
    fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| format!("video{}", device_index))
}

type SharedSource = Arc<Mutex<Option<Box<dyn FrameSource>>>>;

struct Session {
    active: Arc<AtomicBool>,
    device: SharedSource,
    // Per session, so a capture thread that outlives `stop` publishes into
    // a store nobody reads.
    store: Arc<FrameStore>,
    thread: Option<JoinHandle<()>>,
}

/// Owns the camera device and the background capture loop, and exposes the
/// most recent frame.
pub struct CameraService {
    backend: Box<dyn CameraBackend>,
    running: AtomicBool,
    session: Mutex<Option<Session>>,
    last_error: Mutex<Option<String>>,
}

impl CameraService {
    pub fn new(backend: impl CameraBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            running: AtomicBool::new(false),
            session: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn opencv() -> Self {
        Self::new(OpencvBackend)
    }

    /// Open `device_index` and start capturing. Any running session is
    /// stopped first. Returns `false` if the device cannot be opened, in
    /// which case no capture thread is left behind.
    pub fn start(&self, device_index: i32, width: u32, height: u32) -> bool {
        let mut session = lock(&self.session);
        self.stop_session(&mut session);

        let mut source = match self.backend.open(device_index, width, height) {
            Ok(source) => source,
            Err(e) => {
                warn!("Camera {} unavailable: {:#}", device_index, e);
                *lock(&self.last_error) = Some(format!("{:#}", e));
                return false;
            }
        };

        if !source.is_opened() {
            warn!("Camera {} reported closed right after opening", device_index);
            source.release();
            *lock(&self.last_error) = Some(format!("Camera {} not opened", device_index));
            return false;
        }

        let active = Arc::new(AtomicBool::new(true));
        let device: SharedSource = Arc::new(Mutex::new(Some(source)));
        let store = Arc::new(FrameStore::new());

        let spawned = {
            let active = Arc::clone(&active);
            let device = Arc::clone(&device);
            let store = Arc::clone(&store);
            thread::Builder::new()
                .name("camera-capture".to_string())
                .spawn(move || capture_loop(&active, &device, &store))
        };

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Failed to spawn capture thread: {}", e);
                if let Some(mut source) = lock(&device).take() {
                    source.release();
                }
                *lock(&self.last_error) = Some(e.to_string());
                return false;
            }
        };

        *lock(&self.last_error) = None;
        self.running.store(true, Ordering::SeqCst);
        *session = Some(Session {
            active,
            device,
            store,
            thread: Some(handle),
        });
        debug!("Capture session started on camera {}", device_index);
        true
    }

    /// Stop capturing, release the device and drop the stored frame.
    /// Does nothing when not running.
    pub fn stop(&self) {
        let mut session = lock(&self.session);
        self.stop_session(&mut session);
    }

    /// Copy of the most recent frame, if running and one has been captured.
    pub fn latest_frame(&self) -> Option<Frame> {
        if !self.is_running() {
            return None;
        }
        lock(&self.session).as_ref()?.store.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Why the last `start` failed, cleared by the next successful one.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    fn stop_session(&self, slot: &mut Option<Session>) {
        let Some(mut session) = slot.take() else {
            return;
        };

        self.running.store(false, Ordering::SeqCst);
        session.active.store(false, Ordering::SeqCst);

        if let Some(handle) = session.thread.take() {
            let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
            while !handle.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            if handle.is_finished() {
                if handle.join().is_err() {
                    warn!("Capture thread panicked");
                }
            } else {
                warn!(
                    "Capture thread still busy after {:?}, detaching it",
                    STOP_JOIN_TIMEOUT
                );
            }
        }

        // Never wait on a read in progress. If the device is still locked the
        // capture thread releases it when that read returns.
        let taken = match session.device.try_lock() {
            Ok(mut guard) => guard.take(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
            Err(TryLockError::WouldBlock) => None,
        };
        if let Some(mut source) = taken {
            source.release();
        }
        session.store.clear();
        debug!("Capture session stopped");
    }
}

impl Drop for CameraService {
    fn drop(&mut self) {
        self.stop();
    }
}

// TODO: back off after consecutive read failures instead of spinning on a
// camera that keeps erroring.
fn capture_loop(active: &AtomicBool, device: &SharedSource, store: &FrameStore) {
    trace!("Capture loop running");
    while active.load(Ordering::SeqCst) {
        let mut guard = lock(device);
        let Some(source) = guard.as_mut() else {
            break;
        };
        if !source.is_opened() {
            debug!("Camera closed, leaving capture loop");
            break;
        }
        match source.read() {
            Ok(Some(frame)) if !frame.is_empty() && active.load(Ordering::SeqCst) => {
                store.publish(&frame)
            }
            Ok(_) => {}
            Err(e) => trace!("Frame read failed: {:#}", e),
        }
    }
    if let Some(mut source) = lock(device).take() {
        debug!("Releasing camera from the capture thread");
        source.release();
    }
    trace!("Capture loop exited");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
