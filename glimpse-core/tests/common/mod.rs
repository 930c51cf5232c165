#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glimpse_core::camera::{CameraBackend, FrameSource};
use glimpse_core::Frame;

/// Counts device opens and releases so tests can check nothing leaks.
#[derive(Debug, Default)]
pub struct DeviceLedger {
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
    pub reads: AtomicUsize,
}

impl DeviceLedger {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn open_handles(&self) -> usize {
        self.opens() - self.releases()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feed {
    /// A small solid frame on every read.
    Frames,
    /// Reads succeed but never produce a frame.
    Nothing,
    /// The device refuses to open.
    Unavailable,
    /// The first `n` reads fail, then frames arrive.
    Flaky(usize),
    /// Every read hangs for `STALL` before returning a frame.
    Stalled,
}

/// How long a `Feed::Stalled` read blocks.
pub const STALL: Duration = Duration::from_secs(3);

pub struct FakeBackend {
    pub ledger: Arc<DeviceLedger>,
    feed: Feed,
}

impl FakeBackend {
    pub fn new(feed: Feed) -> (Self, Arc<DeviceLedger>) {
        init_logging();
        let ledger = Arc::new(DeviceLedger::default());
        (
            Self {
                ledger: Arc::clone(&ledger),
                feed,
            },
            ledger,
        )
    }
}

impl CameraBackend for FakeBackend {
    fn open(&self, device_index: i32, _width: u32, _height: u32) -> anyhow::Result<Box<dyn FrameSource>> {
        if self.feed == Feed::Unavailable {
            anyhow::bail!("no such device: video{}", device_index);
        }
        self.ledger.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSource {
            ledger: Arc::clone(&self.ledger),
            feed: self.feed,
            opened: true,
        }))
    }
}

struct FakeSource {
    ledger: Arc<DeviceLedger>,
    feed: Feed,
    opened: bool,
}

impl FrameSource for FakeSource {
    fn read(&mut self) -> anyhow::Result<Option<Frame>> {
        // Real devices block until the next frame.
        let delay = match self.feed {
            Feed::Stalled => STALL,
            _ => Duration::from_millis(2),
        };
        thread::sleep(delay);
        let n = self.ledger.reads.fetch_add(1, Ordering::SeqCst);
        let frame = Frame::filled(8, 6, [(n % 256) as u8, 80, 160]);
        match self.feed {
            Feed::Frames | Feed::Stalled => Ok(Some(frame)),
            Feed::Flaky(failures) if n < failures => anyhow::bail!("read {} timed out", n),
            Feed::Flaky(_) => Ok(Some(frame)),
            Feed::Nothing | Feed::Unavailable => Ok(None),
        }
    }

    fn is_opened(&self) -> bool {
        self.opened
    }

    fn release(&mut self) {
        if self.opened {
            self.opened = false;
            self.ledger.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Show `log` output from the crate under test with `RUST_LOG=debug`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn wait_for<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Receive from an async channel without an executor.
pub fn recv_within<T>(rx: &async_channel::Receiver<T>, timeout: Duration) -> Option<T> {
    let deadline = Instant::now() + timeout;
    loop {
        match rx.try_recv() {
            Ok(value) => return Some(value),
            Err(async_channel::TryRecvError::Closed) => return None,
            Err(async_channel::TryRecvError::Empty) => {
                if Instant::now() >= deadline {
                    return None;
                }
                thread::sleep(Duration::from_millis(5));
            }
        }
    }
}
