//! What the main window shows. Lives on the UI thread only; background work
//! reaches it through [`SessionEvent`]s.

use crate::error::Error;
use crate::outcome::LoginOutcome;
use crate::session::SessionEvent;

pub const IDLE_STATUS: &str = "Enter a username to enroll, or log in by face";

/// A successful login the UI should greet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PanelState {
    pub status: String,
    pub busy: bool,
    /// Enrollment progress in `0.0..=1.0`.
    pub progress: f64,
    pub preview_active: bool,
}

impl Default for PanelState {
    fn default() -> Self {
        Self {
            status: IDLE_STATUS.to_string(),
            busy: false,
            progress: 0.0,
            preview_active: false,
        }
    }
}

impl PanelState {
    /// Capture and login buttons are only usable while nothing is running.
    pub fn controls_enabled(&self) -> bool {
        !self.busy
    }

    pub fn begin_enroll(&mut self) {
        self.busy = true;
        self.progress = 0.0;
        self.preview_active = true;
        self.status = "Starting camera...".to_string();
    }

    pub fn begin_login(&mut self) {
        self.busy = true;
        self.preview_active = false;
        self.status = "Recognizing face...".to_string();
    }

    /// A flow could not start.
    pub fn fail(&mut self, error: &Error) {
        self.busy = false;
        self.preview_active = false;
        self.progress = 0.0;
        self.status = error.to_string();
    }

    pub fn apply(&mut self, event: &SessionEvent) -> Option<Welcome> {
        match event {
            SessionEvent::CaptureProgress { saved, total } => {
                self.status = format!("Saved {}/{} images", saved, total);
                self.progress = if *total == 0 {
                    0.0
                } else {
                    *saved as f64 / *total as f64
                };
            }
            SessionEvent::CaptureFinished { username, .. } => {
                self.preview_active = false;
                self.status = format!("Capturing done for {}, encoding faces...", username);
            }
            SessionEvent::EnrollCancelled { saved } => {
                self.busy = false;
                self.preview_active = false;
                self.progress = 0.0;
                self.status = format!("Enrollment cancelled after {} images", saved);
            }
            SessionEvent::EnrollFailed(message) => {
                self.busy = false;
                self.preview_active = false;
                self.progress = 0.0;
                self.status = message.clone();
            }
            SessionEvent::EnrollFinished(message) => {
                self.busy = false;
                self.progress = 1.0;
                self.status = message.clone();
            }
            SessionEvent::LoginFinished(LoginOutcome::Recognized { username }) => {
                self.busy = false;
                self.status = format!("Welcome, {}!", username);
                return Some(Welcome {
                    username: username.clone(),
                });
            }
            SessionEvent::LoginFinished(LoginOutcome::Rejected { message }) => {
                self.busy = false;
                self.status = message.clone();
            }
            SessionEvent::CameraStopped => {
                self.preview_active = false;
            }
        }
        None
    }
}
