//! Enrollment and login flows. Background work reports back only through
//! [`SessionEvent`] messages; the receiving side owns all UI state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use async_channel::{Receiver, Sender};
use log::{error, info, warn};

use crate::camera::CameraService;
use crate::config::GlimpseConfig;
use crate::enroll::{self, CapturePlan, EnrollOutcome};
use crate::error::{Error, Result};
use crate::outcome::{classify_login, enrollment_status, LoginOutcome};
use crate::runner::ProcessRunner;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    CaptureProgress { saved: usize, total: usize },
    /// All images saved and the camera released; the recognizer is encoding.
    CaptureFinished { username: String, images: usize },
    EnrollCancelled { saved: usize },
    EnrollFailed(String),
    /// Recognizer status after encoding the new images.
    EnrollFinished(String),
    LoginFinished(LoginOutcome),
    CameraStopped,
}

pub struct FaceLoginSession {
    camera: Arc<CameraService>,
    runner: Arc<ProcessRunner>,
    config: GlimpseConfig,
    events: Sender<SessionEvent>,
    enrolling: Arc<AtomicBool>,
}

impl FaceLoginSession {
    pub fn new(camera: Arc<CameraService>, config: GlimpseConfig) -> (Self, Receiver<SessionEvent>) {
        let (events, rx) = async_channel::unbounded();
        let session = Self {
            camera,
            runner: Arc::new(ProcessRunner::new()),
            config,
            events,
            enrolling: Arc::new(AtomicBool::new(false)),
        };
        (session, rx)
    }

    pub fn camera(&self) -> &Arc<CameraService> {
        &self.camera
    }

    pub fn config(&self) -> &GlimpseConfig {
        &self.config
    }

    pub fn is_enrolling(&self) -> bool {
        self.enrolling.load(Ordering::SeqCst)
    }

    /// Start the camera, save the enrollment images in the background and
    /// then hand them to the recognizer.
    ///
    /// Bad usernames and an unavailable camera are reported here; everything
    /// after that arrives as events.
    pub fn enroll(&self, raw_username: &str) -> Result<()> {
        let username = enroll::validate_username(raw_username)?;

        if self.enrolling.swap(true, Ordering::SeqCst) {
            return Err(Error::Busy);
        }

        let cam = &self.config.camera;
        if !self.camera.start(cam.device_index, cam.frame_width, cam.frame_height) {
            self.enrolling.store(false, Ordering::SeqCst);
            return Err(Error::CameraUnavailable {
                device_index: cam.device_index,
                reason: self
                    .camera
                    .last_error()
                    .unwrap_or_else(|| "device did not open".to_string()),
            });
        }

        let plan = CapturePlan::new(&self.config.enrollment, &username);
        let command = self.config.recognizer.enroll_command(&username);
        let camera = Arc::clone(&self.camera);
        let runner = Arc::clone(&self.runner);
        let events = self.events.clone();
        let enrolling = Arc::clone(&self.enrolling);

        let spawned = thread::Builder::new()
            .name("enrollment".to_string())
            .spawn(move || {
                let progress_events = events.clone();
                let outcome = enroll::capture_images(&camera, &plan, |saved, total| {
                    emit(&progress_events, SessionEvent::CaptureProgress { saved, total });
                });
                camera.stop();

                match outcome {
                    EnrollOutcome::Completed { saved } => {
                        info!("Captured {} images for {}, running recognizer", saved.len(), username);
                        emit(
                            &events,
                            SessionEvent::CaptureFinished {
                                username,
                                images: saved.len(),
                            },
                        );
                        runner.execute_async(command, move |result| {
                            enrolling.store(false, Ordering::SeqCst);
                            emit(&events, SessionEvent::EnrollFinished(enrollment_status(&result)));
                        });
                    }
                    EnrollOutcome::Cancelled { saved } => {
                        enrolling.store(false, Ordering::SeqCst);
                        emit(&events, SessionEvent::EnrollCancelled { saved });
                    }
                    EnrollOutcome::Failed(e) => {
                        error!("Enrollment for {} failed: {}", username, e);
                        enrolling.store(false, Ordering::SeqCst);
                        emit(&events, SessionEvent::EnrollFailed(e.to_string()));
                    }
                }
            });

        if let Err(e) = spawned {
            self.camera.stop();
            self.enrolling.store(false, Ordering::SeqCst);
            return Err(Error::Thread(e));
        }
        Ok(())
    }

    /// Ask the recognizer who is in front of the camera. The preview is
    /// stopped first so the recognizer can open the device.
    pub fn login(&self) {
        if self.camera.is_running() {
            info!("Releasing camera for the recognizer");
            self.stop_camera();
        }
        let events = self.events.clone();
        self.runner
            .execute_async(self.config.recognizer.login_command(), move |result| {
                let outcome = classify_login(&result);
                match &outcome {
                    LoginOutcome::Recognized { username } => info!("Recognized {}", username),
                    LoginOutcome::Rejected { message } => info!("Login rejected: {}", message),
                }
                emit(&events, SessionEvent::LoginFinished(outcome));
            });
    }

    /// Stop the camera. An enrollment in progress ends as cancelled.
    pub fn stop_camera(&self) {
        self.camera.stop();
        emit(&self.events, SessionEvent::CameraStopped);
    }

    pub fn shutdown(&self) {
        self.camera.stop();
        self.runner.shutdown();
    }
}

fn emit(events: &Sender<SessionEvent>, event: SessionEvent) {
    if events.try_send(event).is_err() {
        warn!("Session event dropped, receiver is gone");
    }
}
