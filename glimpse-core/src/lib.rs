//! Camera capture, enrollment and recognizer plumbing behind the Glimpse
//! face login window. Face encoding and matching happen in an external
//! recognizer program; this crate captures images for it and interprets
//! what it prints.

pub mod camera;
pub mod config;
pub mod enroll;
pub mod error;
pub mod frame;
pub mod outcome;
pub mod panel;
pub mod runner;
pub mod session;

pub use camera::{CameraBackend, CameraService, FrameSource, OpencvBackend};
pub use config::GlimpseConfig;
pub use error::{Error, Result};
pub use frame::{Frame, FrameStore};
pub use outcome::{classify_login, LoginOutcome};
pub use panel::{PanelState, Welcome};
pub use runner::{CommandOutput, ProcessRunner};
pub use session::{FaceLoginSession, SessionEvent};

