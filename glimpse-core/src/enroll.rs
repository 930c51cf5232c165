//! Saving the enrollment images for one user.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use log::{debug, info, warn};

use crate::camera::CameraService;
use crate::config::EnrollmentConfig;
use crate::error::{Error, Result};
use crate::frame::Frame;

const JPEG_QUALITY: u8 = 92;

#[derive(Debug, Clone)]
pub struct CapturePlan {
    pub dataset_dir: PathBuf,
    pub username: String,
    pub num_pictures: usize,
    /// Pause after each saved image.
    pub capture_interval: Duration,
    /// Pause while no frame is available yet.
    pub poll_interval: Duration,
}

impl CapturePlan {
    pub fn new(config: &EnrollmentConfig, username: &str) -> Self {
        Self {
            dataset_dir: config.dataset_dir.clone(),
            username: username.to_string(),
            num_pictures: config.num_pictures,
            capture_interval: Duration::from_millis(config.capture_interval_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    pub fn user_dir(&self) -> PathBuf {
        self.dataset_dir.join(&self.username)
    }
}

#[derive(Debug)]
pub enum EnrollOutcome {
    Completed { saved: Vec<PathBuf> },
    /// The camera stopped before every image was taken.
    Cancelled { saved: usize },
    Failed(Error),
}

/// Trimmed username, provided it can serve as a directory name.
pub fn validate_username(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(Error::EmptyUsername);
    }
    let single_component = !name.contains(['/', '\\', '\0']) && name != "." && name != "..";
    if !single_component {
        return Err(Error::InvalidUsername(name.to_string()));
    }
    Ok(name.to_string())
}

/// `<dataset>/<username>/img_<n>.jpg`, `n` counting from 1.
pub fn image_path(dataset_dir: &Path, username: &str, n: usize) -> PathBuf {
    dataset_dir.join(username).join(format!("img_{}.jpg", n))
}

pub fn save_frame_jpeg(frame: &Frame, path: &Path) -> Result<()> {
    let rgb = RgbImage::from_raw(frame.width, frame.height, frame.to_rgb()).ok_or(
        Error::MalformedFrame {
            width: frame.width,
            height: frame.height,
        },
    )?;

    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|source| Error::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    writer.flush().map_err(io_err)
}

/// Save `plan.num_pictures` frames from a running camera, pausing between
/// captures. `progress` is called with `(saved, total)` after every image.
///
/// Stopping the camera part-way yields [`EnrollOutcome::Cancelled`].
pub fn capture_images<F>(camera: &CameraService, plan: &CapturePlan, mut progress: F) -> EnrollOutcome
where
    F: FnMut(usize, usize),
{
    let user_dir = plan.user_dir();
    if let Err(source) = fs::create_dir_all(&user_dir) {
        return EnrollOutcome::Failed(Error::Io {
            path: user_dir,
            source,
        });
    }

    info!(
        "Capturing {} images for {} into {:?}",
        plan.num_pictures, plan.username, user_dir
    );

    let mut saved = Vec::with_capacity(plan.num_pictures);
    while saved.len() < plan.num_pictures {
        if !camera.is_running() {
            warn!(
                "Camera stopped after {}/{} images, enrollment cancelled",
                saved.len(),
                plan.num_pictures
            );
            return EnrollOutcome::Cancelled { saved: saved.len() };
        }

        let Some(frame) = camera.latest_frame() else {
            thread::sleep(plan.poll_interval);
            continue;
        };

        let path = image_path(&plan.dataset_dir, &plan.username, saved.len() + 1);
        if let Err(e) = save_frame_jpeg(&frame, &path) {
            return EnrollOutcome::Failed(e);
        }
        debug!("Saved {:?}", path);
        saved.push(path);
        progress(saved.len(), plan.num_pictures);

        if saved.len() < plan.num_pictures {
            thread::sleep(plan.capture_interval);
        }
    }

    EnrollOutcome::Completed { saved }
}
