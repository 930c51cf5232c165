//! Captured frames and the single-slot store shared between the capture
//! thread and its consumers.

use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};

/// Packed 8-bit image, row-major, `channels` samples per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, channels: u8) -> Result<Self> {
        let expected = width as usize * height as usize * channels as usize;
        if channels == 0 || pixels.len() != expected {
            return Err(Error::MalformedFrame { width, height });
        }
        Ok(Self {
            pixels,
            width,
            height,
            channels,
        })
    }

    /// Solid-colour RGB frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            pixels,
            width,
            height,
            channels: 3,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.pixels.is_empty()
    }

    /// Packed RGB copy of this frame. Frames with fewer than three channels
    /// replicate the first one; extra channels are dropped.
    pub fn to_rgb(&self) -> Vec<u8> {
        match self.channels {
            3 => self.pixels.clone(),
            n if n > 3 => self
                .pixels
                .chunks_exact(n as usize)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect(),
            n => self
                .pixels
                .chunks_exact(n as usize)
                .flat_map(|px| [px[0], px[0], px[0]])
                .collect(),
        }
    }
}

/// Holds the most recent frame. Every read returns an independent copy.
#[derive(Debug, Default)]
pub struct FrameStore {
    slot: Mutex<Option<Frame>>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `frame` into the slot, reusing the slot's buffer when possible.
    pub fn publish(&self, frame: &Frame) {
        let mut slot = self.lock();
        match slot.as_mut() {
            Some(current) => {
                current.pixels.clone_from(&frame.pixels);
                current.width = frame.width;
                current.height = frame.height;
                current.channels = frame.channels;
            }
            None => *slot = Some(frame.clone()),
        }
    }

    pub fn snapshot(&self) -> Option<Frame> {
        self.lock().as_ref().filter(|f| !f.is_empty()).cloned()
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    // A panic on the capture thread must not take the preview down with it.
    fn lock(&self) -> MutexGuard<'_, Option<Frame>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_store_has_no_snapshot() {
        let store = FrameStore::new();
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn snapshot_is_independent_of_the_slot() {
        let store = FrameStore::new();
        store.publish(&Frame::filled(2, 2, [10, 20, 30]));

        let mut copy = store.snapshot().unwrap();
        copy.pixels[0] = 255;

        assert_eq!(store.snapshot().unwrap().pixels[0], 10);
    }

    #[test]
    fn publish_overwrites_previous_frame() {
        let store = FrameStore::new();
        store.publish(&Frame::filled(2, 2, [1, 1, 1]));
        store.publish(&Frame::filled(4, 1, [9, 9, 9]));

        let latest = store.snapshot().unwrap();
        assert_eq!((latest.width, latest.height), (4, 1));
        assert!(latest.pixels.iter().all(|&v| v == 9));
    }

    #[test]
    fn clear_empties_the_slot() {
        let store = FrameStore::new();
        store.publish(&Frame::filled(1, 1, [0, 0, 0]));
        store.clear();
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn new_rejects_mismatched_buffer() {
        assert!(Frame::new(vec![0; 11], 2, 2, 3).is_err());
        assert!(Frame::new(vec![0; 12], 2, 2, 3).is_ok());
    }

    #[test]
    fn to_rgb_expands_gray_and_drops_alpha() {
        let gray = Frame::new(vec![7, 8], 2, 1, 1).unwrap();
        assert_eq!(gray.to_rgb(), vec![7, 7, 7, 8, 8, 8]);

        let rgba = Frame::new(vec![1, 2, 3, 4, 5, 6, 7, 8], 2, 1, 4).unwrap();
        assert_eq!(rgba.to_rgb(), vec![1, 2, 3, 5, 6, 7]);
    }
}
