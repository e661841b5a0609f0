//! Landmark data delivered by the external hand and pose detectors.
//!
//! Frames are immutable snapshots: each detector delivery replaces the
//! previous frame of that stream wholesale.

pub mod hand;
pub mod pose;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::geometry::Vector2;

pub use hand::HandFrame;
pub use pose::PoseFrame;

/// A single detected keypoint in normalized image coordinates (0-1).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    /// Relative depth, 0.0 when the detector only reports 2D.
    #[serde(default)]
    pub z: f32,
    #[serde(default)]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub const fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: None,
        }
    }

    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }

    /// Pixel position on a surface of the given size.
    pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// One camera frame handed to the detectors.
///
/// Pixels are shared, so cloning a frame for both detectors and for the
/// overlay does not copy image data.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub index: u64,
    pub captured_at: Instant,
    pub width: u32,
    pub height: u32,
    /// Packed RGB, `width * height * 3` bytes.
    pub pixels: Arc<[u8]>,
}

impl VideoFrame {
    pub fn new(index: u64, width: u32, height: u32, pixels: Arc<[u8]>) -> Self {
        Self {
            index,
            captured_at: Instant::now(),
            width,
            height,
            pixels,
        }
    }

    /// A black frame, mostly for tests and placeholder rendering.
    pub fn blank(index: u64, width: u32, height: u32) -> Self {
        let len = width as usize * height as usize * 3;
        Self::new(index, width, height, Arc::from(vec![0u8; len]))
    }
}
