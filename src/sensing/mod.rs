pub mod controller;
pub mod detector;
pub mod loop_worker;

use anyhow::Result;

use crate::landmarks::VideoFrame;

pub use controller::FrameDriver;
pub use detector::{spawn_detector, DetectorHandle, LandmarkDetector};
pub use loop_worker::{frame_loop, Detectors, DriverConfig, LoopExit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Ended,
}

/// Camera or video feed the frame loop pulls from.
pub trait VideoSource: Send + 'static {
    fn state(&self) -> PlaybackState;
    fn read_frame(&mut self) -> Result<VideoFrame>;
}
