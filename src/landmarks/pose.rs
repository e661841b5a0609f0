use super::{Landmark, VideoFrame};

// MediaPipe Pose indices (33 total)
pub const NOSE: usize = 0;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;

pub const POSE_LANDMARK_COUNT: usize = 33;

/// Result of one pose-detector pass.
#[derive(Debug, Clone)]
pub struct PoseFrame {
    pub image: VideoFrame,
    pub landmarks: Vec<Landmark>,
}

impl PoseFrame {
    pub fn new(image: VideoFrame, landmarks: Vec<Landmark>) -> Self {
        Self { image, landmarks }
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    pub fn right_elbow(&self) -> Option<&Landmark> {
        self.get(RIGHT_ELBOW)
    }
}
