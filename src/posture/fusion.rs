use serde::Serialize;

use crate::geometry::{angle_between, Vector2};
use crate::landmarks::{hand, HandFrame, PoseFrame};

/// Signed wrist angle derived from one fusion tick. Not retained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostureSample {
    /// Positive when the wrist is raised relative to the forearm.
    pub angle_deg: f32,
    pub elbow: Vector2,
    pub wrist: Vector2,
    pub index_mcp: Vector2,
}

/// Why a fusion tick produced no sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Unknown {
    NoHandFrame,
    NoPoseFrame,
    NoHandDetected,
    MissingLandmark,
    DegenerateGeometry,
}

/// Last-value-wins fusion of the hand and pose streams.
///
/// The two streams are not synchronized: a sample always pairs the newest
/// frame of one stream with whatever the other stream last delivered.
#[derive(Debug, Default)]
pub struct SignalFuser {
    latest_hand: Option<HandFrame>,
    latest_pose: Option<PoseFrame>,
}

impl SignalFuser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_hand(&mut self, frame: HandFrame) {
        self.latest_hand = Some(frame);
    }

    pub fn update_pose(&mut self, frame: PoseFrame) {
        self.latest_pose = Some(frame);
    }

    pub fn latest_hand(&self) -> Option<&HandFrame> {
        self.latest_hand.as_ref()
    }

    pub fn latest_pose(&self) -> Option<&PoseFrame> {
        self.latest_pose.as_ref()
    }

    /// Wrist and right-elbow heights in pixels of the hand frame's image,
    /// when both streams currently have them.
    pub fn wrist_and_elbow_y(&self) -> Option<(f32, f32)> {
        let hand_frame = self.latest_hand.as_ref()?;
        let wrist = hand_frame.primary()?.get(hand::WRIST)?;
        let elbow = self.latest_pose.as_ref()?.right_elbow()?;
        let height = hand_frame.image.height as f32;
        Some((wrist.y * height, elbow.y * height))
    }

    pub fn sample(&self) -> Result<PostureSample, Unknown> {
        let hand_frame = self.latest_hand.as_ref().ok_or(Unknown::NoHandFrame)?;
        let pose_frame = self.latest_pose.as_ref().ok_or(Unknown::NoPoseFrame)?;
        let hand = hand_frame.primary().ok_or(Unknown::NoHandDetected)?;

        let elbow = pose_frame.right_elbow().ok_or(Unknown::MissingLandmark)?;
        let wrist = hand.get(hand::WRIST).ok_or(Unknown::MissingLandmark)?;
        let index_mcp = hand.get(hand::INDEX_MCP).ok_or(Unknown::MissingLandmark)?;

        wrist_angle(elbow.position(), wrist.position(), index_mcp.position())
    }
}

/// Wrist angle from the three joints.
///
/// forearm = wrist − elbow, hand = index base − wrist. The raw geometric
/// angle is negated so a raised wrist reads as a larger value.
pub fn wrist_angle(
    elbow: Vector2,
    wrist: Vector2,
    index_mcp: Vector2,
) -> Result<PostureSample, Unknown> {
    let forearm = wrist - elbow;
    let hand_vector = index_mcp - wrist;
    let raw = angle_between(forearm, hand_vector).ok_or(Unknown::DegenerateGeometry)?;

    Ok(PostureSample {
        angle_deg: -raw,
        elbow,
        wrist,
        index_mcp,
    })
}
