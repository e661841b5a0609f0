//! Synthetic right arm for running without a camera or a landmark model.
//!
//! The forearm stays horizontal while the wrist slowly sweeps between raised
//! and dropped, spending several seconds below the alert threshold each cycle.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::PI;
use tokio::time::Instant;

use crate::geometry::Vector2;
use crate::landmarks::{hand, pose, HandFrame, Landmark, PoseFrame, VideoFrame};
use crate::sensing::LandmarkDetector;
use crate::settings::{HandsSettings, PoseSettings};

const ELBOW: Vector2 = Vector2::new(0.30, 0.60);
const FOREARM_LENGTH: f32 = 0.25;
const SHOULDER: Vector2 = Vector2::new(0.22, 0.35);
const PALM_LENGTH: f32 = 0.09;
const PHALANX_LENGTH: f32 = 0.025;
const FINGER_SPACING: f32 = 0.018;

/// Center, swing and period of the wrist angle sweep.
const MEAN_ANGLE_DEG: f32 = 3.0;
const SWING_DEG: f32 = 18.0;
const PERIOD_SECS: f32 = 16.0;
const JITTER: f32 = 0.0015;

/// Deterministic wrist angle over time plus landmark jitter.
pub struct ArmMotion {
    origin: Option<Instant>,
    rng: StdRng,
}

impl ArmMotion {
    pub fn new() -> Self {
        Self {
            origin: None,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            origin: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Wrist angle in degrees at `secs` into the session.
    pub fn angle_at(secs: f32) -> f32 {
        MEAN_ANGLE_DEG + SWING_DEG * (2.0 * PI * secs / PERIOD_SECS).sin()
    }

    fn elapsed_secs(&mut self, frame: &VideoFrame) -> f32 {
        let origin = *self.origin.get_or_insert(frame.captured_at);
        frame
            .captured_at
            .saturating_duration_since(origin)
            .as_secs_f32()
    }

    fn jitter(&mut self, p: Vector2) -> Landmark {
        let mut landmark = Landmark::new(
            p.x + self.rng.gen_range(-JITTER..JITTER),
            p.y + self.rng.gen_range(-JITTER..JITTER),
        );
        landmark.visibility = Some(self.rng.gen_range(0.85..1.0));
        landmark
    }

    fn wrist() -> Vector2 {
        Vector2::new(ELBOW.x + FOREARM_LENGTH, ELBOW.y)
    }

    /// 21 hand landmarks for the given wrist angle.
    pub fn hand_landmarks(&mut self, angle_deg: f32) -> Vec<Landmark> {
        // raised wrist = hand rotated toward -y in image space
        let theta = (-angle_deg).to_radians();
        let dir = Vector2::new(theta.cos(), theta.sin());
        let perp = Vector2::new(-dir.y, dir.x);
        let wrist = Self::wrist();
        let at = |base: Vector2, along: f32, across: f32| {
            Vector2::new(
                base.x + dir.x * along + perp.x * across,
                base.y + dir.y * along + perp.y * across,
            )
        };

        let mut points = vec![Vector2::default(); hand::HAND_LANDMARK_COUNT];
        points[hand::WRIST] = wrist;

        // thumb fans out on the side opposite the pinky
        for (k, idx) in [hand::THUMB_CMC, hand::THUMB_MCP, hand::THUMB_IP, hand::THUMB_TIP]
            .into_iter()
            .enumerate()
        {
            let step = (k + 1) as f32;
            points[idx] = at(wrist, 0.02 * step, -0.015 * step);
        }

        let fingers = [
            [hand::INDEX_MCP, hand::INDEX_PIP, hand::INDEX_DIP, hand::INDEX_TIP],
            [hand::MIDDLE_MCP, hand::MIDDLE_PIP, hand::MIDDLE_DIP, hand::MIDDLE_TIP],
            [hand::RING_MCP, hand::RING_PIP, hand::RING_DIP, hand::RING_TIP],
            [hand::PINKY_MCP, hand::PINKY_PIP, hand::PINKY_DIP, hand::PINKY_TIP],
        ];
        for (f, joints) in fingers.into_iter().enumerate() {
            let across = FINGER_SPACING * f as f32;
            for (k, idx) in joints.into_iter().enumerate() {
                points[idx] = at(wrist, PALM_LENGTH + PHALANX_LENGTH * k as f32, across);
            }
        }

        points.into_iter().map(|p| self.jitter(p)).collect()
    }

    /// 33 pose landmarks; only the right arm carries real positions.
    pub fn pose_landmarks(&mut self) -> Vec<Landmark> {
        let mut landmarks = vec![
            Landmark {
                visibility: Some(0.0),
                ..Landmark::default()
            };
            pose::POSE_LANDMARK_COUNT
        ];
        landmarks[pose::RIGHT_SHOULDER] = self.jitter(SHOULDER);
        landmarks[pose::RIGHT_ELBOW] = self.jitter(ELBOW);
        landmarks[pose::RIGHT_WRIST] = self.jitter(Self::wrist());
        landmarks
    }
}

impl Default for ArmMotion {
    fn default() -> Self {
        Self::new()
    }
}

fn check_confidence(what: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{what} must be within [0, 1], got {value}");
    }
    Ok(())
}

pub struct SyntheticHands {
    motion: ArmMotion,
    max_num_hands: usize,
}

impl SyntheticHands {
    pub fn new(settings: &HandsSettings) -> Result<Self> {
        check_confidence("hands.minDetectionConfidence", settings.min_detection_confidence)?;
        check_confidence("hands.minTrackingConfidence", settings.min_tracking_confidence)?;
        if settings.max_num_hands == 0 {
            bail!("hands.maxNumHands must be at least 1");
        }
        Ok(Self {
            motion: ArmMotion::new(),
            max_num_hands: settings.max_num_hands as usize,
        })
    }

    pub fn with_motion(mut self, motion: ArmMotion) -> Self {
        self.motion = motion;
        self
    }
}

impl LandmarkDetector for SyntheticHands {
    type Output = HandFrame;

    fn name(&self) -> &'static str {
        "hands"
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<HandFrame> {
        let secs = self.motion.elapsed_secs(frame);
        let landmarks = self.motion.hand_landmarks(ArmMotion::angle_at(secs));
        let mut hands = vec![landmarks];
        hands.truncate(self.max_num_hands);
        Ok(HandFrame::new(frame.clone(), hands))
    }
}

pub struct SyntheticPose {
    motion: ArmMotion,
}

impl SyntheticPose {
    pub fn new(settings: &PoseSettings) -> Result<Self> {
        check_confidence("pose.minDetectionConfidence", settings.min_detection_confidence)?;
        check_confidence("pose.minTrackingConfidence", settings.min_tracking_confidence)?;
        Ok(Self {
            motion: ArmMotion::new(),
        })
    }

    pub fn with_motion(mut self, motion: ArmMotion) -> Self {
        self.motion = motion;
        self
    }
}

impl LandmarkDetector for SyntheticPose {
    type Output = PoseFrame;

    fn name(&self) -> &'static str {
        "pose"
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<PoseFrame> {
        Ok(PoseFrame::new(frame.clone(), self.motion.pose_landmarks()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posture::fusion::wrist_angle;

    #[test]
    fn test_generated_landmarks_reproduce_angle() {
        let mut motion = ArmMotion::seeded(7);
        for target in [-15.0f32, 0.0, 4.0, 6.0, 20.0] {
            let hand = motion.hand_landmarks(target);
            let pose = motion.pose_landmarks();
            let sample = wrist_angle(
                pose[pose::RIGHT_ELBOW].position(),
                hand[hand::WRIST].position(),
                hand[hand::INDEX_MCP].position(),
            )
            .unwrap();
            // jitter is a fraction of a millimetre on a 0.09 palm
            assert!(
                (sample.angle_deg - target).abs() < 3.0,
                "target {target}, got {}",
                sample.angle_deg
            );
        }
    }

    #[test]
    fn test_sweep_crosses_threshold() {
        let angles: Vec<f32> = (0..160).map(|i| ArmMotion::angle_at(i as f32 * 0.1)).collect();
        assert!(angles.iter().any(|a| *a > 15.0));
        assert!(angles.iter().any(|a| *a < -10.0));
    }

    #[test]
    fn test_invalid_settings_fail_construction() {
        let hands = HandsSettings {
            min_detection_confidence: 1.5,
            ..HandsSettings::default()
        };
        assert!(SyntheticHands::new(&hands).is_err());

        let hands = HandsSettings {
            max_num_hands: 0,
            ..HandsSettings::default()
        };
        assert!(SyntheticHands::new(&hands).is_err());

        let pose = PoseSettings {
            min_tracking_confidence: -0.1,
            ..PoseSettings::default()
        };
        assert!(SyntheticPose::new(&pose).is_err());
    }

    #[test]
    fn test_detectors_fill_expected_shapes() {
        let frame = VideoFrame::blank(0, 4, 4);
        let mut hands = SyntheticHands::new(&HandsSettings::default()).unwrap();
        let mut pose = SyntheticPose::new(&PoseSettings::default()).unwrap();

        let hand_frame = hands.detect(&frame).unwrap();
        assert_eq!(hand_frame.hands.len(), 1);
        assert_eq!(hand_frame.hands[0].len(), hand::HAND_LANDMARK_COUNT);

        let pose_frame = pose.detect(&frame).unwrap();
        assert_eq!(pose_frame.landmarks.len(), pose::POSE_LANDMARK_COUNT);
        assert!(pose_frame.right_elbow().is_some());
    }
}
