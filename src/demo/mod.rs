pub mod arm;
pub mod camera;

pub use arm::{ArmMotion, SyntheticHands, SyntheticPose};
pub use camera::{CameraControl, SyntheticCamera};
