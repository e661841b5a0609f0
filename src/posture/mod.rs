pub mod fusion;
pub mod height;
pub mod monitor;
pub mod state;

pub use fusion::{wrist_angle, PostureSample, SignalFuser, Unknown};
pub use height::{HeightChecks, HeightFlags, SustainedCondition};
pub use monitor::{KeyboardCalibration, PostureSnapshot, WristMonitor};
pub use state::{
    AlertDecision, AlertState, PostureStatus, ALERT_DELAY, ANGLE_THRESHOLD_DEG, BEEP_INTERVAL,
};
