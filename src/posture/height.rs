//! Wrist height checks against the elbow, independent of the wrist angle.
//!
//! Both run in frame pixels on the raw wrist and elbow landmarks and only
//! show a warning once their condition has held for longer than a fixed
//! hold time.

use serde::Serialize;
use tokio::time::{Duration, Instant};

/// Wrist above the elbow for longer than this raises "WRIST ABOVE ELBOW!".
pub const ABOVE_ELBOW_HOLD: Duration = Duration::from_secs(2);
/// Once the keyboard is calibrated: wrist this far above the elbow...
pub const TOO_HIGH_MARGIN_PX: f32 = 20.0;
/// ...for longer than this raises "WRIST TOO HIGH!".
pub const TOO_HIGH_HOLD: Duration = Duration::from_secs(5);

pub const ABOVE_ELBOW_TEXT: &str = "WRIST ABOVE ELBOW!";
pub const TOO_HIGH_TEXT: &str = "WRIST TOO HIGH!";

/// A condition that only counts after it has held for `hold`.
#[derive(Debug, Clone)]
pub struct SustainedCondition {
    since: Option<Instant>,
    hold: Duration,
}

impl SustainedCondition {
    pub fn new(hold: Duration) -> Self {
        Self { since: None, hold }
    }

    pub fn since(&self) -> Option<Instant> {
        self.since
    }

    /// Feed the current value. Returns true once `active` has been true
    /// for strictly longer than the hold time; false clears the timer.
    pub fn update(&mut self, active: bool, now: Instant) -> bool {
        if !active {
            self.since = None;
            return false;
        }
        let since = *self.since.get_or_insert(now);
        now.saturating_duration_since(since) > self.hold
    }

    pub fn reset(&mut self) {
        self.since = None;
    }
}

/// Which height warnings are showing after a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeightFlags {
    pub wrist_above_elbow: bool,
    pub wrist_too_high: bool,
}

#[derive(Debug, Clone)]
pub struct HeightChecks {
    above_elbow: SustainedCondition,
    too_high: SustainedCondition,
    flags: HeightFlags,
}

impl HeightChecks {
    pub fn new() -> Self {
        Self {
            above_elbow: SustainedCondition::new(ABOVE_ELBOW_HOLD),
            too_high: SustainedCondition::new(TOO_HIGH_HOLD),
            flags: HeightFlags::default(),
        }
    }

    pub fn flags(&self) -> HeightFlags {
        self.flags
    }

    pub fn above_elbow_since(&self) -> Option<Instant> {
        self.above_elbow.since()
    }

    pub fn too_high_since(&self) -> Option<Instant> {
        self.too_high.since()
    }

    /// `wrist_y` and `elbow_y` are in frame pixels, y pointing down. The
    /// too-high check only runs while a keyboard line is calibrated.
    pub fn check(
        &mut self,
        wrist_y: f32,
        elbow_y: f32,
        keyboard_y: Option<u32>,
        now: Instant,
    ) -> HeightFlags {
        let wrist_above_elbow = self.above_elbow.update(wrist_y < elbow_y, now);

        let wrist_too_high = if keyboard_y.is_some() {
            self.too_high
                .update(wrist_y < elbow_y - TOO_HIGH_MARGIN_PX, now)
        } else {
            self.too_high.reset();
            false
        };

        self.flags = HeightFlags {
            wrist_above_elbow,
            wrist_too_high,
        };
        self.flags
    }
}

impl Default for HeightChecks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ELBOW_Y: f32 = 300.0;

    #[test]
    fn test_wrist_above_elbow_after_hold() {
        let mut checks = HeightChecks::new();
        let start = Instant::now();

        assert!(!checks.check(290.0, ELBOW_Y, None, start).wrist_above_elbow);
        assert!(
            !checks
                .check(290.0, ELBOW_Y, None, start + ABOVE_ELBOW_HOLD)
                .wrist_above_elbow
        );
        let later = start + ABOVE_ELBOW_HOLD + Duration::from_millis(16);
        assert!(checks.check(290.0, ELBOW_Y, None, later).wrist_above_elbow);
    }

    #[test]
    fn test_wrist_below_elbow_resets_timer() {
        let mut checks = HeightChecks::new();
        let start = Instant::now();
        checks.check(290.0, ELBOW_Y, None, start);

        checks.check(310.0, ELBOW_Y, None, start + Duration::from_millis(1500));
        assert!(checks.above_elbow_since().is_none());

        // a fresh streak needs the full hold again
        let restart = start + Duration::from_millis(1600);
        checks.check(290.0, ELBOW_Y, None, restart);
        let flags = checks.check(290.0, ELBOW_Y, None, restart + Duration::from_millis(1900));
        assert!(!flags.wrist_above_elbow);
    }

    #[test]
    fn test_too_high_needs_calibration_and_margin() {
        let mut checks = HeightChecks::new();
        let start = Instant::now();
        let late = start + TOO_HIGH_HOLD + Duration::from_millis(1);

        // uncalibrated: never fires, timer stays clear
        checks.check(250.0, ELBOW_Y, None, start);
        assert!(!checks.check(250.0, ELBOW_Y, None, late).wrist_too_high);
        assert!(checks.too_high_since().is_none());

        // within the margin: above the elbow but not too high
        let mut checks = HeightChecks::new();
        checks.check(285.0, ELBOW_Y, Some(400), start);
        assert!(!checks.check(285.0, ELBOW_Y, Some(400), late).wrist_too_high);

        let mut checks = HeightChecks::new();
        checks.check(250.0, ELBOW_Y, Some(400), start);
        let flags = checks.check(250.0, ELBOW_Y, Some(400), late);
        assert!(flags.wrist_too_high);
        assert!(flags.wrist_above_elbow);
    }
}
