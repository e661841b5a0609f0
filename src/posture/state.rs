use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

/// Wrist angles below this are "bad" posture.
pub const ANGLE_THRESHOLD_DEG: f32 = 5.0;
/// How long bad posture must persist before alerting.
pub const ALERT_DELAY: Duration = Duration::from_millis(2000);
/// Minimum spacing between audible alerts while alerting.
pub const BEEP_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum PostureStatus {
    #[default]
    Ok,
    BadPending,
    Alerting,
}

impl PostureStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PostureStatus::Ok => "Wrist OK",
            PostureStatus::BadPending => "Wrist low",
            PostureStatus::Alerting => "Wrist Too Low!",
        }
    }
}

/// Outcome of classifying one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub status: PostureStatus,
    /// Fire the alert tone on this tick.
    pub play_sound: bool,
}

/// Debounce and rate-limit timers.
///
/// `bad_since` is set iff the last classified sample was bad. Both timers
/// clear the moment a sample classifies as ok.
#[derive(Debug, Clone, Default)]
pub struct AlertState {
    bad_since: Option<Instant>,
    last_alert_sound_at: Option<Instant>,
    status: PostureStatus,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PostureStatus {
        self.status
    }

    pub fn bad_since(&self) -> Option<Instant> {
        self.bad_since
    }

    pub fn last_alert_sound_at(&self) -> Option<Instant> {
        self.last_alert_sound_at
    }

    /// Time spent in bad posture as of `now`, zero when ok.
    pub fn bad_for(&self, now: Instant) -> Duration {
        self.bad_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or_default()
    }

    pub fn classify(&mut self, angle_deg: f32, now: Instant) -> AlertDecision {
        if angle_deg >= ANGLE_THRESHOLD_DEG {
            self.reset();
            return AlertDecision {
                status: PostureStatus::Ok,
                play_sound: false,
            };
        }

        let Some(since) = self.bad_since else {
            self.bad_since = Some(now);
            self.status = PostureStatus::BadPending;
            return AlertDecision {
                status: PostureStatus::BadPending,
                play_sound: false,
            };
        };

        if now.saturating_duration_since(since) < ALERT_DELAY {
            self.status = PostureStatus::BadPending;
            return AlertDecision {
                status: PostureStatus::BadPending,
                play_sound: false,
            };
        }

        self.status = PostureStatus::Alerting;
        let play_sound = self.sound_due(now);
        if play_sound {
            self.last_alert_sound_at = Some(now);
        }

        AlertDecision {
            status: PostureStatus::Alerting,
            play_sound,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn sound_due(&self, now: Instant) -> bool {
        self.last_alert_sound_at
            .map(|last| now.saturating_duration_since(last) >= BEEP_INTERVAL)
            .unwrap_or(true)
    }
}
