use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::audio::AlertEmitter;
use crate::landmarks::{HandFrame, PoseFrame};
use crate::overlay::render::{render_overlay, OverlayFrame};
use crate::overlay::Canvas;
use crate::utils::Clock;

use super::fusion::{PostureSample, SignalFuser, Unknown};
use super::height::{HeightChecks, HeightFlags};
use super::state::{AlertState, PostureStatus};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Published after every fusion tick.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PostureSnapshot {
    pub status: PostureStatus,
    /// Angle of the last tick that produced a sample.
    pub angle_deg: Option<f32>,
    /// Why the last tick produced no sample, if it did not.
    pub unknown: Option<Unknown>,
    pub bad_for_ms: u64,
    pub alerts_played: u64,
    pub height: HeightFlags,
    pub keyboard_y: Option<u32>,
    pub updated_at: DateTime<Utc>,
}

impl Default for PostureSnapshot {
    fn default() -> Self {
        Self {
            status: PostureStatus::Ok,
            angle_deg: None,
            unknown: None,
            bad_for_ms: 0,
            alerts_played: 0,
            height: HeightFlags::default(),
            keyboard_y: None,
            updated_at: Utc::now(),
        }
    }
}

/// Keyboard reference line, in frame pixels from the top.
///
/// Cloned out of the monitor before it moves into the fusion task; the
/// monitor reads the current value on every tick.
#[derive(Clone)]
pub struct KeyboardCalibration {
    tx: Arc<watch::Sender<Option<u32>>>,
}

impl KeyboardCalibration {
    pub fn set(&self, y: u32) {
        self.tx.send_replace(Some(y));
    }

    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    pub fn get(&self) -> Option<u32> {
        *self.tx.borrow()
    }
}

/// The monitor: fusion, classification, rendering and alerting.
///
/// Owned by a single task; the two detector streams call into it one at a
/// time in whatever order their results arrive.
pub struct WristMonitor {
    fuser: SignalFuser,
    alert: AlertState,
    height: HeightChecks,
    calibration: KeyboardCalibration,
    canvas: Box<dyn Canvas>,
    emitter: Box<dyn AlertEmitter>,
    clock: Arc<dyn Clock>,
    snapshot_tx: watch::Sender<PostureSnapshot>,
    alerts_played: u64,
    last_angle: Option<f32>,
}

impl WristMonitor {
    pub fn new(
        canvas: Box<dyn Canvas>,
        emitter: Box<dyn AlertEmitter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(PostureSnapshot::default());
        let (calibration_tx, _) = watch::channel(None);
        Self {
            fuser: SignalFuser::new(),
            alert: AlertState::new(),
            height: HeightChecks::new(),
            calibration: KeyboardCalibration {
                tx: Arc::new(calibration_tx),
            },
            canvas,
            emitter,
            clock,
            snapshot_tx,
            alerts_played: 0,
            last_angle: None,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PostureSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn calibration(&self) -> KeyboardCalibration {
        self.calibration.clone()
    }

    pub fn status(&self) -> PostureStatus {
        self.alert.status()
    }

    pub fn alert_state(&self) -> &AlertState {
        &self.alert
    }

    pub fn height_checks(&self) -> &HeightChecks {
        &self.height
    }

    pub fn on_hand_frame(&mut self, frame: HandFrame) {
        self.fuser.update_hand(frame);
        self.process();
    }

    pub fn on_pose_frame(&mut self, frame: PoseFrame) {
        self.fuser.update_pose(frame);
        self.process();
    }

    fn process(&mut self) {
        let now = self.clock.now();
        let previous = self.alert.status();
        let keyboard_y = self.calibration.get();

        let (sample, status, unknown) = match self.fuser.sample() {
            Ok(sample) => {
                let decision = self.alert.classify(sample.angle_deg, now);
                if decision.play_sound {
                    self.emitter.emit_alert();
                    self.alerts_played += 1;
                }
                self.last_angle = Some(sample.angle_deg);
                (Some(sample), Some(decision.status), None)
            }
            Err(reason) => {
                // posture unknown: timers neither advance nor reset
                log_debug!("no posture sample this tick: {reason:?}");
                (None, None, Some(reason))
            }
        };

        // Height checks keep their timers while wrist or elbow is missing.
        let height = match self.fuser.wrist_and_elbow_y() {
            Some((wrist_y, elbow_y)) => self.height.check(wrist_y, elbow_y, keyboard_y, now),
            None => HeightFlags::default(),
        };

        self.render(sample.as_ref(), status, height, keyboard_y);

        let current = self.alert.status();
        if current != previous {
            log_debug!(
                "posture {:?} -> {:?} (angle {:.1})",
                previous,
                current,
                self.last_angle.unwrap_or(f32::NAN)
            );
        }

        self.publish(now, unknown, height, keyboard_y);
    }

    fn render(
        &mut self,
        sample: Option<&PostureSample>,
        status: Option<PostureStatus>,
        height: HeightFlags,
        keyboard_y: Option<u32>,
    ) {
        let overlay = OverlayFrame {
            hand: self.fuser.latest_hand(),
            pose: self.fuser.latest_pose(),
            sample,
            status,
            height,
            keyboard_y,
        };
        render_overlay(self.canvas.as_mut(), &overlay);
    }

    fn publish(
        &self,
        now: Instant,
        unknown: Option<Unknown>,
        height: HeightFlags,
        keyboard_y: Option<u32>,
    ) {
        let snapshot = PostureSnapshot {
            status: self.alert.status(),
            angle_deg: self.last_angle,
            unknown,
            bad_for_ms: self.alert.bad_for(now).as_millis() as u64,
            alerts_played: self.alerts_played,
            height,
            keyboard_y,
            updated_at: Utc::now(),
        };
        self.snapshot_tx.send_replace(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{hand, pose, Landmark, VideoFrame};
    use crate::overlay::RecordingCanvas;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::Duration;

    struct ManualClock(Mutex<Instant>);

    impl ManualClock {
        fn advance(&self, by: Duration) {
            *self.0.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Clone, Default)]
    struct CountingEmitter(Arc<AtomicUsize>);

    impl AlertEmitter for CountingEmitter {
        fn emit_alert(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        monitor: WristMonitor,
        clock: Arc<ManualClock>,
        beeps: CountingEmitter,
        canvas: RecordingCanvas,
        frame: u64,
    }

    impl Harness {
        fn new() -> Self {
            let clock = Arc::new(ManualClock(Mutex::new(Instant::now())));
            let beeps = CountingEmitter::default();
            let canvas = RecordingCanvas::new(640, 480);
            let monitor = WristMonitor::new(
                Box::new(canvas.clone()),
                Box::new(beeps.clone()),
                clock.clone(),
            );
            Self {
                monitor,
                clock,
                beeps,
                canvas,
                frame: 0,
            }
        }

        fn hand(&mut self, index_mcp_y: f32) {
            self.hand_at(0.5, index_mcp_y);
        }

        fn hand_at(&mut self, wrist_y: f32, index_mcp_y: f32) {
            self.frame += 1;
            let mut landmarks = vec![Landmark::new(0.55, wrist_y); hand::HAND_LANDMARK_COUNT];
            landmarks[hand::WRIST] = Landmark::new(0.5, wrist_y);
            landmarks[hand::INDEX_MCP] = Landmark::new(0.6, index_mcp_y);
            self.monitor.on_hand_frame(HandFrame::new(
                VideoFrame::blank(self.frame, 8, FRAME_HEIGHT),
                vec![landmarks],
            ));
        }

        fn pose(&mut self) {
            self.frame += 1;
            let mut landmarks = vec![Landmark::default(); pose::POSE_LANDMARK_COUNT];
            landmarks[pose::RIGHT_ELBOW] = Landmark::new(0.2, 0.5);
            self.monitor
                .on_pose_frame(PoseFrame::new(VideoFrame::blank(self.frame, 8, FRAME_HEIGHT), landmarks));
        }

        fn beeps(&self) -> usize {
            self.beeps.0.load(Ordering::SeqCst)
        }
    }

    const FRAME_HEIGHT: u32 = 480;
    const DROPPED: f32 = 0.56;
    const RAISED: f32 = 0.44;

    #[test]
    fn test_hand_only_never_classifies() {
        let mut h = Harness::new();
        for _ in 0..300 {
            h.hand(DROPPED);
            h.clock.advance(Duration::from_millis(16));
        }
        assert_eq!(h.monitor.status(), PostureStatus::Ok);
        assert!(h.monitor.alert_state().bad_since().is_none());
        assert_eq!(h.beeps(), 0);
        assert_eq!(
            h.monitor.subscribe().borrow().unknown,
            Some(Unknown::NoPoseFrame)
        );
    }

    #[test]
    fn test_every_delivery_redraws() {
        let mut h = Harness::new();
        h.hand(DROPPED);
        h.hand(DROPPED);
        h.pose();
        h.pose();
        assert_eq!(h.canvas.frame_count(), 4);
    }

    #[test]
    fn test_sustained_drop_alerts_and_beeps_rate_limited() {
        let mut h = Harness::new();
        h.pose();
        h.hand(DROPPED);
        assert_eq!(h.monitor.status(), PostureStatus::BadPending);

        h.clock.advance(Duration::from_millis(1999));
        h.hand(DROPPED);
        assert_eq!(h.monitor.status(), PostureStatus::BadPending);
        assert_eq!(h.beeps(), 0);

        h.clock.advance(Duration::from_millis(1));
        h.pose();
        assert_eq!(h.monitor.status(), PostureStatus::Alerting);
        assert_eq!(h.beeps(), 1);
        assert!(h.canvas.texts().contains(&"Wrist Too Low!".to_string()));

        // 3 more seconds of frames from both streams
        for _ in 0..(3000 / 16) {
            h.clock.advance(Duration::from_millis(16));
            h.hand(DROPPED);
            h.pose();
            assert!(h.canvas.texts().contains(&"Wrist Too Low!".to_string()));
        }
        assert_eq!(h.beeps(), 2);
        assert_eq!(h.monitor.subscribe().borrow().alerts_played, 2);
    }

    #[test]
    fn test_recovery_clears_alert() {
        let mut h = Harness::new();
        h.pose();
        h.hand(DROPPED);
        h.clock.advance(Duration::from_millis(2500));
        h.hand(DROPPED);
        assert_eq!(h.monitor.status(), PostureStatus::Alerting);

        h.hand(RAISED);
        assert_eq!(h.monitor.status(), PostureStatus::Ok);
        assert!(h.canvas.texts().contains(&"Wrist OK".to_string()));
        let snapshot = h.monitor.subscribe().borrow().clone();
        assert_eq!(snapshot.status, PostureStatus::Ok);
        assert_eq!(snapshot.bad_for_ms, 0);
        assert!(snapshot.angle_deg.unwrap() > 5.0);
    }

    #[test]
    fn test_lost_hand_keeps_timer_running() {
        let mut h = Harness::new();
        h.pose();
        h.hand(DROPPED);

        // hand disappears for a while: no sample, no reset
        h.clock.advance(Duration::from_millis(1500));
        h.monitor
            .on_hand_frame(HandFrame::new(VideoFrame::blank(99, 4, 4), Vec::new()));
        assert_eq!(h.monitor.status(), PostureStatus::BadPending);
        assert!(h.monitor.alert_state().bad_since().is_some());

        h.clock.advance(Duration::from_millis(600));
        h.hand(DROPPED);
        assert_eq!(h.monitor.status(), PostureStatus::Alerting);
    }

    #[test]
    fn test_wrist_above_elbow_warning_after_two_seconds() {
        let mut h = Harness::new();
        h.pose();
        // wrist 48 px above the elbow, hand slightly raised
        h.hand_at(0.4, 0.35);
        assert!(h.monitor.height_checks().above_elbow_since().is_some());
        assert!(!h.canvas.texts().contains(&"WRIST ABOVE ELBOW!".to_string()));

        h.clock.advance(Duration::from_millis(2001));
        h.hand_at(0.4, 0.35);
        assert!(h.canvas.texts().contains(&"WRIST ABOVE ELBOW!".to_string()));
        assert!(h.monitor.subscribe().borrow().height.wrist_above_elbow);
        // no keyboard line yet
        assert!(!h.canvas.texts().contains(&"WRIST TOO HIGH!".to_string()));

        h.hand_at(0.5, 0.5);
        assert!(h.monitor.height_checks().above_elbow_since().is_none());
        assert!(!h.canvas.texts().contains(&"WRIST ABOVE ELBOW!".to_string()));
    }

    #[test]
    fn test_calibrated_wrist_too_high_after_five_seconds() {
        let mut h = Harness::new();
        let calibration = h.monitor.calibration();
        calibration.set(360);

        h.pose();
        h.hand_at(0.4, 0.35);
        h.clock.advance(Duration::from_millis(4000));
        h.hand_at(0.4, 0.35);
        assert!(!h.canvas.texts().contains(&"WRIST TOO HIGH!".to_string()));

        h.clock.advance(Duration::from_millis(1001));
        h.hand_at(0.4, 0.35);
        assert!(h.canvas.texts().contains(&"WRIST TOO HIGH!".to_string()));
        let snapshot = h.monitor.subscribe().borrow().clone();
        assert!(snapshot.height.wrist_too_high);
        assert_eq!(snapshot.keyboard_y, Some(360));

        calibration.clear();
        h.hand_at(0.4, 0.35);
        assert!(!h.canvas.texts().contains(&"WRIST TOO HIGH!".to_string()));
        assert!(h.monitor.height_checks().too_high_since().is_none());
    }
}
