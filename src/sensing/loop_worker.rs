use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::overlay::StatusSink;

use super::{DetectorHandle, PlaybackState, VideoSource};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

// Import the logging macros (exported at crate root)
use crate::{log_debug, log_error, log_info, log_warn};

pub const DETECTION_FAILED_STATUS: &str =
    "Detection error. Monitoring continues; restart if this persists.";
pub const MONITORING_STATUS: &str = "Monitoring wrist posture";

#[derive(Debug, Clone, Copy)]
pub struct DriverConfig {
    /// One display refresh.
    pub frame_interval: Duration,
    /// Upper bound for one round of detection.
    pub detection_timeout: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            detection_timeout: Duration::from_millis(1000),
        }
    }
}

/// The two detector workers. Either may be absent if it failed to start.
#[derive(Clone, Default)]
pub struct Detectors {
    pub hands: Option<DetectorHandle>,
    pub pose: Option<DetectorHandle>,
}

impl Detectors {
    fn all_stopped(&self) -> bool {
        [&self.hands, &self.pose]
            .into_iter()
            .all(|d| d.as_ref().map_or(true, DetectorHandle::is_closed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    SourceEnded,
    DetectorsStopped,
}

/// Pull a frame every refresh and hand it to both detectors.
///
/// A failed iteration is logged and reported, then the loop reschedules.
/// It exits only on cancellation, when the source ends, or when no
/// detector worker is left.
pub async fn frame_loop(
    mut source: Box<dyn VideoSource>,
    detectors: Detectors,
    status: Arc<dyn StatusSink>,
    config: DriverConfig,
    cancel_token: CancellationToken,
) -> LoopExit {
    let mut ticker = tokio::time::interval(config.frame_interval);
    // Like a display refresh: missed ticks are gone, not replayed.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut paused = false;
    let mut failure_streak: u32 = 0;
    let mut iterations: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("frame loop shutting down after {} iterations", iterations);
                return LoopExit::Cancelled;
            }
            _ = ticker.tick() => {}
        }

        match source.state() {
            PlaybackState::Ended => {
                log_info!("video source ended");
                status.set_status("Video ended. Monitoring stopped.");
                return LoopExit::SourceEnded;
            }
            PlaybackState::Paused => {
                if !paused {
                    log_info!("video source paused");
                    status.set_status("Video paused");
                    paused = true;
                }
                continue;
            }
            PlaybackState::Playing => {
                if paused {
                    log_info!("video source resumed");
                    status.set_status(MONITORING_STATUS);
                    paused = false;
                }
            }
        }

        if detectors.all_stopped() {
            log_error!("no landmark detector is running; stopping frame loop");
            status.set_status("Landmark detection stopped. Restart the monitor.");
            return LoopExit::DetectorsStopped;
        }

        iterations += 1;
        match run_iteration(source.as_mut(), &detectors, config.detection_timeout).await {
            Ok(()) => {
                if failure_streak > 0 {
                    log_info!("detection recovered after {} failed frames", failure_streak);
                    status.set_status(MONITORING_STATUS);
                }
                failure_streak = 0;
            }
            Err(err) => {
                failure_streak += 1;
                if failure_streak == 1 {
                    log_error!("frame {} failed: {err:#}", iterations);
                    status.set_status(DETECTION_FAILED_STATUS);
                } else {
                    log_debug!("frame {} failed ({} in a row): {err:#}", iterations, failure_streak);
                }
            }
        }
    }
}

async fn run_iteration(
    source: &mut dyn VideoSource,
    detectors: &Detectors,
    timeout: Duration,
) -> Result<()> {
    let frame = source.read_frame().context("failed to read camera frame")?;

    let hands = send_with_timeout(detectors.hands.as_ref(), frame.clone(), timeout);
    let pose = send_with_timeout(detectors.pose.as_ref(), frame, timeout);
    let (hands, pose) = tokio::join!(hands, pose);

    match (hands, pose) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
        (Err(hands_err), Err(pose_err)) => {
            log_warn!("pose detection also failed: {pose_err:#}");
            Err(hands_err)
        }
    }
}

async fn send_with_timeout(
    detector: Option<&DetectorHandle>,
    frame: crate::landmarks::VideoFrame,
    timeout: Duration,
) -> Result<()> {
    // A detector that never started or has shut down is skipped, not failed.
    let Some(detector) = detector.filter(|d| !d.is_closed()) else {
        return Ok(());
    };

    match tokio::time::timeout(timeout, detector.send_frame(frame)).await {
        Ok(result) => result,
        Err(_) => Err(anyhow!(
            "{} detection timed out (> {}ms)",
            detector.name(),
            timeout.as_millis()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::VideoFrame;
    use crate::overlay::RecordingStatus;
    use crate::sensing::{spawn_detector, LandmarkDetector};
    use anyhow::bail;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// Plays a fixed script of states, one per call to `state()`.
    struct ScriptedSource {
        script: Vec<PlaybackState>,
        cursor: usize,
        next_index: u64,
        fail_reads: Vec<u64>,
    }

    impl ScriptedSource {
        fn playing_for(frames: usize) -> Self {
            Self::new(vec![PlaybackState::Playing; frames])
        }

        fn new(script: Vec<PlaybackState>) -> Self {
            Self {
                script,
                cursor: 0,
                next_index: 0,
                fail_reads: Vec::new(),
            }
        }
    }

    impl VideoSource for ScriptedSource {
        fn state(&self) -> PlaybackState {
            self.script
                .get(self.cursor)
                .copied()
                .unwrap_or(PlaybackState::Ended)
        }

        fn read_frame(&mut self) -> Result<VideoFrame> {
            let index = self.next_index;
            self.next_index += 1;
            if self.fail_reads.contains(&index) {
                bail!("camera hiccup");
            }
            Ok(VideoFrame::blank(index, 2, 2))
        }
    }

    /// Advances the script after every frame request so paused ticks are
    /// consumed too.
    struct Stepping(Arc<Mutex<ScriptedSource>>);

    impl VideoSource for Stepping {
        fn state(&self) -> PlaybackState {
            let mut inner = self.0.lock().unwrap();
            let state = inner.state();
            inner.cursor += 1;
            state
        }

        fn read_frame(&mut self) -> Result<VideoFrame> {
            self.0.lock().unwrap().read_frame()
        }
    }

    fn stepping(source: ScriptedSource) -> Box<dyn VideoSource> {
        Box::new(Stepping(Arc::new(Mutex::new(source))))
    }

    struct FrameIndex {
        name: &'static str,
        fail_on: Vec<u64>,
        calls: Arc<AtomicUsize>,
    }

    impl FrameIndex {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                fail_on: Vec::new(),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl LandmarkDetector for FrameIndex {
        type Output = u64;

        fn name(&self) -> &'static str {
            self.name
        }

        fn detect(&mut self, frame: &VideoFrame) -> Result<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&frame.index) {
                bail!("detector failed on frame {}", frame.index);
            }
            Ok(frame.index)
        }
    }

    fn drain(rx: &mut mpsc::Receiver<u64>) -> Vec<u64> {
        let mut out = Vec::new();
        while let Ok(v) = rx.try_recv() {
            out.push(v);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_failure_does_not_stop_loop() {
        let (hand_tx, mut hand_rx) = mpsc::channel(64);
        let (pose_tx, mut pose_rx) = mpsc::channel(64);
        let mut hands = FrameIndex::new("hands");
        hands.fail_on = vec![1, 2];
        let (hands, _) = spawn_detector(hands, hand_tx);
        let (pose, _) = spawn_detector(FrameIndex::new("pose"), pose_tx);
        let status = RecordingStatus::new();

        let exit = frame_loop(
            stepping(ScriptedSource::playing_for(5)),
            Detectors {
                hands: Some(hands),
                pose: Some(pose),
            },
            Arc::new(status.clone()),
            DriverConfig::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(exit, LoopExit::SourceEnded);
        assert_eq!(drain(&mut hand_rx), vec![0, 3, 4]);
        assert_eq!(drain(&mut pose_rx), vec![0, 1, 2, 3, 4]);
        assert_eq!(
            status.messages(),
            vec![
                DETECTION_FAILED_STATUS.to_string(),
                MONITORING_STATUS.to_string(),
                "Video ended. Monitoring stopped.".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_read_failure_reschedules() {
        let (pose_tx, mut pose_rx) = mpsc::channel(64);
        let (pose, _) = spawn_detector(FrameIndex::new("pose"), pose_tx);
        let mut source = ScriptedSource::playing_for(4);
        source.fail_reads = vec![1];

        let exit = frame_loop(
            stepping(source),
            Detectors {
                hands: None,
                pose: Some(pose),
            },
            Arc::new(RecordingStatus::new()),
            DriverConfig::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(exit, LoopExit::SourceEnded);
        assert_eq!(drain(&mut pose_rx), vec![0, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_source_sends_nothing() {
        use PlaybackState::*;
        let (pose_tx, mut pose_rx) = mpsc::channel(64);
        let pose_detector = FrameIndex::new("pose");
        let calls = pose_detector.calls.clone();
        let (pose, _) = spawn_detector(pose_detector, pose_tx);
        let status = RecordingStatus::new();

        let exit = frame_loop(
            stepping(ScriptedSource::new(vec![
                Playing, Paused, Paused, Paused, Playing, Ended,
            ])),
            Detectors {
                hands: None,
                pose: Some(pose),
            },
            Arc::new(status.clone()),
            DriverConfig::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(exit, LoopExit::SourceEnded);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(drain(&mut pose_rx), vec![0, 1]);
        assert_eq!(
            status.messages(),
            vec![
                "Video paused".to_string(),
                MONITORING_STATUS.to_string(),
                "Video ended. Monitoring stopped.".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_detectors_is_a_hard_fault() {
        let status = RecordingStatus::new();
        let exit = frame_loop(
            stepping(ScriptedSource::playing_for(100)),
            Detectors::default(),
            Arc::new(status.clone()),
            DriverConfig::default(),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(exit, LoopExit::DetectorsStopped);
        assert_eq!(
            status.current().as_deref(),
            Some("Landmark detection stopped. Restart the monitor.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_loop() {
        let (pose_tx, _pose_rx) = mpsc::channel(1024);
        let (pose, _) = spawn_detector(FrameIndex::new("pose"), pose_tx);
        let token = CancellationToken::new();

        let task = tokio::spawn(frame_loop(
            Box::new(ScriptedSource::playing_for(1)), // never advances: always Playing
            Detectors {
                hands: None,
                pose: Some(pose),
            },
            Arc::new(RecordingStatus::new()),
            DriverConfig::default(),
            token.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
        assert_eq!(task.await.unwrap(), LoopExit::Cancelled);
    }

    struct Slow;

    impl LandmarkDetector for Slow {
        type Output = ();

        fn name(&self) -> &'static str {
            "slow"
        }

        fn detect(&mut self, _frame: &VideoFrame) -> Result<()> {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_detector_times_out_without_stopping() {
        let (tx, _rx) = mpsc::channel(64);
        let (slow, _) = spawn_detector(Slow, tx);
        let status = RecordingStatus::new();

        let exit = frame_loop(
            stepping(ScriptedSource::playing_for(2)),
            Detectors {
                hands: Some(slow),
                pose: None,
            },
            Arc::new(status.clone()),
            DriverConfig {
                frame_interval: Duration::from_millis(5),
                detection_timeout: Duration::from_millis(20),
            },
            CancellationToken::new(),
        )
        .await;

        assert_eq!(exit, LoopExit::SourceEnded);
        assert_eq!(status.messages()[0], DETECTION_FAILED_STATUS);
    }
}
