use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::landmarks::{HandFrame, PoseFrame};
use crate::overlay::StatusSink;
use crate::posture::{PostureSnapshot, WristMonitor};
use crate::sensing::loop_worker::MONITORING_STATUS;
use crate::sensing::{
    spawn_detector, Detectors, DriverConfig, FrameDriver, LandmarkDetector, LoopExit, VideoSource,
};

/// Detector results queued ahead of the fusion task.
const RESULT_BUFFER: usize = 4;

/// A running monitoring session: frame driver, two detector workers and the
/// fusion task that owns the [`WristMonitor`].
pub struct MonitorSession {
    cancel_token: CancellationToken,
    driver: FrameDriver,
    fusion: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
    snapshots: watch::Receiver<PostureSnapshot>,
}

impl MonitorSession {
    /// Start monitoring.
    ///
    /// Each input is passed as the result of constructing it. A detector
    /// that failed to initialise is reported and left out; the session runs
    /// on the other one. A camera failure, or both detectors failing, is
    /// reported and aborts the start.
    pub fn start<H, P>(
        source: Result<Box<dyn VideoSource>>,
        hands: Result<H>,
        pose: Result<P>,
        monitor: WristMonitor,
        status: Arc<dyn StatusSink>,
        config: DriverConfig,
    ) -> Result<Self>
    where
        H: LandmarkDetector<Output = HandFrame>,
        P: LandmarkDetector<Output = PoseFrame>,
    {
        let source = match source {
            Ok(source) => source,
            Err(err) => {
                error!("camera acquisition failed: {err:#}");
                status.set_status(&format!("Camera unavailable: {err}"));
                return Err(err.context("camera acquisition failed"));
            }
        };

        let (hand_tx, hand_rx) = mpsc::channel::<HandFrame>(RESULT_BUFFER);
        let (pose_tx, pose_rx) = mpsc::channel::<PoseFrame>(RESULT_BUFFER);
        let mut workers = Vec::new();
        let mut detectors = Detectors::default();

        match hands {
            Ok(detector) => {
                let (handle, worker) = spawn_detector(detector, hand_tx);
                detectors.hands = Some(handle);
                workers.push(worker);
            }
            Err(err) => {
                warn!("hand detector failed to initialise: {err:#}");
                status.set_status(&format!("Hand tracking unavailable: {err}"));
            }
        }

        match pose {
            Ok(detector) => {
                let (handle, worker) = spawn_detector(detector, pose_tx);
                detectors.pose = Some(handle);
                workers.push(worker);
            }
            Err(err) => {
                warn!("pose detector failed to initialise: {err:#}");
                status.set_status(&format!("Pose tracking unavailable: {err}"));
            }
        }

        if detectors.hands.is_none() && detectors.pose.is_none() {
            status.set_status("No landmark detector could be started.");
            return Err(anyhow!("no landmark detector could be started"));
        }

        let cancel_token = CancellationToken::new();
        let snapshots = monitor.subscribe();
        let fusion = tokio::spawn(fusion_loop(
            monitor,
            hand_rx,
            pose_rx,
            cancel_token.child_token(),
        ));

        // Keep an init failure message visible rather than covering it.
        if detectors.hands.is_some() && detectors.pose.is_some() {
            status.set_status(MONITORING_STATUS);
        }

        let mut driver = FrameDriver::new();
        driver.start(
            source,
            detectors,
            status.clone(),
            config,
            cancel_token.child_token(),
        )?;

        info!("monitoring session started");

        Ok(Self {
            cancel_token,
            driver,
            fusion: Some(fusion),
            workers,
            snapshots,
        })
    }

    pub fn snapshots(&self) -> watch::Receiver<PostureSnapshot> {
        self.snapshots.clone()
    }

    /// Token that stops the whole session when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Wait until the frame loop ends (source ended, hard fault or
    /// cancellation), then wind down the detectors and the fusion task.
    pub async fn wait(mut self) -> Result<Option<LoopExit>> {
        let exit = self.driver.join().await?;
        self.shutdown().await?;
        info!("monitoring session finished ({exit:?})");
        Ok(exit)
    }

    pub async fn stop(self) -> Result<Option<LoopExit>> {
        self.cancel_token.cancel();
        self.wait().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        // Detector handles died with the frame loop, so the workers drain
        // and exit, which in turn closes the fusion streams.
        for worker in self.workers.drain(..) {
            worker.await.context("detector worker failed to join")?;
        }
        if let Some(fusion) = self.fusion.take() {
            fusion.await.context("fusion task failed to join")?;
        }
        Ok(())
    }
}

/// Feed detector results into the monitor as they arrive, in whichever
/// order the two streams deliver them.
async fn fusion_loop(
    mut monitor: WristMonitor,
    mut hand_rx: mpsc::Receiver<HandFrame>,
    mut pose_rx: mpsc::Receiver<PoseFrame>,
    cancel_token: CancellationToken,
) {
    let mut hands_open = true;
    let mut pose_open = true;

    while hands_open || pose_open {
        tokio::select! {
            frame = hand_rx.recv(), if hands_open => match frame {
                Some(frame) => monitor.on_hand_frame(frame),
                None => hands_open = false,
            },
            frame = pose_rx.recv(), if pose_open => match frame {
                Some(frame) => monitor.on_pose_frame(frame),
                None => pose_open = false,
            },
            _ = cancel_token.cancelled() => break,
        }
    }

    info!("fusion loop stopped (final status {:?})", monitor.status());
}
