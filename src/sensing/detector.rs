use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::landmarks::VideoFrame;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// An opaque landmark model. `detect` may block; it runs on the blocking pool.
pub trait LandmarkDetector: Send + 'static {
    type Output: Send + 'static;

    fn name(&self) -> &'static str;
    fn detect(&mut self, frame: &VideoFrame) -> Result<Self::Output>;
}

struct DetectionRequest {
    frame: VideoFrame,
    done: oneshot::Sender<Result<()>>,
}

/// Sending side of a detector worker.
///
/// `send_frame` resolves once the frame has been processed and its result
/// handed to the results channel, mirroring an awaited `send()` whose
/// completion callback has fired.
#[derive(Clone)]
pub struct DetectorHandle {
    name: &'static str,
    requests: mpsc::Sender<DetectionRequest>,
}

impl DetectorHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The worker has exited and will never accept another frame.
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }

    pub async fn send_frame(&self, frame: VideoFrame) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.requests
            .send(DetectionRequest {
                frame,
                done: done_tx,
            })
            .await
            .map_err(|_| anyhow!("{} detector stopped", self.name))?;

        done_rx
            .await
            .map_err(|_| anyhow!("{} detector dropped the frame", self.name))?
    }
}

/// Start a worker that owns `detector` and publishes each result on `results`.
pub fn spawn_detector<D: LandmarkDetector>(
    detector: D,
    results: mpsc::Sender<D::Output>,
) -> (DetectorHandle, JoinHandle<()>) {
    let name = detector.name();
    // One frame in flight per detector; the frame loop waits for the rest.
    let (tx, rx) = mpsc::channel(1);
    let worker = tokio::spawn(detector_worker(detector, rx, results));

    (DetectorHandle { name, requests: tx }, worker)
}

async fn detector_worker<D: LandmarkDetector>(
    mut detector: D,
    mut requests: mpsc::Receiver<DetectionRequest>,
    results: mpsc::Sender<D::Output>,
) {
    let name = detector.name();
    log_info!("{name} detector worker started");

    while let Some(DetectionRequest { frame, done }) = requests.recv().await {
        let joined = tokio::task::spawn_blocking(move || {
            let outcome = detector.detect(&frame);
            (detector, outcome)
        })
        .await;

        let (returned, outcome) = match joined {
            Ok(pair) => pair,
            Err(err) => {
                // The model went down with the panic; nothing left to run.
                log_warn!("{name} detector crashed: {err}");
                let _ = done.send(Err(anyhow!("{name} detector crashed: {err}")));
                break;
            }
        };
        detector = returned;

        let delivered = match outcome {
            Ok(output) => results
                .send(output)
                .await
                .map_err(|_| anyhow!("{name} results channel closed")),
            Err(err) => Err(err.context(format!("{name} detection failed"))),
        };

        let consumer_gone = results.is_closed();
        let _ = done.send(delivered);
        if consumer_gone {
            break;
        }
    }

    log_info!("{name} detector worker stopped");
}
