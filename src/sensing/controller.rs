use anyhow::{bail, Context, Result};
use log::info;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::overlay::StatusSink;

use super::loop_worker::{frame_loop, Detectors, DriverConfig, LoopExit};
use super::VideoSource;

/// Owns the running frame loop task.
pub struct FrameDriver {
    handle: Option<JoinHandle<LoopExit>>,
    cancel_token: Option<CancellationToken>,
}

impl FrameDriver {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the frame loop. `cancel_token` is usually a child of the
    /// session token so a session shutdown reaches the loop too.
    pub fn start(
        &mut self,
        source: Box<dyn VideoSource>,
        detectors: Detectors,
        status: Arc<dyn StatusSink>,
        config: DriverConfig,
        cancel_token: CancellationToken,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("frame driver already running");
        }

        info!(
            "starting frame driver (interval {}ms, detection timeout {}ms)",
            config.frame_interval.as_millis(),
            config.detection_timeout.as_millis()
        );

        let handle = tokio::spawn(frame_loop(
            source,
            detectors,
            status,
            config,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    /// Wait for the loop to finish on its own (source ended, hard fault).
    pub async fn join(&mut self) -> Result<Option<LoopExit>> {
        self.cancel_token = None;
        match self.handle.take() {
            Some(handle) => handle
                .await
                .context("frame loop task failed to join")
                .map(Some),
            None => Ok(None),
        }
    }

    pub async fn stop(&mut self) -> Result<Option<LoopExit>> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
        self.join().await
    }
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}
