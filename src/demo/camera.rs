use anyhow::{bail, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::landmarks::VideoFrame;
use crate::sensing::{PlaybackState, VideoSource};
use crate::settings::CameraSettings;

const PLAYING: u8 = 0;
const PAUSED: u8 = 1;
const ENDED: u8 = 2;

/// Shared play/pause/stop switch for a [`SyntheticCamera`].
#[derive(Clone)]
pub struct CameraControl {
    state: Arc<AtomicU8>,
}

impl CameraControl {
    pub fn pause(&self) {
        let _ = self
            .state
            .compare_exchange(PLAYING, PAUSED, Ordering::SeqCst, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        let _ = self
            .state
            .compare_exchange(PAUSED, PLAYING, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Flip between playing and paused. Returns true if now paused.
    pub fn toggle_pause(&self) -> bool {
        if self.state() == PlaybackState::Paused {
            self.resume();
        } else {
            self.pause();
        }
        self.state() == PlaybackState::Paused
    }

    pub fn end(&self) {
        self.state.store(ENDED, Ordering::SeqCst);
    }

    pub fn state(&self) -> PlaybackState {
        match self.state.load(Ordering::SeqCst) {
            PLAYING => PlaybackState::Playing,
            PAUSED => PlaybackState::Paused,
            _ => PlaybackState::Ended,
        }
    }
}

/// Camera stand-in that yields a flat gray picture.
///
/// All frames share one pixel buffer; only the index and capture time change.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
    next_index: u64,
    max_frames: Option<u64>,
    control: CameraControl,
}

impl SyntheticCamera {
    pub fn open(settings: &CameraSettings) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            bail!(
                "camera {} cannot capture at {}x{}",
                settings.device_id,
                settings.width,
                settings.height
            );
        }
        if settings.fps == 0 {
            bail!("camera {} cannot capture at 0 fps", settings.device_id);
        }

        let len = settings.width as usize * settings.height as usize * 3;
        Ok(Self {
            width: settings.width,
            height: settings.height,
            pixels: Arc::from(vec![96u8; len]),
            next_index: 0,
            max_frames: None,
            control: CameraControl {
                state: Arc::new(AtomicU8::new(PLAYING)),
            },
        })
    }

    /// End the stream after `frames` frames.
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    pub fn control(&self) -> CameraControl {
        self.control.clone()
    }
}

impl VideoSource for SyntheticCamera {
    fn state(&self) -> PlaybackState {
        if self.max_frames.is_some_and(|max| self.next_index >= max) {
            return PlaybackState::Ended;
        }
        self.control.state()
    }

    fn read_frame(&mut self) -> Result<VideoFrame> {
        if self.control.state() == PlaybackState::Ended {
            bail!("camera stream has ended");
        }
        let frame = VideoFrame::new(self.next_index, self.width, self.height, self.pixels.clone());
        self.next_index += 1;
        Ok(frame)
    }
}
