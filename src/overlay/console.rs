use crate::landmarks::VideoFrame;
use crate::posture::height::{ABOVE_ELBOW_TEXT, TOO_HIGH_TEXT};
use crate::posture::PostureStatus;

use super::{Canvas, Color};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

fn is_warning(text: &str) -> bool {
    text == PostureStatus::Ok.label()
        || text == PostureStatus::Alerting.label()
        || text == ABOVE_ELBOW_TEXT
        || text == TOO_HIGH_TEXT
}

/// Terminal stand-in for a drawing surface.
///
/// Pixels are discarded. Indicator and warning texts are traced as soon as
/// they appear or disappear, the angle readout on every frame. Posture
/// transitions themselves are logged from the snapshot channel.
pub struct ConsoleCanvas {
    width: u32,
    height: u32,
    shown: Vec<String>,
    drawn: Vec<String>,
    frames: u64,
}

impl ConsoleCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            shown: Vec::new(),
            drawn: Vec::new(),
            frames: 0,
        }
    }

    /// Trace warnings the finished frame no longer shows.
    fn end_frame(&mut self) {
        for gone in self.shown.iter().filter(|t| !self.drawn.contains(t)) {
            log_debug!("frame {}: cleared {}", self.frames, gone);
        }
        self.shown = std::mem::take(&mut self.drawn);
    }
}

impl Canvas for ConsoleCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        if self.frames > 0 {
            self.end_frame();
        }
        self.frames += 1;
    }

    fn draw_image(&mut self, _frame: &VideoFrame) {}

    fn arc(&mut self, _x: f32, _y: f32, _radius: f32, _color: Color, _filled: bool) {}

    fn line(&mut self, _from: (f32, f32), _to: (f32, f32), _color: Color, _width: f32) {}

    fn text(&mut self, text: &str, _x: f32, _y: f32, _color: Color, _size: f32) {
        if is_warning(text) {
            if !self.shown.iter().any(|t| t == text) {
                log_debug!("frame {}: {}", self.frames, text);
            }
            self.drawn.push(text.to_string());
        } else if text.starts_with("Wrist angle") {
            log_debug!("frame {}: {}", self.frames, text);
        }
    }
}
