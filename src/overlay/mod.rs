//! Output sinks: the drawing surface and the status line.
//!
//! The monitor only talks to these traits. [`console::ConsoleCanvas`] backs
//! the terminal binary; [`RecordingCanvas`] keeps every call for inspection.

pub mod console;
pub mod render;

use std::sync::{Arc, Mutex};

use crate::landmarks::VideoFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const ORANGE: Color = Color::rgb(255, 165, 0);
}

/// 2D drawing primitives in surface pixel coordinates.
pub trait Canvas: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn clear(&mut self);
    fn draw_image(&mut self, frame: &VideoFrame);
    fn arc(&mut self, x: f32, y: f32, radius: f32, color: Color, filled: bool);
    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32);
    fn text(&mut self, text: &str, x: f32, y: f32, color: Color, size: f32);
}

/// Single human-readable status line.
pub trait StatusSink: Send + Sync {
    fn set_status(&self, message: &str);
}

/// Status line that goes to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatus;

impl StatusSink for LogStatus {
    fn set_status(&self, message: &str) {
        log::info!("[status] {message}");
    }
}

/// Keeps every status message; the last one is the current status.
#[derive(Debug, Default, Clone)]
pub struct RecordingStatus {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn current(&self) -> Option<String> {
        self.messages.lock().unwrap().last().cloned()
    }
}

impl StatusSink for RecordingStatus {
    fn set_status(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Image { frame_index: u64 },
    Arc { x: f32, y: f32, radius: f32, color: Color, filled: bool },
    Line { from: (f32, f32), to: (f32, f32), color: Color, width: f32 },
    Text { text: String, x: f32, y: f32, color: Color, size: f32 },
}

/// Canvas that records draw calls. Clones share the same record.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    commands: Arc<Mutex<Vec<DrawCommand>>>,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn commands(&self) -> Vec<DrawCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Draw calls since the most recent clear.
    pub fn last_frame(&self) -> Vec<DrawCommand> {
        let commands = self.commands.lock().unwrap();
        let start = commands
            .iter()
            .rposition(|c| *c == DrawCommand::Clear)
            .unwrap_or(0);
        commands[start..].to_vec()
    }

    pub fn frame_count(&self) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == DrawCommand::Clear)
            .count()
    }

    pub fn texts(&self) -> Vec<String> {
        self.last_frame()
            .into_iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, command: DrawCommand) {
        self.commands.lock().unwrap().push(command);
    }
}

impl Canvas for RecordingCanvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.push(DrawCommand::Clear);
    }

    fn draw_image(&mut self, frame: &VideoFrame) {
        self.push(DrawCommand::Image {
            frame_index: frame.index,
        });
    }

    fn arc(&mut self, x: f32, y: f32, radius: f32, color: Color, filled: bool) {
        self.push(DrawCommand::Arc {
            x,
            y,
            radius,
            color,
            filled,
        });
    }

    fn line(&mut self, from: (f32, f32), to: (f32, f32), color: Color, width: f32) {
        self.push(DrawCommand::Line {
            from,
            to,
            color,
            width,
        });
    }

    fn text(&mut self, text: &str, x: f32, y: f32, color: Color, size: f32) {
        self.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
            color,
            size,
        });
    }
}
