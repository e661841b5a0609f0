use crate::landmarks::{hand, HandFrame, Landmark, PoseFrame};
use crate::posture::height::{ABOVE_ELBOW_TEXT, TOO_HIGH_TEXT};
use crate::posture::{HeightFlags, PostureSample, PostureStatus};

use super::{Canvas, Color};

const LANDMARK_RADIUS: f32 = 2.0;
const KNUCKLE_RADIUS: f32 = 4.0;
const ELBOW_OUTER_RADIUS: f32 = 8.0;
const ELBOW_INNER_RADIUS: f32 = 6.0;
const CONNECTION_WIDTH: f32 = 2.0;
const KEYBOARD_LINE_WIDTH: f32 = 2.0;

/// What one overlay pass draws.
pub struct OverlayFrame<'a> {
    pub hand: Option<&'a HandFrame>,
    pub pose: Option<&'a PoseFrame>,
    pub sample: Option<&'a PostureSample>,
    /// Classification of `sample`; `None` when the tick had no sample.
    pub status: Option<PostureStatus>,
    pub height: HeightFlags,
    /// Calibrated keyboard line in image pixels.
    pub keyboard_y: Option<u32>,
}

/// Redraw the whole overlay. Runs on every detector delivery.
pub fn render_overlay(canvas: &mut dyn Canvas, overlay: &OverlayFrame<'_>) {
    canvas.clear();

    let newest_image = match (overlay.hand, overlay.pose) {
        (Some(h), Some(p)) if p.image.index > h.image.index => Some(&p.image),
        (Some(h), _) => Some(&h.image),
        (None, Some(p)) => Some(&p.image),
        (None, None) => None,
    };
    if let Some(image) = newest_image {
        canvas.draw_image(image);
    }
    let image_height = newest_image.map_or(canvas.height(), |image| image.height);

    if let Some(hand_frame) = overlay.hand {
        for landmarks in &hand_frame.hands {
            draw_hand(canvas, landmarks);
        }
    }

    if let Some(pose) = overlay.pose {
        if let Some(elbow) = pose.right_elbow() {
            draw_elbow(canvas, elbow);
        }
        canvas.text("Tracking Active", 10.0, 30.0, Color::GREEN, 18.0);

        if let Some(keyboard_y) = overlay.keyboard_y {
            let y = keyboard_y as f32 * canvas.height() as f32 / image_height.max(1) as f32;
            let w = canvas.width() as f32;
            canvas.line((0.0, y), (w, y), Color::GREEN, KEYBOARD_LINE_WIDTH);
        }
    }

    if overlay.height.wrist_above_elbow {
        canvas.text(ABOVE_ELBOW_TEXT, 50.0, 130.0, Color::RED, 28.0);
    }
    if overlay.height.wrist_too_high {
        canvas.text(TOO_HIGH_TEXT, 50.0, 170.0, Color::RED, 28.0);
    }

    if let Some(sample) = overlay.sample {
        draw_angle(canvas, sample);
    }

    match overlay.status {
        Some(PostureStatus::Ok) => {
            canvas.text(PostureStatus::Ok.label(), 10.0, 90.0, Color::GREEN, 24.0);
        }
        Some(PostureStatus::Alerting) => {
            canvas.text(PostureStatus::Alerting.label(), 10.0, 90.0, Color::RED, 32.0);
        }
        Some(PostureStatus::BadPending) | None => {}
    }
}

fn px(canvas: &dyn Canvas, landmark: &Landmark) -> (f32, f32) {
    landmark.to_pixels(canvas.width(), canvas.height())
}

fn draw_hand(canvas: &mut dyn Canvas, landmarks: &[Landmark]) {
    for (a, b) in hand::HAND_CONNECTIONS {
        if let (Some(from), Some(to)) = (landmarks.get(a), landmarks.get(b)) {
            let from = px(canvas, from);
            let to = px(canvas, to);
            canvas.line(from, to, Color::YELLOW, CONNECTION_WIDTH);
        }
    }

    for landmark in landmarks {
        let (x, y) = px(canvas, landmark);
        canvas.arc(x, y, LANDMARK_RADIUS, Color::GREEN, true);
    }

    for idx in hand::KNUCKLES {
        if let Some(knuckle) = landmarks.get(idx) {
            let (x, y) = px(canvas, knuckle);
            canvas.arc(x, y, KNUCKLE_RADIUS, Color::RED, true);
        }
    }
}

fn draw_elbow(canvas: &mut dyn Canvas, elbow: &Landmark) {
    let (x, y) = px(canvas, elbow);
    canvas.arc(x, y, ELBOW_OUTER_RADIUS, Color::WHITE, false);
    canvas.arc(x, y, ELBOW_INNER_RADIUS, Color::RED, true);
    canvas.text("Elbow", x + 10.0, y, Color::WHITE, 14.0);
}

fn draw_angle(canvas: &mut dyn Canvas, sample: &PostureSample) {
    let w = canvas.width() as f32;
    let h = canvas.height() as f32;
    let elbow = (sample.elbow.x * w, sample.elbow.y * h);
    let wrist = (sample.wrist.x * w, sample.wrist.y * h);
    let index_mcp = (sample.index_mcp.x * w, sample.index_mcp.y * h);

    canvas.line(elbow, wrist, Color::WHITE, 3.0);
    canvas.line(wrist, index_mcp, Color::ORANGE, 3.0);
    canvas.text(
        &format_angle(sample.angle_deg),
        wrist.0 + 10.0,
        wrist.1 - 10.0,
        Color::WHITE,
        16.0,
    );
}

pub fn format_angle(angle_deg: f32) -> String {
    format!("Wrist angle: {:.1}°", angle_deg)
}
