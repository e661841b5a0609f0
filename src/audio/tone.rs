use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

pub const TONE_FREQUENCY_HZ: f32 = 880.0;
pub const TONE_GAIN: f32 = 0.1;
pub const TONE_DURATION: Duration = Duration::from_millis(200);

/// Linear fade at both ends so the tone starts and stops without a click.
const FADE: Duration = Duration::from_millis(10);

/// Short fixed alert beep: sine wave, fixed pitch, low volume.
pub struct AlertTone {
    sample_rate: u32,
    num_sample: usize,
    total_samples: usize,
    fade_samples: usize,
}

impl AlertTone {
    pub fn new() -> Self {
        let sample_rate = 44100;
        Self {
            sample_rate,
            num_sample: 0,
            total_samples: samples_for(TONE_DURATION, sample_rate),
            fade_samples: samples_for(FADE, sample_rate),
        }
    }

    fn envelope(&self) -> f32 {
        let from_start = self.num_sample;
        let to_end = self.total_samples - self.num_sample;
        let edge = from_start.min(to_end);
        if edge >= self.fade_samples {
            1.0
        } else {
            edge as f32 / self.fade_samples as f32
        }
    }
}

impl Default for AlertTone {
    fn default() -> Self {
        Self::new()
    }
}

fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).round() as usize
}

impl Iterator for AlertTone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / self.sample_rate as f32;
        let sample = (2.0 * PI * TONE_FREQUENCY_HZ * t).sin() * self.envelope() * TONE_GAIN;
        self.num_sample += 1;

        Some(sample)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total_samples - self.num_sample;
        (remaining, Some(remaining))
    }
}

impl Source for AlertTone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(TONE_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_is_finite_and_short() {
        let tone = AlertTone::new();
        let expected = tone.size_hint().0;
        let samples: Vec<f32> = tone.collect();
        assert_eq!(samples.len(), expected);
        assert_eq!(samples.len(), 8820); // 200 ms at 44.1 kHz
    }

    #[test]
    fn test_tone_stays_quiet() {
        let peak = AlertTone::new().fold(0.0f32, |acc, s| acc.max(s.abs()));
        assert!(peak <= TONE_GAIN + f32::EPSILON);
        assert!(peak > TONE_GAIN * 0.9);
    }

    #[test]
    fn test_tone_fades_in_and_out() {
        let samples: Vec<f32> = AlertTone::new().collect();
        assert_eq!(samples[0], 0.0);
        assert!(samples.last().unwrap().abs() < TONE_GAIN * 0.01);
    }
}
