//! Playback speed steps.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Discrete speed steps offered to the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
    Fastest,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 4] = [
        PlaybackSpeed::Slow,
        PlaybackSpeed::Normal,
        PlaybackSpeed::Fast,
        PlaybackSpeed::Fastest,
    ];

    /// Rate handed to the media backend.
    pub fn multiplier(self) -> f32 {
        match self {
            PlaybackSpeed::Slow => 0.5,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::Fast => 1.5,
            PlaybackSpeed::Fastest => 2.0,
        }
    }

    /// Multiplier in percent, e.g. 150 for `Fast`.
    pub fn percent(self) -> u32 {
        (self.multiplier() * 100.0).round() as u32
    }

    /// Next step; `Fastest` wraps around to `Slow`.
    pub fn next(self) -> Self {
        match self {
            PlaybackSpeed::Slow => PlaybackSpeed::Normal,
            PlaybackSpeed::Normal => PlaybackSpeed::Fast,
            PlaybackSpeed::Fast => PlaybackSpeed::Fastest,
            PlaybackSpeed::Fastest => PlaybackSpeed::Slow,
        }
    }

    /// Wall-clock period covering `media_time` of playback at this speed.
    pub fn scale_interval(self, media_time: Duration) -> Duration {
        media_time.div_f32(self.multiplier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_cycles_through_all_steps() {
        let mut speed = PlaybackSpeed::Slow;
        let mut seen = Vec::new();
        for _ in 0..PlaybackSpeed::ALL.len() {
            seen.push(speed);
            speed = speed.next();
        }

        assert_eq!(seen, PlaybackSpeed::ALL);
        assert_eq!(speed, PlaybackSpeed::Slow);
    }

    #[test]
    fn test_interval_scales_inversely() {
        let base = Duration::from_secs(1);
        assert_eq!(PlaybackSpeed::Normal.scale_interval(base), base);
        assert_eq!(PlaybackSpeed::Fastest.scale_interval(base), Duration::from_millis(500));
        assert_eq!(PlaybackSpeed::Slow.scale_interval(base), Duration::from_secs(2));
        assert!(PlaybackSpeed::Fast.scale_interval(base) < base);
    }

    #[test]
    fn test_percent() {
        assert_eq!(PlaybackSpeed::Fast.percent(), 150);
        assert_eq!(PlaybackSpeed::default().percent(), 100);
    }
}
