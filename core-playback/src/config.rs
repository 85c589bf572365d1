//! # Playback Configuration
//!
//! Tunables shared by every session a core opens.

use crate::error::{PlaybackError, Result};
use crate::speed::PlaybackSpeed;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Media time covered by one progress tick.
    ///
    /// Ticks fire every `progress_interval / speed` of wall-clock time.
    ///
    /// Default: 1 second.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: Duration,

    /// Step used by fast-forward and rewind.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_seek_increment")]
    pub seek_increment: Duration,

    /// Speed applied to new sessions.
    #[serde(default)]
    pub initial_speed: PlaybackSpeed,

    /// Lower the volume instead of pausing when focus loss allows ducking.
    ///
    /// Default: true.
    #[serde(default = "default_duck_on_transient_loss")]
    pub duck_on_transient_loss: bool,

    /// Volume (0.0-1.0) while ducked.
    ///
    /// Default: 0.2.
    #[serde(default = "default_duck_volume")]
    pub duck_volume: f32,

    /// Capacity of a session's command mailbox.
    ///
    /// Default: 32.
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            seek_increment: default_seek_increment(),
            initial_speed: PlaybackSpeed::default(),
            duck_on_transient_loss: default_duck_on_transient_loss(),
            duck_volume: default_duck_volume(),
            command_buffer: default_command_buffer(),
        }
    }
}

impl PlaybackConfig {
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn with_seek_increment(mut self, increment: Duration) -> Self {
        self.seek_increment = increment;
        self
    }

    pub fn with_initial_speed(mut self, speed: PlaybackSpeed) -> Self {
        self.initial_speed = speed;
        self
    }

    pub fn with_ducking(mut self, enabled: bool, volume: f32) -> Self {
        self.duck_on_transient_loss = enabled;
        self.duck_volume = volume;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval < Duration::from_millis(10) {
            return Err(PlaybackError::InvalidConfig(
                "progress_interval must be at least 10ms".to_string(),
            ));
        }

        if self.seek_increment.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "seek_increment must be > 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.duck_volume) {
            return Err(PlaybackError::InvalidConfig(
                "duck_volume must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.command_buffer == 0 {
            return Err(PlaybackError::InvalidConfig(
                "command_buffer must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_progress_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_seek_increment() -> Duration {
    Duration::from_secs(10)
}

fn default_duck_on_transient_loss() -> bool {
    true
}

fn default_duck_volume() -> f32 {
    0.2
}

fn default_command_buffer() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlaybackConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.progress_interval, Duration::from_secs(1));
        assert_eq!(config.seek_increment, Duration::from_secs(10));
        assert_eq!(config.initial_speed, PlaybackSpeed::Normal);
    }

    #[test]
    fn test_rejects_out_of_range_duck_volume() {
        let config = PlaybackConfig::default().with_ducking(true, 1.5);
        assert!(matches!(
            config.validate(),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_zero_seek_increment() {
        let config = PlaybackConfig::default().with_seek_increment(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{"initial_speed": "fast", "duck_on_transient_loss": false}"#)
                .unwrap();

        assert_eq!(config.initial_speed, PlaybackSpeed::Fast);
        assert!(!config.duck_on_transient_loss);
        assert_eq!(config.seek_increment, Duration::from_secs(10));
    }
}
