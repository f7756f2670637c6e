//! Coordinator configuration types and defaults.
//!
//! This module contains the configuration structure and default values used
//! to tune a match coordinator: AI pacing, inbox sizing and presence naming.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration structure for a match coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Simulated AI "thinking" time before it replies, in milliseconds
    #[serde(default = "default_ai_think_delay_ms")]
    pub ai_think_delay_ms: u64,

    /// Capacity of the session actor's inbound channel
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Name of the presence channel clients announce themselves on
    #[serde(default = "default_presence_channel")]
    pub presence_channel: String,

    /// Prefix for generated presence keys of anonymous viewers
    #[serde(default = "default_anonymous_key_prefix")]
    pub anonymous_key_prefix: String,
}

fn default_ai_think_delay_ms() -> u64 {
    1000
}

fn default_inbox_capacity() -> usize {
    256
}

fn default_presence_channel() -> String {
    "online-players".to_string()
}

fn default_anonymous_key_prefix() -> String {
    "guest-".to_string()
}

impl CoordinatorConfig {
    pub fn ai_think_delay(&self) -> Duration {
        Duration::from_millis(self.ai_think_delay_ms)
    }

    /// Returns a copy with a different AI delay.
    pub fn with_ai_think_delay(mut self, delay: Duration) -> Self {
        self.ai_think_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.inbox_capacity == 0 {
            return Err("inbox_capacity must be greater than 0".to_string());
        }
        if self.presence_channel.is_empty() {
            return Err("presence_channel cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ai_think_delay_ms: default_ai_think_delay_ms(),
            inbox_capacity: default_inbox_capacity(),
            presence_channel: default_presence_channel(),
            anonymous_key_prefix: default_anonymous_key_prefix(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.ai_think_delay(), Duration::from_secs(1));
        assert_eq!(config.inbox_capacity, 256);
        assert_eq!(config.presence_channel, "online-players");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = CoordinatorConfig {
            inbox_capacity: 0,
            ..CoordinatorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
