//! Pruner configuration.
//!
//! Field names are camelCase on the wire so the preferences object stored
//! by the extension options page deserializes without translation.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Tunables for a pruning session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrunerConfig {
    /// Live blocks retained while no side canvas is open.
    pub keep: usize,

    /// Live blocks retained while a side canvas is open.
    pub canvas_keep: usize,

    /// Inject a stylesheet that turns off CSS animations and transitions.
    pub disable_animations: bool,

    /// Advisory only. Reported in status; threshold selection ignores it.
    pub aggressive_when_canvas: bool,

    /// Snapshots moved back per expand-chunk intent.
    pub chunk_size: usize,

    /// Maximum number of archived snapshots.
    pub max_stored: usize,

    /// Minimum interval between two executed prune passes.
    pub throttle_ms: u64,

    /// Timeout handed to the idle callback of a scheduled pass.
    pub idle_timeout_ms: u64,

    /// Delay used when the host has no idle callbacks.
    pub fallback_delay_ms: u64,

    /// Delay between page load and observer start.
    pub start_delay_ms: u64,

    /// Interval of the periodic status refresh.
    pub status_refresh_ms: u64,

    /// Stick the control bar to the bottom of the viewport.
    pub sticky_bar: bool,

    /// Height reserved under the transcript so the bar covers nothing.
    pub bar_spacer_px: u32,
}

impl Default for PrunerConfig {
    fn default() -> Self {
        PrunerConfig {
            keep: 18,
            canvas_keep: 10,
            disable_animations: true,
            aggressive_when_canvas: true,
            chunk_size: 20,
            max_stored: 2000,
            throttle_ms: 600,
            idle_timeout_ms: 1200,
            fallback_delay_ms: 250,
            start_delay_ms: 700,
            status_refresh_ms: 2500,
            sticky_bar: true,
            bar_spacer_px: 70,
        }
    }
}

impl PrunerConfig {
    /// Parse and validate a JSON preferences object.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PrunerConfig = serde_json::from_str(json)?;
        config.validate()
    }

    /// Reject values that would make the engine degenerate.
    pub fn validate(self) -> Result<Self, ConfigError> {
        let positive = [
            ("keep", self.keep),
            ("canvasKeep", self.canvas_keep),
            ("chunkSize", self.chunk_size),
            ("maxStored", self.max_stored),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(self)
    }

    /// Retention threshold for the current canvas state.
    pub fn keep_for(&self, canvas_open: bool) -> usize {
        if canvas_open {
            self.canvas_keep
        } else {
            self.keep
        }
    }
}
