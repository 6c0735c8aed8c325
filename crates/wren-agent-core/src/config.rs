use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
/// Inbound rate-limit gate settings.
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_minute: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
/// Runtime settings for the agent loop, passed explicitly into the
/// orchestrator so tests can pin deterministic values.
pub struct LoopConfig {
    /// Per-turn iteration cap.
    pub max_iterations: usize,
    /// Model used for the last-resort error interpretation call.
    pub interpret_model: String,
    /// Bounded wait for the error interpretation call.
    pub interpret_timeout_ms: u64,
    /// Bounded wait for one transport send.
    pub send_timeout_ms: u64,
    /// Typing indicator refresh period; 0 disables the indicator.
    pub typing_interval_secs: u64,
    pub rate_limit: RateLimitConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            interpret_model: "gpt-4o-mini".to_string(),
            interpret_timeout_ms: 10_000,
            send_timeout_ms: 30_000,
            typing_interval_secs: 4,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl LoopConfig {
    pub fn from_toml_str(raw: &str) -> anyhow::Result<Self> {
        toml::from_str(raw).context("failed to parse loop config")
    }

    pub fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read loop config from {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}
