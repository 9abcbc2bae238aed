//! Studio configuration types

use crate::layout::LayoutConfig;
use crate::recorder::state::SessionMode;
use serde::{Deserialize, Serialize};

/// Long-lived configuration for one studio instance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioConfig {
    /// Host used when building guest invite links
    pub guest_link_host: String,

    /// Guest invite time-to-live in seconds
    pub invite_ttl_secs: u64,

    /// Encoder chunk cadence in milliseconds. Chunk delivery is periodic
    /// but not guaranteed real-time; duration accounting never depends on it.
    pub chunk_interval_ms: u64,

    /// MIME type requested from the encoder factory
    pub mime_type: String,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            guest_link_host: "studio.example.com".to_string(),
            invite_ttl_secs: 24 * 60 * 60,
            chunk_interval_ms: 1_000,
            mime_type: "video/webm;codecs=vp8,opus".to_string(),
        }
    }
}

/// Configuration for starting one recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Local artifact only, or local artifact plus destination fan-out
    pub mode: SessionMode,

    /// Visual layout for the composite
    pub layout: LayoutConfig,

    /// Optional background asset rendered behind the composite
    pub background_id: Option<String>,
}

impl SessionConfig {
    /// Record-mode session with the given layout.
    pub fn record(layout: LayoutConfig) -> Self {
        Self {
            mode: SessionMode::Record,
            layout,
            background_id: None,
        }
    }

    /// Stream-mode session with the given layout.
    pub fn stream(layout: LayoutConfig) -> Self {
        Self {
            mode: SessionMode::Stream,
            layout,
            background_id: None,
        }
    }
}
