//! Configuration for the depth publisher.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use depthlink_core::{
    COMPRESSED_IMAGE_TYPE, DataEncoding, DepthLinkError, DepthPattern, OverlapPolicy,
    PipelineConfig, PixelLayout, PngCompression,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    /// rosbridge connection.
    pub bridge: BridgeConfig,
    /// Topic and header settings.
    pub topic: TopicConfig,
    /// Capture size, rate and encoding.
    pub capture: CaptureConfig,
    /// Synthetic frame source.
    pub source: SourceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// rosbridge connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// WebSocket URL of the rosbridge server.
    pub url: String,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

/// Topic settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Topic name.
    pub name: String,
    /// ROS message type advertised for the topic.
    pub message_type: String,
    /// `frame_id` written into every header.
    pub frame_id: String,
    /// `int_array` or `base64`.
    pub data_encoding: DataEncoding,
}

/// Capture pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    /// Seconds between captures.
    pub publish_interval_secs: f64,
    /// Seconds to wait after advertising before the first capture.
    pub startup_delay_secs: f64,
    /// `drop_when_busy` or `allow`.
    pub overlap: OverlapPolicy,
    /// Write rows bottom-up. `true` reproduces the row order of a Unity
    /// `Texture2D` export, which puts y = 0 at the bottom.
    pub flip_vertical: bool,
    /// `luma8`, `rgb8` or `rgba8`.
    pub layout: PixelLayout,
    /// `fast`, `default` or `best`.
    pub compression: PngCompression,
}

/// Synthetic source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `ramp` or `checkerboard`.
    pub pattern: DepthPattern,
    /// Simulated readback latency in milliseconds.
    pub readback_latency_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:9090".into(),
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            name: "/camera/depth/compressed".into(),
            message_type: COMPRESSED_IMAGE_TYPE.into(),
            frame_id: "camera".into(),
            data_encoding: DataEncoding::IntArray,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 720,
            height: 480,
            publish_interval_secs: 0.1,
            startup_delay_secs: 2.0,
            overlap: OverlapPolicy::DropWhenBusy,
            flip_vertical: false,
            layout: PixelLayout::Rgb8,
            compression: PngCompression::Default,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            pattern: DepthPattern::Ramp,
            readback_latency_ms: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl PublisherConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Convert capture settings into a [`PipelineConfig`].
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, DepthLinkError> {
        let cfg = PipelineConfig {
            width: self.capture.width,
            height: self.capture.height,
            publish_interval: secs("publish_interval_secs", self.capture.publish_interval_secs)?,
            startup_delay: secs("startup_delay_secs", self.capture.startup_delay_secs)?,
            frame_id: self.topic.frame_id.clone(),
            overlap: self.capture.overlap,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.bridge.connect_timeout_ms)
    }

    pub fn readback_latency(&self) -> Duration {
        Duration::from_millis(self.source.readback_latency_ms)
    }
}

fn secs(name: &str, value: f64) -> Result<Duration, DepthLinkError> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| DepthLinkError::InvalidConfig(format!("{name} = {value}: {e}")))
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&PublisherConfig::default()).unwrap();
        assert!(text.contains("url"));
        assert!(text.contains("publish_interval_secs"));
        assert!(text.contains("drop_when_busy"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&PublisherConfig::default()).unwrap();
        let parsed: PublisherConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.topic.name, "/camera/depth/compressed");
        assert_eq!(parsed.topic.message_type, "sensor_msgs/msg/CompressedImage");
        assert_eq!(parsed.capture.width, 720);
        assert_eq!(parsed.capture.height, 480);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: PublisherConfig = toml::from_str(
            r#"
            [topic]
            data_encoding = "base64"

            [capture]
            width = 64
            overlap = "allow"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.topic.data_encoding, DataEncoding::Base64);
        assert_eq!(parsed.topic.frame_id, "camera");
        assert_eq!(parsed.capture.width, 64);
        assert_eq!(parsed.capture.height, 480);
        assert_eq!(parsed.capture.overlap, OverlapPolicy::Allow);
    }

    #[test]
    fn to_pipeline_config_converts_seconds() {
        let cfg = PublisherConfig::default().to_pipeline_config().unwrap();
        assert_eq!(cfg.publish_interval, Duration::from_millis(100));
        assert_eq!(cfg.startup_delay, Duration::from_secs(2));
        assert_eq!(cfg.frame_id, "camera");
    }

    #[test]
    fn to_pipeline_config_rejects_bad_values() {
        let mut cfg = PublisherConfig::default();
        cfg.capture.publish_interval_secs = -1.0;
        assert!(cfg.to_pipeline_config().is_err());

        let mut cfg = PublisherConfig::default();
        cfg.capture.publish_interval_secs = 0.0;
        assert!(cfg.to_pipeline_config().is_err());

        let mut cfg = PublisherConfig::default();
        cfg.capture.height = 0;
        assert!(cfg.to_pipeline_config().is_err());
    }

    #[test]
    fn unreachable_startup_delay_is_rejected() {
        let mut cfg = PublisherConfig::default();
        cfg.capture.startup_delay_secs = 1e19;
        assert!(matches!(
            cfg.to_pipeline_config(),
            Err(DepthLinkError::InvalidConfig(_))
        ));
    }

    #[test]
    fn write_default_then_load() {
        let path = std::env::temp_dir().join(format!(
            "depthlink-default-{}.toml",
            std::process::id()
        ));
        PublisherConfig::write_default(&path).unwrap();
        let cfg = PublisherConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.bridge.url, "ws://127.0.0.1:9090");
        assert_eq!(cfg.capture.overlap, OverlapPolicy::DropWhenBusy);
        assert!(!cfg.capture.flip_vertical);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = PublisherConfig::load(Path::new("/definitely/not/here.toml"));
        assert_eq!(cfg.bridge.url, "ws://127.0.0.1:9090");
    }
}
