//! Depth publisher service.
//!
//! Wires a transport, a topic channel, a frame source and the capture
//! pipeline together and runs them until stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use depthlink_core::{
    CapturePipeline, ChannelTransport, DepthEncoder, Envelope, StatsSnapshot,
    SyntheticDepthSource, TopicChannel, Transport, WebSocketTransport,
};

use crate::config::PublisherConfig;

// ── DepthPublisherService ────────────────────────────────────────

/// The top-level publisher service.
pub struct DepthPublisherService {
    config: PublisherConfig,
    dry_run: bool,
    running: Arc<AtomicBool>,
}

impl DepthPublisherService {
    /// Create a new service with the given config.
    pub fn new(config: PublisherConfig) -> Self {
        Self {
            config,
            dry_run: false,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Publish into an in-memory transport and log each envelope instead
    /// of connecting to a bridge.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run the service until stopped.
    ///
    /// 1. Opens the transport (WebSocket, or in-memory for dry runs).
    /// 2. Starts the capture pipeline, which advertises the topic.
    /// 3. Waits for `running` to become `false`.
    /// 4. Shuts the pipeline down and returns its final counters.
    pub async fn run(&self) -> Result<StatsSnapshot, Box<dyn std::error::Error>> {
        self.running.store(true, Ordering::SeqCst);

        let transport = match self.open_transport().await {
            Ok(t) => t,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let result = self.run_pipeline(transport).await;
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn open_transport(&self) -> Result<Arc<dyn Transport>, Box<dyn std::error::Error>> {
        if self.dry_run {
            let (transport, rx) = ChannelTransport::new();
            tokio::spawn(log_envelopes(rx));
            info!("dry run: envelopes are logged, not sent");
            return Ok(Arc::new(transport));
        }

        let ws = WebSocketTransport::connect(&self.config.bridge.url, self.config.connect_timeout())
            .await
            .inspect_err(|e| error!("failed to connect to {}: {e}", self.config.bridge.url))?;
        Ok(Arc::new(ws))
    }

    async fn run_pipeline(
        &self,
        transport: Arc<dyn Transport>,
    ) -> Result<StatsSnapshot, Box<dyn std::error::Error>> {
        let cfg = &self.config;
        let pipeline_config = cfg.to_pipeline_config()?;

        let channel = TopicChannel::new(&cfg.topic.name, &cfg.topic.message_type, transport)?
            .with_data_encoding(cfg.topic.data_encoding);

        let source =
            SyntheticDepthSource::new(cfg.capture.width, cfg.capture.height, cfg.source.pattern)
                .with_latency(cfg.readback_latency());

        let encoder = DepthEncoder::png(cfg.capture.compression)
            .with_layout(cfg.capture.layout)
            .with_flip_vertical(cfg.capture.flip_vertical);

        let mut pipeline =
            CapturePipeline::new(pipeline_config, Box::new(source), encoder, Arc::new(channel))?;

        if let Err(e) = pipeline.start().await {
            error!("failed to start capture pipeline: {e}");
            return Err(e.into());
        }

        Self::wait_for_stop(&self.running).await;

        Ok(pipeline.shutdown().await?)
    }

    /// Async helper: resolves when `running` becomes false.
    async fn wait_for_stop(running: &Arc<AtomicBool>) {
        loop {
            if !running.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }
    }
}

/// Drain a dry-run transport, logging one line per envelope.
async fn log_envelopes(mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        match Envelope::from_json(&text) {
            Ok(Envelope::Advertise {
                topic,
                message_type,
            }) => info!("advertise {topic} ({message_type})"),
            Ok(Envelope::Publish { topic, msg }) => debug!(
                "publish {topic}: {} {} at {}.{:09} ({} bytes of JSON)",
                msg.format,
                msg.header.frame_id,
                msg.header.stamp.secs,
                msg.header.stamp.nsecs,
                text.len()
            ),
            Err(e) => error!("unparseable envelope: {e}"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
