//! Fixed-rate capture → encode → publish pipeline.
//!
//! Orchestrates one capture cycle per tick:
//!
//! 1. [`FrameSource::render`] on the scheduler task.
//! 2. [`FrameSource::request_readback`], then the scheduler moves on.
//! 3. A spawned task awaits the [`Readback`], runs the
//!    [`DepthEncoder`] on a blocking worker, stamps the image and sends a
//!    publish envelope through the [`TopicChannel`].
//!
//! Ticks are scheduled on wall-clock time and never wait for earlier
//! cycles. Whether cycles may overlap is governed by [`OverlapPolicy`].
//!
//! Every failure drops only its own tick; the counters in
//! [`PipelineStats`] record what happened.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::encoder::DepthEncoder;
use crate::capture::source::{FrameSource, Readback};
use crate::capture::types::DepthFrame;
use crate::error::{DepthLinkError, EncodeError};
use crate::protocol::topic::TopicChannel;
use crate::time::{Clock, SystemClock};

// ── Configuration ────────────────────────────────────────────────

/// What to do when a tick fires while a previous cycle is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Skip the tick entirely (no render, no readback) and count it.
    #[default]
    DropWhenBusy,
    /// Start a new cycle regardless. Publishes may arrive out of order.
    Allow,
}

/// Configuration for [`CapturePipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Depth grid width in pixels.
    pub width: u32,
    /// Depth grid height in pixels.
    pub height: u32,
    /// Target period between captures.
    pub publish_interval: Duration,
    /// Grace period before the first capture.
    pub startup_delay: Duration,
    /// `frame_id` written into every header.
    pub frame_id: String,
    pub overlap: OverlapPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 720,
            height: 480,
            publish_interval: Duration::from_millis(100), // 10 Hz
            startup_delay: Duration::from_secs(2),
            frame_id: "camera".into(),
            overlap: OverlapPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), DepthLinkError> {
        if self.width == 0 || self.height == 0 {
            return Err(DepthLinkError::InvalidConfig(format!(
                "capture size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.publish_interval.is_zero() {
            return Err(DepthLinkError::InvalidConfig(
                "publish interval must be positive".into(),
            ));
        }
        let now = Instant::now();
        if now.checked_add(self.publish_interval).is_none() {
            return Err(DepthLinkError::InvalidConfig(format!(
                "publish interval {:?} is out of range",
                self.publish_interval
            )));
        }
        if now.checked_add(self.startup_delay).is_none() {
            return Err(DepthLinkError::InvalidConfig(format!(
                "startup delay {:?} is out of range",
                self.startup_delay
            )));
        }
        Ok(())
    }
}

// ── PipelineStats ────────────────────────────────────────────────

/// Live counters, updated from the scheduler and the per-tick tasks.
#[derive(Debug, Default)]
pub struct PipelineStats {
    ticks: AtomicU64,
    captures: AtomicU64,
    published: AtomicU64,
    bytes_published: AtomicU64,
    dropped_busy: AtomicU64,
    readback_errors: AtomicU64,
    encode_errors: AtomicU64,
    transport_errors: AtomicU64,
    discarded: AtomicU64,
}

/// A point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub captures: u64,
    pub published: u64,
    pub bytes_published: u64,
    pub dropped_busy: u64,
    pub readback_errors: u64,
    pub encode_errors: u64,
    pub transport_errors: u64,
    /// Completed after `stop` and therefore not sent.
    pub discarded: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            ticks: get(&self.ticks),
            captures: get(&self.captures),
            published: get(&self.published),
            bytes_published: get(&self.bytes_published),
            dropped_busy: get(&self.dropped_busy),
            readback_errors: get(&self.readback_errors),
            encode_errors: get(&self.encode_errors),
            transport_errors: get(&self.transport_errors),
            discarded: get(&self.discarded),
        }
    }

    fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} captures={} published={} ({} bytes) dropped_busy={} \
             readback_errors={} encode_errors={} transport_errors={} discarded={}",
            self.ticks,
            self.captures,
            self.published,
            self.bytes_published,
            self.dropped_busy,
            self.readback_errors,
            self.encode_errors,
            self.transport_errors,
            self.discarded,
        )
    }
}

// ── Shared state ─────────────────────────────────────────────────

struct Shared {
    config: PipelineConfig,
    encoder: Arc<DepthEncoder>,
    channel: Arc<TopicChannel>,
    clock: Arc<dyn Clock>,
    stats: Arc<PipelineStats>,
    in_flight: AtomicUsize,
}

/// Counts one in-flight cycle for as long as it lives.
struct InFlight(Arc<Shared>);

impl InFlight {
    fn enter(shared: &Arc<Shared>) -> Self {
        shared.in_flight.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(shared))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

// ── CapturePipeline ──────────────────────────────────────────────

/// Drives a [`FrameSource`] at a fixed rate and publishes each frame.
///
/// # Lifetime
///
/// [`start`](Self::start) advertises the topic and spawns the scheduler on
/// the current Tokio runtime. [`stop`](Self::stop) cancels it;
/// [`shutdown`](Self::shutdown) also waits for the scheduler to exit.
pub struct CapturePipeline {
    shared: Arc<Shared>,
    source: Option<Box<dyn FrameSource>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    pub fn new(
        config: PipelineConfig,
        source: Box<dyn FrameSource>,
        encoder: DepthEncoder,
        channel: Arc<TopicChannel>,
    ) -> Result<Self, DepthLinkError> {
        Self::with_clock(config, source, encoder, channel, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new), stamping headers from `clock`.
    pub fn with_clock(
        config: PipelineConfig,
        source: Box<dyn FrameSource>,
        encoder: DepthEncoder,
        channel: Arc<TopicChannel>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DepthLinkError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                encoder: Arc::new(encoder),
                channel,
                clock,
                stats: Arc::new(PipelineStats::default()),
                in_flight: AtomicUsize::new(0),
            }),
            source: Some(source),
            cancel: CancellationToken::new(),
            handle: None,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Cycles currently between readback request and send.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    /// Whether the scheduler is running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished()) && !self.cancel.is_cancelled()
    }

    /// Advertise the topic (if not yet advertised) and start ticking.
    ///
    /// The advertise send is awaited before the scheduler is spawned, so no
    /// publish can overtake it on the transport.
    pub async fn start(&mut self) -> Result<(), DepthLinkError> {
        let Some(source) = self.source.take() else {
            return Err(DepthLinkError::AlreadyRunning);
        };

        if !self.shared.channel.is_advertised() {
            if let Err(e) = self.shared.channel.advertise_and_send().await {
                self.source = Some(source);
                return Err(e);
            }
            info!(topic = %self.shared.channel.topic(), "topic advertised");
        }

        let cfg = &self.shared.config;
        info!(
            "capture pipeline starting: {}x{} every {:?} after {:?} ({:?})",
            cfg.width, cfg.height, cfg.publish_interval, cfg.startup_delay, cfg.overlap
        );

        let shared = Arc::clone(&self.shared);
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(run_scheduler(shared, source, cancel)));
        Ok(())
    }

    /// Cancel the scheduler. Cycles already dispatched run to completion
    /// but send nothing.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop and wait for the scheduler task to exit.
    pub async fn shutdown(&mut self) -> Result<StatsSnapshot, DepthLinkError> {
        self.stop();
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        let stats = self.stats();
        info!("capture pipeline stopped: {stats}");
        Ok(stats)
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Scheduler ────────────────────────────────────────────────────

async fn run_scheduler(
    shared: Arc<Shared>,
    mut source: Box<dyn FrameSource>,
    cancel: CancellationToken,
) {
    let cfg = &shared.config;
    let Some(first) = Instant::now().checked_add(cfg.startup_delay) else {
        warn!("startup delay {:?} is out of range, not ticking", cfg.startup_delay);
        return;
    };
    let mut ticker = tokio::time::interval_at(first, cfg.publish_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let tick = PipelineStats::bump(&shared.stats.ticks);

        if cfg.overlap == OverlapPolicy::DropWhenBusy
            && shared.in_flight.load(Ordering::Acquire) > 0
        {
            PipelineStats::bump(&shared.stats.dropped_busy);
            debug!(tick, "previous capture still in flight, dropping tick");
            continue;
        }

        source.render();
        let readback = source.request_readback();
        PipelineStats::bump(&shared.stats.captures);

        let guard = InFlight::enter(&shared);
        tokio::spawn(process_capture(
            Arc::clone(&shared),
            cancel.clone(),
            tick,
            readback,
            guard,
        ));
    }

    debug!("scheduler exited");
}

/// Everything after the readback request for one tick.
async fn process_capture(
    shared: Arc<Shared>,
    cancel: CancellationToken,
    tick: u64,
    readback: Readback,
    _guard: InFlight,
) {
    let stats = &shared.stats;

    let samples = match readback.await {
        Ok(samples) => samples,
        Err(e) => {
            PipelineStats::bump(&stats.readback_errors);
            warn!(tick, "dropping tick: {e}");
            return;
        }
    };

    if cancel.is_cancelled() {
        PipelineStats::bump(&stats.discarded);
        return;
    }

    let frame = match DepthFrame::new(shared.config.width, shared.config.height, samples) {
        Ok(frame) => frame,
        Err(e) => {
            PipelineStats::bump(&stats.encode_errors);
            warn!(tick, "dropping tick: {e}");
            return;
        }
    };

    let encoder = Arc::clone(&shared.encoder);
    let encoded = tokio::task::spawn_blocking(move || encoder.encode_frame(&frame))
        .await
        .unwrap_or_else(|e| Err(EncodeError::Codec(format!("encoder task failed: {e}"))));

    let image = match encoded {
        Ok(image) => image,
        Err(e) => {
            PipelineStats::bump(&stats.encode_errors);
            warn!(tick, "dropping tick: {e}");
            return;
        }
    };

    let stamp = shared.clock.now();
    let envelope = shared
        .channel
        .build_publish(&shared.config.frame_id, stamp, &image);

    if cancel.is_cancelled() {
        PipelineStats::bump(&stats.discarded);
        return;
    }

    match shared.channel.send(&envelope).await {
        Ok(()) => {
            PipelineStats::bump(&stats.published);
            stats
                .bytes_published
                .fetch_add(image.len() as u64, Ordering::Relaxed);
            debug!(tick, bytes = image.len(), secs = stamp.secs, "published depth frame");
        }
        Err(DepthLinkError::Transport(e)) => {
            PipelineStats::bump(&stats.transport_errors);
            warn!(tick, "send failed: {e}");
        }
        Err(e) => {
            PipelineStats::bump(&stats.encode_errors);
            warn!(tick, "dropping tick: {e}");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
