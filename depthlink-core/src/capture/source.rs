//! Frame sources and asynchronous readback.
//!
//! A [`FrameSource`] renders on demand and hands back a [`Readback`]
//! future that resolves once the depth buffer has reached host memory.
//! The completion side is a [`ReadbackCompleter`], which a source may
//! move into a driver callback, another thread, or a Tokio task.
//!
//! ```text
//! tick ──► render() ──► request_readback() ──► Readback (pending)
//!                                                  │
//!             ReadbackCompleter::complete(..) ─────┘  (later, any context)
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::ReadbackError;

/// Outcome of one readback request.
pub type ReadbackResult = Result<Vec<f32>, ReadbackError>;

// ── FrameSource ──────────────────────────────────────────────────

/// Something that renders depth frames and reads them back asynchronously.
///
/// `render` must not block for long: it only kicks off work. All waiting
/// happens on the returned [`Readback`].
pub trait FrameSource: Send + 'static {
    /// Render one frame into the source's buffer.
    fn render(&mut self);

    /// Request the most recently rendered frame.
    ///
    /// The readback must resolve to exactly `width * height` samples for
    /// the dimensions the pipeline was configured with.
    fn request_readback(&mut self) -> Readback;
}

// ── Readback ─────────────────────────────────────────────────────

/// Pending readback. Resolves to the sample array or a [`ReadbackError`].
#[derive(Debug)]
pub struct Readback {
    rx: oneshot::Receiver<ReadbackResult>,
}

impl Readback {
    /// A linked completer/future pair.
    pub fn channel() -> (ReadbackCompleter, Readback) {
        let (tx, rx) = oneshot::channel();
        (ReadbackCompleter { tx }, Readback { rx })
    }

    /// A readback that is already complete.
    pub fn ready(result: ReadbackResult) -> Self {
        let (completer, readback) = Self::channel();
        completer.complete(result);
        readback
    }
}

impl Future for Readback {
    type Output = ReadbackResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ReadbackError::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Completion half of a [`Readback`].
///
/// Dropping it without calling [`complete`](Self::complete) resolves the
/// readback to [`ReadbackError::Abandoned`].
#[derive(Debug)]
pub struct ReadbackCompleter {
    tx: oneshot::Sender<ReadbackResult>,
}

impl ReadbackCompleter {
    /// Deliver the result. Ignored if the waiting side is gone.
    pub fn complete(self, result: ReadbackResult) {
        let _ = self.tx.send(result);
    }

    /// Whether anyone is still waiting for this readback.
    pub fn is_wanted(&self) -> bool {
        !self.tx.is_closed()
    }
}

// ── SyntheticDepthSource ─────────────────────────────────────────

/// Test pattern drawn by [`SyntheticDepthSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthPattern {
    /// Horizontal near-to-far ramp that scrolls one column per frame.
    #[default]
    Ramp,
    /// 8-pixel checkerboard of 0.0 / 1.0 that inverts every frame.
    Checkerboard,
}

/// Stand-in for a render pipeline: draws a pattern into a host buffer
/// and completes readbacks after a simulated transfer latency.
///
/// Readbacks are completed on a Tokio task, so `request_readback` must be
/// called from within a runtime.
#[derive(Debug)]
pub struct SyntheticDepthSource {
    width: u32,
    height: u32,
    pattern: DepthPattern,
    latency: Duration,
    frame: u64,
    buffer: Vec<f32>,
}

impl SyntheticDepthSource {
    pub fn new(width: u32, height: u32, pattern: DepthPattern) -> Self {
        Self {
            width,
            height,
            pattern,
            latency: Duration::ZERO,
            frame: 0,
            buffer: vec![0.0; width as usize * height as usize],
        }
    }

    /// Delay between a readback request and its completion.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Frames rendered so far.
    pub fn frames_rendered(&self) -> u64 {
        self.frame
    }

    fn draw(&mut self) {
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = self.frame as usize;
        for y in 0..h {
            for x in 0..w {
                self.buffer[y * w + x] = match self.pattern {
                    DepthPattern::Ramp => ((x + shift) % w) as f32 / (w.max(2) - 1) as f32,
                    DepthPattern::Checkerboard => {
                        let cell = (x / 8 + y / 8 + shift) % 2;
                        cell as f32
                    }
                };
            }
        }
    }
}

impl FrameSource for SyntheticDepthSource {
    fn render(&mut self) {
        self.draw();
        self.frame += 1;
    }

    fn request_readback(&mut self) -> Readback {
        let samples = self.buffer.clone();
        if self.latency.is_zero() {
            return Readback::ready(Ok(samples));
        }

        let (completer, readback) = Readback::channel();
        let latency = self.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            completer.complete(Ok(samples));
        });
        readback
    }
}
