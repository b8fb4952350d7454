//! Frame decode loop
//!
//! A cancellable background task that samples the live stream at a fixed
//! cadence, runs the decoder on each frame, and reports outcomes to a
//! [`ScanSink`] in frame order. Capture and decode run on the blocking pool,
//! one frame at a time, so a stop request waits for at most one in-flight frame.

use crate::camera::StreamRef;
use crate::config::ScannerConfig;
use crate::decode::{Decoder, Detection};
use crate::formats::{FormatId, FormatSet};
use crate::types::{ScanMode, ScanResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Why a loop stopped on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopFault {
    /// The stream ended or the camera went away mid-session
    StreamEnded(String),
    /// The decoder failed for a reason other than "no code present"
    Decoder(String),
}

impl std::fmt::Display for LoopFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopFault::StreamEnded(msg) => write!(f, "Stream ended: {}", msg),
            LoopFault::Decoder(msg) => write!(f, "Decode fault: {}", msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    /// Single-shot match delivered
    Completed,
    Faulted,
}

/// Receives loop outcomes. Called from the loop task, never concurrently.
pub trait ScanSink: Send + 'static {
    fn on_result(&mut self, result: ScanResult);

    /// A frame with no code in it. Instrumentation only.
    fn on_soft_miss(&mut self) {}

    /// A frame whose code was dropped as a repeat inside the suppression window.
    fn on_suppressed(&mut self) {}

    fn on_fatal(&mut self, fault: LoopFault);
}

/// Cooperative cancellation flag the loop checks between iterations.
#[derive(Debug, Default)]
pub struct StopSignal {
    flag: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Drops repeated decodes of the same text and format inside a time window.
/// The window runs from the last time the code was let through.
#[derive(Debug)]
pub struct Suppressor {
    window: Duration,
    recent: HashMap<(String, FormatId), Instant>,
}

impl Suppressor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            recent: HashMap::new(),
        }
    }

    /// Returns true if the code should be emitted.
    pub fn admit(&mut self, text: &str, format: FormatId, now: Instant) -> bool {
        let window = self.window;
        self.recent
            .retain(|_, seen| now.saturating_duration_since(*seen) < window);

        let key = (text.to_string(), format);
        if self.recent.contains_key(&key) {
            return false;
        }
        self.recent.insert(key, now);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    pub frame_interval: Duration,
    pub mode: ScanMode,
    pub suppression_window: Duration,
}

impl From<&ScannerConfig> for LoopConfig {
    fn from(config: &ScannerConfig) -> Self {
        Self {
            frame_interval: config.camera.frame_interval(),
            mode: config.scan.mode,
            suppression_window: config.scan.suppression_window(),
        }
    }
}

/// Handle to a running loop. Dropping it cancels the loop without waiting.
pub struct LoopHandle {
    signal: Arc<StopSignal>,
    task: Option<JoinHandle<LoopExit>>,
}

impl LoopHandle {
    /// Signal the loop and wait for it to exit. Once this returns no further
    /// frame is captured.
    pub async fn cancel(mut self) -> LoopExit {
        self.signal.cancel();
        self.join_task().await
    }

    /// Wait for the loop to exit on its own.
    pub async fn join(mut self) -> LoopExit {
        self.join_task().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    async fn join_task(&mut self) -> LoopExit {
        match self.task.take() {
            Some(task) => task.await.unwrap_or_else(|e| {
                log::error!("Decode loop task failed: {}", e);
                LoopExit::Faulted
            }),
            None => LoopExit::Cancelled,
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            self.signal.cancel();
        }
    }
}

enum Sample {
    Match(Detection),
    Miss,
    StreamEnded(String),
    DecoderFault(String),
}

pub struct FrameDecodeLoop {
    config: LoopConfig,
    decoder: Arc<dyn Decoder>,
}

impl FrameDecodeLoop {
    pub fn new(config: LoopConfig, decoder: Arc<dyn Decoder>) -> Self {
        Self { config, decoder }
    }

    /// Start sampling `stream` on the current runtime.
    ///
    /// `formats` is read at every iteration, so set changes apply to the
    /// next frame without a restart.
    pub fn spawn<S: ScanSink>(
        self,
        stream: StreamRef,
        formats: watch::Receiver<FormatSet>,
        sink: S,
    ) -> LoopHandle {
        let signal = Arc::new(StopSignal::new());
        let task = tokio::spawn(self.run(stream, formats, sink, signal.clone()));
        LoopHandle {
            signal,
            task: Some(task),
        }
    }

    async fn run<S: ScanSink>(
        self,
        stream: StreamRef,
        formats: watch::Receiver<FormatSet>,
        mut sink: S,
        signal: Arc<StopSignal>,
    ) -> LoopExit {
        log::debug!(
            "Decode loop started on stream {} ({:?}, every {:?}, decoder {})",
            stream.id(),
            self.config.mode,
            self.config.frame_interval,
            self.decoder.name()
        );

        let mut ticker = tokio::time::interval(self.config.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut suppressor = Suppressor::new(self.config.suppression_window);

        loop {
            tokio::select! {
                biased;
                _ = signal.cancelled() => return LoopExit::Cancelled,
                _ = ticker.tick() => {}
            }
            if signal.is_cancelled() {
                return LoopExit::Cancelled;
            }

            let active = formats.borrow().clone();
            let frame_stream = stream.clone();
            let decoder = self.decoder.clone();
            let sample = tokio::task::spawn_blocking(move || {
                sample_frame(&frame_stream, decoder.as_ref(), &active)
            })
            .await
            .unwrap_or_else(|e| Sample::DecoderFault(format!("decode task failed: {}", e)));

            // Outcome of a frame that was in flight when stop arrived is dropped.
            if signal.is_cancelled() {
                return LoopExit::Cancelled;
            }

            match sample {
                Sample::Miss => sink.on_soft_miss(),
                Sample::Match(detection) => {
                    if !suppressor.admit(&detection.text, detection.format, Instant::now()) {
                        log::trace!("Suppressed repeat of {}", detection.text);
                        sink.on_suppressed();
                        continue;
                    }
                    log::debug!("Decoded {} ({})", detection.text, detection.format);
                    sink.on_result(ScanResult::new(
                        detection.text,
                        detection.format,
                        detection.bounding_box,
                    ));
                    if self.config.mode == ScanMode::SingleShot {
                        log::debug!("Single-shot match delivered, decode loop exiting");
                        return LoopExit::Completed;
                    }
                }
                Sample::StreamEnded(msg) => {
                    log::error!("Stream ended during scanning: {}", msg);
                    sink.on_fatal(LoopFault::StreamEnded(msg));
                    return LoopExit::Faulted;
                }
                Sample::DecoderFault(msg) => {
                    log::error!("Decoder fault: {}", msg);
                    sink.on_fatal(LoopFault::Decoder(msg));
                    return LoopExit::Faulted;
                }
            }
        }
    }
}

fn sample_frame(stream: &StreamRef, decoder: &dyn Decoder, formats: &FormatSet) -> Sample {
    let frame = match stream.capture_frame() {
        Ok(Some(frame)) => frame,
        Ok(None) => return Sample::Miss,
        Err(e) => return Sample::StreamEnded(e.to_string()),
    };

    match decoder.attempt_decode(&frame, formats) {
        Ok(Some(detection)) if formats.contains(detection.format) => Sample::Match(detection),
        Ok(Some(detection)) => {
            log::debug!(
                "Ignoring {} match, format not enabled",
                detection.format
            );
            Sample::Miss
        }
        Ok(None) => Sample::Miss,
        Err(e) => Sample::DecoderFault(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppressor_window() {
        let mut suppressor = Suppressor::new(Duration::from_secs(3));
        let t0 = Instant::now();

        assert!(suppressor.admit("SKU-1234", FormatId::Ean13, t0));
        assert!(!suppressor.admit("SKU-1234", FormatId::Ean13, t0 + Duration::from_secs(1)));
        assert!(!suppressor.admit("SKU-1234", FormatId::Ean13, t0 + Duration::from_millis(2999)));
        assert!(suppressor.admit("SKU-1234", FormatId::Ean13, t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_suppressor_key_includes_format() {
        let mut suppressor = Suppressor::new(Duration::from_secs(3));
        let t0 = Instant::now();
        assert!(suppressor.admit("12345670", FormatId::Ean8, t0));
        assert!(suppressor.admit("12345670", FormatId::Code128, t0));
        assert!(suppressor.admit("other", FormatId::Ean8, t0));
    }

    #[test]
    fn test_zero_window_admits_everything() {
        let mut suppressor = Suppressor::new(Duration::ZERO);
        let t0 = Instant::now();
        assert!(suppressor.admit("a", FormatId::QrCode, t0));
        assert!(suppressor.admit("a", FormatId::QrCode, t0));
    }

    #[tokio::test]
    async fn test_stop_signal_wakes_waiter() {
        let signal = Arc::new(StopSignal::new());
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        signal.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_before_wait_returns_immediately() {
        let signal = StopSignal::new();
        signal.cancel();
        tokio::time::timeout(Duration::from_millis(100), signal.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn test_loop_fault_display() {
        let fault = LoopFault::Decoder("bad buffer".into());
        assert_eq!(fault.to_string(), "Decode fault: bad buffer");
    }
}
